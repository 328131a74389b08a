// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory database host for deterministic engine tests.
//!
//! The database is a map of table name to row count. Dumps are real gzip
//! files holding one `DROP TABLE IF EXISTS` and one `CREATE TABLE` line per
//! table, so integrity checks and transfers exercise genuine bytes. Applying
//! a dump behaves like `psql --single-transaction -v ON_ERROR_STOP=1`: a
//! malformed line aborts without changing anything.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pgkeep_core::{Host, PgkeepError};
use tempfile::TempDir;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, u64>,
    events: Vec<String>,
    empty_dumps: bool,
    corrupt_dumps: bool,
    fail_downloads: bool,
    fail_uploads: bool,
    fail_apply: bool,
}

/// A fake database host.
///
/// [`FakeHost::local`] uses paths as given. [`FakeHost::remote`] owns a
/// private directory and maps every absolute path into it, standing in for
/// another machine's filesystem.
pub struct FakeHost {
    label: String,
    root: Option<TempDir>,
    state: Mutex<State>,
}

impl FakeHost {
    pub fn local() -> Self {
        Self {
            label: "local".to_string(),
            root: None,
            state: Mutex::new(State::default()),
        }
    }

    /// A host with its own filesystem, labelled like an SSH destination.
    ///
    /// # Panics
    ///
    /// Panics if the backing temporary directory cannot be created.
    pub fn remote(label: &str) -> Self {
        let root = tempfile::tempdir().expect("create fake host directory");
        Self {
            label: label.to_string(),
            root: Some(root),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_table(mut self, name: &str, rows: u64) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .tables
            .insert(name.to_string(), rows);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: &str) {
        self.state().events.push(event.to_string());
    }

    /// Where `path` on this host lives on the test machine.
    pub fn path_on_host(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.path().join(path.strip_prefix("/").unwrap_or(path)),
            None => path.to_path_buf(),
        }
    }

    pub fn tables(&self) -> BTreeMap<String, u64> {
        self.state().tables.clone()
    }

    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.state().tables.get(table).copied()
    }

    /// Mutating operations performed so far (`dump_to`, `apply_dump`,
    /// `stop_services`, ...), in order.
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn produce_empty_dumps(&self, on: bool) {
        self.state().empty_dumps = on;
    }

    pub fn produce_corrupt_dumps(&self, on: bool) {
        self.state().corrupt_dumps = on;
    }

    pub fn fail_downloads(&self, on: bool) {
        self.state().fail_downloads = on;
    }

    pub fn fail_uploads(&self, on: bool) {
        self.state().fail_uploads = on;
    }

    pub fn fail_apply(&self, on: bool) {
        self.state().fail_apply = on;
    }

    fn prepare(&self, path: &Path) -> Result<PathBuf, PgkeepError> {
        let real = self.path_on_host(path);
        if let Some(parent) = real.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PgkeepError::io(parent, e))?;
        }
        Ok(real)
    }

    fn transfer_error(&self, what: &str) -> PgkeepError {
        PgkeepError::RemoteCommandFailed {
            command: format!("[{}] scp", self.label),
            exit_code: 1,
            stderr: format!("{what}: connection reset by peer"),
        }
    }
}

fn render_dump(tables: &BTreeMap<String, u64>) -> String {
    let mut sql = String::from("-- fake dump\n");
    for (name, rows) in tables {
        sql.push_str(&format!("DROP TABLE IF EXISTS public.{name};\n"));
        sql.push_str(&format!("CREATE TABLE public.{name} (rows {rows});\n"));
    }
    sql
}

fn apply_statement(tables: &mut BTreeMap<String, u64>, line: &str) -> Result<(), String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("--") {
        return Ok(());
    }
    if let Some(name) = line
        .strip_prefix("DROP TABLE IF EXISTS public.")
        .and_then(|rest| rest.strip_suffix(';'))
    {
        tables.remove(name);
        return Ok(());
    }
    let create = line
        .strip_prefix("CREATE TABLE public.")
        .and_then(|rest| rest.strip_suffix(");"))
        .and_then(|rest| rest.split_once(" (rows "));
    match create {
        Some((name, rows)) => {
            let rows = rows.parse::<u64>().map_err(|_| format!("bad row count in `{line}`"))?;
            if tables.insert(name.to_string(), rows).is_some() {
                return Err(format!("relation \"{name}\" already exists"));
            }
            Ok(())
        }
        None => Err(format!("syntax error at `{line}`")),
    }
}

fn integrity_error(path: &Path, reason: impl Into<String>) -> PgkeepError {
    PgkeepError::IntegrityCheckFailed {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl Host for FakeHost {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn dump_to(&self, path: &Path) -> Result<(), PgkeepError> {
        self.record("dump_to");
        let real = self.prepare(path)?;
        let (sql, empty, corrupt) = {
            let state = self.state();
            (render_dump(&state.tables), state.empty_dumps, state.corrupt_dumps)
        };

        let bytes = if empty {
            Vec::new()
        } else if corrupt {
            b"\x1f\x8b this is not a gzip stream".to_vec()
        } else {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder
                .write_all(sql.as_bytes())
                .map_err(|e| PgkeepError::io(&real, e))?;
            encoder.finish().map_err(|e| PgkeepError::io(&real, e))?
        };
        std::fs::write(&real, bytes).map_err(|e| PgkeepError::io(&real, e))?;
        debug!(host = %self.label, path = %path.display(), "fake dump written");
        Ok(())
    }

    async fn apply_dump(&self, path: &Path) -> Result<(), PgkeepError> {
        self.record("apply_dump");
        let real = self.path_on_host(path);
        let psql_error = |stderr: String| PgkeepError::RemoteCommandFailed {
            command: format!("[{}] psql", self.label),
            exit_code: 3,
            stderr,
        };
        if self.state().fail_apply {
            return Err(psql_error("ERROR: could not connect to server".to_string()));
        }

        let file = File::open(&real).map_err(|e| PgkeepError::io(&real, e))?;
        let reader = BufReader::new(MultiGzDecoder::new(file));
        let mut tables = self.state().tables.clone();
        for line in reader.lines() {
            let line = line.map_err(|e| psql_error(e.to_string()))?;
            apply_statement(&mut tables, &line).map_err(|e| psql_error(format!("ERROR: {e}")))?;
        }
        self.state().tables = tables;
        Ok(())
    }

    async fn count_tables(&self) -> Result<u64, PgkeepError> {
        Ok(self.state().tables.len() as u64)
    }

    async fn stop_services(&self) -> Result<(), PgkeepError> {
        self.record("stop_services");
        Ok(())
    }

    async fn start_services(&self) -> Result<(), PgkeepError> {
        self.record("start_services");
        Ok(())
    }

    async fn stop_stack(&self) -> Result<(), PgkeepError> {
        self.record("stop_stack");
        Ok(())
    }

    async fn file_size(&self, path: &Path) -> Result<Option<u64>, PgkeepError> {
        let real = self.path_on_host(path);
        match std::fs::metadata(&real) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PgkeepError::io(&real, e)),
        }
    }

    async fn verify_artifact(&self, path: &Path) -> Result<(), PgkeepError> {
        let real = self.path_on_host(path);
        let file = File::open(&real).map_err(|e| integrity_error(path, e.to_string()))?;
        let inflated = io::copy(&mut MultiGzDecoder::new(file), &mut io::sink())
            .map_err(|e| integrity_error(path, e.to_string()))?;
        if inflated == 0 {
            return Err(integrity_error(path, "dump is empty"));
        }
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), PgkeepError> {
        self.record("remove_file");
        let real = self.path_on_host(path);
        match std::fs::remove_file(&real) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PgkeepError::io(&real, e)),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), PgkeepError> {
        self.record("rename");
        let to = self.prepare(to)?;
        std::fs::rename(self.path_on_host(from), &to).map_err(|e| PgkeepError::io(&to, e))
    }

    async fn download(&self, remote: &Path, local: &Path) -> Result<(), PgkeepError> {
        self.record("download");
        if self.state().fail_downloads {
            return Err(self.transfer_error("download"));
        }
        std::fs::copy(self.path_on_host(remote), local).map_err(|e| PgkeepError::io(local, e))?;
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &Path) -> Result<(), PgkeepError> {
        self.record("upload");
        if self.state().fail_uploads {
            return Err(self.transfer_error("upload"));
        }
        let real = self.prepare(remote)?;
        std::fs::copy(local, &real).map_err(|e| PgkeepError::io(&real, e))?;
        Ok(())
    }
}
