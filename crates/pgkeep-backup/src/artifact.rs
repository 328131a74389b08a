// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gzip handling for dump artifacts on the local filesystem.
//!
//! Dumps are compressed while they are produced and verified by a streaming
//! decompression pass into a sink, so the uncompressed SQL never touches disk.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pgkeep_core::PgkeepError;

/// Suffix of an artifact that is still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Encoder writing a gzip stream into a new file.
pub type GzipWriter = GzEncoder<BufWriter<File>>;

/// Reader yielding the decompressed SQL of an artifact.
pub type DumpReader = MultiGzDecoder<BufReader<File>>;

/// Staging path for `path`: same directory, `.partial` appended.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Create (truncating) `path` and wrap it in a gzip encoder.
pub fn create_gzip(path: &Path) -> Result<GzipWriter, PgkeepError> {
    let file = File::create(path).map_err(|e| PgkeepError::io(path, e))?;
    Ok(GzEncoder::new(BufWriter::new(file), Compression::default()))
}

/// Write the gzip trailer, flush and fsync. Returns the compressed size.
pub fn finish_gzip(encoder: GzipWriter, path: &Path) -> Result<u64, PgkeepError> {
    let mut writer = encoder.finish().map_err(|e| PgkeepError::io(path, e))?;
    writer.flush().map_err(|e| PgkeepError::io(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| PgkeepError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| PgkeepError::io(path, e))?;
    let meta = file.metadata().map_err(|e| PgkeepError::io(path, e))?;
    Ok(meta.len())
}

/// Open an artifact for streaming decompression.
pub fn open_dump(path: &Path) -> Result<DumpReader, PgkeepError> {
    let file = File::open(path).map_err(|e| PgkeepError::io(path, e))?;
    Ok(MultiGzDecoder::new(BufReader::new(file)))
}

/// Size of a local file, `None` when it does not exist.
pub fn file_size(path: &Path) -> Result<Option<u64>, PgkeepError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PgkeepError::io(path, e)),
    }
}

/// Streaming integrity check: decompress the whole artifact into a sink.
///
/// Fails with `IntegrityCheckFailed` for missing, empty, truncated or
/// corrupt files, and for archives that decompress to nothing. Returns the
/// decompressed size.
pub fn verify_gzip(path: &Path) -> Result<u64, PgkeepError> {
    let failed = |reason: String| PgkeepError::IntegrityCheckFailed {
        path: path.display().to_string(),
        reason,
    };

    match file_size(path)? {
        None => return Err(failed("file does not exist".to_string())),
        Some(0) => return Err(failed("file is empty".to_string())),
        Some(_) => {}
    }

    let mut reader = open_dump(path)?;
    let inflated = io::copy(&mut reader, &mut io::sink()).map_err(|e| failed(e.to_string()))?;
    if inflated == 0 {
        return Err(failed("dump is empty".to_string()));
    }
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn write_artifact(path: &Path, body: &[u8]) -> u64 {
        let mut encoder = create_gzip(path).unwrap();
        encoder.write_all(body).unwrap();
        finish_gzip(encoder, path).unwrap()
    }

    #[test]
    fn written_artifact_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        let size = write_artifact(&path, b"DROP TABLE IF EXISTS t;\nCREATE TABLE t ();\n");
        assert!(size > 0);
        assert_eq!(verify_gzip(&path).unwrap(), 43);

        let mut sql = String::new();
        open_dump(&path).unwrap().read_to_string(&mut sql).unwrap();
        assert!(sql.starts_with("DROP TABLE IF EXISTS t;"));
    }

    #[test]
    fn truncated_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        let body: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
        write_artifact(&path, &body);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = verify_gzip(&path).unwrap_err();
        assert!(matches!(err, PgkeepError::IntegrityCheckFailed { .. }));
    }

    #[test]
    fn garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        std::fs::write(&path, b"this is not gzip").unwrap();
        assert!(matches!(
            verify_gzip(&path).unwrap_err(),
            PgkeepError::IntegrityCheckFailed { .. }
        ));
    }

    #[test]
    fn empty_and_missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.sql.gz");
        std::fs::write(&empty, b"").unwrap();
        let err = verify_gzip(&empty).unwrap_err();
        assert!(err.to_string().contains("file is empty"));

        let err = verify_gzip(&dir.path().join("missing.sql.gz")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn empty_dump_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        write_artifact(&path, b"");
        let err = verify_gzip(&path).unwrap_err();
        assert!(err.to_string().contains("dump is empty"));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/b/daily/x.sql.gz")),
            PathBuf::from("/b/daily/x.sql.gz.partial")
        );
    }
}
