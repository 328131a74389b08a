// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator confirmation via TTY prompt, or `--yes`.

use std::io::{BufRead, IsTerminal, Write};

use pgkeep_core::{Confirmer, PgkeepError};
use tracing::info;

/// Asks on the terminal. Anything but `y`/`yes` declines.
pub struct TtyConfirmer;

impl Confirmer for TtyConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool, PgkeepError> {
        if !std::io::stdin().is_terminal() {
            return Err(PgkeepError::InvalidArgument(
                "confirmation required. Run interactively or pass --yes.".to_string(),
            ));
        }

        eprint!("{prompt} [y/N] ");
        std::io::stderr()
            .flush()
            .map_err(|e| PgkeepError::io("<stderr>", e))?;
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| PgkeepError::io("<stdin>", e))?;
        Ok(is_affirmative(&answer))
    }
}

/// Accepts every prompt. Selected by `--yes`.
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, prompt: &str) -> Result<bool, PgkeepError> {
        info!(prompt, "confirmed by --yes");
        Ok(true)
    }
}

pub fn confirmer(assume_yes: bool) -> Box<dyn Confirmer> {
    if assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TtyConfirmer)
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("  YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn assume_yes_accepts() {
        assert!(confirmer(true).confirm("Proceed?").unwrap());
    }
}
