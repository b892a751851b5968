//! Output formatting for the CLI.
//!
//! Handles human-readable and JSON output formats.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Output handler for CLI commands.
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print a line to stdout.
    pub fn println(&self, msg: &str) {
        println!("{msg}");
    }

    /// Print a warning to stderr (yellow).
    pub fn warn(&self, msg: &str) {
        eprintln!("\x1b[33m{msg}\x1b[0m");
    }

    /// Print a value as a single JSON line.
    pub fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    /// Progress bar over `len` files; hidden in JSON mode.
    pub fn file_progress(&self, len: u64) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}
