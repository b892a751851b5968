//! regtest accept command.
//!
//! Promotes obtained artifacts to baselines outside a test run.

use std::path::Path;

use anyhow::{Context, Result};
use fs_err as fs;
use serde::Serialize;

use super::{ArtifactStatus, discover};
use crate::output::Output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptAction {
    Accepted,
    WouldAccept,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptEntry {
    pub path: String,
    pub baseline: String,
    pub action: AcceptAction,
}

#[derive(Serialize)]
struct AcceptOutput {
    artifacts: Vec<AcceptEntry>,
    accepted: usize,
    unchanged: usize,
}

/// Copy every differing or new obtained artifact over its baseline.
pub fn accept(
    output: &Output,
    obtained_dir: &Path,
    baseline_dir: &Path,
    dry_run: bool,
) -> Result<Vec<AcceptEntry>> {
    let pairs = discover(obtained_dir, baseline_dir)?;
    let pb = output.file_progress(pairs.len() as u64);

    let mut entries = Vec::with_capacity(pairs.len());
    for pair in pairs {
        pb.set_message(pair.relative.display().to_string());
        let action = match pair.status()? {
            ArtifactStatus::Identical => AcceptAction::Unchanged,
            _ if dry_run => AcceptAction::WouldAccept,
            _ => {
                if let Some(parent) = pair.baseline.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&pair.obtained, &pair.baseline).with_context(|| {
                    format!("failed to accept {}", pair.obtained.display())
                })?;
                log::info!("Accepted {} as {}", pair.obtained.display(), pair.baseline.display());
                AcceptAction::Accepted
            }
        };
        entries.push(AcceptEntry {
            path: pair.relative.display().to_string(),
            baseline: pair.baseline.display().to_string(),
            action,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(entries)
}

/// Run the accept command.
pub fn run(output: &Output, obtained_dir: &Path, baseline_dir: &Path, dry_run: bool) -> Result<()> {
    let entries = accept(output, obtained_dir, baseline_dir, dry_run)?;
    let unchanged = entries
        .iter()
        .filter(|e| e.action == AcceptAction::Unchanged)
        .count();
    let accepted = entries.len() - unchanged;

    if output.is_json() {
        return output.json(&AcceptOutput {
            artifacts: entries,
            accepted,
            unchanged,
        });
    }
    for entry in &entries {
        match entry.action {
            AcceptAction::Accepted => output.println(&format!("Accepted: {}", entry.path)),
            AcceptAction::WouldAccept => output.println(&format!("Would accept: {}", entry.path)),
            AcceptAction::Unchanged => {}
        }
    }
    if accepted == 0 {
        output.println("All baselines are up to date");
    } else if dry_run {
        output.warn(&format!("Dry run: {accepted} baselines left untouched"));
    }
    Ok(())
}
