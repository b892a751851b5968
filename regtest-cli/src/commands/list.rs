//! regtest list command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use tabled::settings::Style;

use super::{ArtifactStatus, discover};
use crate::output::Output;

/// JSON output for list command.
#[derive(Serialize)]
struct ListOutput {
    artifacts: Vec<ArtifactEntry>,
    summary: ListSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub baseline: String,
    pub status: ArtifactStatus,
}

/// Table row for list output.
#[derive(Tabled)]
struct ArtifactTableRow {
    #[tabled(rename = "Obtained")]
    path: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
struct ListSummary {
    identical: usize,
    differs: usize,
    missing_baseline: usize,
}

impl ListSummary {
    fn of(entries: &[ArtifactEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.status {
                ArtifactStatus::Identical => summary.identical += 1,
                ArtifactStatus::Differs => summary.differs += 1,
                ArtifactStatus::MissingBaseline => summary.missing_baseline += 1,
            }
        }
        summary
    }
}

pub fn collect(obtained_dir: &Path, baseline_dir: &Path) -> Result<Vec<ArtifactEntry>> {
    discover(obtained_dir, baseline_dir)?
        .into_iter()
        .map(|pair| {
            Ok(ArtifactEntry {
                status: pair.status()?,
                path: pair.relative.display().to_string(),
                baseline: pair.baseline.display().to_string(),
            })
        })
        .collect()
}

/// Run the list command.
pub fn run(output: &Output, obtained_dir: &Path, baseline_dir: &Path) -> Result<()> {
    let entries = collect(obtained_dir, baseline_dir)?;
    let summary = ListSummary::of(&entries);

    if output.is_json() {
        return output.json(&ListOutput {
            artifacts: entries,
            summary,
        });
    }
    if entries.is_empty() {
        output.println(&format!("No obtained artifacts in {}", obtained_dir.display()));
        return Ok(());
    }

    let rows: Vec<ArtifactTableRow> = entries
        .iter()
        .map(|e| ArtifactTableRow {
            path: e.path.clone(),
            baseline: e.baseline.clone(),
            status: e.status.to_string(),
        })
        .collect();
    let mut table = tabled::Table::new(rows);
    table.with(Style::modern());
    output.println(&table.to_string());
    output.println(&format!(
        "{} identical, {} differ, {} missing baseline",
        summary.identical, summary.differs, summary.missing_baseline
    ));
    Ok(())
}
