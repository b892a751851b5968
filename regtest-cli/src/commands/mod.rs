//! regtest command implementations.
//!
//! `compare` runs one comparator on two files; `list` and `accept` work on
//! whole artifact trees discovered by [`discover`].

pub mod accept;
pub mod compare;
pub mod list;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use fs_err as fs;
use regtest::naming::parse_artifact_file_name;
use serde::Serialize;
use walkdir::WalkDir;

/// An obtained artifact and the baseline it is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    /// Obtained path relative to the obtained directory.
    pub relative: PathBuf,
    pub obtained: PathBuf,
    pub baseline: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Identical,
    Differs,
    MissingBaseline,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactStatus::Identical => "identical",
            ArtifactStatus::Differs => "differs",
            ArtifactStatus::MissingBaseline => "missing baseline",
        })
    }
}

impl ArtifactPair {
    /// Byte-level status of the pair.
    pub fn status(&self) -> Result<ArtifactStatus> {
        if !self.baseline.is_file() {
            return Ok(ArtifactStatus::MissingBaseline);
        }
        if fs::read(&self.obtained)? == fs::read(&self.baseline)? {
            Ok(ArtifactStatus::Identical)
        } else {
            Ok(ArtifactStatus::Differs)
        }
    }
}

/// A directory named `obtained` pairs with its sibling `baseline`; any other
/// directory holds both roles itself.
pub fn default_baseline_dir(obtained_dir: &Path) -> PathBuf {
    match (obtained_dir.file_name(), obtained_dir.parent()) {
        (Some(name), Some(parent)) if name == "obtained" => parent.join("baseline"),
        _ => obtained_dir.to_path_buf(),
    }
}

/// Every `<name>.obtained<ext>` file below `obtained_dir`, sorted by path,
/// paired with `<baseline_dir>/<same relative dir>/<name>.baseline<ext>`.
pub fn discover(obtained_dir: &Path, baseline_dir: &Path) -> Result<Vec<ArtifactPair>> {
    if !obtained_dir.is_dir() {
        bail!("{} is not a directory", obtained_dir.display());
    }

    let mut pairs = Vec::new();
    for entry in WalkDir::new(obtained_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some((name, "obtained", ext)) = parse_artifact_file_name(&file_name) else {
            continue;
        };
        let relative = entry.path().strip_prefix(obtained_dir)?.to_path_buf();
        let sub_dir = relative.parent().unwrap_or_else(|| Path::new(""));
        pairs.push(ArtifactPair {
            baseline: baseline_dir.join(sub_dir).join(format!("{name}.baseline{ext}")),
            obtained: entry.path().to_path_buf(),
            relative,
        });
    }
    log::debug!("Found {} obtained artifacts in {}", pairs.len(), obtained_dir.display());
    Ok(pairs)
}

#[cfg(test)]
pub(crate) fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}
