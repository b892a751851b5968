//! Artifact naming and on-disk locations.

use std::path::{Component, Path, PathBuf};

use fs_err as fs;

use crate::error::{RegressError, Result};

/// Identity of the test a check runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    /// Enclosing group (test module, suite, class), if any.
    pub group: Option<String>,
    /// Test name, including any parametrization suffix.
    pub name: String,
}

impl TestIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            group: None,
            name: name.into(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Deterministic artifact name for this test.
    pub fn artifact_name(&self) -> String {
        let mut raw = String::new();
        if let Some(group) = &self.group {
            raw.push_str(group);
            raw.push('_');
        }
        raw.push_str(&self.name);
        sanitize(&raw)
    }
}

/// Collapse every run of non-alphanumeric characters into `_`, trim the
/// trailing separator and lowercase.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_separator = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            in_separator = false;
        } else if !in_separator {
            out.push('_');
            in_separator = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// `<dir>/<name>.baseline<ext>`
pub fn baseline_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}.baseline{extension}"))
}

/// `<dir>/<name>.obtained<ext>`
pub fn obtained_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}.obtained{extension}"))
}

/// Split an artifact file name into `(name, role, extension)`, where role is
/// `baseline` or `obtained`.
pub fn parse_artifact_file_name(file_name: &str) -> Option<(&str, &str, &str)> {
    for role in ["obtained", "baseline"] {
        let marker = format!(".{role}");
        if let Some(idx) = file_name.rfind(&marker) {
            let rest = &file_name[idx + marker.len()..];
            if rest.is_empty() || rest.starts_with('.') {
                return Some((&file_name[..idx], role, rest));
            }
        }
    }
    None
}

/// Input, baseline and obtained directories for one test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    pub input: PathBuf,
    pub baseline: PathBuf,
    pub obtained: PathBuf,
}

impl DataDirs {
    /// `<root>/<data_dir>/{input,baseline,obtained}/<test dir>/<test file stem>`, where
    /// `<test dir>` is the test file's directory relative to `root`.
    ///
    /// The directories are created if missing. A relative `test_file` is taken
    /// relative to `root`; one that resolves outside `root` is rejected.
    pub fn for_test(root: &Path, data_dir: &Path, test_file: &Path) -> Result<Self> {
        let parent = test_file.parent().unwrap_or_else(|| Path::new(""));
        let relative_dir = if parent.is_absolute() {
            parent.strip_prefix(root).ok()
        } else {
            Some(parent)
        }
        .filter(|dir| dir.components().all(|c| matches!(c, Component::Normal(_))))
        .ok_or_else(|| {
            RegressError::validation(
                "test_file",
                format!(
                    "{} is not under the project root {}",
                    test_file.display(),
                    root.display()
                ),
            )
        })?;
        let stem = test_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let make = |kind: &str| -> Result<PathBuf> {
            let dir = root.join(data_dir).join(kind).join(relative_dir).join(&stem);
            fs::create_dir_all(&dir)?;
            Ok(dir)
        };
        let dirs = Self {
            input: make("input")?,
            baseline: make("baseline")?,
            obtained: make("obtained")?,
        };
        log::debug!(
            "Resolved data dirs for {}: baseline={}, obtained={}",
            test_file.display(),
            dirs.baseline.display(),
            dirs.obtained.display()
        );
        Ok(dirs)
    }
}
