//! The create-or-compare protocol shared by every data kind.
//!
//! ```text
//! NO_BASELINE  -> CREATED                      (abort)
//! HAS_BASELINE -> MATCH                        (pass)
//!              -> MISMATCH -> REBASED          (soft fail)
//!              -> MISMATCH -> RAISED           (hard fail)
//! ```
//!
//! Checks sharing one artifact name must not run concurrently: there is no
//! locking, the last writer wins and a reader may see a torn file.

use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::config::Config;
use crate::error::Result;
use crate::naming::{self, DataDirs, TestIdentity};
use crate::verdict::Verdict;

/// Result of comparing an obtained artifact with its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Match,
    /// Human-readable diff report.
    Mismatch(String),
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            Comparison::Match => None,
            Comparison::Mismatch(r) => Some(r),
        }
    }

    pub(crate) fn from_report(report: String) -> Self {
        if report.is_empty() {
            Comparison::Match
        } else {
            Comparison::Mismatch(report)
        }
    }
}

/// The two capabilities a data kind plugs into the lifecycle.
pub trait Artifact {
    /// Serialize the in-memory value to `path`. The parent directory exists.
    fn dump(&self, path: &Path) -> Result<()>;

    /// Compare two persisted artifacts.
    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison>;
}

/// Per-check overrides common to every data kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Use this artifact name instead of the one derived from the test identity.
    pub basename: Option<String>,
    /// Write the obtained artifact here instead of the obtained directory.
    pub obtained_path: Option<PathBuf>,
    /// Override the context-wide rebase switch for this check.
    pub rebase: Option<bool>,
}

impl CheckOptions {
    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    pub fn obtained_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.obtained_path = Some(path.into());
        self
    }

    pub fn rebase(mut self, rebase: bool) -> Self {
        self.rebase = Some(rebase);
        self
    }
}

/// Where a check's artifacts live and whether mismatches rebase.
#[derive(Debug, Clone)]
pub struct RegressionContext {
    baseline_dir: PathBuf,
    obtained_dir: PathBuf,
    identity: TestIdentity,
    rebase: bool,
    config: Config,
}

fn make_location_message(banner: &str, path: &Path) -> String {
    format!("{banner}\n- {}", path.display())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

impl RegressionContext {
    pub fn new(
        baseline_dir: impl Into<PathBuf>,
        obtained_dir: impl Into<PathBuf>,
        identity: TestIdentity,
    ) -> Self {
        Self {
            baseline_dir: baseline_dir.into(),
            obtained_dir: obtained_dir.into(),
            identity,
            rebase: false,
            config: Config::default(),
        }
    }

    /// Build a context from a loaded configuration, deriving the data
    /// directories from the test file's location under `root`.
    ///
    /// `REGTEST_REBASE`, when set, overrides the configured rebase switch.
    pub fn from_config(
        config: Config,
        root: &Path,
        test_file: &Path,
        identity: TestIdentity,
    ) -> Result<Self> {
        let config = config.with_env()?;
        let dirs = DataDirs::for_test(root, &config.data_dir, test_file)?;
        Ok(Self {
            baseline_dir: dirs.baseline,
            obtained_dir: dirs.obtained,
            identity,
            rebase: config.rebase,
            config,
        })
    }

    pub fn with_rebase(mut self, rebase: bool) -> Self {
        self.rebase = rebase;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.rebase = config.rebase;
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn baseline_dir(&self) -> &Path {
        &self.baseline_dir
    }

    pub fn obtained_dir(&self) -> &Path {
        &self.obtained_dir
    }

    pub fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    /// Artifact name for a check: the override if given, else the derived one.
    pub fn artifact_name(&self, options: &CheckOptions) -> String {
        match &options.basename {
            Some(name) => name.to_lowercase(),
            None => self.identity.artifact_name(),
        }
    }

    pub fn baseline_path(&self, options: &CheckOptions, extension: &str) -> PathBuf {
        naming::baseline_path(&self.baseline_dir, &self.artifact_name(options), extension)
    }

    pub fn obtained_path(&self, options: &CheckOptions, extension: &str) -> PathBuf {
        match &options.obtained_path {
            Some(path) => path.clone(),
            None => {
                naming::obtained_path(&self.obtained_dir, &self.artifact_name(options), extension)
            }
        }
    }

    /// Run the create-or-compare protocol for one artifact.
    pub fn perform<A: Artifact + ?Sized>(
        &self,
        artifact: &A,
        extension: &str,
        options: &CheckOptions,
    ) -> Result<Verdict> {
        let baseline_path = self.baseline_path(options, extension);
        let rebase = options.rebase.unwrap_or(self.rebase);

        if !baseline_path.is_file() {
            ensure_parent(&baseline_path)?;
            artifact.dump(&baseline_path)?;
            log::info!("Baseline created at {}", baseline_path.display());
            return Ok(Verdict::Abort(make_location_message(
                "File not found in data directory, created:",
                &baseline_path,
            )));
        }

        let obtained_path = self.obtained_path(options, extension);
        ensure_parent(&obtained_path)?;
        artifact.dump(&obtained_path)?;
        log::debug!(
            "Comparing {} against {}",
            obtained_path.display(),
            baseline_path.display()
        );

        match artifact.compare(&obtained_path, &baseline_path)? {
            Comparison::Match => Ok(Verdict::Pass),
            Comparison::Mismatch(report) if rebase => {
                fs::copy(&obtained_path, &baseline_path)?;
                log::warn!("Files differ, baseline rebased at {}", baseline_path.display());
                let mut message = make_location_message(
                    "Files differ and rebase is enabled, regenerated baseline at:",
                    &baseline_path,
                );
                message.push_str("\n\n");
                message.push_str(&report);
                Ok(Verdict::SoftFail(message))
            }
            Comparison::Mismatch(report) => Ok(Verdict::HardFail(report)),
        }
    }
}
