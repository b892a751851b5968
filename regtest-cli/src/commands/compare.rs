//! regtest compare command.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::ValueEnum;
use regtest::fixtures::{file, mapping, ndarray, sequence, tabular};
use regtest::{Comparison, Config, Encoding, FileMode, Tolerance, Tolerances};
use serde::Serialize;

use crate::output::Output;

/// Data kind of the compared artifacts; selects the comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// String-keyed mapping stored as JSON
    Data,
    /// Named columns stored as CSV
    Table,
    /// Named arrays stored as an NPZ archive
    Array,
    /// Raw text or binary content
    File,
    /// Scalar or sequence of scalars stored as JSON
    Value,
}

/// Comparator settings taken from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareArgs {
    pub atol: Option<f64>,
    pub rtol: Option<f64>,
    pub binary: bool,
    pub encoding: Option<Encoding>,
}

impl CompareArgs {
    /// Command-line bounds over the configured default for the kind.
    fn tolerance(&self, fallback: Tolerance) -> Result<Tolerance> {
        let tolerance = Tolerance::new(
            self.atol.unwrap_or(fallback.atol),
            self.rtol.unwrap_or(fallback.rtol),
        );
        tolerance.validate("--atol/--rtol")?;
        Ok(tolerance)
    }

    fn file_mode(&self) -> Result<FileMode> {
        match (self.binary, self.encoding) {
            (true, Some(_)) => bail!("--encoding cannot be used together with --binary"),
            (true, None) => Ok(FileMode::Binary),
            (false, encoding) => Ok(FileMode::Text(encoding.unwrap_or(Encoding::Utf8))),
        }
    }
}

#[derive(Serialize)]
struct CompareOutput {
    kind: ArtifactKind,
    obtained: String,
    baseline: String,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
}

/// Run the comparator for `kind` on the two files.
pub fn compare(
    kind: ArtifactKind,
    obtained: &Path,
    baseline: &Path,
    args: &CompareArgs,
    config: &Config,
) -> Result<Comparison> {
    for path in [obtained, baseline] {
        if !path.is_file() {
            bail!("{} does not exist", path.display());
        }
    }
    log::debug!("Comparing {} against {} as {kind:?}", obtained.display(), baseline.display());

    let comparison = match kind {
        ArtifactKind::Data => mapping::compare_files(obtained, baseline)?,
        ArtifactKind::Table => {
            let tolerances = Tolerances::new(args.tolerance(config.table_tolerance())?);
            tabular::compare_files(obtained, baseline, &tolerances)?
        }
        ArtifactKind::Array => {
            let tolerances = Tolerances::new(args.tolerance(config.array_tolerance())?);
            ndarray::compare_files(obtained, baseline, &tolerances)?
        }
        ArtifactKind::File => file::compare_files(obtained, baseline, args.file_mode()?)?,
        ArtifactKind::Value => {
            sequence::compare_files(obtained, baseline, args.tolerance(config.value_tolerance())?)?
        }
    };
    Ok(comparison)
}

/// Run the compare command. Returns whether the files matched.
pub fn run(
    output: &Output,
    kind: ArtifactKind,
    obtained: PathBuf,
    baseline: PathBuf,
    args: &CompareArgs,
    config: &Config,
) -> Result<bool> {
    let comparison = compare(kind, &obtained, &baseline, args, config)?;
    let matched = comparison.is_match();

    if output.is_json() {
        output.json(&CompareOutput {
            kind,
            obtained: obtained.display().to_string(),
            baseline: baseline.display().to_string(),
            matched,
            report: comparison.report().map(str::to_string),
        })?;
    } else if let Some(report) = comparison.report() {
        output.println(&format!(
            "{} differs from {}:\n{report}",
            obtained.display(),
            baseline.display()
        ));
    } else {
        output.println("Files match");
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::write_file;

    #[test]
    fn data_mismatch_reports_value_diff() {
        let tmp = tempfile::tempdir().unwrap();
        let (o, b) = (tmp.path().join("o.json"), tmp.path().join("b.json"));
        write_file(&o, r#"{"a": 1, "b": 2}"#);
        write_file(&b, r#"{"a": 1, "b": 3}"#);

        let config = Config::default();
        let result = compare(ArtifactKind::Data, &o, &b, &CompareArgs::default(), &config).unwrap();
        assert!(result.report().unwrap().contains("b"));
        assert!(compare(ArtifactKind::Data, &o, &o, &CompareArgs::default(), &Config::default())
            .unwrap()
            .is_match());
    }

    #[test]
    fn command_line_tolerance_overrides_config() {
        let tmp = tempfile::tempdir().unwrap();
        let (o, b) = (tmp.path().join("o.json"), tmp.path().join("b.json"));
        write_file(&o, "[1.0, 2.05]");
        write_file(&b, "[1.0, 2.0]");

        let config = Config::default();
        let strict =
            compare(ArtifactKind::Value, &o, &b, &CompareArgs::default(), &config).unwrap();
        assert!(!strict.is_match());

        let loose = CompareArgs {
            atol: Some(0.1),
            ..CompareArgs::default()
        };
        assert!(compare(ArtifactKind::Value, &o, &b, &loose, &config).unwrap().is_match());
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let o = tmp.path().join("o.json");
        write_file(&o, "[1.0]");
        let args = CompareArgs {
            rtol: Some(-1.0),
            ..CompareArgs::default()
        };
        assert!(compare(ArtifactKind::Value, &o, &o, &args, &Config::default()).is_err());
    }

    #[test]
    fn binary_and_encoding_conflict() {
        let args = CompareArgs {
            binary: true,
            encoding: Some(Encoding::Latin1),
            ..CompareArgs::default()
        };
        assert!(args.file_mode().is_err());
        assert_eq!(CompareArgs::default().file_mode().unwrap(), FileMode::Text(Encoding::Utf8));
    }

    #[test]
    fn text_files_show_a_diff() {
        let tmp = tempfile::tempdir().unwrap();
        let (o, b) = (tmp.path().join("o.txt"), tmp.path().join("b.txt"));
        write_file(&o, "alpha\nbeta\n");
        write_file(&b, "alpha\ngamma\n");
        let config = Config::default();
        let result = compare(ArtifactKind::File, &o, &b, &CompareArgs::default(), &config).unwrap();
        let report = result.report().unwrap();
        assert!(report.contains("-gamma"));
        assert!(report.contains("+beta"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let o = tmp.path().join("o.json");
        write_file(&o, "{}");
        let err = compare(
            ArtifactKind::Data,
            &o,
            &tmp.path().join("missing.json"),
            &CompareArgs::default(),
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
