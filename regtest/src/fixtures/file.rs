//! Raw file snapshots: decoded text compared line by line, or bytes compared exactly.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use fs_err as fs;

use crate::error::{RegressError, Result};
use crate::lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
use crate::textdiff::{side_by_side, unified_diff, CONTEXT_LINES};
use crate::verdict::Verdict;

pub const DEFAULT_EXTENSION: &str = ".txt";

/// Diffs longer than this are summarized by their line count.
pub const MAX_DIFF_LINES: usize = 500;

/// Content handed to [`FileRegression::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Text(String),
    Binary(Vec<u8>),
}

impl From<&str> for FileContents {
    fn from(s: &str) -> Self {
        FileContents::Text(s.to_string())
    }
}

impl From<String> for FileContents {
    fn from(s: String) -> Self {
        FileContents::Text(s)
    }
}

impl From<Vec<u8>> for FileContents {
    fn from(b: Vec<u8>) -> Self {
        FileContents::Binary(b)
    }
}

impl From<&[u8]> for FileContents {
    fn from(b: &[u8]) -> Self {
        FileContents::Binary(b.to_vec())
    }
}

/// Text encodings supported for text artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16-le",
            Encoding::Utf16Be => "utf-16-be",
            Encoding::Latin1 => "latin-1",
        }
    }

    pub fn encode(self, text: &str) -> std::result::Result<Vec<u8>, String> {
        Ok(match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        format!("character {c:?} cannot be encoded as {}", self.name())
                    })
                })
                .collect::<std::result::Result<_, _>>()?,
        })
    }

    pub fn decode(self, bytes: &[u8]) -> std::result::Result<String, String> {
        let utf16 = |to_unit: fn([u8; 2]) -> u16| {
            if bytes.len() % 2 != 0 {
                return Err(format!("odd byte count for {}", self.name()));
            }
            let units = bytes.chunks_exact(2).map(|c| to_unit([c[0], c[1]]));
            char::decode_utf16(units)
                .collect::<std::result::Result<String, _>>()
                .map_err(|e| e.to_string())
        };
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            Encoding::Utf16Le => utf16(u16::from_le_bytes),
            Encoding::Utf16Be => utf16(u16::from_be_bytes),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl FromStr for Encoding {
    type Err = RegressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-16-le" | "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16-be" | "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(RegressError::validation(
                "encoding",
                format!("unsupported encoding '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Line terminator written in place of `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
    Cr,
}

impl Newline {
    fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
            Newline::Cr => "\r",
        }
    }
}

/// Options for [`FileRegression::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    pub check: CheckOptions,
    /// Extension of the artifact, including the dot.
    pub extension: String,
    /// Text encoding; UTF-8 when unset. Not allowed in binary mode.
    pub encoding: Option<Encoding>,
    /// Translate `\n` on write; content is written as-is when unset.
    pub newline: Option<Newline>,
    pub binary: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            check: CheckOptions::default(),
            extension: DEFAULT_EXTENSION.to_string(),
            encoding: None,
            newline: None,
            binary: false,
        }
    }
}

impl FileOptions {
    pub fn with_check(mut self, check: CheckOptions) -> Self {
        self.check = check;
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn newline(mut self, newline: Newline) -> Self {
        self.newline = Some(newline);
        self
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// How persisted files are compared.
    pub fn mode(&self) -> FileMode {
        if self.binary {
            FileMode::Binary
        } else {
            FileMode::Text(self.encoding.unwrap_or_default())
        }
    }
}

/// Comparison mode of a file artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Binary,
    Text(Encoding),
}

#[derive(Debug, Clone, Copy)]
pub struct FileRegression<'a> {
    context: &'a RegressionContext,
}

impl<'a> FileRegression<'a> {
    pub fn new(context: &'a RegressionContext) -> Self {
        Self { context }
    }

    pub fn check(
        &self,
        contents: impl Into<FileContents>,
        options: &FileOptions,
    ) -> Result<Verdict> {
        let bytes = encode_contents(contents.into(), options)?;
        let artifact = FileArtifact {
            bytes,
            mode: options.mode(),
        };
        self.context
            .perform(&artifact, &options.extension, &options.check)
    }
}

/// Validate the contents against the options and produce the bytes to write.
fn encode_contents(contents: FileContents, options: &FileOptions) -> Result<Vec<u8>> {
    if let (true, Some(encoding)) = (options.binary, options.encoding) {
        return Err(RegressError::validation(
            "encoding",
            format!("cannot combine binary mode with encoding {encoding}"),
        ));
    }
    match (contents, options.binary) {
        (FileContents::Binary(bytes), true) => Ok(bytes),
        (FileContents::Text(_), true) => Err(RegressError::validation(
            "contents",
            "expected bytes contents but received text",
        )),
        (FileContents::Binary(_), false) => Err(RegressError::validation(
            "contents",
            "expected text contents but received bytes",
        )),
        (FileContents::Text(text), false) => {
            let text = match options.newline {
                Some(newline) if newline != Newline::Lf => text.replace('\n', newline.as_str()),
                _ => text,
            };
            let encoding = options.encoding.unwrap_or_default();
            encoding
                .encode(&text)
                .map_err(|e| RegressError::validation("contents", e))
        }
    }
}

struct FileArtifact {
    bytes: Vec<u8>,
    mode: FileMode,
}

impl Artifact for FileArtifact {
    fn dump(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison> {
        compare_files(obtained, baseline, self.mode)
    }
}

/// Split on `\r\n`, `\n` or `\r`; a trailing terminator adds no empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Line-exact comparison of two texts; `None` when equal.
pub fn diff_texts(
    obtained: &str,
    baseline: &str,
    obtained_name: &str,
    baseline_name: &str,
) -> Option<String> {
    let (o, b) = (split_lines(obtained), split_lines(baseline));
    if o == b {
        return None;
    }
    let diff_lines = unified_diff(&b, &o, baseline_name, obtained_name, CONTEXT_LINES);
    let mut report = format!("Files Differ: {obtained_name} and {baseline_name}\n\n");
    if diff_lines.len() <= MAX_DIFF_LINES {
        report.push_str(&diff_lines.join("\n"));
        report.push_str("\n\n");
        report.push_str(&side_by_side(&b, &o, baseline_name, obtained_name));
    } else {
        report.push_str(&format!("Files diff is too big ({} lines).", diff_lines.len()));
    }
    Some(report)
}

fn read_text(path: &Path, encoding: Encoding) -> Result<String> {
    let bytes = fs::read(path)?;
    encoding
        .decode(&bytes)
        .map_err(|e| RegressError::corrupt(path, e))
}

pub fn compare_files(obtained: &Path, baseline: &Path, mode: FileMode) -> Result<Comparison> {
    match mode {
        FileMode::Binary => {
            let same = fs::read(obtained)? == fs::read(baseline)?;
            Ok(if same {
                Comparison::Match
            } else {
                Comparison::Mismatch(format!(
                    "Binary files {} and {} differ.",
                    obtained.display(),
                    baseline.display()
                ))
            })
        }
        FileMode::Text(encoding) => {
            let (o, b) = (read_text(obtained, encoding)?, read_text(baseline, encoding)?);
            let report = diff_texts(
                &o,
                &b,
                &obtained.display().to_string(),
                &baseline.display().to_string(),
            );
            Ok(report.map_or(Comparison::Match, Comparison::Mismatch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_context;

    #[test]
    fn split_lines_handles_all_terminators() {
        assert_eq!(split_lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn text_check_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_file");
        let facade = FileRegression::new(&ctx);
        let options = FileOptions::default().extension(".md");

        assert!(facade.check("line 1\nline 2\n", &options).unwrap().is_abort());
        facade.check("line 1\nline 2\n", &options).unwrap().assert_pass();

        let verdict = facade.check("line 1\nline two\n", &options).unwrap();
        let message = verdict.message().unwrap();
        assert!(verdict.is_hard_fail());
        assert!(message.starts_with("Files Differ:"));
        assert!(message.contains("-line 2"));
        assert!(message.contains("+line two"));
    }

    #[test]
    fn newline_translation_does_not_change_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_newline");
        let facade = FileRegression::new(&ctx);
        let crlf = FileOptions::default().newline(Newline::CrLf);

        facade.check("a\nb\n", &crlf).unwrap();
        let baseline = ctx.baseline_path(&crlf.check, DEFAULT_EXTENSION);
        assert_eq!(fs::read(&baseline).unwrap(), b"a\r\nb\r\n");
        facade.check("a\nb\n", &FileOptions::default()).unwrap().assert_pass();
    }

    #[test]
    fn binary_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_binary");
        let facade = FileRegression::new(&ctx);
        let options = FileOptions::default().extension(".bin").binary();

        facade.check(vec![0u8, 1, 2], &options).unwrap();
        facade.check(vec![0u8, 1, 2], &options).unwrap().assert_pass();
        let verdict = facade.check(vec![0u8, 1, 3], &options).unwrap();
        assert!(verdict.message().unwrap().starts_with("Binary files"));
    }

    #[test]
    fn invalid_option_combinations_fail_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_invalid");
        let facade = FileRegression::new(&ctx);

        let both = FileOptions::default().binary().encoding(Encoding::Latin1);
        assert!(facade.check(vec![1u8], &both).unwrap_err().is_validation());
        assert!(facade
            .check("text", &FileOptions::default().binary())
            .unwrap_err()
            .is_validation());
        assert!(facade
            .check(vec![1u8], &FileOptions::default())
            .unwrap_err()
            .is_validation());
        assert!(facade
            .check("\u{20ac}", &FileOptions::default().encoding(Encoding::Latin1))
            .unwrap_err()
            .is_validation());
        assert!(!tmp.path().join("baseline").exists());
    }

    #[test]
    fn encodings_round_trip() {
        for encoding in [Encoding::Utf8, Encoding::Utf16Le, Encoding::Utf16Be, Encoding::Latin1] {
            let bytes = encoding.encode("caf\u{e9}\n").unwrap();
            assert_eq!(encoding.decode(&bytes).unwrap(), "caf\u{e9}\n");
        }
        assert_eq!(Encoding::Utf16Le.encode("a").unwrap(), vec![b'a', 0]);
        assert!(Encoding::Utf16Le.decode(&[0]).is_err());
        assert_eq!("UTF_16LE".parse::<Encoding>().unwrap(), Encoding::Utf16Le);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    #[test]
    fn oversized_diffs_are_summarized() {
        let baseline: String = (0..600).map(|i| format!("{i}\n")).collect();
        let obtained: String = (0..600).map(|i| format!("x{i}\n")).collect();
        let report = diff_texts(&obtained, &baseline, "o", "b").unwrap();
        assert!(report.contains("Files diff is too big (1203 lines)."));
    }

    #[test]
    fn undecodable_artifact_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.baseline.txt");
        fs::write(&path, [0xffu8, 0xfe, 0xfd]).unwrap();
        let err = compare_files(&path, &path, FileMode::Text(Encoding::Utf8)).unwrap_err();
        assert!(err.is_corrupt_artifact());
    }
}
