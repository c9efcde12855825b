//! Per-format read/write adapters over the neutral [`ConfigModel`].
//!
//! [`Format`] is a tagged adapter: the variant selects the wire syntax and
//! exposes explicit capability flags, so callers branch on data instead of
//! downcasting or probing. Formatting behaviour is carried by an immutable
//! [`FormatOptions`] passed to every call — there is no ambient global
//! formatting state, and distinct merges never share mutable options.
//!
//! Writing goes through `write_to(&mut dyn Write)`: the adapter only
//! serializes, and the caller (normally the [atomic writer](crate::atomic))
//! owns file handling, so a failure mid-serialize can never corrupt a
//! destination.

mod ini;
mod options;
mod reg;

use std::io::Write;
use std::path::Path;

use crate::error::MergeError;
use crate::model::ConfigModel;

/// Immutable formatting options, passed explicitly per call.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Separator between key and value (`=` by default): written on
    /// output and split on during reads, so a round trip with a custom
    /// operator is stable. Ignored by the registry format, whose grammar
    /// is fixed.
    pub operator: String,
    /// Optional comment emitted at the top of the file.
    pub header_comment: Option<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            operator: "=".to_string(),
            header_comment: None,
        }
    }
}

/// The supported config file syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Flat `key=value` option files. Single implicit section `""`.
    Options,
    /// Sectioned `[section]` profile files.
    Ini,
    /// Windows Registry Editor export files (`.reg`).
    Reg,
}

impl Format {
    /// Whether the syntax has named sections ([`Format::Options`] does not).
    #[must_use]
    pub const fn supports_sections(self) -> bool {
        matches!(self, Self::Ini | Self::Reg)
    }

    /// Whether files of this format start with a fixed version header.
    #[must_use]
    pub const fn carries_version_header(self) -> bool {
        matches!(self, Self::Reg)
    }

    /// Parse `path` into a model. A missing file yields an empty model.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Io`] when the file cannot be read and
    /// [`MergeError::Parse`] on a syntax error.
    pub fn read(self, path: &Path, opts: &FormatOptions) -> Result<ConfigModel, MergeError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent, starting empty");
            return Ok(ConfigModel::new());
        }
        tracing::debug!(path = %path.display(), format = ?self, "loading config file");
        match self {
            Self::Options => options::read(path, opts),
            Self::Ini => ini::read(path, opts),
            Self::Reg => reg::read(path, opts),
        }
    }

    /// Parse in-memory content (reg content must include its header).
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Parse`] on a syntax error; `path` is used only
    /// for error context.
    pub fn parse(
        self,
        content: &str,
        path: &Path,
        opts: &FormatOptions,
    ) -> Result<ConfigModel, MergeError> {
        match self {
            Self::Options => options::parse(content, path, opts),
            Self::Ini => ini::parse(content, path, opts),
            Self::Reg => reg::parse(content, path, opts),
        }
    }

    /// Serialize `model` to `out`.
    ///
    /// # Errors
    ///
    /// Propagates any [`std::io::Error`] from the writer.
    pub fn write_to(
        self,
        model: &ConfigModel,
        out: &mut dyn Write,
        opts: &FormatOptions,
    ) -> std::io::Result<()> {
        match self {
            Self::Options => options::write_to(model, out, opts),
            Self::Ini => ini::write_to(model, out, opts),
            Self::Reg => reg::write_to(model, out, opts),
        }
    }

    /// Serialize `model` to a string (reg output is decoded with its
    /// UTF-16 BOM stripped; intended for tests and diagnostics).
    ///
    /// # Errors
    ///
    /// Propagates serialization failures, which cannot occur for an
    /// in-memory writer.
    pub fn render(self, model: &ConfigModel, opts: &FormatOptions) -> std::io::Result<String> {
        let mut buf = Vec::new();
        self.write_to(model, &mut buf, opts)?;
        Ok(match self {
            Self::Reg => reg::decode(&buf).unwrap_or_default(),
            _ => String::from_utf8_lossy(&buf).into_owned(),
        })
    }
}

/// Strip an inline comment (`#` or `;` preceded by whitespace) from a value.
fn strip_inline_comment(value: &str) -> &str {
    let mut cut = value.len();
    for marker in [" #", "\t#", " ;", "\t;"] {
        if let Some(idx) = value.find(marker) {
            cut = cut.min(idx);
        }
    }
    value[..cut].trim_end()
}

/// Whether a trimmed line is blank or a whole-line comment.
fn is_skippable(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('!')
}

/// Parse a `[header]` line, preserving the header's original case.
fn parse_section_header(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner.trim().to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags() {
        assert!(!Format::Options.supports_sections());
        assert!(Format::Ini.supports_sections());
        assert!(Format::Reg.supports_sections());
        assert!(Format::Reg.carries_version_header());
        assert!(!Format::Ini.carries_version_header());
    }

    #[test]
    fn missing_file_reads_as_empty_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = Format::Options
            .read(&dir.path().join("absent.conf"), &FormatOptions::default())
            .unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn strip_inline_comment_variants() {
        assert_eq!(strip_inline_comment("value # note"), "value");
        assert_eq!(strip_inline_comment("value ; note"), "value");
        assert_eq!(strip_inline_comment("color#FF0000"), "color#FF0000");
        assert_eq!(strip_inline_comment("plain"), "plain");
    }

    #[test]
    fn section_header_preserves_case() {
        assert_eq!(
            parse_section_header(r"[HKEY_CURRENT_USER\Console]"),
            Some(r"HKEY_CURRENT_USER\Console".to_string())
        );
        assert_eq!(parse_section_header("key=value"), None);
    }
}
