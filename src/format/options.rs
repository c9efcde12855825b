//! Flat `key=value` option files.
//!
//! Ordered, keys may repeat. Everything lives in the implicit section `""`.
//! `#`, `;`, and `!` start whole-line comments; inline comments after a
//! value are stripped. A line without a separator is kept as a key with an
//! empty value so it survives a round trip.

use std::io::Write;
use std::path::Path;

use crate::error::MergeError;
use crate::model::ConfigModel;

use super::{FormatOptions, is_skippable, strip_inline_comment};

pub(super) fn read(path: &Path, opts: &FormatOptions) -> Result<ConfigModel, MergeError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MergeError::io(path, "reading option file", e))?;
    parse(&content, path, opts)
}

pub(super) fn parse(
    content: &str,
    path: &Path,
    opts: &FormatOptions,
) -> Result<ConfigModel, MergeError> {
    let mut model = ConfigModel::new();
    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if is_skippable(trimmed) {
            continue;
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            return Err(MergeError::Parse {
                path: path.to_path_buf(),
                line: line_num + 1,
                message: "section header in a flat option file".to_string(),
            });
        }
        let (key, value) = match trimmed.split_once(opts.operator.as_str()) {
            Some((key, value)) => (key.trim_end(), strip_inline_comment(value.trim_start())),
            None => (trimmed, ""),
        };
        model.ensure_section("").push_value(key, value);
    }
    Ok(model)
}

pub(super) fn write_to(
    model: &ConfigModel,
    out: &mut dyn Write,
    opts: &FormatOptions,
) -> std::io::Result<()> {
    if let Some(comment) = &opts.header_comment {
        for line in comment.lines() {
            writeln!(out, "# {line}")?;
        }
    }
    for section in model.sections() {
        for entry in section.keys() {
            for value in entry.values() {
                writeln!(out, "{}{}{}", entry.key(), opts.operator, value)?;
            }
        }
    }
    Ok(())
}
