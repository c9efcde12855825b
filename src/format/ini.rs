//! Sectioned `[section]` profile files.
//!
//! Same line grammar as flat option files inside each section. Keys before
//! any header land in the implicit global section `""`, which is written
//! back headerless at the top of the file.

use std::io::Write;
use std::path::Path;

use crate::error::MergeError;
use crate::model::ConfigModel;

use super::{FormatOptions, is_skippable, parse_section_header, strip_inline_comment};

pub(super) fn read(path: &Path, opts: &FormatOptions) -> Result<ConfigModel, MergeError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MergeError::io(path, "reading profile file", e))?;
    parse(&content, path, opts)
}

pub(super) fn parse(
    content: &str,
    path: &Path,
    opts: &FormatOptions,
) -> Result<ConfigModel, MergeError> {
    let mut model = ConfigModel::new();
    let mut current = String::new();
    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if is_skippable(trimmed) {
            continue;
        }
        if let Some(header) = parse_section_header(trimmed) {
            if header.is_empty() {
                return Err(MergeError::Parse {
                    path: path.to_path_buf(),
                    line: line_num + 1,
                    message: "empty section header".to_string(),
                });
            }
            model.ensure_section(&header);
            current = header;
        } else {
            let (key, value) = match trimmed.split_once(opts.operator.as_str()) {
                Some((key, value)) => (key.trim_end(), strip_inline_comment(value.trim_start())),
                None => (trimmed, ""),
            };
            model.ensure_section(&current).push_value(key, value);
        }
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
    let mut first = opts.header_comment.is_none();
    for section in model.sections() {
        if !first {
            writeln!(out)?;
        }
        first = false;
        if !section.name().is_empty() {
            writeln!(out, "[{}]", section.name())?;
        }
        for entry in section.keys() {
            for value in entry.values() {
                writeln!(out, "{}{}{}", entry.key(), opts.operator, value)?;
            }
        }
    }
    Ok(())
}
