//! Windows Registry Editor export format (`.reg`).
//!
//! Sections are full key paths; value names are quoted (`@` for the key's
//! default value); value data is kept verbatim (`"string"`, `dword:…`,
//! `hex:…` with `\` line continuations). Files start with a fixed version
//! header, use CRLF line endings, and are written UTF-16LE with a BOM —
//! the encoding `reg.exe` itself exports. Reading BOM-sniffs UTF-16LE and
//! falls back to UTF-8.

use std::io::Write;
use std::path::Path;

use crate::error::MergeError;
use crate::model::ConfigModel;

use super::{FormatOptions, parse_section_header};

/// Version header required on every registry export file.
pub(super) const VERSION_HEADER: &str = "Windows Registry Editor Version 5.00";

pub(super) fn read(path: &Path, opts: &FormatOptions) -> Result<ConfigModel, MergeError> {
    let bytes =
        std::fs::read(path).map_err(|e| MergeError::io(path, "reading registry file", e))?;
    let content = decode(&bytes).ok_or_else(|| MergeError::Parse {
        path: path.to_path_buf(),
        line: 1,
        message: "undecodable file encoding".to_string(),
    })?;
    parse(&content, path, opts)
}

pub(super) fn parse(
    content: &str,
    path: &Path,
    _opts: &FormatOptions,
) -> Result<ConfigModel, MergeError> {
    let parse_err = |line: usize, message: &str| MergeError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    };

    let mut lines = content.lines().enumerate();
    let header = lines
        .by_ref()
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| parse_err(1, "missing version header"))?;
    if header.1.trim() != VERSION_HEADER {
        return Err(parse_err(header.0 + 1, "unsupported version header"));
    }

    let mut model = ConfigModel::new();
    let mut current: Option<String> = None;
    let mut pending: Option<(usize, String)> = None;

    for (line_num, raw) in lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        // Hex data wraps with a trailing backslash; splice before parsing.
        if let Some((start, joined)) = pending.take() {
            let mut joined = joined;
            joined.push_str(line);
            if let Some(head) = joined.strip_suffix('\\') {
                pending = Some((start, head.trim_end().to_string()));
            } else {
                parse_value_line(&mut model, current.as_deref(), &joined)
                    .map_err(|m| parse_err(start, m))?;
            }
            continue;
        }

        if let Some(header) = parse_section_header(line) {
            if header.is_empty() {
                return Err(parse_err(line_num + 1, "empty key path"));
            }
            model.ensure_section(&header);
            current = Some(header);
        } else if let Some(head) = line.strip_suffix('\\') {
            pending = Some((line_num + 1, head.trim_end().to_string()));
        } else {
            parse_value_line(&mut model, current.as_deref(), line)
                .map_err(|m| parse_err(line_num + 1, m))?;
        }
    }
    if let Some((start, _)) = pending {
        return Err(parse_err(start, "unterminated line continuation"));
    }
    Ok(model)
}

/// Parse one `"name"=data` (or `@=data`) line into `model`.
fn parse_value_line(
    model: &mut ConfigModel,
    section: Option<&str>,
    line: &str,
) -> Result<(), &'static str> {
    let section = section.ok_or("value outside of a key path")?;
    let (name, data) = if let Some(rest) = line.strip_prefix('@') {
        let data = rest.strip_prefix('=').ok_or("expected '=' after '@'")?;
        ("@".to_string(), data)
    } else {
        let (name, rest) = split_quoted_name(line)?;
        let data = rest.strip_prefix('=').ok_or("expected '=' after value name")?;
        (name, data)
    };
    model.ensure_section(section).push_value(&name, data.trim());
    Ok(())
}

/// Split a leading quoted value name off `line`, unescaping `\\` and `\"`.
fn split_quoted_name(line: &str) -> Result<(String, &str), &'static str> {
    let rest = line.strip_prefix('"').ok_or("expected quoted value name")?;
    let mut name = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => name.push(escaped),
                None => return Err("dangling escape in value name"),
            },
            '"' => return Ok((name, &rest[idx + 1..])),
            _ => name.push(c),
        }
    }
    Err("unterminated value name")
}

/// Re-escape a value name for output.
fn escape_name(name: &str) -> String {
    name.replace('\\', r"\\").replace('"', "\\\"")
}

pub(super) fn write_to(
    model: &ConfigModel,
    out: &mut dyn Write,
    _opts: &FormatOptions,
) -> std::io::Result<()> {
    let mut text = String::new();
    text.push_str(VERSION_HEADER);
    text.push_str("\r\n\r\n");
    for section in model.sections() {
        text.push('[');
        text.push_str(section.name());
        text.push_str("]\r\n");
        for entry in section.keys() {
            for value in entry.values() {
                if entry.key() == "@" {
                    text.push('@');
                } else {
                    text.push('"');
                    text.push_str(&escape_name(entry.key()));
                    text.push('"');
                }
                text.push('=');
                text.push_str(value);
                text.push_str("\r\n");
            }
        }
        text.push_str("\r\n");
    }
    out.write_all(&encode_utf16le(&text))
}

/// Decode a registry file, honouring a UTF-16LE or UTF-8 BOM.
pub(super) fn decode(bytes: &[u8]) -> Option<String> {
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        if body.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        String::from_utf8(body.to_vec()).ok()
    }
}

/// Encode text as UTF-16LE with a leading BOM.
fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}
