//! The two-phase merge: structural patch, then entry application.
//!
//! Phase one ([`structural_patch`]) folds an old configuration into a new
//! one wholesale, governed by [`PatchFlags`]. Phase two ([`apply_entries`])
//! runs the typed [`ConfigEntry`] instructions against the patched model.
//! Entries always run after the structural patch, so an explicit instruction
//! overrides whatever the patch preserved.
//!
//! Everything here works on in-memory [`ConfigModel`]s; file handling stays
//! with the caller.

use crate::entry::{ConfigEntry, LookupType, Operation};
use crate::error::MergeError;
use crate::model::ConfigModel;

/// Substitutes variables inside preserved values, e.g. `${app.home}`.
pub type VariableResolver = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Knobs for the structural patch phase.
#[derive(Debug, Clone, Copy)]
pub struct PatchFlags {
    /// Copy keys that exist only in the old configuration into the new one.
    pub preserve_entries: bool,
    /// Overwrite values of keys present in both with the old values.
    pub preserve_values: bool,
    /// Run preserved old values through the variable resolver.
    pub resolve_variables: bool,
}

impl Default for PatchFlags {
    fn default() -> Self {
        Self {
            preserve_entries: true,
            preserve_values: true,
            resolve_variables: false,
        }
    }
}

/// Fold the old configuration into the new one.
///
/// For every key of every old section: when the new model also has the key
/// and `preserve_values` is set, the old values overwrite the new ones in
/// place; when the new model lacks the key and `preserve_entries` is set,
/// the key is appended (creating the section if needed). Keys only in the
/// new model are never touched, so with both flags clear this is a no-op.
pub fn structural_patch(
    old: &ConfigModel,
    new: &mut ConfigModel,
    flags: &PatchFlags,
    resolver: Option<&VariableResolver>,
) {
    if !flags.preserve_entries && !flags.preserve_values {
        return;
    }
    for old_section in old.sections() {
        for entry in old_section.keys() {
            let values: Vec<String> = entry
                .values()
                .iter()
                .map(|v| resolve(v, flags, resolver))
                .collect();
            let present = new
                .get_section(old_section.name())
                .is_some_and(|s| s.contains_key(entry.key()));
            if present && flags.preserve_values {
                tracing::debug!(
                    section = old_section.name(),
                    key = entry.key(),
                    "preserving old values"
                );
                new.ensure_section(old_section.name())
                    .set_values(entry.key(), values);
            } else if !present && flags.preserve_entries {
                tracing::debug!(
                    section = old_section.name(),
                    key = entry.key(),
                    "preserving old entry"
                );
                new.ensure_section(old_section.name())
                    .set_values(entry.key(), values);
            }
        }
    }
}

/// Apply every entry to `target`, in order.
///
/// `source` is the old configuration; `Keep` entries copy from it and the
/// value calculation of the remaining operations consults it implicitly via
/// the values already present in `target`.
///
/// # Errors
///
/// Returns [`MergeError::Entry`] when an entry fails validation.
///
/// # Panics
///
/// A `Keep` entry with no old configuration to copy from is a caller bug
/// and panics; it is never downgraded to a recoverable error.
pub fn apply_entries(
    entries: &[ConfigEntry],
    source: Option<&ConfigModel>,
    target: &mut ConfigModel,
    flags: &PatchFlags,
    resolver: Option<&VariableResolver>,
) -> Result<(), MergeError> {
    for entry in entries {
        entry.validate()?;
        match entry.operation() {
            Operation::Remove => remove_entry(entry, target),
            Operation::Keep => {
                let source = source.unwrap_or_else(|| {
                    panic!(
                        "keep entry for key '{}' requires an old configuration",
                        entry.key()
                    )
                });
                keep_entry(entry, source, target, flags, resolver);
            }
            Operation::Set | Operation::Increment | Operation::Decrement => {
                set_entry(entry, target);
            }
        }
    }
    Ok(())
}

/// How an entry selects existing values of its key.
enum ValueMatcher {
    /// No lookup requested: every value of the key.
    All,
    /// Exact equality with the entry value.
    Plain(String),
    /// Full-string regex match against the entry value.
    Regex(regex::Regex),
}

impl ValueMatcher {
    /// Build the matcher for a validated entry. Lookup entries without a
    /// value degrade to matching everything.
    fn for_entry(entry: &ConfigEntry) -> Self {
        match (entry.lookup(), entry.value()) {
            (Some(LookupType::Plain), Some(value)) => Self::Plain(value.to_string()),
            (Some(LookupType::Regex), Some(value)) => {
                // Anchored: the pattern must match the whole value.
                match regex::Regex::new(&format!("^(?:{value})$")) {
                    Ok(re) => Self::Regex(re),
                    // validate() compiled the raw pattern already.
                    Err(_) => Self::Plain(value.to_string()),
                }
            }
            _ => Self::All,
        }
    }

    /// Like [`Self::for_entry`], but a plain entry value doubles as the
    /// lookup needle. Used by `Remove` and `Keep`, where the value is never
    /// a replacement.
    fn for_lookup(entry: &ConfigEntry) -> Self {
        match entry.value() {
            None => Self::All,
            Some(value) => match entry.lookup() {
                Some(LookupType::Regex) => match regex::Regex::new(&format!("^(?:{value})$")) {
                    Ok(re) => Self::Regex(re),
                    Err(_) => Self::Plain(value.to_string()),
                },
                _ => Self::Plain(value.to_string()),
            },
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Plain(needle) => value == needle,
            Self::Regex(re) => re.is_match(value),
        }
    }

    /// Indices of the matching values, in order.
    fn matched_indices(&self, values: &[String]) -> Vec<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| self.matches(v))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Delete the key, or only its matching values.
fn remove_entry(entry: &ConfigEntry, target: &mut ConfigModel) {
    let section_name = entry.section().unwrap_or("");
    let Some(section) = target.section_mut(section_name) else {
        return;
    };
    if entry.value().is_none() {
        tracing::debug!(section = section_name, key = entry.key(), "removing key");
        section.remove_key(entry.key());
        return;
    }
    let matcher = ValueMatcher::for_lookup(entry);
    if let Some(values) = section.values_mut(entry.key()) {
        values.retain(|v| !matcher.matches(v));
    }
    section.prune_empty_keys();
}

/// Carry values for the key over from the old configuration.
///
/// Without a value the whole key is mirrored: the target's values are
/// replaced by the source's, and the key disappears when the source lacks
/// it. With a value the copy is scoped to matching values and keeps the
/// target positions stable: matched source values overwrite matched target
/// slots pairwise, surplus source values are appended, surplus target
/// matches are removed. No matching source value means no change.
fn keep_entry(
    entry: &ConfigEntry,
    source: &ConfigModel,
    target: &mut ConfigModel,
    flags: &PatchFlags,
    resolver: Option<&VariableResolver>,
) {
    let section_name = entry.section().unwrap_or("");
    let source_values: Vec<String> = source
        .get_section(section_name)
        .and_then(|s| s.get(entry.key()))
        .unwrap_or(&[])
        .iter()
        .map(|v| resolve(v, flags, resolver))
        .collect();

    if entry.value().is_none() {
        tracing::debug!(section = section_name, key = entry.key(), "keeping key");
        target
            .ensure_section(section_name)
            .set_values(entry.key(), source_values);
        return;
    }

    let matcher = ValueMatcher::for_lookup(entry);
    let matched_source: Vec<&String> = source_values.iter().filter(|v| matcher.matches(v)).collect();
    if matched_source.is_empty() {
        return;
    }
    let section = target.ensure_section(section_name);
    if !section.contains_key(entry.key()) {
        section.set_values(
            entry.key(),
            matched_source.into_iter().cloned().collect(),
        );
        return;
    }
    let Some(values) = section.values_mut(entry.key()) else {
        return;
    };
    let matched_target = matcher.matched_indices(values);
    let paired = matched_source.len().min(matched_target.len());
    for (slot, value) in matched_target.iter().zip(&matched_source) {
        values[*slot] = (*value).clone();
    }
    for value in &matched_source[paired..] {
        values.push((*value).clone());
    }
    // Surplus target matches go, highest index first.
    for slot in matched_target[paired..].iter().rev() {
        values.remove(*slot);
    }
    section.prune_empty_keys();
}

/// Set, increment, or decrement the key's values.
fn set_entry(entry: &ConfigEntry, target: &mut ConfigModel) {
    let section_name = entry.section().unwrap_or("");
    let section = target.ensure_section(section_name);
    let matcher = ValueMatcher::for_entry(entry);
    let matched = section
        .get(entry.key())
        .map(|values| {
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| matcher.matches(v))
                .map(|(i, v)| (i, entry.calculate_value(Some(v))))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if matched.is_empty() {
        let value = entry.calculate_value(None);
        tracing::debug!(
            section = section_name,
            key = entry.key(),
            value = %value,
            "adding entry"
        );
        section.push_value(entry.key(), value);
        return;
    }
    if let Some(values) = section.values_mut(entry.key()) {
        for (slot, value) in matched {
            values[slot] = value;
        }
    }
}

/// Apply the variable resolver to a preserved value when enabled.
fn resolve(value: &str, flags: &PatchFlags, resolver: Option<&VariableResolver>) -> String {
    match resolver {
        Some(resolver) if flags.resolve_variables => resolver(value),
        _ => value.to_string(),
    }
}
