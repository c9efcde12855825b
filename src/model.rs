//! In-memory, format-neutral configuration model.
//!
//! [`ConfigModel`] is an ordered mapping from section name to an ordered
//! mapping from key to an ordered list of string values. Flat formats store
//! everything under the single implicit section `""`; sectioned formats use
//! one section per header. Keys may carry more than one value (repeated
//! `key=value` lines), and insertion order is preserved everywhere so a
//! read/write round trip keeps the file layout stable.
//!
//! The model is Vec-backed rather than map-backed: configuration files are
//! small, order matters more than lookup speed, and linear scans keep the
//! structure trivially cloneable for merge folding.

/// One key and its ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValues {
    key: String,
    values: Vec<String>,
}

impl KeyValues {
    /// The key name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All values for this key, in file order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// One named section: an ordered list of keys with their values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    name: String,
    entries: Vec<KeyValues>,
}

impl Section {
    /// The section name (`""` for the implicit flat section).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyValues> {
        self.entries.iter()
    }

    /// Whether the section holds no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the given key exists in this section.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// All values for `key`, or `None` if the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.values.as_slice())
    }

    /// The first value for `key`, if any.
    #[must_use]
    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Mutable access to the value list for `key`.
    pub fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key)
            .map(|e| &mut e.values)
    }

    /// Append a value to `key`, creating the key at the end of the section
    /// if it does not exist yet.
    pub fn push_value(&mut self, key: &str, value: impl Into<String>) {
        if let Some(idx) = self.entries.iter().position(|e| e.key == key) {
            self.entries[idx].values.push(value.into());
        } else {
            self.entries.push(KeyValues {
                key: key.to_string(),
                values: vec![value.into()],
            });
        }
    }

    /// Replace all values for `key`, creating the key at the end of the
    /// section if it does not exist yet. An empty `values` removes the key.
    pub fn set_values(&mut self, key: &str, values: Vec<String>) {
        if values.is_empty() {
            self.remove_key(key);
        } else if let Some(idx) = self.entries.iter().position(|e| e.key == key) {
            self.entries[idx].values = values;
        } else {
            self.entries.push(KeyValues {
                key: key.to_string(),
                values,
            });
        }
    }

    /// Remove `key` and all its values. Returns whether the key existed.
    pub fn remove_key(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        before != self.entries.len()
    }

    /// Drop any keys whose value list has become empty.
    pub(crate) fn prune_empty_keys(&mut self) {
        self.entries.retain(|e| !e.values.is_empty());
    }
}

/// One snapshot of exactly one config source at a point in time.
///
/// Created fresh per merge invocation, mutated in place during the
/// structural patch and instruction application, and discarded after
/// writing. Never shared between concurrently-running merges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigModel {
    sections: Vec<Section>,
}

impl ConfigModel {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the model holds no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterate over sections in file order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Look up a section by name.
    #[must_use]
    pub fn get_section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Mutable lookup of a section by name.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Return the section named `name`, creating it at the end of the model
    /// if it does not exist yet.
    pub fn ensure_section(&mut self, name: &str) -> &mut Section {
        if let Some(idx) = self.sections.iter().position(|s| s.name == name) {
            &mut self.sections[idx]
        } else {
            self.sections.push(Section {
                name: name.to_string(),
                entries: Vec::new(),
            });
            self.sections
                .last_mut()
                .unwrap_or_else(|| unreachable!("section was just pushed"))
        }
    }

    /// Remove a section and everything in it. Returns whether it existed.
    pub fn remove_section(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != name);
        before != self.sections.len()
    }
}
