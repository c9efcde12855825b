//! Typed edit instructions and their value arithmetic.
//!
//! A [`ConfigEntry`] is one change request against a config model: which
//! section/key it targets, what operation to perform, and how the new value
//! is computed from the old one. Entries are pure value objects — they are
//! built once, validated once via [`ConfigEntry::validate`] before any file
//! is touched, and never mutated afterwards. Deriving a variant (e.g.
//! prefixing a registry subkey path) goes through a pure function returning
//! a new entry, never through in-place mutation.

use chrono::{Local, Months, NaiveDateTime};

use crate::error::EntryError;

/// Default date pattern, chrono `strftime` syntax.
const DEFAULT_DATE_PATTERN: &str = "%Y/%m/%d %H:%M";

/// Literal that resolves to the current time in date entries.
const DATE_NOW: &str = "now";

/// The operation an entry performs on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// Replace the value (or insert it when absent).
    #[default]
    Set,
    /// String append, or numeric/date addition.
    Increment,
    /// Numeric/date subtraction. Invalid for strings.
    Decrement,
    /// Delete the key, or the matching values of the key.
    Remove,
    /// Carry matching values over from the old configuration.
    Keep,
}

impl Operation {
    /// Parse the declarative attribute form (`=`, `+`, `-`, `remove`, `keep`).
    #[must_use]
    pub fn from_attribute(attr: &str) -> Option<Self> {
        match attr {
            "=" => Some(Self::Set),
            "+" => Some(Self::Increment),
            "-" => Some(Self::Decrement),
            "remove" => Some(Self::Remove),
            "keep" => Some(Self::Keep),
            _ => None,
        }
    }
}

/// The datatype an entry value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Plain text. Increment concatenates.
    #[default]
    String,
    /// Signed decimal integer, optional zero-padding pattern.
    Integer,
    /// Calendar timestamp, chrono `strftime` pattern.
    Date,
}

impl ValueType {
    /// Parse the declarative attribute form (`string`, `int`, `date`).
    #[must_use]
    pub fn from_attribute(attr: &str) -> Option<Self> {
        match attr {
            "string" => Some(Self::String),
            "int" => Some(Self::Integer),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// How an entry's `value` matches existing values during lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupType {
    /// Exact string equality.
    #[default]
    Plain,
    /// Full-string regular-expression match.
    Regex,
}

impl LookupType {
    /// Parse the declarative attribute form (`plain`, `regexp`).
    #[must_use]
    pub fn from_attribute(attr: &str) -> Option<Self> {
        match attr {
            "plain" => Some(Self::Plain),
            "regexp" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// Calendar granularity for date increment/decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Milliseconds.
    Millisecond,
    /// Seconds.
    Second,
    /// Minutes.
    Minute,
    /// Hours.
    Hour,
    /// Days (the default).
    #[default]
    Day,
    /// Weeks (seven days).
    Week,
    /// Calendar months.
    Month,
    /// Calendar years.
    Year,
}

impl Unit {
    /// Parse the declarative attribute form.
    #[must_use]
    pub fn from_attribute(attr: &str) -> Option<Self> {
        match attr {
            "millisecond" => Some(Self::Millisecond),
            "second" => Some(Self::Second),
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// Step `base` by `offset` units, saturating at the calendar bounds.
    fn advance(self, base: NaiveDateTime, offset: i64) -> NaiveDateTime {
        let duration = match self {
            Self::Millisecond => chrono::Duration::milliseconds(offset),
            Self::Second => chrono::Duration::seconds(offset),
            Self::Minute => chrono::Duration::minutes(offset),
            Self::Hour => chrono::Duration::hours(offset),
            Self::Day => chrono::Duration::days(offset),
            Self::Week => chrono::Duration::weeks(offset),
            Self::Month => return advance_months(base, offset),
            Self::Year => return advance_months(base, offset.saturating_mul(12)),
        };
        base.checked_add_signed(duration).unwrap_or(base)
    }
}

/// Month-granularity stepping, in either direction.
fn advance_months(base: NaiveDateTime, offset: i64) -> NaiveDateTime {
    let magnitude = u32::try_from(offset.unsigned_abs().min(u64::from(u32::MAX)))
        .unwrap_or(u32::MAX);
    let months = Months::new(magnitude);
    let stepped = if offset >= 0 {
        base.checked_add_months(months)
    } else {
        base.checked_sub_months(months)
    };
    stepped.unwrap_or(base)
}

/// One typed change request against a config model.
///
/// # Examples
///
/// ```
/// use confmerge::{ConfigEntry, Operation, ValueType};
///
/// let entry = ConfigEntry::new("retries")
///     .with_value("5")
///     .with_value_type(ValueType::Integer)
///     .with_operation(Operation::Increment);
/// entry.validate().unwrap();
/// assert_eq!(entry.calculate_value(Some("10")), "15");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    section: Option<String>,
    key: String,
    value: Option<String>,
    value_type: ValueType,
    operation: Operation,
    lookup: Option<LookupType>,
    default: Option<String>,
    pattern: Option<String>,
    unit: Option<Unit>,
}

impl ConfigEntry {
    /// Create a `Set` entry for `key` with string type and no lookup.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            section: None,
            key: key.into(),
            value: None,
            value_type: ValueType::default(),
            operation: Operation::default(),
            lookup: None,
            default: None,
            pattern: None,
            unit: None,
        }
    }

    /// Target a named section (required for sectioned formats).
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// The replacement value, operand, or lookup pattern, depending on the
    /// operation and lookup type.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The datatype used for value arithmetic.
    #[must_use]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// The operation to perform.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Scope the entry to existing values matching `value` under the given
    /// lookup type. Without this, `value` is a literal replacement and the
    /// entry targets every value of the key.
    #[must_use]
    pub fn with_lookup(mut self, lookup: LookupType) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Value to use when the key is absent from the configuration.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Parse/format pattern for integer and date types.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Calendar granularity for date increment/decrement.
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// The section this entry targets, if any.
    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// The key this entry targets.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The configured value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The operation this entry performs.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The explicit lookup type, if value scoping was requested.
    #[must_use]
    pub fn lookup(&self) -> Option<LookupType> {
        self.lookup
    }

    /// Derive a copy of this entry with its section nested under `root`,
    /// for subkey merges against a registry destination key.
    ///
    /// ```
    /// use confmerge::ConfigEntry;
    ///
    /// let entry = ConfigEntry::new("Version").with_section("Settings");
    /// let nested = entry.with_section_root(r"HKLM\SOFTWARE\App");
    /// assert_eq!(nested.section(), Some(r"HKLM\SOFTWARE\App\Settings"));
    /// ```
    #[must_use]
    pub fn with_section_root(&self, root: &str) -> Self {
        let mut derived = self.clone();
        derived.section = Some(match &self.section {
            Some(section) => format!("{root}\\{section}"),
            None => root.to_string(),
        });
        derived
    }

    /// Check that the attribute combination is supportable.
    ///
    /// # Errors
    ///
    /// Returns an [`EntryError`] for any combination ruled out by the data
    /// model: decrement or pattern on strings, unit on non-dates, an empty
    /// key, `Set` without value or default, or an uncompilable regex lookup.
    pub fn validate(&self) -> Result<(), EntryError> {
        if self.key.is_empty() {
            return Err(EntryError::EmptyKey);
        }
        if self.value_type == ValueType::String && self.operation == Operation::Decrement {
            return Err(EntryError::DecrementString {
                key: self.key.clone(),
            });
        }
        if self.value_type == ValueType::String && self.pattern.is_some() {
            return Err(EntryError::PatternString {
                key: self.key.clone(),
            });
        }
        if self.unit.is_some() && self.value_type != ValueType::Date {
            return Err(EntryError::UnitWithoutDate {
                key: self.key.clone(),
            });
        }
        if self.value.is_none()
            && self.default.is_none()
            && self.operation == Operation::Set
        {
            return Err(EntryError::MissingValue {
                key: self.key.clone(),
            });
        }
        if self.lookup == Some(LookupType::Regex)
            && let Some(pattern) = &self.value
            && let Err(source) = regex::Regex::new(pattern)
        {
            return Err(EntryError::BadLookupPattern {
                key: self.key.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Compute the replacement for `old_value` according to this entry's
    /// datatype and operation.
    ///
    /// Unparseable numeric or date operands silently fall back to a default
    /// offset of 1; an unparseable old date falls back to the current time.
    /// This mirrors long-standing installer behaviour and is deliberate.
    #[must_use]
    pub fn calculate_value(&self, old_value: Option<&str>) -> String {
        match self.value_type {
            ValueType::String => self.calculate_string(old_value),
            ValueType::Integer => self.calculate_integer(old_value),
            ValueType::Date => self.calculate_date(old_value),
        }
    }

    /// Resolve the working value before the operation is applied.
    ///
    /// For `Set`: a `value` without a `default` always wins; otherwise an
    /// absent old value resolves to the default (falling back to `value`),
    /// and a present old value is replaced by `value` when one is given.
    /// For every other operation the old value wins, falling back to the
    /// default.
    fn current_value<'a>(&'a self, old_value: Option<&'a str>) -> Option<&'a str> {
        if self.operation == Operation::Set {
            if self.value.is_some() && self.default.is_none() {
                self.value.as_deref()
            } else if old_value.is_none() {
                self.default.as_deref().or(self.value.as_deref())
            } else {
                self.value.as_deref().or(old_value)
            }
        } else {
            old_value.or(self.default.as_deref())
        }
    }

    fn calculate_string(&self, old_value: Option<&str>) -> String {
        let base = self.current_value(old_value).unwrap_or("");
        match self.operation {
            Operation::Increment => {
                let mut out = base.to_string();
                out.push_str(self.value.as_deref().unwrap_or(""));
                out
            }
            _ => base.to_string(),
        }
    }

    fn calculate_integer(&self, old_value: Option<&str>) -> String {
        let base = self
            .current_value(old_value)
            .and_then(parse_int)
            .unwrap_or(0);
        let result = match self.operation {
            Operation::Increment => base + self.operand(),
            Operation::Decrement => base - self.operand(),
            _ => base,
        };
        format_int(result, self.pattern.as_deref())
    }

    fn calculate_date(&self, old_value: Option<&str>) -> String {
        let pattern = self.pattern.as_deref().unwrap_or(DEFAULT_DATE_PATTERN);
        let base_text = self.current_value(old_value).unwrap_or(DATE_NOW);
        let base = if base_text == DATE_NOW {
            Local::now().naive_local()
        } else {
            NaiveDateTime::parse_from_str(base_text, pattern)
                .unwrap_or_else(|_| Local::now().naive_local())
        };
        let result = match self.operation {
            Operation::Increment => self.unit.unwrap_or_default().advance(base, self.operand()),
            Operation::Decrement => self.unit.unwrap_or_default().advance(base, -self.operand()),
            _ => base,
        };
        result.format(pattern).to_string()
    }

    /// The increment/decrement operand: the parsed `value`, or 1 when the
    /// value is missing or unparseable.
    fn operand(&self) -> i64 {
        self.value.as_deref().and_then(parse_int).unwrap_or(1)
    }
}

/// Parse a decimal integer, tolerating `,` group separators.
fn parse_int(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}

/// Format an integer, honouring a zero-padding pattern such as `"0000"`.
fn format_int(value: i64, pattern: Option<&str>) -> String {
    match pattern {
        Some(p) => {
            let width = p.chars().filter(|c| *c == '0').count();
            format!("{value:0width$}")
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn decrement_on_string_is_rejected() {
        let entry = ConfigEntry::new("name")
            .with_value("x")
            .with_operation(Operation::Decrement);
        assert!(matches!(
            entry.validate(),
            Err(EntryError::DecrementString { .. })
        ));
    }

    #[test]
    fn unit_on_integer_is_rejected() {
        let entry = ConfigEntry::new("count")
            .with_value("1")
            .with_value_type(ValueType::Integer)
            .with_unit(Unit::Day);
        assert!(matches!(
            entry.validate(),
            Err(EntryError::UnitWithoutDate { .. })
        ));
    }

    #[test]
    fn pattern_on_string_is_rejected() {
        let entry = ConfigEntry::new("name").with_value("x").with_pattern("0");
        assert!(matches!(
            entry.validate(),
            Err(EntryError::PatternString { .. })
        ));
    }

    #[test]
    fn set_without_value_or_default_is_rejected() {
        let entry = ConfigEntry::new("name");
        assert!(matches!(
            entry.validate(),
            Err(EntryError::MissingValue { .. })
        ));
    }

    #[test]
    fn remove_without_value_is_accepted() {
        let entry = ConfigEntry::new("name").with_operation(Operation::Remove);
        entry.validate().expect("remove needs no value");
    }

    #[test]
    fn empty_key_is_rejected() {
        let entry = ConfigEntry::new("").with_value("x");
        assert!(matches!(entry.validate(), Err(EntryError::EmptyKey)));
    }

    #[test]
    fn bad_regex_lookup_is_rejected() {
        let entry = ConfigEntry::new("name")
            .with_value("([")
            .with_lookup(LookupType::Regex);
        assert!(matches!(
            entry.validate(),
            Err(EntryError::BadLookupPattern { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // String arithmetic
    // -----------------------------------------------------------------------

    #[test]
    fn string_set_replaces() {
        let entry = ConfigEntry::new("name").with_value("New");
        assert_eq!(entry.calculate_value(Some("Old")), "New");
    }

    #[test]
    fn string_increment_concatenates() {
        let entry = ConfigEntry::new("name")
            .with_value("New")
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(Some("Old")), "OldNew");
    }

    #[test]
    fn string_increment_without_old_uses_default() {
        let entry = ConfigEntry::new("name")
            .with_value("New")
            .with_default("Base")
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(None), "BaseNew");
    }

    // -----------------------------------------------------------------------
    // Integer arithmetic
    // -----------------------------------------------------------------------

    #[test]
    fn integer_increment() {
        let entry = ConfigEntry::new("count")
            .with_value("5")
            .with_value_type(ValueType::Integer)
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(Some("10")), "15");
    }

    #[test]
    fn integer_decrement() {
        let entry = ConfigEntry::new("count")
            .with_value("3")
            .with_value_type(ValueType::Integer)
            .with_operation(Operation::Decrement);
        assert_eq!(entry.calculate_value(Some("10")), "7");
    }

    #[test]
    fn integer_increment_defaults_to_one_for_bad_operand() {
        let entry = ConfigEntry::new("count")
            .with_value("not-a-number")
            .with_value_type(ValueType::Integer)
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(Some("10")), "11");
    }

    #[test]
    fn integer_missing_old_value_starts_at_zero() {
        let entry = ConfigEntry::new("count")
            .with_value("5")
            .with_value_type(ValueType::Integer)
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(None), "5");
    }

    #[test]
    fn integer_zero_padding_pattern() {
        let entry = ConfigEntry::new("count")
            .with_value("1")
            .with_value_type(ValueType::Integer)
            .with_pattern("0000")
            .with_operation(Operation::Increment);
        assert_eq!(entry.calculate_value(Some("41")), "0042");
    }

    #[test]
    fn integer_parse_tolerates_group_separators() {
        assert_eq!(parse_int("1,234"), Some(1234));
        assert_eq!(parse_int(" 42 "), Some(42));
        assert_eq!(parse_int("nope"), None);
    }

    // -----------------------------------------------------------------------
    // Date arithmetic
    // -----------------------------------------------------------------------

    #[test]
    fn date_increment_years_preserves_subsecond_precision() {
        let entry = ConfigEntry::new("expiry")
            .with_value("10")
            .with_value_type(ValueType::Date)
            .with_pattern("%Y/%m/%d %H:%M:%S%.3f")
            .with_unit(Unit::Year)
            .with_operation(Operation::Increment);
        assert_eq!(
            entry.calculate_value(Some("2000/01/01 20:00:01.010")),
            "2010/01/01 20:00:01.010"
        );
    }

    #[test]
    fn date_decrement_days() {
        let entry = ConfigEntry::new("expiry")
            .with_value("10")
            .with_value_type(ValueType::Date)
            .with_operation(Operation::Decrement);
        assert_eq!(
            entry.calculate_value(Some("2000/01/11 12:30")),
            "2000/01/01 12:30"
        );
    }

    #[test]
    fn date_default_unit_is_day() {
        let entry = ConfigEntry::new("expiry")
            .with_value("1")
            .with_value_type(ValueType::Date)
            .with_operation(Operation::Increment);
        assert_eq!(
            entry.calculate_value(Some("2000/12/31 23:00")),
            "2001/01/01 23:00"
        );
    }

    #[test]
    fn date_month_step_clamps_to_month_end() {
        let entry = ConfigEntry::new("expiry")
            .with_value("1")
            .with_value_type(ValueType::Date)
            .with_unit(Unit::Month)
            .with_operation(Operation::Increment);
        assert_eq!(
            entry.calculate_value(Some("2001/01/31 08:00")),
            "2001/02/28 08:00"
        );
    }

    #[test]
    fn date_set_reformats_unchanged() {
        let entry = ConfigEntry::new("expiry")
            .with_value_type(ValueType::Date)
            .with_default("1999/06/01 00:00");
        assert_eq!(
            entry.calculate_value(Some("2000/02/03 04:05")),
            "2000/02/03 04:05"
        );
    }

    // -----------------------------------------------------------------------
    // Working-value precedence
    // -----------------------------------------------------------------------

    #[test]
    fn set_value_without_default_always_wins() {
        let entry = ConfigEntry::new("k").with_value("v");
        assert_eq!(entry.current_value(Some("old")), Some("v"));
        assert_eq!(entry.current_value(None), Some("v"));
    }

    #[test]
    fn set_with_both_prefers_default_for_missing_old_value() {
        let entry = ConfigEntry::new("k").with_value("v").with_default("d");
        assert_eq!(entry.current_value(None), Some("d"));
        assert_eq!(entry.current_value(Some("old")), Some("v"));
    }

    #[test]
    fn set_with_only_default_keeps_existing_value() {
        let entry = ConfigEntry::new("k").with_default("d");
        assert_eq!(entry.current_value(Some("old")), Some("old"));
        assert_eq!(entry.current_value(None), Some("d"));
    }

    #[test]
    fn non_set_prefers_old_value_over_default() {
        let entry = ConfigEntry::new("k")
            .with_value("1")
            .with_default("d")
            .with_operation(Operation::Increment);
        assert_eq!(entry.current_value(Some("old")), Some("old"));
        assert_eq!(entry.current_value(None), Some("d"));
    }

    // -----------------------------------------------------------------------
    // Derivation & attribute parsing
    // -----------------------------------------------------------------------

    #[test]
    fn section_root_prefixes_existing_section() {
        let entry = ConfigEntry::new("v").with_section("Sub");
        let nested = entry.with_section_root(r"HKCU\Software\App");
        assert_eq!(nested.section(), Some(r"HKCU\Software\App\Sub"));
        // Original untouched.
        assert_eq!(entry.section(), Some("Sub"));
    }

    #[test]
    fn section_root_fills_missing_section() {
        let entry = ConfigEntry::new("v");
        let nested = entry.with_section_root(r"HKCU\Software\App");
        assert_eq!(nested.section(), Some(r"HKCU\Software\App"));
    }

    #[test]
    fn attribute_forms_parse() {
        assert_eq!(Operation::from_attribute("+"), Some(Operation::Increment));
        assert_eq!(Operation::from_attribute("keep"), Some(Operation::Keep));
        assert_eq!(Operation::from_attribute("??"), None);
        assert_eq!(ValueType::from_attribute("int"), Some(ValueType::Integer));
        assert_eq!(LookupType::from_attribute("regexp"), Some(LookupType::Regex));
        assert_eq!(Unit::from_attribute("week"), Some(Unit::Week));
    }
}
