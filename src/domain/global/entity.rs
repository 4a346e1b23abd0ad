//! System global entity, name and update selectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::{EntityFilter, EntityPatch, StorageEntity, StorageKey};

use super::value::GlobalValue;

/// Maximum length for a global name, in characters
pub const MAX_GLOBAL_NAME_LENGTH: usize = 100;

/// Unique, case-sensitive name of a system global
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobalName(String);

impl GlobalName {
    pub fn new(name: impl Into<String>) -> Result<Self, GlobalValidationError> {
        let name = name.into();
        validate_global_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GlobalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for GlobalName {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GlobalName {
    type Error = GlobalValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GlobalName> for String {
    fn from(name: GlobalName) -> Self {
        name.0
    }
}

/// A persisted global: one row of the globals table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRecord {
    name: GlobalName,
    value: String,
    #[serde(default)]
    description: String,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl GlobalRecord {
    pub fn new(name: GlobalName, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name,
            value: value.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &GlobalName {
        &self.name
    }

    /// Stored text, untrimmed
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn coerced(&self) -> GlobalValue {
        GlobalValue::coerce(&self.value)
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.updated_at = Utc::now();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for GlobalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

impl StorageEntity for GlobalRecord {
    type Key = GlobalName;

    fn key(&self) -> &Self::Key {
        &self.name
    }
}

/// Selects the records touched by a bulk update
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalFilter {
    /// Every record
    All,
    /// Exactly one name (case-sensitive)
    Name(String),
    /// Any of the given names
    Names(Vec<String>),
    /// Names starting with the prefix, compared case-insensitively
    Prefix(String),
}

impl GlobalFilter {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }
}

impl EntityFilter<GlobalRecord> for GlobalFilter {
    fn matches(&self, record: &GlobalRecord) -> bool {
        let name = record.name().as_str();

        match self {
            GlobalFilter::All => true,
            GlobalFilter::Name(wanted) => name == wanted,
            GlobalFilter::Names(wanted) => wanted.iter().any(|w| w == name),
            GlobalFilter::Prefix(prefix) => strip_prefix_ignore_case(name, prefix).is_some(),
        }
    }

    fn key_hint(&self) -> Option<&str> {
        match self {
            GlobalFilter::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Field changes applied by a bulk update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalPatch {
    value: Option<String>,
    description: Option<String>,
}

impl GlobalPatch {
    /// Patch that replaces the stored value
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            description: None,
        }
    }

    /// Patch that only replaces the description
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            value: None,
            description: Some(description.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether applying this patch rewrites the cached value column
    pub fn changes_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.description.is_none()
    }
}

impl EntityPatch<GlobalRecord> for GlobalPatch {
    fn apply(&self, record: &mut GlobalRecord) {
        if let Some(value) = &self.value {
            record.set_value(value.clone());
        }

        if let Some(description) = &self.description {
            record.set_description(description.clone());
        }
    }
}

/// Strips `prefix` from the front of `name` when they agree ignoring case.
///
/// The returned remainder starts after as many characters as `prefix` has.
pub(crate) fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = name.char_indices();

    for wanted in prefix.chars() {
        let (_, found) = rest.next()?;

        if !found.to_lowercase().eq(wanted.to_lowercase()) {
            return None;
        }
    }

    let offset = rest.next().map(|(idx, _)| idx).unwrap_or(name.len());
    Some(&name[offset..])
}

/// Global validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GlobalValidationError {
    #[error("Global name cannot be empty")]
    EmptyName,

    #[error("Global name is {length} characters long, max is {max}")]
    NameTooLong { length: usize, max: usize },
}

fn validate_global_name(name: &str) -> Result<(), GlobalValidationError> {
    if name.is_empty() {
        return Err(GlobalValidationError::EmptyName);
    }

    let length = name.chars().count();

    if length > MAX_GLOBAL_NAME_LENGTH {
        return Err(GlobalValidationError::NameTooLong {
            length,
            max: MAX_GLOBAL_NAME_LENGTH,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: &str) -> GlobalRecord {
        GlobalRecord::new(GlobalName::new(name).unwrap(), value)
    }

    #[test]
    fn test_global_name_validation() {
        assert!(GlobalName::new("testing_one").is_ok());
        assert!(GlobalName::new("with spaces and-dashes").is_ok());
        assert_eq!(GlobalName::new(""), Err(GlobalValidationError::EmptyName));
        assert!(GlobalName::new("x".repeat(MAX_GLOBAL_NAME_LENGTH)).is_ok());
        assert!(matches!(
            GlobalName::new("x".repeat(MAX_GLOBAL_NAME_LENGTH + 1)),
            Err(GlobalValidationError::NameTooLong { length: 101, .. })
        ));
    }

    #[test]
    fn test_global_name_deserialize_validates() {
        let ok: Result<GlobalName, _> = serde_json::from_str("\"DEBUG\"");
        assert_eq!(ok.unwrap().as_str(), "DEBUG");

        let err: Result<GlobalName, _> = serde_json::from_str("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_record_display() {
        let record = record("TESTING_TWO", "\t t").with_description("flag");

        assert_eq!(record.to_string(), "TESTING_TWO = \t t");
        assert_eq!(record.description(), "flag");
        assert_eq!(record.coerced(), GlobalValue::Boolean(true));
    }

    #[test]
    fn test_record_json_round_trip() {
        let original = record("testing_three", "3.0 ").with_description("pi-ish");
        let json = serde_json::to_value(&original).unwrap();

        assert_eq!(json["name"], "testing_three");
        assert_eq!(json["value"], "3.0 ");

        let restored: GlobalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_set_value_touches_updated_at() {
        let mut record = record("a", "1");
        let before = record.updated_at();

        record.set_value("2");

        assert_eq!(record.value(), "2");
        assert!(record.updated_at() >= before);
        assert_eq!(record.created_at(), before);
    }

    #[test]
    fn test_filter_matching() {
        let upper = record("TESTING_TWO", "x");
        let lower = record("testing_one", "x");
        let other = record("other", "x");

        assert!(GlobalFilter::All.matches(&other));
        assert!(GlobalFilter::name("TESTING_TWO").matches(&upper));
        assert!(!GlobalFilter::name("testing_two").matches(&upper));
        assert!(GlobalFilter::prefix("teSTinG_").matches(&upper));
        assert!(GlobalFilter::prefix("teSTinG_").matches(&lower));
        assert!(!GlobalFilter::prefix("teSTinG_").matches(&other));

        let names = GlobalFilter::Names(vec!["other".to_string(), "testing_one".to_string()]);
        assert!(names.matches(&lower));
        assert!(!names.matches(&upper));
    }

    #[test]
    fn test_filter_key_hint() {
        assert_eq!(GlobalFilter::name("limit").key_hint(), Some("limit"));
        assert_eq!(GlobalFilter::All.key_hint(), None);
        assert_eq!(GlobalFilter::prefix("limit").key_hint(), None);
        assert_eq!(
            GlobalFilter::Names(vec!["limit".to_string()]).key_hint(),
            None
        );
    }

    #[test]
    fn test_patch_apply() {
        let mut target = record("a", "1");

        let patch = GlobalPatch::description("only the text");
        assert!(!patch.changes_value());
        patch.apply(&mut target);
        assert_eq!(target.value(), "1");
        assert_eq!(target.description(), "only the text");

        let patch = GlobalPatch::value("2").with_description("both");
        assert!(patch.changes_value());
        patch.apply(&mut target);
        assert_eq!(target.value(), "2");
        assert_eq!(target.description(), "both");

        assert!(GlobalPatch::default().is_empty());
    }

    #[test]
    fn test_strip_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("TESTING_TWO", "testing_"), Some("TWO"));
        assert_eq!(strip_prefix_ignore_case("testing_one", ""), Some("testing_one"));
        assert_eq!(strip_prefix_ignore_case("testing_", "TESTING_"), Some(""));
        assert_eq!(strip_prefix_ignore_case("test", "testing_"), None);
        assert_eq!(strip_prefix_ignore_case("Ärger_x", "ärger_"), Some("x"));
    }
}
