//! Cached mirror of the globals table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::{strip_prefix_ignore_case, GlobalRecord};
use super::value::GlobalValue;

/// Every `name -> value` pair in storage, as of the last reload or write-through
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalSnapshot {
    values: HashMap<String, String>,
}

impl GlobalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a GlobalRecord>) -> Self {
        let values = records
            .into_iter()
            .map(|r| (r.name().as_str().to_string(), r.value().to_string()))
            .collect();

        Self { values }
    }

    /// Raw stored text for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Inserts or replaces one entry, returning the previous raw value
    pub fn upsert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Projects the snapshot into a dictionary.
    ///
    /// Keys are filtered by a case-insensitive prefix which is then cut off;
    /// when two names collapse onto one key the one iterated last wins.
    pub fn to_dict(&self, options: &DictOptions) -> HashMap<String, GlobalValue> {
        let mut dict = HashMap::new();

        for (name, raw) in &self.values {
            let Some(rest) = strip_prefix_ignore_case(name, &options.prefix) else {
                continue;
            };

            let key = if options.to_lower {
                rest.to_lowercase()
            } else {
                rest.to_string()
            };

            let value = if options.coerce {
                GlobalValue::coerce(raw)
            } else {
                GlobalValue::String(raw.clone())
            };

            dict.insert(key, value);
        }

        dict
    }
}

/// Options for [`GlobalSnapshot::to_dict`]
#[derive(Debug, Clone, PartialEq)]
pub struct DictOptions {
    pub prefix: String,
    pub to_lower: bool,
    pub coerce: bool,
}

impl Default for DictOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            to_lower: false,
            coerce: true,
        }
    }
}

impl DictOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Lowercases the returned keys (stored names are untouched)
    pub fn lowercase_keys(mut self) -> Self {
        self.to_lower = true;
        self
    }

    /// Returns stored text verbatim instead of coercing it
    pub fn raw_values(mut self) -> Self {
        self.coerce = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::global::GlobalName;

    fn fixture() -> GlobalSnapshot {
        let records = [
            GlobalRecord::new(GlobalName::new("testing_one").unwrap(), "test value"),
            GlobalRecord::new(GlobalName::new("TESTING_TWO").unwrap(), "\t t"),
            GlobalRecord::new(GlobalName::new("testing_three").unwrap(), "3.0 "),
        ];
        GlobalSnapshot::from_records(&records)
    }

    #[test]
    fn test_dict_with_prefix() {
        let snapshot = fixture();

        for prefix in ["testing_", "teSTinG_"] {
            let dict = snapshot.to_dict(&DictOptions::new().with_prefix(prefix));

            assert_eq!(dict.len(), 3);
            assert_eq!(dict["one"], GlobalValue::String("test value".to_string()));
            assert_eq!(dict["TWO"], GlobalValue::Boolean(true));
            assert_eq!(dict["three"], GlobalValue::Float(3.0));
        }

        let dict = snapshot.to_dict(&DictOptions::new().with_prefix("non_existent"));
        assert!(dict.is_empty());
    }

    #[test]
    fn test_dict_without_coerce() {
        let dict = fixture().to_dict(&DictOptions::new().raw_values());

        assert_eq!(dict["testing_one"], GlobalValue::String("test value".to_string()));
        assert_eq!(dict["TESTING_TWO"], GlobalValue::String("\t t".to_string()));
        assert_eq!(dict["testing_three"], GlobalValue::String("3.0 ".to_string()));
    }

    #[test]
    fn test_dict_with_to_lower() {
        let snapshot = fixture();
        let dict = snapshot.to_dict(&DictOptions::new().lowercase_keys());

        assert_eq!(dict["testing_one"], GlobalValue::String("test value".to_string()));
        assert_eq!(dict["testing_two"], GlobalValue::Boolean(true));
        assert_eq!(dict["testing_three"], GlobalValue::Float(3.0));
        assert!(!dict.contains_key("TESTING_TWO"));
        assert_eq!(snapshot.get("TESTING_TWO"), Some("\t t"));
    }

    #[test]
    fn test_dict_collision_keeps_one_key() {
        let mut snapshot = GlobalSnapshot::new();
        snapshot.upsert("app_mode", "a");
        snapshot.upsert("APP_MODE", "b");

        let dict = snapshot.to_dict(&DictOptions::new().with_prefix("app_").lowercase_keys());

        assert_eq!(dict.len(), 1);
        assert!(matches!(&dict["mode"], GlobalValue::String(v) if v == "a" || v == "b"));
    }

    #[test]
    fn test_upsert() {
        let mut snapshot = fixture();

        assert_eq!(snapshot.upsert("testing_one", "changed"), Some("test value".to_string()));
        assert_eq!(snapshot.upsert("brand_new", "1"), None);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.get("testing_one"), Some("changed"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut snapshot = GlobalSnapshot::new();
        snapshot.upsert("A", " 1 ");

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"A":" 1 "}"#);

        let restored: GlobalSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
