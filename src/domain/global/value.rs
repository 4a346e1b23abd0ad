//! Typed projection of stored global values

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static FLOAT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d*\.\d+$").unwrap());

static INTEGER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

const TRUE_WORDS: [&str; 4] = ["true", "t", "yes", "y"];

const FALSE_WORDS: [&str; 4] = ["false", "f", "no", "n"];

/// A global value after coercion
///
/// Serializes untagged so a coerced dictionary renders as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GlobalValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl GlobalValue {
    /// Coerces stored text into a typed value.
    ///
    /// Rules are tried in order on the whitespace-trimmed text: a decimal
    /// with digits after the point is a float, plain digits are an integer,
    /// `true/t/yes/y` and `false/f/no/n` (any case) are booleans, and
    /// anything else is returned as the trimmed string. Never fails.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();

        if FLOAT_PATTERN.is_match(trimmed) {
            if let Ok(value) = trimmed.parse::<f64>() {
                return GlobalValue::Float(value);
            }
        } else if INTEGER_PATTERN.is_match(trimmed) {
            if let Ok(value) = trimmed.parse::<i64>() {
                return GlobalValue::Integer(value);
            }
            // Too wide for i64
            if let Ok(value) = trimmed.parse::<f64>() {
                return GlobalValue::Float(value);
            }
        } else {
            let lowered = trimmed.to_lowercase();

            if TRUE_WORDS.contains(&lowered.as_str()) {
                return GlobalValue::Boolean(true);
            }

            if FALSE_WORDS.contains(&lowered.as_str()) {
                return GlobalValue::Boolean(false);
            }
        }

        GlobalValue::String(trimmed.to_string())
    }
}

/// Textual form stored in the `value` column
impl std::fmt::Display for GlobalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Keep the decimal point so whole floats coerce back to floats
            GlobalValue::Float(fl) if fl.is_finite() && fl.fract() == 0.0 => {
                write!(f, "{:.1}", fl)
            }
            GlobalValue::Float(fl) => write!(f, "{}", fl),
            GlobalValue::Integer(i) => write!(f, "{}", i),
            GlobalValue::Boolean(b) => write!(f, "{}", b),
            GlobalValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for GlobalValue {
    fn from(value: f64) -> Self {
        GlobalValue::Float(value)
    }
}

impl From<i64> for GlobalValue {
    fn from(value: i64) -> Self {
        GlobalValue::Integer(value)
    }
}

impl From<i32> for GlobalValue {
    fn from(value: i32) -> Self {
        GlobalValue::Integer(value.into())
    }
}

impl From<u32> for GlobalValue {
    fn from(value: u32) -> Self {
        GlobalValue::Integer(value.into())
    }
}

impl From<bool> for GlobalValue {
    fn from(value: bool) -> Self {
        GlobalValue::Boolean(value)
    }
}

impl From<&str> for GlobalValue {
    fn from(value: &str) -> Self {
        GlobalValue::String(value.to_string())
    }
}

impl From<String> for GlobalValue {
    fn from(value: String) -> Self {
        GlobalValue::String(value)
    }
}
