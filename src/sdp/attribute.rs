use std::fmt;
use std::str::FromStr;

use super::sdp_error::SdpError;

/// An `a=` line: a key and an optional value (`a=key` or `a=key:value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    key: String,
    value: Option<String>,
}

impl Attribute {
    pub fn new<K: Into<String>, V: Into<Option<String>>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A flag attribute such as `a=end-of-candidates`.
    pub fn flag<K: Into<String>>(key: K) -> Self {
        Self::new(key, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value<V: Into<Option<String>>>(&mut self, value: V) {
        self.value = value.into();
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}:{}", self.key, v),
            None => f.write_str(&self.key),
        }
    }
}

/// Parses the text after `a=`.
impl FromStr for Attribute {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SdpError::Invalid("a="));
        }
        Ok(match s.split_once(':') {
            Some((k, v)) => Self::new(k, Some(v.to_string())),
            None => Self::flag(s),
        })
    }
}
