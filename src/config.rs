use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

/// INI-style configuration: optional global keys, then `[Section]` blocks of
/// `key = value` lines. `#` starts a comment line; values may be quoted.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    /// Returns a message naming the path when the file cannot be read.
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse_str(&content))
    }

    /// Parses configuration text. Malformed lines are skipped.
    #[must_use]
    pub fn parse_str(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = Some(name.trim().to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().trim_matches('"').to_string();
            match &current_section {
                None => {
                    globals.insert(key, value);
                }
                Some(sec) => {
                    sections.entry(sec.clone()).or_default().insert(key, value);
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(String::as_str)
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key)
            .or_else(|| self.get_global(key))
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get_non_empty(section, key).unwrap_or(default)
    }

    /// Parses `section.key` (falling back to the global key).
    ///
    /// `Ok(None)` when the key is absent, `Err(raw)` when present but unparsable,
    /// so callers can report the bad value before falling back to a default.
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> Result<Option<T>, String> {
        match self
            .get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
        {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| raw.to_string()),
        }
    }

    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`.
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, String> {
        match self.get_non_empty(section, key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" => Ok(Some(false)),
                _ => Err(raw.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const SAMPLE: &str = r#"
# global
log_level = debug

[Transport]
mtu = 1500
fec_enabled = yes
fec_code_rate = "0.5"
broken = abc

[Ice]
turn_server = turn.example.net:3478
"#;

    #[test]
    fn sections_and_globals_are_split() {
        let cfg = Config::parse_str(SAMPLE);
        assert_eq!(cfg.get_global("log_level"), Some("debug"));
        assert_eq!(cfg.get("Transport", "mtu"), Some("1500"));
        assert_eq!(cfg.get("Ice", "turn_server"), Some("turn.example.net:3478"));
    }

    #[test]
    fn typed_getters_parse_or_report_raw() {
        let cfg = Config::parse_str(SAMPLE);
        assert_eq!(cfg.get_parsed::<u16>("Transport", "mtu"), Ok(Some(1500)));
        assert_eq!(cfg.get_parsed::<f64>("Transport", "fec_code_rate"), Ok(Some(0.5)));
        assert_eq!(cfg.get_parsed::<u32>("Transport", "missing"), Ok(None));
        assert_eq!(
            cfg.get_parsed::<u32>("Transport", "broken"),
            Err("abc".to_string())
        );
        assert_eq!(cfg.get_bool("Transport", "fec_enabled"), Ok(Some(true)));
    }

    #[test]
    fn global_fallback_applies() {
        let cfg = Config::parse_str(SAMPLE);
        assert_eq!(cfg.get_or_default("Transport", "log_level", "info"), "debug");
        assert_eq!(cfg.get_or_default("Transport", "nothing", "info"), "info");
    }
}
