//! The settings store: a flat string-to-string map, `[A-Za-z0-9_]` keys,
//! an empty value meaning "set as a flag", and a plain-text `key=value`
//! (or bare `key` for a flag) persisted format, one entry per line.

use core::fmt;

#[cfg(feature = "alloc")]
use alloc::collections::BTreeMap;
#[cfg(feature = "alloc")]
use alloc::string::String;

use crate::error::Error;

pub trait SettingsStore {
    fn set(&mut self, name: &str, value: &str) -> Result<(), Error>;
    fn unset(&mut self, name: &str) -> Result<(), Error>;
    fn is_set(&self, name: &str) -> bool;
    fn get_str(&self, name: &str) -> Option<&str>;

    fn get_int(&self, name: &str, default: i64) -> i64 {
        self.get_str(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_float(&self, name: &str, default: f32) -> f32 {
        self.get_str(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_string(&self, name: &str, default: &str) -> alloc::string::String {
        alloc::string::ToString::to_string(self.get_str(name).unwrap_or(default))
    }
}

pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A host-backed settings store: an ordered `String -> String` map.
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    store: BTreeMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zap(&mut self) {
        self.store.clear();
    }

    /// All entries as `key=value` (or bare `key` when the value is empty),
    /// one per line, no trailing newline — the persisted file format.
    pub fn write_list<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.store.iter() {
            if !first {
                w.write_char('\n')?;
            }
            first = false;
            if value.is_empty() {
                w.write_str(key)?;
            } else {
                write!(w, "{}={}", key, value)?;
            }
        }
        Ok(())
    }

    /// Parse the persisted format, replacing the current contents.
    pub fn load_list(&mut self, contents: &str) {
        self.zap();
        for line in contents.lines() {
            if let Some(eq) = line.find('=') {
                self.store
                    .insert(line[..eq].into(), line[eq + 1..].into());
            } else if !line.is_empty() {
                self.store.insert(line.into(), String::new());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.store.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl SettingsStore for MapSettings {
    fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if !valid_name(name) {
            return Err(Error::InvalidSetting);
        }
        self.store.insert(name.into(), value.into());
        Ok(())
    }

    fn unset(&mut self, name: &str) -> Result<(), Error> {
        if !valid_name(name) {
            return Err(Error::InvalidSetting);
        }
        self.store.remove(name);
        Ok(())
    }

    fn is_set(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.store.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_invalid_names() {
        let mut s = MapSettings::new();
        assert!(s.set("bad name", "1").is_err());
        assert!(s.set("good_name1", "1").is_ok());
    }

    #[test]
    fn flag_set_has_empty_value_and_round_trips() {
        let mut s = MapSettings::new();
        s.set("print_raw", "").unwrap();
        s.set("bin_width", "150").unwrap();
        let text = alloc::format!("{}", Formatted(&s));
        let mut reloaded = MapSettings::new();
        reloaded.load_list(&text);
        assert!(reloaded.is_set("print_raw"));
        assert_eq!(reloaded.get_str("bin_width"), Some("150"));
    }

    struct Formatted<'a>(&'a MapSettings);
    impl<'a> fmt::Display for Formatted<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.write_list(f)
        }
    }

    #[test]
    fn get_int_falls_back_to_default() {
        let s = MapSettings::new();
        assert_eq!(s.get_int("missing", -1), -1);
    }
}
