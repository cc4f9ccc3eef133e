//! Multi-language descriptions and warnings attached to results

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const DEFAULT_LANGUAGE: &str = "en";

/// Text in one or more languages, keyed by language code ("en", "de", ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct I18nText(BTreeMap<String, String>);

impl I18nText {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(language.into(), text.into());
        Self(map)
    }

    pub fn en(text: impl Into<String>) -> Self {
        Self::new(DEFAULT_LANGUAGE, text)
    }

    pub fn with(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(language.into(), text.into());
        self
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    /// English if present, otherwise the first language available.
    pub fn preferred(&self) -> Option<&str> {
        self.get(DEFAULT_LANGUAGE)
            .or_else(|| self.0.values().next().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for I18nText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.preferred().unwrap_or_default())
    }
}

impl From<&str> for I18nText {
    fn from(text: &str) -> Self {
        Self::en(text)
    }
}

impl From<String> for I18nText {
    fn from(text: String) -> Self {
        Self::en(text)
    }
}

/// A non-fatal notice attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warning(I18nText);

impl Warning {
    pub fn new(text: impl Into<I18nText>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &I18nText {
        &self.0
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_english() {
        let text = I18nText::new("de", "Gesperrt").with("en", "Blocked");
        assert_eq!(text.preferred(), Some("Blocked"));
        assert_eq!(text.to_string(), "Blocked");
        assert_eq!(text.get("de"), Some("Gesperrt"));
    }

    #[test]
    fn falls_back_to_first_language() {
        let text = I18nText::new("fr", "Hors service");
        assert_eq!(text.to_string(), "Hors service");
        assert_eq!(I18nText::default().to_string(), "");
    }
}
