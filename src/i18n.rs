//! Interface language preference
//!
//! Only the choice of language is persisted; translation tables belong to
//! whatever renders the interface.

use serde::{Deserialize, Serialize};

/// Languages the interface ships translations for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Bn,
    Zh,
}

impl Language {
    /// Get all languages for iteration
    pub fn all() -> &'static [Language] {
        &[Language::En, Language::Bn, Language::Zh]
    }

    /// Locale code as persisted
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
            Language::Zh => "zh",
        }
    }

    /// Name of the language in that language
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Bn => "বাংলা",
            Language::Zh => "中文",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept region-qualified tags such as "zh-CN" or "en_US"
        let primary = s
            .trim()
            .split(|c: char| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Language::all()
            .iter()
            .copied()
            .find(|l| l.code() == primary)
            .ok_or_else(|| format!("unsupported language '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!("BN".parse::<Language>().unwrap(), Language::Bn);
        assert_eq!("zh-CN".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_code_round_trip() {
        for lang in Language::all() {
            assert_eq!(lang.code().parse::<Language>().unwrap(), *lang);
        }
        assert_eq!(Language::default(), Language::En);
    }
}
