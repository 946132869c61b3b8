//! Theme application
//!
//! A saved [`Theme`] is applied to a presentation context through the
//! [`ThemeTarget`] trait. [`CssVariables`] is the stock target: it keeps
//! the two custom properties the stylesheet reads (`--accent`,
//! `--page-bg`) and renders them as a `:root` block.

use crate::storage::types::{Document, Theme};
use std::collections::BTreeMap;

/// CSS custom property holding the accent color
pub const ACCENT_VAR: &str = "--accent";

/// CSS custom property holding the page background
pub const BACKGROUND_VAR: &str = "--page-bg";

/// Something a theme can be applied to
pub trait ThemeTarget: Send {
    /// Make `theme` the active one
    fn apply(&mut self, theme: &Theme);

    /// The theme currently in effect
    fn current(&self) -> Theme;

    /// Return to the default colors
    fn reset(&mut self) {
        self.apply(&Theme::default());
    }
}

/// CSS custom properties on the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssVariables {
    vars: BTreeMap<String, String>,
}

impl Default for CssVariables {
    fn default() -> Self {
        let mut vars = Self {
            vars: BTreeMap::new(),
        };
        vars.apply(&Theme::default());
        vars
    }
}

impl CssVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Render as a stylesheet block
    pub fn to_css(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in &self.vars {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push('}');
        css
    }
}

impl ThemeTarget for CssVariables {
    fn apply(&mut self, theme: &Theme) {
        self.vars.insert(ACCENT_VAR.to_string(), theme.accent.clone());
        self.vars
            .insert(BACKGROUND_VAR.to_string(), theme.background.clone());
    }

    fn current(&self) -> Theme {
        let defaults = Theme::default();
        Theme::new(
            self.get(ACCENT_VAR).unwrap_or(defaults.accent.as_str()),
            self.get(BACKGROUND_VAR).unwrap_or(defaults.background.as_str()),
        )
    }
}

/// Apply `username`'s saved theme, if they have one. Returns whether
/// anything was applied.
pub fn apply_saved_theme(doc: &Document, username: &str, target: &mut dyn ThemeTarget) -> bool {
    match doc.user(username).and_then(|u| u.theme.as_ref()) {
        Some(theme) => {
            tracing::debug!(user = %username, accent = %theme.accent, "Applying saved theme");
            target.apply(theme);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::UserRecord;

    #[test]
    fn test_defaults() {
        let vars = CssVariables::new();
        assert_eq!(vars.current(), Theme::default());
        assert_eq!(vars.get(ACCENT_VAR), Some("#0ea5a4"));
    }

    #[test]
    fn test_apply_and_reset() {
        let mut vars = CssVariables::new();
        vars.apply(&Theme::new("#112233", "#000000"));
        assert_eq!(vars.get(BACKGROUND_VAR), Some("#000000"));

        vars.reset();
        assert_eq!(vars.current(), Theme::default());
    }

    #[test]
    fn test_to_css() {
        let mut vars = CssVariables::new();
        vars.apply(&Theme::new("#abcdef", "#ffffff"));
        assert_eq!(
            vars.to_css(),
            ":root {\n  --accent: #abcdef;\n  --page-bg: #ffffff;\n}"
        );
    }

    #[test]
    fn test_apply_saved_theme() {
        let mut doc = Document::default();
        doc.users.insert(
            "ada".into(),
            UserRecord {
                name: "Ada".into(),
                password: "x".into(),
                theme: Some(Theme::new("#111111", "#222222")),
            },
        );
        doc.users.insert(
            "bob".into(),
            UserRecord {
                name: "Bob".into(),
                password: "x".into(),
                theme: None,
            },
        );

        let mut vars = CssVariables::new();
        assert!(!apply_saved_theme(&doc, "bob", &mut vars));
        assert!(!apply_saved_theme(&doc, "nobody", &mut vars));
        assert_eq!(vars.current(), Theme::default());

        assert!(apply_saved_theme(&doc, "ada", &mut vars));
        assert_eq!(vars.current(), Theme::new("#111111", "#222222"));
    }
}
