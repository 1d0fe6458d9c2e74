//! User-level configuration consumed by the core.
//!
//! # Responsibility
//! - Hold the ordered permanent section titles of one user.
//! - Normalise the settings bag into typed flags.
//!
//! # Invariants
//! - Every settings field has a default, so partial JSON always parses.
//! - Section title comparison is case-insensitive and whitespace-collapsed.
//! - `items.sections` is the canonical "copy sections with no active items"
//!   flag; `sectionsWithNoActiveItems` and `sections_with_no_active_items`
//!   are accepted as input aliases only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Per-user configuration stored as JSON on the user row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    /// Section titles that must exist on every new day, in display order.
    pub permanent_sections: Vec<String>,
    pub settings: MigrationSettings,
}

impl UserConfig {
    pub fn with_sections<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permanent_sections: titles.into_iter().map(Into::into).collect(),
            settings: MigrationSettings::default(),
        }
    }

    /// Returns the configured title matching `title`, if any.
    pub fn permanent_section_title(&self, title: &str) -> Option<&str> {
        let key = section_key(title);
        self.permanent_sections
            .iter()
            .find(|configured| section_key(configured) == key)
            .map(String::as_str)
    }

    pub fn is_permanent_section_title(&self, title: &str) -> bool {
        self.permanent_section_title(title).is_some()
    }
}

/// Day migration flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationSettings {
    /// Migrate links sitting at the day root and inside items.
    pub links: bool,
    /// Migrate non-permanent sections found at the day root.
    pub active_item_sections: bool,
    /// Migrate notes sitting at the day root.
    pub notes: bool,
    pub items: ItemCopySettings,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            links: true,
            active_item_sections: true,
            notes: true,
            items: ItemCopySettings::default(),
        }
    }
}

impl MigrationSettings {
    /// Flags handed to the subtree copy engine.
    pub fn copy_settings(&self) -> CopySettings {
        CopySettings {
            sections_with_no_active_items: self.items.sections,
            notes: self.items.notes,
            links: self.links,
        }
    }
}

/// Flags applied below the day root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemCopySettings {
    /// Copy sections that end up with no eligible children.
    #[serde(
        alias = "sectionsWithNoActiveItems",
        alias = "sections_with_no_active_items"
    )]
    pub sections: bool,
    /// Copy notes nested inside items.
    pub notes: bool,
}

impl Default for ItemCopySettings {
    fn default() -> Self {
        Self {
            sections: false,
            notes: true,
        }
    }
}

/// Flags for one subtree copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySettings {
    pub sections_with_no_active_items: bool,
    pub notes: bool,
    pub links: bool,
}

impl Default for CopySettings {
    fn default() -> Self {
        MigrationSettings::default().copy_settings()
    }
}

/// Comparison key for section titles.
pub fn section_key(title: &str) -> String {
    WHITESPACE_RE
        .replace_all(title.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{section_key, MigrationSettings, UserConfig};

    #[test]
    fn settings_parse_with_defaults_and_aliases() {
        let settings: MigrationSettings =
            serde_json::from_str(r#"{"activeItemSections":false,"items":{"sectionsWithNoActiveItems":true}}"#)
                .unwrap();
        assert!(!settings.active_item_sections);
        assert!(settings.links);
        assert!(settings.notes);
        assert!(settings.items.sections);
        assert!(settings.items.notes);

        let canonical: MigrationSettings =
            serde_json::from_str(r#"{"items":{"sections":true,"notes":false}}"#).unwrap();
        assert!(canonical.copy_settings().sections_with_no_active_items);
        assert!(!canonical.copy_settings().notes);
    }

    #[test]
    fn empty_json_gives_default_config() {
        let config: UserConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, UserConfig::default());
        assert!(!config.settings.items.sections);
    }

    #[test]
    fn permanent_titles_match_case_insensitively() {
        let config = UserConfig::with_sections(["Work", "Personal  Errands"]);
        assert_eq!(config.permanent_section_title("work"), Some("Work"));
        assert_eq!(
            config.permanent_section_title(" personal errands "),
            Some("Personal  Errands")
        );
        assert!(!config.is_permanent_section_title("Home"));
        assert_eq!(section_key("  A \t B "), "a b");
    }
}
