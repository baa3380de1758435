//! # Household dashboard configuration — `dashboard.toml`
//!
//! Optional TOML file that tunes how the daily dashboard groups records.
//! A missing or empty file is equivalent to [`DashboardConfig::default`].
//!
//! ## Structure
//!
//! ```toml
//! [categories.school]
//! title = "School Runs"
//! color = "border-l-amber-400"
//!
//! [must_do]
//! keywords = ["medication", "appointment", "pickup"]
//! ```
//!
//! ## Types
//!
//! | Struct | Purpose |
//! |--------|---------|
//! | [`DashboardConfig`] | Top-level config with TOML (de)serialisation and the canonical filename. |
//! | [`CategoryStyle`] | Title and/or border color override for one category key. Either field may be omitted. |
//! | [`MustDoConfig`] | Keywords that mark a reminder as must-do for the default keyword policy. |

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Top-level configuration stored in `dashboard.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryStyle>,
    #[serde(default)]
    pub must_do: MustDoConfig,
}

/// Display overrides for a category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Must-do keyword settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MustDoConfig {
    #[serde(default = "default_must_do_keywords")]
    pub keywords: Vec<String>,
}

fn default_must_do_keywords() -> Vec<String> {
    [
        "medication",
        "medicine",
        "appointment",
        "doctor",
        "pickup",
        "pick up",
        "bill",
        "payment",
        "deadline",
        "urgent",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for MustDoConfig {
    fn default() -> Self {
        Self {
            keywords: default_must_do_keywords(),
        }
    }
}

impl DashboardConfig {
    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "dashboard.toml"
    }

    /// Builder method to override a category's display.
    pub fn with_category(
        mut self,
        key: impl Into<String>,
        title: Option<&str>,
        color: Option<&str>,
    ) -> Self {
        self.categories.insert(
            key.into(),
            CategoryStyle {
                title: title.map(String::from),
                color: color.map(String::from),
            },
        );
        self
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Self::from_toml(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no dashboard config, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(StoreError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}
