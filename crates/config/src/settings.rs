// Client settings
// Loaded from ~/.config/dalclient/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ResponseFormat;

/// Delay before a locally detected error is handed back to the caller.
pub const DEFAULT_LOCAL_ERROR_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// DAL service root, e.g. "https://kddart.example.org/dal/"
    #[serde(rename = "dal.baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(rename = "dal.responseType")]
    pub response_type: ResponseFormat,

    /// Sent with login as `login/<user>/yes|no`
    #[serde(rename = "dal.explicitLogout")]
    pub explicit_logout: bool,

    #[serde(rename = "dal.localErrorDelayMs")]
    pub local_error_delay_ms: u64,

    #[serde(rename = "dal.userAgent")]
    pub user_agent: String,

    #[serde(rename = "dal.username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            response_type: ResponseFormat::Json,
            explicit_logout: false,
            local_error_delay_ms: DEFAULT_LOCAL_ERROR_DELAY_MS,
            user_agent: concat!("dalclient/", env!("CARGO_PKG_VERSION")).to_string(),
            username: None,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dalclient")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Failed to write settings file: {}", e))
    }

    /// Apply `DAL_BASE_URL`, `DAL_RESPONSE_TYPE` and `DAL_USERNAME`.
    ///
    /// An unparseable `DAL_RESPONSE_TYPE` is reported rather than ignored.
    pub fn with_env_overrides(self) -> Result<Self, String> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        if let Some(url) = lookup("DAL_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(rtype) = lookup("DAL_RESPONSE_TYPE").filter(|v| !v.is_empty()) {
            self.response_type = rtype.parse()?;
        }
        if let Some(user) = lookup("DAL_USERNAME").filter(|v| !v.is_empty()) {
            self.username = Some(user);
        }
        Ok(self)
    }
}
