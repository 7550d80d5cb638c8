// Configuration loading

pub mod secrets;
pub mod settings;

pub use secrets::{
    delete_password, get_password, keychain_available, set_password, CredentialSource,
    PasswordLookup,
};
pub use settings::Settings;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload format requested from the DAL.
///
/// The server answers in XML unless a request carries `ctype=json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl ResponseFormat {
    /// Value of the `ctype` request parameter.
    pub fn ctype(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Xml => "xml",
        }
    }

    /// `Accept` header sent alongside a request for this format.
    pub fn accept(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json, text/javascript, */*; q=0.01",
            ResponseFormat::Xml => "application/xml, text/xml, */*; q=0.01",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ResponseFormat::Json)
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Json => write!(f, "JSON"),
            ResponseFormat::Xml => write!(f, "XML"),
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSON" | "json" => Ok(ResponseFormat::Json),
            "XML" | "xml" => Ok(ResponseFormat::Xml),
            other => Err(format!("Invalid response type: '{}'", other)),
        }
    }
}
