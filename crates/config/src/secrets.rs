// DAL password lookup
//
// Passwords are read from:
// 1. System keychain (preferred)
// 2. DAL_PASSWORD environment variable (fallback for CI/headless)
//
// Passwords are NEVER stored in settings.json

use std::env;

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "dalclient";

const PASSWORD_ENV: &str = "DAL_PASSWORD";

/// Where a password came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Keychain,
    Environment,
    None,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Keychain => "keychain",
            CredentialSource::Environment => "environment",
            CredentialSource::None => "none",
        }
    }
}

/// Result of password lookup
#[derive(Debug, Clone)]
pub struct PasswordLookup {
    pub password: Option<String>,
    pub source: CredentialSource,
}

/// Keychain account for a DAL user
fn keychain_account(username: &str) -> String {
    format!("dal/{}", username)
}

/// Get the password for a DAL user
///
/// Checks the system keychain first, then `DAL_PASSWORD`.
pub fn get_password(username: &str) -> PasswordLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(username)) {
            if let Ok(password) = entry.get_password() {
                return PasswordLookup {
                    password: Some(password),
                    source: CredentialSource::Keychain,
                };
            }
        }
    }
    #[cfg(not(feature = "keychain"))]
    let _ = username;

    if let Ok(password) = env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return PasswordLookup {
                password: Some(password),
                source: CredentialSource::Environment,
            };
        }
    }

    PasswordLookup {
        password: None,
        source: CredentialSource::None,
    }
}

/// Store a DAL password in the system keychain
#[cfg(feature = "keychain")]
pub fn set_password(username: &str, password: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(username))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(password)
        .map_err(|e| format!("Failed to store password in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_password(_username: &str, _password: &str) -> Result<(), String> {
    Err("Keychain support not enabled. Set DAL_PASSWORD environment variable instead.".to_string())
}

/// Delete a DAL password from the system keychain
#[cfg(feature = "keychain")]
pub fn delete_password(username: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(username))
        .map_err(|e| format!("Failed to access keychain entry: {}", e))?;

    entry
        .delete_credential()
        .map_err(|e| format!("Failed to delete password from keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn delete_password(_username: &str) -> Result<(), String> {
    Err("Keychain support not enabled.".to_string())
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keychain_account() {
        assert_eq!(keychain_account("admin"), "dal/admin");
        assert_eq!(keychain_account("Bob"), "dal/Bob");
    }

    #[test]
    fn test_credential_source_names() {
        assert_eq!(CredentialSource::Keychain.as_str(), "keychain");
        assert_eq!(CredentialSource::Environment.as_str(), "environment");
        assert_eq!(CredentialSource::None.as_str(), "none");
    }
}
