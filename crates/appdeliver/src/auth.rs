use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

static KEY_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AuthKey_(.+)\.p8$").expect("valid key file pattern"));

/// Raw authentication inputs as configured; empty strings mean unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInputs {
    pub apple_id_user: String,
    pub password: String,
    pub app_password: String,
    pub api_key_path: String,
    pub api_key_id: String,
    pub api_issuer: String,
}

impl AuthInputs {
    fn is_apple_id(&self) -> bool {
        !self.apple_id_user.is_empty() || !self.password.is_empty() || !self.app_password.is_empty()
    }

    fn is_api_key(&self) -> bool {
        !self.api_key_path.is_empty() || !self.api_key_id.is_empty() || !self.api_issuer.is_empty()
    }
}

/// Resolved altool credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AppleId { username: String, password: String },
    ApiKey { key_id: String, issuer_id: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AppleId { username, .. } => f
                .debug_struct("AppleId")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::ApiKey { key_id, issuer_id } => f
                .debug_struct("ApiKey")
                .field("key_id", key_id)
                .field("issuer_id", issuer_id)
                .finish(),
        }
    }
}

impl Credentials {
    /// Resolve exactly one authentication kind from the raw inputs.
    ///
    /// The app-specific password is preferred over the account password.
    pub fn resolve(inputs: &AuthInputs) -> Result<Self, ConfigError> {
        match (inputs.is_apple_id(), inputs.is_api_key()) {
            (true, false) => {
                if inputs.apple_id_user.is_empty() {
                    return Err(ConfigError::MissingAppleIdUser);
                }
                let password = if inputs.app_password.is_empty() {
                    &inputs.password
                } else {
                    &inputs.app_password
                };
                if password.is_empty() {
                    return Err(ConfigError::MissingPassword);
                }
                Ok(Credentials::AppleId {
                    username: inputs.apple_id_user.clone(),
                    password: password.clone(),
                })
            }
            (false, true) => {
                if inputs.api_issuer.is_empty() {
                    return Err(ConfigError::MissingApiIssuer);
                }
                let key_id = if inputs.api_key_id.is_empty() {
                    api_key_id_from_path(Path::new(&inputs.api_key_path))
                        .ok_or(ConfigError::MissingApiKeyId)?
                } else {
                    inputs.api_key_id.clone()
                };
                Ok(Credentials::ApiKey {
                    key_id,
                    issuer_id: inputs.api_issuer.clone(),
                })
            }
            _ => Err(ConfigError::AmbiguousAuth),
        }
    }

    /// altool flags for these credentials.
    pub fn to_params(&self) -> Vec<String> {
        match self {
            Credentials::AppleId { username, password } => vec![
                "-u".to_string(),
                username.clone(),
                "-p".to_string(),
                password.clone(),
            ],
            Credentials::ApiKey { key_id, issuer_id } => vec![
                "--apiKey".to_string(),
                key_id.clone(),
                "--apiIssuer".to_string(),
                issuer_id.clone(),
            ],
        }
    }

    /// Values that must never reach a log.
    pub fn secrets(&self) -> Vec<String> {
        match self {
            Credentials::AppleId { password, .. } => vec![password.clone()],
            Credentials::ApiKey { .. } => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::AppleId { .. } => "apple-id",
            Credentials::ApiKey { .. } => "api-key",
        }
    }
}

/// Key id encoded in an App Store Connect key file name (`AuthKey_<ID>.p8`).
pub fn api_key_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    KEY_FILE_NAME
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
