use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProductError;

/// Flattened, operator-facing projection of a top-level [`ProductError`].
///
/// Only the outermost node is surfaced; underlying errors never leak into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadError {
    pub description: String,
    pub reason: String,
    pub error_code: i64,
    pub error_id: String,
}

impl UploadError {
    /// Render as `description (code)  reason  (code: id)`.
    ///
    /// Log scrapers downstream match on this exact spacing.
    pub fn render(&self) -> String {
        let mut msg = self.description.clone();
        if self.error_code != 0 {
            msg.push_str(&format!(" ({})", self.error_code));
        }
        if !self.reason.is_empty() {
            msg.push_str(&format!("  {}", self.reason));
        }
        if !self.error_id.is_empty() {
            msg.push_str(&format!("  (code: {})", self.error_id));
        }
        msg
    }
}

impl From<&ProductError> for UploadError {
    fn from(pe: &ProductError) -> Self {
        Self {
            description: pe.user_info.description.clone(),
            reason: pe.user_info.failure_reason.clone(),
            error_code: pe.code,
            error_id: pe.user_info.iris_code.clone(),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for UploadError {}

/// Why a single upload attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadFailure {
    /// Structured output had neither a success message nor product errors.
    #[error("upload failed, but no error message found")]
    NoErrorMessage,
    #[error(transparent)]
    Rejected(UploadError),
    #[error("{count} errors, first: {first}")]
    Multiple { count: usize, first: UploadError },
    /// Text-mode failure; carries the tool's stderr.
    #[error("{0}")]
    Output(String),
    #[error("altool exited with code {code:?} without reporting a result")]
    ExitStatus { code: Option<i32> },
    #[error("failed to run altool: {0}")]
    Spawn(String),
}

impl UploadFailure {
    /// The structured error behind this failure, if the service reported one.
    pub fn upload_error(&self) -> Option<&UploadError> {
        match self {
            UploadFailure::Rejected(e) => Some(e),
            UploadFailure::Multiple { first, .. } => Some(first),
            _ => None,
        }
    }
}

/// Structured altool output could not be extracted. Always recoverable.
#[derive(Debug, Error)]
pub enum OutputParseError {
    #[error("failed to find JSON output in altool output")]
    NoJson,
    /// Only the category and position are shown; the decoder's message can
    /// quote values from the output.
    #[error(
        "failed to parse altool JSON output: {:?} error at line {} column {}",
        .0.classify(),
        .0.line(),
        .0.column()
    )]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("failed to open package {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("no Payload/*.app/Info.plist found in {}", path.display())]
    MissingInfoPlist { path: PathBuf },
    #[error("failed to read Info.plist from {}: {source}", path.display())]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },
    #[error("reading metadata from {} is not supported", path.display())]
    Unsupported { path: PathBuf },
}

/// Missing or contradictory inputs. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("neither ipa_path nor pkg_path is provided")]
    MissingArtifact,
    #[error(
        "one type of authentication required, either provide an Apple ID user with password/app-specific password or an API key with issuer"
    )]
    AmbiguousAuth,
    #[error("no Apple ID user provided")]
    MissingAppleIdUser,
    #[error("neither password nor app-specific password is provided")]
    MissingPassword,
    #[error("no API issuer provided")]
    MissingApiIssuer,
    #[error("no API key id provided and none found in key file name (expected AuthKey_<ID>.p8)")]
    MissingApiKeyId,
    #[error("failed to parse additional altool parameters: {0}")]
    InvalidAdditionalParams(String),
    #[error("app id requires the package's bundle fields, missing: {}", missing.join(", "))]
    MissingBundleFields { missing: Vec<&'static str> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserInfo;
    use insta::assert_snapshot;

    fn full_error() -> UploadError {
        UploadError {
            description: "Validation failed".to_string(),
            reason: "Upload limit reached.".to_string(),
            error_code: 409,
            error_id: "STATE_ERROR.VALIDATION_ERROR".to_string(),
        }
    }

    #[test]
    fn render_with_every_field() {
        assert_snapshot!(
            full_error().render(),
            @"Validation failed (409)  Upload limit reached.  (code: STATE_ERROR.VALIDATION_ERROR)"
        );
    }

    #[test]
    fn render_skips_zero_code_and_empty_parts() {
        let err = UploadError {
            description: "Unable to authenticate.".to_string(),
            ..UploadError::default()
        };
        assert_eq!(err.render(), "Unable to authenticate.");

        let err = UploadError {
            description: "Unable to authenticate.".to_string(),
            error_code: -19209,
            ..UploadError::default()
        };
        assert_eq!(err.render(), "Unable to authenticate. (-19209)");
    }

    #[test]
    fn projection_takes_top_level_fields_only() {
        let pe = ProductError {
            code: 409,
            message: "Validation failed".to_string(),
            user_info: UserInfo {
                description: "Validation failed".to_string(),
                failure_reason: "outer reason".to_string(),
                iris_code: "STATE_ERROR.VALIDATION_ERROR".to_string(),
                ..UserInfo::default()
            },
            underlying_errors: vec![ProductError {
                code: -19241,
                user_info: UserInfo {
                    description: "inner".to_string(),
                    failure_reason: "inner reason".to_string(),
                    inner_code: "INNER".to_string(),
                    ..UserInfo::default()
                },
                ..ProductError::default()
            }],
        };

        let projected = UploadError::from(&pe);
        assert_eq!(projected.description, "Validation failed");
        assert_eq!(projected.reason, "outer reason");
        assert_eq!(projected.error_code, 409);
        assert_eq!(projected.error_id, "STATE_ERROR.VALIDATION_ERROR");
        assert!(!projected.render().contains("inner"));
    }

    #[test]
    fn multiple_failure_mentions_count_and_first() {
        let failure = UploadFailure::Multiple {
            count: 3,
            first: full_error(),
        };
        assert!(failure.to_string().starts_with("3 errors, first: Validation failed (409)"));
        assert_eq!(failure.upload_error(), Some(&full_error()));
    }

    #[test]
    fn rejected_failure_displays_as_the_error() {
        let failure = UploadFailure::Rejected(full_error());
        assert_eq!(failure.to_string(), full_error().render());
        assert!(UploadFailure::NoErrorMessage.upload_error().is_none());
    }

    #[test]
    fn missing_bundle_fields_lists_names() {
        let err = ConfigError::MissingBundleFields {
            missing: vec!["bundle id", "bundle version"],
        };
        assert_eq!(
            err.to_string(),
            "app id requires the package's bundle fields, missing: bundle id, bundle version"
        );
    }
}
