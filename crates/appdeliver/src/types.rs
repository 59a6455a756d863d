use std::fmt;

use serde::{Deserialize, Serialize};

/// Value passed to altool's `--type` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformType {
    #[serde(rename = "ios")]
    Ios,
    #[serde(rename = "appletvos")]
    TvOs,
    #[serde(rename = "macos")]
    MacOs,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Ios => "ios",
            PlatformType::TvOs => "appletvos",
            PlatformType::MacOs => "macos",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bundle identity of the uploaded package.
///
/// Explicitly configured fields win; inspection only fills empty ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub bundle_id: String,
    pub bundle_version: String,
    pub bundle_short_version_string: String,
}

impl PackageDetails {
    pub fn has_missing_fields(&self) -> bool {
        !self.missing_fields().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bundle_id.is_empty() {
            missing.push("bundle id");
        }
        if self.bundle_version.is_empty() {
            missing.push("bundle version");
        }
        if self.bundle_short_version_string.is_empty() {
            missing.push("bundle short version string");
        }
        missing
    }
}

/// `user-info` dictionary of a product error.
///
/// ```text
/// "user-info" : {
///   "NSLocalizedDescription" : "The provided entity includes an attribute with a value that has already been used",
///   "NSLocalizedFailureReason" : "The bundle version must be higher than the previously uploaded version.",
///   "code" : "ENTITY_ERROR.ATTRIBUTE.INVALID.DUPLICATE",
///   "id" : "c1a5ca15-d0c8-49b4-893f-dc187711f6f0",
///   "status" : "409",
///   ...
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    #[serde(rename = "NSLocalizedDescription", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "NSLocalizedFailureReason", skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,
    // Nested nodes only
    #[serde(rename = "code", skip_serializing_if = "String::is_empty")]
    pub inner_code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub meta: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    // Top-level nodes only
    #[serde(rename = "NSUnderlyingError", skip_serializing_if = "String::is_empty")]
    pub underlying_error_text: String,
    #[serde(rename = "iris-code", skip_serializing_if = "String::is_empty")]
    pub iris_code: String,
}

/// One node of the error cause chain reported by the upload service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductError {
    pub code: i64,
    pub message: String,
    #[serde(rename = "user-info")]
    pub user_info: UserInfo,
    #[serde(rename = "underlying-errors")]
    pub underlying_errors: Vec<ProductError>,
}

impl ProductError {
    /// Number of nodes in this error's cause tree, including itself.
    pub fn depth_first_count(&self) -> usize {
        1 + self
            .underlying_errors
            .iter()
            .map(ProductError::depth_first_count)
            .sum::<usize>()
    }
}

/// `details` of a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessDetails {
    #[serde(rename = "delivery-uuid", skip_serializing_if = "String::is_empty")]
    pub delivery_uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub transferred: String,
}

/// Normalized result of one altool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadResult {
    #[serde(rename = "success-message", skip_serializing_if = "String::is_empty")]
    pub success_message: String,
    #[serde(rename = "details")]
    pub success_details: SuccessDetails,
    #[serde(rename = "product-errors", skip_serializing_if = "Vec::is_empty")]
    pub product_errors: Vec<ProductError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ProductError>,
    #[serde(rename = "os-version", skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(rename = "tool-version", skip_serializing_if = "String::is_empty")]
    pub tool_version: String,
    #[serde(rename = "tool-path", skip_serializing_if = "String::is_empty")]
    pub tool_path: String,
}

impl UploadResult {
    /// Result used when text output signals success.
    pub fn text_success() -> Self {
        Self {
            success_message: "Upload succeeded".to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        !self.success_message.is_empty()
    }
}
