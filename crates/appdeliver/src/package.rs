//! Package inspection: bundle identity and platform of an `.ipa`/`.pkg`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;

use crate::engine::Reporter;
use crate::error::InspectError;
use crate::types::{PackageDetails, PlatformType};

/// Metadata fields read from a package's embedded Info.plist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageMetadata {
    #[serde(rename = "CFBundleIdentifier")]
    pub bundle_id: Option<String>,
    #[serde(rename = "CFBundleVersion")]
    pub bundle_version: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    pub short_version: Option<String>,
    #[serde(rename = "DTPlatformName")]
    pub platform_name: Option<String>,
}

/// Reads bundle metadata from a package file.
pub trait PackageMetadataReader {
    fn read_metadata(&self, package_path: &Path) -> Result<PackageMetadata, InspectError>;
}

/// Reads `Payload/<App>.app/Info.plist` out of an `.ipa` archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveMetadataReader;

impl PackageMetadataReader for ArchiveMetadataReader {
    fn read_metadata(&self, package_path: &Path) -> Result<PackageMetadata, InspectError> {
        if is_pkg(package_path) {
            return Err(InspectError::Unsupported {
                path: package_path.to_path_buf(),
            });
        }

        let file = File::open(package_path).map_err(|source| InspectError::Open {
            path: package_path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| InspectError::Archive {
            path: package_path.to_path_buf(),
            source,
        })?;

        let plist_name = archive
            .file_names()
            .find(|name| is_app_info_plist(name))
            .map(str::to_string)
            .ok_or_else(|| InspectError::MissingInfoPlist {
                path: package_path.to_path_buf(),
            })?;

        let mut entry = archive
            .by_name(&plist_name)
            .map_err(|source| InspectError::Archive {
                path: package_path.to_path_buf(),
                source,
            })?;
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| InspectError::Open {
                path: package_path.to_path_buf(),
                source,
            })?;

        plist::from_bytes(&bytes).map_err(|source| InspectError::Plist {
            path: package_path.to_path_buf(),
            source,
        })
    }
}

fn is_pkg(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pkg")
}

fn is_app_info_plist(name: &str) -> bool {
    let parts: Vec<&str> = name.split('/').collect();
    matches!(parts.as_slice(), ["Payload", app, "Info.plist"] if app.ends_with(".app"))
}

/// Fill the empty fields of `overrides` from the package's metadata.
///
/// Fails only when the package cannot be read. Fields the Info.plist lacks
/// stay empty; [`PackageDetails::missing_fields`] lists them.
pub fn inspect_package(
    reader: &dyn PackageMetadataReader,
    package_path: &Path,
    overrides: &PackageDetails,
) -> Result<PackageDetails, InspectError> {
    let meta = reader.read_metadata(package_path)?;

    let mut details = overrides.clone();
    fill(&mut details.bundle_id, meta.bundle_id);
    fill(&mut details.bundle_version, meta.bundle_version);
    fill(&mut details.bundle_short_version_string, meta.short_version);

    Ok(details)
}

fn fill(slot: &mut String, parsed: Option<String>) {
    if slot.is_empty() {
        if let Some(value) = parsed {
            *slot = value;
        }
    }
}

/// Map a platform selector to altool's `--type` value.
///
/// `auto` looks at the file extension first and then at `DTPlatformName`.
/// Any failure falls back to iOS with a warning; this never aborts a run.
pub fn classify_platform(
    reporter: &mut dyn Reporter,
    reader: &dyn PackageMetadataReader,
    file_path: &Path,
    selector: &str,
) -> PlatformType {
    let mut fallback = |reason: String| {
        reporter.warn(&format!("Automatic platform type lookup failed: {reason}"));
        reporter.warn("Falling back to using `ios` as platform type");
        PlatformType::Ios
    };

    match selector {
        "auto" => {
            if is_pkg(file_path) {
                return PlatformType::MacOs;
            }
            let meta = match reader.read_metadata(file_path) {
                Ok(meta) => meta,
                Err(e) => return fallback(e.to_string()),
            };
            let Some(platform) = meta.platform_name else {
                return fallback("no DTPlatformName found in Info.plist".to_string());
            };
            match platform.as_str() {
                "appletvos" | "appletvsimulator" => PlatformType::TvOs,
                "macosx" => PlatformType::MacOs,
                "iphoneos" | "iphonesimulator" | "watchos" | "watchsimulator" => PlatformType::Ios,
                other => fallback(format!("unknown platform: {other}")),
            }
        }
        "ios" => PlatformType::Ios,
        "macos" => PlatformType::MacOs,
        "tvos" => PlatformType::TvOs,
        other => fallback(format!("inconsistent platform: {other}")),
    }
}
