//! Assembly of the altool argument list.
//!
//! The list always starts with the tool name (`altool`); the program that
//! runs it (normally `xcrun`) is chosen by the uploader.

use std::path::Path;

use appdeliver_output_sanitizer::Redactor;
use shlex::try_join;

use crate::engine::Reporter;
use crate::types::{PackageDetails, PlatformType};

/// First Xcode major version whose altool supports `--upload-package`
/// without a bundle identity and accepts `--apple-id`.
pub const UPLOAD_PACKAGE_MIN_XCODE: u32 = 26;

pub const TOOL_NAME: &str = "altool";

const TYPE_FLAG: &str = "--type";
const TYPE_FLAG_SHORT: &str = "-t";
const OUTPUT_FORMAT_FLAG: &str = "--output-format";
const VERBOSE_FLAG: &str = "--verbose";

/// Everything the builder needs for one invocation.
#[derive(Debug, Clone)]
pub struct UploadCommandSpec<'a> {
    pub file_path: &'a Path,
    pub package_details: &'a PackageDetails,
    pub platform: PlatformType,
    pub additional_params: &'a [String],
    pub auth_params: &'a [String],
    pub xcode_major_version: u32,
    pub app_id: &'a str,
    pub verbose: bool,
}

impl UploadCommandSpec<'_> {
    /// Whether the tool is new enough for `--upload-package` and `--apple-id`.
    pub fn supports_upload_package(&self) -> bool {
        self.xcode_major_version >= UPLOAD_PACKAGE_MIN_XCODE
    }

    /// Whether altool will be asked for JSON output, i.e. the caller did not
    /// pick an output format of their own.
    pub fn json_output_expected(&self) -> bool {
        !has_flag(self.additional_params, OUTPUT_FORMAT_FLAG)
    }
}

fn has_flag(params: &[String], flag: &str) -> bool {
    params.iter().any(|p| p == flag)
}

/// Build `[altool, upload params.., auth params.., additional params..]`.
///
/// Never fails; unsupported combinations are reported as warnings.
pub fn build_upload_command(
    spec: &UploadCommandSpec<'_>,
    reporter: &mut dyn Reporter,
) -> Vec<String> {
    let path = spec.file_path.to_string_lossy().into_owned();

    let mut upload_params: Vec<String> = if spec.supports_upload_package() {
        vec!["--upload-package".into(), path]
    } else {
        vec!["--upload-app".into(), "-f".into(), path]
    };

    if !has_flag(spec.additional_params, TYPE_FLAG)
        && !has_flag(spec.additional_params, TYPE_FLAG_SHORT)
    {
        upload_params.push(TYPE_FLAG.into());
        upload_params.push(spec.platform.as_str().into());
    }

    if !spec.app_id.is_empty() {
        if spec.supports_upload_package() {
            let details = spec.package_details;
            upload_params.extend([
                "--apple-id".to_string(),
                spec.app_id.to_string(),
                "--bundle-id".to_string(),
                details.bundle_id.clone(),
                "--bundle-version".to_string(),
                details.bundle_version.clone(),
                "--bundle-short-version-string".to_string(),
                details.bundle_short_version_string.clone(),
            ]);
        } else {
            reporter.warn(&format!(
                "App ID is not supported with Xcode versions below {UPLOAD_PACKAGE_MIN_XCODE}, ignoring it."
            ));
        }
    }

    let mut additional_params = spec.additional_params.to_vec();
    if spec.json_output_expected() {
        additional_params.push(OUTPUT_FORMAT_FLAG.into());
        additional_params.push("json".into());
    } else {
        reporter.warn("Custom --output-format set, altool output parsing might fail!");
    }
    if spec.verbose && !has_flag(&additional_params, VERBOSE_FLAG) {
        additional_params.push(VERBOSE_FLAG.into());
    }

    let mut command = Vec::with_capacity(
        1 + upload_params.len() + spec.auth_params.len() + additional_params.len(),
    );
    command.push(TOOL_NAME.to_string());
    command.extend(upload_params);
    command.extend(spec.auth_params.iter().cloned());
    command.extend(additional_params);
    command
}

/// Shell-quoted, redacted rendering of `program args..` for logs.
pub fn printable_command(program: &str, args: &[String], redactor: &Redactor) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(redactor.redact_args(args));
    try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::test_support::{CollectingReporter, args};

    fn details() -> PackageDetails {
        PackageDetails {
            bundle_id: "com.example.app".to_string(),
            bundle_version: "42".to_string(),
            bundle_short_version_string: "1.2.3".to_string(),
        }
    }

    struct Fixture {
        path: PathBuf,
        details: PackageDetails,
        additional: Vec<String>,
        auth: Vec<String>,
    }

    impl Fixture {
        fn new(additional: &[&str]) -> Self {
            Self {
                path: PathBuf::from("/tmp/build/App.ipa"),
                details: details(),
                additional: args(additional),
                auth: args(&["--apiKey", "KEY123", "--apiIssuer", "issuer-1"]),
            }
        }

        fn spec(&self, version: u32, app_id: &'static str) -> UploadCommandSpec<'_> {
            UploadCommandSpec {
                file_path: &self.path,
                package_details: &self.details,
                platform: PlatformType::Ios,
                additional_params: &self.additional,
                auth_params: &self.auth,
                xcode_major_version: version,
                app_id,
                verbose: false,
            }
        }
    }

    #[test]
    fn legacy_upload_app_below_threshold() {
        let fx = Fixture::new(&[]);
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&fx.spec(16, ""), &mut reporter);
        assert_eq!(
            cmd,
            args(&[
                "altool",
                "--upload-app",
                "-f",
                "/tmp/build/App.ipa",
                "--type",
                "ios",
                "--apiKey",
                "KEY123",
                "--apiIssuer",
                "issuer-1",
                "--output-format",
                "json",
            ])
        );
        assert!(reporter.warns.is_empty());
    }

    #[test]
    fn upload_package_with_identity_at_threshold() {
        let fx = Fixture::new(&["--team-id", "TEAM"]);
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&fx.spec(26, "1234567890"), &mut reporter);
        assert_eq!(
            cmd,
            args(&[
                "altool",
                "--upload-package",
                "/tmp/build/App.ipa",
                "--type",
                "ios",
                "--apple-id",
                "1234567890",
                "--bundle-id",
                "com.example.app",
                "--bundle-version",
                "42",
                "--bundle-short-version-string",
                "1.2.3",
                "--apiKey",
                "KEY123",
                "--apiIssuer",
                "issuer-1",
                "--team-id",
                "TEAM",
                "--output-format",
                "json",
            ])
        );
    }

    #[test]
    fn app_id_below_threshold_is_ignored_with_warning() {
        let fx = Fixture::new(&[]);
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&fx.spec(15, "1234567890"), &mut reporter);
        assert!(!cmd.contains(&"--apple-id".to_string()));
        assert!(!cmd.contains(&"--bundle-id".to_string()));
        assert_eq!(
            reporter.warns,
            ["App ID is not supported with Xcode versions below 26, ignoring it."]
        );
    }

    #[test]
    fn caller_type_flag_wins() {
        let fx = Fixture::new(&["--type", "macos"]);
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&fx.spec(26, ""), &mut reporter);
        assert_eq!(cmd.iter().filter(|a| *a == "--type").count(), 1);
        let pos = cmd.iter().position(|a| a == "--type").expect("type flag");
        assert_eq!(cmd[pos + 1], "macos");
    }

    #[test]
    fn custom_output_format_is_kept_and_warned() {
        let fx = Fixture::new(&["--output-format", "xml"]);
        let mut reporter = CollectingReporter::default();
        let spec = fx.spec(26, "");
        assert!(!spec.json_output_expected());
        let cmd = build_upload_command(&spec, &mut reporter);
        assert!(!cmd.contains(&"json".to_string()));
        assert_eq!(
            reporter.warns,
            ["Custom --output-format set, altool output parsing might fail!"]
        );
    }

    #[test]
    fn verbose_is_added_once() {
        let fx = Fixture::new(&[]);
        let mut reporter = CollectingReporter::default();
        let mut spec = fx.spec(26, "");
        spec.verbose = true;
        let cmd = build_upload_command(&spec, &mut reporter);
        assert_eq!(cmd.last().map(String::as_str), Some("--verbose"));

        let fx = Fixture::new(&["--verbose"]);
        let mut spec = fx.spec(26, "");
        spec.verbose = true;
        let cmd = build_upload_command(&spec, &mut reporter);
        assert_eq!(cmd.iter().filter(|a| *a == "--verbose").count(), 1);
    }

    #[test]
    fn printable_command_quotes_and_redacts() {
        let redactor = Redactor::new(["hunter2"]);
        let cmd = args(&[
            "altool",
            "--upload-app",
            "-f",
            "/tmp/My Build/App.ipa",
            "-u",
            "me@example.com",
            "-p",
            "hunter2",
        ]);
        let printed = printable_command("xcrun", &cmd, &redactor);
        assert!(printed.starts_with("xcrun altool --upload-app -f "));
        let tokens = shlex::split(&printed).expect("splittable");
        assert_eq!(tokens[4], "/tmp/My Build/App.ipa");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("hunter2"));
    }
}
