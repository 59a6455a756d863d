use std::path::PathBuf;

use appdeliver_output_sanitizer::{REDACTED, Redactor};
use appdeliver_retry::RetryStrategyConfig;

use crate::auth::Credentials;
use crate::command::{
    UPLOAD_PACKAGE_MIN_XCODE, UploadCommandSpec, build_upload_command, printable_command,
};
use crate::error::ConfigError;
use crate::package::{PackageMetadataReader, classify_platform, inspect_package};
use crate::retry::{UploadReport, run_with_retry};
use crate::types::{PackageDetails, PlatformType};
use crate::uploader::{AltoolUploader, Uploader};

pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
    fn debug(&mut self, _msg: &str) {}
}

/// Everything needed for one "perform upload" run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub file_path: PathBuf,
    /// Explicit values; empty fields may be filled from the package.
    pub package_details: PackageDetails,
    pub platform_selector: String,
    pub additional_params: Vec<String>,
    pub credentials: Credentials,
    pub xcode_major_version: u32,
    pub app_id: String,
    pub verbose: bool,
    pub retry: RetryStrategyConfig,
}

/// A ready-to-run invocation plus what was resolved on the way.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub platform: PlatformType,
    pub package_details: PackageDetails,
    pub args: Vec<String>,
    pub json_expected: bool,
    pub redactor: Redactor,
}

impl PreparedUpload {
    pub fn printable(&self, program: &str) -> String {
        printable_command(program, &self.args, &self.redactor)
    }
}

/// Resolve platform and bundle identity, then build the altool arguments.
pub fn prepare_upload(
    request: &UploadRequest,
    reader: &dyn PackageMetadataReader,
    reporter: &mut dyn Reporter,
) -> Result<PreparedUpload, ConfigError> {
    let path = request.file_path.as_path();
    let platform = classify_platform(reporter, reader, path, &request.platform_selector);

    let mut package_details = request.package_details.clone();
    let needs_identity =
        !request.app_id.is_empty() && request.xcode_major_version >= UPLOAD_PACKAGE_MIN_XCODE;
    if needs_identity && package_details.has_missing_fields() {
        match inspect_package(reader, path, &package_details) {
            Ok(details) => package_details = details,
            Err(e) => reporter.warn(&format!("Failed to read package details: {e}")),
        }
        if package_details.has_missing_fields() {
            return Err(ConfigError::MissingBundleFields {
                missing: package_details.missing_fields(),
            });
        }
    }

    let auth_params = request.credentials.to_params();
    let spec = UploadCommandSpec {
        file_path: path,
        package_details: &package_details,
        platform,
        additional_params: &request.additional_params,
        auth_params: &auth_params,
        xcode_major_version: request.xcode_major_version,
        app_id: &request.app_id,
        verbose: request.verbose,
    };
    let args = build_upload_command(&spec, reporter);
    let json_expected = spec.json_output_expected();
    let redactor = Redactor::new(request.credentials.secrets());
    reporter.debug(&format!(
        "{} secret value(s) registered for redaction",
        redactor.secret_count()
    ));
    if redactor.collides_with_token() {
        reporter.warn(&format!(
            "a secret value also occurs in {REDACTED}; redacted output may still show it"
        ));
    }

    Ok(PreparedUpload {
        platform,
        package_details,
        args,
        json_expected,
        redactor,
    })
}

/// Prepare the invocation and run it through `program` with retries.
pub fn perform_upload(
    request: &UploadRequest,
    reader: &dyn PackageMetadataReader,
    program: &str,
    reporter: &mut dyn Reporter,
) -> Result<UploadReport, ConfigError> {
    let prepared = prepare_upload(request, reader, reporter)?;
    let mut uploader = AltoolUploader::new(program, prepared.args.clone(), prepared.json_expected);
    Ok(run_prepared(&prepared, request, program, &mut uploader, reporter))
}

/// Run an already prepared invocation through any [`Uploader`].
pub fn run_prepared(
    prepared: &PreparedUpload,
    request: &UploadRequest,
    program: &str,
    uploader: &mut dyn Uploader,
    reporter: &mut dyn Reporter,
) -> UploadReport {
    let file_name = request
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    reporter.info(&format!(
        "Uploading - {file_name} ({}, {} auth) ...",
        prepared.platform,
        request.credentials.kind()
    ));
    reporter.info(&format!("$ {}", prepared.printable(program)));

    let report = run_with_retry(uploader, &request.retry, &prepared.redactor, reporter);

    match &report.error {
        None => reporter.info(&format!(
            "{} uploaded after {} attempt(s)",
            file_name,
            report.attempts.len()
        )),
        Some(msg) => reporter.error(&format!("Upload failed ({:?}): {msg}", report.state)),
    }
    report
}
