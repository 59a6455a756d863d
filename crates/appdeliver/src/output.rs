//! Normalizing altool's stdout/stderr into an [`UploadResult`].
//!
//! altool prints a single JSON object with `--output-format json`, but verbose
//! logging can surround it with noise, so the object is located by line
//! anchors rather than by decoding the whole stream.

use std::sync::LazyLock;

use regex::Regex;

use crate::engine::Reporter;
use crate::error::{OutputParseError, UploadError, UploadFailure};
use crate::types::UploadResult;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^\s*\{.*\}\s*$").expect("valid JSON block pattern"));

const TEXT_ERROR_MARKER: &str = "ERROR:";
const TEXT_SUCCESS_MARKER: &str = "UPLOAD SUCCEEDED";

/// Which parser produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Json,
    Text,
}

/// Outcome of parsing one invocation's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub result: UploadResult,
    pub error: Option<UploadFailure>,
    pub source: OutputSource,
}

/// Extract and decode the JSON result object from stdout.
pub fn parse_json_output(stdout: &str) -> Result<UploadResult, OutputParseError> {
    let block = JSON_BLOCK
        .find(stdout)
        .ok_or(OutputParseError::NoJson)?
        .as_str();
    Ok(serde_json::from_str(block)?)
}

/// Whether either stream carries altool's plain-text success banner.
pub fn text_reports_success(stdout: &str, stderr: &str) -> bool {
    stdout.contains(TEXT_SUCCESS_MARKER) || stderr.contains(TEXT_SUCCESS_MARKER)
}

/// Parse an invocation's output.
///
/// With `json_expected`, a missing or undecodable JSON object is reported as a
/// warning and parsing falls back to the text rules.
pub fn parse_output(
    reporter: &mut dyn Reporter,
    stdout: &str,
    stderr: &str,
    json_expected: bool,
) -> ParsedOutput {
    if json_expected {
        match parse_json_output(stdout) {
            Ok(result) => {
                let error = result.error();
                return ParsedOutput {
                    result,
                    error,
                    source: OutputSource::Json,
                };
            }
            Err(e) => reporter.warn(&format!("{e}, falling back to text output parsing")),
        }
    }

    let (result, error) =
        if stderr.contains(TEXT_ERROR_MARKER) && !text_reports_success(stdout, stderr) {
            (
                UploadResult::default(),
                Some(UploadFailure::Output(stderr.to_string())),
            )
        } else {
            (UploadResult::text_success(), None)
        };

    ParsedOutput {
        result,
        error,
        source: OutputSource::Text,
    }
}

impl UploadResult {
    /// The failure this result represents, `None` on success.
    pub fn error(&self) -> Option<UploadFailure> {
        if self.is_success() {
            return None;
        }
        match self.product_errors.as_slice() {
            [] => Some(UploadFailure::NoErrorMessage),
            [only] => Some(UploadFailure::Rejected(only.into())),
            [first, ..] => Some(UploadFailure::Multiple {
                count: self.product_errors.len(),
                first: first.into(),
            }),
        }
    }

    /// Every top-level warning, in order, whatever the outcome.
    pub fn warnings(&self) -> Vec<UploadError> {
        self.warnings.iter().map(UploadError::from).collect()
    }
}
