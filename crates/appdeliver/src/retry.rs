//! Attempt loop around an [`Uploader`].
//!
//! An attempt error is retried only when its text matches one of the known
//! transient altool failures below; anything else stops the run at once.

use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use appdeliver_output_sanitizer::Redactor;
use appdeliver_retry::{ErrorClass, RetryStrategyConfig, calculate_delay};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::Reporter;
use crate::error::{UploadError, UploadFailure};
use crate::types::{ProductError, UploadResult};
use crate::uploader::{UploadAttempt, Uploader};

/// Known transient failures, checked in order. Do not remove an entry without
/// confirming the upstream condition is gone.
static RETRYABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // App Store Connect sometimes cannot resolve a freshly registered
        // bundle id for a few minutes after the app record is created.
        r"Unable to determine the application using bundleId",
        // Service-side race: the software type is still 'Undefined' while
        // the previous build of the same app is being processed.
        r"Unable to determine app platform for 'Undefined' software type",
        // Transporter reads the bundle while a parallel job is still
        // writing its staging copy.
        r"(?i)could not (?:read|open) the bundle",
        // Sporadic authentication outage, reported as -19209 although the
        // credentials are valid.
        r"Unable to authenticate|-19209",
        // Gateway failures in front of the upload service.
        r"(?i)invalid response from (?:the )?server|The server returned an invalid response",
        r"(?i)the request timed out",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid retry pattern"))
    .collect()
});

/// Whether `text` matches a known transient failure.
pub fn is_retryable(text: &str) -> bool {
    RETRYABLE_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Classify a failed attempt from its stderr and rendered error.
pub fn classify_attempt(stderr: &str, failure: &UploadFailure) -> ErrorClass {
    if is_retryable(stderr) || is_retryable(&failure.to_string()) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Permanent
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Succeeded,
    FailedFatal,
    FailedExhausted,
}

/// Redacted capture of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub number: u32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
    pub duration_ms: u64,
}

/// Outcome of [`run_with_retry`]; only the final attempt's result survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub state: RunState,
    pub attempts: Vec<AttemptRecord>,
    pub result: UploadResult,
    /// Rendered terminal error, already redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<UploadFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl UploadReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Final attempt's stdout followed by its stderr.
    pub fn raw_output(&self) -> String {
        self.attempts
            .last()
            .map(|a| format!("{}{}", a.stdout, a.stderr))
            .unwrap_or_default()
    }

    /// Every attempt's stdout, in order.
    pub fn combined_stdout(&self) -> String {
        self.attempts
            .iter()
            .map(|a| a.stdout.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn warnings(&self) -> Vec<UploadError> {
        self.result.warnings()
    }
}

/// Drive `uploader` until success, a permanent failure, or the budget is spent.
///
/// A budget of zero is treated as one attempt.
pub fn run_with_retry(
    uploader: &mut dyn Uploader,
    config: &RetryStrategyConfig,
    redactor: &Redactor,
    reporter: &mut dyn Reporter,
) -> UploadReport {
    run_with_retry_and_sleep(uploader, config, redactor, reporter, thread::sleep)
}

pub(crate) fn run_with_retry_and_sleep(
    uploader: &mut dyn Uploader,
    config: &RetryStrategyConfig,
    redactor: &Redactor,
    reporter: &mut dyn Reporter,
    mut sleep: impl FnMut(Duration),
) -> UploadReport {
    let max_attempts = config.max_attempts.max(1);
    let started_at = Utc::now();
    // Grows with tokens altool prints, for this attempt and every later one.
    let mut redactor = redactor.clone();
    let mut attempts = Vec::new();

    let mut attempt_no = 0;
    loop {
        attempt_no += 1;
        reporter.info(&format!("attempt {attempt_no}/{max_attempts}"));

        let start = Instant::now();
        let UploadAttempt {
            stdout,
            stderr,
            result,
            error,
        } = uploader.upload(reporter);
        let duration_ms = start.elapsed().as_millis() as u64;

        let learned = redactor.learn_from_output(&stdout) + redactor.learn_from_output(&stderr);
        if learned > 0 {
            reporter.debug(&format!("{learned} token(s) from altool output registered for redaction"));
        }
        let stdout = redactor.redact(&stdout);
        let stderr = redactor.redact(&stderr);
        if !stdout.is_empty() {
            reporter.debug(&format!("altool output:\n{stdout}"));
        }

        let class = error.as_ref().map(|e| classify_attempt(&stderr, e));
        if let Some(class) = class {
            reporter.debug(&format!("attempt {attempt_no} classified as {class}"));
        }
        attempts.push(AttemptRecord {
            number: attempt_no,
            stdout,
            stderr,
            class,
            duration_ms,
        });

        let state = match (&error, class) {
            (None, _) => RunState::Succeeded,
            (Some(_), Some(ErrorClass::Retryable)) if attempt_no < max_attempts => {
                let delay = calculate_delay(config, attempt_no);
                reporter.warn(&format!(
                    "attempt {attempt_no} failed with a transient error: {}",
                    error
                        .as_ref()
                        .map(|e| redactor.redact(&e.to_string()))
                        .unwrap_or_default()
                ));
                reporter.warn(&format!(
                    "retrying in {}",
                    humantime::format_duration(delay)
                ));
                sleep(delay);
                continue;
            }
            (Some(_), Some(ErrorClass::Retryable)) => RunState::FailedExhausted,
            (Some(_), _) => RunState::FailedFatal,
        };

        let mut result = result;
        redact_result(&mut result, &redactor);
        if let Some(e) = result.product_errors.first() {
            reporter.debug(&format!(
                "first product error carries {} nested error(s)",
                e.depth_first_count() - 1
            ));
        }

        return UploadReport {
            state,
            attempts,
            result,
            error: error.as_ref().map(|e| redactor.redact(&e.to_string())),
            failure: error,
            started_at,
            finished_at: Utc::now(),
        };
    }
}

fn redact_result(result: &mut UploadResult, redactor: &Redactor) {
    result.success_message = redactor.redact(&result.success_message);
    for pe in result
        .product_errors
        .iter_mut()
        .chain(result.warnings.iter_mut())
    {
        redact_product_error(pe, redactor);
    }
}

fn redact_product_error(pe: &mut ProductError, redactor: &Redactor) {
    let info = &mut pe.user_info;
    for field in [
        &mut pe.message,
        &mut info.description,
        &mut info.failure_reason,
        &mut info.detail,
        &mut info.meta,
        &mut info.title,
        &mut info.underlying_error_text,
    ] {
        *field = redactor.redact(field);
    }
    for child in &mut pe.underlying_errors {
        redact_product_error(child, redactor);
    }
}
