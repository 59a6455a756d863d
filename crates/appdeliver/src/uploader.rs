//! One upload invocation, real or scripted.

use std::collections::VecDeque;

use appdeliver_process::run_command;

use crate::engine::Reporter;
use crate::error::UploadFailure;
use crate::output::{OutputSource, parse_output, text_reports_success};
use crate::types::UploadResult;

/// Captured output and classification of a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadAttempt {
    pub stdout: String,
    pub stderr: String,
    pub result: UploadResult,
    pub error: Option<UploadFailure>,
}

impl UploadAttempt {
    pub fn succeeded(result: UploadResult) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    pub fn failed(stderr: impl Into<String>, error: UploadFailure) -> Self {
        Self {
            stderr: stderr.into(),
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Runs the upload tool once per call.
pub trait Uploader {
    fn upload(&mut self, reporter: &mut dyn Reporter) -> UploadAttempt;
}

/// Runs `program args..` (normally `xcrun altool ...`) and parses its output.
#[derive(Debug, Clone)]
pub struct AltoolUploader {
    program: String,
    args: Vec<String>,
    json_expected: bool,
}

impl AltoolUploader {
    pub fn new(program: impl Into<String>, args: Vec<String>, json_expected: bool) -> Self {
        Self {
            program: program.into(),
            args,
            json_expected,
        }
    }
}

impl Uploader for AltoolUploader {
    fn upload(&mut self, reporter: &mut dyn Reporter) -> UploadAttempt {
        let out = match run_command(&self.program, &self.args) {
            Ok(out) => out,
            Err(e) => {
                return UploadAttempt::failed(String::new(), UploadFailure::Spawn(format!("{e:#}")));
            }
        };

        let parsed = parse_output(reporter, &out.stdout, &out.stderr, self.json_expected);
        let mut error = parsed.error;

        // A crashed or killed tool often prints nothing recognizable; only an
        // explicit success signal may outweigh a non-zero exit.
        if error.is_none()
            && !out.success
            && parsed.source == OutputSource::Text
            && !text_reports_success(&out.stdout, &out.stderr)
        {
            error = Some(UploadFailure::ExitStatus {
                code: out.exit_code,
            });
        }

        UploadAttempt {
            stdout: out.stdout,
            stderr: out.stderr,
            result: parsed.result,
            error,
        }
    }
}

/// Replays prepared attempts in order; the last one repeats once the queue
/// runs dry.
#[derive(Debug, Clone, Default)]
pub struct ScriptedUploader {
    queue: VecDeque<UploadAttempt>,
    last: Option<UploadAttempt>,
    calls: usize,
}

impl ScriptedUploader {
    pub fn new(attempts: impl IntoIterator<Item = UploadAttempt>) -> Self {
        Self {
            queue: attempts.into_iter().collect(),
            last: None,
            calls: 0,
        }
    }

    /// Number of times [`Uploader::upload`] was called.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Uploader for ScriptedUploader {
    fn upload(&mut self, _reporter: &mut dyn Reporter) -> UploadAttempt {
        self.calls += 1;
        if let Some(next) = self.queue.pop_front() {
            self.last = Some(next.clone());
            return next;
        }
        self.last.clone().unwrap_or_else(|| {
            UploadAttempt::failed(
                String::new(),
                UploadFailure::Spawn("no scripted attempts configured".to_string()),
            )
        })
    }
}
