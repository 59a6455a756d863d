//! # appdeliver
//!
//! Uploads an app archive (`.ipa` / `.pkg`) to App Store Connect with
//! `xcrun altool` from a CI pipeline and decides, per attempt, whether the
//! outcome is a success, a known transient failure worth retrying, or a fatal
//! error.
//!
//! ## Pipeline
//!
//! 1. [`config::DeliverConfig::build_request`] merges `.appdeliver.toml` with
//!    CLI/env values and validates them into an [`engine::UploadRequest`].
//! 2. [`engine::prepare_upload`] resolves the platform and bundle identity
//!    ([`package`]) and builds the altool arguments ([`command`]).
//! 3. [`engine::perform_upload`] runs them through an [`uploader::Uploader`]
//!    inside [`retry::run_with_retry`], parsing each attempt's output with
//!    [`output`].
//!
//! Secrets in printed commands, captured output and reports are replaced by
//! [`appdeliver_output_sanitizer::REDACTED`].
//!
//! ## Modules
//!
//! - [`types`]: altool result model: results, product errors, bundle identity
//! - [`error`]: typed errors and the rendered upload error
//! - [`package`]: Info.plist inspection and platform inference
//! - [`command`]: altool argument assembly, gated on the Xcode version
//! - [`output`]: JSON/text output parsing
//! - [`uploader`]: real and scripted uploaders
//! - [`retry`]: transient-failure patterns and the attempt loop
//! - [`auth`]: Apple ID / API key credentials
//! - [`config`]: `.appdeliver.toml` and CLI merging
//! - [`environment`]: Xcode version and tool discovery
//! - [`engine`]: the "perform upload" driver and the [`engine::Reporter`] trait

pub mod auth;
pub mod command;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod output;
pub mod package;
pub mod retry;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod test_support;
