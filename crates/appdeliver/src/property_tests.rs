//! Property-based tests for upload invariants.
//!
//! - Xcode versions below the `--upload-package` threshold never get identity flags
//! - A caller-supplied `--type` is never duplicated
//! - Warnings are projected one-to-one and in order
//! - Registered secrets never reach a printed command or report
//! - The attempt loop calls the uploader exactly as often as the outcomes require

use std::path::PathBuf;

use appdeliver_output_sanitizer::{REDACTED, Redactor};
use appdeliver_retry::RetryStrategyConfig;
use proptest::prelude::*;

use crate::command::{
    UPLOAD_PACKAGE_MIN_XCODE, UploadCommandSpec, build_upload_command, printable_command,
};
use crate::error::UploadFailure;
use crate::retry::{RunState, run_with_retry_and_sleep};
use crate::test_support::CollectingReporter;
use crate::types::{PackageDetails, PlatformType, ProductError, UploadResult, UserInfo};
use crate::uploader::{ScriptedUploader, UploadAttempt};

const IDENTITY_FLAGS: [&str; 4] = [
    "--apple-id",
    "--bundle-id",
    "--bundle-version",
    "--bundle-short-version-string",
];

fn platform_strategy() -> impl Strategy<Value = PlatformType> {
    prop_oneof![
        Just(PlatformType::Ios),
        Just(PlatformType::TvOs),
        Just(PlatformType::MacOs),
    ]
}

fn flag_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("--[a-z]{2,10}|[A-Za-z0-9]{1,8}", 0..6)
}

fn details() -> PackageDetails {
    PackageDetails {
        bundle_id: "com.example.app".to_string(),
        bundle_version: "1".to_string(),
        bundle_short_version_string: "1.0".to_string(),
    }
}

fn transient() -> UploadAttempt {
    UploadAttempt::failed(
        "The request timed out.",
        UploadFailure::Output("The request timed out.".to_string()),
    )
}

proptest! {
    #[test]
    fn legacy_versions_never_emit_identity_flags(
        version in 0u32..UPLOAD_PACKAGE_MIN_XCODE,
        app_id in "[0-9]{1,12}",
        platform in platform_strategy(),
        additional in flag_strategy(),
    ) {
        let path = PathBuf::from("/tmp/App.ipa");
        let details = details();
        let spec = UploadCommandSpec {
            file_path: &path,
            package_details: &details,
            platform,
            additional_params: &additional,
            auth_params: &[],
            xcode_major_version: version,
            app_id: &app_id,
            verbose: false,
        };
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&spec, &mut reporter);

        // [altool, upload params.., additional.., --output-format, json]
        let prefix = &cmd[..cmd.len() - additional.len() - 2];
        prop_assert!(!prefix.iter().any(|a| IDENTITY_FLAGS.contains(&a.as_str())));
        prop_assert!(reporter.warns.iter().any(|w| w.contains("App ID is not supported")));
    }

    #[test]
    fn type_flag_is_never_duplicated(
        version in 0u32..40,
        platform in platform_strategy(),
        mut additional in flag_strategy(),
        insert_at in 0usize..6,
    ) {
        let at = insert_at.min(additional.len());
        additional.insert(at, "--type".to_string());
        additional.insert(at + 1, "macos".to_string());

        let path = PathBuf::from("/tmp/App.pkg");
        let details = details();
        let spec = UploadCommandSpec {
            file_path: &path,
            package_details: &details,
            platform,
            additional_params: &additional,
            auth_params: &[],
            xcode_major_version: version,
            app_id: "",
            verbose: true,
        };
        let mut reporter = CollectingReporter::default();
        let cmd = build_upload_command(&spec, &mut reporter);
        let expected = additional.iter().filter(|a| *a == "--type").count();
        prop_assert_eq!(cmd.iter().filter(|a| *a == "--type").count(), expected);
    }

    #[test]
    fn warnings_keep_count_and_order(
        codes in prop::collection::vec(any::<i64>(), 0..8),
        success in any::<bool>(),
    ) {
        let result = UploadResult {
            success_message: if success { "ok".to_string() } else { String::new() },
            warnings: codes
                .iter()
                .map(|code| ProductError {
                    code: *code,
                    user_info: UserInfo {
                        description: format!("warning {code}"),
                        ..UserInfo::default()
                    },
                    ..ProductError::default()
                })
                .collect(),
            ..UploadResult::default()
        };
        let warnings = result.warnings();
        prop_assert_eq!(warnings.len(), codes.len());
        for (warning, code) in warnings.iter().zip(&codes) {
            prop_assert_eq!(warning.error_code, *code);
        }
    }

    #[test]
    fn secrets_never_reach_printed_command(
        secret in "[A-Za-z0-9!#%+_-]{8,24}",
        extra in flag_strategy(),
    ) {
        let redactor = Redactor::new([secret.clone()]);
        let mut args: Vec<String> = ["altool", "-u", "me@example.com", "-p", secret.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(extra);
        args.push(format!("--note=contains-{secret}"));

        let printed = printable_command("xcrun", &args, &redactor);
        prop_assert!(!printed.contains(&secret));
        prop_assert!(printed.contains(REDACTED));
    }

    #[test]
    fn transient_failures_then_success_call_exactly_k_times(
        budget in 1u32..12,
        k_seed in 0u32..12,
    ) {
        let k = k_seed % budget + 1;
        let mut script: Vec<UploadAttempt> = (1..k).map(|_| transient()).collect();
        script.push(UploadAttempt::succeeded(UploadResult::text_success()));
        let mut uploader = ScriptedUploader::new(script);
        let mut reporter = CollectingReporter::default();

        let report = run_with_retry_and_sleep(
            &mut uploader,
            &RetryStrategyConfig::immediate(budget),
            &Redactor::default(),
            &mut reporter,
            |_| {},
        );
        prop_assert_eq!(report.state, RunState::Succeeded);
        prop_assert_eq!(uploader.calls(), k as usize);
    }

    #[test]
    fn persistent_transient_failure_uses_whole_budget(budget in 1u32..12) {
        let mut uploader = ScriptedUploader::new([transient()]);
        let mut reporter = CollectingReporter::default();

        let report = run_with_retry_and_sleep(
            &mut uploader,
            &RetryStrategyConfig::immediate(budget),
            &Redactor::default(),
            &mut reporter,
            |_| {},
        );
        prop_assert_eq!(report.state, RunState::FailedExhausted);
        prop_assert_eq!(uploader.calls(), budget as usize);
    }
}
