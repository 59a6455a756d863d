#![no_main]

use appdeliver::engine::Reporter;
use appdeliver::output::{OutputSource, parse_json_output, parse_output};
use appdeliver::retry::is_retryable;
use libfuzzer_sys::fuzz_target;

struct Silent;

impl Reporter for Silent {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

fuzz_target!(|data: (String, String, bool)| {
    let (stdout, stderr, json_expected) = data;

    let parsed = parse_output(&mut Silent, &stdout, &stderr, json_expected);

    // Decodable JSON is always preferred when it is expected.
    if json_expected && parse_json_output(&stdout).is_ok() {
        assert_eq!(parsed.source, OutputSource::Json);
    }
    if !json_expected {
        assert_eq!(parsed.source, OutputSource::Text);
    }
    // A success result never carries an error.
    if parsed.result.is_success() {
        assert!(parsed.error.is_none());
    }
    if let Some(error) = parsed.error {
        let _ = is_retryable(&error.to_string());
    }
    let _ = parsed.result.warnings();
});
