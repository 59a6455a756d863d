#![no_main]

use appdeliver_output_sanitizer::{REDACTED, Redactor, redact_sensitive};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (String, String)| {
    let (secret, text) = data;

    // Idempotent on arbitrary input.
    let once = redact_sensitive(&text);
    assert_eq!(redact_sensitive(&once), once);

    if secret.len() < 4
        || !secret.chars().all(|c| c.is_ascii_alphanumeric())
        || REDACTED.contains(secret.as_str())
    {
        return;
    }
    let redactor = Redactor::new([secret.clone()]);
    let line = format!("{text} -p {secret} {text}");
    assert!(!redactor.redact(&line).contains(&secret));

    let args = vec!["altool".to_string(), "-p".to_string(), secret.clone()];
    assert!(redactor.redact_args(&args).iter().all(|a| !a.contains(&secret)));

    let mut learning = Redactor::default();
    learning.learn_from_output(&format!("Generated JWT: {secret}\n"));
    assert!(!learning.redact(&format!("{text} token={secret}")).contains(&secret));
});
