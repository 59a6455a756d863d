//! Redaction of secrets from upload command lines and captured tool output.
//!
//! Two layers are applied:
//! - known secret values (passwords, app-specific passwords) are replaced
//!   wherever they occur
//! - well-known secret-bearing shapes (`Generated JWT: …`,
//!   `Authorization: Bearer …`, `-p <value>` arguments) are masked even
//!   when the value itself is unknown
//!
//! Every diagnostic surface goes through a [`Redactor`]: printed commands,
//! debug output, terminal errors and written reports. Tokens printed on a
//! `Generated JWT:` line can be registered with [`Redactor::learn_from_output`]
//! so later occurrences are masked as well.
//!
//! A secret that is itself a substring of [`REDACTED`] cannot be told apart
//! from the token after masking; [`Redactor::collides_with_token`] reports it.
//!
//! # Example
//!
//! ```
//! use appdeliver_output_sanitizer::{REDACTED, Redactor};
//!
//! let redactor = Redactor::new(["hunter2"]);
//! let line = redactor.redact("altool -u me@example.com -p hunter2");
//! assert_eq!(line, format!("altool -u me@example.com -p {REDACTED}"));
//! ```

/// Fixed token substituted for every secret.
pub const REDACTED: &str = "[REDACTED]";

/// Command line flags whose following argument is always a secret.
const SECRET_FLAGS: &[&str] = &["-p", "--password"];

const JWT_MARKER: &str = "generated jwt:";

/// Replaces known secret values and secret-bearing patterns with [`REDACTED`].
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Build a redactor for the given secret values. Empty values are ignored.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so a secret containing another one is masked whole.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        secrets.dedup();
        Self { secrets }
    }

    /// Register one more secret value, e.g. a token discovered in output.
    pub fn add_secret(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() || self.secrets.contains(&secret) {
            return;
        }
        self.secrets.push(secret);
        self.secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    }

    /// Number of known secret values.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Whether a known secret also occurs inside [`REDACTED`], so masked
    /// text may still contain it.
    pub fn collides_with_token(&self) -> bool {
        self.secrets.iter().any(|s| REDACTED.contains(s.as_str()))
    }

    /// Register every token printed after `Generated JWT:` in `text`.
    /// Returns how many new secrets were added.
    pub fn learn_from_output(&mut self, text: &str) -> usize {
        let before = self.secrets.len();
        for line in text.lines() {
            let Some(pos) = line.to_ascii_lowercase().find(JWT_MARKER) else {
                continue;
            };
            if let Some(token) = line[pos + JWT_MARKER.len()..].split_whitespace().next() {
                if token != REDACTED {
                    self.add_secret(token);
                }
            }
        }
        self.secrets.len() - before
    }

    /// Redact free text (captured stdout/stderr, error messages).
    pub fn redact(&self, s: &str) -> String {
        let mut out = s.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        redact_sensitive(&out)
    }

    /// Redact an argument vector. Values following secret flags are masked
    /// even if they were never registered as secrets.
    pub fn redact_args(&self, args: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len());
        let mut mask_next = false;
        for arg in args {
            if mask_next {
                out.push(REDACTED.to_string());
                mask_next = false;
                continue;
            }
            mask_next = SECRET_FLAGS.contains(&arg.as_str());
            out.push(self.redact(arg));
        }
        out
    }
}

/// Redact secret-bearing patterns line by line. Line endings are kept as is.
pub fn redact_sensitive(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for line in s.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        result.push_str(&redact_line(body));
        result.push_str(&line[body.len()..]);
    }
    result
}

fn redact_line(line: &str) -> String {
    let mut out = line.to_string();

    // altool --verbose prints the signed API token.
    if let Some(pos) = out.to_ascii_lowercase().find(JWT_MARKER) {
        let value_start = pos + JWT_MARKER.len();
        if !out[value_start..].trim().is_empty() {
            out = format!("{} {REDACTED}", &out[..value_start]);
        }
    }

    // Authorization: Bearer <token>
    if let Some(pos) = out.to_ascii_lowercase().find("authorization:") {
        let after = out[pos..].to_ascii_lowercase();
        if let Some(bearer_pos) = after.find("bearer ") {
            let redact_start = pos + bearer_pos + "bearer ".len();
            out = format!("{}{REDACTED}", &out[..redact_start]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn known_secret_is_replaced_everywhere() {
        let redactor = Redactor::new(["s3cret"]);
        let out = redactor.redact("first s3cret then s3cret again");
        assert_eq!(out, "first [REDACTED] then [REDACTED] again");
    }

    #[test]
    fn empty_secrets_are_ignored() {
        let redactor = Redactor::new(["", "pw"]);
        assert_eq!(redactor.secret_count(), 1);
        assert_eq!(redactor.redact("abc"), "abc");
    }

    #[test]
    fn longer_secret_wins_over_contained_one() {
        let redactor = Redactor::new(["abc", "abcdef"]);
        assert_eq!(redactor.redact("x abcdef y"), "x [REDACTED] y");
    }

    #[test]
    fn add_secret_skips_duplicates() {
        let mut redactor = Redactor::new(["a1"]);
        redactor.add_secret("a1");
        redactor.add_secret("");
        redactor.add_secret("b22");
        assert_eq!(redactor.secret_count(), 2);
        assert_eq!(redactor.redact("a1 b22"), "[REDACTED] [REDACTED]");
    }

    #[test]
    fn generated_jwt_is_masked() {
        let out = redact_sensitive("2025-09-16 DBG-X: Generated JWT: eyJhbGciOiJFUzI1NiJ9.abc.def");
        assert_snapshot!(out, @"2025-09-16 DBG-X: Generated JWT: [REDACTED]");
    }

    #[test]
    fn bearer_header_is_masked() {
        let out = redact_sensitive("Authorization: Bearer abc.def.ghi");
        assert_eq!(out, "Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn multiline_preserves_other_lines_and_trailing_newline() {
        let input = "line one\nGenerated JWT: tok\nline three\n";
        let out = redact_sensitive(input);
        assert_eq!(out, "line one\nGenerated JWT: [REDACTED]\nline three\n");
    }

    #[test]
    fn crlf_line_endings_are_kept() {
        let input = "first\r\nGenerated JWT: tok\r\nlast";
        assert_eq!(
            redact_sensitive(input),
            "first\r\nGenerated JWT: [REDACTED]\r\nlast"
        );
    }

    #[test]
    fn learned_jwt_is_masked_on_other_lines() {
        let tok = "eyJhbGciOiJFUzI1NiJ9.payload.sig";
        let mut redactor = Redactor::default();
        let stdout = format!("Generated JWT: {tok}\nDBG: using token {tok} for request\n");

        assert_eq!(redactor.learn_from_output(&stdout), 1);
        assert_eq!(redactor.learn_from_output(&stdout), 0);
        assert_eq!(
            redactor.redact(&stdout),
            "Generated JWT: [REDACTED]\nDBG: using token [REDACTED] for request\n"
        );
        assert_eq!(
            redactor.redact(&format!("header token={tok}")),
            "header token=[REDACTED]"
        );
    }

    #[test]
    fn already_masked_jwt_is_not_learned() {
        let mut redactor = Redactor::default();
        assert_eq!(redactor.learn_from_output("Generated JWT: [REDACTED]"), 0);
        assert_eq!(redactor.learn_from_output("Generated JWT:   "), 0);
    }

    #[test]
    fn secret_inside_token_is_flagged() {
        assert!(Redactor::new(["ACTED"]).collides_with_token());
        assert!(!Redactor::new(["hunter2"]).collides_with_token());
    }

    #[test]
    fn password_flag_value_is_masked_in_args() {
        let redactor = Redactor::default();
        let args: Vec<String> = ["altool", "-u", "me", "-p", "unknown-pw", "--verbose"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = redactor.redact_args(&args);
        assert_eq!(out, ["altool", "-u", "me", "-p", "[REDACTED]", "--verbose"]);
    }

    #[test]
    fn registered_secret_is_masked_inside_args() {
        let redactor = Redactor::new(["pw"]);
        let args = vec!["--note".to_string(), "contains-pw".to_string()];
        assert_eq!(redactor.redact_args(&args), ["--note", "contains-[REDACTED]"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn registered_secret_never_survives(
                prefix in "[ -~]{0,20}",
                secret in "[A-Za-z0-9]{6,24}",
                suffix in "[ -~]{0,20}",
            ) {
                prop_assume!(!REDACTED.contains(secret.as_str()));
                let redactor = Redactor::new([secret.clone()]);
                let out = redactor.redact(&format!("{prefix}{secret}{suffix}"));
                prop_assert!(!out.contains(&secret));
                prop_assert!(out.contains(REDACTED));
            }
        }
    }
}
