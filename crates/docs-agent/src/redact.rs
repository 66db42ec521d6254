//! Masking helpers for log output.
//!
//! Passwords, tokens, raw identifiers and email addresses never reach a log
//! line unmasked. Call sites wrap values with these helpers inside `tracing`
//! macros, e.g. `info!(user = %mask_id(&user_id), "login")`.

/// Replacement for values that must not appear at all.
pub const MASKED: &str = "***MASKED***";

/// Keys whose values [`redact_json`] replaces with [`MASKED`].
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "hashed_password",
    "access_token",
    "refresh_token",
    "token",
    "secret",
    "client_secret",
    "api_key",
    "authorization",
];

/// Keys whose values [`redact_json`] passes through [`mask_email`].
const EMAIL_KEYS: &[&str] = &["email", "user_email"];

/// Keep the first `n` characters of `s`.
fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.get(..idx).unwrap_or(s),
        None => s,
    }
}

/// `"john.doe@example.com"` → `"joh***@example.com"`.
///
/// Input without an `@` is treated as an opaque secret.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}***@{domain}", head(local, 3)),
        None => MASKED.to_string(),
    }
}

/// Show the first 8 characters of an identifier.
pub fn mask_id(id: &str) -> String {
    format!("{}***", head(id, 8))
}

/// Show the first 10 characters of a bearer token or JWT.
pub fn mask_token(token: &str) -> String {
    format!("{}***", head(token, 10))
}

/// Passwords and client secrets.
pub fn mask_secret(_secret: &str) -> &'static str {
    MASKED
}

/// First 50 characters of free text (message content, queries).
pub fn preview(text: &str) -> String {
    let cut = head(text, 50);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

/// Recursively mask sensitive fields of a JSON value by key name.
pub fn redact_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                let key = key.to_ascii_lowercase();
                if SENSITIVE_KEYS.contains(&key.as_str()) {
                    *v = serde_json::Value::String(MASKED.to_string());
                } else if EMAIL_KEYS.contains(&key.as_str())
                    && let Some(s) = v.as_str()
                {
                    *v = serde_json::Value::String(mask_email(s));
                } else {
                    redact_json(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}
