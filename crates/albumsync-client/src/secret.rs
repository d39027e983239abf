//! Secret references in `config.toml`.
//!
//! `client_id` and `client_secret` may point elsewhere instead of holding the
//! value inline:
//!
//! - `pass::google/albumsync` reads the first line of `pass show google/albumsync`
//! - `env::GOOGLE_CLIENT_SECRET` reads the environment variable
//!
//! Anything else is taken literally.

use std::process::Command;

use crate::error::{ClientError, ClientResult};

const PASS_PREFIX: &str = "pass::";
const ENV_PREFIX: &str = "env::";

/// True when `value` is a `pass::` or `env::` reference.
pub fn is_reference(value: &str) -> bool {
    value.starts_with(PASS_PREFIX) || value.starts_with(ENV_PREFIX)
}

/// Expands a possibly-referenced value. References must resolve to a
/// non-empty string.
pub fn resolve(value: &str) -> ClientResult<String> {
    let resolved = if let Some(entry) = value.strip_prefix(PASS_PREFIX) {
        from_pass(entry)?
    } else if let Some(var) = value.strip_prefix(ENV_PREFIX) {
        from_env(var)?
    } else {
        return Ok(value.to_string());
    };

    let resolved = resolved.trim().to_string();
    if resolved.is_empty() {
        return Err(ClientError::config(format!("secret reference `{value}` is empty")));
    }
    Ok(resolved)
}

fn from_pass(entry: &str) -> ClientResult<String> {
    let output = Command::new("pass")
        .arg("show")
        .arg(entry)
        .output()
        .map_err(|e| ClientError::config(format!("failed to run `pass show {entry}`: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::config(format!(
            "`pass show {entry}` failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClientError::config(format!("`pass show {entry}` printed nothing")))
}

fn from_env(var: &str) -> ClientResult<String> {
    std::env::var(var)
        .map_err(|_| ClientError::config(format!("environment variable `{var}` is not set")))
}
