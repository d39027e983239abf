//! Errors raised by album sources.
//!
//! Each failure keeps its own [`ProviderErrorCode`]; callers never see an
//! upstream failure disguised as an empty page.

use std::fmt;
use thiserror::Error;

/// Failure category, mapped onto protocol error codes by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials are missing, expired or were revoked.
    AuthExpired,
    /// Upstream unreachable: connect failure, DNS, timeout.
    Unavailable,
    /// Upstream answered with an error status. The message is upstream's own.
    Rejected,
    /// Body could not be parsed or lacks a required field.
    MalformedResponse,
    NotFound,
    Configuration,
    Internal,
}

impl ProviderErrorCode {
    /// Stable snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "auth_expired",
            Self::Unavailable => "unavailable",
            Self::Rejected => "rejected",
            Self::MalformedResponse => "malformed_response",
            Self::NotFound => "not_found",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }

    /// Transient failures a user may simply retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Source name, e.g. `google-photos` or `demo`.
    provider: Option<String>,
    /// HTTP status for `Rejected` errors.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            source: None,
        }
    }

    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthExpired, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Unavailable, message)
    }

    /// Upstream refused the request with `status`; `message` is kept verbatim.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::Rejected, message);
        err.status = Some(status);
        err
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::MalformedResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Configuration, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_auth_expired(&self) -> bool {
        self.code == ProviderErrorCode::AuthExpired
    }

    /// Copy of this error without its source chain.
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            provider: self.provider.clone(),
            status: self.status,
            source: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        match self.status {
            Some(status) => write!(f, "{} ({status}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            ProviderErrorCode::AuthExpired,
            ProviderErrorCode::Unavailable,
            ProviderErrorCode::Rejected,
            ProviderErrorCode::MalformedResponse,
        ];
        let names: std::collections::HashSet<_> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), codes.len());
    }

    #[test]
    fn rejected_keeps_upstream_message() {
        let err = ProviderError::rejected(403, "Request had insufficient authentication scopes.")
            .with_provider("google-photos");
        assert_eq!(err.code(), ProviderErrorCode::Rejected);
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.to_string(),
            "[google-photos] rejected (403): Request had insufficient authentication scopes."
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(ProviderErrorCode::Unavailable.is_transient());
        assert!(!ProviderErrorCode::AuthExpired.is_transient());
        assert!(!ProviderErrorCode::Rejected.is_transient());
    }

    #[test]
    fn detached_drops_source() {
        use std::error::Error;
        let err = ProviderError::internal("write failed").with_source(std::io::Error::other("disk"));
        assert!(err.source().is_some());
        let copy = err.detached();
        assert!(copy.source().is_none());
        assert_eq!(copy.message(), "write failed");
    }
}
