//! Request and response payloads.

use albumsync_core::{AlbumSummary, ContinuationToken, ImportReport, ImportedAlbum, SourceMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Wrapper carried by every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    /// Echoed back unchanged in the response.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Fetch one page of albums from the configured source.
    FetchAlbums {
        /// Absent or empty requests the first page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuation_token: Option<ContinuationToken>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<u32>,
        /// When present, must match the daemon's configured mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<SourceMode>,
    },

    /// Import a single album by its external id.
    ImportAlbum { external_id: String },

    /// List albums already imported, in display order.
    ListImported,

    Status,

    Shutdown,

    Ping,
}

impl Request {
    pub fn fetch_first_page(page_size: u32) -> Self {
        Self::FetchAlbums {
            continuation_token: None,
            page_size: Some(page_size),
            mode: None,
        }
    }

    pub fn fetch_page(token: Option<ContinuationToken>, page_size: u32) -> Self {
        Self::FetchAlbums {
            continuation_token: token,
            page_size: Some(page_size),
            mode: None,
        }
    }

    pub fn import_album(external_id: impl Into<String>) -> Self {
        Self::ImportAlbum {
            external_id: external_id.into(),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchAlbums { .. } => "fetch_albums",
            Self::ImportAlbum { .. } => "import_album",
            Self::ListImported => "list_imported",
            Self::Status => "status",
            Self::Shutdown => "shutdown",
            Self::Ping => "ping",
        }
    }
}

/// Daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// One page of a listing, tagged with the mode that produced it.
    Albums {
        albums: Vec<AlbumSummary>,
        mode: SourceMode,
        /// Absent on the last page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_continuation_token: Option<ContinuationToken>,
    },

    Import {
        #[serde(flatten)]
        report: ImportReport,
    },

    /// Every stored record. Replaced by an `Error` when it does not fit
    /// in one frame.
    ImportedAlbums { albums: Vec<ImportedAlbum> },

    Status {
        #[serde(flatten)]
        info: StatusInfo,
    },

    /// Acknowledges a request with nothing to return.
    Ok,

    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },

    Pong,
}

impl Response {
    pub fn albums(
        albums: Vec<AlbumSummary>,
        mode: SourceMode,
        next: Option<ContinuationToken>,
    ) -> Self {
        Self::Albums {
            albums,
            mode,
            next_continuation_token: next,
        }
    }

    pub fn import(report: ImportReport) -> Self {
        Self::Import { report }
    }

    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error { error }
    }

    /// Anything but `Error`.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Reply to `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub mode: SourceMode,
    /// Name of the active album source, e.g. `google-photos`.
    pub source: String,
    pub authenticated: bool,
    pub imported_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    Timeout,
    /// Upstream credentials were rejected, even after a refresh.
    AuthenticationFailed,
    /// Upstream could not be reached.
    UpstreamUnavailable,
    /// Upstream answered with an error status.
    UpstreamRejected,
    /// Upstream answered with something that could not be interpreted.
    MalformedResponse,
    NotFound,
    ShuttingDown,
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::Timeout => "The request timed out",
            Self::AuthenticationFailed => "Authentication with the album source failed",
            Self::UpstreamUnavailable => "The album source is unreachable",
            Self::UpstreamRejected => "The album source rejected the request",
            Self::MalformedResponse => "The album source returned an unreadable response",
            Self::NotFound => "Album not found",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use albumsync_core::ImportStatus;

    #[test]
    fn envelope_version() {
        let envelope = Envelope::request("req-123", Request::Ping);
        assert_eq!(envelope.protocol_version, "1");
        assert!(envelope.is_compatible());

        let old = Envelope {
            protocol_version: "0".to_string(),
            request_id: "req-123".to_string(),
            payload: Request::Ping,
        };
        assert!(!old.is_compatible());
    }

    #[test]
    fn unit_requests_are_bare_tags() {
        assert_eq!(serde_json::to_string(&Request::Ping).unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(
            serde_json::to_string(&Request::ListImported).unwrap(),
            r#"{"type":"list_imported"}"#
        );
    }

    #[test]
    fn fetch_request_omits_empty_fields() {
        let json = serde_json::to_string(&Request::fetch_page(None, 6)).unwrap();
        assert_eq!(json, r#"{"type":"fetch_albums","page_size":6}"#);
    }

    #[test]
    fn fetch_request_accepts_minimal_payload() {
        let parsed: Request = serde_json::from_str(r#"{"type":"fetch_albums"}"#).unwrap();
        assert_eq!(
            parsed,
            Request::FetchAlbums {
                continuation_token: None,
                page_size: None,
                mode: None,
            }
        );
    }

    #[test]
    fn fetch_request_with_token_and_mode() {
        let json = r#"{"type":"fetch_albums","continuation_token":"6","mode":"demo"}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        match parsed {
            Request::FetchAlbums {
                continuation_token,
                mode,
                ..
            } => {
                assert_eq!(continuation_token.unwrap().as_str(), "6");
                assert_eq!(mode, Some(SourceMode::Demo));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn import_request_shape() {
        let json = serde_json::to_string(&Request::import_album("AF1Qip")).unwrap();
        assert_eq!(json, r#"{"type":"import_album","external_id":"AF1Qip"}"#);
    }

    #[test]
    fn import_response_is_flat() {
        let response = Response::import(ImportReport {
            status: ImportStatus::AlreadyExists,
            local_id: 42,
            external_id: "demo-album-03".into(),
            title: "Weekend hike".into(),
            cover_attached: true,
        });
        insta::assert_json_snapshot!(response, @r#"
        {
          "type": "import",
          "status": "exists",
          "local_id": 42,
          "external_id": "demo-album-03",
          "title": "Weekend hike",
          "cover_attached": true
        }
        "#);
    }

    #[test]
    fn albums_response_shape() {
        let response = Response::albums(
            vec![AlbumSummary::new("a1", "First").with_media_count(3)],
            SourceMode::Demo,
            ContinuationToken::new("6"),
        );
        insta::assert_json_snapshot!(response, @r#"
        {
          "type": "albums",
          "albums": [
            {
              "external_id": "a1",
              "title": "First",
              "media_count": 3
            }
          ],
          "mode": "demo",
          "next_continuation_token": "6"
        }
        "#);
    }

    #[test]
    fn last_page_has_no_token() {
        let response = Response::albums(Vec::new(), SourceMode::Live, None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("next_continuation_token"));
    }

    #[test]
    fn error_response_roundtrip() {
        let response = Response::error(ErrorCode::UpstreamRejected, "403: insufficient scopes");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("upstream_rejected"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.as_error().unwrap().message, "403: insufficient scopes");
    }

    #[test]
    fn error_display_uses_description() {
        let error = ErrorResponse::new(ErrorCode::NotFound, "demo-album-99");
        assert_eq!(error.to_string(), "Album not found: demo-album-99");
    }

    #[test]
    fn request_kind_names_match_tags() {
        for request in [
            Request::Ping,
            Request::Status,
            Request::Shutdown,
            Request::ListImported,
            Request::import_album("x"),
            Request::fetch_first_page(1),
        ] {
            let json = serde_json::to_value(&request).unwrap();
            assert_eq!(json["type"], request.kind());
        }
    }
}
