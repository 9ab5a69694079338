//! REST session backend using `reqwest`.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | operation | request                         |
//! |-----------|---------------------------------|
//! | create    | `POST   {base}/sessions` + JSON |
//! | renew     | `PATCH  {base}/sessions/{id}`   |
//! | revoke    | `DELETE {base}/sessions/{id}`   |

use reqwest::{Method, Response, StatusCode};
use tenure_protocol::{
    AppError, Codec, Credentials, ErrorList, JsonCodec, SessionInfo,
};
use url::Url;

use crate::{BackendError, SessionBackend};

/// A [`SessionBackend`] that talks JSON over HTTP.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Debug, Clone)]
pub struct HttpSessionBackend {
    sessions_url: Url,
    client: reqwest::Client,
    codec: JsonCodec,
}

impl HttpSessionBackend {
    /// Creates a backend rooted at `base_url` with a default client.
    ///
    /// # Errors
    /// - [`BackendError::InvalidBaseUrl`]: unparsable URL, or one that
    ///   can't have path segments (`mailto:`, `data:`)
    /// - [`BackendError::Client`]: TLS backend initialization failed
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(BackendError::Client)?;
        Self::with_client(base_url, client)
    }

    /// Creates a backend that reuses an existing client (shared connection
    /// pool, custom timeouts, proxies).
    pub fn with_client(
        base_url: &str,
        client: reqwest::Client,
    ) -> Result<Self, BackendError> {
        let invalid = |reason: String| BackendError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let mut sessions_url =
            Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        sessions_url
            .path_segments_mut()
            .map_err(|()| invalid("cannot be a base".into()))?
            .pop_if_empty()
            .push("sessions");

        tracing::debug!(url = %sessions_url, "http session backend ready");
        Ok(Self {
            sessions_url,
            client,
            codec: JsonCodec,
        })
    }

    /// The collection URL sessions are created under.
    pub fn sessions_url(&self) -> &Url {
        &self.sessions_url
    }

    /// `{base}/sessions/{id}`, with the id percent-encoded as a single
    /// path segment.
    fn session_url(&self, session_id: &str) -> Url {
        let mut url = self.sessions_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(session_id);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ErrorList> {
        tracing::debug!(%method, %url, "session backend request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        request.send().await.map_err(|e| {
            tracing::debug!(error = %e, "session backend unreachable");
            ErrorList::transport(e)
        })
    }

    /// Splits a response into success body or [`ErrorList`].
    ///
    /// Non-2xx responses carrying `{"errors": [...]}` are passed through
    /// unchanged. Anything else non-2xx becomes a single error carrying
    /// the status's reason phrase.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, ErrorList> {
        let status = response.status();
        let body = response.bytes().await.map_err(ErrorList::transport)?;
        if status.is_success() {
            return Ok(body.to_vec());
        }
        match self.codec.decode::<ErrorList>(&body) {
            Ok(errors) if !errors.is_empty() => Err(errors),
            _ => Err(AppError::new(status_text(status)).into()),
        }
    }

    async fn session_result(
        &self,
        response: Response,
    ) -> Result<SessionInfo, ErrorList> {
        let body = self.read_body(response).await?;
        self.codec
            .decode::<SessionInfo>(&body)
            .and_then(SessionInfo::validated)
            .map_err(ErrorList::transport)
    }
}

impl SessionBackend for HttpSessionBackend {
    async fn create(
        &self,
        credentials: &Credentials,
    ) -> Result<SessionInfo, ErrorList> {
        let body = self
            .codec
            .encode(credentials)
            .map_err(ErrorList::transport)?;
        let response = self
            .send(Method::POST, self.sessions_url.clone(), Some(body))
            .await?;
        self.session_result(response).await
    }

    async fn renew(&self, session_id: &str) -> Result<SessionInfo, ErrorList> {
        let response = self
            .send(Method::PATCH, self.session_url(session_id), None)
            .await?;
        self.session_result(response).await
    }

    async fn revoke(&self, session_id: &str) -> Result<(), ErrorList> {
        let response = self
            .send(Method::DELETE, self.session_url(session_id), None)
            .await?;
        // The body of a successful DELETE is irrelevant (often empty).
        self.read_body(response).await.map(drop)
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
