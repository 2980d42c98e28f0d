//! Authenticating HTTP client
//!
//! Every outbound call to an instance goes through [`AuthenticatingClient`].
//! Per call it:
//!
//! 1. renews the accessor's token first if none is held or it has expired,
//! 2. attaches `Authorization` and, unless the caller already set one, the
//!    client id header,
//! 3. sends the request,
//! 4. on `401 Unauthorized` or a transport failure, renews once and replays
//!    the request once, returning whatever the replay produced.
//!
//! There is no further retry. Requests whose body cannot be replayed (streamed
//! uploads) are sent exactly once.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{Level, debug, enabled, trace};

use crate::accessor::TokenAccessor;
use crate::config::CLIENT_ID_HEADER;
use crate::error::{ClientError, ClientResult};
use crate::token::AccessToken;

/// Content types whose bodies are worth tracing
const TEXTUAL_CONTENT_TYPES: [&str; 6] = ["html", "text", "xml", "json", "txt", "x-www-form-urlencoded"];

/// How requests are authenticated
#[derive(Clone)]
pub enum Authentication {
    /// Bearer tokens from a shared accessor, with one-shot re-authentication
    Token(Arc<dyn TokenAccessor>),
    /// Static Basic credentials, for instances reached without an API client
    Basic {
        /// Account name
        username: String,
        /// Account password
        password: String,
    },
}

/// HTTP client bound to one base URL and one authentication source
#[derive(Clone)]
pub struct AuthenticatingClient {
    http: reqwest::Client,
    base_url: String,
    auth: Authentication,
}

impl AuthenticatingClient {
    /// Create a client that authenticates with tokens from `accessor`
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        accessor: Arc<dyn TokenAccessor>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: Authentication::Token(accessor),
        }
    }

    /// Create a client that sends static Basic credentials
    pub fn with_basic_auth(
        http: reqwest::Client,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: Authentication::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Base URL every relative path is resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the base URL; absolute URLs pass through
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// URL of the resource named by `segments` below the base URL. Each
    /// segment is percent-encoded, so ids containing `/`, `?` or spaces stay
    /// a single path segment.
    pub fn segments_url(&self, segments: &[&str]) -> String {
        let Ok(mut url) = Url::parse(&self.base_url) else {
            return self.url(&segments.join("/"));
        };
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => return self.url(&segments.join("/")),
        }
        url.into()
    }

    /// Start a request for `path`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.url(path))
    }

    /// Start a request for the resource named by `segments`, see
    /// [`Self::segments_url`]
    pub fn request_segments(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.request_url(method, self.segments_url(segments))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth {
            Authentication::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            Authentication::Token(_) => builder,
        }
    }

    /// Send a request, authenticating it as described in the module docs.
    ///
    /// Non-success responses are returned as they are; only failures to
    /// authenticate or to reach the instance are errors.
    pub async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let request = request.build()?;
        match &self.auth {
            Authentication::Token(accessor) => self.send_authenticated(accessor.as_ref(), request).await,
            Authentication::Basic { .. } => {
                trace_request_body(&request);
                Ok(self.http.execute(request).await?)
            }
        }
    }

    /// Send a request and decode a successful JSON response
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = ensure_success(self.send(request).await?).await?;
        let body = read_text(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a request and report whether the instance accepted it
    pub async fn send_accepted(&self, request: RequestBuilder) -> ClientResult<bool> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%status, url = %response.url(), "request not accepted");
        }
        Ok(status.is_success())
    }

    async fn send_authenticated(
        &self,
        accessor: &dyn TokenAccessor,
        request: Request,
    ) -> ClientResult<Response> {
        let held = if accessor.is_valid() {
            accessor.current_token()
        } else {
            None
        };
        let token = match held {
            Some(token) => token,
            None => {
                debug!("no valid access token; authenticating");
                accessor.renew().await?
            }
        };

        let replay = request.try_clone();
        let outcome = self.execute(&token, request).await;

        let needs_reauth = match &outcome {
            Ok(response) => response.status() == StatusCode::UNAUTHORIZED,
            Err(ClientError::Transport(_)) => true,
            Err(_) => false,
        };
        if !needs_reauth {
            return outcome;
        }
        let Some(replay) = replay else {
            debug!("request body cannot be replayed; not retrying");
            return outcome;
        };

        match &outcome {
            Ok(response) => debug!(status = %response.status(), "request unauthorized; re-authenticating once"),
            Err(error) => debug!(%error, "request failed; re-authenticating once"),
        }
        let token = accessor.renew().await?;
        self.execute(&token, replay).await
    }

    async fn execute(&self, token: &AccessToken, mut request: Request) -> ClientResult<Response> {
        authorize(request.headers_mut(), token)?;
        trace_request_body(&request);
        Ok(self.http.execute(request).await?)
    }
}

/// Attach the bearer token and, if absent, the client id header
fn authorize(headers: &mut HeaderMap, token: &AccessToken) -> ClientResult<()> {
    let authorization = HeaderValue::from_str(&token.authorization_value())
        .map_err(|e| ClientError::InvalidRequest(format!("invalid access token: {e}")))?;
    headers.insert(AUTHORIZATION, authorization);

    let client_id_header = HeaderName::from_static(CLIENT_ID_HEADER);
    if !headers.contains_key(&client_id_header) {
        let client_id = HeaderValue::from_str(token.owner_id())
            .map_err(|e| ClientError::InvalidRequest(format!("invalid client id: {e}")))?;
        headers.insert(client_id_header, client_id);
    }
    Ok(())
}

/// Turn a non-success response into [`ClientError::Status`]
pub async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

/// Read a response body as text, tracing it when it looks textual
pub(crate) async fn read_text(response: Response) -> ClientResult<String> {
    let textual = is_textual(response.headers());
    let body = response.text().await?;
    if textual && enabled!(Level::TRACE) {
        trace!("Response Body:\n{body}\n");
    }
    Ok(body)
}

fn trace_request_body(request: &Request) {
    if !enabled!(Level::TRACE) || !is_textual(request.headers()) {
        return;
    }
    if let Some(bytes) = request.body().and_then(reqwest::Body::as_bytes) {
        trace!("Request Body:\n{}\n", String::from_utf8_lossy(bytes));
    }
}

fn is_textual(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase)
        .is_some_and(|content_type| {
            TEXTUAL_CONTENT_TYPES
                .iter()
                .any(|textual| content_type.contains(textual))
        })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
