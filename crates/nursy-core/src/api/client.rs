//! API client for communicating with the Nursy REST API.
//!
//! Every call goes through `ApiClient::send`, which merges headers, attaches
//! the bearer token when the session is valid, and handles 401 uniformly.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::Session;

// ============================================================================
// Constants
// ============================================================================

/// Where the host should send the user once the session is invalidated
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Buffered session events per subscriber before old ones are dropped
const EVENT_CHANNEL_CAPACITY: usize = 16;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Signals emitted by the gateway for the hosting application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The server rejected a call with 401 and the stored token was cleared.
    Invalidated {
        endpoint: String,
        redirect_to: String,
    },
}

/// Method, extra headers and raw body for a single call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name.as_str(), e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Serialize `data` as the JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, data: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_string(data)?);
        Ok(self)
    }
}

/// Parsed body together with the HTTP status it arrived with.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Session-aware request gateway.
/// Clone is cheap - reqwest::Client and the session share state internally.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_path: String,
    session: Session,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Create a new API client. No request timeout is applied.
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            session,
            events,
        })
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Receive session events from every call made after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// JSON content type, then caller headers on top, then the bearer token
    /// when the stored session is still valid.
    fn request_headers(caller: &HeaderMap, token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        for name in caller.keys() {
            headers.remove(name);
        }
        for (name, value) in caller {
            headers.append(name.clone(), value.clone());
        }

        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::InvalidHeader(format!("authorization: {}", e)))?,
            );
        }
        Ok(headers)
    }

    /// Token stores may hit the filesystem or the OS keychain, so slot access
    /// runs on tokio's blocking pool rather than the async worker.
    async fn stored_token(&self) -> Option<String> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.valid_token())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Token lookup task failed");
                None
            })
    }

    async fn invalidate_session(&self, endpoint: &str) {
        warn!(
            endpoint = endpoint,
            redirect_to = %self.login_path,
            "Unauthorized - clearing session"
        );

        let session = self.session.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || session.clear_quietly()).await {
            warn!(error = %e, "Session clear task failed");
        }

        // No subscribers is fine; the token is cleared either way
        let _ = self.events.send(SessionEvent::Invalidated {
            endpoint: endpoint.to_string(),
            redirect_to: self.login_path.clone(),
        });
    }

    /// Perform a call and return the status with the parsed JSON body.
    ///
    /// Only 401 gets special treatment; any other status is returned as-is
    /// for the caller to interpret. Connection failures propagate. The token
    /// slot is read once before sending and cleared (on 401) before this
    /// returns, both off the async worker.
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        let RequestOptions {
            method,
            headers,
            body,
        } = options;

        let url = self.url(endpoint);
        let token = self.stored_token().await;
        let headers = Self::request_headers(&headers, token.as_deref())?;
        debug!(
            method = %method,
            url = %url,
            authorized = headers.contains_key(header::AUTHORIZATION),
            "Sending request"
        );

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_session(endpoint).await;
        }

        let text = response.text().await?;
        let body = serde_json::from_str(&text).map_err(|e| ApiError::unparseable_body(e, &text))?;
        debug!(url = %url, status = status.as_u16(), "Received response");

        Ok(ApiResponse { status, body })
    }

    /// Perform a call and return only the parsed JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        Ok(self.send(endpoint, options).await?.body)
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::GET)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::DELETE)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: &B,
    ) -> Result<T, ApiError> {
        let options = RequestOptions::new(Method::POST).json(data)?;
        self.request(endpoint, options).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: &B,
    ) -> Result<T, ApiError> {
        let options = RequestOptions::new(Method::PUT).json(data)?;
        self.request(endpoint, options).await
    }
}
