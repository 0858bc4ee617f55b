//! Request gateway for the Nursy REST API.
//!
//! This module provides the `ApiClient` used for every outbound call.
//! It attaches the current session token as a bearer header and turns a
//! 401 response into a `SessionEvent::Invalidated` after clearing the
//! stored token. Navigation is left to whoever subscribes to the events.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiResponse, RequestOptions, SessionEvent, DEFAULT_LOGIN_PATH};
pub use error::ApiError;
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};
