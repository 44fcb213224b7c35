use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{Dispatcher, FlightQuery, FlightRecord, bearer_token};

/// What the API returned for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP-like status code.
    pub status: u16,
    /// Records on success, empty otherwise.
    pub flights: Vec<FlightRecord>,
    /// Error message on failure.
    pub error: Option<String>,
}

impl ApiResponse {
    /// `200` with `flights`.
    pub fn ok(flights: Vec<FlightRecord>) -> Self {
        Self {
            status: 200,
            flights,
            error: None,
        }
    }

    /// Non-success status with a message.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            flights: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// The call never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response within the per-call timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The connection could not be made or was lost.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Client seam the load harness drives.
///
/// The harness treats the API as a black box: it only sees status codes and
/// transport failures.
#[async_trait]
pub trait FlightApi: Send + Sync + 'static {
    /// Issue one flight query on behalf of `token`.
    async fn get_flights(&self, token: &str, query: &FlightQuery) -> Result<ApiResponse, TransportError>;
}

/// In-process client calling a [`Dispatcher`] directly.
///
/// The token is treated as an `Authorization` header value, so a
/// `Bearer ` prefix is accepted and stripped.
#[derive(Clone)]
pub struct LocalClient {
    dispatcher: Arc<Dispatcher>,
}

impl LocalClient {
    /// Client over `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl FlightApi for LocalClient {
    async fn get_flights(&self, token: &str, query: &FlightQuery) -> Result<ApiResponse, TransportError> {
        Ok(match self.dispatcher.dispatch(bearer_token(token), query) {
            Ok(flights) => ApiResponse::ok(flights),
            Err(err) => ApiResponse::error(err.status_code(), err.to_string()),
        })
    }
}
