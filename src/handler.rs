use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::encoding::record::ROOT_PAGE_KEY;
use crate::protocol::response::cors_headers;
use crate::protocol::{Method, RequestEvent, ResponseResult};
use crate::store::{CounterStore, StoreError};

pub const MSG_UPDATED: &str = "Counter Updated";
pub const MSG_COUNT: &str = "Here is the Count";
pub const MSG_WRONG_METHOD: &str = "Oops! Wrong Method!!";

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("invalid event: {0}")]
    InvalidEvent(#[source] serde_json::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Visit counter for the root page.
///
/// Holds no count of its own: every GET reads the store and every POST uses
/// the store's atomic increment, so any number of handlers may share a store.
pub struct CounterHandler {
    store: Arc<dyn CounterStore>,
    headers: BTreeMap<String, String>,
}

impl CounterHandler {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            headers: BTreeMap::new(),
        }
    }

    /// Attach CORS headers allowing `origin` to every response
    pub fn with_cors(mut self, origin: &str) -> Self {
        self.headers = cors_headers(origin);
        self
    }

    /// Parse a raw JSON event and handle it
    pub async fn invoke(&self, raw: &[u8]) -> Result<ResponseResult, HandlerError> {
        let event = RequestEvent::from_slice(raw).map_err(HandlerError::InvalidEvent)?;
        self.handle(&event).await
    }

    /// Handle one invocation
    pub async fn handle(&self, event: &RequestEvent) -> Result<ResponseResult, HandlerError> {
        if event.suppresses_update() {
            info!("Update suppressed for {} request", event.http_method);
            return Ok(self.finish(ResponseResult::status(401)));
        }

        let res = match event.method() {
            Method::Post => {
                let count = self.increment_and_persist().await?;
                ResponseResult::count(MSG_UPDATED, count)
            }
            Method::Get => {
                let count = self.current_count().await?;
                ResponseResult::count(MSG_COUNT, count)
            }
            Method::Other(method) => {
                warn!("Rejected unsupported method '{}'", method);
                ResponseResult::error(401, MSG_WRONG_METHOD)
            }
        }
        .map_err(HandlerError::Encode)?;

        Ok(self.finish(res))
    }

    /// Current count, zero when nothing was ever written
    pub async fn current_count(&self) -> Result<u64, HandlerError> {
        let count = self
            .store
            .get(ROOT_PAGE_KEY)
            .await?
            .map_or(0, |record| record.visit_count);
        debug!("Read visit count {}", count);
        Ok(count)
    }

    /// Add one visit and return the new count
    pub async fn increment_and_persist(&self) -> Result<u64, HandlerError> {
        let count = self.store.increment(ROOT_PAGE_KEY).await?;
        debug!("Visit count updated to {}", count);
        Ok(count)
    }

    fn finish(&self, res: ResponseResult) -> ResponseResult {
        res.with_headers(&self.headers)
    }
}
