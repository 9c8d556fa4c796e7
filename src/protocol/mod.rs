//! Gateway protocol
//!
//! This module provides the invocation event and result shapes the gateway
//! maps HTTP requests and replies onto.

pub mod event;
pub mod response;

pub use event::{Method, RequestEvent};
pub use response::ResponseResult;
