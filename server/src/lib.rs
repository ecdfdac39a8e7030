//! HTTP surface for the holder service.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
