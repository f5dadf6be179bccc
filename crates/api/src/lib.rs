//! HTTP surface and session orchestration for streamvault: application
//! state, the session manager and per-session pipeline, the segment
//! integrity builder, and the delivery/control handlers.

pub mod error;
pub mod handlers;
pub mod router;
pub mod sessions;
pub mod state;
