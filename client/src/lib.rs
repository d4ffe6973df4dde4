pub mod api;
pub mod config;
pub mod error;
pub mod event_stream;
pub mod session;
pub mod sse;
pub mod state;
pub mod store;
pub mod submit;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use session::{MatchSession, SessionUpdate};
