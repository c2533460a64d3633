//! Bridge between the commit loop and remote observers.
//!
//! Observers connect over WebSocket at `/ws`. They receive a [`protocol::Notification`]
//! (repository path, history, live policy) whenever anyone connects, a cycle
//! produces an outcome, or a preference changes, and they may send one-field
//! preference updates back. `/api/state` and `/metrics` expose the same data
//! over plain HTTP.

pub mod broadcaster;
pub mod event_bus;
pub mod origin;
pub mod protocol;
pub mod server;
