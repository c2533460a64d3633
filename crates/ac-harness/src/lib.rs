//! Harness: process-lifecycle plumbing shared by the autocommit daemon.
//!
//! Today this is cooperative shutdown: one [`shutdown::ShutdownSignal`] is
//! triggered from ctrl-c, observed by the watcher, the orchestration loop and
//! the notification server, and drained before the session summary is written.

pub mod shutdown;
