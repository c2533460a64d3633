pub mod config;
pub mod debouncer;
pub mod event_filter;
pub mod file_watcher;
pub mod policy;
pub mod session_log;
pub mod types;
pub mod vcs;
