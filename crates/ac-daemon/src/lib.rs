//! The autocommit daemon: one orchestration loop per watched repository,
//! fed by the file watcher and observed through the notification channel.

pub mod orchestrator;
pub mod state_machine;
pub mod worker;
