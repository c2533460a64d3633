//! Adapter from `notify` to [`RawEvent`]s, plus the event-delivery thread.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tracing::{debug, error, info, warn};

use crate::debouncer::Debouncer;
use crate::types::{RawEvent, RawEventKind};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch root does not exist or is not a directory: {0}")]
    InvalidRoot(String),
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map one `notify` event to zero or more raw events.
///
/// Access events are dropped. Renames become a delete of the old path and a
/// create of the new one. Paths are made relative to `root` so relevance is
/// judged only on the part of the path inside the watched tree.
pub fn to_raw_events(root: &Path, event: &notify::Event) -> Vec<RawEvent> {
    let relative = |p: &Path| -> String {
        p.strip_prefix(root).unwrap_or(p).to_string_lossy().to_string()
    };

    let single = |kind: RawEventKind, folder: bool| -> Vec<RawEvent> {
        event
            .paths
            .iter()
            .map(|p| RawEvent {
                kind,
                path: relative(p),
                is_directory: folder || (kind != RawEventKind::Deleted && p.is_dir()),
            })
            .collect()
    };

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => single(RawEventKind::Created, true),
        EventKind::Create(_) => single(RawEventKind::Created, false),
        EventKind::Remove(RemoveKind::Folder) => single(RawEventKind::Deleted, true),
        EventKind::Remove(_) => single(RawEventKind::Deleted, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => single(RawEventKind::Deleted, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(RawEventKind::Created, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push(RawEvent::deleted(relative(from)));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(RawEvent {
                    kind: RawEventKind::Created,
                    path: relative(to),
                    is_directory: to.is_dir(),
                });
            }
            out
        }
        EventKind::Modify(_) => single(RawEventKind::Modified, false),
        _ => Vec::new(),
    }
}

/// Called at most once, from the delivery thread, when the watch can no
/// longer see changes under the root.
pub type LostHandler = Box<dyn FnOnce(String) + Send>;

/// Recursively watches a root and feeds the debouncer from a dedicated
/// event-delivery thread. That thread only filters and re-arms the timer; it
/// never waits on version control or the network.
pub struct FileWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    delivery: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn spawn(root: &Path, debouncer: Debouncer) -> Result<Self, WatchError> {
        Self::spawn_with(root, debouncer, Box::new(|_| {}))
    }

    /// Like [`spawn`](Self::spawn), calling `on_lost` if the root itself is
    /// removed while being watched.
    pub fn spawn_with(
        root: &Path,
        debouncer: Debouncer,
        on_lost: LostHandler,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot(root.display().to_string()));
        }
        let root = root.canonicalize()?;

        let (tx, rx): (
            Sender<notify::Result<notify::Event>>,
            Receiver<notify::Result<notify::Event>>,
        ) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let thread_root = root.clone();
        let delivery = std::thread::Builder::new()
            .name("autocommit-events".to_string())
            .spawn(move || deliver(&thread_root, &rx, &debouncer, on_lost))?;

        info!(root = %root.display(), "watching");
        Ok(Self {
            root,
            watcher: Some(watcher),
            delivery: Some(delivery),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching and wait for the delivery thread to drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the watcher drops the channel sender, which ends the
        // delivery loop.
        self.watcher.take();
        if let Some(handle) = self.delivery.take() {
            if handle.join().is_err() {
                warn!("event delivery thread panicked");
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(
    root: &Path,
    rx: &Receiver<notify::Result<notify::Event>>,
    debouncer: &Debouncer,
    on_lost: LostHandler,
) {
    let mut on_lost = Some(on_lost);
    for result in rx.iter() {
        match result {
            Ok(event) => {
                if removes_root(root, &event) {
                    if let Some(handler) = on_lost.take() {
                        error!(root = %root.display(), "watched root was removed");
                        handler(format!("watched root {} was removed", root.display()));
                    }
                    continue;
                }
                for raw in to_raw_events(root, &event) {
                    debouncer.on_event(&raw);
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        }
    }
    debug!("event delivery thread finished");
}

fn removes_root(root: &Path, event: &notify::Event) -> bool {
    matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == root)
}
