//! Filesystem event filtering and debounced reload for the notify watcher.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind};
use tracing::{info, warn};

use crate::schema::DetectionRule;

use super::core::RuleLoader;

/// Quiet period after the last change before reloading.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// `*.yml` / `*.yaml` that is not a dotfile.
pub(super) fn is_rule_file(path: &Path) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false);

    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.'));

    is_yaml && !hidden
}

/// Whether a watcher event should trigger a reload.
pub(super) fn is_relevant(event: &Event) -> bool {
    let kind_matters = match &event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    kind_matters && event.paths.iter().any(|p| is_rule_file(p))
}

/// Reload the directory once per burst of change signals on `rx`.
///
/// The thread exits when the sending side (the watcher) is dropped.
pub(super) fn spawn_reload_thread<F>(
    rx: Receiver<()>,
    rules_dir: PathBuf,
    on_reload: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: Fn(Vec<DetectionRule>) + Send + 'static,
{
    std::thread::Builder::new()
        .name("rules-reload".to_string())
        .spawn(move || {
            let loader = RuleLoader::new(rules_dir);
            while rx.recv().is_ok() {
                while rx.recv_timeout(DEBOUNCE).is_ok() {}

                match loader.load_all() {
                    Ok(load) if load.failed() > 0 => {
                        warn!(
                            failed = load.failed(),
                            "rule reload had failing files, keeping current rules"
                        );
                    }
                    Ok(load) => {
                        info!(rules = load.rules.len(), "hot-reloaded rules");
                        on_reload(load.rules);
                    }
                    Err(e) => warn!(error = %e, "rule reload failed, keeping current rules"),
                }
            }
        })
}
