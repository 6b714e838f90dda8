use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::vm::thread::{ThreadId, ThreadState};

/// Observer hooks through which a host surfaces script activity.
///
/// Callbacks are optional and can be registered or cleared at any time
/// through a shared reference; clones share the same registrations.
#[derive(Default, Clone)]
pub struct RuntimeHooks {
    logger: Arc<RwLock<Option<LoggerCallback>>>,
    thread_observer: Arc<RwLock<Option<ThreadCallback>>>,
}

type LoggerCallback = Arc<dyn Fn(&ScriptDiagnostic) + Send + Sync + 'static>;
type ThreadCallback = Arc<dyn Fn(&ThreadEvent) + Send + Sync + 'static>;

impl RuntimeHooks {
    /// Registers the diagnostic sink for script errors and warnings.
    pub fn set_logger<F>(&self, hook: F)
    where
        F: Fn(&ScriptDiagnostic) + Send + Sync + 'static,
    {
        *self.logger.write() = Some(Arc::new(hook));
    }

    /// Registers a callback for thread state transitions.
    pub fn set_thread_observer<F>(&self, hook: F)
    where
        F: Fn(&ThreadEvent) + Send + Sync + 'static,
    {
        *self.thread_observer.write() = Some(Arc::new(hook));
    }

    pub fn clear_logger(&self) {
        *self.logger.write() = None;
    }

    pub fn clear_thread_observer(&self) {
        *self.thread_observer.write() = None;
    }

    pub fn emit_log(&self, diagnostic: ScriptDiagnostic) {
        if let Some(callback) = self.logger.read().as_ref().cloned() {
            callback(&diagnostic);
        }
    }

    pub fn emit_thread_event(&self, event: ThreadEvent) {
        if let Some(callback) = self.thread_observer.read().as_ref().cloned() {
            callback(&event);
        }
    }
}

impl fmt::Debug for RuntimeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHooks").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Diagnostic raised while running a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDiagnostic {
    pub severity: Severity,
    pub thread: ThreadId,
    /// Static guid of the object owning the script.
    pub owner_guid: u32,
    pub owner_name: String,
    pub message: String,
}

/// A thread moved between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadEvent {
    pub thread: ThreadId,
    pub from: ThreadState,
    pub to: ThreadState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn clones_share_registrations() {
        let hooks = RuntimeHooks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hooks.set_logger(move |diagnostic| sink.lock().push(diagnostic.message.clone()));

        let clone = hooks.clone();
        clone.emit_log(ScriptDiagnostic {
            severity: Severity::Error,
            thread: ThreadId::from_raw(1),
            owner_guid: 0x42,
            owner_name: "Miniscript Modifier".into(),
            message: "Stack underflow".into(),
        });
        assert_eq!(seen.lock().as_slice(), ["Stack underflow".to_string()]);

        hooks.clear_logger();
        clone.emit_log(ScriptDiagnostic {
            severity: Severity::Warning,
            thread: ThreadId::from_raw(1),
            owner_guid: 0,
            owner_name: String::new(),
            message: "ignored".into(),
        });
        assert_eq!(seen.lock().len(), 1);
    }
}
