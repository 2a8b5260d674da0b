use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A non-fatal note emitted while parsing or reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    pub component: &'static str,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn debug(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Debug,
            component,
            message: message.into(),
        }
    }

    pub fn info(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            component,
            message: message.into(),
        }
    }

    pub fn warning(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            component,
            message: message.into(),
        }
    }
}

pub trait DiagnosticSink {
    fn event(&self, event: DiagnosticEvent);
}

/// Discards every event.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn event(&self, _event: DiagnosticEvent) {}
}

/// Forwards events to the `tracing` subscriber installed by the binary.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn event(&self, event: DiagnosticEvent) {
        match event.severity {
            Severity::Debug => tracing::debug!(component = event.component, "{}", event.message),
            Severity::Info => tracing::info!(component = event.component, "{}", event.message),
            Severity::Warning => tracing::warn!(component = event.component, "{}", event.message),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.severity == Severity::Warning)
            .collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn event(&self, event: DiagnosticEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
