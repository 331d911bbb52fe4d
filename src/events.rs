//! Structured event emission on top of `tracing`. Every place in this
//! crate that needs to surface an operator-visible occurrence (a
//! dropped pub/sub message, a coalesced topology refresh, a connection
//! state transition) goes through here instead of scattering ad-hoc
//! `tracing::info!` calls with inconsistent field names.

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured occurrence: a stable `name`, a severity, and a set
/// of string-rendered fields. `span_id` identifies the logical request
/// or connection the event belongs to, when one exists.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: &'static str,
    pub severity: Severity,
    pub span_id: Option<String>,
    pub fields: Vec<(&'static str, String)>,
}

impl Event {
    pub fn new(name: &'static str, severity: Severity) -> Self {
        Self {
            name,
            severity,
            span_id: None,
            fields: Vec::new(),
        }
    }

    pub fn with_span(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn with_field(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }
}

/// Renders an event through `tracing` at the matching level.
pub fn emit(event: Event) {
    let rendered = render_fields(&event);
    let span = event.span_id.as_deref().unwrap_or("-");
    match event.severity {
        Severity::Debug => debug!(name = event.name, span_id = span, fields = %rendered),
        Severity::Info => info!(name = event.name, span_id = span, fields = %rendered),
        Severity::Warn => warn!(name = event.name, span_id = span, fields = %rendered),
        Severity::Error => error!(name = event.name, span_id = span, fields = %rendered),
    }
}

fn render_fields(event: &Event) -> String {
    event
        .fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_event_with_fields() {
        let event = Event::new("pubsub.dropped_message", Severity::Warn)
            .with_field("channel", "news")
            .with_field("queue_depth", 128);
        assert_eq!(event.fields.len(), 2);
        assert_eq!(render_fields(&event), "channel=news queue_depth=128");
    }
}
