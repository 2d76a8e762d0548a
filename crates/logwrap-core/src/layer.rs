//! `tracing` integration.
//!
//! [`RegistryLayer`] routes `tracing` events into a registry entry so code
//! instrumented with `tracing::info!` and friends lands in the same sinks,
//! with the same line format, as records emitted through an
//! [`InstanceLogger`](crate::InstanceLogger).
//!
//! An `instance` field on the event overrides the layer's instance name:
//!
//! ```ignore
//! tracing::info!(instance = "cache", "evicted {} keys", n);
//! ```

use std::cell::Cell;
use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::level::Level;
use crate::record::{CallSite, UNKNOWN_FUNCTION};
use crate::registry::RegistryEntry;

/// Targets whose events are never forwarded: this crate's own
/// diagnostics and the HTTP sink's client stack, so sink activity cannot
/// loop back into the sinks.
const SKIPPED_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
    "mio",
    "want",
];

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// True when `target` is one of `SKIPPED_TARGETS` or a module below one.
fn is_skipped(target: &str) -> bool {
    SKIPPED_TARGETS.iter().any(|skipped| {
        target
            .strip_prefix(skipped)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Clears the re-entrancy flag when forwarding ends.
struct ForwardingGuard;

impl ForwardingGuard {
    fn enter() -> Option<Self> {
        FORWARDING.with(|flag| {
            if flag.replace(true) {
                None
            } else {
                Some(ForwardingGuard)
            }
        })
    }
}

impl Drop for ForwardingGuard {
    fn drop(&mut self) {
        FORWARDING.with(|flag| flag.set(false));
    }
}

/// A tracing Layer that forwards events to a registry entry.
pub struct RegistryLayer {
    entry: Arc<RegistryEntry>,
    instance: String,
}

impl RegistryLayer {
    /// Create a layer that labels events with `instance` unless they carry
    /// their own `instance` field.
    pub fn new(entry: Arc<RegistryEntry>, instance: impl Into<String>) -> Self {
        Self {
            entry,
            instance: instance.into(),
        }
    }

    pub fn entry(&self) -> &Arc<RegistryEntry> {
        &self.entry
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl<S> Layer<S> for RegistryLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_skipped(metadata.target()) {
            return;
        }
        // An event raised while a sink is writing is dropped
        let Some(_guard) = ForwardingGuard::enter() else {
            return;
        };

        let level = Level::from(*metadata.level());
        if !self.entry.is_enabled(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message.unwrap_or_default();
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields);
        }

        let line = metadata.line().unwrap_or(0);
        let call_site = match metadata.file() {
            Some(file) => CallSite::new(file, UNKNOWN_FUNCTION, line),
            None => CallSite {
                module: metadata.target(),
                function: UNKNOWN_FUNCTION,
                file: "?",
                line,
            },
        };

        let instance = visitor.instance.unwrap_or_else(|| self.instance.clone());
        let record = self
            .entry
            .new_record(level, message)
            .with_instance(instance)
            .with_call_site(call_site);
        self.entry.emit(&record);
    }
}

/// Collects the message, the `instance` field and the remaining fields
/// rendered as `key=value` pairs.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    instance: Option<String>,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(rendered),
            "instance" => self.instance = Some(rendered.trim_matches('"').to_string()),
            name => self.push_field(name, &rendered),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "instance" => self.instance = Some(value.to_string()),
            name => self.push_field(name, &value),
        }
    }
}
