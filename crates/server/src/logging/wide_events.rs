//! One span per protocol exchange, carrying everything known about it.
//!
//! A [`WideEvent`] is opened when an authorization or token request arrives; handlers
//! record attributes onto it as they learn them (client, authentication method,
//! subject) and finish it with a single outcome event. Subscribers see the
//! attributes on the span rather than scattered across many log lines.
//!
//! ```rust,ignore
//! let evt = WideEvent::new("authorize");
//! evt.add("client_id", &client_id);
//! evt.add("auth.method", "password");
//! evt.success("code issued");
//! ```

use std::fmt::Display;
use tracing::{Level, Span, field};

/// Attribute names a [`WideEvent`] accepts. Spans only record fields declared up front.
pub const FIELDS: &[&str] = &[
    "client_id",
    "auth.method",
    "subject",
    "redirect_uri",
    "grant_type",
    "outcome",
    "error",
];

#[derive(Clone, Debug)]
pub struct WideEvent {
    span: Span,
}

impl WideEvent {
    pub fn new(name: &'static str) -> Self {
        let span = tracing::span!(
            Level::INFO,
            "wide_event",
            event.name = name,
            client_id = field::Empty,
            auth.method = field::Empty,
            subject = field::Empty,
            redirect_uri = field::Empty,
            grant_type = field::Empty,
            outcome = field::Empty,
            error = field::Empty,
        );
        WideEvent { span }
    }

    /// Record `value` under `key`. Keys outside [`FIELDS`] are ignored by the span.
    pub fn add<V: Display>(&self, key: &'static str, value: V) {
        debug_assert!(FIELDS.contains(&key), "undeclared wide event field `{key}`");
        self.span.record(key, field::display(value));
    }

    pub fn add_opt<V: Display>(&self, key: &'static str, value: Option<V>) {
        if let Some(v) = value {
            self.add(key, v);
        }
    }

    pub fn emit(&self, message: &str, level: Level) {
        self.span.in_scope(|| match level {
            Level::ERROR => tracing::event!(Level::ERROR, message = %message),
            Level::WARN => tracing::event!(Level::WARN, message = %message),
            Level::INFO => tracing::event!(Level::INFO, message = %message),
            Level::DEBUG => tracing::event!(Level::DEBUG, message = %message),
            Level::TRACE => tracing::event!(Level::TRACE, message = %message),
        });
    }

    pub fn success(&self, message: &str) {
        self.add("outcome", "success");
        self.emit(message, Level::INFO);
    }

    /// Close the event as failed. Server faults are logged at error, rejections at warn.
    pub fn failure(&self, err: &crate::error::IdpError) {
        self.add("outcome", "failure");
        self.add("error", err);
        let level = if err.is_server_fault() {
            Level::ERROR
        } else {
            Level::WARN
        };
        self.emit("request failed", level);
    }
}
