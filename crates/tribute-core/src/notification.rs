//! Viewer-facing notifications
//!
//! Definitions declare message templates keyed by timing. When a template
//! fires it is rendered against its product and queued; the dispatcher hands
//! at most one message to the sink per cooldown window, shared across every
//! channel.

use crate::host::NotificationSink;
use crate::time::{format_duration, Millis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// When a notification fires relative to its product's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationTiming {
    /// When the product starts running
    OnStart,
    /// When the product stops
    OnEnd,
    /// As soon as the transaction is accepted
    #[default]
    Now,
}

/// Where a notification is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NotificationChannel {
    #[default]
    Chat,
    Overhead,
    Popup,
}

/// A declared notification
///
/// `message` may reference `{buyer}`, `{product}`, `{amount}`, `{currency}`
/// and `{duration}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDef {
    #[serde(default)]
    pub timing: NotificationTiming,
    #[serde(default)]
    pub channel: NotificationChannel,
    pub message: String,
}

impl NotificationDef {
    pub fn new(timing: NotificationTiming, message: impl Into<String>) -> Self {
        Self {
            timing,
            channel: NotificationChannel::default(),
            message: message.into(),
        }
    }
}

/// Values substituted into message templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    pub buyer: String,
    pub product: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// Remaining product time
    pub remaining_ms: Millis,
}

impl TemplateContext {
    /// Substitute `{buyer}`, `{product}`, `{amount}`, `{currency}` and
    /// `{duration}` in one pass; substituted text is never expanded again
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let Some(close) = tail.find('}') else {
                rest = tail;
                break;
            };
            let name = &tail[1..close];
            if name.contains('{') {
                out.push('{');
                rest = &tail[1..];
                continue;
            }
            match self.value(name) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&tail[..=close]),
            }
            rest = &tail[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn value(&self, name: &str) -> Option<String> {
        match name {
            "buyer" => Some(self.buyer.clone()),
            "product" => Some(self.product.clone()),
            "amount" => Some(
                self.amount
                    .map(|amount| format!("{:.2}", amount))
                    .unwrap_or_default(),
            ),
            "currency" => Some(self.currency.clone().unwrap_or_default()),
            "duration" => Some(format_duration(self.remaining_ms)),
            _ => None,
        }
    }
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: NotificationChannel,
    pub message: String,
}

impl Notification {
    pub fn render(def: &NotificationDef, context: &TemplateContext) -> Self {
        Self {
            channel: def.channel,
            message: context.render(&def.message),
        }
    }
}

/// Bounded, rate-limited delivery queue
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    queue: VecDeque<Notification>,
    cooldown_ms: Millis,
    max_queued: usize,
    last_delivered_at: Option<Millis>,
}

impl NotificationDispatcher {
    pub fn new(cooldown_ms: Millis, max_queued: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            cooldown_ms: cooldown_ms.max(0),
            max_queued,
            last_delivered_at: None,
        }
    }

    /// Queue a message; dropped (false) when the queue is full
    pub fn enqueue(&mut self, notification: Notification) -> bool {
        if self.queue.len() >= self.max_queued {
            debug!(message = %notification.message, "notification queue full, dropping");
            return false;
        }
        self.queue.push_back(notification);
        true
    }

    /// Deliver the oldest queued message if the cooldown allows it
    ///
    /// A failed delivery still consumes the message and the cooldown window.
    pub fn flush<S: NotificationSink + ?Sized>(&mut self, now: Millis, sink: &mut S) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        let Some(notification) = self.queue.pop_front() else {
            return false;
        };
        self.last_delivered_at = Some(now);
        if let Err(error) = sink.deliver(&notification) {
            warn!(%error, message = %notification.message, "notification delivery failed");
            return false;
        }
        true
    }

    /// Whether the shared cooldown has elapsed
    pub fn is_ready(&self, now: Millis) -> bool {
        self.last_delivered_at
            .map_or(true, |last| now - last >= self.cooldown_ms)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
