//! Synchronous in-process publish/subscribe registry.
//!
//! # Responsibility
//! - Keep an ordered list of handlers per `EventKind`.
//! - Dispatch each published event to its handlers on the calling thread.
//!
//! # Invariants
//! - Handlers run in registration order.
//! - A failing or panicking handler never stops the remaining handlers.
//! - Handler errors are logged here and never returned to the publisher.

use super::{DomainEvent, EventKind};
use log::{debug, error};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Error type returned by subscribers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by subscribers.
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&DomainEvent) -> HandlerResult + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    subscriber: String,
    handler: Handler,
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that were called.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Typed synchronous event bus.
///
/// Shared as `Arc<EventBus>` between the primary store (publisher) and the
/// projection engine (subscriber).
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<HashMap<EventKind, Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for one event kind under a subscriber label.
    ///
    /// The label only appears in diagnostics.
    pub fn subscribe<F>(&self, kind: EventKind, subscriber: impl Into<String>, handler: F)
    where
        F: Fn(&DomainEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let subscriber = subscriber.into();
        debug!(
            "event=event_subscribe module=events status=ok kind={} subscriber={}",
            kind, subscriber
        );
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Subscription {
                subscriber,
                handler: Arc::new(handler),
            });
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Dispatches `event` to every handler subscribed to its kind.
    ///
    /// The registry lock is released before handlers run, so a handler may
    /// publish or subscribe without deadlocking.
    pub fn publish(&self, event: &DomainEvent) -> PublishReport {
        let kind = event.kind();
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut report = PublishReport::default();
        for subscription in &subscriptions {
            report.invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscription.handler)(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    error!(
                        "event=event_dispatch module=events status=error kind={} subject={} subscriber={} error={}",
                        kind,
                        event.subject_id(),
                        subscription.subscriber,
                        err
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    error!(
                        "event=event_dispatch module=events status=error kind={} subject={} subscriber={} error_code=handler_panicked",
                        kind,
                        event.subject_id(),
                        subscription.subscriber
                    );
                }
            }
        }

        debug!(
            "event=event_publish module=events status=ok kind={} subject={} invoked={} failed={}",
            kind,
            event.subject_id(),
            report.invoked,
            report.failed
        );
        report
    }
}
