//! Callback bus.
//!
//! Routes transport callbacks to subscribers by [`EventKind`], optionally
//! filtered by the peer the event references. The bus only routes: it owns
//! no entity state, and subscribers are plain keys (`S`) that the caller
//! resolves to behaviour inside the `deliver` closure passed to
//! [`CallbackBus::drain`].
//!
//! # Invariants
//!
//! - Events are delivered in publish order across all kinds.
//! - For one event, subscribers are visited in registration order.
//! - A failing subscriber does not stop delivery to the others. Failures go
//!   to the diagnostic sink (`tracing`) and the returned [`DeliveryReport`].
//!   Subscribers report failure by returning `Err`; a panic is a bug and
//!   unwinds out of [`CallbackBus::drain`].
//! - Subscriptions registered during delivery are active immediately,
//!   including for the event being delivered.

use std::{collections::VecDeque, fmt};

use crate::{
    callback::{CallbackEvent, EventKind},
    error::HandlerError,
    roster::PeerId,
};

/// Interest of one subscriber in one event kind.
#[derive(Debug, Clone)]
struct Subscription<S> {
    kind: EventKind,
    /// Only deliver events referencing this peer.
    from: Option<PeerId>,
    subscriber: S,
}

impl<S> Subscription<S> {
    fn matches(&self, event: &CallbackEvent) -> bool {
        self.kind == event.kind() && self.from.is_none_or(|peer| event.peer() == Some(peer))
    }
}

/// Collects subscriptions made by a handler while an event is delivered.
#[derive(Debug)]
pub struct Registrar<S> {
    pending: Vec<Subscription<S>>,
}

impl<S> Registrar<S> {
    fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Subscribe to every event of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, subscriber: S) {
        self.pending.push(Subscription { kind, from: None, subscriber });
    }

    /// Subscribe to events of `kind` that reference `peer`.
    pub fn subscribe_from(&mut self, kind: EventKind, peer: PeerId, subscriber: S) {
        self.pending.push(Subscription { kind, from: Some(peer), subscriber });
    }
}

/// A subscriber that failed to handle an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure<S> {
    /// Subscriber that failed.
    pub subscriber: S,
    /// Kind of the event being delivered.
    pub kind: EventKind,
    /// The handler's error.
    pub error: HandlerError,
}

/// Outcome of a [`CallbackBus::drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport<S> {
    /// Successful handler invocations.
    pub delivered: usize,
    /// Events no subscriber was registered for.
    pub dropped: usize,
    /// Handler invocations that returned an error.
    pub failures: Vec<HandlerFailure<S>>,
}

impl<S> Default for DeliveryReport<S> {
    fn default() -> Self {
        Self { delivered: 0, dropped: 0, failures: Vec::new() }
    }
}

/// Ordered distribution point for callback events.
#[derive(Debug)]
pub struct CallbackBus<S> {
    subscriptions: Vec<Subscription<S>>,
    queue: VecDeque<CallbackEvent>,
}

impl<S> Default for CallbackBus<S> {
    fn default() -> Self {
        Self { subscriptions: Vec::new(), queue: VecDeque::new() }
    }
}

impl<S: Clone + fmt::Debug> CallbackBus<S> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, subscriber: S) {
        self.subscriptions.push(Subscription { kind, from: None, subscriber });
    }

    /// Subscribe to events of `kind` that reference `peer`.
    pub fn subscribe_from(&mut self, kind: EventKind, peer: PeerId, subscriber: S) {
        self.subscriptions.push(Subscription { kind, from: Some(peer), subscriber });
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of events waiting for [`drain`](Self::drain).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue an event for delivery.
    pub fn publish(&mut self, event: CallbackEvent) {
        self.queue.push_back(event);
    }

    /// Deliver every queued event, in publish order.
    ///
    /// `deliver` is invoked once per matching subscription. Errors it returns
    /// are logged and collected in the report; they never abort the drain.
    pub fn drain<F>(&mut self, mut deliver: F) -> DeliveryReport<S>
    where
        F: FnMut(&S, &CallbackEvent, &mut Registrar<S>) -> Result<(), HandlerError>,
    {
        let mut report = DeliveryReport::default();

        while let Some(event) = self.queue.pop_front() {
            let mut matched = false;

            // Index loop: handlers may append subscriptions mid-delivery.
            let mut index = 0;
            while let Some(subscription) = self.subscriptions.get(index) {
                index += 1;
                if !subscription.matches(&event) {
                    continue;
                }
                matched = true;

                let subscriber = subscription.subscriber.clone();
                let mut registrar = Registrar::new();
                let outcome = deliver(&subscriber, &event, &mut registrar);
                self.subscriptions.append(&mut registrar.pending);

                match outcome {
                    Ok(()) => report.delivered += 1,
                    Err(error) => {
                        tracing::warn!(?subscriber, kind = ?event.kind(), %error, "callback handler failed");
                        report.failures.push(HandlerFailure {
                            subscriber,
                            kind: event.kind(),
                            error,
                        });
                    },
                }
            }

            if !matched {
                tracing::trace!(kind = ?event.kind(), "dropping callback with no subscribers");
                report.dropped += 1;
            }
        }

        report
    }
}
