use super::{
    ingress::{Mailbox, Message},
    Config, Entry, Event,
};
use futures::{
    channel::mpsc,
    stream::{Stream, StreamExt},
};
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use satchel_utils::{Origin, RequestKind};
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, trace};

/// Instance of the main engine for the module.
///
/// It is responsible for:
/// - Recording approval outcomes for blockable request kinds per origin
/// - Restarting an origin's count when its rejections fall out of the window
/// - Answering whether an origin is currently blocked from prompting
pub struct Engine {
    ////////////////////////////////////////
    // Messaging
    ////////////////////////////////////////
    /// The mailbox for receiving messages.
    mailbox: mpsc::Receiver<Message>,

    ////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////
    /// Rejections required before an origin blocks.
    threshold: u32,

    /// Gap beyond which a rejection restarts the count.
    rejection_window: Duration,

    /// Gap within which a blocked origin stays blocked.
    blocking_window: Duration,

    /// Request kinds whose outcomes feed the throttle.
    blockable: HashSet<RequestKind>,

    ////////////////////////////////////////
    // State
    ////////////////////////////////////////
    /// One record per origin with rejections since its last acceptance.
    throttled: HashMap<Origin, Entry>,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    throttled_gauge: Gauge,
    accepted: Counter,
    rejected: Counter,
    ignored: Counter,
    blocked_lookups: Counter,
}

impl Engine {
    /// Creates a new engine with the given configuration.
    /// Returns the engine and a mailbox for sending messages to the engine.
    pub fn new(cfg: Config, registry: &mut Registry) -> (Self, Mailbox) {
        assert!(cfg.mailbox_size > 0, "mailbox must hold at least one message");
        assert!(cfg.threshold > 0, "threshold must be at least one rejection");
        assert!(
            !cfg.rejection_window.is_zero() && !cfg.blocking_window.is_zero(),
            "windows must be non-zero"
        );
        let (mailbox_sender, mailbox_receiver) = mpsc::channel(cfg.mailbox_size);
        let mailbox = Mailbox::new(mailbox_sender);

        let throttled_gauge = Gauge::default();
        let accepted = Counter::default();
        let rejected = Counter::default();
        let ignored = Counter::default();
        let blocked_lookups = Counter::default();
        registry.register("throttled", "origins with rejection records", throttled_gauge.clone());
        registry.register("accepted", "blockable acceptances", accepted.clone());
        registry.register("rejected", "blockable rejections", rejected.clone());
        registry.register("ignored", "outcomes for non-blockable kinds", ignored.clone());
        registry.register("blocked_lookups", "lookups that found an origin blocked", blocked_lookups.clone());

        (
            Self {
                mailbox: mailbox_receiver,
                threshold: cfg.threshold,
                rejection_window: cfg.rejection_window,
                blocking_window: cfg.blocking_window,
                blockable: cfg.blockable,
                throttled: HashMap::new(),
                throttled_gauge,
                accepted,
                rejected,
                ignored,
                blocked_lookups,
            },
            mailbox,
        )
    }

    /// Starts the engine with the given approval-outcome event stream.
    pub fn start(self, events: impl Stream<Item = Event> + Send + 'static) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Inner run loop called by `start`.
    async fn run(mut self, events: impl Stream<Item = Event> + Send + 'static) {
        let mut events = Box::pin(events.fuse());
        let mut events_done = false;
        loop {
            tokio::select! {
                // Handle mailbox messages
                message = self.mailbox.next() => {
                    let Some(message) = message else {
                        debug!("mailbox closed");
                        break;
                    };
                    match message {
                        Message::IsBlocked { origin, responder } => {
                            trace!("mailbox: is_blocked");
                            let _ = responder.send(self.handle_is_blocked(&origin));
                        }
                        Message::State { origin, responder } => {
                            trace!("mailbox: state");
                            let _ = responder.send(self.throttled.get(&origin).copied());
                        }
                    }
                },

                // Handle approval outcomes
                event = events.next(), if !events_done => {
                    match event {
                        Some(Event::Accepted { origin, kind }) => {
                            self.handle_accepted(origin, kind);
                        }
                        Some(Event::Rejected { origin, kind }) => {
                            self.handle_rejected(origin, kind);
                        }
                        None => {
                            // The approval subsystem is gone; keep serving
                            // lookups against the state accumulated so far.
                            debug!("event stream closed");
                            events_done = true;
                        }
                    }
                },
            }
        }
    }

    ////////////////////////////////////////
    // Handling
    ////////////////////////////////////////

    /// Handles an accepted approval: acceptance exonerates the origin.
    fn handle_accepted(&mut self, origin: Origin, kind: RequestKind) {
        if !self.blockable.contains(&kind) {
            self.ignored.inc();
            return;
        }
        self.accepted.inc();
        if self.throttled.remove(&origin).is_some() {
            debug!(%origin, "origin exonerated");
            self.throttled_gauge.set(self.throttled.len() as i64);
        }
    }

    /// Handles a rejected approval, stamped with the time of receipt.
    fn handle_rejected(&mut self, origin: Origin, kind: RequestKind) {
        if !self.blockable.contains(&kind) {
            self.ignored.inc();
            return;
        }
        self.rejected.inc();
        let now = Instant::now();
        let entry = self
            .throttled
            .entry(origin.clone())
            .and_modify(|entry| {
                if now.duration_since(entry.last_rejection) > self.rejection_window {
                    entry.rejections = 1;
                } else {
                    entry.rejections += 1;
                }
                entry.last_rejection = now;
            })
            .or_insert(Entry {
                rejections: 1,
                last_rejection: now,
            });
        debug!(%origin, rejections = entry.rejections, "rejection recorded");
        self.throttled_gauge.set(self.throttled.len() as i64);
    }

    /// Handles an `is_blocked` request. Pure read, no side effects on state.
    fn handle_is_blocked(&self, origin: &Origin) -> bool {
        let Some(entry) = self.throttled.get(origin) else {
            return false;
        };
        let blocked = entry.rejections >= self.threshold
            && Instant::now().duration_since(entry.last_rejection) <= self.blocking_window;
        if blocked {
            self.blocked_lookups.inc();
        }
        blocked
    }
}
