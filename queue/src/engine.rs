use super::{
    ingress::{Mailbox, Message, Operation},
    metrics::{Metrics, OriginLabel},
    Config,
};
use futures::{
    channel::{mpsc, oneshot},
    future::BoxFuture,
    stream::FuturesUnordered,
    StreamExt,
};
use prometheus_client::registry::Registry;
use satchel_utils::Origin;
use std::collections::{hash_map::Entry, HashMap, VecDeque};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, trace, warn};

/// An operation parked behind the running head of its origin's queue.
struct Waiting<T> {
    /// The operation's position in the global submission order.
    seq: u64,

    /// The operation itself.
    operation: Operation<T>,

    /// The responder to settle with the operation's output.
    responder: oneshot::Sender<T>,
}

/// A barrier armed by `wait_idle`.
struct Waiter {
    /// Operations with a sequence number below this were pending at call time.
    watermark: u64,

    /// How many of them have not yet settled.
    remaining: usize,

    /// The responder to resolve once the snapshot has drained.
    responder: oneshot::Sender<()>,
}

/// Outcome of a settled head operation.
struct Settled {
    origin: Origin,
    seq: u64,
    delivered: bool,
}

/// Instance of the main engine for the module.
///
/// It is responsible for:
/// - Accepting operations from the application and ordering them per origin
/// - Driving the head operation of every non-empty origin
/// - Settling callers with their operation's own output
/// - Publishing the pending count and resolving snapshot barriers
pub struct Engine<T: Send + 'static> {
    ////////////////////////////////////////
    // Messaging
    ////////////////////////////////////////
    /// The mailbox for receiving messages.
    mailbox: mpsc::Receiver<Message<T>>,

    /// Snapshot barriers from `wait_idle`.
    waiters: Vec<Waiter>,

    ////////////////////////////////////////
    // Queues
    ////////////////////////////////////////
    /// Parked operations per origin.
    ///
    /// An entry exists exactly while the origin's head operation is running;
    /// the deque holds the operations behind it. Entries are pruned as the
    /// last operation for an origin settles.
    queues: HashMap<Origin, VecDeque<Waiting<T>>>,

    /// The running head operation of every non-empty origin.
    running: FuturesUnordered<BoxFuture<'static, Settled>>,

    /// Sequence number assigned to the next enqueued operation.
    next_seq: u64,

    /// Unsettled operations across all origins.
    pending: usize,

    /// Publishes `pending` after every enqueue and settle.
    count: watch::Sender<usize>,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    /// Metrics
    metrics: Metrics,
}

impl<T: Send + 'static> Engine<T> {
    /// Creates a new engine with the given configuration.
    /// Returns the engine and a mailbox for sending messages to the engine.
    pub fn new(cfg: Config, registry: &mut Registry) -> (Self, Mailbox<T>) {
        assert!(cfg.mailbox_size > 0, "mailbox must hold at least one message");
        let (mailbox_sender, mailbox_receiver) = mpsc::channel(cfg.mailbox_size);
        let (count_sender, count_receiver) = watch::channel(0);
        let mailbox = Mailbox::new(mailbox_sender, count_receiver);
        let metrics = Metrics::init(registry);

        let result = Self {
            mailbox: mailbox_receiver,
            waiters: Vec::new(),
            queues: HashMap::new(),
            running: FuturesUnordered::new(),
            next_seq: 0,
            pending: 0,
            count: count_sender,
            metrics,
        };

        (result, mailbox)
    }

    /// Starts the engine.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Inner run loop called by `start`.
    async fn run(mut self) {
        loop {
            // Cleanup waiters
            self.cleanup_waiters();

            tokio::select! {
                // Handle mailbox messages
                message = self.mailbox.next() => {
                    let Some(message) = message else {
                        debug!("mailbox closed");
                        break;
                    };
                    match message {
                        Message::Enqueue { origin, operation, responder } => {
                            trace!("mailbox: enqueue");
                            self.handle_enqueue(origin, operation, responder);
                        }
                        Message::HasPending { origin, responder } => {
                            trace!("mailbox: has_pending");
                            let _ = responder.send(self.queues.contains_key(&origin));
                        }
                        Message::Pending { responder } => {
                            trace!("mailbox: pending");
                            let _ = responder.send(self.pending);
                        }
                        Message::WaitIdle { responder } => {
                            trace!("mailbox: wait_idle");
                            self.handle_wait_idle(responder);
                        }
                    }
                },

                // Handle settled head operations
                Some(settled) = self.running.next() => {
                    self.handle_settled(settled);
                },
            }
        }

        // Settle work that was in flight when the last mailbox clone dropped;
        // callers may still hold result receivers.
        while let Some(settled) = self.running.next().await {
            self.handle_settled(settled);
        }
    }

    ////////////////////////////////////////
    // Handling
    ////////////////////////////////////////

    /// Handles an `enqueue` request from the application.
    ///
    /// The operation starts immediately if the origin is idle; otherwise it
    /// parks behind the origin's tail.
    fn handle_enqueue(
        &mut self,
        origin: Origin,
        operation: Operation<T>,
        responder: oneshot::Sender<T>,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending += 1;
        self.publish_count();
        self.metrics
            .enqueued
            .get_or_create(&OriginLabel::from(&origin))
            .inc();
        self.metrics.pending.set(self.pending as i64);
        debug!(%origin, seq, "enqueued");

        match self.queues.entry(origin.clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().push_back(Waiting {
                seq,
                operation,
                responder,
            }),
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::new());
                self.begin(origin, seq, operation, responder);
            }
        }
    }

    /// Handles a `wait_idle` request from the application.
    ///
    /// Resolves immediately if nothing is pending; otherwise arms a barrier
    /// covering exactly the operations enqueued before this call.
    fn handle_wait_idle(&mut self, responder: oneshot::Sender<()>) {
        if self.pending == 0 {
            let _ = responder.send(());
            return;
        }
        debug!(pending = self.pending, "barrier armed");
        self.waiters.push(Waiter {
            watermark: self.next_seq,
            remaining: self.pending,
            responder,
        });
        self.metrics.waiters.set(self.waiters.len() as i64);
    }

    /// Handles a settled head operation.
    ///
    /// Decrements the pending count (success and failure alike), advances any
    /// armed barriers, and starts the next parked operation for the origin or
    /// prunes its queue.
    fn handle_settled(&mut self, settled: Settled) {
        let Settled {
            origin,
            seq,
            delivered,
        } = settled;
        self.pending -= 1;
        self.publish_count();
        self.metrics.settled.inc();
        self.metrics.pending.set(self.pending as i64);
        debug!(%origin, seq, "settled");
        if !delivered {
            // The caller dropped its receiver; the queue advances regardless.
            debug!(%origin, seq, "result dropped");
            self.metrics.undelivered.inc();
        }

        // Advance barriers covering this operation.
        for waiter in &mut self.waiters {
            if seq < waiter.watermark {
                waiter.remaining -= 1;
            }
        }
        let mut i = 0;
        while i < self.waiters.len() {
            if self.waiters[i].remaining > 0 {
                i += 1;
                continue;
            }

            // The index `i` is intentionally not incremented here to check
            // the element that was swapped into position `i`.
            let waiter = self.waiters.swap_remove(i);
            let _ = waiter.responder.send(());
        }
        self.metrics.waiters.set(self.waiters.len() as i64);

        // Start the next parked operation or prune the origin's queue.
        let next = match self.queues.get_mut(&origin) {
            Some(queue) => match queue.pop_front() {
                Some(next) => Some(next),
                None => {
                    self.queues.remove(&origin);
                    None
                }
            },
            None => {
                warn!(%origin, "settled operation for untracked origin");
                return;
            }
        };
        if let Some(next) = next {
            self.begin(origin, next.seq, next.operation, next.responder);
        }
    }

    ////////////////////////////////////////
    // Utilities
    ////////////////////////////////////////

    /// Starts driving an operation as the running head of its origin.
    fn begin(
        &mut self,
        origin: Origin,
        seq: u64,
        operation: Operation<T>,
        responder: oneshot::Sender<T>,
    ) {
        trace!(%origin, seq, "started");
        self.running.push(Box::pin(async move {
            let output = operation.await;
            let delivered = responder.send(output).is_ok();
            Settled {
                origin,
                seq,
                delivered,
            }
        }));
    }

    /// Remove all barriers whose receivers have dropped.
    fn cleanup_waiters(&mut self) {
        self.waiters.retain(|waiter| !waiter.responder.is_canceled());
        self.metrics.waiters.set(self.waiters.len() as i64);
    }

    /// Publish the pending count to subscribers.
    fn publish_count(&mut self) {
        // send_replace updates the channel even when no subscriber is
        // listening, so bookkeeping never blocks on a dead subscriber.
        self.count.send_replace(self.pending);
    }
}
