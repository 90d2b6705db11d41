use super::{
    ingress::{Mailbox, Message},
    Config, Event,
};
use futures::{
    channel::mpsc,
    stream::{Stream, StreamExt},
};
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use satchel_utils::{Origin, Swap};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Instance of the main engine for the module.
///
/// It is responsible for:
/// - Maintaining the origin-to-client mapping, wallet default included
/// - Resolving an origin's effective client under the per-origin flag
/// - Keeping every outstanding proxy pointed at its origin's resolution
/// - Following upstream network switches and flag toggles
pub struct Engine<C: Clone + Eq + Send + 'static> {
    ////////////////////////////////////////
    // Messaging
    ////////////////////////////////////////
    /// The mailbox for receiving messages.
    mailbox: mpsc::Receiver<Message<C>>,

    ////////////////////////////////////////
    // State
    ////////////////////////////////////////
    /// One entry per origin that has been assigned a client, keyed under the
    /// wallet sentinel for the wallet-wide default.
    domains: HashMap<Origin, C>,

    /// Retargetable handles held by consumers, kept equal to their origin's
    /// effective resolution at all times.
    proxies: HashMap<Origin, Swap<Option<C>>>,

    /// When false, every origin resolves to the wallet default.
    per_domain: bool,

    /// The flag value restored by reset.
    per_domain_default: bool,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    domains_gauge: Gauge,
    proxies_gauge: Gauge,
    hits: Counter,
    defaulted: Counter,
    unset: Counter,
    retargets: Counter,
}

impl<C: Clone + Eq + Send + 'static> Engine<C> {
    /// Creates a new engine with the given configuration.
    /// Returns the engine and a mailbox for sending messages to the engine.
    pub fn new(cfg: Config, registry: &mut Registry) -> (Self, Mailbox<C>) {
        assert!(cfg.mailbox_size > 0, "mailbox must hold at least one message");
        let (mailbox_sender, mailbox_receiver) = mpsc::channel(cfg.mailbox_size);
        let mailbox = Mailbox::new(mailbox_sender);

        let domains_gauge = Gauge::default();
        let proxies_gauge = Gauge::default();
        let hits = Counter::default();
        let defaulted = Counter::default();
        let unset = Counter::default();
        let retargets = Counter::default();
        registry.register("domains", "tracked origin mappings", domains_gauge.clone());
        registry.register("proxies", "outstanding proxies", proxies_gauge.clone());
        registry.register("hits", "lookups served by an origin's own entry", hits.clone());
        registry.register("defaulted", "lookups served by the wallet default", defaulted.clone());
        registry.register("unset", "lookups with no default set", unset.clone());
        registry.register("retargets", "proxy retargets", retargets.clone());

        (
            Self {
                mailbox: mailbox_receiver,
                domains: HashMap::new(),
                proxies: HashMap::new(),
                per_domain: cfg.per_domain,
                per_domain_default: cfg.per_domain,
                domains_gauge,
                proxies_gauge,
                hits,
                defaulted,
                unset,
                retargets,
            },
            mailbox,
        )
    }

    /// Starts the engine with the given upstream event stream.
    pub fn start(self, events: impl Stream<Item = Event<C>> + Send + 'static) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Inner run loop called by `start`.
    async fn run(mut self, events: impl Stream<Item = Event<C>> + Send + 'static) {
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
                        Message::SetForOrigin { origin, client, responder } => {
                            trace!("mailbox: set_for_origin");
                            self.handle_set_for_origin(origin, client);
                            let _ = responder.send(());
                        }
                        Message::SetDefault { client, responder } => {
                            trace!("mailbox: set_default");
                            self.handle_set_for_origin(Origin::wallet(), client);
                            let _ = responder.send(());
                        }
                        Message::Get { origin, responder } => {
                            trace!("mailbox: get");
                            let client = self.handle_get(origin);
                            let _ = responder.send(client);
                        }
                        Message::Proxy { origin, responder } => {
                            trace!("mailbox: proxy");
                            let proxy = self.handle_proxy(origin);
                            let _ = responder.send(proxy);
                        }
                        Message::Reset { responder } => {
                            trace!("mailbox: reset");
                            self.handle_reset();
                            let _ = responder.send(());
                        }
                    }
                },

                // Handle upstream events
                event = events.next(), if !events_done => {
                    match event {
                        Some(Event::SelectedNetworkChanged(client)) => {
                            debug!("event: selected network changed");
                            self.handle_set_for_origin(Origin::wallet(), client);
                        }
                        Some(Event::PerDomainChanged(enabled)) => {
                            debug!(enabled, "event: per-origin selection toggled");
                            self.handle_per_domain(enabled);
                        }
                        None => {
                            // The upstream is gone; keep serving lookups.
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

    /// Handles a `set_for_origin` (or `set_default`, via the wallet sentinel)
    /// request.
    fn handle_set_for_origin(&mut self, origin: Origin, client: C) {
        debug!(%origin, "set client");
        self.domains.insert(origin.clone(), client);
        self.domains_gauge.set(self.domains.len() as i64);
        if origin.is_wallet() {
            // A new wallet default can change any origin's resolution.
            self.retarget_all();
        } else {
            self.retarget(&origin);
        }
    }

    /// Handles a `get` request.
    ///
    /// Under per-origin selection, an origin with no entry is pinned to the
    /// wallet default on first read, so later default switches no longer
    /// affect it.
    fn handle_get(&mut self, origin: Origin) -> Option<C> {
        if !self.per_domain {
            let client = self.domains.get(&Origin::wallet()).cloned();
            match client {
                Some(_) => self.defaulted.inc(),
                None => self.unset.inc(),
            };
            return client;
        }

        if let Some(client) = self.domains.get(&origin) {
            self.hits.inc();
            return Some(client.clone());
        }

        let Some(default) = self.domains.get(&Origin::wallet()).cloned() else {
            self.unset.inc();
            return None;
        };
        debug!(%origin, "pinned origin to wallet default on first read");
        self.domains.insert(origin, default.clone());
        self.domains_gauge.set(self.domains.len() as i64);
        self.defaulted.inc();
        Some(default)
    }

    /// Handles a `proxy` request.
    fn handle_proxy(&mut self, origin: Origin) -> Swap<Option<C>> {
        if let Some(proxy) = self.proxies.get(&origin) {
            return proxy.clone();
        }
        let proxy = Swap::new(self.resolve(&origin));
        self.proxies.insert(origin, proxy.clone());
        self.proxies_gauge.set(self.proxies.len() as i64);
        proxy
    }

    /// Handles a per-origin flag toggle.
    fn handle_per_domain(&mut self, enabled: bool) {
        if self.per_domain == enabled {
            return;
        }
        self.per_domain = enabled;
        self.retarget_all();
    }

    /// Handles a `reset` request.
    ///
    /// Outstanding proxies stay valid; they are retargeted to unset rather
    /// than dropped.
    fn handle_reset(&mut self) {
        debug!("reset");
        self.domains.clear();
        self.per_domain = self.per_domain_default;
        self.domains_gauge.set(0);
        self.retarget_all();
    }

    ////////////////////////////////////////
    // Utilities
    ////////////////////////////////////////

    /// The effective client for `origin` under the current state.
    fn resolve(&self, origin: &Origin) -> Option<C> {
        if self.per_domain {
            if let Some(client) = self.domains.get(origin) {
                return Some(client.clone());
            }
        }
        self.domains.get(&Origin::wallet()).cloned()
    }

    /// Retarget `origin`'s proxy (if one exists) to its current resolution.
    fn retarget(&self, origin: &Origin) {
        let Some(proxy) = self.proxies.get(origin) else {
            return;
        };
        let target = self.resolve(origin);
        if proxy.current() != target {
            proxy.retarget(target);
            self.retargets.inc();
        }
    }

    /// Retarget every outstanding proxy to its current resolution.
    fn retarget_all(&self) {
        for origin in self.proxies.keys() {
            self.retarget(origin);
        }
    }
}
