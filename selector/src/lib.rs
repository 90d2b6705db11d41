//! Select a network client per requesting origin.
//!
//! # Overview
//!
//! The core of the module is the [Engine]. It is responsible for:
//! - Maintaining the origin-to-client mapping, wallet default included
//! - Resolving an origin's effective client under the per-origin flag
//! - Keeping every outstanding proxy pointed at its origin's resolution
//! - Following upstream network switches and flag toggles
//!
//! # Details
//!
//! The engine maps each requesting origin to an opaque network client
//! identifier. With per-origin selection disabled, every origin resolves to
//! the wallet-wide default (kept under a reserved sentinel origin); with it
//! enabled, an origin's own entry wins and an origin with no entry is pinned
//! to the wallet default on first read. Lookups for an unseen origin are an
//! expected bootstrap condition, not an error: they fall back to the default
//! and return unset only if no default has ever been set.
//!
//! The [Mailbox] is used to make requests to the [Engine]. Consumers that
//! dispatch many requests for one origin can instead hold the origin's
//! [Swap] proxy, which the engine retargets in place whenever the origin's
//! effective resolution changes. The engine also consumes an upstream
//! [Event] stream so the wallet default tracks the externally-selected
//! network without an explicit per-origin action.

mod config;
pub use config::Config;
mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::{Mailbox, Message};

use thiserror::Error;

/// Events consumed from the surrounding application.
pub enum Event<C> {
    /// The externally-selected network changed; the wallet default follows.
    SelectedNetworkChanged(C),

    /// The per-origin selection flag was toggled.
    PerDomainChanged(bool),
}

/// Errors that can occur when interacting with a [Mailbox].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The engine has shut down and can no longer accept work.
    #[error("closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::mpsc, SinkExt};
    use prometheus_client::registry::Registry;
    use satchel_utils::Origin;

    type Events = mpsc::Sender<Event<&'static str>>;

    fn setup(per_domain: bool) -> (Mailbox<&'static str>, Events) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut registry = Registry::default();
        let (engine, mailbox) = Engine::new(
            Config {
                mailbox_size: 16,
                per_domain,
            },
            &mut registry,
        );
        let (events, receiver) = mpsc::channel(16);
        engine.start(receiver);
        (mailbox, events)
    }

    /// Let the engine drain events already sent to it before querying over
    /// the mailbox channel.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_default_resolution_when_per_domain_disabled() {
        let (mut mailbox, _events) = setup(false);
        let origin = Origin::from("app.example.com");

        mailbox.set_default("mainnet").await.unwrap();
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();

        // The flag is off: the origin's own entry is ignored.
        assert_eq!(mailbox.get(origin).await, Some("mainnet"));
        assert_eq!(mailbox.get(Origin::from("other.example.com")).await, Some("mainnet"));
    }

    #[tokio::test]
    async fn test_per_domain_resolution() {
        let (mut mailbox, _events) = setup(true);
        let origin = Origin::from("app.example.com");
        let pinned = Origin::from("pinned.example.com");

        mailbox.set_default("mainnet").await.unwrap();
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();
        assert_eq!(mailbox.get(origin).await, Some("goerli"));

        // First read pins the origin to the default in force at the time.
        assert_eq!(mailbox.get(pinned.clone()).await, Some("mainnet"));
        mailbox.set_default("sepolia").await.unwrap();
        assert_eq!(mailbox.get(pinned).await, Some("mainnet"));
        assert_eq!(mailbox.get(Origin::from("fresh.example.com")).await, Some("sepolia"));
    }

    #[tokio::test]
    async fn test_unset_when_no_default() {
        let (mut mailbox, _events) = setup(true);
        let origin = Origin::from("app.example.com");

        assert_eq!(mailbox.get(origin.clone()).await, None);

        // An origin's own entry needs no default.
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();
        assert_eq!(mailbox.get(origin).await, Some("goerli"));
        assert_eq!(mailbox.get(Origin::from("other.example.com")).await, None);
    }

    #[tokio::test]
    async fn test_upstream_network_switch() {
        let (mut mailbox, mut events) = setup(false);
        let origin = Origin::from("app.example.com");

        events
            .send(Event::SelectedNetworkChanged("mainnet"))
            .await
            .unwrap();
        settle().await;
        assert_eq!(mailbox.get(origin.clone()).await, Some("mainnet"));

        events
            .send(Event::SelectedNetworkChanged("sepolia"))
            .await
            .unwrap();
        settle().await;
        assert_eq!(mailbox.get(origin).await, Some("sepolia"));
    }

    #[tokio::test]
    async fn test_proxy_retargeting() {
        let (mut mailbox, mut events) = setup(true);
        let origin = Origin::from("app.example.com");

        mailbox.set_default("mainnet").await.unwrap();
        let proxy = mailbox.proxy(origin.clone()).await.unwrap();
        assert_eq!(proxy.current(), Some("mainnet"));

        // The captured handle follows the origin's effective resolution.
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();
        assert_eq!(proxy.current(), Some("goerli"));

        events.send(Event::PerDomainChanged(false)).await.unwrap();
        settle().await;
        assert_eq!(proxy.current(), Some("mainnet"));

        events.send(Event::PerDomainChanged(true)).await.unwrap();
        settle().await;
        assert_eq!(proxy.current(), Some("goerli"));

        mailbox.reset().await.unwrap();
        assert_eq!(proxy.current(), None);

        // The same handle is returned for the origin on later requests.
        let again = mailbox.proxy(origin).await.unwrap();
        again.retarget(Some("sepolia"));
        assert_eq!(proxy.current(), Some("sepolia"));
    }

    #[tokio::test]
    async fn test_reset_round_trip() {
        let (mut mailbox, mut events) = setup(false);
        let origin = Origin::from("app.example.com");

        events.send(Event::PerDomainChanged(true)).await.unwrap();
        settle().await;
        mailbox.set_default("mainnet").await.unwrap();
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();
        assert_eq!(mailbox.get(origin.clone()).await, Some("goerli"));

        mailbox.reset().await.unwrap();
        assert_eq!(mailbox.get(origin.clone()).await, None);

        // The flag is back at its configured default: per-origin entries are
        // ignored again.
        mailbox.set_default("mainnet").await.unwrap();
        mailbox.set_for_origin(origin.clone(), "goerli").await.unwrap();
        assert_eq!(mailbox.get(origin).await, Some("mainnet"));
    }

    #[tokio::test]
    async fn test_closed() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut registry = Registry::default();
        let (engine, mut mailbox) = Engine::<&'static str>::new(
            Config {
                mailbox_size: 16,
                per_domain: false,
            },
            &mut registry,
        );
        let (_events, receiver) = mpsc::channel::<Event<&'static str>>(16);
        let handle = engine.start(receiver);
        handle.abort();
        let _ = handle.await;

        assert!(matches!(
            mailbox.set_default("mainnet").await,
            Err(Error::Closed)
        ));
        assert_eq!(mailbox.get(Origin::from("app.example.com")).await, None);
    }
}
