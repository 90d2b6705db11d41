//! Block origins that repeatedly reject approval prompts.
//!
//! # Overview
//!
//! The core of the module is the [Engine]. It is responsible for:
//! - Recording approval outcomes for blockable request kinds per origin
//! - Restarting an origin's count when its rejections fall out of the window
//! - Answering whether an origin is currently blocked from prompting
//!
//! # Details
//!
//! The engine consumes accepted/rejected approval outcomes published by the
//! surrounding application, filtered to a configured set of blockable
//! request kinds. Each rejection either extends an origin's record (when it
//! lands inside the rejection window) or restarts it at one; an acceptance
//! deletes the record entirely. An origin is blocked while its count has
//! reached the threshold and its most recent rejection is still inside the
//! blocking window.
//!
//! The [Mailbox] is used to query the [Engine]: whether an origin is blocked
//! and, for diagnostics, its raw rejection record. Both are total reads with
//! safe defaults.

mod config;
pub use config::Config;
mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::{Mailbox, Message};

use satchel_utils::{Origin, RequestKind};
use tokio::time::Instant;

/// Approval outcomes consumed from the surrounding application.
pub enum Event {
    /// The user accepted an approval request.
    Accepted { origin: Origin, kind: RequestKind },

    /// The user rejected an approval request.
    Rejected { origin: Origin, kind: RequestKind },
}

/// An origin's rejection record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Consecutive rejections inside the rejection window.
    pub rejections: u32,

    /// When the most recent rejection landed.
    pub last_rejection: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::mpsc, SinkExt};
    use prometheus_client::registry::Registry;
    use std::time::Duration;

    fn setup(cfg: Config) -> (Mailbox, mpsc::Sender<Event>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut registry = Registry::default();
        let (engine, mailbox) = Engine::new(cfg, &mut registry);
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

    async fn reject(events: &mut mpsc::Sender<Event>, origin: &Origin) {
        events
            .send(Event::Rejected {
                origin: origin.clone(),
                kind: RequestKind::from("transaction"),
            })
            .await
            .unwrap();
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_after_threshold_within_window() {
        let (mut mailbox, mut events) = setup(Config {
            threshold: 3,
            rejection_window: Duration::from_millis(1000),
            blocking_window: Duration::from_millis(500),
            ..Config::default()
        });
        let origin = Origin::from("app.example.com");

        reject(&mut events, &origin).await;
        assert!(!mailbox.is_blocked(origin.clone()).await);

        tokio::time::advance(Duration::from_millis(100)).await;
        reject(&mut events, &origin).await;
        assert!(!mailbox.is_blocked(origin.clone()).await);

        // The third rejection lands inside the window: blocked.
        tokio::time::advance(Duration::from_millis(100)).await;
        reject(&mut events, &origin).await;
        assert!(mailbox.is_blocked(origin.clone()).await);

        // Acceptance exonerates the origin immediately.
        events
            .send(Event::Accepted {
                origin: origin.clone(),
                kind: RequestKind::from("transaction"),
            })
            .await
            .unwrap();
        settle().await;
        assert!(!mailbox.is_blocked(origin.clone()).await);
        assert_eq!(mailbox.state(origin).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_gap_restarts_count() {
        let (mut mailbox, mut events) = setup(Config {
            threshold: 3,
            rejection_window: Duration::from_millis(1000),
            blocking_window: Duration::from_millis(500),
            ..Config::default()
        });
        let origin = Origin::from("app.example.com");

        reject(&mut events, &origin).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        reject(&mut events, &origin).await;
        assert_eq!(mailbox.state(origin.clone()).await.unwrap().rejections, 2);

        // Past the rejection window: the count restarts instead of
        // accumulating indefinitely.
        tokio::time::advance(Duration::from_millis(1100)).await;
        reject(&mut events, &origin).await;
        assert_eq!(mailbox.state(origin.clone()).await.unwrap().rejections, 1);

        tokio::time::advance(Duration::from_millis(100)).await;
        reject(&mut events, &origin).await;
        assert!(!mailbox.is_blocked(origin.clone()).await);

        tokio::time::advance(Duration::from_millis(100)).await;
        reject(&mut events, &origin).await;
        assert!(mailbox.is_blocked(origin).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_window_expiry() {
        let (mut mailbox, mut events) = setup(Config {
            threshold: 3,
            rejection_window: Duration::from_secs(10),
            blocking_window: Duration::from_millis(500),
            ..Config::default()
        });
        let origin = Origin::from("app.example.com");

        for _ in 0..3 {
            reject(&mut events, &origin).await;
        }
        assert!(mailbox.is_blocked(origin.clone()).await);

        // The block wears off while the count persists.
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!mailbox.is_blocked(origin.clone()).await);
        assert_eq!(mailbox.state(origin.clone()).await.unwrap().rejections, 3);

        // Still inside the rejection window: one more rejection re-blocks.
        reject(&mut events, &origin).await;
        assert!(mailbox.is_blocked(origin).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_blockable_kinds_ignored() {
        let (mut mailbox, mut events) = setup(Config {
            threshold: 1,
            ..Config::default()
        });
        let origin = Origin::from("app.example.com");

        events
            .send(Event::Rejected {
                origin: origin.clone(),
                kind: RequestKind::from("ping"),
            })
            .await
            .unwrap();
        settle().await;
        assert!(!mailbox.is_blocked(origin.clone()).await);
        assert_eq!(mailbox.state(origin).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut registry = Registry::default();
        let (engine, mut mailbox) = Engine::new(Config::default(), &mut registry);
        let (_events, receiver) = mpsc::channel::<Event>(16);
        let handle = engine.start(receiver);
        handle.abort();
        let _ = handle.await;

        assert!(!mailbox.is_blocked(Origin::from("app.example.com")).await);
        assert_eq!(mailbox.state(Origin::from("app.example.com")).await, None);
    }
}
