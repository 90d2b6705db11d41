use crate::Error;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};
use satchel_utils::Origin;
use std::{future::Future, pin::Pin};
use tokio::sync::watch;

/// A unit of pending work submitted for ordered execution.
///
/// The output is opaque to the queue: a caller's failure value settles the
/// operation exactly like a success would.
pub type Operation<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Messages that can be sent to a [Mailbox].
pub enum Message<T> {
    /// Append an operation to an origin's queue.
    Enqueue {
        origin: Origin,
        operation: Operation<T>,
        responder: oneshot::Sender<T>,
    },

    /// Whether the named origin has unsettled operations.
    HasPending {
        origin: Origin,
        responder: oneshot::Sender<bool>,
    },

    /// The number of unsettled operations across all origins.
    Pending { responder: oneshot::Sender<usize> },

    /// Resolve once every operation enqueued before this message has settled.
    WaitIdle { responder: oneshot::Sender<()> },
}

/// Ingress mailbox for [`Engine`](super::Engine).
pub struct Mailbox<T> {
    sender: mpsc::Sender<Message<T>>,
    count: watch::Receiver<usize>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            count: self.count.clone(),
        }
    }
}

impl<T> Mailbox<T> {
    pub(crate) fn new(sender: mpsc::Sender<Message<T>>, count: watch::Receiver<usize>) -> Self {
        Self { sender, count }
    }

    /// Append `operation` to `origin`'s queue.
    ///
    /// The returned receiver resolves with the operation's own output exactly
    /// when it settles; failures propagate verbatim. The operation starts
    /// only after every previously-enqueued operation for the same origin has
    /// settled; operations for distinct origins interleave freely.
    pub async fn enqueue(
        &mut self,
        origin: Origin,
        operation: impl Future<Output = T> + Send + 'static,
    ) -> Result<oneshot::Receiver<T>, Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Enqueue {
                origin,
                operation: Box::pin(operation),
                responder: tx,
            })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(rx)
    }

    /// Whether `origin` has unsettled operations.
    ///
    /// An origin with no queue at all is reported as idle.
    pub async fn has_pending(&mut self, origin: Origin) -> bool {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .sender
            .send(Message::HasPending {
                origin,
                responder: tx,
            })
            .await;
        rx.await.unwrap_or(false)
    }

    /// The number of unsettled operations across all origins.
    pub async fn pending(&mut self) -> usize {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(Message::Pending { responder: tx }).await;
        rx.await.unwrap_or(0)
    }

    /// Resolve once every operation enqueued strictly before this call has
    /// settled.
    ///
    /// This is a snapshot barrier: operations enqueued while the wait is
    /// outstanding are not awaited.
    pub async fn wait_idle(&mut self) -> Result<oneshot::Receiver<()>, Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::WaitIdle { responder: tx })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(rx)
    }

    /// Observe the pending count, published after every enqueue and settle.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.clone()
    }
}
