use crate::Error;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};
use satchel_utils::{Origin, Swap};

/// Messages that can be sent to a [Mailbox].
pub enum Message<C> {
    /// Upsert an origin's client mapping.
    SetForOrigin {
        origin: Origin,
        client: C,
        responder: oneshot::Sender<()>,
    },

    /// Upsert the wallet-wide default mapping.
    SetDefault {
        client: C,
        responder: oneshot::Sender<()>,
    },

    /// Resolve the effective client for an origin.
    Get {
        origin: Origin,
        responder: oneshot::Sender<Option<C>>,
    },

    /// Retrieve the origin's retargetable handle, creating it on first use.
    Proxy {
        origin: Origin,
        responder: oneshot::Sender<Swap<Option<C>>>,
    },

    /// Restore the constructor's default state.
    Reset { responder: oneshot::Sender<()> },
}

/// Ingress mailbox for [`Engine`](super::Engine).
pub struct Mailbox<C> {
    sender: mpsc::Sender<Message<C>>,
}

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<C> Mailbox<C> {
    pub(crate) fn new(sender: mpsc::Sender<Message<C>>) -> Self {
        Self { sender }
    }

    /// Upsert `origin`'s client mapping. Idempotent.
    pub async fn set_for_origin(&mut self, origin: Origin, client: C) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::SetForOrigin {
                origin,
                client,
                responder: tx,
            })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Upsert the wallet-wide default mapping.
    pub async fn set_default(&mut self, client: C) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::SetDefault {
                client,
                responder: tx,
            })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Resolve the effective client for `origin`.
    ///
    /// Never fails for an unseen origin while a default exists; returns
    /// `None` only if no default has ever been set (or the engine is gone).
    pub async fn get(&mut self, origin: Origin) -> Option<C> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .sender
            .send(Message::Get {
                origin,
                responder: tx,
            })
            .await;
        rx.await.unwrap_or(None)
    }

    /// Retrieve `origin`'s retargetable handle, creating it on first use.
    ///
    /// The handle always holds the origin's current effective resolution and
    /// is retargeted in place as the underlying state changes.
    pub async fn proxy(&mut self, origin: Origin) -> Result<Swap<Option<C>>, Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Proxy {
                origin,
                responder: tx,
            })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Restore the constructor's default state.
    ///
    /// Clears every mapping (the wallet default included) and retargets all
    /// outstanding proxies to unset.
    pub async fn reset(&mut self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Reset { responder: tx })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }
}
