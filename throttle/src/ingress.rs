use crate::Entry;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};
use satchel_utils::Origin;

/// Messages that can be sent to a [Mailbox].
pub enum Message {
    /// Whether the origin is currently blocked from prompting the user.
    IsBlocked {
        origin: Origin,
        responder: oneshot::Sender<bool>,
    },

    /// The origin's rejection record, if any.
    State {
        origin: Origin,
        responder: oneshot::Sender<Option<Entry>>,
    },
}

/// Ingress mailbox for [`Engine`](super::Engine).
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(crate) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Whether `origin` is currently blocked from prompting the user.
    ///
    /// Pure read with a safe default: an origin with no record (or a gone
    /// engine) is not blocked.
    pub async fn is_blocked(&mut self, origin: Origin) -> bool {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .sender
            .send(Message::IsBlocked {
                origin,
                responder: tx,
            })
            .await;
        rx.await.unwrap_or(false)
    }

    /// The origin's rejection record, if any.
    pub async fn state(&mut self, origin: Origin) -> Option<Entry> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .sender
            .send(Message::State {
                origin,
                responder: tx,
            })
            .await;
        rx.await.unwrap_or(None)
    }
}
