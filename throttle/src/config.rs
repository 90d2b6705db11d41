use satchel_utils::RequestKind;
use std::{collections::HashSet, time::Duration};

/// Configuration for the [`Engine`](super::Engine).
#[derive(Clone)]
pub struct Config {
    /// The maximum size of the mailbox backlog.
    pub mailbox_size: usize,

    /// Consecutive rejections inside the rejection window before an origin
    /// blocks.
    pub threshold: u32,

    /// A rejection landing more than this long after the previous one
    /// restarts the count.
    pub rejection_window: Duration,

    /// How recently the last rejection must have landed for a blocked origin
    /// to stay blocked.
    pub blocking_window: Duration,

    /// Request kinds whose outcomes feed the throttle; all others are
    /// ignored.
    pub blockable: HashSet<RequestKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox_size: 64,
            threshold: 3,
            rejection_window: Duration::from_secs(30),
            blocking_window: Duration::from_secs(10),
            blockable: ["transaction", "sign_typed_data", "personal_sign"]
                .into_iter()
                .map(RequestKind::from)
                .collect(),
        }
    }
}
