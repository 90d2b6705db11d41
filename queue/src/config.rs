/// Configuration for the [`Engine`](super::Engine).
pub struct Config {
    /// The maximum size of the mailbox backlog.
    pub mailbox_size: usize,
}
