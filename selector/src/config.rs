/// Configuration for the [`Engine`](super::Engine).
pub struct Config {
    /// The maximum size of the mailbox backlog.
    pub mailbox_size: usize,

    /// Whether origins resolve through their own entries.
    ///
    /// When false, every origin resolves to the wallet-wide default. This is
    /// also the value the flag returns to on reset.
    pub per_domain: bool,
}
