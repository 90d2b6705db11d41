//! Key types identifying who issued a request and what was requested.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Reserved origin representing the wallet's own internal context.
const WALLET: &str = "wallet";

/// The domain (or reserved internal context) that issued a request.
///
/// Origins are opaque strings; the only distinguished value is the wallet's
/// own context, constructed with [Origin::wallet].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// The reserved origin representing the wallet itself.
    ///
    /// Used as the key for the wallet-wide default in per-origin maps.
    pub fn wallet() -> Self {
        Self(WALLET.into())
    }

    /// Whether this is the reserved wallet origin.
    pub fn is_wallet(&self) -> bool {
        self.0 == WALLET
    }

    /// The origin as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Origin {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for Origin {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Classification of an approval request (e.g. a transaction confirmation).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKind(String);

impl RequestKind {
    /// The kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestKind {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for RequestKind {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
