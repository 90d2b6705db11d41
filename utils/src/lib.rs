//! Shared vocabulary for satchel primitives.
//!
//! Every engine in the workspace keys its state by [Origin] and classifies
//! approval traffic by [RequestKind]. [Swap] provides a cloneable handle to a
//! currently-active target that can be retargeted without invalidating
//! handles already captured by consumers.

mod origin;
pub use origin::{Origin, RequestKind};
mod swap;
pub use swap::Swap;
