//! Account identifiers, poll targets, and the bearer credential forwarded upstream.

pub mod credential;
pub mod id;

pub use credential::*;
pub use id::*;
