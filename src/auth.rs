//! Auth-domain identifiers, cached token entries, ID-token claims, and the user session.

pub mod claims;
pub mod id;
pub mod session;
pub mod token;

pub use claims::*;
pub use id::*;
pub use session::*;
pub use token::{entry::*, secret::*};
