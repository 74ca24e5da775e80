// store

mod link_session_store;
mod revocation_store;
mod session_store;
mod store_error;

pub use link_session_store::*;
pub use revocation_store::*;
pub use session_store::*;
pub use store_error::*;

// collaborators

mod identity;

pub use identity::*;
