mod expiring;
mod identity;
mod purge;
mod stores;

pub use identity::*;
pub use purge::*;
pub use stores::*;
