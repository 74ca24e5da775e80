mod api_client;
mod refresh_coordinator;
mod refresher;
mod storage;

pub use api_client::*;
pub use refresh_coordinator::*;
pub use refresher::*;
pub use storage::*;
