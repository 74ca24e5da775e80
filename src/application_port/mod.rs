mod auth_coordinator;
mod oauth;
mod token_issuer;

pub use auth_coordinator::*;
pub use oauth::*;
pub use token_issuer::*;
