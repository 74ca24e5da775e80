mod auth_coordinator_impl;
mod jwt_token_issuer;
mod oauth_flow;
mod oauth_identity;

pub use auth_coordinator_impl::*;
pub use jwt_token_issuer::*;
pub use oauth_flow::*;
pub use oauth_identity::*;
