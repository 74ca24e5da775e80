mod identity_bridge_http;
mod oauth_provider_http;

pub use identity_bridge_http::*;
pub use oauth_provider_http::*;
