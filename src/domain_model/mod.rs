mod oauth;
mod session;
mod subject;
mod token;

pub use oauth::*;
pub use session::*;
pub use subject::*;
pub use token::*;
