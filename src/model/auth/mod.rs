pub use session::{AdminSession, Session};
pub use token::{AuthToken, Rights, AUTH_TOKEN_COOKIE};

mod session;
mod token;
