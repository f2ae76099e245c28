pub mod rate_limit;
pub mod session;
pub mod token;

pub use session::{SessionContext, SessionResolver};
pub use token::{Claims, TokenError, TokenService, TOKEN_TTL_SECS};
