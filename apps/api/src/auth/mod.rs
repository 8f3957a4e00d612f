pub mod guard;
pub mod handlers;
pub mod password;
pub mod service;
pub mod tokens;

pub use guard::AuthUser;
pub use tokens::{TokenIssuer, TokenKind, TokenPair};
