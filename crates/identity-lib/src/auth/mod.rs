// ============================
// crates/identity-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod password;
pub mod session;
pub mod token;
mod service;
mod service_impl;

pub use password::PasswordHasher;
pub use session::{InMemorySessionCache, SessionCache, SessionEntry};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer};
pub use service::{AuthService, IssuedSession};
pub use service_impl::{DefaultAuth, DEFAULT_TOKEN_TTL};
