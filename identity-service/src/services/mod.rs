pub mod auth;
pub mod database;
pub mod error;
pub mod jwt;
pub mod revocation;

pub use auth::AuthService;
pub use database::Database;
pub use error::ServiceError;
pub use jwt::{SessionClaims, TokenKind, TokenService};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
