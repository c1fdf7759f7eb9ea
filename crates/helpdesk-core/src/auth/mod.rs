//! Principal-based authentication and credential lifecycle

pub mod policy;
pub mod principal;
pub mod refresh;

pub use principal::{Principal, SessionType};
pub use refresh::{
    IdentityProvider, TokenClaims, TokenExchange, TokenKind, TokenRefreshManager,
};
