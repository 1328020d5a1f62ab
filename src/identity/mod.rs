//! Identity module
//!
//! Password authentication and bearer tokens. The ledger core only ever
//! sees the username this module vouches for.

mod password;
mod service;
mod token;

pub use password::{hash_password, verify_password};
pub use service::{AuthService, DEFAULT_INITIAL_BALANCE};
pub use token::{Claims, TokenIssuer};
