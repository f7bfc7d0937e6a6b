//! JWT verification for HostelHub
//!
//! Token issuance (login, refresh, OTP flows) is handled by the identity
//! service; this backend only verifies access tokens presented to it.

mod jwt;

pub use jwt::{verify_token, Claims, TokenError};
