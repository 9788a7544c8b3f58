//! Owner authentication.
//!
//! Passwords are stored as Argon2id PHC strings; sessions are stateless
//! HS256 tokens carrying the owner's id and vehicle number.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{bearer_token, Claims, TokenIssuer};
