/// Scribe Crypto Library
///
/// Credential hashing (Argon2id) and session tokens (HS256 JWT).
/// Both are configured at construction; nothing here reads the environment.

pub mod password;
pub mod token;

pub use password::{HashCost, PasswordHasher};
pub use token::{TokenError, TokenIssuer};
