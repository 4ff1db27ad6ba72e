//! Authentication for farmnet
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - Bearer-token guards that resolve the calling farmer

pub mod guard;
pub mod jwt;
pub mod password;

pub use guard::{authenticate, authenticate_optional};
pub use jwt::{bearer_token, Claims, JwtValidator};
pub use password::{hash_password, verify_password};
