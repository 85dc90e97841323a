//! Cryptographic primitives for the Kuta session engine.
//!
//! # Components
//!
//! - [`token`]: opaque session tokens, their SHA-256 digests, constant-time verification
//! - [`password`]: Argon2id password hashing with a self-describing encoding
//! - [`nanoid`]: fixed-alphabet identifiers via rejection sampling
//! - [`random`]: the secure random source everything above draws from

pub mod error;
pub mod nanoid;
pub mod password;
pub mod random;
pub mod token;

pub use error::{CryptoError, Result};
pub use nanoid::{DEFAULT_ALPHABET, DEFAULT_ID_LENGTH, NanoId};
pub use password::{
    Argon2Params, MAX_ITERATIONS, MAX_MEMORY_KIB, MAX_PARALLELISM, PasswordHasher,
};
pub use random::{OsRandom, RandomSource};
pub use token::{
    DEFAULT_TOKEN_BYTES, TokenPair, generate_hashed_token, generate_hashed_token_with,
    generate_token, generate_token_with, hash_token, verify_token,
};
