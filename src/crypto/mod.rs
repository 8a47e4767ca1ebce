//! Password encryption.
//!
//! Login passwords may be stored as anonymous sealed boxes (X25519,
//! NaCl-compatible) so the config file never holds them in plain text.
//! The sealed plaintext is 32 bytes of padding followed by the password.

pub mod keys;

pub use keys::{CryptoError, KeyPair, PASSWORD_PADDING};
