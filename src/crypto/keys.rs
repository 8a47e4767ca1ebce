//! Key pair loading, verification and sealed-box operations.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};
use thiserror::Error;

/// Bytes of padding in front of every sealed password.
pub const PASSWORD_PADDING: usize = 32;

const KEY_SIZE: usize = 32;

const VERIFY_MESSAGE: &[u8] = b"test";

/// Errors from key handling and decryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("{field} is not valid base64: {source}")]
    Encoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("base64 decoded {field} is not 32 bytes long")]
    KeyLength { field: &'static str },

    #[error("unable to seal message with the public key")]
    Seal,

    #[error("decryption failed, private and/or public key are probably incorrect")]
    KeyMismatch,

    #[error("decryption failed, either private/public key or message are incorrect")]
    Decrypt,

    #[error("decrypted password is shorter than its 32 byte padding")]
    Padding,

    #[error("decrypted password is not valid utf-8")]
    Utf8,
}

/// An X25519 key pair for sealed boxes.
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_base64())
            .finish_non_exhaustive()
    }
}

fn decode_key(field: &'static str, encoded: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|source| CryptoError::Encoding { field, source })?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::KeyLength { field })
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { public, secret }
    }

    /// Decode both keys and check that they belong together.
    pub fn load_and_verify(public_base64: &str, private_base64: &str) -> Result<Self, CryptoError> {
        let public = PublicKey::from(decode_key("public_key", public_base64)?);
        let secret = SecretKey::from(decode_key("private_key", private_base64)?);
        let pair = Self { public, secret };

        let sealed = pair.seal(VERIFY_MESSAGE)?;
        match pair.open(&sealed) {
            Ok(opened) if opened == VERIFY_MESSAGE => Ok(pair),
            _ => Err(CryptoError::KeyMismatch),
        }
    }

    pub fn public_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }

    pub fn private_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }

    /// Seal `plaintext` for the holder of this pair's private key.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.public
            .seal(&mut OsRng, plaintext)
            .map_err(|_| CryptoError::Seal)
    }

    /// Open a sealed box addressed to this pair.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.secret.unseal(sealed).map_err(|_| CryptoError::Decrypt)
    }

    /// Seal `password` behind 32 random bytes of padding, base64 encoded.
    pub fn encrypt_password(&self, password: &str) -> Result<String, CryptoError> {
        let mut plaintext = SecretKey::generate(&mut OsRng).to_bytes().to_vec();
        plaintext.extend_from_slice(password.as_bytes());
        Ok(STANDARD.encode(self.seal(&plaintext)?))
    }

    /// Decrypt a base64 sealed password and strip its padding.
    pub fn decrypt_password(&self, encrypted: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD
            .decode(encrypted.trim())
            .map_err(|source| CryptoError::Encoding {
                field: "encrypted_password",
                source,
            })?;

        let mut plaintext = self.open(&sealed)?;
        if plaintext.len() < PASSWORD_PADDING {
            return Err(CryptoError::Padding);
        }
        let password = plaintext.split_off(PASSWORD_PADDING);
        String::from_utf8(password).map_err(|_| CryptoError::Utf8)
    }
}
