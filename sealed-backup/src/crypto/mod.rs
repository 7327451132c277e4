//! Password-based encryption of backup artifacts.
//!
//! An artifact is the raw AES-256-CBC ciphertext of its plaintext, with no
//! header, salt or authentication tag. The password alone reproduces the key.

pub mod cipher;
pub mod kdf;

pub use kdf::{derive, KeyMaterial};

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::utils::errors::CryptoError;

/// Encrypt `input` into `output` using a key derived from `password`.
///
/// Returns the number of ciphertext bytes written.
pub fn encrypt_file(input: &Path, output: &Path, password: &str) -> Result<u64, CryptoError> {
    let plaintext = fs::read(input)?;
    let material = derive(password);
    let ciphertext = cipher::encrypt(&plaintext, material.key(), material.iv())?;
    fs::write(output, &ciphertext)?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        plaintext_bytes = plaintext.len(),
        ciphertext_bytes = ciphertext.len(),
        "encrypted file"
    );
    Ok(ciphertext.len() as u64)
}

/// Decrypt `input` into `output` using a key derived from `password`.
///
/// Returns the number of plaintext bytes written. A wrong password is only
/// detected if it happens to corrupt the padding.
pub fn decrypt_file(input: &Path, output: &Path, password: &str) -> Result<u64, CryptoError> {
    let ciphertext = fs::read(input)?;
    let material = derive(password);
    let plaintext = cipher::decrypt(&ciphertext, material.key(), material.iv())?;
    fs::write(output, &plaintext)?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        plaintext_bytes = plaintext.len(),
        "decrypted file"
    );
    Ok(plaintext.len() as u64)
}
