//! AES-256-CBC with PKCS#7 padding.
//!
//! There is no authentication: a tampered ciphertext decrypts to garbage
//! instead of failing, unless the damage lands on the padding byte.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::kdf::{IV_LEN, KEY_LEN};
use crate::utils::errors::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Append PKCS#7 padding. Always adds between 1 and `block_size` bytes, so an
/// already aligned input gains a full block.
pub fn pad(mut data: Vec<u8>, block_size: usize) -> Vec<u8> {
    let pad_len = block_size - data.len() % block_size;
    data.resize(data.len() + pad_len, pad_len as u8);
    data
}

/// Strip padding by trusting the final byte as the pad length.
///
/// The pad bytes themselves are not checked.
pub fn unpad(mut data: Vec<u8>) -> Result<Vec<u8>, CryptoError> {
    let len = data.len();
    let pad_len = match data.last() {
        Some(&last) => last as usize,
        None => return Err(CryptoError::CorruptPadding { pad_len: 0, len }),
    };

    if pad_len > len {
        return Err(CryptoError::CorruptPadding { pad_len, len });
    }

    data.truncate(len - pad_len);
    Ok(data)
}

fn check_lengths(key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        });
    }
    Ok(())
}

/// Pad and encrypt `plaintext`.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_lengths(key, iv)?;
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        }
    })?;

    let padded = pad(plaintext.to_vec(), BLOCK_SIZE);
    Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(&padded))
}

/// Decrypt `ciphertext` and strip its padding.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_lengths(key, iv)?;
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }

    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        }
    })?;

    let plaintext = cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertextLength(ciphertext.len()))?;

    unpad(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::derive;

    #[test]
    fn test_pad_every_length() {
        for len in 0..=64usize {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let padded = pad(data.clone(), BLOCK_SIZE);

            assert_eq!(padded.len() % BLOCK_SIZE, 0, "length {}", len);
            assert!(padded.len() > len, "length {}", len);
            assert_eq!(unpad(padded).unwrap(), data, "length {}", len);
        }
    }

    #[test]
    fn test_aligned_input_gets_full_block() {
        let padded = pad(vec![7u8; BLOCK_SIZE], BLOCK_SIZE);
        assert_eq!(padded.len(), 2 * BLOCK_SIZE);
        assert!(padded[BLOCK_SIZE..].iter().all(|&b| b == BLOCK_SIZE as u8));
    }

    #[test]
    fn test_unpad_rejects_oversized_pad() {
        let err = unpad(vec![1, 2, 200]).unwrap_err();
        assert!(matches!(err, CryptoError::CorruptPadding { pad_len: 200, len: 3 }));
    }

    #[test]
    fn test_unpad_rejects_empty_buffer() {
        assert!(matches!(
            unpad(Vec::new()),
            Err(CryptoError::CorruptPadding { .. })
        ));
    }

    // Ciphertexts of existing artifacts must keep decrypting.
    #[test]
    fn test_known_answer() {
        let material = derive("pw");

        let ciphertext = encrypt(b"hello", material.key(), material.iv()).unwrap();
        assert_eq!(
            ciphertext,
            [
                0x33, 0xf4, 0x1c, 0x73, 0xc1, 0xf2, 0x19, 0x39, 0x92, 0xd7, 0x57, 0x18, 0x44, 0x33,
                0xbd, 0x8e,
            ]
        );
        assert_eq!(decrypt(&ciphertext, material.key(), material.iv()).unwrap(), b"hello");

        let aligned = encrypt(b"0123456789abcdef", material.key(), material.iv()).unwrap();
        assert_eq!(
            aligned,
            [
                0x7b, 0x84, 0x57, 0x5e, 0x05, 0x75, 0x07, 0xcf, 0xb2, 0x73, 0xd2, 0x13, 0x04, 0x5c,
                0xfe, 0x4e, 0x9e, 0x0c, 0x88, 0x6e, 0x3a, 0xae, 0xf6, 0xcc, 0xc8, 0xa3, 0x46, 0x88,
                0x50, 0xc5, 0xfe, 0xb4,
            ]
        );
    }

    #[test]
    fn test_roundtrip() {
        let material = derive("pw");
        for len in [0usize, 1, 15, 16, 17, 31, 32, 1000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let ciphertext = encrypt(&plaintext, material.key(), material.iv()).unwrap();

            assert_eq!(ciphertext.len(), (len / BLOCK_SIZE + 1) * BLOCK_SIZE);
            let decrypted = decrypt(&ciphertext, material.key(), material.iv()).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_encryption_is_deterministic() {
        let material = derive("pw");
        let a = encrypt(b"same input", material.key(), material.iv()).unwrap();
        let b = encrypt(b"same input", material.key(), material.iv()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_key_length() {
        let err = encrypt(b"data", &[0u8; 16], &[0u8; IV_LEN]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn test_invalid_ciphertext_length() {
        let material = derive("pw");
        let err = decrypt(&[0u8; 17], material.key(), material.iv()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidCiphertextLength(17)));
    }

    #[test]
    fn test_bit_flips_never_panic() {
        let material = derive("pw");
        let plaintext = b"a reasonably long plaintext spanning several AES blocks".to_vec();
        let ciphertext = encrypt(&plaintext, material.key(), material.iv()).unwrap();

        for byte in 0..ciphertext.len() {
            for bit in 0..8 {
                let mut corrupted = ciphertext.clone();
                corrupted[byte] ^= 1 << bit;
                match decrypt(&corrupted, material.key(), material.iv()) {
                    Ok(output) => assert_ne!(output, plaintext),
                    Err(CryptoError::CorruptPadding { .. }) => {}
                    Err(other) => panic!("unexpected error: {}", other),
                }
            }
        }
    }

    #[test]
    fn test_wrong_password_does_not_reproduce_plaintext() {
        let right = derive("pw");
        let wrong = derive("wrong");
        let plaintext = b"hello world, this is secret".to_vec();
        let ciphertext = encrypt(&plaintext, right.key(), right.iv()).unwrap();

        match decrypt(&ciphertext, wrong.key(), wrong.iv()) {
            Ok(output) => assert_ne!(output, plaintext),
            Err(err) => assert!(matches!(err, CryptoError::CorruptPadding { .. })),
        }
    }
}
