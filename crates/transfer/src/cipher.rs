//! AES in 8-bit cipher-feedback mode.
//!
//! The server encrypts the whole file as one CFB-8 stream and cuts the
//! ciphertext into chunks, so one decryptor must be fed every chunk in index
//! order; its feedback register carries over between calls.

use aes::{Aes128, Aes192, Aes256};
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, KeyIvInit};

use crate::TransferError;

/// Streaming CFB-8 decryptor keyed for AES-128, AES-192 or AES-256.
pub enum ChunkDecryptor {
    Aes128(cfb8::Decryptor<Aes128>),
    Aes192(cfb8::Decryptor<Aes192>),
    Aes256(cfb8::Decryptor<Aes256>),
}

impl ChunkDecryptor {
    /// Builds a decryptor; the key length selects the AES variant.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, TransferError> {
        let bad_length = |_: cfb8::cipher::InvalidLength| {
            TransferError::Protocol(format!(
                "invalid cipher parameters: key {} bytes, iv {} bytes",
                key.len(),
                iv.len()
            ))
        };
        match key.len() {
            16 => cfb8::Decryptor::new_from_slices(key, iv)
                .map(Self::Aes128)
                .map_err(bad_length),
            24 => cfb8::Decryptor::new_from_slices(key, iv)
                .map(Self::Aes192)
                .map_err(bad_length),
            32 => cfb8::Decryptor::new_from_slices(key, iv)
                .map(Self::Aes256)
                .map_err(bad_length),
            n => Err(TransferError::Protocol(format!(
                "unsupported key length: {n} bytes"
            ))),
        }
    }

    /// Decrypts `buf` in place, continuing the stream from the previous call.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(d) => decrypt_stream(d, buf),
            Self::Aes192(d) => decrypt_stream(d, buf),
            Self::Aes256(d) => decrypt_stream(d, buf),
        }
    }
}

fn decrypt_stream<D>(decryptor: &mut D, buf: &mut [u8])
where
    D: BlockDecryptMut<BlockSize = cfb8::cipher::consts::U1>,
{
    for byte in buf.chunks_exact_mut(1) {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(byte));
    }
}

/// Encrypting counterpart used by scripted servers.
#[cfg(any(test, feature = "test-util"))]
pub struct ChunkEncryptor(cfb8::Encryptor<Aes256>);

#[cfg(any(test, feature = "test-util"))]
impl ChunkEncryptor {
    /// AES-256 only.
    pub fn new(key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self(cfb8::Encryptor::new(key.into(), iv.into()))
    }

    pub fn encrypt(&mut self, buf: &mut [u8]) {
        use cfb8::cipher::BlockEncryptMut;
        for byte in buf.chunks_exact_mut(1) {
            self.0.encrypt_block_mut(GenericArray::from_mut_slice(byte));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x11; 32];
    const IV: [u8; 16] = [0x22; 16];

    #[test]
    fn decrypts_across_chunk_boundaries() {
        let plain: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut cipher = plain.clone();
        ChunkEncryptor::new(&KEY, &IV).encrypt(&mut cipher);
        assert_ne!(cipher, plain);

        let mut decryptor = ChunkDecryptor::new(&KEY, &IV).unwrap();
        let mut out = Vec::new();
        for chunk in cipher.chunks(333) {
            let mut chunk = chunk.to_vec();
            decryptor.decrypt(&mut chunk);
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out, plain);
    }

    #[test]
    fn fresh_decryptor_per_chunk_fails_after_first() {
        let plain = vec![0xabu8; 64];
        let mut cipher = plain.clone();
        ChunkEncryptor::new(&KEY, &IV).encrypt(&mut cipher);

        let mut second = cipher[32..].to_vec();
        ChunkDecryptor::new(&KEY, &IV).unwrap().decrypt(&mut second);
        assert_ne!(second, plain[32..]);
    }

    #[test]
    fn nist_cfb8_aes128_vector() {
        // NIST SP 800-38A F.3.7, first four bytes.
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let mut data = hex::decode("3b79424c").unwrap();
        ChunkDecryptor::new(&key, &iv).unwrap().decrypt(&mut data);
        assert_eq!(hex::encode(data), "6bc1bee2");
    }

    #[test]
    fn key_length_selects_variant() {
        assert!(matches!(
            ChunkDecryptor::new(&[0u8; 16], &IV),
            Ok(ChunkDecryptor::Aes128(_))
        ));
        assert!(matches!(
            ChunkDecryptor::new(&[0u8; 24], &IV),
            Ok(ChunkDecryptor::Aes192(_))
        ));
        assert!(matches!(
            ChunkDecryptor::new(&[0u8; 32], &IV),
            Ok(ChunkDecryptor::Aes256(_))
        ));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            ChunkDecryptor::new(&[0u8; 20], &IV),
            Err(TransferError::Protocol(_))
        ));
        assert!(matches!(
            ChunkDecryptor::new(&KEY, &[0u8; 8]),
            Err(TransferError::Protocol(_))
        ));
    }
}
