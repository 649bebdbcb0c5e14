/*
 * Copyright 2023 Aon Cyber Solutions
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Reverses the layered encryption applied to a stored LM/NT hash.
//!
//! Each hash is protected by an outer stream/block cipher (RC4 before the
//! Anniversary Update SAM format, AES-CBC after) keyed from the database-wide
//! syskey, and an inner pair of single-block DES operations keyed purely from
//! the account RID. The inner layer always runs on the output of the outer
//! decryption.

use crate::err::Error;
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use des::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use serde::Serialize;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub(crate) const RID_LEN: usize = 4;
pub(crate) const HASH_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;
const DES_BLOCK_LEN: usize = 8;

const LM_HASH_CONSTANT: &[u8] = b"LMPASSWORD\0";
const NT_HASH_CONSTANT: &[u8] = b"NTPASSWORD\0";

/// Which of the two stored hash kinds is being decrypted; selects the salt
/// constant mixed into the RC4 key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum HashKind {
    Lm,
    Nt,
}

impl HashKind {
    fn rc4_constant(self) -> &'static [u8] {
        match self {
            HashKind::Lm => LM_HASH_CONSTANT,
            HashKind::Nt => NT_HASH_CONSTANT,
        }
    }
}

/// Derives the two DES keys for the inner layer from the 4 RID bytes.
///
/// The RID bytes are rotated into two 7-byte sequences, each spread over
/// 8 bytes of key with 7 bits per byte.
pub fn derive_rid_keys(rid: &[u8]) -> Result<([u8; 8], [u8; 8]), Error> {
    if rid.len() != RID_LEN {
        return Err(Error::InvalidRidSize { len: rid.len() });
    }
    let seq1 = [rid[0], rid[1], rid[2], rid[3], rid[0], rid[1], rid[2]];
    let seq2 = [rid[3], rid[0], rid[1], rid[2], rid[3], rid[0], rid[1]];
    Ok((transform_rid_key(&seq1), transform_rid_key(&seq2)))
}

/// Spreads 56 bits over 8 key bytes. The low bit of every output byte is the
/// DES parity slot and is left zero; Windows does not set real parity here
/// and DES ignores the bit, so neither do we.
fn transform_rid_key(seq: &[u8; 7]) -> [u8; 8] {
    let spread = [
        seq[0] >> 1,
        ((seq[0] & 0x01) << 6) | (seq[1] >> 2),
        ((seq[1] & 0x03) << 5) | (seq[2] >> 3),
        ((seq[2] & 0x07) << 4) | (seq[3] >> 4),
        ((seq[3] & 0x0F) << 3) | (seq[4] >> 5),
        ((seq[4] & 0x1F) << 2) | (seq[5] >> 6),
        ((seq[5] & 0x3F) << 1) | (seq[6] >> 7),
        seq[6] & 0x7F,
    ];
    let mut key = [0u8; 8];
    for (key_byte, spread_byte) in key.iter_mut().zip(spread.iter()) {
        *key_byte = spread_byte << 1;
    }
    key
}

/// The RID-keyed inner layer: every 16-byte half is decrypted as two
/// independent single DES blocks, the first with key1 and the second with
/// key2. There is no chaining.
pub(crate) fn decrypt_des_layer(encrypted: &[u8], rid: &[u8]) -> Result<Vec<u8>, Error> {
    if encrypted.is_empty() || encrypted.len() % HASH_LEN != 0 {
        return Err(Error::BlockAlignment {
            len: encrypted.len(),
        });
    }
    let (key1, key2) = derive_rid_keys(rid)?;
    let cipher1 = des::Des::new_from_slice(&key1).map_err(|error| Error::CipherKey {
        detail: error.to_string(),
    })?;
    let cipher2 = des::Des::new_from_slice(&key2).map_err(|error| Error::CipherKey {
        detail: error.to_string(),
    })?;

    let mut decrypted = Vec::with_capacity(encrypted.len());
    for half in encrypted.chunks(HASH_LEN) {
        let mut block = GenericArray::clone_from_slice(&half[..DES_BLOCK_LEN]);
        cipher1.decrypt_block(&mut block);
        decrypted.extend_from_slice(&block);
        let mut block = GenericArray::clone_from_slice(&half[DES_BLOCK_LEN..]);
        cipher2.decrypt_block(&mut block);
        decrypted.extend_from_slice(&block);
    }
    Ok(decrypted)
}

/// Decrypts a hash stored in the RC4 format: the outer key is
/// MD5(syskey ‖ rid ‖ kind constant), then the inner DES layer runs on the
/// RC4 output.
pub fn decrypt_rc4_hash(
    rid: &[u8],
    syskey: &[u8],
    encrypted: &[u8],
    kind: HashKind,
) -> Result<Vec<u8>, Error> {
    if encrypted.len() != HASH_LEN {
        return Err(Error::HashDataLength {
            len: encrypted.len(),
        });
    }
    let mut context = md5::Context::new();
    context.consume(syskey);
    context.consume(rid);
    context.consume(kind.rc4_constant());
    let rc4_key = context.compute();

    let des_layer = rc4_apply(&rc4_key.0, encrypted);
    decrypt_des_layer(&des_layer, rid)
}

/// Decrypts a hash stored in the AES format. A zero-length input means no
/// hash of this kind is present and yields an empty result. The syskey is
/// used directly as the AES key; the inner DES layer runs over the full
/// plaintext and the hash is its first 16 bytes.
pub fn decrypt_aes_hash(
    rid: &[u8],
    syskey: &[u8],
    encrypted: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, Error> {
    if encrypted.is_empty() {
        return Ok(Vec::new());
    }
    if encrypted.len() % AES_BLOCK_LEN != 0 {
        return Err(Error::BlockAlignment {
            len: encrypted.len(),
        });
    }
    let plaintext = aes_cbc_decrypt(syskey, iv, encrypted)?;
    let mut decrypted = decrypt_des_layer(&plaintext, rid)?;
    decrypted.truncate(HASH_LEN);
    Ok(decrypted)
}

/// AES-CBC decryption without padding; the key length selects AES-128 or
/// AES-256, mirroring what the OS accepts for the derived key material.
pub(crate) fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.is_empty() || data.len() % AES_BLOCK_LEN != 0 {
        return Err(Error::BlockAlignment { len: data.len() });
    }
    let mut buffer = data.to_vec();
    match key.len() {
        16 => {
            let decryptor =
                Aes128CbcDec::new_from_slices(key, iv).map_err(|error| Error::CipherKey {
                    detail: error.to_string(),
                })?;
            decryptor
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|error| Error::CipherKey {
                    detail: error.to_string(),
                })?;
        }
        32 => {
            let decryptor =
                Aes256CbcDec::new_from_slices(key, iv).map_err(|error| Error::CipherKey {
                    detail: error.to_string(),
                })?;
            decryptor
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|error| Error::CipherKey {
                    detail: error.to_string(),
                })?;
        }
        len => return Err(Error::MalformedSyskey { len }),
    }
    Ok(buffer)
}

/// RC4 keystream application (encrypt and decrypt are the same operation).
pub(crate) fn rc4_apply(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: [u8; 256] = [0; 256];
    for (i, entry) in state.iter_mut().enumerate() {
        *entry = i as u8;
    }

    let mut j: usize = 0;
    for i in 0..256 {
        j = (j + state[i] as usize + key[i % key.len()] as usize) % 256;
        state.swap(i, j);
    }

    let mut i: usize = 0;
    j = 0;
    let mut output = vec![0u8; data.len()];
    for (n, byte) in data.iter().enumerate() {
        i = (i + 1) % 256;
        j = (j + state[i] as usize) % 256;
        state.swap(i, j);
        let k = state[(state[i] as usize + state[j] as usize) % 256];
        output[n] = byte ^ k;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;
    use des::cipher::BlockEncrypt;

    const RID_500: [u8; 4] = [0xF4, 0x01, 0x00, 0x00];
    // NT hash of "password"
    const KNOWN_HASH: &str = "58A478135A93AC3BF058A5EA0E8FDB71";

    fn rc4_syskey() -> Vec<u8> {
        hex::decode("3d212ce8a2da8343bdad1ef2cfb6b31c").unwrap()
    }

    /// Applies the inner DES layer in the encrypt direction, to build test
    /// fixtures for the decrypt path.
    fn encrypt_des_layer(plaintext: &[u8], rid: &[u8]) -> Vec<u8> {
        let (key1, key2) = derive_rid_keys(rid).unwrap();
        let cipher1 = des::Des::new_from_slice(&key1).unwrap();
        let cipher2 = des::Des::new_from_slice(&key2).unwrap();
        let mut encrypted = Vec::new();
        for half in plaintext.chunks(16) {
            let mut block = GenericArray::clone_from_slice(&half[..8]);
            cipher1.encrypt_block(&mut block);
            encrypted.extend_from_slice(&block);
            let mut block = GenericArray::clone_from_slice(&half[8..]);
            cipher2.encrypt_block(&mut block);
            encrypted.extend_from_slice(&block);
        }
        encrypted
    }

    #[test]
    fn test_decrypt_rc4_hash_known_vector() {
        let encrypted = hex::decode("ed928792783b692c213749bcdbe31af5").unwrap();
        let hash = decrypt_rc4_hash(&RID_500, &rc4_syskey(), &encrypted, HashKind::Nt).unwrap();
        assert_eq!(KNOWN_HASH, hex::encode_upper(&hash));
    }

    #[test]
    fn test_decrypt_rc4_hash_is_deterministic() {
        let encrypted = hex::decode("ed928792783b692c213749bcdbe31af5").unwrap();
        let first = decrypt_rc4_hash(&RID_500, &rc4_syskey(), &encrypted, HashKind::Nt).unwrap();
        let second = decrypt_rc4_hash(&RID_500, &rc4_syskey(), &encrypted, HashKind::Nt).unwrap();
        assert_eq!(first, second);
        assert_eq!(16, first.len());
    }

    #[test]
    fn test_rid_size_invariant() {
        for len in [0usize, 1, 3, 5, 8].iter() {
            let rid = vec![0xF4u8; *len];
            match derive_rid_keys(&rid) {
                Err(Error::InvalidRidSize { len: reported }) => assert_eq!(*len, reported),
                other => panic!("expected InvalidRidSize for {} bytes, got {:?}", len, other),
            }
            let encrypted = [0u8; 16];
            assert!(decrypt_rc4_hash(&rid, &rc4_syskey(), &encrypted, HashKind::Nt).is_err());
        }
    }

    #[test]
    fn test_derived_rid_keys_differ_and_mask_parity_bit() {
        let (key1, key2) = derive_rid_keys(&RID_500).unwrap();
        assert_ne!(key1, key2);
        for byte in key1.iter().chain(key2.iter()) {
            assert_eq!(0, byte & 0x01);
        }
    }

    #[test]
    fn test_decrypt_aes_hash_empty_input() {
        let hash = decrypt_aes_hash(&RID_500, &[0u8; 16], &[], &[0u8; 16]).unwrap();
        assert!(hash.is_empty());
    }

    #[test]
    fn test_decrypt_aes_hash_block_alignment() {
        for len in [1usize, 15, 17, 31].iter() {
            let encrypted = vec![0u8; *len];
            match decrypt_aes_hash(&RID_500, &[0u8; 16], &encrypted, &[0u8; 16]) {
                Err(Error::BlockAlignment { len: reported }) => assert_eq!(*len, reported),
                other => panic!("expected BlockAlignment for {} bytes, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_decrypt_aes_hash_recovers_layered_fixture() {
        // Build the doubly-encrypted fixture the way the OS would: DES the
        // known hash with the RID keys, pad to two AES blocks, AES-CBC
        // encrypt under the syskey.
        type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

        let hash = hex::decode(KNOWN_HASH).unwrap();
        let syskey = [0xA5u8; 16];
        let iv = [0x1Cu8; 16];

        let mut padded = encrypt_des_layer(&hash, &RID_500);
        padded.extend_from_slice(&[0u8; 16]);
        let encryptor = Aes128CbcEnc::new_from_slices(&syskey, &iv).unwrap();
        let len = padded.len();
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut padded, len)
            .unwrap();

        let decrypted = decrypt_aes_hash(&RID_500, &syskey, &padded, &iv).unwrap();
        assert_eq!(hash, decrypted);
    }

    #[test]
    fn test_decrypt_aes_hash_with_256_bit_key() {
        type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

        let hash = hex::decode(KNOWN_HASH).unwrap();
        let syskey = [0x5Au8; 32];
        let iv = [0x0Du8; 16];

        let mut padded = encrypt_des_layer(&hash, &RID_500);
        padded.extend_from_slice(&[0u8; 16]);
        let encryptor = Aes256CbcEnc::new_from_slices(&syskey, &iv).unwrap();
        let len = padded.len();
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut padded, len)
            .unwrap();

        let decrypted = decrypt_aes_hash(&RID_500, &syskey, &padded, &iv).unwrap();
        assert_eq!(hash, decrypted);
    }

    #[test]
    fn test_rc4_hash_rejects_wrong_length() {
        match decrypt_rc4_hash(&RID_500, &rc4_syskey(), &[0u8; 20], HashKind::Nt) {
            Err(Error::HashDataLength { len: 20 }) => {}
            other => panic!("expected HashDataLength, got {:?}", other),
        }
    }

    #[test]
    fn test_rc4_apply_roundtrip() {
        let key = b"0123456789abcdef";
        let plaintext = b"sixteen byte msg";
        let encrypted = rc4_apply(key, plaintext);
        assert_ne!(&plaintext[..], &encrypted[..]);
        assert_eq!(&plaintext[..], &rc4_apply(key, &encrypted)[..]);
    }

    #[test]
    fn test_lm_and_nt_constants_produce_distinct_keys() {
        let encrypted = [0x11u8; 16];
        let lm = decrypt_rc4_hash(&RID_500, &rc4_syskey(), &encrypted, HashKind::Lm).unwrap();
        let nt = decrypt_rc4_hash(&RID_500, &rc4_syskey(), &encrypted, HashKind::Nt).unwrap();
        assert_ne!(lm, nt);
    }
}
