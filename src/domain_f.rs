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

use crate::err::Error;
use crate::hash_decrypt::{aes_cbc_decrypt, rc4_apply};
use crate::system_registry::BootKey;
use enum_primitive_derive::Primitive;
use nom::{
    bytes::complete::take,
    number::complete::le_u32,
    IResult,
};
use num_traits::FromPrimitive;
use serde::Serialize;

/// Offset of the key data region inside the domain account F structure.
const KEY_DATA_OFFSET: usize = 0x68;

/// Salt constants mixed into the RC4-era syskey derivation.
const SYSKEY_SALT_QWERTY: &[u8] = b"!@#$%^&*()qwertyUIOPAzxcvbnmQQQQQQQQQQQQ)(*@&%\0";
const SYSKEY_SALT_DIGITS: &[u8] = b"0123456789012345678901234567890123456789\0";

pub(crate) const SYSKEY_LEN: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive, Serialize)]
#[repr(u32)]
pub enum SamKeyRevision {
    Rc4 = 1,
    Aes = 2,
}

/// The encrypted syskey material stored alongside its revision in the domain
/// account F structure.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub enum SamKeyData {
    Rc4 {
        salt: [u8; 16],
        /// Encrypted key followed by its encrypted MD5 verifier.
        encrypted: [u8; 32],
    },
    Aes {
        data_len: u32,
        salt: [u8; 16],
        data: Vec<u8>,
    },
}

/// The domain account `F` value, reduced to the fields needed to derive the
/// database syskey.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct DomainF {
    pub revision: SamKeyRevision,
    pub key_data: SamKeyData,
}

impl DomainF {
    pub fn from_bytes(input: &[u8]) -> Result<Self, Error> {
        if input.len() < KEY_DATA_OFFSET + 4 {
            return Err(Error::DomainFTooShort { len: input.len() });
        }
        let revision_bytes = u32::from_le_bytes([
            input[KEY_DATA_OFFSET],
            input[KEY_DATA_OFFSET + 1],
            input[KEY_DATA_OFFSET + 2],
            input[KEY_DATA_OFFSET + 3],
        ]);
        match SamKeyRevision::from_u32(revision_bytes) {
            Some(SamKeyRevision::Rc4) => {
                if input.len() < 0xA0 {
                    return Err(Error::DomainFTooShort { len: input.len() });
                }
                let (_, domain_f) = Self::parse_rc4(input)?;
                Ok(domain_f)
            }
            Some(SamKeyRevision::Aes) => {
                if input.len() < 0x88 {
                    return Err(Error::DomainFTooShort { len: input.len() });
                }
                let (_, domain_f) = Self::parse_aes(input)?;
                Ok(domain_f)
            }
            None => Err(Error::UnknownSamKeyRevision {
                revision: revision_bytes,
            }),
        }
    }

    fn parse_rc4(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _account_fields) = take(KEY_DATA_OFFSET)(input)?;
        let (input, _revision) = le_u32(input)?;
        let (input, _length) = le_u32(input)?;
        let (input, salt) = take(16usize)(input)?;
        let (input, encrypted) = take(32usize)(input)?;
        let mut salt_bytes = [0u8; 16];
        salt_bytes.copy_from_slice(salt);
        let mut encrypted_bytes = [0u8; 32];
        encrypted_bytes.copy_from_slice(encrypted);
        Ok((
            input,
            DomainF {
                revision: SamKeyRevision::Rc4,
                key_data: SamKeyData::Rc4 {
                    salt: salt_bytes,
                    encrypted: encrypted_bytes,
                },
            },
        ))
    }

    fn parse_aes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _account_fields) = take(KEY_DATA_OFFSET)(input)?;
        let (input, _revision) = le_u32(input)?;
        let (input, _length) = le_u32(input)?;
        let (input, _checksum_len) = le_u32(input)?;
        let (input, data_len) = le_u32(input)?;
        let (input, salt) = take(16usize)(input)?;
        let (input, data) = take(data_len as usize)(input)?;
        let mut salt_bytes = [0u8; 16];
        salt_bytes.copy_from_slice(salt);
        Ok((
            input,
            DomainF {
                revision: SamKeyRevision::Aes,
                key_data: SamKeyData::Aes {
                    data_len,
                    salt: salt_bytes,
                    data: data.to_vec(),
                },
            },
        ))
    }

    /// Combines the boot key with the stored key material to produce the
    /// 16-byte syskey every per-user decryption is keyed from.
    pub fn derive_syskey(&self, boot_key: &BootKey) -> Result<Vec<u8>, Error> {
        match &self.key_data {
            SamKeyData::Rc4 { salt, encrypted } => {
                let mut context = md5::Context::new();
                context.consume(&salt[..]);
                context.consume(SYSKEY_SALT_QWERTY);
                context.consume(&boot_key[..]);
                context.consume(SYSKEY_SALT_DIGITS);
                let rc4_key = context.compute();

                let decrypted = rc4_apply(&rc4_key.0, encrypted);
                let (syskey, verifier) = decrypted.split_at(SYSKEY_LEN);

                let mut context = md5::Context::new();
                context.consume(syskey);
                context.consume(SYSKEY_SALT_DIGITS);
                context.consume(syskey);
                context.consume(SYSKEY_SALT_QWERTY);
                if context.compute().0[..] != *verifier {
                    return Err(Error::VerifierMismatch);
                }
                Ok(syskey.to_vec())
            }
            SamKeyData::Aes { salt, data, .. } => {
                let decrypted = aes_cbc_decrypt(&boot_key[..], &salt[..], data)?;
                if decrypted.len() < SYSKEY_LEN {
                    return Err(Error::MalformedSyskey {
                        len: decrypted.len(),
                    });
                }
                Ok(decrypted[..SYSKEY_LEN].to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{domain_f_fixture, BOOT_KEY, DERIVED_SYSKEY};

    #[test]
    fn test_parse_domain_f() {
        let blob = domain_f_fixture();
        let domain_f = DomainF::from_bytes(&blob).unwrap();
        assert_eq!(SamKeyRevision::Rc4, domain_f.revision);
        match &domain_f.key_data {
            SamKeyData::Rc4 { salt, .. } => {
                assert_eq!(&blob[0x70..0x80], &salt[..]);
            }
            other => panic!("expected RC4 key data, got {:?}", other),
        }
    }

    #[test]
    fn test_derive_syskey_rc4() {
        let domain_f = DomainF::from_bytes(&domain_f_fixture()).unwrap();
        let syskey = domain_f.derive_syskey(&BOOT_KEY).unwrap();
        assert_eq!(&DERIVED_SYSKEY[..], &syskey[..]);
    }

    #[test]
    fn test_derive_syskey_rc4_corrupt_verifier() {
        let mut blob = domain_f_fixture();
        blob[0x90] ^= 0xFF; // flip a bit of the encrypted verifier
        let domain_f = DomainF::from_bytes(&blob).unwrap();
        match domain_f.derive_syskey(&BOOT_KEY) {
            Err(Error::VerifierMismatch) => {}
            other => panic!("expected VerifierMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_domain_f_too_short() {
        match DomainF::from_bytes(&[]) {
            Err(Error::DomainFTooShort { len: 0 }) => {}
            other => panic!("expected DomainFTooShort, got {:?}", other),
        }
        let truncated = domain_f_fixture()[..0x80].to_vec();
        assert!(DomainF::from_bytes(&truncated).is_err());
    }

    #[test]
    fn test_derive_syskey_aes_roundtrip() {
        use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
        type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

        let salt = [0x3Bu8; 16];
        let mut data = DERIVED_SYSKEY.to_vec();
        data.extend_from_slice(&[0u8; 16]); // checksum block, ignored by derivation
        let encryptor = Aes128CbcEnc::new_from_slices(&BOOT_KEY, &salt).unwrap();
        let len = data.len();
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut data, len)
            .unwrap();

        let mut blob = vec![0u8; 0x68];
        blob.extend_from_slice(&2u32.to_le_bytes()); // revision
        blob.extend_from_slice(&(data.len() as u32 + 24).to_le_bytes()); // length
        blob.extend_from_slice(&16u32.to_le_bytes()); // checksum length
        blob.extend_from_slice(&(data.len() as u32).to_le_bytes()); // data length
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&data);

        let domain_f = DomainF::from_bytes(&blob).unwrap();
        assert_eq!(SamKeyRevision::Aes, domain_f.revision);
        let syskey = domain_f.derive_syskey(&BOOT_KEY).unwrap();
        assert_eq!(&DERIVED_SYSKEY[..], &syskey[..]);
    }
}
