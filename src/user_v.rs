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
use crate::log::Logs;
use crate::util;
use enum_primitive_derive::Primitive;
use nom::{bytes::complete::take, multi::count, number::complete::le_u32, IResult};
use num_traits::FromPrimitive;
use serde::Serialize;

/// All field offsets in the V structure are relative to this base.
pub(crate) const V_DATA_BASE_OFFSET: usize = 0xCC;

/// The descriptor table runs from 0x0C to the data base.
const FIELD_COUNT: usize = 16;

const FIELD_USERNAME: usize = 0;
const FIELD_FULL_NAME: usize = 1;
const FIELD_COMMENT: usize = 2;
const FIELD_HOME_DIR: usize = 5;
const FIELD_PROFILE_PATH: usize = 8;
const FIELD_LM_HASH: usize = 12;
const FIELD_NT_HASH: usize = 13;

/// One `(offset, length)` pair from the V structure's descriptor table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FieldRef {
    pub offset: u32,
    pub length: u32,
}

/// Per-hash-blob format discriminant, stored in the blob's own header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive, Serialize)]
#[repr(u16)]
pub enum HashRevision {
    Rc4 = 1,
    Aes = 2,
}

/// An encrypted LM or NT hash blob, as read out of the V structure.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub enum EncryptedHash {
    Rc4 {
        pek_id: u16,
        data: Vec<u8>,
    },
    Aes {
        pek_id: u16,
        iv: [u8; 16],
        data: Vec<u8>,
    },
}

impl EncryptedHash {
    /// Parses one stored hash blob. Returns `None` when the blob carries a
    /// header but no hash material (common for absent LM hashes).
    fn from_bytes(input: &[u8]) -> Result<Option<Self>, Error> {
        if input.len() < 4 {
            return Err(Error::HashDataLength { len: input.len() });
        }
        let pek_id = u16::from_le_bytes([input[0], input[1]]);
        let revision_bytes = u16::from_le_bytes([input[2], input[3]]);
        let revision = HashRevision::from_u16(revision_bytes).ok_or(Error::UnknownHashRevision {
            revision: revision_bytes,
        })?;
        match revision {
            HashRevision::Rc4 => {
                let data = &input[4..];
                if data.is_empty() {
                    return Ok(None);
                }
                Ok(Some(EncryptedHash::Rc4 {
                    pek_id,
                    data: data.to_vec(),
                }))
            }
            HashRevision::Aes => {
                if input.len() < 24 {
                    return Err(Error::HashDataLength { len: input.len() });
                }
                let mut iv = [0u8; 16];
                iv.copy_from_slice(&input[8..24]);
                Ok(Some(EncryptedHash::Aes {
                    pek_id,
                    iv,
                    data: input[24..].to_vec(),
                }))
            }
        }
    }
}

/// A user's `V` value: a descriptor table over a variable-length data area
/// holding the account strings and the encrypted hashes.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct UserV {
    buffer: Vec<u8>,
    fields: Vec<FieldRef>,
}

impl UserV {
    pub fn from_bytes(input: &[u8]) -> Result<Self, Error> {
        if input.len() < V_DATA_BASE_OFFSET {
            return Err(Error::AccountVTooShort { len: input.len() });
        }
        let (_, fields) = Self::parse_fields(input)?;
        Ok(UserV {
            buffer: input.to_vec(),
            fields,
        })
    }

    fn parse_fields(input: &[u8]) -> IResult<&[u8], Vec<FieldRef>> {
        let (input, _header) = take(12usize)(input)?;
        count(
            |i| {
                let (i, offset) = le_u32(i)?;
                let (i, length) = le_u32(i)?;
                let (i, _unused) = le_u32(i)?;
                Ok((i, FieldRef { offset, length }))
            },
            FIELD_COUNT,
        )(input)
    }

    /// Reads one field's bytes from the data area. Any read past the end of
    /// the buffer fails; truncated data is never returned.
    fn read(&self, field: FieldRef) -> Result<&[u8], Error> {
        let start = V_DATA_BASE_OFFSET + field.offset as usize;
        let end = start + field.length as usize;
        if end > self.buffer.len() {
            return Err(Error::OutOfBounds {
                offset: start,
                size: field.length as usize,
                len: self.buffer.len(),
            });
        }
        Ok(&self.buffer[start..end])
    }

    fn string_field(&self, index: usize) -> Result<String, Error> {
        let mut bytes = self.read(self.fields[index])?;
        // ignore a leading BOM
        if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
            bytes = &bytes[2..];
        }
        let mut logs = Logs::default();
        Ok(util::from_utf16_le_string(
            bytes,
            &mut logs,
            "UserV::string_field",
        ))
    }

    pub fn username(&self) -> Result<String, Error> {
        self.string_field(FIELD_USERNAME)
    }

    pub fn full_name(&self) -> Result<String, Error> {
        self.string_field(FIELD_FULL_NAME)
    }

    pub fn comment(&self) -> Result<String, Error> {
        self.string_field(FIELD_COMMENT)
    }

    pub fn home_dir(&self) -> Result<String, Error> {
        self.string_field(FIELD_HOME_DIR)
    }

    pub fn profile_path(&self) -> Result<String, Error> {
        self.string_field(FIELD_PROFILE_PATH)
    }

    /// Reads the stored LM and NT hash blobs. A zero NT length is the
    /// sentinel for "no credential material at all" (machine and trust
    /// accounts) and reports `NoHashInfo`.
    pub fn encrypted_hashes(
        &self,
    ) -> Result<(Option<EncryptedHash>, Option<EncryptedHash>), Error> {
        if self.fields[FIELD_NT_HASH].length == 0 {
            return Err(Error::NoHashInfo);
        }
        let lm = self.hash_field(FIELD_LM_HASH)?;
        let nt = self.hash_field(FIELD_NT_HASH)?;
        Ok((lm, nt))
    }

    fn hash_field(&self, index: usize) -> Result<Option<EncryptedHash>, Error> {
        let field = self.fields[index];
        if field.length == 0 {
            return Ok(None);
        }
        EncryptedHash::from_bytes(self.read(field)?)
    }
}
