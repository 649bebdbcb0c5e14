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

use crate::impl_serialize_for_bitflags;
use crate::log::Logs;
use crate::util;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_i32, le_u16, le_u32, le_u64},
    IResult,
};
use serde::Serialize;

bitflags! {
    pub struct KeyNodeFlags: u16 {
        const KEY_VOLATILE       = 0x0001; // Is volatile (not used, a key node on a disk isn't expected to have this flag set)
        const KEY_HIVE_EXIT      = 0x0002; // Is the mount point of another hive (a key node on a disk isn't expected to have this flag set)
        const KEY_HIVE_ENTRY     = 0x0004; // Is the root key for this hive
        const KEY_NO_DELETE      = 0x0008; // This key can't be deleted
        const KEY_SYM_LINK       = 0x0010; // This key is a symlink (a target key is specified as a UTF-16LE string (REG_LINK) in a value named "SymbolicLinkValue")
        const KEY_COMP_NAME      = 0x0020; // Key name is an ASCII string, possibly an extended ASCII string (otherwise it is a UTF-16LE string)
        const KEY_PREDEF_HANDLE  = 0x0040; // Is a predefined handle (a handle is stored in the Number of key values field)
        const KEY_VIRT_MIRRORED  = 0x0080; // This key was virtualized at least once
        const KEY_VIRT_TARGET    = 0x0100; // Is virtual
        const KEY_VIRTUAL_STORE  = 0x0200; // Is a part of a virtual store path
    }
}
impl_serialize_for_bitflags! {KeyNodeFlags}

/// A single `nk` cell: one registry key. Only the fields needed to walk
/// subkeys, values, and the class name are retained.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct CellKeyNode {
    pub size: u32,
    pub flags: KeyNodeFlags,
    pub last_key_written_date_and_time: DateTime<Utc>,
    pub number_of_sub_keys: u32,
    pub sub_keys_list_offset_relative: u32,
    pub number_of_key_values: u32,
    pub key_values_list_offset_relative: u32,
    pub class_name_offset_relative: i32,
    pub class_name_size: u16,
    pub key_name: String, // ASCII (extended) string or UTF-16LE string
    pub logs: Logs,
}

impl CellKeyNode {
    /// Uses nom to parse an nk cell, including its trailing key name.
    pub(crate) fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, size) = le_i32(input)?;
        let (input, _signature) = tag("nk")(input)?;
        let (input, flags) = le_u16(input)?;
        let (input, last_key_written_date_and_time) = le_u64(input)?;
        let (input, _access_bits) = le_u32(input)?;
        let (input, _parent_key_offset) = le_i32(input)?;
        let (input, number_of_sub_keys) = le_u32(input)?;
        let (input, _number_of_volatile_sub_keys) = le_u32(input)?;
        let (input, sub_keys_list_offset_relative) = le_u32(input)?;
        let (input, _volatile_sub_keys_list_offset) = le_i32(input)?;
        let (input, number_of_key_values) = le_u32(input)?;
        let (input, key_values_list_offset_relative) = le_u32(input)?;
        let (input, _security_key_offset) = le_u32(input)?;
        let (input, class_name_offset_relative) = le_i32(input)?;
        let (input, _largest_sub_key_name_size) = le_u32(input)?;
        let (input, _largest_sub_key_class_name_size) = le_u32(input)?;
        let (input, _largest_value_name_size) = le_u32(input)?;
        let (input, _largest_value_data_size) = le_u32(input)?;
        let (input, _work_var) = le_u32(input)?;
        let (input, key_name_size) = le_u16(input)?;
        let (input, class_name_size) = le_u16(input)?;
        let (input, key_name_bytes) = take(key_name_size as usize)(input)?;

        let flags = KeyNodeFlags::from_bits_truncate(flags);
        let mut logs = Logs::default();
        let key_name = util::string_from_bytes(
            flags.contains(KeyNodeFlags::KEY_COMP_NAME),
            key_name_bytes,
            &mut logs,
            "CellKeyNode::key_name",
        );

        Ok((
            input,
            CellKeyNode {
                size: size.unsigned_abs(),
                flags,
                last_key_written_date_and_time: util::get_date_time_from_filetime(
                    last_key_written_date_and_time,
                ),
                number_of_sub_keys,
                sub_keys_list_offset_relative,
                number_of_key_values,
                key_values_list_offset_relative,
                class_name_offset_relative,
                class_name_size,
                key_name,
                logs,
            },
        ))
    }

    pub fn has_class_name(&self) -> bool {
        self.class_name_size > 0 && self.class_name_offset_relative >= 0
    }
}
