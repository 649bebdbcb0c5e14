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

use crate::log::Logs;
use crate::util;
use enum_primitive_derive::Primitive;
use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_i32, le_u16, le_u32},
    IResult,
};
use num_traits::FromPrimitive;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive, Serialize)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum CellKeyValueDataTypes {
    REG_NONE = 0x0000,
    REG_SZ = 0x0001,
    REG_EXPAND_SZ = 0x0002,
    REG_BIN = 0x0003,
    REG_DWORD = 0x0004,
    REG_DWORD_BIG_ENDIAN = 0x0005,
    REG_LINK = 0x0006,
    REG_MULTI_SZ = 0x0007,
    REG_RESOURCE_LIST = 0x0008,
    REG_FULL_RESOURCE_DESCRIPTOR = 0x0009,
    REG_RESOURCE_REQUIREMENTS_LIST = 0x000A,
    REG_QWORD = 0x000B,
    REG_UNKNOWN = 999,
}

bitflags::bitflags! {
    pub struct CellKeyValueFlags: u16 {
        const VALUE_COMP_NAME = 0x0001; // Name is an ASCII string / Otherwise the name is an Unicode (UTF-16 little-endian) string
        const IS_TOMBSTONE    = 0x0002; // Is a tombstone value (the flag is used starting from Insider Preview builds of Windows 10 "Redstone 1")
    }
}
crate::impl_serialize_for_bitflags! {CellKeyValueFlags}

/// When the most significant bit is set in the raw data size, the data is
/// stored in the data offset field itself.
pub(crate) const DATA_IS_RESIDENT_MASK: u32 = 0x8000_0000;

/// Values larger than this are stored through a `db` (big data) cell.
pub(crate) const BIG_DATA_SIZE_THRESHOLD: u32 = 16344;

/// A single `vk` cell: one named value of a registry key.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct CellKeyValue {
    pub size: u32,
    pub value_name: String,
    pub data_type: CellKeyValueDataTypes,
    pub data_size_raw: u32,
    pub data_offset_relative: u32,
    pub flags: CellKeyValueFlags,
    pub logs: Logs,
}

impl CellKeyValue {
    /// Uses nom to parse a vk cell, including its trailing value name.
    pub(crate) fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, size) = le_i32(input)?;
        let (input, _signature) = tag("vk")(input)?;
        let (input, value_name_size) = le_u16(input)?;
        let (input, data_size_raw) = le_u32(input)?;
        let (input, data_offset_relative) = le_u32(input)?;
        let (input, data_type_bytes) = le_u32(input)?;
        let (input, flags) = le_u16(input)?;
        let (input, _spare) = le_u16(input)?;
        let (input, value_name_bytes) = take(value_name_size as usize)(input)?;

        let flags = CellKeyValueFlags::from_bits_truncate(flags);
        let data_type =
            CellKeyValueDataTypes::from_u32(data_type_bytes).unwrap_or(CellKeyValueDataTypes::REG_UNKNOWN);
        let mut logs = Logs::default();
        let value_name = util::string_from_bytes(
            flags.contains(CellKeyValueFlags::VALUE_COMP_NAME),
            value_name_bytes,
            &mut logs,
            "CellKeyValue::value_name",
        );

        Ok((
            input,
            CellKeyValue {
                size: size.unsigned_abs(),
                value_name,
                data_type,
                data_size_raw,
                data_offset_relative,
                flags,
                logs,
            },
        ))
    }

    pub(crate) fn is_resident(&self) -> bool {
        self.data_size_raw & DATA_IS_RESIDENT_MASK != 0
    }

    pub(crate) fn data_len(&self) -> usize {
        (self.data_size_raw & !DATA_IS_RESIDENT_MASK) as usize
    }
}

/// A `db` cell header: points at a list of data segment cells for values too
/// large to live in a single cell.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct CellBigData {
    pub size: u32,
    pub count: u16,
    pub segment_list_offset_relative: u32,
}

impl CellBigData {
    pub(crate) fn is_big_data_cell(input: &[u8]) -> bool {
        input.len() >= 6 && &input[4..6] == b"db"
    }

    pub(crate) fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, size) = le_i32(input)?;
        let (input, _signature) = tag("db")(input)?;
        let (input, count) = le_u16(input)?;
        let (input, segment_list_offset_relative) = le_u32(input)?;

        Ok((
            input,
            CellBigData {
                size: size.unsigned_abs(),
                count,
                segment_list_offset_relative,
            },
        ))
    }
}
