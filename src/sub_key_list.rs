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

use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    combinator::map,
    multi::count,
    number::complete::{le_i32, le_u16, le_u32},
    sequence::terminated,
    IResult,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum SubKeyListType {
    Lf, // fast leaf; entries carry a 4 byte name hint
    Lh, // hash leaf; entries carry a 4 byte name hash
    Li, // index leaf; bare offsets
    Ri, // index root; entries point at further lists
}

/// Any of the four subkey list cell variants, reduced to the entry offsets.
/// For an `ri` list the entries are offsets of nested lists, not key nodes.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct SubKeyList {
    pub size: u32,
    pub list_type: SubKeyListType,
    pub count: u16,
    pub entries: Vec<u32>, // offsets are relative from the start of the hive bins data
}

impl SubKeyList {
    /// Uses nom to parse an lf/lh/li/ri sub key list cell.
    pub(crate) fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, size) = le_i32(input)?;
        let (input, list_type) = alt((
            map(tag("lf"), |_| SubKeyListType::Lf),
            map(tag("lh"), |_| SubKeyListType::Lh),
            map(tag("li"), |_| SubKeyListType::Li),
            map(tag("ri"), |_| SubKeyListType::Ri),
        ))(input)?;
        let (input, item_count) = le_u16(input)?;
        let (input, entries) = match list_type {
            SubKeyListType::Lf | SubKeyListType::Lh => {
                // offset followed by the hint/hash, which we don't need
                count(terminated(le_u32, take(4usize)), item_count as usize)(input)?
            }
            SubKeyListType::Li | SubKeyListType::Ri => count(le_u32, item_count as usize)(input)?,
        };

        Ok((
            input,
            SubKeyList {
                size: size.unsigned_abs(),
                list_type,
                count: item_count,
                entries,
            },
        ))
    }

    pub(crate) fn is_index_root(&self) -> bool {
        self.list_type == SubKeyListType::Ri
    }
}
