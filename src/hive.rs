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

use crate::base_block::FileBaseBlock;
use crate::cell_key_node::CellKeyNode;
use crate::cell_key_value::{CellBigData, CellKeyValue, BIG_DATA_SIZE_THRESHOLD};
use crate::err::Error;
use crate::log::Logs;
use crate::registry::Registry;
use crate::sub_key_list::SubKeyList;
use crate::util;
use nom::number::complete::le_u32;
use std::path::Path;

/// Offset of the first hive bin; all cell offsets in the file are relative to
/// this point.
pub(crate) const HBIN_START_OFFSET_ABSOLUTE: usize = 4096;

const HBIN_SIGNATURE: &[u8] = b"hbin";

/// Nested `ri` lists deeper than this indicate a corrupt hive.
const MAX_SUB_KEY_LIST_DEPTH: usize = 16;

/// An offline registry hive, read entirely into memory. Keys are resolved on
/// demand by walking cells from the root key node; every cell access is
/// bounds-checked against the buffer.
#[derive(Debug)]
pub struct Hive {
    buffer: Vec<u8>,
    pub base_block: FileBaseBlock,
}

impl Hive {
    pub fn from_path<T: AsRef<Path>>(filename: T) -> Result<Self, Error> {
        Self::from_bytes(std::fs::read(filename)?)
    }

    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, Error> {
        let hbin_end = HBIN_START_OFFSET_ABSOLUTE + HBIN_SIGNATURE.len();
        if !buffer.starts_with(b"regf")
            || buffer.len() < hbin_end
            || &buffer[HBIN_START_OFFSET_ABSOLUTE..hbin_end] != HBIN_SIGNATURE
        {
            return Err(Error::NotARegistryFile);
        }
        let base_block = {
            let (_, base_block) = FileBaseBlock::from_bytes(&buffer)?;
            base_block
        };
        Ok(Hive { buffer, base_block })
    }

    pub fn root_node(&self) -> Result<CellKeyNode, Error> {
        self.key_node_at(self.base_block.root_cell_offset_relative)
    }

    /// Resolves a backslash-separated key path from the hive root.
    pub fn find_key(&self, path: &str) -> Result<CellKeyNode, Error> {
        let mut node = self.root_node()?;
        if path.is_empty() {
            return Ok(node);
        }
        for segment in path.split('\\') {
            node = self
                .find_sub_key(&node, segment)?
                .ok_or_else(|| Error::KeyNotFound {
                    path: path.to_string(),
                })?;
        }
        Ok(node)
    }

    /// Returns the bytes of one cell, sliced to the size recorded in the
    /// cell's own header.
    fn cell_slice(&self, offset_relative: u32) -> Result<&[u8], Error> {
        let start = HBIN_START_OFFSET_ABSOLUTE + offset_relative as usize;
        let header_end = start.checked_add(4).unwrap_or(usize::MAX);
        if header_end > self.buffer.len() {
            return Err(Error::OutOfBounds {
                offset: start,
                size: 4,
                len: self.buffer.len(),
            });
        }
        let size_field = i32::from_le_bytes([
            self.buffer[start],
            self.buffer[start + 1],
            self.buffer[start + 2],
            self.buffer[start + 3],
        ]);
        let cell_size = size_field.unsigned_abs() as usize;
        if cell_size < 4 || start + cell_size > self.buffer.len() {
            return Err(Error::OutOfBounds {
                offset: start,
                size: cell_size,
                len: self.buffer.len(),
            });
        }
        Ok(&self.buffer[start..start + cell_size])
    }

    fn key_node_at(&self, offset_relative: u32) -> Result<CellKeyNode, Error> {
        let (_, node) = CellKeyNode::from_bytes(self.cell_slice(offset_relative)?)?;
        Ok(node)
    }

    /// Collects the key node offsets below a subkey list, following nested
    /// `ri` index roots.
    fn sub_key_offsets(
        &self,
        list_offset_relative: u32,
        depth: usize,
        offsets: &mut Vec<u32>,
    ) -> Result<(), Error> {
        if depth > MAX_SUB_KEY_LIST_DEPTH {
            return Err(Error::Nom {
                detail: format!("sub key lists nested deeper than {}", MAX_SUB_KEY_LIST_DEPTH),
            });
        }
        let (_, list) = SubKeyList::from_bytes(self.cell_slice(list_offset_relative)?)?;
        if list.is_index_root() {
            for nested_offset in &list.entries {
                self.sub_key_offsets(*nested_offset, depth + 1, offsets)?;
            }
        } else {
            offsets.extend(&list.entries);
        }
        Ok(())
    }

    pub(crate) fn sub_key_nodes(&self, node: &CellKeyNode) -> Result<Vec<CellKeyNode>, Error> {
        if node.number_of_sub_keys == 0 {
            return Ok(Vec::new());
        }
        let mut offsets = Vec::with_capacity(node.number_of_sub_keys as usize);
        self.sub_key_offsets(node.sub_keys_list_offset_relative, 0, &mut offsets)?;
        offsets
            .iter()
            .map(|offset| self.key_node_at(*offset))
            .collect()
    }

    fn find_sub_key(&self, node: &CellKeyNode, name: &str) -> Result<Option<CellKeyNode>, Error> {
        // SAM and SYSTEM keys hold at most a few hundred subkeys; a linear
        // walk is fine and sidesteps trusting the lf/lh name hints.
        for sub_key in self.sub_key_nodes(node)? {
            if sub_key.key_name.eq_ignore_ascii_case(name) {
                return Ok(Some(sub_key));
            }
        }
        Ok(None)
    }

    pub(crate) fn value_of(
        &self,
        node: &CellKeyNode,
        name: &str,
    ) -> Result<Option<CellKeyValue>, Error> {
        if node.number_of_key_values == 0 {
            return Ok(None);
        }
        let list_cell = self.cell_slice(node.key_values_list_offset_relative)?;
        let mut input = &list_cell[4..];
        for _ in 0..node.number_of_key_values {
            let (remaining, value_offset) = le_u32(input)?;
            input = remaining;
            let (_, value) = CellKeyValue::from_bytes(self.cell_slice(value_offset)?)?;
            if value.value_name.eq_ignore_ascii_case(name) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub(crate) fn value_data(&self, value: &CellKeyValue) -> Result<Vec<u8>, Error> {
        let data_len = value.data_len();
        if data_len == 0 {
            return Ok(Vec::new());
        }
        if value.is_resident() {
            if data_len > 4 {
                return Err(Error::OutOfBounds {
                    offset: 0,
                    size: data_len,
                    len: 4,
                });
            }
            return Ok(value.data_offset_relative.to_le_bytes()[..data_len].to_vec());
        }
        let cell = self.cell_slice(value.data_offset_relative)?;
        if data_len as u32 > BIG_DATA_SIZE_THRESHOLD && CellBigData::is_big_data_cell(cell) {
            return self.big_data(cell, data_len);
        }
        if 4 + data_len > cell.len() {
            return Err(Error::OutOfBounds {
                offset: value.data_offset_relative as usize,
                size: data_len,
                len: cell.len(),
            });
        }
        Ok(cell[4..4 + data_len].to_vec())
    }

    fn big_data(&self, cell: &[u8], data_len: usize) -> Result<Vec<u8>, Error> {
        let (_, big_data) = CellBigData::from_bytes(cell)?;
        let list_cell = self.cell_slice(big_data.segment_list_offset_relative)?;
        let mut input = &list_cell[4..];
        let mut data = Vec::with_capacity(data_len);
        for _ in 0..big_data.count {
            let (remaining, segment_offset) = le_u32(input)?;
            input = remaining;
            let segment_cell = self.cell_slice(segment_offset)?;
            let available = segment_cell.len() - 4;
            let needed = std::cmp::min(available, data_len - data.len());
            data.extend_from_slice(&segment_cell[4..4 + needed]);
            if data.len() == data_len {
                break;
            }
        }
        if data.len() != data_len {
            return Err(Error::OutOfBounds {
                offset: big_data.segment_list_offset_relative as usize,
                size: data_len,
                len: data.len(),
            });
        }
        Ok(data)
    }

    pub(crate) fn class_name_of(&self, node: &CellKeyNode) -> Result<Option<String>, Error> {
        if !node.has_class_name() {
            return Ok(None);
        }
        let cell = self.cell_slice(node.class_name_offset_relative as u32)?;
        let class_name_size = node.class_name_size as usize;
        if 4 + class_name_size > cell.len() {
            return Err(Error::OutOfBounds {
                offset: node.class_name_offset_relative as usize,
                size: class_name_size,
                len: cell.len(),
            });
        }
        let mut logs = Logs::default();
        Ok(Some(util::from_utf16_le_string(
            &cell[4..4 + class_name_size],
            &mut logs,
            "Hive::class_name_of",
        )))
    }
}

impl Registry for Hive {
    fn subkey_names(&self, path: &str) -> Result<Vec<String>, Error> {
        let node = self.find_key(path)?;
        Ok(self
            .sub_key_nodes(&node)?
            .into_iter()
            .map(|sub_key| sub_key.key_name)
            .collect())
    }

    fn class_name(&self, path: &str) -> Result<Option<String>, Error> {
        let node = self.find_key(path)?;
        self.class_name_of(&node)
    }

    fn value_bytes(&self, path: &str, name: &str) -> Result<Option<Vec<u8>>, Error> {
        let node = self.find_key(path)?;
        match self.value_of(&node, name)? {
            Some(value) => Ok(Some(self.value_data(&value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{utf16_bytes, HiveBuilder};

    fn sample_hive() -> Hive {
        let mut builder = HiveBuilder::new();
        let class_data = builder.add_data(&utf16_bytes("253593dd"));
        let inner = builder.add_key("Accessibility", &[], &[]);
        let flags_value = builder.add_value("Flags", &[0x01, 0x02, 0x03, 0x04, 0x05]);
        let current_value = builder.add_value("Current", &[0x01]);
        let jd = builder.add_key_with_class("JD", (class_data, 16), &[], &[]);
        let panel = builder.add_key("Control Panel", &[inner, jd], &[flags_value, current_value]);
        let root = builder.add_key("ROOT", &[panel], &[]);
        Hive::from_bytes(builder.finish(root)).unwrap()
    }

    #[test]
    fn test_not_a_registry_file() {
        match Hive::from_bytes(vec![0u8; 8192]) {
            Err(Error::NotARegistryFile) => {}
            other => panic!("expected NotARegistryFile, got {:?}", other),
        }
    }

    #[test]
    fn test_find_key_and_subkeys() {
        let hive = sample_hive();
        let node = hive.find_key("Control Panel").unwrap();
        assert_eq!("Control Panel", node.key_name);
        assert_eq!(
            vec!["Accessibility".to_string(), "JD".to_string()],
            hive.subkey_names("Control Panel").unwrap()
        );
        // case-insensitive resolution
        assert!(hive.find_key("control panel\\accessibility").is_ok());
        match hive.find_key("Control Panel\\Missing") {
            Err(Error::KeyNotFound { .. }) => {}
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_value_bytes() {
        let hive = sample_hive();
        assert_eq!(
            Some(vec![0x01, 0x02, 0x03, 0x04, 0x05]),
            hive.value_bytes("Control Panel", "Flags").unwrap()
        );
        // resident value
        assert_eq!(
            Some(vec![0x01]),
            hive.value_bytes("Control Panel", "Current").unwrap()
        );
        assert_eq!(None, hive.value_bytes("Control Panel", "Missing").unwrap());
    }

    #[test]
    fn test_class_name() {
        let hive = sample_hive();
        assert_eq!(
            Some("253593dd".to_string()),
            hive.class_name("Control Panel\\JD").unwrap()
        );
        assert_eq!(None, hive.class_name("Control Panel").unwrap());
    }

    #[test]
    fn test_cell_slice_out_of_bounds() {
        let hive = sample_hive();
        match hive.cell_slice(0x00FF_FFFF) {
            Err(Error::OutOfBounds { .. }) => {}
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
    }
}
