use crate::log::Logs;
use crate::util;
use chrono::{DateTime, Utc};
use enum_primitive_derive::Primitive;
use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_u32, le_u64},
    IResult,
};
use num_traits::FromPrimitive;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive, Serialize)]
#[repr(u32)]
pub enum FileType {
    Normal = 0,
    TransactionLog = 1,
    Unknown = 0x0fffffff,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive, Serialize)]
#[repr(u32)]
pub enum FileFormat {
    DirectMemoryLoad = 1,
    Unknown = 0x0fffffff,
}

/// The first 4096 bytes of a primary hive file. Only the fields the offline
/// reader consumes are retained.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct FileBaseBlock {
    pub primary_sequence_number: u32,
    pub secondary_sequence_number: u32,
    pub last_modification_date_and_time: DateTime<Utc>,
    pub major_version: u32,
    pub minor_version: u32,
    pub file_type: FileType,
    pub format: FileFormat,
    pub root_cell_offset_relative: u32,
    pub hive_bins_data_size: u32,
    pub clustering_factor: u32,
    pub filename: String, // UTF-16LE string, debugging purposes only
    pub checksum: u32,    // XOR-32 checksum of the previous 508 bytes
    pub logs: Logs,
}

impl FileBaseBlock {
    /// Uses nom to parse the registry file header.
    pub(crate) fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _signature) = tag("regf")(input)?;
        let (input, primary_sequence_number) = le_u32(input)?;
        let (input, secondary_sequence_number) = le_u32(input)?;
        let (input, last_modification_date_and_time) = le_u64(input)?;
        let (input, major_version) = le_u32(input)?;
        let (input, minor_version) = le_u32(input)?;
        let (input, file_type_bytes) = le_u32(input)?;
        let (input, format_bytes) = le_u32(input)?;
        let (input, root_cell_offset_relative) = le_u32(input)?;
        let (input, hive_bins_data_size) = le_u32(input)?;
        let (input, clustering_factor) = le_u32(input)?;
        let (input, filename_bytes) = take(64usize)(input)?;
        let (input, _reserved) = take(396usize)(input)?;
        let (input, checksum) = le_u32(input)?;

        let mut logs = Logs::default();
        let filename = util::from_utf16_le_string(filename_bytes, &mut logs, "FileBaseBlock::filename");
        let file_type = FileType::from_u32(file_type_bytes).unwrap_or(FileType::Unknown);
        let format = FileFormat::from_u32(format_bytes).unwrap_or(FileFormat::Unknown);

        Ok((
            input,
            FileBaseBlock {
                primary_sequence_number,
                secondary_sequence_number,
                last_modification_date_and_time: util::get_date_time_from_filetime(
                    last_modification_date_and_time,
                ),
                major_version,
                minor_version,
                file_type,
                format,
                root_cell_offset_relative,
                hive_bins_data_size,
                clustering_factor,
                filename,
                checksum,
                logs,
            },
        ))
    }
}
