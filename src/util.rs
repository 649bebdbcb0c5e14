use crate::log::{LogCode, Logs};
use chrono::{DateTime, TimeZone, Utc};
use std::char::REPLACEMENT_CHARACTER;
use std::mem;

const SIZE_OF_UTF16_CHAR: usize = mem::size_of::<u16>();

/// Reads a UTF-16LE string, stopping at a null terminator if one is present.
pub(crate) fn from_utf16_le_string(slice: &[u8], logs: &mut Logs, err_detail: &str) -> String {
    let iter = (0..slice.len() / SIZE_OF_UTF16_CHAR)
        .map(|i| u16::from_le_bytes([slice[2 * i], slice[2 * i + 1]]));
    std::char::decode_utf16(iter)
        .map(|r| {
            r.unwrap_or_else(|err| {
                logs.add(LogCode::WarningConversion, &format!("{}: {}", err_detail, err));
                REPLACEMENT_CHARACTER
            })
        })
        .take_while(|c| c != &'\0')
        .collect()
}

/// Converts a slice of ascii bytes into a String; invalid chars are encoded as
/// utf16, converted to utf8, and added to the string.
pub(crate) fn from_ascii(slice: &[u8], logs: &mut Logs, err_detail: &str) -> String {
    let mut result = String::new();
    for b in slice {
        let c = *b as char;
        if c.is_ascii() {
            result.push(c);
        } else {
            let u = std::char::decode_utf16(vec![u16::from_le_bytes([*b, 0])].iter().cloned())
                .map(|r| {
                    r.unwrap_or_else(|err| {
                        // shouldn't happen here since we're constructing a valid UTF-16 char
                        logs.add(LogCode::WarningConversion, &format!("{}: {}", err_detail, err));
                        REPLACEMENT_CHARACTER
                    })
                })
                .collect::<String>();
            result += &u;
        }
    }
    result
}

pub(crate) fn string_from_bytes(
    is_ascii: bool,
    slice: &[u8],
    logs: &mut Logs,
    err_detail: &str,
) -> String {
    if is_ascii {
        from_ascii(slice, logs, err_detail)
    } else {
        from_utf16_le_string(slice, logs, err_detail)
    }
}

/// Converts a u64 filetime to a DateTime<Utc>. Out-of-range values collapse to
/// the unix epoch.
pub fn get_date_time_from_filetime(filetime: u64) -> DateTime<Utc> {
    const UNIX_EPOCH_SECONDS_SINCE_WINDOWS_EPOCH: i64 = 11_644_473_600;
    const HUNDREDS_OF_NANOS_PER_SECOND: u64 = 10_000_000;

    let seconds =
        (filetime / HUNDREDS_OF_NANOS_PER_SECOND) as i64 - UNIX_EPOCH_SECONDS_SINCE_WINDOWS_EPOCH;
    let nanos = ((filetime % HUNDREDS_OF_NANOS_PER_SECOND) * 100) as u32;
    Utc.timestamp_opt(seconds, nanos)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}
