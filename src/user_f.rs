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
use crate::impl_serialize_for_bitflags;
use crate::util;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::take,
    number::complete::{le_u16, le_u32, le_u64, le_u8},
    IResult,
};
use serde::Serialize;

/// The account control byte sits at offset 0x38; an F structure must reach
/// at least one byte past it.
pub(crate) const MIN_USER_F_LEN: usize = 0x39;

bitflags! {
    /// The low byte of the account control flags. Bit 0 is set when the
    /// account is disabled.
    pub struct AccountFlags: u8 {
        const ACCOUNT_DISABLED          = 0x01;
        const HOME_DIRECTORY_REQUIRED   = 0x02;
        const PASSWORD_NOT_REQUIRED     = 0x04;
        const TEMP_DUPLICATE_ACCOUNT    = 0x08;
        const NORMAL_ACCOUNT            = 0x10;
        const MNS_LOGON_ACCOUNT         = 0x20;
        const INTERDOMAIN_TRUST_ACCOUNT = 0x40;
        const WORKSTATION_TRUST_ACCOUNT = 0x80;
    }
}
impl_serialize_for_bitflags! {AccountFlags}

/// A user's `F` value: fixed-layout account metadata.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct UserF {
    pub last_logon: DateTime<Utc>,
    pub password_last_set: DateTime<Utc>,
    pub account_expires: DateTime<Utc>,
    pub last_password_failure: DateTime<Utc>,
    pub rid: u32,
    pub primary_group_id: u32,
    pub account_flags: AccountFlags,
}

impl UserF {
    pub fn from_bytes(input: &[u8]) -> Result<Self, Error> {
        if input.len() < MIN_USER_F_LEN {
            return Err(Error::AccountFTooShort { len: input.len() });
        }
        let (_, user_f) = Self::parse(input)?;
        Ok(user_f)
    }

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _major_version) = le_u16(input)?;
        let (input, _minor_version) = le_u16(input)?;
        let (input, _extended_flags) = take(4usize)(input)?;
        let (input, last_logon) = le_u64(input)?;
        let (input, _last_logoff) = le_u64(input)?;
        let (input, password_last_set) = le_u64(input)?;
        let (input, account_expires) = le_u64(input)?;
        let (input, last_password_failure) = le_u64(input)?;
        let (input, rid) = le_u32(input)?;
        let (input, primary_group_id) = le_u32(input)?;
        let (input, account_flags) = le_u8(input)?;

        Ok((
            input,
            UserF {
                last_logon: util::get_date_time_from_filetime(last_logon),
                password_last_set: util::get_date_time_from_filetime(password_last_set),
                account_expires: util::get_date_time_from_filetime(account_expires),
                last_password_failure: util::get_date_time_from_filetime(last_password_failure),
                rid,
                primary_group_id,
                account_flags: AccountFlags::from_bits_truncate(account_flags),
            },
        ))
    }

    /// Note the inverted polarity: the flag bit marks a *disabled* account.
    pub fn enabled(&self) -> bool {
        !self.account_flags.contains(AccountFlags::ACCOUNT_DISABLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f_record(account_flags: u8) -> Vec<u8> {
        let mut buffer = vec![0u8; MIN_USER_F_LEN];
        buffer[0x30] = 0xF4; // RID 500
        buffer[0x30 + 1] = 0x01;
        buffer[0x34] = 0x01; // primary group 513
        buffer[0x34 + 1] = 0x02;
        buffer[0x38] = account_flags;
        buffer
    }

    #[test]
    fn test_enabled_bit_clear() {
        let user_f = UserF::from_bytes(&f_record(0x14)).unwrap();
        assert!(user_f.enabled());
        assert_eq!(500, user_f.rid);
        assert_eq!(513, user_f.primary_group_id);
        assert!(user_f.account_flags.contains(AccountFlags::NORMAL_ACCOUNT));
    }

    #[test]
    fn test_disabled_bit_set() {
        let user_f = UserF::from_bytes(&f_record(0x15)).unwrap();
        assert!(!user_f.enabled());
        assert!(user_f
            .account_flags
            .contains(AccountFlags::ACCOUNT_DISABLED));
    }

    #[test]
    fn test_too_short() {
        for len in [0usize, 1, 0x38].iter() {
            match UserF::from_bytes(&vec![0u8; *len]) {
                Err(Error::AccountFTooShort { len: reported }) => assert_eq!(*len, reported),
                other => panic!("expected AccountFTooShort for {} bytes, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_exactly_min_length_parses() {
        assert!(UserF::from_bytes(&vec![0u8; MIN_USER_F_LEN]).is_ok());
    }

    #[test]
    fn test_timestamps_convert() {
        let mut buffer = f_record(0x10);
        // 2019-10-21 02:00:00 UTC as FILETIME
        buffer[0x18..0x20].copy_from_slice(&132160968000000000u64.to_le_bytes());
        let user_f = UserF::from_bytes(&buffer).unwrap();
        assert_eq!(1571623200, user_f.password_last_set.timestamp());
    }
}
