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

//! Walks every account in a SAM hive and recovers the stored password
//! hashes.
//!
//! Boot key and syskey failures abort the scan: nothing downstream can be
//! decrypted without them. Everything after that is scoped to a single user,
//! so the iterator yields one `Result` per account and leaves the
//! skip-or-abort decision to the caller. `scan` is the collect-and-continue
//! form.

use crate::err::{Error, UserError};
use crate::log::{LogCode, Logs};
use crate::registry::Registry;
use crate::sam_registry::SamRegistry;
use crate::system_registry::SystemRegistry;
use serde::Serialize;
use std::path::Path;

/// One enabled account's recovered credentials. The hex strings are
/// uppercase without separators, directly usable as the lookup key of a
/// `hash;cleartext` dictionary line; an empty string means that hash kind is
/// not stored for the account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct UserHashes {
    pub rid: String,
    pub username: String,
    pub lm_hash: String,
    pub nt_hash: String,
}

/// The outcome of a full scan: recovered credentials plus a log line for
/// every account that had to be skipped.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub users: Vec<UserHashes>,
    pub logs: Logs,
}

/// Iterates the accounts of a SAM hive, yielding recovered hashes per RID.
///
/// Disabled accounts and accounts without credential material are silently
/// skipped; anything else that fails for one account surfaces as a
/// `UserError` without stopping the iteration. Dropping the iterator between
/// users is the cancellation point.
pub struct UserHashesIter<'a, R: Registry> {
    sam: &'a SamRegistry<R>,
    syskey: &'a [u8],
    rids: std::vec::IntoIter<String>,
}

impl<'a, R: Registry> UserHashesIter<'a, R> {
    pub fn new(sam: &'a SamRegistry<R>, syskey: &'a [u8]) -> Result<Self, Error> {
        Ok(UserHashesIter {
            sam,
            syskey,
            rids: sam.user_rids()?.into_iter(),
        })
    }

    fn user_hashes(&self, rid: &str) -> Result<Option<UserHashes>, Error> {
        let user = self.sam.user(rid)?;
        if !user.enabled()? {
            return Ok(None);
        }
        let username = user.username()?;
        let (lm_hash, nt_hash) = match user.hashes(self.syskey) {
            Ok(hashes) => hashes,
            Err(Error::NoHashInfo) => return Ok(None),
            Err(error) => return Err(error),
        };
        Ok(Some(UserHashes {
            rid: rid.to_string(),
            username,
            lm_hash: lm_hash.map(|hash| hex::encode_upper(&hash)).unwrap_or_default(),
            nt_hash: nt_hash.map(|hash| hex::encode_upper(&hash)).unwrap_or_default(),
        }))
    }
}

impl<'a, R: Registry> Iterator for UserHashesIter<'a, R> {
    type Item = Result<UserHashes, UserError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rid = self.rids.next()?;
            match self.user_hashes(&rid) {
                Ok(Some(user)) => return Some(Ok(user)),
                Ok(None) => continue,
                Err(source) => return Some(Err(UserError { rid, source })),
            }
        }
    }
}

/// Recovers the hashes of every enabled account, skipping (and logging)
/// accounts whose structures fail to parse or decrypt.
pub fn scan<S: Registry, R: Registry>(
    system: &SystemRegistry<S>,
    sam: &SamRegistry<R>,
) -> Result<ScanReport, Error> {
    let boot_key = system.boot_key()?;
    let syskey = sam.derive_syskey(&boot_key)?;

    let mut report = ScanReport::default();
    for result in UserHashesIter::new(sam, &syskey)? {
        match result {
            Ok(user) => report.users.push(user),
            Err(error) => report.logs.add(LogCode::WarningUser, &error),
        }
    }
    Ok(report)
}

/// Convenience entry point over exported hive files.
pub fn scan_paths<T: AsRef<Path>>(sam_path: T, system_path: T) -> Result<ScanReport, Error> {
    let system = SystemRegistry::from_path(system_path)?;
    let sam = SamRegistry::from_path(sam_path)?;
    scan(&system, &sam)
}
