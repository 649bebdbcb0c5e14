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

use crate::domain_f::{DomainF, SYSKEY_LEN};
use crate::err::Error;
use crate::hash_decrypt::{decrypt_aes_hash, decrypt_rc4_hash, HashKind};
use crate::hive::Hive;
use crate::registry::Registry;
use crate::system_registry::BootKey;
use crate::user_f::UserF;
use crate::user_v::{EncryptedHash, UserV};
use std::path::Path;

const DOMAIN_ACCOUNT_PATH: &str = "SAM\\Domains\\Account";
const USERS_PATH: &str = "SAM\\Domains\\Account\\Users";

/// The `Users` subkey that maps names to RIDs rather than holding a user.
const NAMES_SUBKEY: &str = "Names";

/// A SAM hive, viewed through the operations needed to enumerate local
/// accounts and decrypt their stored hashes.
pub struct SamRegistry<R: Registry> {
    registry: R,
}

impl SamRegistry<Hive> {
    pub fn from_path<T: AsRef<Path>>(filename: T) -> Result<Self, Error> {
        Ok(Self::new(Hive::from_path(filename)?))
    }

    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, Error> {
        Ok(Self::new(Hive::from_bytes(buffer)?))
    }
}

impl<R: Registry> SamRegistry<R> {
    pub fn new(registry: R) -> Self {
        SamRegistry { registry }
    }

    /// Lists the RIDs of all local accounts, as the hex-named subkeys of the
    /// Users key, in hive order.
    pub fn user_rids(&self) -> Result<Vec<String>, Error> {
        let subkeys = self
            .registry
            .subkey_names(USERS_PATH)
            .map_err(|error| match error {
                Error::KeyNotFound { .. } => Error::FailedToParseUsers,
                other => other,
            })?;
        Ok(subkeys
            .into_iter()
            .filter(|name| !name.eq_ignore_ascii_case(NAMES_SUBKEY))
            .collect())
    }

    /// Loads one user's V and F structures.
    pub fn user(&self, rid: &str) -> Result<SamUser, Error> {
        let path = format!("{}\\{}", USERS_PATH, rid);
        let map_missing_key = |error| match error {
            Error::KeyNotFound { .. } => Error::FailedToLoadUser {
                rid: rid.to_string(),
            },
            other => other,
        };
        let v_bytes = self.registry.value_bytes(&path, "V").map_err(map_missing_key)?;
        let f_bytes = self.registry.value_bytes(&path, "F").map_err(map_missing_key)?;
        match (v_bytes, f_bytes) {
            (Some(v_bytes), Some(f_bytes)) => Ok(SamUser {
                rid: rid.to_string(),
                v: UserV::from_bytes(&v_bytes)?,
                f_bytes,
            }),
            _ => Err(Error::MissingUserStructures {
                rid: rid.to_string(),
            }),
        }
    }

    /// Derives the database syskey from the boot key and the domain account
    /// F structure.
    pub fn derive_syskey(&self, boot_key: &BootKey) -> Result<Vec<u8>, Error> {
        let f_bytes = self
            .registry
            .value_bytes(DOMAIN_ACCOUNT_PATH, "F")
            .map_err(|error| match error {
                Error::KeyNotFound { .. } => Error::FailedToOpenDomain,
                other => other,
            })?
            .ok_or(Error::FailedToParseDomainF)?;
        let domain_f = DomainF::from_bytes(&f_bytes)?;
        let syskey = domain_f.derive_syskey(boot_key)?;
        if syskey.len() != SYSKEY_LEN {
            return Err(Error::MalformedSyskey { len: syskey.len() });
        }
        Ok(syskey)
    }
}

/// One local account's raw credential structures. The F structure is kept
/// unparsed until queried, matching how sparsely some trust accounts fill it.
#[derive(Debug)]
pub struct SamUser {
    pub rid: String,
    v: UserV,
    f_bytes: Vec<u8>,
}

impl SamUser {
    pub fn enabled(&self) -> Result<bool, Error> {
        Ok(self.metadata()?.enabled())
    }

    pub fn metadata(&self) -> Result<UserF, Error> {
        UserF::from_bytes(&self.f_bytes)
    }

    pub fn username(&self) -> Result<String, Error> {
        self.v.username()
    }

    pub fn full_name(&self) -> Result<String, Error> {
        self.v.full_name()
    }

    /// Decrypts the stored LM and NT hashes with the database syskey. Either
    /// hash may be absent. `NoHashInfo` means the account stores no
    /// credential material at all.
    pub fn hashes(&self, syskey: &[u8]) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>), Error> {
        let rid_bytes = rid_to_bytes(&self.rid)?;
        let (lm, nt) = self.v.encrypted_hashes()?;
        let lm_hash = match &lm {
            Some(encrypted) => decrypt_hash(&rid_bytes, syskey, encrypted, HashKind::Lm)?,
            None => None,
        };
        let nt_hash = match &nt {
            Some(encrypted) => decrypt_hash(&rid_bytes, syskey, encrypted, HashKind::Nt)?,
            None => None,
        };
        Ok((lm_hash, nt_hash))
    }
}

fn decrypt_hash(
    rid: &[u8],
    syskey: &[u8],
    encrypted: &EncryptedHash,
    kind: HashKind,
) -> Result<Option<Vec<u8>>, Error> {
    match encrypted {
        EncryptedHash::Rc4 { data, .. } => decrypt_rc4_hash(rid, syskey, data, kind).map(Some),
        EncryptedHash::Aes { iv, data, .. } => {
            let hash = decrypt_aes_hash(rid, syskey, data, iv)?;
            if hash.is_empty() {
                Ok(None)
            } else {
                Ok(Some(hash))
            }
        }
    }
}

/// Converts a RID subkey name ("000001F4") into the 4 little-endian bytes
/// used as cryptographic material.
pub(crate) fn rid_to_bytes(rid: &str) -> Result<[u8; 4], Error> {
    let value = u32::from_str_radix(rid, 16).map_err(|_| Error::InvalidRid {
        rid: rid.to_string(),
    })?;
    Ok(value.to_le_bytes())
}
