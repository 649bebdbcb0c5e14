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

/// The narrow read contract the credential recovery pipeline needs from a
/// registry hive: list a key's subkeys, read a named value's raw bytes, and
/// read a key's class name.
///
/// Paths are backslash separated and relative to the hive root, e.g.
/// `SAM\Domains\Account\Users`. Name comparisons are case-insensitive, as in
/// the registry itself.
pub trait Registry {
    /// Returns the names of the subkeys of `path`, in hive order. Fails with
    /// `Error::KeyNotFound` if the key does not exist.
    fn subkey_names(&self, path: &str) -> Result<Vec<String>, Error>;

    /// Returns the class name of `path`, or `None` if the key has no class
    /// name. Fails with `Error::KeyNotFound` if the key does not exist.
    fn class_name(&self, path: &str) -> Result<Option<String>, Error>;

    /// Returns the raw data bytes of the value `name` under `path`, or `None`
    /// if the key exists but carries no such value. Fails with
    /// `Error::KeyNotFound` if the key does not exist.
    fn value_bytes(&self, path: &str, name: &str) -> Result<Option<Vec<u8>>, Error>;
}
