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
use crate::hive::Hive;
use crate::registry::Registry;
use std::path::Path;

/// The scrambled boot key ("syskey"), recovered from the SYSTEM hive.
pub type BootKey = [u8; 16];

pub(crate) const BOOT_KEY_LEN: usize = 16;

/// The fixed permutation applied to the raw class-name bytes to produce the
/// boot key.
const BOOT_KEY_PERMUTATION: [usize; 16] = [
    0x8, 0x5, 0x4, 0x2, 0xb, 0x9, 0xd, 0x3, 0x0, 0x6, 0x1, 0xc, 0xe, 0xa, 0xf, 0x7,
];

/// Lsa subkey names whose class names carry the boot key material, in the
/// order the nibble groups are concatenated.
const LSA_KEY_NAMES: [&str; 4] = ["JD", "Skew1", "GBG", "Data"];

/// A SYSTEM hive, viewed through the operations needed to recover the boot
/// key.
pub struct SystemRegistry<R: Registry> {
    registry: R,
}

impl SystemRegistry<Hive> {
    pub fn from_path<T: AsRef<Path>>(filename: T) -> Result<Self, Error> {
        Ok(Self::new(Hive::from_path(filename)?))
    }

    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, Error> {
        Ok(Self::new(Hive::from_bytes(buffer)?))
    }
}

impl<R: Registry> SystemRegistry<R> {
    pub fn new(registry: R) -> Self {
        SystemRegistry { registry }
    }

    /// Recovers the boot key from the class names of the JD, Skew1, GBG and
    /// Data subkeys of the current control set's Lsa key. Each class name is
    /// a hex string; the concatenated, decoded bytes are descrambled with a
    /// fixed permutation.
    pub fn boot_key(&self) -> Result<BootKey, Error> {
        let control_set = self.current_control_set()?;
        let lsa_path = format!("ControlSet{:03}\\Control\\Lsa", control_set);

        let mut class_names = String::new();
        for name in &LSA_KEY_NAMES {
            let path = format!("{}\\{}", lsa_path, name);
            let class_name =
                self.registry
                    .class_name(&path)?
                    .ok_or_else(|| Error::MalformedBootKey {
                        detail: format!("no class name on {}", path),
                    })?;
            class_names.push_str(&class_name);
        }

        let scrambled = hex::decode(&class_names).map_err(|error| Error::MalformedBootKey {
            detail: error.to_string(),
        })?;
        if scrambled.len() != BOOT_KEY_LEN {
            return Err(Error::MalformedBootKey {
                detail: format!(
                    "expected {} bytes of key material, got {}",
                    BOOT_KEY_LEN,
                    scrambled.len()
                ),
            });
        }

        let mut boot_key = [0u8; BOOT_KEY_LEN];
        for (i, scrambled_index) in BOOT_KEY_PERMUTATION.iter().enumerate() {
            boot_key[i] = scrambled[*scrambled_index];
        }
        Ok(boot_key)
    }

    /// Reads the active control set number from `Select\Current`.
    fn current_control_set(&self) -> Result<u32, Error> {
        let data = self
            .registry
            .value_bytes("Select", "Current")?
            .ok_or(Error::NoCurrentControlSet)?;
        if data.is_empty() {
            return Err(Error::NoCurrentControlSet);
        }
        let mut control_set: u32 = 0;
        for (i, byte) in data.iter().take(4).enumerate() {
            control_set |= (*byte as u32) << (8 * i);
        }
        Ok(control_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_registry::{MockKey, MockRegistry};

    fn lsa_registry(control_set: &str) -> MockRegistry {
        MockRegistry::new()
            .with_key("Select", MockKey::new().with_value("Current", &[0x01]))
            .with_key(
                format!("{}\\Control\\Lsa\\JD", control_set),
                MockKey::new().with_class_name("253593dd"),
            )
            .with_key(
                format!("{}\\Control\\Lsa\\Skew1", control_set),
                MockKey::new().with_class_name("ae934700"),
            )
            .with_key(
                format!("{}\\Control\\Lsa\\GBG", control_set),
                MockKey::new().with_class_name("88139d45"),
            )
            .with_key(
                format!("{}\\Control\\Lsa\\Data", control_set),
                MockKey::new().with_class_name("16bd3e33"),
            )
    }

    #[test]
    fn test_boot_key() {
        let system = SystemRegistry::new(lsa_registry("ControlSet001"));
        let boot_key = system.boot_key().unwrap();
        assert_eq!(
            b"\x88\x93\xae\x93\x45\x13\xbd\xdd\x25\x47\x35\x16\x3e\x9d\x33\x00",
            &boot_key
        );
    }

    #[test]
    fn test_boot_key_with_different_control_set() {
        let mut registry = lsa_registry("ControlSet002");
        registry.set_value("Select", "Current", &[0x02]);
        let system = SystemRegistry::new(registry);
        let boot_key = system.boot_key().unwrap();
        assert_eq!(
            b"\x88\x93\xae\x93\x45\x13\xbd\xdd\x25\x47\x35\x16\x3e\x9d\x33\x00",
            &boot_key
        );
    }

    #[test]
    fn test_boot_key_parts_missing() {
        let registry = MockRegistry::new()
            .with_key("Select", MockKey::new().with_value("Current", &[0x01]))
            .with_key(
                "ControlSet001\\Control\\Lsa\\JD",
                MockKey::new().with_class_name("253593dd"),
            );
        let system = SystemRegistry::new(registry);
        match system.boot_key() {
            Err(Error::KeyNotFound { .. }) => {}
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_boot_key_not_hexadecimal() {
        let mut registry = lsa_registry("ControlSet001");
        registry.set_class_name("ControlSet001\\Control\\Lsa\\JD", "2\u{ff}3593dd");
        let system = SystemRegistry::new(registry);
        match system.boot_key() {
            Err(Error::MalformedBootKey { .. }) => {}
            other => panic!("expected MalformedBootKey, got {:?}", other),
        }
    }

    #[test]
    fn test_boot_key_wrong_material_length() {
        let mut registry = lsa_registry("ControlSet001");
        registry.set_class_name("ControlSet001\\Control\\Lsa\\Data", "16bd3e");
        let system = SystemRegistry::new(registry);
        match system.boot_key() {
            Err(Error::MalformedBootKey { .. }) => {}
            other => panic!("expected MalformedBootKey, got {:?}", other),
        }
    }

    #[test]
    fn test_select_key_not_found() {
        let system = SystemRegistry::new(MockRegistry::new());
        match system.boot_key() {
            Err(Error::KeyNotFound { .. }) => {}
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_current_control_set_not_found() {
        let registry = MockRegistry::new().with_key("Select", MockKey::new());
        let system = SystemRegistry::new(registry);
        match system.boot_key() {
            Err(Error::NoCurrentControlSet) => {}
            other => panic!("expected NoCurrentControlSet, got {:?}", other),
        }
    }
}
