use crate::err::Error;
use crate::registry::Registry;
use std::collections::HashMap;

/// An in-memory `Registry` for unit tests.
#[derive(Debug, Default)]
pub(crate) struct MockRegistry {
    keys: HashMap<String, MockKey>,
}

#[derive(Debug, Default)]
pub(crate) struct MockKey {
    class_name: Option<String>,
    values: HashMap<String, Vec<u8>>,
    subkeys: Vec<String>,
}

impl MockKey {
    pub(crate) fn new() -> Self {
        MockKey::default()
    }

    pub(crate) fn with_class_name<T: Into<String>>(mut self, class_name: T) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub(crate) fn with_value<T: Into<String>>(mut self, name: T, data: &[u8]) -> Self {
        self.values.insert(name.into(), data.to_vec());
        self
    }

    pub(crate) fn with_subkeys(mut self, subkeys: &[&str]) -> Self {
        self.subkeys = subkeys.iter().map(|name| name.to_string()).collect();
        self
    }
}

impl MockRegistry {
    pub(crate) fn new() -> Self {
        MockRegistry::default()
    }

    pub(crate) fn with_key<T: Into<String>>(mut self, path: T, key: MockKey) -> Self {
        self.keys.insert(path.into(), key);
        self
    }

    pub(crate) fn set_value(&mut self, path: &str, name: &str, data: &[u8]) {
        self.keys
            .entry(path.to_string())
            .or_insert_with(MockKey::new)
            .values
            .insert(name.to_string(), data.to_vec());
    }

    pub(crate) fn set_class_name(&mut self, path: &str, class_name: &str) {
        self.keys
            .entry(path.to_string())
            .or_insert_with(MockKey::new)
            .class_name = Some(class_name.to_string());
    }

    fn key(&self, path: &str) -> Result<&MockKey, Error> {
        self.keys
            .iter()
            .find(|(key_path, _)| key_path.eq_ignore_ascii_case(path))
            .map(|(_, key)| key)
            .ok_or_else(|| Error::KeyNotFound {
                path: path.to_string(),
            })
    }
}

impl Registry for MockRegistry {
    fn subkey_names(&self, path: &str) -> Result<Vec<String>, Error> {
        Ok(self.key(path)?.subkeys.clone())
    }

    fn class_name(&self, path: &str) -> Result<Option<String>, Error> {
        Ok(self.key(path)?.class_name.clone())
    }

    fn value_bytes(&self, path: &str, name: &str) -> Result<Option<Vec<u8>>, Error> {
        let key = self.key(path)?;
        Ok(key
            .values
            .iter()
            .find(|(value_name, _)| value_name.eq_ignore_ascii_case(name))
            .map(|(_, data)| data.clone()))
    }
}
