//! Durable stove state: power, applied intensity and fan.
//!
//! Each value lives under its own key in the `stove` namespace, encoded
//! with postcard into a small stack buffer.  Reads never fail outward:
//! a missing key is normal on first boot, anything else is logged and
//! treated as missing.  Writes that fail are logged and the controller
//! carries on with its in-memory state.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{StorageError, StoragePort};

pub const NAMESPACE: &str = "stove";
pub const KEY_POWER: &str = "power";
pub const KEY_INTENSITY: &str = "intensity";
pub const KEY_FAN: &str = "fan";

/// Largest encoded value.  All persisted values are a single byte today.
const VALUE_BUF_LEN: usize = 8;

/// Whatever could be recovered from storage.  `None` means the key was
/// missing or unreadable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub power: Option<bool>,
    pub intensity: Option<u8>,
    pub fan: Option<bool>,
}

/// Typed view over a [`StoragePort`].
pub struct StateStore<'a, S: StoragePort> {
    storage: &'a mut S,
}

impl<'a, S: StoragePort> StateStore<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> PersistedState {
        PersistedState {
            power: self.read_value(KEY_POWER),
            intensity: self.read_value(KEY_INTENSITY),
            fan: self.read_value(KEY_FAN),
        }
    }

    pub fn save_power(&mut self, on: bool) -> bool {
        self.write_value(KEY_POWER, &on)
    }

    pub fn save_intensity(&mut self, applied: u8) -> bool {
        self.write_value(KEY_INTENSITY, &applied)
    }

    pub fn save_fan(&mut self, on: bool) -> bool {
        self.write_value(KEY_FAN, &on)
    }

    // ── Internal ──────────────────────────────────────────────

    fn read_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut buf = [0u8; VALUE_BUF_LEN];
        let result = self
            .storage
            .read(NAMESPACE, key, &mut buf)
            .and_then(|len| {
                postcard::from_bytes::<T>(&buf[..len]).map_err(|_| StorageError::Corrupted)
            });
        match result {
            Ok(value) => Some(value),
            Err(StorageError::NotFound) => {
                debug!("persist: {}::{} not set", NAMESPACE, key);
                None
            }
            Err(e) => {
                warn!("persist: {}::{} unreadable ({}), using default", NAMESPACE, key, e);
                None
            }
        }
    }

    fn write_value<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        let mut buf = [0u8; VALUE_BUF_LEN];
        let bytes = match postcard::to_slice(value, &mut buf) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("persist: {}::{} encode failed: {}", NAMESPACE, key, e);
                return false;
            }
        };
        match self.storage.write(NAMESPACE, key, bytes) {
            Ok(()) => {
                debug!("persist: {}::{} saved", NAMESPACE, key);
                true
            }
            Err(e) => {
                warn!("persist: {}::{} write failed ({}), keeping in-memory value", NAMESPACE, key, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore {
        map: HashMap<(String, String), Vec<u8>>,
        fail_writes: bool,
    }

    impl StoragePort for MemStore {
        fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
            let data = self
                .map
                .get(&(ns.to_string(), key.to_string()))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::IoError);
            }
            self.map
                .insert((ns.to_string(), key.to_string()), data.to_vec());
            Ok(())
        }

        fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
            self.map.remove(&(ns.to_string(), key.to_string()));
            Ok(())
        }

        fn exists(&self, ns: &str, key: &str) -> bool {
            self.map.contains_key(&(ns.to_string(), key.to_string()))
        }
    }

    #[test]
    fn empty_store_loads_nothing() {
        let mut mem = MemStore::default();
        assert_eq!(StateStore::new(&mut mem).load(), PersistedState::default());
    }

    #[test]
    fn saved_values_load_back() {
        let mut mem = MemStore::default();
        let mut store = StateStore::new(&mut mem);
        assert!(store.save_power(true));
        assert!(store.save_intensity(12));
        assert!(store.save_fan(true));
        assert_eq!(
            store.load(),
            PersistedState {
                power: Some(true),
                intensity: Some(12),
                fan: Some(true),
            }
        );
        assert!(mem.exists(NAMESPACE, KEY_INTENSITY));
    }

    #[test]
    fn corrupt_value_reads_as_missing() {
        let mut mem = MemStore::default();
        mem.write(NAMESPACE, KEY_POWER, &[0x07]).unwrap();
        mem.write(NAMESPACE, KEY_INTENSITY, &[]).unwrap();
        let state = StateStore::new(&mut mem).load();
        assert_eq!(state.power, None);
        assert_eq!(state.intensity, None);
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let mut mem = MemStore {
            fail_writes: true,
            ..Default::default()
        };
        let mut store = StateStore::new(&mut mem);
        assert!(!store.save_fan(true));
        assert_eq!(store.load().fan, None);
    }
}
