//! Mock hardware adapter for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real LEDC/GPIO registers, and replays a
//! scripted sequence of ranging results.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use stovectl::app::events::AppEvent;
use stovectl::app::ports::{
    Actuator, ActuatorPort, ConfigError, ConfigPort, EventSink, RangingPort, StorageError,
    StoragePort,
};
use stovectl::config::StoveConfig;
use stovectl::error::{ActuatorError, SensorError};
use stovectl::sensors::RangeMeasurement;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    Press {
        actuator: Actuator,
        release_deg: u8,
        press_deg: u8,
    },
    Park {
        actuator: Actuator,
        release_deg: u8,
    },
    Position {
        actuator: Actuator,
        deg: u8,
    },
    Fan(bool),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    ranges: VecDeque<Result<RangeMeasurement, SensorError>>,
    pub fail_presses: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            ranges: VecDeque::new(),
            fail_presses: false,
        }
    }

    /// Queue the result of the next `measure()` call.  With nothing
    /// queued the sensor reports a timeout.
    pub fn queue_range(&mut self, result: Result<RangeMeasurement, SensorError>) {
        self.ranges.push_back(result);
    }

    pub fn queue_mm(&mut self, mm: u16) {
        self.queue_range(Ok(RangeMeasurement::valid(mm)));
    }

    pub fn presses(&self, actuator: Actuator) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HwCall::Press { actuator: a, .. } if *a == actuator))
            .count()
    }

    /// Value presses that hit the button at `press_deg`.
    pub fn value_presses_at(&self, press_deg: u8) -> usize {
        self.calls
            .iter()
            .filter(|c| {
                matches!(c, HwCall::Press { actuator: Actuator::Value, press_deg: d, .. } if *d == press_deg)
            })
            .count()
    }

    pub fn parks(&self, actuator: Actuator) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HwCall::Park { actuator: a, .. } if *a == actuator))
            .count()
    }

    pub fn fan_on(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match c {
            HwCall::Fan(on) => Some(*on),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn press(
        &mut self,
        actuator: Actuator,
        release_deg: u8,
        press_deg: u8,
    ) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Press {
            actuator,
            release_deg,
            press_deg,
        });
        if self.fail_presses {
            return Err(ActuatorError::Pwm(-1));
        }
        Ok(())
    }

    fn park(&mut self, actuator: Actuator, release_deg: u8) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Park {
            actuator,
            release_deg,
        });
        Ok(())
    }

    fn write_position(&mut self, actuator: Actuator, deg: u8) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Position { actuator, deg });
        Ok(())
    }

    fn set_fan(&mut self, on: bool) {
        self.calls.push(HwCall::Fan(on));
    }
}

impl RangingPort for MockHardware {
    fn measure(&mut self) -> Result<RangeMeasurement, SensorError> {
        self.ranges.pop_front().unwrap_or(Err(SensorError::Timeout))
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    saved_config: RefCell<Option<StoveConfig>>,
    pub config_saves: RefCell<u32>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            fail_writes: false,
            saved_config: RefCell::new(None),
            config_saves: RefCell::new(0),
        }
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }

    pub fn saved_config(&self) -> Option<StoveConfig> {
        self.saved_config.borrow().clone()
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let k = format!("{}::{}", namespace, key);
        self.store.insert(k, data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<StoveConfig, ConfigError> {
        Ok(self.saved_config().unwrap_or_default())
    }

    fn save(&self, config: &StoveConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        *self.saved_config.borrow_mut() = Some(config.clone());
        *self.config_saves.borrow_mut() += 1;
        Ok(())
    }
}

// ── CollectingSink ────────────────────────────────────────────

pub struct CollectingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl CollectingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn levels(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::LevelChanged(l) => Some(*l),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StatusChanged(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
