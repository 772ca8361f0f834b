//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `console`      | —                  | UART line input → inbox     |
//! | `hardware`     | ActuatorPort       | LEDC servos, fan GPIO       |
//! |                | RangingPort        | VL53L0X over I²C            |
//! | `log_sink`     | EventSink          | Serial log output           |
//! | `nvs`          | ConfigPort         | NVS / in-memory store       |
//! |                | StoragePort        |                             |
//! | `time`         | —                  | ESP32 system timer          |

pub mod console;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
