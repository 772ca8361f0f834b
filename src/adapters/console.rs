//! Serial console command adapter.
//!
//! Reads newline-terminated text commands from the console UART (stdin
//! under ESP-IDF's VFS) on a dedicated thread and forwards them to the
//! command inbox.  The control loop picks them up before its next tick.
//!
//! ```text
//!   power on|off          intensity <0-100>     fan on|off
//!   maint on|off          servo <power> <value> save
//!   config {json}
//! ```
//!
//! `config` takes a complete `StoveConfig` as JSON; partial updates are
//! not merged.

use std::io::BufRead;

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::inbox;
use crate::config::StoveConfig;

/// Console reader stack.  serde_json needs some headroom for `config`.
pub const CONSOLE_STACK_SIZE: usize = 8 * 1024;

/// Why a console line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand,
    MissingArgument,
    BadArgument,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::BadArgument => write!(f, "bad argument"),
        }
    }
}

/// Parse one console line into a command.
pub fn parse_line(line: &str) -> Result<AppCommand, ParseError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "" => Err(ParseError::Empty),
        "power" => Ok(AppCommand::SetPower(parse_switch(rest)?)),
        "fan" => Ok(AppCommand::SetFan(parse_switch(rest)?)),
        "maint" => Ok(if parse_switch(rest)? {
            AppCommand::EnterMaintenance
        } else {
            AppCommand::ExitMaintenance
        }),
        "intensity" => {
            let percent: u8 = parse_number(rest)?;
            Ok(AppCommand::SetIntensityPercent(percent))
        }
        "servo" => {
            let mut args = rest.split_whitespace();
            let power = parse_number(args.next().unwrap_or(""))?;
            let value = parse_number(args.next().unwrap_or(""))?;
            Ok(AppCommand::ManualPositions { power, value })
        }
        "save" => Ok(AppCommand::SaveConfig),
        "config" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument);
            }
            let cfg: StoveConfig =
                serde_json::from_str(rest).map_err(|_| ParseError::BadArgument)?;
            Ok(AppCommand::UpdateConfig(cfg))
        }
        _ => Err(ParseError::UnknownCommand),
    }
}

/// Read lines until EOF, submitting every valid command.
pub fn run(reader: impl BufRead) {
    info!("Console: accepting commands");
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Console: read error: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(cmd) => {
                if !inbox::submit(cmd) {
                    warn!("Console: '{}' dropped, inbox full", line.trim());
                }
            }
            Err(ParseError::Empty) => {}
            Err(e) => warn!("Console: '{}': {}", line.trim(), e),
        }
    }
    info!("Console: input closed");
}

fn parse_switch(arg: &str) -> Result<bool, ParseError> {
    match arg {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        "" => Err(ParseError::MissingArgument),
        _ => Err(ParseError::BadArgument),
    }
}

fn parse_number(arg: &str) -> Result<u8, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument);
    }
    arg.parse().map_err(|_| ParseError::BadArgument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_switch_commands() {
        assert_eq!(parse_line("power on"), Ok(AppCommand::SetPower(true)));
        assert_eq!(parse_line("  fan off \r"), Ok(AppCommand::SetFan(false)));
        assert_eq!(parse_line("maint on"), Ok(AppCommand::EnterMaintenance));
        assert_eq!(parse_line("maint 0"), Ok(AppCommand::ExitMaintenance));
    }

    #[test]
    fn parses_numeric_commands() {
        assert_eq!(
            parse_line("intensity 60"),
            Ok(AppCommand::SetIntensityPercent(60))
        );
        assert_eq!(
            parse_line("servo 40 90"),
            Ok(AppCommand::ManualPositions { power: 40, value: 90 })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_line(""), Err(ParseError::Empty));
        assert_eq!(parse_line("reboot"), Err(ParseError::UnknownCommand));
        assert_eq!(parse_line("power"), Err(ParseError::MissingArgument));
        assert_eq!(parse_line("power maybe"), Err(ParseError::BadArgument));
        assert_eq!(parse_line("intensity 300"), Err(ParseError::BadArgument));
        assert_eq!(parse_line("servo 40"), Err(ParseError::MissingArgument));
    }

    #[test]
    fn parses_full_config_json() {
        let cfg = StoveConfig {
            power_on_settle_secs: 900,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(
            parse_line(&format!("config {}", json)),
            Ok(AppCommand::UpdateConfig(cfg))
        );
        assert_eq!(parse_line("config {\"x\":1}"), Err(ParseError::BadArgument));
    }
}
