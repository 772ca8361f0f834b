//! Bounded command inbox between request producers and the control loop.
//!
//! Uses an `embassy-sync` channel behind a critical-section mutex so any
//! context (console task, timer callback, test thread) can submit
//! commands without heap allocation.  The control loop drains the inbox
//! before each tick and applies commands in arrival order, so the last
//! request before a tick wins.
//!
//! ```text
//! ┌──────────────┐  AppCommand  ┌──────────────┐
//! │  Producers   │─────────────▶│ Control Loop │
//! │  (any ctx)   │  (bounded)   │  (sync)      │
//! └──────────────┘              └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

use super::commands::AppCommand;

/// Maximum commands buffered between two control ticks.
pub const INBOX_DEPTH: usize = 8;

pub struct CommandInbox {
    channel: Channel<CriticalSectionRawMutex, AppCommand, INBOX_DEPTH>,
}

impl CommandInbox {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a command.  Returns `false` (command dropped) if the inbox
    /// is full.
    pub fn submit(&self, cmd: AppCommand) -> bool {
        match self.channel.try_send(cmd) {
            Ok(()) => true,
            Err(_) => {
                warn!("inbox: full, command dropped");
                false
            }
        }
    }

    /// Remove every pending command, oldest first.
    pub fn take_all(&self) -> Vec<AppCommand, INBOX_DEPTH> {
        let mut cmds = Vec::new();
        while let Ok(cmd) = self.channel.try_receive() {
            if cmds.push(cmd).is_err() {
                break;
            }
        }
        cmds
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for CommandInbox {
    fn default() -> Self {
        Self::new()
    }
}

/// The firmware's single command inbox.
pub static COMMAND_INBOX: CommandInbox = CommandInbox::new();

/// Queue a command on [`COMMAND_INBOX`].  The main loop drains it on
/// every iteration, ahead of any pending control tick.
pub fn submit(cmd: AppCommand) -> bool {
    COMMAND_INBOX.submit(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_arrival_order() {
        let inbox = CommandInbox::new();
        assert!(inbox.submit(AppCommand::SetIntensityPercent(40)));
        assert!(inbox.submit(AppCommand::SetFan(true)));
        assert!(inbox.submit(AppCommand::SetIntensityPercent(80)));
        assert_eq!(inbox.len(), 3);

        let cmds = inbox.take_all();
        assert_eq!(
            cmds.as_slice(),
            &[
                AppCommand::SetIntensityPercent(40),
                AppCommand::SetFan(true),
                AppCommand::SetIntensityPercent(80),
            ]
        );
        assert!(inbox.is_empty());
    }

    #[test]
    fn rejects_when_full() {
        let inbox = CommandInbox::new();
        for _ in 0..INBOX_DEPTH {
            assert!(inbox.submit(AppCommand::SetPower(true)));
        }
        assert!(!inbox.submit(AppCommand::SetPower(false)));
        assert_eq!(inbox.take_all().len(), INBOX_DEPTH);
    }
}
