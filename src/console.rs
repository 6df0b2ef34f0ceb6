//! Line-oriented control surface for the headless binary.

use crate::bridge::{BridgeError, BridgeHandle};
use crate::liveness::{PlatformSignal, WakeSource};
use crate::remote::RemoteGateway;
use crate::roster::{DeviceRoster, SyncOutcome};
use crate::router::TransportCommand;
use crate::utils::logger::log_async_function;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Transport(TransportCommand),
    Wake(WakeSource),
    Signal(PlatformSignal),
    Enable,
    Disable,
    TaskRemoved,
    AddDevice { entity_id: String, name: String },
    RemoveDevice(usize),
    Devices,
    Sync,
    TestConnection,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | next | prev | stop
  vol <0-100> | vol+ | vol-
  wake <bluetooth|headset|noisy|call-ended|device|boot|timer|scheduled|backup|start>
  boot | enable | disable | removed
  add <entity_id> <name> | remove <n> | devices | sync
  test | status | help | quit";

pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "play" => ConsoleCommand::Transport(TransportCommand::Play),
        "pause" => ConsoleCommand::Transport(TransportCommand::Pause),
        "next" => ConsoleCommand::Transport(TransportCommand::Next),
        "prev" | "previous" => ConsoleCommand::Transport(TransportCommand::Previous),
        "stop" => ConsoleCommand::Transport(TransportCommand::Stop),
        "vol+" => ConsoleCommand::Transport(TransportCommand::VolumeAdjust(1)),
        "vol-" => ConsoleCommand::Transport(TransportCommand::VolumeAdjust(-1)),
        "vol" => {
            let raw = words.next().ok_or("usage: vol <0-100>")?;
            let volume = raw
                .parse::<i32>()
                .map_err(|_| format!("invalid volume '{}'", raw))?;
            ConsoleCommand::Transport(TransportCommand::VolumeSet(volume))
        }
        "wake" => {
            let raw = words.next().ok_or("usage: wake <source>")?;
            ConsoleCommand::Wake(raw.parse()?)
        }
        "boot" => ConsoleCommand::Signal(PlatformSignal::BootCompleted),
        "enable" => ConsoleCommand::Enable,
        "disable" => ConsoleCommand::Disable,
        "removed" => ConsoleCommand::TaskRemoved,
        "add" => {
            let entity_id = words.next().ok_or("usage: add <entity_id> <name>")?;
            let name = words.collect::<Vec<_>>().join(" ");
            ConsoleCommand::AddDevice {
                entity_id: entity_id.to_string(),
                name,
            }
        }
        "remove" => {
            let raw = words.next().ok_or("usage: remove <n>")?;
            let position = raw
                .parse::<usize>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| format!("invalid device number '{}'", raw))?;
            ConsoleCommand::RemoveDevice(position - 1)
        }
        "devices" => ConsoleCommand::Devices,
        "sync" => ConsoleCommand::Sync,
        "test" => ConsoleCommand::TestConnection,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(command)
}

pub struct Console {
    bridge: BridgeHandle,
    roster: DeviceRoster,
    gateway: Arc<dyn RemoteGateway>,
}

impl Console {
    pub fn new(bridge: BridgeHandle, roster: DeviceRoster, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            bridge,
            roster,
            gateway,
        }
    }

    /// Read commands from stdin until `quit`, EOF or Ctrl-C
    pub async fn run(&self) -> Result<(), BridgeError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted");
                    None
                }
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => self.execute(command).await?,
                Err(message) => println!("{}", message),
            }
        }
        Ok(())
    }

    pub async fn execute(&self, command: ConsoleCommand) -> Result<(), BridgeError> {
        match command {
            ConsoleCommand::Transport(command) => self.bridge.command(command)?,
            ConsoleCommand::Wake(source) => self.bridge.wake(source)?,
            ConsoleCommand::Signal(signal) => self.bridge.signal(signal)?,
            ConsoleCommand::Enable => self.bridge.start()?,
            ConsoleCommand::Disable => self.bridge.stop()?,
            ConsoleCommand::TaskRemoved => self.bridge.task_removed()?,
            ConsoleCommand::AddDevice { entity_id, name } => {
                match self.roster.add(&name, &entity_id).await {
                    Ok(devices) => {
                        println!("{} devices", devices.len());
                        self.bridge.devices_changed()?;
                    }
                    Err(e) => println!("{}", e),
                }
            }
            ConsoleCommand::RemoveDevice(index) => match self.roster.remove(index).await {
                Ok(devices) => {
                    println!("{} devices", devices.len());
                    self.bridge.devices_changed()?;
                }
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Devices => {
                for (i, device) in self.roster.devices().iter().enumerate() {
                    println!("{:>2}. {} ({})", i + 1, device.name, device.entity_id);
                }
            }
            ConsoleCommand::Sync => match log_async_function("Device list sync", || self.roster.sync()).await {
                Ok(SyncOutcome::Pulled(count)) => {
                    println!("pulled {} devices", count);
                    self.bridge.devices_changed()?;
                }
                Ok(outcome) => println!("{:?}", outcome),
                Err(e) => println!("sync failed: {}", e),
            },
            ConsoleCommand::TestConnection => match self.gateway.test_connection().await {
                Ok(()) => println!("connected"),
                Err(e) => println!("connection failed: {}", e),
            },
            ConsoleCommand::Status => {
                let snapshot = self.bridge.snapshot().await?;
                println!(
                    "{:?} | {} | vol {}% {} | {}",
                    snapshot.session_state,
                    snapshot.display.title,
                    snapshot.playback.volume(),
                    if snapshot.playback.is_playing { "playing" } else { "paused" },
                    snapshot.display.detail
                );
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_commands() {
        assert_eq!(
            parse_line("play"),
            Ok(ConsoleCommand::Transport(TransportCommand::Play))
        );
        assert_eq!(
            parse_line("  PREV "),
            Ok(ConsoleCommand::Transport(TransportCommand::Previous))
        );
        assert_eq!(
            parse_line("vol 70"),
            Ok(ConsoleCommand::Transport(TransportCommand::VolumeSet(70)))
        );
        assert_eq!(
            parse_line("vol-"),
            Ok(ConsoleCommand::Transport(TransportCommand::VolumeAdjust(-1)))
        );
        assert!(parse_line("vol loud").is_err());
        assert!(parse_line("vol").is_err());
    }

    #[test]
    fn test_wake_and_signals() {
        assert_eq!(
            parse_line("wake bluetooth"),
            Ok(ConsoleCommand::Wake(WakeSource::BluetoothAudioConnected))
        );
        assert_eq!(
            parse_line("boot"),
            Ok(ConsoleCommand::Signal(PlatformSignal::BootCompleted))
        );
        assert!(parse_line("wake lunch").is_err());
    }

    #[test]
    fn test_roster_commands() {
        assert_eq!(
            parse_line("add light.living_room Living Room Lamp"),
            Ok(ConsoleCommand::AddDevice {
                entity_id: "light.living_room".to_string(),
                name: "Living Room Lamp".to_string(),
            })
        );
        assert_eq!(parse_line("remove 2"), Ok(ConsoleCommand::RemoveDevice(1)));
        assert!(parse_line("remove 0").is_err());
        assert!(parse_line("").is_err());
        assert!(parse_line("dance").is_err());
    }
}
