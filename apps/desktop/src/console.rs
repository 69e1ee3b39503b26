//! Line commands for driving the panel from a terminal.

use anyhow::{anyhow, bail, Context, Result};
use client_core::SelectionSlot;
use shared::domain::{ChannelId, TrackTag};

pub const HELP: &str = "\
commands:
  channels                          list channels and current selections
  select <track1|track2|listener> <channel_id>
  join | leave
  toggle <track1|track2>            flip listening for a track
  listen <track1|track2> <on|off>
  volume <track1|track2> <name> <0-200|+N|-N>
  roster [track1|track2]
  user <user_id> <name>             name a simulated user
  sim <join|leave> <track1|track2> <user_id>
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Channels,
    Select {
        slot: SelectionSlot,
        channel_id: ChannelId,
    },
    Join,
    Leave,
    Toggle(TrackTag),
    Listen {
        track: TrackTag,
        is_listening: bool,
    },
    Volume {
        track: TrackTag,
        name: String,
        percent: i64,
    },
    AdjustVolume {
        track: TrackTag,
        name: String,
        delta: i64,
    },
    Roster(Option<TrackTag>),
    RegisterUser {
        user_id: String,
        name: String,
    },
    Simulate {
        join: bool,
        track: TrackTag,
        user_id: String,
    },
    Help,
    Quit,
}

fn parse_track(raw: Option<&str>) -> Result<TrackTag> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("track1" | "1") => Ok(TrackTag::Track1),
        Some("track2" | "2") => Ok(TrackTag::Track2),
        Some(other) => bail!("unknown track '{other}'"),
        None => bail!("missing track"),
    }
}

fn parse_slot(raw: Option<&str>) -> Result<SelectionSlot> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("listener" | "sub") => Ok(SelectionSlot::Listener),
        other => parse_track(other).map(SelectionSlot::for_track),
    }
}

fn required<'a>(raw: Option<&'a str>, what: &str) -> Result<&'a str> {
    raw.ok_or_else(|| anyhow!("missing {what}"))
}

/// Parses one input line; blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let command = match verb.as_str() {
        "channels" => ConsoleCommand::Channels,
        "select" => ConsoleCommand::Select {
            slot: parse_slot(words.next())?,
            channel_id: ChannelId::new(required(words.next(), "channel id")?),
        },
        "join" => ConsoleCommand::Join,
        "leave" => ConsoleCommand::Leave,
        "toggle" => ConsoleCommand::Toggle(parse_track(words.next())?),
        "listen" => {
            let track = parse_track(words.next())?;
            let is_listening = match words.next() {
                Some("on") => true,
                Some("off") => false,
                _ => bail!("listen expects on or off"),
            };
            ConsoleCommand::Listen {
                track,
                is_listening,
            }
        }
        "volume" => {
            let track = parse_track(words.next())?;
            let name = required(words.next(), "participant name")?.to_string();
            let raw = required(words.next(), "volume")?;
            let value = raw
                .parse::<i64>()
                .context("volume must be an integer percentage")?;
            if raw.starts_with(['+', '-']) {
                ConsoleCommand::AdjustVolume {
                    track,
                    name,
                    delta: value,
                }
            } else {
                ConsoleCommand::Volume {
                    track,
                    name,
                    percent: value,
                }
            }
        }
        "roster" => match words.next() {
            Some(raw) => ConsoleCommand::Roster(Some(parse_track(Some(raw))?)),
            None => ConsoleCommand::Roster(None),
        },
        "user" => ConsoleCommand::RegisterUser {
            user_id: required(words.next(), "user id")?.to_string(),
            name: words.collect::<Vec<_>>().join(" "),
        },
        "sim" => {
            let join = match words.next() {
                Some("join") => true,
                Some("leave") => false,
                _ => bail!("sim expects join or leave"),
            };
            ConsoleCommand::Simulate {
                join,
                track: parse_track(words.next())?,
                user_id: required(words.next(), "user id")?.to_string(),
            }
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}
