use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    LoopbackBackend, PanelEvent, SelectionSlot, VoiceBackend, VoiceEventSource, VoicePanel,
};
use futures::StreamExt;
use shared::domain::{Channel, TrackTag};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::{load_settings, DEFAULT_CONFIG_PATH};
use console::{ConsoleCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Voice routing panel driven from the terminal")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Channels offered by the loopback backend, as `id:name` pairs.
    #[arg(long, value_delimiter = ',', default_value = "1:General,2:Music,3:Lounge")]
    channels: Vec<String>,
    #[arg(long)]
    log_filter: Option<String>,
}

fn parse_channels(raw: &[String]) -> Result<Vec<Channel>> {
    raw.iter()
        .map(|entry| match entry.split_once(':') {
            Some((id, name)) if !id.trim().is_empty() => Ok(Channel::new(id.trim(), name.trim())),
            _ => bail!("channel '{entry}' must look like id:name"),
        })
        .collect()
}

fn slot_label(slot: SelectionSlot) -> &'static str {
    match slot {
        SelectionSlot::Track1Source => "speaker1",
        SelectionSlot::Track2Source => "speaker2",
        SelectionSlot::Listener => "listener",
    }
}

async fn print_events(rx: tokio::sync::broadcast::Receiver<PanelEvent>) {
    let mut events = BroadcastStream::new(rx);
    while let Some(event) = events.next().await {
        match event {
            Ok(PanelEvent::ChannelsLoaded(channels)) => {
                println!("* {} channels loaded", channels.len());
            }
            Ok(PanelEvent::SelectionChanged { slot, channel_id }) => {
                println!("* {} -> {channel_id}", slot_label(slot));
            }
            Ok(PanelEvent::ListeningChanged {
                track,
                is_listening,
            }) => {
                let state = if is_listening {
                    "now listening"
                } else {
                    "stopping"
                };
                println!("* {track}: {state}");
            }
            Ok(PanelEvent::RosterUpdated {
                track,
                participants,
            }) => {
                let names = participants
                    .iter()
                    .map(|p| format!("{} ({})", p.name, p.volume))
                    .collect::<Vec<_>>();
                println!("* {track} roster: [{}]", names.join(", "));
            }
            Ok(PanelEvent::SessionJoined { ch1, ch2, sub_ch }) => {
                println!("* joined speaker1={ch1} speaker2={ch2} listener={sub_ch}");
            }
            Ok(PanelEvent::SessionLeft) => println!("* left"),
            Ok(PanelEvent::OperationFailed { operation, message }) => {
                println!("! {operation:?} failed: {message}");
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(missed, "event printer lagged");
            }
        }
    }
}

fn print_channels(panel: &VoicePanel) {
    for channel in panel.channels() {
        let marks = [
            SelectionSlot::Track1Source,
            SelectionSlot::Track2Source,
            SelectionSlot::Listener,
        ]
        .into_iter()
        .filter(|slot| panel.picker(*slot).selected() == Some(&channel.id))
        .map(slot_label)
        .collect::<Vec<_>>();
        println!("  {:>6}  {:<20} {}", channel.id, channel.name, marks.join(" "));
    }
}

async fn print_roster(panel: &VoicePanel, track: TrackTag) -> Result<()> {
    let participants = panel.roster(track).await?;
    println!("  {track} ({} live)", participants.len());
    for participant in participants {
        println!(
            "    {:<20} {:>4}%  user_id={}",
            participant.name,
            participant.volume.percent(),
            participant.user_id
        );
    }
    Ok(())
}

async fn execute(
    panel: &mut VoicePanel,
    backend: &LoopbackBackend,
    command: ConsoleCommand,
) -> Result<()> {
    match command {
        ConsoleCommand::Channels => print_channels(panel),
        ConsoleCommand::Select { slot, channel_id } => {
            panel.select(slot, &channel_id)?;
        }
        ConsoleCommand::Join => panel.join().await?,
        ConsoleCommand::Leave => panel.leave().await?,
        ConsoleCommand::Toggle(track) => {
            panel.toggle_listening(track).await?;
        }
        ConsoleCommand::Listen {
            track,
            is_listening,
        } => panel.set_listening(track, is_listening).await?,
        ConsoleCommand::Volume {
            track,
            name,
            percent,
        } => panel.set_volume(track, &name, percent).await?,
        ConsoleCommand::AdjustVolume { track, name, delta } => {
            let volume = panel.adjust_volume(track, &name, delta).await?;
            println!("  {name}: {}%", volume.percent());
        }
        ConsoleCommand::Roster(Some(track)) => print_roster(panel, track).await?,
        ConsoleCommand::Roster(None) => {
            for track in TrackTag::ALL {
                print_roster(panel, track).await?;
            }
        }
        ConsoleCommand::RegisterUser { user_id, name } => {
            if name.is_empty() {
                bail!("user needs a display name");
            }
            backend.register_user(user_id, name).await;
        }
        ConsoleCommand::Simulate {
            join,
            track,
            user_id,
        } => {
            if join {
                backend.simulate_join(track, user_id).await;
            } else {
                backend.simulate_leave(track, user_id).await;
            }
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = match &args.log_filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&args.config);
    let backend = Arc::new(LoopbackBackend::new(parse_channels(&args.channels)?));
    let mut panel = VoicePanel::new(
        Arc::clone(&backend) as Arc<dyn VoiceBackend>,
        Arc::clone(&backend) as Arc<dyn VoiceEventSource>,
        settings,
    );
    let printer = tokio::spawn(print_events(panel.subscribe_events()));
    panel.mount().await;

    if let Err(err) = panel.load_channels().await {
        warn!("starting without channels: {err}");
    }
    info!("panel ready; type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match console::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("! {err}");
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        if let Err(err) = execute(&mut panel, &backend, command).await {
            println!("! {err}");
        }
    }

    panel.shutdown().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_channels;

    #[test]
    fn parses_channel_pairs() {
        let channels = parse_channels(&["10:General".to_string(), " 20 : Music ".to_string()])
            .expect("parse");
        assert_eq!(channels[0].id.as_str(), "10");
        assert_eq!(channels[1].name, "Music");
    }

    #[test]
    fn rejects_channel_without_id() {
        assert!(parse_channels(&[":General".to_string()]).is_err());
        assert!(parse_channels(&["General".to_string()]).is_err());
    }
}
