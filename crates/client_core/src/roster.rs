//! Per-track participant roster and the task that keeps it in sync with the
//! backend's `user-data-changed` stream.

use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::{
    domain::{TrackTag, VoiceUserId, Volume},
    protocol::{UserDataChanged, UserEvent},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{
    error::{PanelError, Result},
    events::{PanelEvent, Participant},
    VoiceBackend, VoiceEventSource,
};

const COMMAND_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Joined(String),
    Left(String),
    /// Leave for a name that was not on the roster.
    Unchanged,
    /// Event addressed to the other track.
    Ignored,
}

#[derive(Debug, Clone)]
struct Entry {
    user_id: VoiceUserId,
    volume: Volume,
    pending: Option<u64>,
}

/// Participants currently live on one track, keyed by display name.
#[derive(Debug, Clone)]
pub struct Roster {
    track: TrackTag,
    entries: HashMap<String, Entry>,
}

impl Roster {
    pub fn new(track: TrackTag) -> Self {
        Self {
            track,
            entries: HashMap::new(),
        }
    }

    pub fn track(&self) -> TrackTag {
        self.track
    }

    pub fn apply(&mut self, event: &UserDataChanged) -> RosterChange {
        if event.identify != self.track {
            return RosterChange::Ignored;
        }
        match event.event {
            UserEvent::Join => {
                // a re-join always starts over at the default volume
                self.entries.insert(
                    event.name.clone(),
                    Entry {
                        user_id: event.user_id.clone(),
                        volume: Volume::DEFAULT,
                        pending: None,
                    },
                );
                RosterChange::Joined(event.name.clone())
            }
            UserEvent::Leave => match self.entries.remove(&event.name) {
                Some(_) => RosterChange::Left(event.name.clone()),
                None => RosterChange::Unchanged,
            },
        }
    }

    pub fn set_volume(&mut self, name: &str, volume: Volume) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| PanelError::UnknownParticipant {
                track: self.track,
                name: name.to_string(),
            })?;
        entry.volume = volume;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Participant> {
        self.entries.get(name).map(|entry| Participant {
            name: name.to_string(),
            user_id: entry.user_id.clone(),
            volume: entry.volume,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        let mut participants = self
            .entries
            .iter()
            .map(|(name, entry)| Participant {
                name: name.clone(),
                user_id: entry.user_id.clone(),
                volume: entry.volume,
            })
            .collect::<Vec<_>>();
        participants.sort_by(|a, b| a.name.cmp(&b.name));
        participants
    }

    fn arm(&mut self, name: &str, generation: u64) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.pending = Some(generation);
        }
    }

    /// Takes the armed update for `name` if `generation` is still the latest
    /// one scheduled against the current record.
    fn take_armed(&mut self, name: &str, generation: u64) -> Option<(VoiceUserId, Volume)> {
        let entry = self.entries.get_mut(name)?;
        if entry.pending != Some(generation) {
            return None;
        }
        entry.pending = None;
        Some((entry.user_id.clone(), entry.volume))
    }
}

enum RosterCommand {
    SetVolume {
        name: String,
        volume: Volume,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Participant>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Owns one track's [`Roster`] inside a task.
///
/// The task holds the only `user-data-changed` subscription for the track and
/// releases it when [`ParticipantList::shutdown`] runs or the list is dropped.
pub struct ParticipantList {
    track: TrackTag,
    commands: mpsc::Sender<RosterCommand>,
    roster: watch::Receiver<Vec<Participant>>,
    task: Option<JoinHandle<()>>,
}

impl ParticipantList {
    pub fn spawn(
        track: TrackTag,
        backend: Arc<dyn VoiceBackend>,
        source: &dyn VoiceEventSource,
        reset: watch::Receiver<u64>,
        events: broadcast::Sender<PanelEvent>,
        debounce: Duration,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (roster_tx, roster) = watch::channel(Vec::new());
        let worker = RosterWorker {
            roster: Roster::new(track),
            backend,
            roster_tx,
            events,
            debounce,
            timers: JoinSet::new(),
            next_generation: 0,
        };
        let updates = source.subscribe_user_data();
        let task = tokio::spawn(worker.run(updates, reset, command_rx));
        info!(track = ?track, "participant list subscribed");

        Self {
            track,
            commands,
            roster,
            task: Some(task),
        }
    }

    /// Shows `volume` immediately and schedules the debounced backend update.
    pub async fn set_volume(&self, name: &str, volume: Volume) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RosterCommand::SetVolume {
            name: name.to_string(),
            volume,
            reply,
        })
        .await?;
        rx.await.map_err(|_| PanelError::ListStopped(self.track))?
    }

    pub async fn snapshot(&self) -> Result<Vec<Participant>> {
        let (reply, rx) = oneshot::channel();
        self.send(RosterCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| PanelError::ListStopped(self.track))
    }

    pub fn watch_roster(&self) -> watch::Receiver<Vec<Participant>> {
        self.roster.clone()
    }

    pub async fn shutdown(mut self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(RosterCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(track = ?self.track, "participant list task ended abnormally: {err}");
            }
        }
    }

    async fn send(&self, command: RosterCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PanelError::ListStopped(self.track))
    }
}

impl Drop for ParticipantList {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct RosterWorker {
    roster: Roster,
    backend: Arc<dyn VoiceBackend>,
    roster_tx: watch::Sender<Vec<Participant>>,
    events: broadcast::Sender<PanelEvent>,
    debounce: Duration,
    timers: JoinSet<(String, u64)>,
    next_generation: u64,
}

impl RosterWorker {
    async fn run(
        mut self,
        mut updates: broadcast::Receiver<UserDataChanged>,
        mut reset: watch::Receiver<u64>,
        mut commands: mpsc::Receiver<RosterCommand>,
    ) {
        let track = self.roster.track();
        let mut subscribed = true;
        let mut reset_open = true;

        loop {
            tokio::select! {
                biased;

                changed = reset.changed(), if reset_open => match changed {
                    Ok(()) => {
                        let token = *reset.borrow_and_update();
                        if subscribed {
                            subscribed = self.drain_queued(&mut updates);
                        }
                        info!(track = ?track, token, "roster reset");
                        self.clear();
                    }
                    Err(_) => reset_open = false,
                },
                update = updates.recv(), if subscribed => match update {
                    Ok(update) => self.on_update(&update),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(track = ?track, missed, "participant updates lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(track = ?track, "participant update source closed");
                        subscribed = false;
                    }
                },
                Some(fired) = self.timers.join_next(), if !self.timers.is_empty() => {
                    if let Ok((name, generation)) = fired {
                        self.on_debounce_elapsed(&name, generation);
                    }
                }
                command = commands.recv() => match command {
                    Some(RosterCommand::SetVolume { name, volume, reply }) => {
                        let _ = reply.send(self.on_set_volume(&name, volume));
                    }
                    Some(RosterCommand::Snapshot { reply }) => {
                        let _ = reply.send(self.roster.snapshot());
                    }
                    Some(RosterCommand::Shutdown { reply }) => {
                        self.clear();
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                },
            }
        }

        debug!(track = ?track, "participant list unsubscribed");
    }

    fn on_update(&mut self, update: &UserDataChanged) {
        let track = self.roster.track();
        match self.roster.apply(update) {
            RosterChange::Joined(name) => {
                info!(track = ?track, user_id = %update.user_id, "{name} joined");
                self.publish();
            }
            RosterChange::Left(name) => {
                info!(track = ?track, user_id = %update.user_id, "{name} left");
                self.publish();
            }
            RosterChange::Unchanged => {
                debug!(track = ?track, "leave for unknown participant {}", update.name);
            }
            RosterChange::Ignored => {}
        }
    }

    /// Applies updates already queued behind a reset so the reset covers
    /// them. Returns false once the source has closed.
    fn drain_queued(&mut self, updates: &mut broadcast::Receiver<UserDataChanged>) -> bool {
        let track = self.roster.track();
        loop {
            match updates.try_recv() {
                Ok(update) => {
                    self.roster.apply(&update);
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(track = ?track, missed, "participant updates lagged");
                }
                Err(broadcast::error::TryRecvError::Empty) => return true,
                Err(broadcast::error::TryRecvError::Closed) => {
                    info!(track = ?track, "participant update source closed");
                    return false;
                }
            }
        }
    }

    fn on_set_volume(&mut self, name: &str, volume: Volume) -> Result<()> {
        self.roster.set_volume(name, volume)?;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.roster.arm(name, generation);

        let debounce = self.debounce;
        let name = name.to_string();
        self.timers.spawn(async move {
            tokio::time::sleep(debounce).await;
            (name, generation)
        });
        self.publish();
        Ok(())
    }

    fn on_debounce_elapsed(&mut self, name: &str, generation: u64) {
        let track = self.roster.track();
        let Some((user_id, volume)) = self.roster.take_armed(name, generation) else {
            debug!(track = ?track, generation, "dropping stale volume update for {name}");
            return;
        };

        let backend = Arc::clone(&self.backend);
        // the outcome is only logged, so a reply after teardown touches nothing
        tokio::spawn(async move {
            match backend.update_volume(&user_id, volume.gain()).await {
                Ok(()) => debug!(track = ?track, user_id = %user_id, gain = volume.gain(), "volume applied"),
                Err(err) => warn!(track = ?track, user_id = %user_id, "failed to apply volume: {err}"),
            }
        });
    }

    fn clear(&mut self) {
        self.timers.abort_all();
        self.roster.clear();
        self.publish();
    }

    fn publish(&self) {
        let participants = self.roster.snapshot();
        self.roster_tx.send_replace(participants.clone());
        let _ = self.events.send(PanelEvent::RosterUpdated {
            track: self.roster.track(),
            participants,
        });
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
