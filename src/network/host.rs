//! Authority Host
//!
//! Runs a [`MatchSession`] at a fixed tick rate on tokio. Commands arrive on
//! an mpsc queue and are drained before each tick; snapshots and events go
//! out on a broadcast channel. Publishing never waits: a subscriber that
//! falls behind loses old messages instead of stalling the tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::hash::StateHash;
use crate::game::state::PlayerId;
use crate::network::protocol::{HostCommand, ServerMessage};
use crate::network::session::MatchSession;

/// Queued commands before senders wait.
const COMMAND_QUEUE: usize = 1024;

/// Published messages kept for slow subscribers.
const MESSAGE_BACKLOG: usize = 256;

/// Host errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host stopped and no longer accepts commands.
    #[error("Host command channel closed")]
    ChannelClosed,
}

/// How a host run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSummary {
    /// Ticks simulated
    pub ticks: u32,
    /// True if the match finished rather than being shut down
    pub finished: bool,
    /// Last entity standing
    pub winner: Option<PlayerId>,
    /// State hash after the last tick
    pub final_hash: StateHash,
}

/// Cloneable handle used by collaborators to talk to a running host.
#[derive(Clone)]
pub struct HostHandle {
    commands: mpsc::Sender<HostCommand>,
    messages: broadcast::Sender<ServerMessage>,
    shutdown: broadcast::Sender<()>,
    session: Arc<RwLock<MatchSession>>,
}

impl HostHandle {
    /// Queue a command for the next tick.
    pub async fn send(&self, command: HostCommand) -> Result<(), HostError> {
        self.commands.send(command).await.map_err(|_| HostError::ChannelClosed)
    }

    /// Receive snapshots, events and the end-of-match notice.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.messages.subscribe()
    }

    /// Shared session, for read-only inspection.
    pub fn session(&self) -> Arc<RwLock<MatchSession>> {
        self.session.clone()
    }

    /// Stop the host after the current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// The fixed-rate authority loop.
pub struct AuthorityHost {
    tick_rate: u32,
    session: Arc<RwLock<MatchSession>>,
    commands: mpsc::Receiver<HostCommand>,
    messages: broadcast::Sender<ServerMessage>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl AuthorityHost {
    /// Create a host and the handle that drives it.
    pub fn new(session: MatchSession, tick_rate: u32) -> (Self, HostHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (message_tx, _) = broadcast::channel(MESSAGE_BACKLOG);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let session = Arc::new(RwLock::new(session));

        let host = Self {
            tick_rate: tick_rate.max(1),
            session: session.clone(),
            commands: command_rx,
            messages: message_tx.clone(),
            shutdown_rx,
        };
        let handle = HostHandle {
            commands: command_tx,
            messages: message_tx,
            shutdown: shutdown_tx,
            session,
        };
        (host, handle)
    }

    /// Run until shutdown, until every handle is dropped, or until the
    /// match finishes.
    pub async fn run(mut self) -> Result<HostSummary, HostError> {
        let session_lock = self.session.clone();
        let tick_duration = Duration::from_micros(1_000_000 / self.tick_rate as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Authority host running at {} Hz", self.tick_rate);

        let mut winner = None;
        let mut finished = false;

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }

            let result = {
                let mut session = session_lock.write().await;

                // 1. Drain queued commands
                self.drain_commands(&mut session);

                // 2. Simulate
                match session.run_tick() {
                    Some(result) => result,
                    None => {
                        finished = true;
                        break;
                    }
                }
            };

            // 3. Publish, fire-and-forget
            let tick = result.snapshot.as_ref().map(|s| s.tick).unwrap_or_default();
            if !result.events.is_empty() {
                let _ = self.messages.send(ServerMessage::Events { tick, events: result.events });
            }
            if let Some(snapshot) = result.snapshot {
                let _ = self.messages.send(ServerMessage::Snapshot(snapshot));
            }

            if result.match_ended {
                winner = result.winner;
                finished = true;
                let _ = self.messages.send(ServerMessage::MatchEnded { winner, tick });
                info!(
                    "Match ended at tick {}, winner {:?}",
                    tick,
                    winner.map(|w| hex::encode(&w.0[..4]))
                );
                break;
            }
        }

        let session = session_lock.read().await;
        let summary = HostSummary {
            ticks: session.current_tick(),
            finished,
            winner,
            final_hash: session.arena().compute_hash(),
        };
        info!("Authority host stopped after {} ticks", summary.ticks);
        Ok(summary)
    }

    fn drain_commands(&mut self, session: &mut MatchSession) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    let player = command.player_id();
                    if let Err(e) = session.handle_command(command) {
                        warn!("Command for {} rejected: {}", hex::encode(&player.0[..4]), e);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("All command senders dropped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::{ArenaConfig, ArenaGenerator};
    use crate::game::authority::PeerId;
    use crate::game::movement::VehicleTuning;
    use crate::game::state::MatchPhase;
    use crate::game::tick::MatchConfig;
    use crate::network::session::SessionConfig;

    fn create_host() -> (AuthorityHost, HostHandle) {
        let layout = ArenaGenerator::generate_from(&ArenaConfig { rows: 5, cols: 5, ..ArenaConfig::default() }).unwrap();
        let rules = MatchConfig { required_players: 2, ..MatchConfig::default() }.compile();
        let session = MatchSession::new(layout, rules, &VehicleTuning::default(), SessionConfig { max_players: 2 });
        AuthorityHost::new(session, 500)
    }

    fn join(n: u8) -> HostCommand {
        HostCommand::Join { player_id: PlayerId::new([n; 16]), display_name: format!("p{}", n), peer: PeerId(n as u32) }
    }

    #[tokio::test]
    async fn test_host_applies_commands_and_publishes() {
        let (host, handle) = create_host();
        let mut messages = handle.subscribe();
        let task = tokio::spawn(host.run());

        handle.send(join(1)).await.unwrap();
        handle.send(join(2)).await.unwrap();

        let running = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match messages.recv().await {
                    Ok(ServerMessage::Snapshot(s)) if s.phase == MatchPhase::Running => return s,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("host closed"),
                }
            }
        })
        .await
        .expect("no running snapshot");
        assert_eq!(running.entities.len(), 2);

        handle.shutdown();
        let summary = task.await.unwrap().unwrap();
        assert!(!summary.finished);
        assert!(summary.ticks >= running.tick);
    }

    #[tokio::test]
    async fn test_host_stops_when_match_ends() {
        let (host, handle) = create_host();
        let mut messages = handle.subscribe();
        let task = tokio::spawn(host.run());

        handle.send(join(1)).await.unwrap();
        handle.send(join(2)).await.unwrap();

        // Wait for the match to start, then leave with one player
        loop {
            if let Ok(ServerMessage::Snapshot(s)) = messages.recv().await {
                if s.phase == MatchPhase::Running {
                    break;
                }
            }
        }
        handle.send(HostCommand::Leave { player_id: PlayerId::new([2; 16]) }).await.unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
        assert!(summary.finished);
        assert_eq!(summary.winner, Some(PlayerId::new([1; 16])));

        // Host is gone: commands bounce
        assert_eq!(handle.send(join(3)).await, Err(HostError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block() {
        let (host, handle) = create_host();
        // Never read: the backlog overflows without stalling the loop
        let _idle = handle.subscribe();
        let task = tokio::spawn(host.run());

        handle.send(join(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.shutdown();

        let summary = task.await.unwrap().unwrap();
        assert!(summary.ticks > 100);
        let session = handle.session();
        assert_eq!(session.read().await.player_count(), 1);
    }
}
