//! Maze Arena Server
//!
//! Runs an authoritative maze-arena match with scripted drivers, mirrors it
//! on a replica, replays the recording to check determinism, then hosts a
//! short real-time match on tokio.
//!
//! Usage: `maze-arena-server [config.json]`

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use maze_arena::{
    ServerConfig, TICK_RATE, VERSION,
    game::{
        arena::ArenaGenerator,
        authority::{AuthorityModel, PeerId},
        damage::build_scene,
        events::GameEventData,
        input::InputFrame,
        movement::{EntityPose, KinematicRelay},
        state::{ArenaMatch, PlayerId},
        tick::{replay_match, MatchRules},
        visual::VisualProjectiles,
    },
    network::{AuthorityHost, HostCommand, MatchSession, ServerMessage},
};

/// Upper bound on the scripted match (two minutes of simulation).
const DEMO_TICK_LIMIT: u32 = TICK_RATE * 120;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            ServerConfig::load(&path)?
        }
        None => ServerConfig::default(),
    };

    info!("Maze Arena Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);
    info!(
        "Arena: {}x{} cells, seed {}",
        config.arena.rows, config.arena.cols, config.arena.seed
    );

    demo_match(&config)?;
    hosted_match(&config).await?;
    Ok(())
}

/// Scripted driver: circles at a per-player rate and fires when its
/// aim sweeps across the arena.
fn bot_input(index: usize, tick: u32) -> InputFrame {
    let phase = (tick as i64 * (index as i64 + 3) * 5) % 254;
    let steer = (phase - 127) as i8;
    let aim_x = ((phase * 7) % 254 - 127) as i8;
    let aim_z = ((phase * 11) % 254 - 127) as i8;
    let frame = InputFrame::with_drive(100, steer).aimed(aim_x, aim_z);
    if tick % 20 < 4 {
        frame.firing()
    } else {
        frame
    }
}

/// Synchronous match through a session, mirrored on a replica.
fn demo_match(config: &ServerConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let layout = ArenaGenerator::generate_from(&config.arena)?;
    let rules = config.rules.compile();
    info!(
        "Layout hash {}, {} spawn points",
        hex::encode(&layout.layout_hash()[..8]),
        layout.spawn_points.len()
    );

    let mut session = MatchSession::new(layout.clone(), rules, &config.vehicle, config.session.clone());

    let players: Vec<PlayerId> = (0..rules.required_players)
        .map(|i| PlayerId::new([i as u8 + 1; 16]))
        .collect();
    for (i, id) in players.iter().enumerate() {
        session.handle_command(HostCommand::Join {
            player_id: *id,
            display_name: format!("Driver {}", i + 1),
            peer: PeerId(i as u32),
        })?;
    }

    // Replica owned by the first remote peer; it never simulates
    let mut replica = ArenaMatch::new(layout.clone(), AuthorityModel::client(PeerId(1)), &rules);
    let mut replica_relay = KinematicRelay::new(&config.vehicle);
    let mut visuals = VisualProjectiles::new();
    let mut impacts = 0usize;

    let mut winner = None;
    while session.current_tick() < DEMO_TICK_LIMIT {
        let next = session.current_tick() + 1;
        for (i, id) in players.iter().enumerate() {
            // Eliminated or departed drivers are rejected; keep going
            let _ = session.handle_command(HostCommand::Input { player_id: *id, frame: bot_input(i, next) });
        }

        let Some(result) = session.run_tick() else { break };
        log_events(&result.events);

        if let Some(snapshot) = &result.snapshot {
            replica.apply_snapshot(&mut replica_relay, snapshot);
            impacts += mirror_projectiles(&replica, &mut visuals, snapshot, &rules);
            if snapshot.tick % (TICK_RATE * 10) == 0 {
                let target = replica.cycle_spectate_target();
                info!("Replica camera follows {:?}", target.map(|t| hex::encode(&t.0[..4])));
            }
        }

        if result.match_ended {
            winner = result.winner;
            break;
        }
    }

    let arena = session.arena();
    let hash = arena.compute_hash();
    info!("=== Match Complete ===");
    info!("Final Tick: {}", arena.tick);
    info!("Winner: {:?}", winner.map(|w| hex::encode(&w.0[..4])));
    info!("Visual impacts on replica: {}", impacts);
    for player in arena.players.values() {
        info!(
            "  {} ({}): lives {}, kills {}, eliminated {}",
            player.display_name,
            hex::encode(&player.id.0[..4]),
            player.lives,
            player.kills,
            player.eliminated
        );
    }
    info!("State Hash: {}", hex::encode(hash));

    // Verify determinism by replaying the recording
    info!("=== Replaying for Verification ===");
    let (replayed, _) = replay_match(layout, session.rules(), &config.vehicle, session.recording());
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }
    Ok(())
}

/// Advance replica-side projectile visuals for one snapshot. Returns the
/// number of visuals that struck something.
fn mirror_projectiles(
    replica: &ArenaMatch,
    visuals: &mut VisualProjectiles,
    snapshot: &maze_arena::game::state::MatchSnapshot,
    rules: &MatchRules,
) -> usize {
    let poses: BTreeMap<PlayerId, EntityPose> = snapshot
        .entities
        .iter()
        .filter_map(|view| view.pose.map(|pose| (view.id, pose)))
        .collect();
    let scene = build_scene(replica, &poses, rules.vehicle_radius);
    visuals.spawn_all(&snapshot.projectile_spawns, &rules.weapon);
    visuals.advance_all(&scene, &rules.weapon).len()
}

fn log_events(events: &[maze_arena::game::events::GameEvent]) {
    for event in events {
        match &event.data {
            GameEventData::PlayerEliminated { victim_id, killer_id } => info!(
                "[tick {}] {} eliminated by {:?}",
                event.tick,
                hex::encode(&victim_id.0[..4]),
                killer_id.map(|k| hex::encode(&k.0[..4]))
            ),
            GameEventData::Respawned { player_id, lives, .. } => info!(
                "[tick {}] {} respawned, {} lives left",
                event.tick,
                hex::encode(&player_id.0[..4]),
                lives
            ),
            GameEventData::MatchEnded { .. } | GameEventData::PhaseChanged { .. } => {
                info!("[tick {}] {:?}", event.tick, event.data)
            }
            _ => {}
        }
    }
}

/// Real-time host: drivers join over the command queue, a subscriber
/// watches snapshots, and the host is shut down after a few seconds.
async fn hosted_match(config: &ServerConfig) -> anyhow::Result<()> {
    info!("=== Starting Hosted Match ===");

    let layout = ArenaGenerator::generate_from(&config.arena)?;
    let rules = config.rules.compile();
    let session = MatchSession::new(layout, rules, &config.vehicle, config.session.clone());
    let (host, handle) = AuthorityHost::new(session, config.tick_rate);
    let task = tokio::spawn(host.run());

    let mut messages = handle.subscribe();
    let watcher = tokio::spawn(async move {
        let mut snapshots = 0u32;
        while let Ok(message) = messages.recv().await {
            match message {
                ServerMessage::Snapshot(_) => snapshots += 1,
                ServerMessage::MatchEnded { .. } => break,
                ServerMessage::Events { .. } => {}
            }
        }
        snapshots
    });

    let players: Vec<PlayerId> = (0..rules.required_players).map(|_| PlayerId::random()).collect();
    for (i, id) in players.iter().enumerate() {
        info!("Live driver {} joins as {}", i + 1, id.to_uuid_string());
        handle
            .send(HostCommand::Join { player_id: *id, display_name: format!("Live {}", i + 1), peer: PeerId(i as u32) })
            .await?;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / config.tick_rate.max(1) as u64));
    for step in 0..(config.tick_rate * 3) {
        ticker.tick().await;
        for (i, id) in players.iter().enumerate() {
            if handle.send(HostCommand::Input { player_id: *id, frame: bot_input(i, step) }).await.is_err() {
                break;
            }
        }
    }

    handle.shutdown();
    let summary = task.await??;
    drop(handle);
    let snapshots = watcher.await?;

    info!(
        "Hosted match stopped: {} ticks, {} snapshots observed, finished {}, hash {}",
        summary.ticks,
        snapshots,
        summary.finished,
        hex::encode(summary.final_hash)
    );
    Ok(())
}
