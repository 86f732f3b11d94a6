/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use rsp_scheduler::board::Target;
use rsp_scheduler::command::{Ack, AckOutcome, Command, CommandId, CommandKind, QueueKind};
use rsp_scheduler::config::ConfigManager;
use rsp_scheduler::scheduler::{Scheduler, SchedulerError};
use rsp_scheduler::sim::{SimHandle, SimulatedBoard};
use rsp_scheduler::time::Timestamp;

// ── CLI argument definition ───────────────────────────────────────────────────

/// RSP register scheduler running against simulated boards.
///
/// Example:
///   rsp-scheduler -c config/boards.yaml --ticks 30 --offline rsp1
#[derive(Debug, Parser)]
#[command(
    name = "rsp-scheduler",
    about = "Tick-driven register scheduler for RSP boards",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scheduler and board configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Stop after this many ticks (0 runs until Ctrl-C).
    #[arg(short = 't', long = "ticks", default_value_t = 0)]
    ticks: u64,

    /// Period, in seconds, of the status poll registered at start-up.
    #[arg(short = 's', long = "status-period", default_value_t = 5)]
    status_period: u64,

    /// Simulate the named board as disconnected.  May be repeated.
    #[arg(short = 'o', long = "offline")]
    offline: Vec<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn log_ack(ack: &Ack) {
    match &ack.outcome {
        AckOutcome::Completed(response) => {
            info!(command = %ack.command, at = %ack.timestamp, ?response, "command completed")
        }
        AckOutcome::Accepted => info!(command = %ack.command, at = %ack.timestamp, "command accepted"),
        AckOutcome::Dropped { board } => {
            warn!(command = %ack.command, board = %board, "command dropped")
        }
        AckOutcome::Abandoned { board, retries } => {
            error!(command = %ack.command, board = %board, retries, "command abandoned")
        }
    }
}

fn report(e: SchedulerError) {
    if e.is_fatal() {
        error!("Scheduler failed: {}", e);
        process::exit(1);
    }
    warn!("{}", e);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("RSP scheduler starting up...");

    let cli = Cli::parse();
    info!(
        config        = ?cli.config,
        ticks         = cli.ticks,
        status_period = cli.status_period,
        offline       = ?cli.offline,
        "Configuration"
    );

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config_manager = ConfigManager::new();
    match &cli.config {
        Some(path) => {
            if let Err(e) = config_manager.load_from_file(path) {
                error!("Failed to load configuration: {:#}", e);
                process::exit(1);
            }
        }
        None => warn!("No configuration file provided, using default settings"),
    }
    for name in &cli.offline {
        if config_manager.get_board(name).is_none() {
            warn!("--offline names unknown board '{}'", name);
        }
    }

    // ── Register boards ───────────────────────────────────────────────────────
    let (tx, mut rx) = unbounded_channel();
    let mut scheduler = Scheduler::new(config_manager.scheduler().clone());
    for board in config_manager.boards() {
        let handle = SimHandle::new(!cli.offline.contains(&board.name));
        let events = tx.clone();
        if let Err(e) = scheduler.add_board(board, move |id| SimulatedBoard::new(id, events, handle)) {
            error!("Failed to register board: {}", e);
            process::exit(1);
        }
    }

    for id in scheduler.board_ids() {
        info!(board = %id, name = scheduler.board_name(id).unwrap_or("?"), "Board ready");
    }

    // ── Event loop ────────────────────────────────────────────────────────────
    let period = Duration::from_secs(scheduler.config().sync_interval_s);
    let wait = Duration::from_micros(u64::from(1_000_000 - Timestamp::now().usec));
    let mut ticker = interval_at(Instant::now() + wait, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = scheduler.on_tick(Timestamp::now()) {
                    report(e);
                }
                ticks += 1;
                if ticks == 1 {
                    let poll = Command::new(CommandId(0), CommandKind::GetStatus, Target::All)
                        .every(cli.status_period.max(1));
                    scheduler.enter(poll, QueueKind::Periodic, true);
                }
                if cli.ticks != 0 && ticks >= cli.ticks {
                    for ack in scheduler.drain_acks() {
                        log_ack(&ack);
                    }
                    info!(ticks, "Tick limit reached");
                    break;
                }
            }
            Some(event) = rx.recv() => {
                if let Err(e) = scheduler.on_board_event(event) {
                    report(e);
                }
            }
            _ = &mut shutdown => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
        for ack in scheduler.drain_acks() {
            log_ack(&ack);
        }
    }

    let front = scheduler.front();
    info!(
        committed = %front.timestamp,
        clock_mhz = front.clock_mhz,
        boards = front.boards.len(),
        "RSP scheduler stopped"
    );
}
