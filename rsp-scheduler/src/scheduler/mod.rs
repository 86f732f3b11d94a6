/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Tick-driven command scheduler.
//!
//! [`Scheduler`] owns the command queues, the [`Cache`], and every board's
//! transport and [`SyncAction`] chain.  It runs entirely on the caller's
//! control thread: the event loop calls [`on_tick`](Scheduler::on_tick) once
//! per synchronisation interval and
//! [`on_board_event`](Scheduler::on_board_event) for every I/O completion.
//!
//! # One cycle
//! ```text
//! tick ─► previous cycle done? ──no──► reset stalled chains, commit
//!           │ yes
//!           ▼
//!         promote due commands ─► apply to back (+front) ─► Start each board's chain
//!                                                                   │
//!            board events ─► first incomplete action of that board ◄┘
//!                                                                   │
//!                        all boards done ─► swap buffers ─► acknowledge / re-stamp
//! ```
//!
//! # Ordering
//! Commands due in the same tick are applied in `(scheduled, insertion)`
//! order, one-shot queue first, then periodic commands.  Two writes to the
//! same register in one tick therefore resolve to the one queued last.
//!
//! # Example
//! ```rust,ignore
//! let mut sched = Scheduler::new(SchedulerConfig::default());
//! let id = sched.add_board(&board_cfg, |id| SimulatedBoard::new(id, tx.clone(), handle))?;
//! sched.enter(Command::new(CommandId(1), CommandKind::GetStatus, Target::All), QueueKind::Later, true);
//! sched.on_tick(Timestamp::now())?;
//! ```

pub mod error;
pub mod queue;

pub use error::SchedulerError;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::board::{BoardConnection, BoardEvent, BoardId, Target};
use crate::cache::{BoardRegisters, Cache, CacheBuffer};
use crate::command::{Ack, AckOutcome, Command, Operation, QueueKind, Response};
use crate::config::{BoardConfig, SchedulerConfig};
use crate::sync::{default_chain, Progress, SyncAction, SyncContext, SyncEvent};
use crate::time::{next_on_grid, Timestamp};

use queue::CommandQueue;

// ── Internal state types ──────────────────────────────────────────────────────

/// One registered board.
struct Board {
    name: String,
    connection: Box<dyn BoardConnection>,
    chain: Vec<SyncAction>,
    /// The chain has finished for the current cycle.
    done: bool,
}

/// A command promoted for execution in the current tick.
enum Executing {
    Once(Command),
    /// Key into the periodic table; the command itself stays registered.
    Periodic(u64),
}

/// A command executed in some cycle and waiting for its acknowledgment.
enum Finished {
    Once(Command),
    Periodic { key: u64, restamped: bool },
}

impl Finished {
    fn references(&self, id: BoardId) -> bool {
        match self {
            Finished::Once(cmd) => cmd.references(id),
            Finished::Periodic { .. } => false,
        }
    }
}

/// Timing diagnostics of the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTiming {
    /// Distance of the tick from its second boundary.
    pub jitter_us: u32,
    /// `jitter_us` is beyond the configured tolerance.
    pub jitter_exceeded: bool,
    /// Seconds since the previous tick when more than one interval passed.
    pub missed_gap_s: Option<u64>,
}

/// Outcome of checking a one-shot command's target before execution.
enum Readiness {
    Ready,
    Requeued,
    Resolved,
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Owns the command queues, the register cache and every registered board,
/// and runs one synchronisation cycle per tick.
///
/// All methods are meant to be called from one control thread.  Readers on
/// other threads use [`subscribe`](Self::subscribe).
pub struct Scheduler {
    config: SchedulerConfig,
    cache: Cache,

    boards: BTreeMap<BoardId, Board>,
    next_board: u32,

    /// One-shot commands, time-ordered.
    later: CommandQueue,
    /// Periodic commands by registration sequence.
    periodic: BTreeMap<u64, Command>,
    next_periodic: u64,

    /// Acknowledged at the next commit.
    done: Vec<Finished>,
    /// Moved into `done` at the next commit.
    delayed: Vec<Finished>,
    acks: Vec<Ack>,

    current_time: Timestamp,
    last_tick: Option<Timestamp>,
    timing: TickTiming,
    /// A sync cycle has started and not yet been committed.
    in_flight: bool,
    /// Tick whose completion handling already ran.
    completed_cycle: Option<Timestamp>,
}

impl Scheduler {
    /// A scheduler with no boards and empty queues, at time zero.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cache: Cache::new(),
            boards: BTreeMap::new(),
            next_board: 0,
            later: CommandQueue::new(),
            periodic: BTreeMap::new(),
            next_periodic: 0,
            done: Vec::new(),
            delayed: Vec::new(),
            acks: Vec::new(),
            current_time: Timestamp::default(),
            last_tick: None,
            timing: TickTiming::default(),
            in_flight: false,
            completed_cycle: None,
        }
    }

    // ── Board registry ────────────────────────────────────────────────────────

    /// Register a board.  `connect` builds its transport from the id the
    /// board has been given.
    ///
    /// A board added while a cycle is in flight joins from the next cycle.
    pub fn add_board<C, F>(&mut self, config: &BoardConfig, connect: F) -> Result<BoardId, SchedulerError>
    where
        C: BoardConnection + 'static,
        F: FnOnce(BoardId) -> C,
    {
        if self.boards.values().any(|b| b.name == config.name) {
            return Err(SchedulerError::DuplicateBoard(config.name.clone()));
        }
        let id = BoardId(self.next_board);
        self.next_board += 1;

        self.cache.add_board(
            id,
            BoardRegisters::new(config.name.clone(), config.rcus, config.subbands),
        );
        let mut connection: Box<dyn BoardConnection> = Box::new(connect(id));
        connection.open();
        self.boards.insert(
            id,
            Board {
                name: config.name.clone(),
                connection,
                chain: default_chain(),
                done: true,
            },
        );
        info!(board = %id, name = %config.name, rcus = config.rcus, "board registered");
        Ok(id)
    }

    /// Unregister a board, cancelling every queued command that addresses it.
    ///
    /// Returns the number of cancelled commands.
    pub fn remove_board(&mut self, id: BoardId) -> Result<usize, SchedulerError> {
        let board = self
            .boards
            .remove(&id)
            .ok_or(SchedulerError::UnknownBoard(id))?;
        let cancelled = self.cancel(id);
        self.cache.remove_board(id);
        info!(board = %id, name = %board.name, cancelled, "board removed");
        self.commit_if_synced();
        Ok(cancelled)
    }

    /// Ids of every registered board, in registration order.
    pub fn board_ids(&self) -> Vec<BoardId> {
        self.boards.keys().copied().collect()
    }

    /// Configured name of a registered board.
    pub fn board_name(&self, id: BoardId) -> Option<&str> {
        self.boards.get(&id).map(|b| b.name.as_str())
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// The timing and retry policy this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Both buffers and the pending-write state.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The last committed image.
    pub fn front(&self) -> Arc<CacheBuffer> {
        self.cache.snapshot()
    }

    /// Receiver updated with every committed image.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheBuffer>> {
        self.cache.subscribe()
    }

    /// Second of the tick currently being processed.
    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    /// One-shot commands waiting in the queue.
    pub fn queued(&self) -> usize {
        self.later.len()
    }

    /// Registered periodic commands.
    pub fn periodic_count(&self) -> usize {
        self.periodic.len()
    }

    /// Scheduled tick of every queued one-shot command, in queue order.
    pub fn queued_times(&self) -> Vec<Timestamp> {
        self.later.iter().map(|c| c.scheduled).collect()
    }

    /// Next scheduled tick of every periodic command, in registration order.
    pub fn periodic_times(&self) -> Vec<Timestamp> {
        self.periodic.values().map(|c| c.scheduled).collect()
    }

    /// Timing diagnostics of the last delivered tick.
    pub fn last_timing(&self) -> TickTiming {
        self.timing
    }

    /// A sync cycle has started and not been committed yet.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Take every acknowledgment produced so far, oldest first.
    pub fn drain_acks(&mut self) -> Vec<Ack> {
        std::mem::take(&mut self.acks)
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    /// Admit a command.
    ///
    /// * A non-periodic read with no requested time whose value is resident
    ///   in the committed image is answered at once.
    /// * A non-periodic write with no requested time is applied to both
    ///   buffers at once when `immediate_allowed`.  Without
    ///   `delayed_response` it gets one `Completed` acknowledgment right
    ///   away.  With `delayed_response` the caller gets two: `Accepted` right
    ///   away, then `Completed` at the commit after the first full cycle
    ///   that starts once the write is in the cache.
    /// * Anything else is stamped with `max(requested, now + delay)` and
    ///   queued.  A requested time that is already too close is logged as
    ///   late, never rejected.
    ///
    /// The target board is not checked here.
    pub fn enter(&mut self, mut command: Command, queue: QueueKind, immediate_allowed: bool) {
        let now = self.current_time;
        let queue = match (queue, command.is_periodic()) {
            (QueueKind::Periodic, false) => {
                warn!(command = %command.id, "periodic queue requested without a period, queued once");
                QueueKind::Later
            }
            (q, _) => q,
        };

        if queue == QueueKind::Later && command.requested.is_none() && !command.is_periodic() {
            if self.try_immediate(&mut command, immediate_allowed) {
                return;
            }
        }

        let earliest = now.add_secs(self.config.scheduling_delay_s);
        command.scheduled = match command.requested {
            None => earliest,
            Some(t) if t < earliest => {
                warn!(
                    command = %command.id,
                    requested = %t,
                    earliest = %earliest,
                    lateness_s = t.secs_before(earliest),
                    "command admitted late, moved to earliest executable tick"
                );
                earliest
            }
            Some(t) => t,
        };

        debug!(
            command = %command.id,
            kind = ?command.kind,
            scheduled = %command.scheduled,
            period = command.period,
            "command queued"
        );
        match queue {
            QueueKind::Later => self.later.push(command),
            QueueKind::Periodic => {
                let key = self.next_periodic;
                self.next_periodic += 1;
                self.periodic.insert(key, command);
            }
        }
    }

    /// Returns `true` when the command was fully handled without queueing.
    fn try_immediate(&mut self, command: &mut Command, immediate_allowed: bool) -> bool {
        let now = self.current_time;
        match command.operation() {
            Operation::Read => {
                let front = self.cache.front();
                if !self.config.immediate_reads
                    || !front.is_resident(command.kind.group(), command.target)
                {
                    return false;
                }
                let ack = Ack {
                    command: command.id,
                    timestamp: front.timestamp,
                    outcome: AckOutcome::Completed(command.kind.response(front, command.target)),
                };
                debug!(command = %command.id, "read answered from cache");
                self.acks.push(ack);
                true
            }
            Operation::Write => {
                if !immediate_allowed {
                    return false;
                }
                command.apply_immediate(&mut self.cache, now);
                if command.delayed_response {
                    self.acks.push(Ack {
                        command: command.id,
                        timestamp: now,
                        outcome: AckOutcome::Accepted,
                    });
                    debug!(command = %command.id, "immediate write accepted, final ack after round trip");
                    self.delayed.push(Finished::Once(command.clone()));
                } else {
                    self.acks.push(Ack {
                        command: command.id,
                        timestamp: now,
                        outcome: AckOutcome::Completed(Response::Written),
                    });
                    debug!(command = %command.id, "write applied immediately");
                }
                true
            }
        }
    }

    /// Remove every command addressing `id` from the queues and from the
    /// not-yet-acknowledged sets.  Returns the number removed.
    pub fn cancel(&mut self, id: BoardId) -> usize {
        let mut removed = self.later.remove_where(|c| c.references(id));

        let before = self.periodic.len();
        self.periodic.retain(|_, c| !c.references(id));
        removed += before - self.periodic.len();

        let before = self.done.len() + self.delayed.len();
        self.done.retain(|f| !f.references(id));
        self.delayed.retain(|f| !f.references(id));
        removed += before - (self.done.len() + self.delayed.len());

        if removed > 0 {
            info!(board = %id, removed, "commands cancelled");
        }
        removed
    }

    // ── Tick handling ─────────────────────────────────────────────────────────

    /// Run one cycle for the tick delivered at `tick`.
    ///
    /// # Errors
    /// Only [`SchedulerError::NoTransition`], which is a logic error.
    pub fn on_tick(&mut self, tick: Timestamp) -> Result<(), SchedulerError> {
        let now = tick.round_to_sec();
        self.timing = self.check_timing(tick, now);
        if self.last_tick.is_some() && now <= self.current_time {
            warn!(tick = %tick, current = %self.current_time, "tick did not advance, ignored");
            return Ok(());
        }

        if self.in_flight {
            if !self.sync_has_completed() {
                self.recover_stalled_cycle();
            }
            self.commit();
        }

        self.current_time = now;
        self.last_tick = Some(tick);
        self.cache.back_mut().timestamp = now;

        let executing = self.schedule_commands();
        self.process_commands(executing);
        self.start_sync()
    }

    /// Deliver an I/O completion from the event loop.
    ///
    /// # Errors
    /// Only [`SchedulerError::NoTransition`], which is a logic error.
    pub fn on_board_event(&mut self, event: BoardEvent) -> Result<(), SchedulerError> {
        let id = event.board();
        match event {
            BoardEvent::Connected(_) => {
                info!(board = %id, "board link up");
                if self.in_flight {
                    self.dispatch(id, SyncEvent::Connected)?;
                }
            }
            BoardEvent::Disconnected(_) => {
                warn!(board = %id, "board link lost");
            }
            BoardEvent::Reply(_, reply) => {
                if !self.in_flight {
                    debug!(board = %id, group = %reply.group(), "reply outside a cycle ignored");
                    return Ok(());
                }
                self.dispatch(id, SyncEvent::Reply(reply))?;
            }
        }
        self.commit_if_synced();
        Ok(())
    }

    /// True iff every known board has finished its chain for this cycle.
    pub fn sync_has_completed(&self) -> bool {
        self.boards.values().all(|b| b.done)
    }

    fn check_timing(&self, tick: Timestamp, now: Timestamp) -> TickTiming {
        let jitter = tick.jitter_us();
        let mut timing = TickTiming {
            jitter_us: jitter,
            jitter_exceeded: jitter > self.config.jitter_tolerance_us,
            missed_gap_s: None,
        };
        if timing.jitter_exceeded {
            warn!(
                tick = %tick,
                jitter_us = jitter,
                tolerance_us = self.config.jitter_tolerance_us,
                "tick deviates from the second boundary"
            );
        }
        if let Some(last) = self.last_tick {
            let gap = last.round_to_sec().secs_before(now);
            if gap > self.config.sync_interval_s {
                warn!(
                    gap_s = gap,
                    interval_s = self.config.sync_interval_s,
                    "ticks missed"
                );
                timing.missed_gap_s = Some(gap);
            }
        }
        timing
    }

    // ── Promotion and execution ───────────────────────────────────────────────

    /// Collect the commands due in this tick.
    ///
    /// Reads are due at their scheduled tick; writes one interval earlier so
    /// that they reach the hardware by their scheduled tick.
    fn schedule_commands(&mut self) -> Vec<Executing> {
        let now = self.current_time;
        let write_horizon = now.add_secs(self.config.sync_interval_s);
        let due = move |c: &Command| match c.operation() {
            Operation::Read => c.scheduled <= now,
            Operation::Write => c.scheduled <= write_horizon,
        };

        let mut executing = Vec::new();
        for cmd in self.later.drain_due(write_horizon, due) {
            let horizon = match cmd.operation() {
                Operation::Read => now,
                Operation::Write => write_horizon,
            };
            let lateness = cmd.scheduled.secs_before(horizon);
            if lateness > 0 && cmd.retry_count == 0 {
                warn!(
                    command = %cmd.id,
                    scheduled = %cmd.scheduled,
                    lateness_s = lateness,
                    "command executed late"
                );
            }
            executing.push(Executing::Once(cmd));
        }

        let mut periodic: Vec<(Timestamp, u64)> = self
            .periodic
            .iter()
            .filter(|&(_, c)| due(c))
            .map(|(k, c)| (c.scheduled, *k))
            .collect();
        periodic.sort_unstable();
        executing.extend(periodic.into_iter().map(|(_, k)| Executing::Periodic(k)));

        debug!(now = %now, due = executing.len(), "commands promoted");
        executing
    }

    /// Apply every promoted command to the cache, in promotion order.
    fn process_commands(&mut self, executing: Vec<Executing>) {
        let now = self.current_time;
        let interval = self.config.sync_interval_s;

        for item in executing {
            match item {
                Executing::Once(mut cmd) => {
                    match self.check_target(&mut cmd) {
                        Readiness::Ready => {}
                        Readiness::Requeued => {
                            self.later.push(cmd);
                            continue;
                        }
                        Readiness::Resolved => continue,
                    }
                    cmd.apply_back(&mut self.cache, now);
                    cmd.apply_front(&mut self.cache);
                    if cmd.postpone_requested {
                        cmd.scheduled = cmd.scheduled.max(now).add_secs(interval);
                        debug!(command = %cmd.id, scheduled = %cmd.scheduled, "command postponed");
                        self.later.push(cmd);
                    } else if cmd.delayed_response {
                        self.delayed.push(Finished::Once(cmd));
                    } else {
                        self.done.push(Finished::Once(cmd));
                    }
                }

                Executing::Periodic(key) => {
                    let Some(cmd) = self.periodic.get_mut(&key) else {
                        continue;
                    };
                    if let Some(id) = cmd.board() {
                        match self.boards.get(&id) {
                            None => {
                                warn!(command = %cmd.id, board = %id, "periodic command targets unknown board, dropped");
                                self.acks.push(Ack {
                                    command: cmd.id,
                                    timestamp: now,
                                    outcome: AckOutcome::Dropped { board: id },
                                });
                                self.periodic.remove(&key);
                                continue;
                            }
                            Some(board) if !board.connection.is_open() => {
                                debug!(command = %cmd.id, board = %id, "link down, periodic command skipped this tick");
                                Self::restamp(cmd, now);
                                continue;
                            }
                            Some(_) => {}
                        }
                    }
                    cmd.apply_back(&mut self.cache, now);
                    cmd.apply_front(&mut self.cache);
                    if cmd.postpone_requested {
                        debug!(command = %cmd.id, "periodic command postponed");
                        continue;
                    }
                    let finished = Finished::Periodic {
                        key,
                        restamped: false,
                    };
                    if cmd.delayed_response {
                        self.delayed.push(finished);
                    } else {
                        self.done.push(finished);
                    }
                }
            }
        }
    }

    /// Resolve the target of a one-shot command addressing a single board.
    ///
    /// Unknown boards drop the command.  A link that is down reschedules it
    /// after the backoff, until the retry budget is spent.
    fn check_target(&mut self, cmd: &mut Command) -> Readiness {
        let Target::Board(id) = cmd.target else {
            return Readiness::Ready;
        };
        let now = self.current_time;
        match self.boards.get(&id) {
            None => {
                warn!(command = %cmd.id, board = %id, "command targets unknown board, dropped");
                self.acks.push(Ack {
                    command: cmd.id,
                    timestamp: now,
                    outcome: AckOutcome::Dropped { board: id },
                });
                Readiness::Resolved
            }
            Some(board) if board.connection.is_open() => Readiness::Ready,
            Some(board) => {
                if cmd.retry_count >= self.config.max_retries {
                    error!(
                        command = %cmd.id,
                        board = %id,
                        name = %board.name,
                        retries = cmd.retry_count,
                        last_attempt = ?cmd.retry_deadline,
                        "board link never came up, command abandoned"
                    );
                    self.acks.push(Ack {
                        command: cmd.id,
                        timestamp: now,
                        outcome: AckOutcome::Abandoned {
                            board: id,
                            retries: cmd.retry_count,
                        },
                    });
                    return Readiness::Resolved;
                }
                cmd.retry_count += 1;
                let deadline = now.add_secs(self.config.retry_backoff_s);
                cmd.retry_deadline = Some(deadline);
                cmd.scheduled = deadline;
                warn!(
                    command = %cmd.id,
                    board = %id,
                    name = %board.name,
                    retry = cmd.retry_count,
                    max_retries = self.config.max_retries,
                    next = %deadline,
                    "board link not ready, command retried later"
                );
                Readiness::Requeued
            }
        }
    }

    // ── Synchronisation ───────────────────────────────────────────────────────

    fn start_sync(&mut self) -> Result<(), SchedulerError> {
        self.in_flight = true;
        for board in self.boards.values_mut() {
            board.done = false;
            for action in board.chain.iter_mut() {
                action.set_completed(false);
            }
        }
        debug!(now = %self.current_time, boards = self.boards.len(), "sync cycle started");

        let ids: Vec<BoardId> = self.boards.keys().copied().collect();
        for id in ids {
            self.dispatch(id, SyncEvent::Start)?;
        }
        self.commit_if_synced();
        Ok(())
    }

    /// Feed `event` to the first incomplete action of board `id`, continuing
    /// down the chain with `Start` for as long as actions complete.
    fn dispatch(&mut self, id: BoardId, event: SyncEvent) -> Result<(), SchedulerError> {
        let Some(board) = self.boards.get_mut(&id) else {
            debug!(board = %id, "event for unknown board ignored");
            return Ok(());
        };
        if board.done {
            debug!(board = %id, event = %event, "event after chain completion ignored");
            return Ok(());
        }

        let mut event = event;
        loop {
            let Some(action) = board.chain.iter_mut().find(|a| !a.is_completed()) else {
                board.done = true;
                debug!(board = %id, name = %board.name, "board sync completed");
                return Ok(());
            };
            let mut ctx = SyncContext {
                board: id,
                connection: &mut *board.connection,
                cache: &mut self.cache,
                now: self.current_time,
            };
            match action.handle(&event, &mut ctx)? {
                Progress::Pending => return Ok(()),
                Progress::Done => {
                    action.set_completed(true);
                    event = SyncEvent::Start;
                }
            }
        }
    }

    /// Reset every chain that did not finish, so the cycle can be committed
    /// without it.
    fn recover_stalled_cycle(&mut self) {
        for (id, board) in self.boards.iter_mut().filter(|(_, b)| !b.done) {
            error!(
                board = %id,
                name = %board.name,
                cycle = %self.current_time,
                "sync cycle stalled, resetting board chain, its contribution is lost"
            );
            for action in board.chain.iter_mut() {
                action.reset();
            }
            board.done = true;
        }
    }

    fn commit_if_synced(&mut self) {
        if self.in_flight && self.sync_has_completed() {
            self.commit();
        }
    }

    fn commit(&mut self) {
        self.in_flight = false;
        self.cache.swap_buffers();
        self.complete_commands();
    }

    // ── Completion ────────────────────────────────────────────────────────────

    /// Acknowledge the commands executed in the committed cycle, re-stamp
    /// periodic ones, and move delayed responses up for the next commit.
    ///
    /// Running it again for the same cycle does nothing, and neither does
    /// running it while the cycle is still in flight: acknowledgments are
    /// only ever built from a committed image.
    pub fn complete_commands(&mut self) {
        if self.in_flight {
            debug!(now = %self.current_time, "cycle still in flight, completion deferred to its commit");
            return;
        }
        if self.completed_cycle == Some(self.current_time) {
            return;
        }
        self.completed_cycle = Some(self.current_time);

        let now = self.current_time;
        let front = self.cache.snapshot();

        for finished in std::mem::take(&mut self.done) {
            match finished {
                Finished::Once(cmd) => {
                    self.acks.push(Ack {
                        command: cmd.id,
                        timestamp: front.timestamp,
                        outcome: AckOutcome::Completed(cmd.kind.response(&front, cmd.target)),
                    });
                }
                Finished::Periodic { key, restamped } => {
                    let Some(cmd) = self.periodic.get_mut(&key) else {
                        continue;
                    };
                    self.acks.push(Ack {
                        command: cmd.id,
                        timestamp: front.timestamp,
                        outcome: AckOutcome::Completed(cmd.kind.response(&front, cmd.target)),
                    });
                    if !restamped {
                        Self::restamp(cmd, now);
                    }
                }
            }
        }

        // Delayed periodic commands are re-stamped now so they are not
        // promoted again while their acknowledgment is pending.
        for finished in self.delayed.iter_mut() {
            if let Finished::Periodic { key, restamped } = finished {
                if let Some(cmd) = self.periodic.get_mut(&*key) {
                    Self::restamp(cmd, now);
                }
                *restamped = true;
            }
        }
        self.done.append(&mut self.delayed);
    }

    fn restamp(cmd: &mut Command, now: Timestamp) {
        let next = next_on_grid(cmd.scheduled, now, cmd.period);
        debug!(command = %cmd.id, previous = %cmd.scheduled, next = %next, "periodic command re-stamped");
        cmd.scheduled = next;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests;
