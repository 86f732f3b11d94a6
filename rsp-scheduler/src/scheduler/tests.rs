/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::*;
use crate::board::RegisterGroup;
use crate::command::{CommandId, CommandKind};
use crate::sim::{SimHandle, SimulatedBoard};

// ── Test helpers ──────────────────────────────────────────────────────────────

struct Rig {
    sched: Scheduler,
    tx: UnboundedSender<BoardEvent>,
    rx: UnboundedReceiver<BoardEvent>,
    handles: Vec<SimHandle>,
    ids: Vec<BoardId>,
}

impl Rig {
    /// `online[i]` decides whether board `rsp{i}` starts reachable.
    fn new(config: SchedulerConfig, online: &[bool]) -> Self {
        let (tx, rx) = unbounded_channel();
        let mut rig = Rig {
            sched: Scheduler::new(config),
            tx,
            rx,
            handles: Vec::new(),
            ids: Vec::new(),
        };
        for (i, up) in online.iter().enumerate() {
            let handle = SimHandle::new(*up);
            let cfg = BoardConfig {
                name: format!("rsp{i}"),
                rcus: 4,
                subbands: 4,
            };
            let tx = rig.tx.clone();
            let h = handle.clone();
            let id = rig
                .sched
                .add_board(&cfg, move |id| SimulatedBoard::new(id, tx, h))
                .unwrap();
            rig.handles.push(handle);
            rig.ids.push(id);
        }
        rig.pump();
        rig
    }

    fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.sched.on_board_event(event).unwrap();
        }
    }

    fn tick(&mut self, sec: u64) {
        self.sched.on_tick(Timestamp::from_secs(sec)).unwrap();
    }

    /// Tick and deliver every board completion.
    fn cycle(&mut self, sec: u64) {
        self.tick(sec);
        self.pump();
    }

    fn acks_for(&mut self, id: u64) -> Vec<Ack> {
        self.sched
            .drain_acks()
            .into_iter()
            .filter(|a| a.command == CommandId(id))
            .collect()
    }
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        sync_interval_s: 1,
        scheduling_delay_s: 2,
        max_retries: 3,
        retry_backoff_s: 1,
        jitter_tolerance_us: 10_000,
        immediate_reads: true,
    }
}

fn set_rcu(id: u64, target: Target, control: u32) -> Command {
    Command::new(CommandId(id), CommandKind::SetRcu { mask: 0b1, control }, target)
}

fn rcu0(buf: &CacheBuffer, id: BoardId) -> u32 {
    buf.board(id).unwrap().rcu[0]
}

// ── Cycle basics ──────────────────────────────────────────────────────────────

#[test]
fn healthy_cycle_commits_once_every_board_is_done() {
    let mut rig = Rig::new(config(), &[true, true, true]);
    rig.tick(10);
    assert!(rig.sched.is_in_flight());
    assert!(!rig.sched.sync_has_completed());
    assert_eq!(rig.sched.front().timestamp, Timestamp::default());

    rig.pump();
    assert!(!rig.sched.is_in_flight());
    assert!(rig.sched.sync_has_completed());

    let front = rig.sched.front();
    assert_eq!(front.timestamp, Timestamp::from_secs(10));
    for id in &rig.ids {
        let regs = front.board(*id).unwrap();
        assert!(regs.versions.is_some());
        assert_eq!(regs.status.unwrap().read_at, Timestamp::from_secs(10));
    }
}

#[test]
fn scheduler_without_boards_commits_immediately() {
    let mut rig = Rig::new(config(), &[]);
    rig.tick(5);
    assert!(!rig.sched.is_in_flight());
    assert_eq!(rig.sched.front().timestamp, Timestamp::from_secs(5));
}

#[test]
fn tick_that_does_not_advance_is_ignored() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.on_tick(Timestamp::new(10, 2_000)).unwrap();
    assert_eq!(rig.sched.current_time(), Timestamp::from_secs(10));
    assert!(!rig.sched.is_in_flight());
}

#[test]
fn jittered_tick_is_rounded_to_its_second() {
    let mut rig = Rig::new(config(), &[true]);
    rig.sched.on_tick(Timestamp::new(10, 996_000)).unwrap();
    rig.pump();
    assert_eq!(rig.sched.current_time(), Timestamp::from_secs(11));
    assert_eq!(rig.sched.front().timestamp, Timestamp::from_secs(11));
}

#[test]
fn tick_timing_reports_jitter_and_missed_ticks() {
    let mut rig = Rig::new(config(), &[true]);

    rig.sched.on_tick(Timestamp::new(10, 20_000)).unwrap();
    rig.pump();
    let timing = rig.sched.last_timing();
    assert_eq!(timing.jitter_us, 20_000);
    assert!(timing.jitter_exceeded);
    assert_eq!(timing.missed_gap_s, None);

    rig.sched.on_tick(Timestamp::new(11, 4_000)).unwrap();
    rig.pump();
    let timing = rig.sched.last_timing();
    assert_eq!(timing.jitter_us, 4_000);
    assert!(!timing.jitter_exceeded);
    assert_eq!(timing.missed_gap_s, None);

    // early tick for second 13; second 12 never arrived
    rig.sched.on_tick(Timestamp::new(12, 995_000)).unwrap();
    rig.pump();
    let timing = rig.sched.last_timing();
    assert_eq!(timing.jitter_us, 5_000);
    assert!(!timing.jitter_exceeded);
    assert_eq!(timing.missed_gap_s, Some(2));
    assert_eq!(rig.sched.current_time(), Timestamp::from_secs(13));
}

// ── Admission ─────────────────────────────────────────────────────────────────

#[test]
fn admission_never_schedules_before_now_plus_delay() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);

    let b = Target::Board(rig.ids[0]);
    rig.sched
        .enter(set_rcu(1, b, 1).at(Timestamp::from_secs(5)), QueueKind::Later, false);
    rig.sched.enter(set_rcu(2, b, 2), QueueKind::Later, false);
    rig.sched
        .enter(set_rcu(3, b, 3).at(Timestamp::from_secs(20)), QueueKind::Later, false);

    assert_eq!(
        rig.sched.queued_times(),
        vec![
            Timestamp::from_secs(12),
            Timestamp::from_secs(12),
            Timestamp::from_secs(20)
        ]
    );
}

#[test]
fn late_read_is_executed_at_the_earliest_tick() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    // GetRcu is always resident, so give it a requested time to force queueing.
    let cmd = Command::new(CommandId(7), CommandKind::GetRcu, Target::All)
        .at(Timestamp::from_secs(9));
    rig.sched.enter(cmd, QueueKind::Later, true);

    rig.cycle(11);
    assert!(rig.acks_for(7).is_empty(), "must not run before now + delay");
    rig.cycle(12);
    let acks = rig.acks_for(7);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].timestamp, Timestamp::from_secs(12));
}

#[test]
fn writes_are_promoted_one_interval_ahead() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched
        .enter(set_rcu(1, Target::All, 5), QueueKind::Later, false);

    rig.tick(11);
    // applied to back in the cycle before its tick, visible after that commit
    assert_eq!(rcu0(rig.sched.cache().back(), rig.ids[0]), 5);
    assert_eq!(rcu0(&rig.sched.front(), rig.ids[0]), 0);
    rig.pump();
    assert_eq!(rcu0(&rig.sched.front(), rig.ids[0]), 5);
    assert!(!rig.sched.cache().is_pending(rig.ids[0], RegisterGroup::Rcu));
}

#[test]
fn resident_read_is_answered_without_queueing() {
    let mut rig = Rig::new(config(), &[true, true, true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = Command::new(CommandId(3), CommandKind::GetStatus, Target::All);
    rig.sched.enter(cmd, QueueKind::Later, true);

    assert_eq!(rig.sched.queued(), 0);
    assert_eq!(rig.sched.periodic_count(), 0);
    let acks = rig.acks_for(3);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].timestamp, Timestamp::from_secs(10));
    match &acks[0].outcome {
        AckOutcome::Completed(Response::Status(v)) => {
            assert_eq!(v.len(), 3);
            assert!(v.iter().all(|(_, s)| s.is_some()));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn read_that_is_not_resident_is_queued() {
    let mut rig = Rig::new(config(), &[true]);
    let cmd = Command::new(CommandId(3), CommandKind::GetStatus, Target::All);
    rig.sched.enter(cmd, QueueKind::Later, true);
    assert_eq!(rig.sched.queued(), 1);
    assert!(rig.sched.drain_acks().is_empty());
}

#[test]
fn immediate_reads_can_be_disabled() {
    let mut cfg = config();
    cfg.immediate_reads = false;
    let mut rig = Rig::new(cfg, &[true]);
    rig.cycle(10);
    rig.sched.enter(
        Command::new(CommandId(3), CommandKind::GetRcu, Target::All),
        QueueKind::Later,
        true,
    );
    assert_eq!(rig.sched.queued(), 1);
}

#[test]
fn immediate_write_updates_both_buffers_and_acks_synchronously() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    rig.sched.enter(set_rcu(4, Target::All, 9), QueueKind::Later, true);
    assert_eq!(rig.sched.queued(), 0);
    assert_eq!(rcu0(&rig.sched.front(), rig.ids[0]), 9);
    assert_eq!(rcu0(rig.sched.cache().back(), rig.ids[0]), 9);
    let acks = rig.acks_for(4);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Completed(Response::Written));

    // the board I/O still happens on the next cycle
    assert!(rig.sched.cache().is_pending(rig.ids[0], RegisterGroup::Rcu));
    rig.cycle(11);
    assert!(!rig.sched.cache().is_pending(rig.ids[0], RegisterGroup::Rcu));
}

#[test]
fn write_without_immediate_permission_is_queued() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.enter(set_rcu(4, Target::All, 9), QueueKind::Later, false);
    assert_eq!(rig.sched.queued(), 1);
    assert_eq!(rcu0(&rig.sched.front(), rig.ids[0]), 0);
}

#[test]
fn immediate_delayed_write_is_accepted_then_completed_after_round_trip() {
    let mut rig = Rig::new(config(), &[true, true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = Command::new(CommandId(5), CommandKind::SetClock { mhz: 160 }, Target::All);
    rig.sched.enter(cmd, QueueKind::Later, true);
    let acks = rig.acks_for(5);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Accepted);
    assert_eq!(rig.sched.front().clock_mhz, 160);

    rig.cycle(11); // pushes the clock, settles
    assert!(rig.acks_for(5).is_empty());
    rig.cycle(12);
    let acks = rig.acks_for(5);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Completed(Response::Written));
}

#[test]
fn immediate_delayed_write_during_a_cycle_completes_after_the_cycle_that_pushes_it() {
    // rsp1 is down, so every cycle stays in flight until the next tick.
    let mut rig = Rig::new(config(), &[true, false]);
    let a = rig.ids[0];
    rig.cycle(10);
    rig.cycle(11);
    assert!(rig.sched.is_in_flight());
    rig.sched.drain_acks();

    // rsp0 has already finished cycle 11, so the write misses that cycle.
    let cmd = Command::new(CommandId(5), CommandKind::SetClock { mhz: 160 }, Target::All);
    rig.sched.enter(cmd, QueueKind::Later, true);
    let acks = rig.acks_for(5);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Accepted);
    assert!(rig.sched.cache().is_pending(a, RegisterGroup::Clock));

    rig.cycle(12);
    assert!(!rig.sched.cache().is_pending(a, RegisterGroup::Clock));
    assert!(rig.acks_for(5).is_empty(), "cycle 12 is not committed yet");

    rig.tick(13);
    let acks = rig.acks_for(5);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Completed(Response::Written));
    assert_eq!(acks[0].timestamp, Timestamp::from_secs(12));
}

#[test]
fn periodic_queue_without_period_falls_back_to_one_shot() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.enter(set_rcu(1, Target::All, 1), QueueKind::Periodic, false);
    assert_eq!(rig.sched.periodic_count(), 0);
    assert_eq!(rig.sched.queued(), 1);
}

// ── Ordering ──────────────────────────────────────────────────────────────────

#[test]
fn same_tick_writes_resolve_to_the_last_admitted() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let t = Timestamp::from_secs(14);
    rig.sched.enter(set_rcu(1, Target::All, 111).at(t), QueueKind::Later, false);
    rig.sched.enter(set_rcu(2, Target::All, 222).at(t), QueueKind::Later, false);

    for sec in 11..=13 {
        rig.cycle(sec);
    }
    assert_eq!(rcu0(&rig.sched.front(), rig.ids[0]), 222);
    let order: Vec<_> = rig
        .sched
        .drain_acks()
        .into_iter()
        .map(|a| a.command)
        .collect();
    assert_eq!(order, vec![CommandId(1), CommandId(2)]);
}

// ── Periodic commands ─────────────────────────────────────────────────────────

#[test]
fn periodic_write_stays_on_its_grid_across_a_skipped_tick() {
    let mut rig = Rig::new(config(), &[true, true, true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = set_rcu(9, Target::All, 3).every(4);
    rig.sched.enter(cmd, QueueKind::Periodic, false);
    assert_eq!(rig.sched.periodic_times(), vec![Timestamp::from_secs(12)]);

    let mut executed_at = Vec::new();
    // tick 15 is skipped
    for sec in [11, 12, 13, 14, 16, 17, 18, 19, 20] {
        rig.cycle(sec);
        if !rig.acks_for(9).is_empty() {
            executed_at.push(sec);
        }
    }
    assert_eq!(executed_at, vec![11, 16, 19]);
    assert_eq!(rig.sched.periodic_times(), vec![Timestamp::from_secs(24)]);
    let offset = rig.sched.periodic_times()[0].sec - 12;
    assert_eq!(offset % 4, 0);
}

#[test]
fn periodic_read_runs_every_matching_tick() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = Command::new(CommandId(8), CommandKind::GetStatus, Target::All).every(2);
    rig.sched.enter(cmd, QueueKind::Periodic, true);

    let mut executed_at = Vec::new();
    for sec in 11..=18 {
        rig.cycle(sec);
        for ack in rig.acks_for(8) {
            executed_at.push(ack.timestamp.sec);
        }
    }
    assert_eq!(executed_at, vec![12, 14, 16, 18]);
}

#[test]
fn periodic_command_on_a_down_link_keeps_its_phase() {
    let mut rig = Rig::new(config(), &[true, true]);
    let b = rig.ids[1];
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = Command::new(CommandId(8), CommandKind::GetStatus, Target::Board(b)).every(4);
    rig.sched.enter(cmd, QueueKind::Periodic, true);
    assert_eq!(rig.sched.periodic_times(), vec![Timestamp::from_secs(12)]);

    let mut executed_at = Vec::new();
    for sec in 11..=21 {
        match sec {
            12 => rig.handles[1].set_online(false),
            13 => rig.handles[1].set_online(true),
            _ => {}
        }
        rig.cycle(sec);
        for ack in rig.acks_for(8) {
            executed_at.push(ack.timestamp.sec);
        }
    }
    assert_eq!(executed_at, vec![16, 20]);
    assert_eq!(rig.sched.periodic_times(), vec![Timestamp::from_secs(24)]);
}

#[test]
fn completion_is_idempotent() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();
    rig.sched
        .enter(set_rcu(1, Target::All, 1).every(3), QueueKind::Periodic, false);
    rig.sched.enter(set_rcu(2, Target::All, 2), QueueKind::Later, false);
    rig.cycle(11);
    assert_eq!(rig.sched.drain_acks().len(), 2);
    let times = rig.sched.periodic_times();

    rig.sched.complete_commands();
    rig.sched.complete_commands();
    assert!(rig.sched.drain_acks().is_empty());
    assert_eq!(rig.sched.periodic_times(), times);
}

#[test]
fn completion_is_deferred_while_the_cycle_is_in_flight() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    rig.sched.drain_acks();
    let cmd = Command::new(CommandId(4), CommandKind::GetRcu, Target::All)
        .at(Timestamp::from_secs(12));
    rig.sched.enter(cmd, QueueKind::Later, true);
    rig.cycle(11);

    rig.tick(12);
    assert!(rig.sched.is_in_flight());
    rig.sched.complete_commands();
    assert!(rig.sched.drain_acks().is_empty());

    rig.pump();
    let acks = rig.acks_for(4);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].timestamp, Timestamp::from_secs(12));
    assert!(matches!(acks[0].outcome, AckOutcome::Completed(Response::Rcu(_))));
}

// ── Delayed responses and postpone ────────────────────────────────────────────

#[test]
fn delayed_response_is_acknowledged_one_tick_after_the_round_trip() {
    let mut rig = Rig::new(config(), &[true, true]);
    rig.cycle(10);
    rig.sched.drain_acks();

    let cmd = Command::new(CommandId(6), CommandKind::SetClock { mhz: 160 }, Target::All);
    rig.sched.enter(cmd, QueueKind::Later, false);

    rig.tick(11);
    // mirrored into the committed image before the swap
    assert_eq!(rig.sched.front().clock_mhz, 160);
    rig.pump();
    assert!(rig.acks_for(6).is_empty());

    rig.cycle(12);
    let acks = rig.acks_for(6);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].timestamp, Timestamp::from_secs(12));
}

#[test]
fn clock_change_is_postponed_while_an_earlier_one_is_unpushed() {
    // rsp1 is down, so the first clock change never reaches every board.
    let mut rig = Rig::new(config(), &[true, false]);
    rig.cycle(10);

    rig.sched.enter(
        Command::new(CommandId(1), CommandKind::SetClock { mhz: 160 }, Target::All),
        QueueKind::Later,
        false,
    );
    rig.cycle(11);
    rig.cycle(12);
    rig.sched.enter(
        Command::new(CommandId(2), CommandKind::SetClock { mhz: 200 }, Target::All),
        QueueKind::Later,
        false,
    );
    assert_eq!(rig.sched.queued_times(), vec![Timestamp::from_secs(14)]);

    rig.cycle(13);
    assert_eq!(rig.sched.queued_times(), vec![Timestamp::from_secs(15)]);
    assert_eq!(rig.sched.front().clock_mhz, 160);
}

// ── Stalls and retries ────────────────────────────────────────────────────────

#[test]
fn stalled_board_is_reset_at_next_tick_and_others_commit() {
    let mut rig = Rig::new(config(), &[true, false, true]);
    let (a, b, c) = (rig.ids[0], rig.ids[1], rig.ids[2]);
    let opens_before = rig.handles[1].open_requests();

    rig.cycle(50);
    assert!(rig.sched.is_in_flight());
    assert!(!rig.sched.sync_has_completed());
    assert_eq!(rig.handles[1].open_requests(), opens_before + 1);
    // nothing committed while the cycle is in flight
    assert_eq!(rig.sched.front().timestamp, Timestamp::default());

    rig.tick(51);
    let committed = rig.sched.front();
    assert_eq!(committed.timestamp, Timestamp::from_secs(50));
    assert_eq!(
        committed.board(a).unwrap().status.unwrap().read_at,
        Timestamp::from_secs(50)
    );
    assert_eq!(
        committed.board(c).unwrap().status.unwrap().read_at,
        Timestamp::from_secs(50)
    );
    assert!(committed.board(b).unwrap().status.is_none());

    // the reset chain starts over and asks for the link again
    assert_eq!(rig.handles[1].open_requests(), opens_before + 2);
}

#[test]
fn board_recovers_after_coming_back_online() {
    let mut rig = Rig::new(config(), &[true, false]);
    rig.cycle(10);
    assert!(rig.sched.is_in_flight());

    rig.handles[1].set_online(true);
    rig.cycle(11);
    assert!(!rig.sched.is_in_flight());
    let front = rig.sched.front();
    assert_eq!(front.timestamp, Timestamp::from_secs(11));
    assert!(front.board(rig.ids[1]).unwrap().versions.is_some());
}

#[test]
fn command_for_a_board_that_never_comes_up_is_abandoned_after_max_retries() {
    let mut rig = Rig::new(config(), &[true, false]);
    rig.cycle(10);
    let b = rig.ids[1];
    rig.sched.enter(set_rcu(5, Target::Board(b), 1), QueueKind::Later, false);

    let mut outcomes = Vec::new();
    for sec in 11..=25 {
        rig.cycle(sec);
        for ack in rig.acks_for(5) {
            outcomes.push((sec, ack.outcome));
        }
    }
    assert_eq!(
        outcomes,
        vec![(14, AckOutcome::Abandoned { board: b, retries: 3 })]
    );
    assert_eq!(rig.sched.queued(), 0);
}

#[test]
fn command_for_unknown_board_is_dropped_at_execution() {
    let mut rig = Rig::new(config(), &[true]);
    rig.cycle(10);
    let ghost = BoardId(99);
    rig.sched.enter(
        set_rcu(4, Target::Board(ghost), 1).at(Timestamp::from_secs(12)),
        QueueKind::Later,
        false,
    );
    rig.cycle(11);
    let acks = rig.acks_for(4);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].outcome, AckOutcome::Dropped { board: ghost });
}

// ── Cancellation and board removal ────────────────────────────────────────────

#[test]
fn cancel_removes_every_queued_command_for_the_board() {
    let mut rig = Rig::new(config(), &[true, true]);
    rig.cycle(10);
    let (a, b) = (Target::Board(rig.ids[0]), Target::Board(rig.ids[1]));

    for i in 0..3 {
        rig.sched.enter(set_rcu(i, a, 1), QueueKind::Later, false);
    }
    rig.sched.enter(set_rcu(10, b, 1), QueueKind::Later, false);
    rig.sched.enter(set_rcu(11, Target::All, 1), QueueKind::Later, false);
    rig.sched.enter(set_rcu(12, a, 1).every(5), QueueKind::Periodic, false);

    assert_eq!(rig.sched.cancel(rig.ids[0]), 4);
    assert_eq!(rig.sched.queued(), 2);
    assert_eq!(rig.sched.periodic_count(), 0);
    assert_eq!(rig.sched.cancel(rig.ids[0]), 0);
}

#[test]
fn removing_the_stalled_board_commits_the_cycle() {
    let mut rig = Rig::new(config(), &[true, false]);
    rig.cycle(10);
    assert!(rig.sched.is_in_flight());

    rig.sched.remove_board(rig.ids[1]).unwrap();
    assert!(!rig.sched.is_in_flight());
    let front = rig.sched.front();
    assert_eq!(front.timestamp, Timestamp::from_secs(10));
    assert!(front.board(rig.ids[1]).is_none());

    // late replies or events for the removed board are harmless
    rig.sched.on_board_event(BoardEvent::Connected(rig.ids[1])).unwrap();
    assert!(matches!(
        rig.sched.remove_board(rig.ids[1]),
        Err(SchedulerError::UnknownBoard(_))
    ));
}

#[test]
fn registry_lists_boards_with_their_names() {
    let rig = Rig::new(config(), &[true, false]);
    assert_eq!(rig.sched.board_ids(), rig.ids);
    assert_eq!(rig.sched.board_name(rig.ids[1]), Some("rsp1"));
    assert_eq!(rig.sched.board_name(BoardId(42)), None);
    assert_eq!(rig.sched.config().max_retries, 3);
}

#[test]
fn duplicate_board_name_is_rejected() {
    let mut rig = Rig::new(config(), &[true]);
    let cfg = BoardConfig::default_config("rsp0");
    let tx = rig.tx.clone();
    let err = rig
        .sched
        .add_board(&cfg, move |id| SimulatedBoard::new(id, tx, SimHandle::new(true)))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateBoard(name) if name == "rsp0"));
}

// ── Buffer atomicity ──────────────────────────────────────────────────────────

#[test]
fn readers_never_observe_a_torn_image() {
    let mut cfg = config();
    cfg.scheduling_delay_s = 0;
    let mut rig = Rig::new(cfg, &[true, true, true]);

    let rx = rig.sched.subscribe();
    let stop = Arc::new(AtomicBool::new(false));
    let reader_stop = Arc::clone(&stop);

    let reader = std::thread::spawn(move || {
        let mut checked = 0usize;
        loop {
            let finished = reader_stop.load(Ordering::SeqCst);
            let snap = Arc::clone(&*rx.borrow());
            if snap.timestamp.sec >= 100 {
                let ts = snap.timestamp;
                for regs in snap.boards.values() {
                    assert_eq!(regs.status.map(|s| s.read_at), Some(ts));
                    assert_eq!(u64::from(regs.rcu[0]), ts.sec);
                }
                checked += 1;
            }
            if finished {
                return checked;
            }
        }
    });

    for sec in 100..400u64 {
        let control = u32::try_from(sec).unwrap();
        rig.sched.enter(
            set_rcu(sec, Target::All, control).at(Timestamp::from_secs(sec)),
            QueueKind::Later,
            false,
        );
        rig.cycle(sec);
        rig.sched.drain_acks();
    }
    stop.store(true, Ordering::SeqCst);

    let checked = reader.join().unwrap();
    assert!(checked > 0);
}
