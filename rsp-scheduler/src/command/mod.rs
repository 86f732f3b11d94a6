/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Register commands and their acknowledgments.
//!
//! A [`Command`] is created by application logic, moved into the scheduler by
//! [`Scheduler::enter`](crate::scheduler::Scheduler::enter), and either
//! consumed on completion (one-shot) or re-stamped and kept (periodic).
//!
//! # Lifecycle
//! ```text
//!  enter ──► later / periodic queue ──promote──► executing ──apply──► done ──commit──► Ack
//!                  ▲                                  │                  ▲
//!                  └──────── postpone (+1 tick) ◄─────┘   delayed ───────┘ (one tick later)
//! ```

pub mod kind;

pub use kind::{CommandKind, Response};

use std::fmt;

use crate::board::{BoardId, Target};
use crate::cache::Cache;
use crate::time::Timestamp;

// ── Small enums ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Destination queue for [`Scheduler::enter`](crate::scheduler::Scheduler::enter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// One-shot, executed at (or after) its scheduled tick.
    Later,
    /// Recurring every `period` seconds on the grid of its first tick.
    Periodic,
}

/// Caller-chosen identifier echoed in every [`Ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// One register operation plus its scheduling bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub kind: CommandKind,
    pub target: Target,

    /// Tick at which the effect should land.  `None` means "as soon as
    /// possible".
    pub requested: Option<Timestamp>,

    /// Effective tick, set on admission and updated on postpone, retry and
    /// periodic re-stamping.
    pub scheduled: Timestamp,

    /// `0` for one-shot, otherwise the repeat interval in seconds.
    pub period: u64,

    /// Execution attempts that found the target link down.
    pub retry_count: u32,
    /// Tick of the next attempt after a retry.  The queue key is
    /// `scheduled`; this is kept for diagnostics and reported on
    /// abandonment.
    pub retry_deadline: Option<Timestamp>,

    /// Set by the command's own apply step when it cannot take effect this
    /// tick.
    pub postpone_requested: bool,

    /// Acknowledge one tick after the board round trip instead of at the
    /// commit that executed the command.
    pub delayed_response: bool,
}

impl Command {
    pub fn new(id: CommandId, kind: CommandKind, target: Target) -> Self {
        let delayed_response = kind.default_delayed_response();
        Self {
            id,
            kind,
            target,
            requested: None,
            scheduled: Timestamp::default(),
            period: 0,
            retry_count: 0,
            retry_deadline: None,
            postpone_requested: false,
            delayed_response,
        }
    }

    /// Request a specific execution tick.
    pub fn at(mut self, when: Timestamp) -> Self {
        self.requested = Some(when);
        self
    }

    /// Repeat every `period` seconds.
    pub fn every(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_delayed_response(mut self, delayed: bool) -> Self {
        self.delayed_response = delayed;
        self
    }

    pub fn operation(&self) -> Operation {
        self.kind.operation()
    }

    pub fn is_periodic(&self) -> bool {
        self.period > 0
    }

    /// The single board this command addresses, if any.
    pub fn board(&self) -> Option<BoardId> {
        match self.target {
            Target::All => None,
            Target::Board(id) => Some(id),
        }
    }

    pub fn references(&self, id: BoardId) -> bool {
        self.board() == Some(id)
    }

    // ── Effects ───────────────────────────────────────────────────────────────

    /// Apply the effect to the back buffer for the cycle at `now`.
    ///
    /// Sets [`postpone_requested`](Self::postpone_requested) instead of
    /// applying when the effect cannot land this tick.
    pub(crate) fn apply_back(&mut self, cache: &mut Cache, now: Timestamp) {
        self.postpone_requested = false;
        if let CommandKind::SetClock { .. } = self.kind {
            if cache.clock_change_in_flight(now) {
                self.postpone_requested = true;
                return;
            }
        }
        self.kind.write_registers(cache.back_mut(), self.target);
        if self.operation() == Operation::Write {
            cache.mark_pending(self.kind.group(), self.target, now);
        }
    }

    /// Mirror the effect into the committed image for kinds that need
    /// instant visibility.  Postponed commands leave it untouched.
    pub(crate) fn apply_front(&self, cache: &mut Cache) {
        if self.postpone_requested || !self.kind.mirrors_front() {
            return;
        }
        self.kind.write_registers(cache.front_mut(), self.target);
    }

    /// Apply a write to both buffers outside the tick cycle.  The group is
    /// still marked pending, so the next cycle pushes it to the boards.
    pub(crate) fn apply_immediate(&self, cache: &mut Cache, now: Timestamp) {
        self.kind.write_registers(cache.back_mut(), self.target);
        self.kind.write_registers(cache.front_mut(), self.target);
        cache.mark_pending(self.kind.group(), self.target, now);
    }
}

// ── Acknowledgments ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The command took effect; reads carry the committed values.
    Completed(Response),
    /// An immediate write was applied; a `Completed` ack follows once the
    /// board round trip has settled.
    Accepted,
    /// The addressed board is no longer known.
    Dropped { board: BoardId },
    /// The addressed board never came up within the retry budget.
    Abandoned { board: BoardId, retries: u32 },
}

/// Answer to a command, produced in the order the scheduler resolved them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub command: CommandId,
    /// Tick the acknowledgment refers to.
    pub timestamp: Timestamp,
    pub outcome: AckOutcome,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
