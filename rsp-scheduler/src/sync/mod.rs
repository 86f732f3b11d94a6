/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-board register I/O state machines.
//!
//! Each board owns an ordered chain of [`SyncAction`]s.  On every cycle the
//! scheduler clears the `completed` flags and feeds a [`SyncEvent::Start`] to
//! the first action; afterwards every event for that board goes to the first
//! action that has not completed yet.
//!
//! ```text
//!            Start/Connected (link down)            Start/Connected (link up)
//!   Idle ───────────────────────────────► Linking ─────────────────────────► Waiting(request)
//!    │                                                                            │
//!    │ nothing to do                                               matching Reply │
//!    ▼                                                                            ▼
//!   Done ◄─────────────────────────────────────────────────────────────────────── Idle
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::board::{BoardConnection, BoardId, RegisterGroup, RegisterReply, RegisterRequest};
use crate::cache::Cache;
use crate::scheduler::SchedulerError;
use crate::time::Timestamp;

// ── Events and results ────────────────────────────────────────────────────────

/// Input to a sync action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Begin work: sent at the start of a cycle and by a predecessor that has
    /// just completed.
    Start,
    /// The board link came up.
    Connected,
    Reply(RegisterReply),
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Start => f.write_str("start"),
            SyncEvent::Connected => f.write_str("connected"),
            SyncEvent::Reply(r) => write!(f, "reply({})", r.group()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for another event before this action can finish.
    Pending,
    Done,
}

/// Everything an action may touch while handling one event.
pub struct SyncContext<'a> {
    pub board: BoardId,
    pub connection: &'a mut dyn BoardConnection,
    pub cache: &'a mut Cache,
    pub now: Timestamp,
}

// ── SyncAction ────────────────────────────────────────────────────────────────

/// Which register group an action synchronises, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Read once, until resident.
    Versions,
    /// Read every cycle.
    Status,
    /// Write when pending.
    Clock,
    Rcu,
    Subbands,
}

impl SyncKind {
    fn group(self) -> RegisterGroup {
        match self {
            SyncKind::Versions => RegisterGroup::Versions,
            SyncKind::Status => RegisterGroup::Status,
            SyncKind::Clock => RegisterGroup::Clock,
            SyncKind::Rcu => RegisterGroup::Rcu,
            SyncKind::Subbands => RegisterGroup::Subbands,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncState {
    Idle,
    /// An open request was issued; waiting for `Connected`.
    Linking,
    Waiting(RegisterRequest),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => f.write_str("idle"),
            SyncState::Linking => f.write_str("linking"),
            SyncState::Waiting(req) => write!(f, "waiting({})", req.group()),
        }
    }
}

/// One step of a board's per-cycle register I/O.
#[derive(Debug, Clone)]
pub struct SyncAction {
    kind: SyncKind,
    state: SyncState,
    completed: bool,
}

/// The chain every board runs on each cycle.
pub fn default_chain() -> Vec<SyncAction> {
    [
        SyncKind::Versions,
        SyncKind::Status,
        SyncKind::Clock,
        SyncKind::Rcu,
        SyncKind::Subbands,
    ]
    .into_iter()
    .map(SyncAction::new)
    .collect()
}

impl SyncAction {
    pub fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            state: SyncState::Idle,
            completed: false,
        }
    }

    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    pub fn is_idle(&self) -> bool {
        self.state == SyncState::Idle
    }

    /// Return to idle and drop any outstanding request.
    pub fn reset(&mut self) {
        self.state = SyncState::Idle;
        self.completed = false;
    }

    /// Consume one event.
    ///
    /// # Errors
    /// [`SchedulerError::NoTransition`] for an event the current state has no
    /// defined outcome for.  This is a logic error in the caller, not a
    /// hardware condition.
    pub fn handle(
        &mut self,
        event: &SyncEvent,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Progress, SchedulerError> {
        match (&self.state, event) {
            (SyncState::Idle | SyncState::Linking, SyncEvent::Start | SyncEvent::Connected) => {
                Ok(self.begin(ctx))
            }

            (SyncState::Idle | SyncState::Linking, SyncEvent::Reply(reply)) => {
                debug!(
                    board = %ctx.board,
                    group = %reply.group(),
                    "stale reply ignored"
                );
                Ok(Progress::Pending)
            }

            (SyncState::Waiting(_), SyncEvent::Connected) => Ok(Progress::Pending),

            (SyncState::Waiting(sent), SyncEvent::Reply(reply)) => {
                if reply.group() != sent.group() {
                    debug!(
                        board = %ctx.board,
                        expected = %sent.group(),
                        got = %reply.group(),
                        "reply for another group ignored"
                    );
                    return Ok(Progress::Pending);
                }
                let sent = sent.clone();
                self.state = SyncState::Idle;
                Self::store(&sent, reply, ctx);
                Ok(Progress::Done)
            }

            (SyncState::Waiting(_), SyncEvent::Start) => Err(SchedulerError::NoTransition {
                board: ctx.board,
                action: format!("{:?}", self.kind),
                state: self.state.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// Issue this cycle's request, or finish at once if there is none.
    fn begin(&mut self, ctx: &mut SyncContext<'_>) -> Progress {
        let Some(request) = self.request_for(ctx) else {
            self.state = SyncState::Idle;
            return Progress::Done;
        };

        if !ctx.connection.is_open() {
            if self.state == SyncState::Idle {
                warn!(board = %ctx.board, action = ?self.kind, "link not open, requesting connection");
                ctx.connection.open();
                self.state = SyncState::Linking;
            }
            return Progress::Pending;
        }

        debug!(board = %ctx.board, group = %request.group(), "register request issued");
        ctx.connection.send(request.clone());
        self.state = SyncState::Waiting(request);
        Progress::Pending
    }

    fn request_for(&self, ctx: &SyncContext<'_>) -> Option<RegisterRequest> {
        let regs = ctx.cache.back().board(ctx.board)?;
        let group = self.kind.group();
        match self.kind {
            SyncKind::Versions => regs
                .versions
                .is_none()
                .then_some(RegisterRequest::Read(group)),
            SyncKind::Status => Some(RegisterRequest::Read(group)),
            SyncKind::Clock => ctx
                .cache
                .is_pending(ctx.board, group)
                .then(|| RegisterRequest::WriteClock {
                    mhz: ctx.cache.back().clock_mhz,
                }),
            SyncKind::Rcu => ctx
                .cache
                .is_pending(ctx.board, group)
                .then(|| RegisterRequest::WriteRcu {
                    control: regs.rcu.clone(),
                }),
            SyncKind::Subbands => ctx
                .cache
                .is_pending(ctx.board, group)
                .then(|| RegisterRequest::WriteSubbands {
                    selection: regs.subbands.clone(),
                }),
        }
    }

    /// Fold a reply into the back buffer.
    fn store(sent: &RegisterRequest, reply: &RegisterReply, ctx: &mut SyncContext<'_>) {
        let board = ctx.board;
        match reply {
            RegisterReply::Versions(v) => {
                if let Some(regs) = ctx.cache.back_mut().board_mut(board) {
                    regs.versions = Some(*v);
                }
            }
            RegisterReply::Status(s) => {
                if let Some(regs) = ctx.cache.back_mut().board_mut(board) {
                    regs.status = Some(crate::board::BoardStatus {
                        read_at: ctx.now,
                        ..*s
                    });
                }
            }
            RegisterReply::Written(group) => {
                // A write applied while this request was in flight stays
                // pending for the next cycle.
                if Self::still_current(sent, ctx) {
                    ctx.cache.clear_pending(board, *group);
                }
            }
            RegisterReply::Failed(group) => {
                warn!(board = %board, group = %group, "board rejected register write, retrying next cycle");
            }
        }
    }

    fn still_current(sent: &RegisterRequest, ctx: &SyncContext<'_>) -> bool {
        let back = ctx.cache.back();
        let Some(regs) = back.board(ctx.board) else {
            return false;
        };
        match sent {
            RegisterRequest::Read(_) => true,
            RegisterRequest::WriteClock { mhz } => back.clock_mhz == *mhz,
            RegisterRequest::WriteRcu { control } => regs.rcu == *control,
            RegisterRequest::WriteSubbands { selection } => regs.subbands == *selection,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
