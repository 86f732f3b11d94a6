/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Double-buffered mirror of every board's register groups.
//!
//! ```text
//!   commands / sync actions ──write──►  back   ──swap_buffers()──►  front  ──►  readers
//!                                                (once per cycle)     Arc snapshot
//! ```
//!
//! `front` is an `Arc<CacheBuffer>`; a commit replaces the pointer in one
//! step, so a reader holding a snapshot keeps seeing exactly one committed
//! tick no matter how many commits happen afterwards.  The same snapshot is
//! published on a `watch` channel for readers outside the control loop.
//!
//! The cache is owned by the [`Scheduler`](crate::scheduler::Scheduler); there
//! is no global instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::board::{BoardId, BoardStatus, RegisterGroup, Target, Versions};
use crate::time::Timestamp;

/// Sampling clock assumed until the first `SetClock` is committed.
pub const DEFAULT_CLOCK_MHZ: u32 = 200;

// ── Buffer contents ───────────────────────────────────────────────────────────

/// Mirror of one board's register groups.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardRegisters {
    pub name: String,
    /// `None` until the versions have been read from the board.
    pub versions: Option<Versions>,
    /// `None` until the first status read completes.
    pub status: Option<BoardStatus>,
    /// Control word per receiver unit.
    pub rcu: Vec<u32>,
    pub subbands: Vec<u16>,
}

impl BoardRegisters {
    pub fn new(name: impl Into<String>, rcus: usize, subbands: usize) -> Self {
        Self {
            name: name.into(),
            versions: None,
            status: None,
            rcu: vec![0; rcus],
            subbands: vec![0; subbands],
        }
    }

    /// Whether `group` holds a value read from (or written to) the board.
    pub fn is_resident(&self, group: RegisterGroup) -> bool {
        match group {
            RegisterGroup::Versions => self.versions.is_some(),
            RegisterGroup::Status => self.status.is_some(),
            RegisterGroup::Clock | RegisterGroup::Rcu | RegisterGroup::Subbands => true,
        }
    }
}

/// One complete image of the hardware state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBuffer {
    /// Tick this image was prepared for.
    pub timestamp: Timestamp,
    pub clock_mhz: u32,
    pub boards: BTreeMap<BoardId, BoardRegisters>,
}

impl Default for CacheBuffer {
    fn default() -> Self {
        Self {
            timestamp: Timestamp::default(),
            clock_mhz: DEFAULT_CLOCK_MHZ,
            boards: BTreeMap::new(),
        }
    }
}

impl CacheBuffer {
    pub fn board(&self, id: BoardId) -> Option<&BoardRegisters> {
        self.boards.get(&id)
    }

    pub fn board_mut(&mut self, id: BoardId) -> Option<&mut BoardRegisters> {
        self.boards.get_mut(&id)
    }

    /// Iterate the boards selected by `target` in id order.
    ///
    /// An unknown single board yields nothing.
    pub fn targeted<'a>(
        &'a self,
        target: Target,
    ) -> impl Iterator<Item = (BoardId, &'a BoardRegisters)> + 'a {
        self.boards
            .iter()
            .filter(move |(id, _)| target.includes(**id))
            .map(|(id, regs)| (*id, regs))
    }

    /// True if every board addressed by `target` exists and has `group`
    /// resident.
    pub fn is_resident(&self, group: RegisterGroup, target: Target) -> bool {
        match target {
            Target::All => self.boards.values().all(|b| b.is_resident(group)),
            Target::Board(id) => self.board(id).is_some_and(|b| b.is_resident(group)),
        }
    }
}

// ── Pending-write bookkeeping ─────────────────────────────────────────────────

/// Register groups written into `back` but not yet pushed to the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PendingWrites {
    clock: bool,
    rcu: bool,
    subbands: bool,
}

impl PendingWrites {
    fn flag(&mut self, group: RegisterGroup) -> Option<&mut bool> {
        match group {
            RegisterGroup::Clock => Some(&mut self.clock),
            RegisterGroup::Rcu => Some(&mut self.rcu),
            RegisterGroup::Subbands => Some(&mut self.subbands),
            RegisterGroup::Versions | RegisterGroup::Status => None,
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

/// The front/back buffer pair plus the write-back bookkeeping the sync
/// actions consume.
#[derive(Debug)]
pub struct Cache {
    front: Arc<CacheBuffer>,
    back: CacheBuffer,
    pending: BTreeMap<BoardId, PendingWrites>,
    /// Tick in which the oldest unpushed clock change was applied.
    clock_pending_since: Option<Timestamp>,
    publisher: watch::Sender<Arc<CacheBuffer>>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    /// Empty buffers, no boards, nothing pending.
    pub fn new() -> Self {
        let front = Arc::new(CacheBuffer::default());
        let (publisher, _) = watch::channel(Arc::clone(&front));
        Self {
            front,
            back: CacheBuffer::default(),
            pending: BTreeMap::new(),
            clock_pending_since: None,
            publisher,
        }
    }

    // ── Buffers ───────────────────────────────────────────────────────────────

    /// The last committed image.
    pub fn front(&self) -> &CacheBuffer {
        &self.front
    }

    /// A shared handle on the last committed image that stays valid across
    /// later commits.
    pub fn snapshot(&self) -> Arc<CacheBuffer> {
        Arc::clone(&self.front)
    }

    /// The image being prepared for the current tick.
    pub fn back(&self) -> &CacheBuffer {
        &self.back
    }

    pub(crate) fn back_mut(&mut self) -> &mut CacheBuffer {
        &mut self.back
    }

    /// Mutable access to the committed image, for writes that must be
    /// visible before the next commit.  Copies the image first if a reader
    /// still holds the current snapshot, so outstanding snapshots never
    /// change.
    pub(crate) fn front_mut(&mut self) -> &mut CacheBuffer {
        Arc::make_mut(&mut self.front)
    }

    /// Subscribe to committed images.  The receiver is updated once per
    /// [`swap_buffers`](Self::swap_buffers).
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheBuffer>> {
        self.publisher.subscribe()
    }

    /// Commit: the prepared back image becomes the new front.
    ///
    /// The back buffer keeps its contents, so preparation of the next tick
    /// starts from the state just committed.
    pub fn swap_buffers(&mut self) {
        self.front = Arc::new(self.back.clone());
        self.publisher.send_replace(Arc::clone(&self.front));
        debug!(timestamp = %self.front.timestamp, "cache buffers swapped");
    }

    // ── Board slots ───────────────────────────────────────────────────────────

    pub(crate) fn add_board(&mut self, id: BoardId, registers: BoardRegisters) {
        self.back.boards.insert(id, registers.clone());
        self.front_mut().boards.insert(id, registers);
        self.pending.insert(id, PendingWrites::default());
    }

    pub(crate) fn remove_board(&mut self, id: BoardId) {
        self.back.boards.remove(&id);
        self.front_mut().boards.remove(&id);
        self.pending.remove(&id);
        self.refresh_clock_pending();
    }

    // ── Pending writes ────────────────────────────────────────────────────────

    /// Mark `group` on the boards selected by `target` as needing a push.
    ///
    /// Read-only groups are ignored.
    pub(crate) fn mark_pending(&mut self, group: RegisterGroup, target: Target, now: Timestamp) {
        let mut marked = false;
        for (id, pending) in self.pending.iter_mut() {
            if !target.includes(*id) {
                continue;
            }
            if let Some(flag) = pending.flag(group) {
                *flag = true;
                marked = true;
            }
        }
        if marked && group == RegisterGroup::Clock && self.clock_pending_since.is_none() {
            self.clock_pending_since = Some(now);
        }
    }

    pub fn is_pending(&self, id: BoardId, group: RegisterGroup) -> bool {
        let Some(mut pending) = self.pending.get(&id).copied() else {
            return false;
        };
        pending.flag(group).is_some_and(|f| *f)
    }

    pub(crate) fn clear_pending(&mut self, id: BoardId, group: RegisterGroup) {
        if let Some(flag) = self.pending.get_mut(&id).and_then(|p| p.flag(group)) {
            *flag = false;
        }
        if group == RegisterGroup::Clock {
            self.refresh_clock_pending();
        }
    }

    /// True if a clock change applied in an earlier tick than `now` has
    /// still not reached every board.
    pub fn clock_change_in_flight(&self, now: Timestamp) -> bool {
        self.clock_pending_since.is_some_and(|since| since < now)
    }

    fn refresh_clock_pending(&mut self) {
        if !self.pending.values().any(|p| p.clock) {
            self.clock_pending_since = None;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
