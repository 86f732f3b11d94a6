/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Board identity, register groups, and the transport seam.
//!
//! The scheduler never sees the binary register protocol.  It talks to a
//! board through [`BoardConnection`] using typed [`RegisterRequest`]s, and the
//! event loop hands the answers back as [`BoardEvent`]s tagged with the
//! originating [`BoardId`].

use std::fmt;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Stable per-board identifier.
///
/// Allocated by the scheduler when a board is registered and never reused, so
/// a command or event that outlives its board cannot address a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardId(pub u32);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board#{}", self.0)
    }
}

/// Which boards a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every board known at execution time.
    All,
    Board(BoardId),
}

impl Target {
    pub fn includes(&self, id: BoardId) -> bool {
        match self {
            Target::All => true,
            Target::Board(b) => *b == id,
        }
    }
}

// ── Register groups ───────────────────────────────────────────────────────────

/// The register groups mirrored by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterGroup {
    Versions,
    Status,
    Clock,
    Rcu,
    Subbands,
}

impl fmt::Display for RegisterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegisterGroup::Versions => "versions",
            RegisterGroup::Status => "status",
            RegisterGroup::Clock => "clock",
            RegisterGroup::Rcu => "rcu",
            RegisterGroup::Subbands => "subbands",
        };
        f.write_str(name)
    }
}

/// Firmware identification read once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Versions {
    pub hardware: u16,
    pub firmware: u16,
}

/// Health snapshot read on every cycle.
///
/// `read_at` is the cycle timestamp the value was collected for, stamped by
/// the status sync action rather than by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardStatus {
    pub voltage_mv: u32,
    pub temperature_c: i16,
    pub sync_errors: u32,
    pub read_at: crate::time::Timestamp,
}

// ── Transport messages ────────────────────────────────────────────────────────

/// One register operation sent to a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterRequest {
    Read(RegisterGroup),
    WriteClock { mhz: u32 },
    WriteRcu { control: Vec<u32> },
    WriteSubbands { selection: Vec<u16> },
}

impl RegisterRequest {
    pub fn group(&self) -> RegisterGroup {
        match self {
            RegisterRequest::Read(g) => *g,
            RegisterRequest::WriteClock { .. } => RegisterGroup::Clock,
            RegisterRequest::WriteRcu { .. } => RegisterGroup::Rcu,
            RegisterRequest::WriteSubbands { .. } => RegisterGroup::Subbands,
        }
    }
}

/// A board's answer to a [`RegisterRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterReply {
    Versions(Versions),
    Status(BoardStatus),
    Written(RegisterGroup),
    /// The board rejected or failed the operation on this group.
    Failed(RegisterGroup),
}

impl RegisterReply {
    pub fn group(&self) -> RegisterGroup {
        match self {
            RegisterReply::Versions(_) => RegisterGroup::Versions,
            RegisterReply::Status(_) => RegisterGroup::Status,
            RegisterReply::Written(g) | RegisterReply::Failed(g) => *g,
        }
    }
}

/// I/O completion delivered by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Connected(BoardId),
    Disconnected(BoardId),
    Reply(BoardId, RegisterReply),
}

impl BoardEvent {
    pub fn board(&self) -> BoardId {
        match self {
            BoardEvent::Connected(id) | BoardEvent::Disconnected(id) | BoardEvent::Reply(id, _) => {
                *id
            }
        }
    }
}

// ── Transport seam ────────────────────────────────────────────────────────────

/// The transport to one physical board.
///
/// Implementations must not block: `open` and `send` only *start* an
/// operation, whose outcome arrives later as a [`BoardEvent`].
pub trait BoardConnection {
    fn is_open(&self) -> bool;

    /// Begin establishing the link.  Completion is reported with
    /// [`BoardEvent::Connected`].
    fn open(&mut self);

    /// Issue a register request.  Only called while the link is open.
    fn send(&mut self, request: RegisterRequest);
}
