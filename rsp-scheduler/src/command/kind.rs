/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-kind command effects.
//!
//! Every kind's behaviour is spelled out in one `match`, so adding a kind is a
//! compile error everywhere it has not been handled yet.

use crate::board::{BoardId, BoardStatus, RegisterGroup, Target, Versions};
use crate::cache::CacheBuffer;

use super::Operation;

// ── CommandKind ───────────────────────────────────────────────────────────────

/// What a command does, with only the data its effect needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    GetVersions,
    GetStatus,
    GetClock,
    GetRcu,
    GetSubbands,
    /// Change the sampling clock of every board.
    SetClock { mhz: u32 },
    /// Write `control` to every receiver unit whose bit is set in `mask`.
    SetRcu { mask: u64, control: u32 },
    /// Replace the leading entries of the subband selection.
    SetSubbands { selection: Vec<u16> },
}

impl CommandKind {
    pub fn operation(&self) -> Operation {
        match self {
            CommandKind::GetVersions
            | CommandKind::GetStatus
            | CommandKind::GetClock
            | CommandKind::GetRcu
            | CommandKind::GetSubbands => Operation::Read,
            CommandKind::SetClock { .. }
            | CommandKind::SetRcu { .. }
            | CommandKind::SetSubbands { .. } => Operation::Write,
        }
    }

    /// Register group read or written by this kind.
    pub fn group(&self) -> RegisterGroup {
        match self {
            CommandKind::GetVersions => RegisterGroup::Versions,
            CommandKind::GetStatus => RegisterGroup::Status,
            CommandKind::GetClock | CommandKind::SetClock { .. } => RegisterGroup::Clock,
            CommandKind::GetRcu | CommandKind::SetRcu { .. } => RegisterGroup::Rcu,
            CommandKind::GetSubbands | CommandKind::SetSubbands { .. } => {
                RegisterGroup::Subbands
            }
        }
    }

    /// Clock changes are acknowledged only after the boards have settled.
    pub fn default_delayed_response(&self) -> bool {
        matches!(self, CommandKind::SetClock { .. })
    }

    /// Kinds whose cycle application is also mirrored into the committed
    /// image, because readers must see the new value before the next commit.
    pub fn mirrors_front(&self) -> bool {
        matches!(self, CommandKind::SetClock { .. })
    }

    /// Write this kind's register values into `buffer` for the boards
    /// selected by `target`.  Reads leave the buffer untouched.
    pub(crate) fn write_registers(&self, buffer: &mut CacheBuffer, target: Target) {
        match self {
            CommandKind::GetVersions
            | CommandKind::GetStatus
            | CommandKind::GetClock
            | CommandKind::GetRcu
            | CommandKind::GetSubbands => {}

            CommandKind::SetClock { mhz } => buffer.clock_mhz = *mhz,

            CommandKind::SetRcu { mask, control } => {
                for (id, regs) in buffer.boards.iter_mut() {
                    if !target.includes(*id) {
                        continue;
                    }
                    for (unit, word) in regs.rcu.iter_mut().enumerate().take(64) {
                        if (mask >> unit) & 1 == 1 {
                            *word = *control;
                        }
                    }
                }
            }

            CommandKind::SetSubbands { selection } => {
                for (id, regs) in buffer.boards.iter_mut() {
                    if !target.includes(*id) {
                        continue;
                    }
                    for (slot, value) in regs.subbands.iter_mut().zip(selection) {
                        *slot = *value;
                    }
                }
            }
        }
    }

    /// Build the acknowledgment payload from a committed image.
    pub fn response(&self, buffer: &CacheBuffer, target: Target) -> Response {
        match self {
            CommandKind::GetVersions => Response::Versions(
                buffer.targeted(target).map(|(id, r)| (id, r.versions)).collect(),
            ),
            CommandKind::GetStatus => Response::Status(
                buffer.targeted(target).map(|(id, r)| (id, r.status)).collect(),
            ),
            CommandKind::GetClock => Response::Clock {
                mhz: buffer.clock_mhz,
            },
            CommandKind::GetRcu => Response::Rcu(
                buffer
                    .targeted(target)
                    .map(|(id, r)| (id, r.rcu.clone()))
                    .collect(),
            ),
            CommandKind::GetSubbands => Response::Subbands(
                buffer
                    .targeted(target)
                    .map(|(id, r)| (id, r.subbands.clone()))
                    .collect(),
            ),
            CommandKind::SetClock { .. }
            | CommandKind::SetRcu { .. }
            | CommandKind::SetSubbands { .. } => Response::Written,
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Acknowledgment payload.  Reads carry the committed values, one entry per
/// addressed board in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Versions(Vec<(BoardId, Option<Versions>)>),
    Status(Vec<(BoardId, Option<BoardStatus>)>),
    Clock { mhz: u32 },
    Rcu(Vec<(BoardId, Vec<u32>)>),
    Subbands(Vec<(BoardId, Vec<u16>)>),
    Written,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
