/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the board command scheduler.
//!
//! Hardware and timing trouble (late commands, links that are down, stalled
//! cycles) is never reported through this type; the scheduler recovers from
//! it locally and logs it.  What remains are caller mistakes and logic
//! errors.
//!
//! | Variant | Meaning | Binary reaction |
//! |---|---|---|
//! | `UnknownBoard` | id was never registered or already removed | log, continue |
//! | `DuplicateBoard` | a board with that name is already registered | exit(1) at start-up |
//! | `NoTransition` | a sync action received an event its state cannot take | exit(1) |

use thiserror::Error;

use crate::board::BoardId;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{0} is not a registered board")]
    UnknownBoard(BoardId),

    #[error("a board named '{0}' is already registered")]
    DuplicateBoard(String),

    /// A state machine was driven outside its defined transitions.  This
    /// indicates a bug in the scheduler, never a hardware condition.
    #[error("sync action {action} on {board} has no transition for '{event}' in state '{state}'")]
    NoTransition {
        board: BoardId,
        action: String,
        state: String,
        event: String,
    },
}

impl SchedulerError {
    /// Whether the process should stop rather than keep scheduling.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::NoTransition { .. })
    }
}
