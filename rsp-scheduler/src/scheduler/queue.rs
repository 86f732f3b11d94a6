/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time-ordered command queue with explicit tie-breaking.
//!
//! Keys are `(scheduled, sequence)`.  The sequence number is assigned on every
//! insertion, so commands scheduled for the same tick come out in the order
//! they were queued.

use std::collections::BTreeMap;

use crate::command::Command;
use crate::time::Timestamp;

type Key = (Timestamp, u64);

#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: BTreeMap<Key, Command>,
    next_seq: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at `command.scheduled`, after anything already queued for the
    /// same tick.
    pub fn push(&mut self, command: Command) {
        let key = (command.scheduled, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, command);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return, in queue order, every command with a scheduled time
    /// at or before `horizon` for which `due` holds.
    ///
    /// Traversal stops at the first entry beyond `horizon`.
    pub fn drain_due<F>(&mut self, horizon: Timestamp, mut due: F) -> Vec<Command>
    where
        F: FnMut(&Command) -> bool,
    {
        let keys: Vec<Key> = self
            .entries
            .range(..=(horizon, u64::MAX))
            .filter(|&(_, cmd)| due(cmd))
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect()
    }

    /// Remove every command matching `pred`; returns how many were removed.
    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Command) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, cmd| !pred(cmd));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.values()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
