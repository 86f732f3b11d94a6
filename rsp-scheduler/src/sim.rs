/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-process board that answers every register request at once.
//!
//! Replies are pushed onto the same unbounded channel the event loop reads
//! board completions from, so they are handled exactly like real I/O
//! completions: later, and one at a time.  A shared [`SimHandle`] takes the
//! board on- and offline from outside.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::board::{
    BoardConnection, BoardEvent, BoardId, BoardStatus, RegisterGroup, RegisterReply,
    RegisterRequest, Versions,
};

// ── Handle ────────────────────────────────────────────────────────────────────

/// Shared control and counters for one simulated board.
#[derive(Debug, Clone)]
pub struct SimHandle {
    online: Arc<AtomicBool>,
    open_requests: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl SimHandle {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
            open_requests: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of connection attempts the scheduler made.
    pub fn open_requests(&self) -> usize {
        self.open_requests.load(Ordering::SeqCst)
    }

    /// Number of register requests received while online.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

// ── SimulatedBoard ────────────────────────────────────────────────────────────

pub struct SimulatedBoard {
    id: BoardId,
    events: UnboundedSender<BoardEvent>,
    handle: SimHandle,
    open: bool,
    clock_mhz: u32,
    versions: Versions,
}

impl SimulatedBoard {
    pub fn new(id: BoardId, events: UnboundedSender<BoardEvent>, handle: SimHandle) -> Self {
        Self {
            id,
            events,
            handle,
            open: false,
            clock_mhz: 0,
            versions: Versions {
                hardware: 3,
                firmware: 0x0701,
            },
        }
    }

    fn emit(&self, event: BoardEvent) {
        // The receiver only goes away when the event loop shuts down.
        let _ = self.events.send(event);
    }

    fn answer(&mut self, request: &RegisterRequest) -> RegisterReply {
        match request {
            RegisterRequest::Read(RegisterGroup::Versions) => RegisterReply::Versions(self.versions),
            RegisterRequest::Read(RegisterGroup::Status) => RegisterReply::Status(BoardStatus {
                voltage_mv: 3300,
                temperature_c: 41,
                sync_errors: 0,
                ..Default::default()
            }),
            RegisterRequest::Read(group) => RegisterReply::Failed(*group),
            RegisterRequest::WriteClock { mhz } => {
                self.clock_mhz = *mhz;
                RegisterReply::Written(RegisterGroup::Clock)
            }
            RegisterRequest::WriteRcu { .. } => RegisterReply::Written(RegisterGroup::Rcu),
            RegisterRequest::WriteSubbands { .. } => {
                RegisterReply::Written(RegisterGroup::Subbands)
            }
        }
    }
}

impl BoardConnection for SimulatedBoard {
    fn is_open(&self) -> bool {
        self.open && self.handle.is_online()
    }

    fn open(&mut self) {
        self.handle.open_requests.fetch_add(1, Ordering::SeqCst);
        if self.handle.is_online() {
            self.open = true;
            self.emit(BoardEvent::Connected(self.id));
        }
    }

    fn send(&mut self, request: RegisterRequest) {
        if !self.handle.is_online() {
            self.open = false;
            self.emit(BoardEvent::Disconnected(self.id));
            return;
        }
        self.handle.requests.fetch_add(1, Ordering::SeqCst);
        let reply = self.answer(&request);
        trace!(board = %self.id, ?request, ?reply, "simulated round trip");
        self.emit(BoardEvent::Reply(self.id, reply));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
