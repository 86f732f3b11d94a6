/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! RSP register scheduler
//!
//! Tick-driven scheduling of register reads and writes on a set of networked
//! hardware boards, with a double-buffered register cache.
//!
//! ```text
//! lib.rs
//! ├── time        – second-resolution timestamps, phase grid
//! ├── board       – board ids, register groups, transport trait, events
//! ├── cache/      – front/back register images and pending writes
//! ├── command/    – command kinds, admission data, acknowledgments
//! ├── sync/       – per-board register I/O state machines
//! ├── scheduler/  – queues, tick cycle, completion
//! ├── config/     – YAML scheduler and board configuration
//! └── sim         – in-process boards for the daemon and tests
//! ```

pub mod board;
pub mod cache;
pub mod command;
pub mod config;
pub mod scheduler;
pub mod sim;
pub mod sync;
pub mod time;
