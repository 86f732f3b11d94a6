/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler and board configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! scheduler:
//!   sync_interval_s: 1
//!   scheduling_delay_s: 2
//!   max_retries: 3
//!   retry_backoff_s: 1
//!   jitter_tolerance_us: 10000
//!   immediate_reads: true
//! boards:
//!   - name: rsp0
//!     rcus: 8
//!     subbands: 16
//!   - name: rsp1
//! ```
//! Every field is optional; omitted values take the defaults of
//! [`SchedulerConfig::default`] and [`BoardConfig::default_config`].

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    scheduler: SchedulerEntry,
    #[serde(default)]
    boards: Vec<BoardEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerEntry {
    sync_interval_s: Option<u64>,
    scheduling_delay_s: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_s: Option<u64>,
    jitter_tolerance_us: Option<u32>,
    immediate_reads: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BoardEntry {
    name: String,
    rcus: Option<usize>,
    subbands: Option<usize>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// Timing and retry policy of the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Seconds between ticks.  Writes are promoted this far ahead of their
    /// scheduled tick.
    pub sync_interval_s: u64,
    /// Minimum lead time, in seconds, between admission and execution.
    pub scheduling_delay_s: u64,
    /// Execution attempts allowed against a link that is down before the
    /// command is abandoned.
    pub max_retries: u32,
    pub retry_backoff_s: u64,
    /// Largest tolerated distance of a tick from the second boundary.
    pub jitter_tolerance_us: u32,
    /// Answer reads with no requested time straight from the committed cache
    /// when the value is resident.
    pub immediate_reads: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval_s: 1,
            scheduling_delay_s: 2,
            max_retries: 3,
            retry_backoff_s: 1,
            jitter_tolerance_us: 10_000,
            immediate_reads: true,
        }
    }
}

/// Register layout of one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub name: String,
    /// Receiver control units on the board.
    pub rcus: usize,
    /// Width of the subband selection register.
    pub subbands: usize,
}

impl BoardConfig {
    /// Fallback used when no board is configured.
    pub fn default_config(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rcus: 8,
            subbands: 16,
        }
    }
}

// ── ConfigManager ─────────────────────────────────────────────────────────────

/// Loads and holds the scheduler and board configuration.
#[derive(Debug)]
pub struct ConfigManager {
    scheduler: SchedulerConfig,
    boards: Vec<BoardConfig>,
    loaded: bool,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Defaults: default timing and a single `default_board`.
    pub fn new() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            boards: vec![BoardConfig::default_config("default_board")],
            loaded: false,
        }
    }

    /// Parse `path`, replacing any previously loaded configuration.
    ///
    /// # Errors
    /// The file cannot be read, the YAML is malformed, a timing value is
    /// zero where it must not be, or two boards share a name.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading configuration from: {}", path.display());
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let scheduler = Self::scheduler_from(file.scheduler)
            .with_context(|| format!("Invalid scheduler section in {}", path.display()))?;

        let mut boards = Vec::with_capacity(file.boards.len());
        for entry in file.boards {
            if boards.iter().any(|b: &BoardConfig| b.name == entry.name) {
                bail!("board '{}' is configured twice", entry.name);
            }
            let default = BoardConfig::default_config(entry.name.clone());
            let board = BoardConfig {
                name: entry.name,
                rcus: entry.rcus.unwrap_or(default.rcus),
                subbands: entry.subbands.unwrap_or(default.subbands),
            };
            debug!(
                "  Board: {} | RCUs: {} | Subbands: {}",
                board.name, board.rcus, board.subbands
            );
            boards.push(board);
        }

        if boards.is_empty() {
            warn!("No boards found in configuration file, using default configuration");
            boards.push(BoardConfig::default_config("default_board"));
        }

        self.scheduler = scheduler;
        self.boards = boards;
        self.loaded = true;

        info!(
            boards = self.boards.len(),
            sync_interval_s = self.scheduler.sync_interval_s,
            scheduling_delay_s = self.scheduler.scheduling_delay_s,
            max_retries = self.scheduler.max_retries,
            "Configuration loaded"
        );
        Ok(())
    }

    fn scheduler_from(entry: SchedulerEntry) -> Result<SchedulerConfig> {
        let d = SchedulerConfig::default();
        let cfg = SchedulerConfig {
            sync_interval_s: entry.sync_interval_s.unwrap_or(d.sync_interval_s),
            scheduling_delay_s: entry.scheduling_delay_s.unwrap_or(d.scheduling_delay_s),
            max_retries: entry.max_retries.unwrap_or(d.max_retries),
            retry_backoff_s: entry.retry_backoff_s.unwrap_or(d.retry_backoff_s),
            jitter_tolerance_us: entry.jitter_tolerance_us.unwrap_or(d.jitter_tolerance_us),
            immediate_reads: entry.immediate_reads.unwrap_or(d.immediate_reads),
        };
        if cfg.sync_interval_s == 0 {
            bail!("sync_interval_s must be at least 1");
        }
        if cfg.retry_backoff_s == 0 {
            bail!("retry_backoff_s must be at least 1");
        }
        Ok(cfg)
    }

    pub fn scheduler(&self) -> &SchedulerConfig {
        &self.scheduler
    }

    pub fn boards(&self) -> &[BoardConfig] {
        &self.boards
    }

    pub fn get_board(&self, name: &str) -> Option<&BoardConfig> {
        self.boards.iter().find(|b| b.name == name)
    }

    /// Returns `true` after a successful [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
