//! Durable persistence for [`BotState`] plus the append-only JSONL event logs.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use castpage_core::write_text_atomic;
use serde_json::Value;

use crate::{bot_state::BotState, clock::duration_to_ms};

pub const STATE_FILE_NAME: &str = "state.json";
pub const STATE_BACKUP_FILE_NAME: &str = "state.backup.json";

#[derive(Debug, Clone)]
/// Loads and saves the bot record as a primary file with an identical backup copy.
pub struct StateStore {
    primary_path: PathBuf,
    backup_path: PathBuf,
    processed_cap: usize,
    generation_window_ms: u64,
}

impl StateStore {
    pub fn new(state_dir: &Path, processed_cap: usize, generation_window: Duration) -> Self {
        Self {
            primary_path: state_dir.join(STATE_FILE_NAME),
            backup_path: state_dir.join(STATE_BACKUP_FILE_NAME),
            processed_cap: processed_cap.max(1),
            generation_window_ms: duration_to_ms(generation_window),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Never fails: the primary file wins, then the backup, then a default record.
    pub fn load(&self, now_ms: u64) -> BotState {
        let mut state = match read_state_file(&self.primary_path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!(
                    path = %self.primary_path.display(),
                    "no bot state file found"
                );
                self.load_backup()
            }
            Err(error) => {
                tracing::warn!(
                    error = %format!("{error:#}"),
                    path = %self.primary_path.display(),
                    "bot state file is unreadable, trying backup"
                );
                self.load_backup()
            }
        };
        state.normalize(now_ms, self.generation_window_ms, self.processed_cap);
        state
    }

    fn load_backup(&self) -> BotState {
        match read_state_file(&self.backup_path) {
            Ok(Some(state)) => {
                tracing::warn!(
                    path = %self.backup_path.display(),
                    "restored bot state from backup"
                );
                state
            }
            Ok(None) => BotState::default(),
            Err(error) => {
                tracing::warn!(
                    error = %format!("{error:#}"),
                    path = %self.backup_path.display(),
                    "bot state backup is unreadable, starting from defaults"
                );
                BotState::default()
            }
        }
    }

    /// Normalizes `state` in place, then writes primary and backup. Failures are logged and
    /// reported through the return value; the in-memory record stays authoritative.
    pub fn save(&self, state: &mut BotState, now_ms: u64) -> bool {
        state.normalize(now_ms, self.generation_window_ms, self.processed_cap);
        let payload = match render_state(state) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "failed to serialize bot state");
                return false;
            }
        };

        let mut saved = true;
        for path in [&self.primary_path, &self.backup_path] {
            if let Err(error) = write_text_atomic(path, &payload) {
                tracing::warn!(
                    error = %format!("{error:#}"),
                    path = %path.display(),
                    "failed to persist bot state"
                );
                saved = false;
            }
        }
        saved
    }
}

fn read_state_file(path: &Path) -> Result<Option<BotState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let state = serde_json::from_str::<BotState>(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))?;
    Ok(Some(state))
}

fn render_state(state: &BotState) -> Result<String> {
    let mut payload = serde_json::to_string_pretty(state).context("failed to serialize state")?;
    payload.push('\n');
    Ok(payload)
}

#[derive(Clone)]
/// Line-delimited JSON log shared across clones.
pub struct JsonlEventLog {
    path: PathBuf,
    file: Arc<Mutex<std::fs::File>>,
}

impl JsonlEventLog {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, value: &Value) -> Result<()> {
        let line = serde_json::to_string(value).context("failed to encode log event")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
