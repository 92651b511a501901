//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Long-term memory of the player across games
//!
//! Stored blobs are JSON, XOR'd with a UTF-8 key and base64 encoded. This is
//! obfuscation at rest, not security.

use crate::config::MemoryKey;
use crate::session::AISessionState;
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use dealer_common::{
    DialogueCategory, PersonalityProfile, PlayerAction, RecentSessions, SessionSummary,
    position_label,
};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PLAYER_PROFILE_KEY: &str = "AI_PlayerProfile";
pub const RECENT_SESSIONS_KEY: &str = "AI_RecentSessions";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored blob is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Decrypted blob is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

fn xor(bytes: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}

/// XOR `plain` with `key` and base64 encode the result
pub fn encrypt(plain: &str, key: &str) -> String {
    let mut bytes = plain.as_bytes().to_vec();
    xor(&mut bytes, key.as_bytes());
    general_purpose::STANDARD.encode(bytes)
}

/// Inverse of [`encrypt`]
pub fn decrypt(encoded: &str, key: &str) -> PersistenceResult<String> {
    let mut bytes = general_purpose::STANDARD.decode(encoded.trim())?;
    xor(&mut bytes, key.as_bytes());
    Ok(String::from_utf8(bytes)?)
}

/// String key-value storage in the spirit of a game's preferences file
pub trait KeyValueStore: Send + Sync {
    fn get_string(&self, key: &str) -> PersistenceResult<Option<String>>;

    fn set_string(&self, key: &str, value: &str) -> PersistenceResult<()>;

    fn has_key(&self, key: &str) -> bool;

    fn delete_key(&self, key: &str) -> PersistenceResult<()>;
}

/// Process-local store; contents are lost on exit
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_string(&self, key: &str) -> PersistenceResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| PersistenceError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn has_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn delete_key(&self, key: &str) -> PersistenceResult<()> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object, rewritten on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => HashMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened memory store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_string(&self, key: &str) -> PersistenceResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| PersistenceError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn has_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn delete_key(&self, key: &str) -> PersistenceResult<()> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

fn average(actions: &[&PlayerAction], field: impl Fn(&PlayerAction) -> f32) -> f32 {
    if actions.is_empty() {
        return 0.0;
    }
    actions.iter().map(|a| field(*a)).sum::<f32>() / actions.len() as f32
}

/// Compress a finished session into its long-term summary
pub fn summarize(session: &AISessionState) -> SessionSummary {
    let actions: Vec<&PlayerAction> = session.behavior_history().collect();

    let position_preference = if actions.is_empty() {
        String::new()
    } else {
        let count = |p: i32| actions.iter().filter(|a| a.selected_position == p).count();
        let (left, center, right) = (count(0), count(1), count(2));
        let position = if left > center && left > right {
            0
        } else if center > right {
            1
        } else {
            2
        };
        position_label(position).unwrap_or_default().to_string()
    };

    let mut effective_strategies = Vec::new();
    if session.pressure() > 2.0 {
        effective_strategies.push("high_pressure_effective".to_string());
    }
    if session.spoke_category(DialogueCategory::Mirror) {
        effective_strategies.push("mirror_dialogue_used".to_string());
    }

    let player_reactions = if actions.is_empty() {
        "no_data"
    } else {
        let doubt = average(&actions, |a| a.doubt_level);
        if doubt > 0.7 {
            "highly_susceptible_to_pressure"
        } else if doubt > 0.4 {
            "moderately_susceptible"
        } else {
            "resistant_to_pressure"
        }
    };

    SessionSummary {
        timestamp: Utc::now(),
        turn_count: session.game.turn_number,
        player_won: session.game.player_card_count == 0,
        final_pressure_level: session.pressure(),
        avg_hover_time: average(&actions, |a| a.hover_duration),
        avg_decision_time: average(&actions, |a| a.decision_time),
        position_preference,
        effective_strategies,
        player_reactions: player_reactions.to_string(),
    }
}

/// Recent-session FIFO and persistent profile, backed by a [`KeyValueStore`]
pub struct SessionMemory {
    store: Arc<dyn KeyValueStore>,
    key: String,
    max_sessions: usize,
    recent: VecDeque<SessionSummary>,
    profile: Option<PersonalityProfile>,
}

impl SessionMemory {
    pub fn new(store: Arc<dyn KeyValueStore>, key: &MemoryKey, max_sessions: usize) -> Self {
        if key.is_empty() {
            warn!("Memory key is empty, stored memory will only be base64 encoded");
        }
        Self {
            store,
            key: key.as_str().to_string(),
            max_sessions: max_sessions.max(1),
            recent: VecDeque::new(),
            profile: None,
        }
    }

    fn read_blob<T: serde::de::DeserializeOwned>(&self, key: &str) -> PersistenceResult<Option<T>> {
        let Some(blob) = self.store.get_string(key)? else {
            return Ok(None);
        };
        if blob.is_empty() {
            return Ok(None);
        }
        let json = decrypt(&blob, &self.key)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write_blob<T: serde::Serialize>(&self, key: &str, value: &T) -> PersistenceResult<()> {
        let json = serde_json::to_string(value)?;
        self.store.set_string(key, &encrypt(&json, &self.key))
    }

    /// Load both blobs. Missing or unreadable data loads as empty.
    pub fn load(&mut self) {
        self.recent = match self.read_blob::<RecentSessions>(RECENT_SESSIONS_KEY) {
            Ok(Some(data)) => {
                let skip = data.sessions.len().saturating_sub(self.max_sessions);
                data.sessions.into_iter().skip(skip).collect()
            }
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("Recent sessions unreadable, starting empty: {}", e);
                VecDeque::new()
            }
        };
        self.profile = match self.read_blob::<PersonalityProfile>(PLAYER_PROFILE_KEY) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Stored profile unreadable, starting without one: {}", e);
                None
            }
        };
        info!(
            "Session memory loaded: {} sessions, profile {}",
            self.recent.len(),
            if self.profile.is_some() { "found" } else { "not found" }
        );
    }

    pub fn persistent_profile(&self) -> Option<&PersonalityProfile> {
        self.profile.as_ref()
    }

    /// The last `count` summaries, oldest first; `None` returns all of them
    pub fn recent_sessions(&self, count: Option<usize>) -> Vec<SessionSummary> {
        let count = count.unwrap_or(self.recent.len()).min(self.recent.len());
        self.recent.iter().skip(self.recent.len() - count).cloned().collect()
    }

    /// Summarize `session`, push it onto the FIFO and persist both blobs.
    /// Storage failures are logged; the in-memory state is still updated.
    pub fn save_session(&mut self, session: &AISessionState) -> SessionSummary {
        let summary = summarize(session);
        self.recent.push_back(summary.clone());
        while self.recent.len() > self.max_sessions {
            self.recent.pop_front();
        }

        let data = RecentSessions::new(self.recent.iter().cloned().collect());
        if let Err(e) = self.write_blob(RECENT_SESSIONS_KEY, &data) {
            warn!("Failed to persist recent sessions: {}", e);
        }
        if let Some(profile) = session.adapted_profile.as_ref() {
            if let Err(e) = self.write_blob(PLAYER_PROFILE_KEY, profile) {
                warn!("Failed to persist player profile: {}", e);
            }
            self.profile = Some(profile.clone());
        }

        info!("Session memory saved, {} sessions kept", self.recent.len());
        summary
    }

    /// Forget everything, stored and in memory
    pub fn clear_all(&mut self) {
        for key in [RECENT_SESSIONS_KEY, PLAYER_PROFILE_KEY] {
            if let Err(e) = self.store.delete_key(key) {
                warn!("Failed to delete {}: {}", key, e);
            }
        }
        self.recent.clear();
        self.profile = None;
        info!("All session memory cleared");
    }
}
