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

//! Long-term session summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written alongside stored summaries.
pub const RECENT_SESSIONS_VERSION: &str = "1.0";

/// Compressed record of one finished game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub timestamp: DateTime<Utc>,
    pub turn_count: u32,
    pub player_won: bool,
    pub final_pressure_level: f32,
    pub avg_hover_time: f32,
    pub avg_decision_time: f32,
    /// "left", "center" or "right"; empty when nothing was recorded
    #[serde(default)]
    pub position_preference: String,
    #[serde(default)]
    pub effective_strategies: Vec<String>,
    pub player_reactions: String,
}

/// Stored envelope for the recent-session FIFO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSessions {
    pub version: String,
    pub sessions: Vec<SessionSummary>,
}

impl RecentSessions {
    pub fn new(sessions: Vec<SessionSummary>) -> Self {
        Self {
            version: RECENT_SESSIONS_VERSION.to_string(),
            sessions,
        }
    }
}
