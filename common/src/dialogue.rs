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

//! Dialogue categories and spoken-line records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Purpose of a line the opponent speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogueCategory {
    /// Discourage the player from the card they are hovering
    Stop,
    /// Lure the player toward a card
    Bait,
    /// Call out the player's own habits
    Mirror,
    /// Unprompted chatter
    General,
    /// Muttering while deliberating
    Hesitation,
}

impl DialogueCategory {
    pub const ALL: [DialogueCategory; 5] = [
        DialogueCategory::Stop,
        DialogueCategory::Bait,
        DialogueCategory::Mirror,
        DialogueCategory::General,
        DialogueCategory::Hesitation,
    ];

    /// Lowercase identifier used in string-table keys
    pub fn as_key(&self) -> &'static str {
        match self {
            DialogueCategory::Stop => "stop",
            DialogueCategory::Bait => "bait",
            DialogueCategory::Mirror => "mirror",
            DialogueCategory::General => "general",
            DialogueCategory::Hesitation => "hesitation",
        }
    }
}

impl fmt::Display for DialogueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A line the opponent has spoken this session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueMemory {
    pub turn_number: u32,
    pub category: DialogueCategory,
    pub text: String,
}
