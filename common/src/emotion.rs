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

//! Opponent emotional states and the events that move them

use serde::{Deserialize, Serialize};
use std::fmt;

/// The opponent's apparent mood. Only the emotional state machine changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmotionalState {
    #[default]
    Calm,
    Anticipating,
    Pleased,
    Frustrated,
    Hurt,
    Relieved,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 6] = [
        EmotionalState::Calm,
        EmotionalState::Anticipating,
        EmotionalState::Pleased,
        EmotionalState::Frustrated,
        EmotionalState::Hurt,
        EmotionalState::Relieved,
    ];
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something that happened at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameEvent {
    TurnStart,
    AIDrawSuccessful,
    AIDrawJoker,
    PlayerDrawSuccessful,
    PlayerDrawJoker,
    PlayerHesitating,
    PlayerShowingPattern,
    PairMatched,
    GameNearEnd,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
