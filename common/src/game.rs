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

//! Game progress snapshot

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse game progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Early,
    Mid,
    EndGame,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Turn number and both sides' remaining cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateData {
    pub turn_number: u32,
    pub player_card_count: u32,
    pub ai_card_count: u32,
    pub current_phase: GamePhase,
}

impl Default for GameStateData {
    fn default() -> Self {
        Self {
            turn_number: 0,
            player_card_count: 0,
            ai_card_count: 0,
            current_phase: GamePhase::Early,
        }
    }
}

impl GameStateData {
    pub fn new(turn_number: u32, player_card_count: u32, ai_card_count: u32) -> Self {
        let mut state = Self {
            turn_number,
            player_card_count,
            ai_card_count,
            current_phase: GamePhase::Early,
        };
        state.update_phase();
        state
    }

    /// Recompute the phase: early before turn 5, end game once fewer than 8 cards remain.
    pub fn update_phase(&mut self) {
        let total = self.player_card_count + self.ai_card_count;
        self.current_phase = if self.turn_number < 5 {
            GamePhase::Early
        } else if total < 8 {
            GamePhase::EndGame
        } else {
            GamePhase::Mid
        };
    }

    /// Player cards minus AI cards
    pub fn card_difference(&self) -> i64 {
        i64::from(self.player_card_count) - i64::from(self.ai_card_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progression() {
        assert_eq!(GameStateData::new(1, 10, 10).current_phase, GamePhase::Early);
        assert_eq!(GameStateData::new(6, 10, 10).current_phase, GamePhase::Mid);
        assert_eq!(GameStateData::new(6, 3, 4).current_phase, GamePhase::EndGame);
        // Early wins over a low card count
        assert_eq!(GameStateData::new(2, 1, 1).current_phase, GamePhase::Early);
    }

    #[test]
    fn test_card_difference() {
        assert_eq!(GameStateData::new(3, 2, 7).card_difference(), -5);
    }
}
