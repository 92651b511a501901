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

//! Dealer Common Types
//!
//! This crate defines the shared data model used across the Dealer engine:
//! - Player personality profiles and per-turn behavior snapshots
//! - The opponent's emotional states and the game events that drive them
//! - Card-selection decisions with their chain-of-thought trace
//! - Game-phase snapshots and long-term session summaries

pub mod behavior;
pub mod decision;
pub mod dialogue;
pub mod emotion;
pub mod game;
pub mod personality;
pub mod summary;

pub use behavior::{BehaviorPattern, FacialExpression, PlayerAction, Tempo};
pub use decision::{AIDecisionResult, CoTStep, STRATEGY_INVALID};
pub use dialogue::{DialogueCategory, DialogueMemory};
pub use emotion::{EmotionalState, GameEvent};
pub use game::{GamePhase, GameStateData};
pub use personality::{DecisionStyle, DominantTrait, PersonalityProfile, StressType};
pub use summary::{RecentSessions, SessionSummary};

/// Map a left/center/right hand position to its lowercase label.
pub fn position_label(position: i32) -> Option<&'static str> {
    match position {
        0 => Some("left"),
        1 => Some("center"),
        2 => Some("right"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_label() {
        assert_eq!(position_label(0), Some("left"));
        assert_eq!(position_label(1), Some("center"));
        assert_eq!(position_label(2), Some("right"));
        assert_eq!(position_label(3), None);
        assert_eq!(position_label(-1), None);
    }
}
