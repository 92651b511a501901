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

//! Per-turn player behavior snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player decision tempo classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tempo {
    Slow,
    #[default]
    Normal,
    Fast,
    Erratic,
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Facial expression reported by the external analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FacialExpression {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Surprise,
    Disgust,
}

impl FacialExpression {
    pub fn display_name(&self) -> &'static str {
        match self {
            FacialExpression::Neutral => "neutral",
            FacialExpression::Happy => "smiling",
            FacialExpression::Sad => "sad",
            FacialExpression::Angry => "angry",
            FacialExpression::Fearful => "nervous",
            FacialExpression::Surprise => "surprised",
            FacialExpression::Disgust => "disgusted",
        }
    }
}

/// Snapshot of how the player behaved this turn. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorPattern {
    /// 0 = confident, 1 = very uncertain
    pub doubt_level: f32,
    pub tempo: Tempo,
    pub has_position_preference: bool,
    /// Preferred hand position, or -1 when none was detected
    pub preferred_position: i32,
    pub streak_same_position: u32,
    /// Seconds
    pub avg_hover_time: f32,
    /// Seconds
    pub avg_decision_time: f32,
    pub last_expression: FacialExpression,
    pub expression_confidence: f32,
}

impl Default for BehaviorPattern {
    fn default() -> Self {
        Self {
            doubt_level: 0.0,
            tempo: Tempo::Normal,
            has_position_preference: false,
            preferred_position: -1,
            streak_same_position: 0,
            avg_hover_time: 0.0,
            avg_decision_time: 0.0,
            last_expression: FacialExpression::Neutral,
            expression_confidence: 0.0,
        }
    }
}

impl BehaviorPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doubt(mut self, doubt: f32) -> Self {
        self.doubt_level = doubt.clamp(0.0, 1.0);
        self
    }

    pub fn with_tempo(mut self, tempo: Tempo) -> Self {
        self.tempo = tempo;
        self
    }

    /// Record a detected position preference with its current streak length
    pub fn with_preference(mut self, position: i32, streak: u32) -> Self {
        self.has_position_preference = position >= 0;
        self.preferred_position = position;
        self.streak_same_position = streak;
        self
    }

    pub fn with_streak(mut self, streak: u32) -> Self {
        self.streak_same_position = streak;
        self
    }

    pub fn with_timings(mut self, avg_hover: f32, avg_decision: f32) -> Self {
        self.avg_hover_time = avg_hover.max(0.0);
        self.avg_decision_time = avg_decision.max(0.0);
        self
    }

    pub fn with_expression(mut self, expression: FacialExpression, confidence: f32) -> Self {
        self.last_expression = expression;
        self.expression_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// True when the player keeps drawing from the same detected spot
    pub fn shows_position_streak(&self) -> bool {
        self.has_position_preference && self.streak_same_position >= 2
    }
}

/// A single recorded player draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub selected_position: i32,
    pub hover_duration: f32,
    pub decision_time: f32,
    pub doubt_level: f32,
    pub turn_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_preference() {
        let behavior = BehaviorPattern::default();
        assert!(!behavior.has_position_preference);
        assert_eq!(behavior.preferred_position, -1);
        assert!(!behavior.shows_position_streak());
    }

    #[test]
    fn test_with_preference() {
        let behavior = BehaviorPattern::new().with_preference(2, 3);
        assert!(behavior.has_position_preference);
        assert!(behavior.shows_position_streak());

        let none = BehaviorPattern::new().with_preference(-1, 3);
        assert!(!none.has_position_preference);
    }
}
