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

//! Card-selection decisions

use serde::{Deserialize, Serialize};

/// Strategy label carried by a decision rejected during input validation.
pub const STRATEGY_INVALID: &str = "Invalid";

/// One step of simulated deliberation: the card looked at and what was "thought"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoTStep {
    #[serde(alias = "card", alias = "cardIndex")]
    pub card_index: i32,
    #[serde(default)]
    pub thought: String,
}

impl CoTStep {
    pub fn new(card_index: i32, thought: impl Into<String>) -> Self {
        Self {
            card_index,
            thought: thought.into(),
        }
    }
}

/// Which card the opponent draws, how sure it looks, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIDecisionResult {
    pub selected_card_index: i32,
    pub confidence: f32,
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cot_steps: Vec<CoTStep>,
}

impl AIDecisionResult {
    pub fn new(selected_card_index: i32, confidence: f32, strategy: impl Into<String>) -> Self {
        Self {
            selected_card_index,
            confidence: confidence.clamp(0.0, 1.0),
            strategy: strategy.into(),
            cot_steps: Vec::new(),
        }
    }

    /// The degraded result returned for a non-positive candidate count
    pub fn invalid() -> Self {
        Self::new(0, 0.0, STRATEGY_INVALID)
    }

    pub fn with_steps(mut self, steps: Vec<CoTStep>) -> Self {
        self.cot_steps = steps;
        self
    }

    pub fn is_invalid(&self) -> bool {
        self.strategy == STRATEGY_INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_decision() {
        let decision = AIDecisionResult::invalid();
        assert_eq!(decision.selected_card_index, 0);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.is_invalid());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let decision = AIDecisionResult::new(1, 1.5, "Aggressive");
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_step_accepts_short_field_name() {
        let step: CoTStep = serde_json::from_str(r#"{"card": 2, "thought": "here"}"#).unwrap();
        assert_eq!(step, CoTStep::new(2, "here"));
    }
}
