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

use crate::config::HistoryConfig;
use chrono::{DateTime, Utc};
use dealer_common::{
    AIDecisionResult, DialogueCategory, DialogueMemory, EmotionalState, GameStateData,
    PersonalityProfile, PlayerAction,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MAX_PRESSURE: f32 = 3.0;
/// Pressure lost per second of idle time
pub const PRESSURE_DECAY_RATE: f32 = 0.1;

/// A decision the opponent made this session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMemory {
    pub selected_card_index: i32,
    pub confidence: f32,
    pub strategy: String,
    pub turn_number: u32,
    pub timestamp: DateTime<Utc>,
}

fn push_capped<T>(buffer: &mut VecDeque<T>, item: T, cap: usize) {
    buffer.push_back(item);
    while buffer.len() > cap {
        buffer.pop_front();
    }
}

fn recent<T: Clone>(buffer: &VecDeque<T>, count: usize) -> Vec<T> {
    buffer
        .iter()
        .skip(buffer.len().saturating_sub(count))
        .cloned()
        .collect()
}

/// Everything the opponent knows about the game in progress
#[derive(Debug, Clone)]
pub struct AISessionState {
    /// Unique id for this session
    pub id: uuid::Uuid,

    /// Profile as it stood when the session began
    pub base_profile: Option<PersonalityProfile>,

    /// Profile adjusted turn by turn from observed behavior
    pub adapted_profile: Option<PersonalityProfile>,

    /// Mirrors the emotional state machine
    pub emotion: EmotionalState,

    /// Turn, card counts and phase
    pub game: GameStateData,

    pub started_at: DateTime<Utc>,

    pressure: f32,
    dialogue_history: VecDeque<DialogueMemory>,
    decision_history: VecDeque<DecisionMemory>,
    adaptation_notes: VecDeque<String>,
    behavior_history: VecDeque<PlayerAction>,
    limits: HistoryConfig,
}

impl AISessionState {
    pub fn new(limits: &HistoryConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            base_profile: None,
            adapted_profile: None,
            emotion: EmotionalState::Calm,
            game: GameStateData::default(),
            started_at: Utc::now(),
            pressure: 0.0,
            dialogue_history: VecDeque::new(),
            decision_history: VecDeque::new(),
            adaptation_notes: VecDeque::new(),
            behavior_history: VecDeque::new(),
            limits: limits.clone(),
        }
    }

    /// Start a fresh session, freezing `profile` as the base
    pub fn begin(&mut self, profile: Option<PersonalityProfile>, game: GameStateData) {
        *self = Self::new(&self.limits);
        self.base_profile = profile.clone();
        self.adapted_profile = profile;
        self.game = game;
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    pub fn update_pressure(&mut self, delta: f32) {
        self.pressure = (self.pressure + delta).clamp(0.0, MAX_PRESSURE);
    }

    pub fn decay_pressure(&mut self, delta_time: f32) {
        self.pressure = (self.pressure - delta_time.max(0.0) * PRESSURE_DECAY_RATE).max(0.0);
    }

    pub fn record_dialogue(&mut self, category: DialogueCategory, text: &str) {
        let memory = DialogueMemory {
            turn_number: self.game.turn_number,
            category,
            text: text.to_string(),
        };
        push_capped(&mut self.dialogue_history, memory, self.limits.max_dialogue_history);
    }

    pub fn record_behavior(&mut self, action: PlayerAction) {
        push_capped(&mut self.behavior_history, action, self.limits.max_behavior_history);
    }

    pub fn add_adaptation_note(&mut self, note: &str) {
        let note = format!("[Turn {}] {}", self.game.turn_number, note);
        push_capped(&mut self.adaptation_notes, note, self.limits.max_adaptation_notes);
    }

    pub fn record_decision(&mut self, decision: &AIDecisionResult) {
        let memory = DecisionMemory {
            selected_card_index: decision.selected_card_index,
            confidence: decision.confidence,
            strategy: decision.strategy.clone(),
            turn_number: self.game.turn_number,
            timestamp: Utc::now(),
        };
        push_capped(&mut self.decision_history, memory, self.limits.max_decision_history);
        self.add_adaptation_note(&format!(
            "AI decided index={}, confidence={:.2}, strategy={}",
            decision.selected_card_index, decision.confidence, decision.strategy
        ));
    }

    pub fn last_decision(&self) -> Option<&DecisionMemory> {
        self.decision_history.back()
    }

    pub fn recent_decisions(&self, count: usize) -> Vec<DecisionMemory> {
        recent(&self.decision_history, count)
    }

    pub fn recent_dialogues(&self, count: usize) -> Vec<DialogueMemory> {
        recent(&self.dialogue_history, count)
    }

    pub fn dialogue_history(&self) -> impl Iterator<Item = &DialogueMemory> {
        self.dialogue_history.iter()
    }

    pub fn behavior_history(&self) -> impl Iterator<Item = &PlayerAction> {
        self.behavior_history.iter()
    }

    pub fn adaptation_notes(&self) -> impl Iterator<Item = &String> {
        self.adaptation_notes.iter()
    }

    pub fn spoke_category(&self, category: DialogueCategory) -> bool {
        self.dialogue_history.iter().any(|d| d.category == category)
    }
}

impl Default for AISessionState {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(position: i32, turn: u32) -> PlayerAction {
        PlayerAction {
            selected_position: position,
            hover_duration: 1.0,
            decision_time: 2.0,
            doubt_level: 0.5,
            turn_number: turn,
        }
    }

    #[test]
    fn test_pressure_is_clamped_and_decays() {
        let mut session = AISessionState::default();
        session.update_pressure(5.0);
        assert_eq!(session.pressure(), MAX_PRESSURE);
        session.decay_pressure(10.0);
        assert!((session.pressure() - 2.0).abs() < 1e-6);
        session.update_pressure(-9.0);
        assert_eq!(session.pressure(), 0.0);
        session.decay_pressure(1.0);
        assert_eq!(session.pressure(), 0.0);
    }

    #[test]
    fn test_ring_buffers_respect_caps() {
        let mut session = AISessionState::default();
        for i in 0..20 {
            session.record_dialogue(DialogueCategory::General, &format!("line {}", i));
            session.record_behavior(action(i % 3, i as u32));
            session.record_decision(&AIDecisionResult::new(i % 3, 0.5, "Adaptive"));
        }
        assert_eq!(session.dialogue_history().count(), 6);
        assert_eq!(session.behavior_history().count(), 10);
        assert_eq!(session.recent_decisions(100).len(), 10);
        assert_eq!(session.adaptation_notes().count(), 10);
        assert_eq!(session.recent_dialogues(2)[1].text, "line 19");
    }

    #[test]
    fn test_record_decision_adds_note() {
        let mut session = AISessionState::default();
        session.game = GameStateData::new(3, 5, 6);
        session.record_decision(&AIDecisionResult::new(2, 0.75, "Cautious"));

        let note = session.adaptation_notes().last().unwrap();
        assert_eq!(note, "[Turn 3] AI decided index=2, confidence=0.75, strategy=Cautious");
        assert_eq!(session.last_decision().unwrap().turn_number, 3);
    }

    #[test]
    fn test_begin_resets_and_freezes_profile() {
        let mut session = AISessionState::default();
        session.record_dialogue(DialogueCategory::Mirror, "again?");
        session.update_pressure(2.0);
        let old_id = session.id;

        let profile = PersonalityProfile::new().with_cautiousness(0.8);
        session.begin(Some(profile.clone()), GameStateData::new(1, 7, 7));

        assert_ne!(session.id, old_id);
        assert_eq!(session.pressure(), 0.0);
        assert!(!session.spoke_category(DialogueCategory::Mirror));
        assert_eq!(session.base_profile, Some(profile.clone()));
        assert_eq!(session.adapted_profile, Some(profile));
    }
}
