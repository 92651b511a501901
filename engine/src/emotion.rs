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

use dealer_common::{AIDecisionResult, BehaviorPattern, EmotionalState, GameEvent, PersonalityProfile};
use metrics::counter;
use rand::Rng;
use std::collections::VecDeque;
use std::fmt::Write;
use tracing::debug;

pub const DEFAULT_INERTIA: f32 = 0.7;
const UNNATURAL_TRANSITION: f32 = 0.3;

/// Moods reachable without a jarring jump
pub const ADJACENCY: &[(EmotionalState, &[EmotionalState])] = &[
    (
        EmotionalState::Calm,
        &[EmotionalState::Anticipating, EmotionalState::Pleased],
    ),
    (
        EmotionalState::Anticipating,
        &[
            EmotionalState::Pleased,
            EmotionalState::Frustrated,
            EmotionalState::Hurt,
            EmotionalState::Relieved,
        ],
    ),
    (
        EmotionalState::Pleased,
        &[EmotionalState::Calm, EmotionalState::Anticipating],
    ),
    (
        EmotionalState::Frustrated,
        &[
            EmotionalState::Calm,
            EmotionalState::Hurt,
            EmotionalState::Anticipating,
        ],
    ),
    (
        EmotionalState::Hurt,
        &[EmotionalState::Frustrated, EmotionalState::Calm],
    ),
    (
        EmotionalState::Relieved,
        &[EmotionalState::Calm, EmotionalState::Pleased],
    ),
];

pub fn is_adjacent(from: EmotionalState, to: EmotionalState) -> bool {
    ADJACENCY
        .iter()
        .find(|(state, _)| *state == from)
        .is_some_and(|(_, targets)| targets.contains(&to))
}

/// 1.0 for adjacent or identical states, 0.3 otherwise
pub fn naturalness(from: EmotionalState, to: EmotionalState) -> f32 {
    if from == to || is_adjacent(from, to) {
        1.0
    } else {
        UNNATURAL_TRANSITION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmotionTransition {
    pub from: EmotionalState,
    pub to: EmotionalState,
    pub trigger: GameEvent,
}

#[derive(Debug)]
pub struct EmotionalStateMachine {
    current: EmotionalState,
    inertia: f32,
    history: VecDeque<EmotionTransition>,
    history_cap: usize,
    profile: Option<PersonalityProfile>,
}

impl Default for EmotionalStateMachine {
    fn default() -> Self {
        Self::new(5)
    }
}

impl EmotionalStateMachine {
    pub fn new(history_cap: usize) -> Self {
        Self {
            current: EmotionalState::Calm,
            inertia: DEFAULT_INERTIA,
            history: VecDeque::with_capacity(history_cap),
            history_cap: history_cap.max(1),
            profile: None,
        }
    }

    pub fn current(&self) -> EmotionalState {
        self.current
    }

    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    pub fn set_inertia(&mut self, inertia: f32) {
        self.inertia = inertia.clamp(0.0, 1.0);
    }

    /// Attach the player's profile at session start; resilient players make the
    /// opponent steadier. Without a profile inertia returns to its default.
    pub fn set_profile(&mut self, profile: Option<PersonalityProfile>) {
        match &profile {
            Some(p) => {
                let t = 1.0 - p.resilience;
                self.inertia = 0.5 + (0.85 - 0.5) * t;
                debug!(
                    "Emotion profile set: resilience={:.2}, inertia={:.2}",
                    p.resilience, self.inertia
                );
            }
            None => self.inertia = DEFAULT_INERTIA,
        }
        self.profile = profile;
    }

    /// Swap in a drifted profile for event targets. Inertia stays as set at
    /// session start.
    pub fn update_profile(&mut self, profile: Option<PersonalityProfile>) {
        self.profile = profile;
    }

    pub fn history(&self) -> impl Iterator<Item = &EmotionTransition> {
        self.history.iter()
    }

    pub fn target_for(
        &self,
        event: GameEvent,
        pattern: Option<&BehaviorPattern>,
        last_decision: Option<&AIDecisionResult>,
    ) -> EmotionalState {
        let profile = self.profile.as_ref();
        match event {
            GameEvent::PlayerHesitating => {
                if profile.is_some_and(|p| p.cautiousness > 0.6) {
                    EmotionalState::Pleased
                } else {
                    EmotionalState::Anticipating
                }
            }
            GameEvent::PlayerShowingPattern => EmotionalState::Pleased,
            GameEvent::GameNearEnd => {
                if profile.is_some_and(|p| p.consistency > 0.7) {
                    EmotionalState::Pleased
                } else {
                    EmotionalState::Anticipating
                }
            }
            GameEvent::AIDrawSuccessful => EmotionalState::Pleased,
            GameEvent::AIDrawJoker => {
                if profile.is_some_and(|p| p.resilience > 0.7) {
                    EmotionalState::Hurt
                } else {
                    EmotionalState::Frustrated
                }
            }
            GameEvent::PlayerDrawSuccessful => {
                if pattern.is_some_and(|b| b.doubt_level > 0.6) {
                    EmotionalState::Hurt
                } else {
                    EmotionalState::Frustrated
                }
            }
            GameEvent::PlayerDrawJoker => EmotionalState::Relieved,
            GameEvent::PairMatched => EmotionalState::Calm,
            GameEvent::TurnStart => {
                if last_decision.is_some_and(|d| d.confidence > 0.7) {
                    EmotionalState::Pleased
                } else {
                    EmotionalState::Calm
                }
            }
        }
    }

    pub fn transition_probability(&self, target: EmotionalState) -> f32 {
        ((1.0 - self.inertia) * naturalness(self.current, target)).clamp(0.0, 1.0)
    }

    /// Move toward the event's target mood, subject to inertia. Returns the
    /// new state when it changed.
    pub fn handle_event(
        &mut self,
        event: GameEvent,
        pattern: Option<&BehaviorPattern>,
        last_decision: Option<&AIDecisionResult>,
        rng: &mut impl Rng,
    ) -> Option<EmotionalState> {
        let target = self.target_for(event, pattern, last_decision);
        if target == self.current {
            return None;
        }

        let probability = self.transition_probability(target);
        if rng.random::<f32>() < probability {
            let from = self.current;
            self.record(from, target, event);
            self.current = target;
            counter!("dealer.emotion.transitions").increment(1);
            debug!("Emotion transition: {} -> {} (trigger: {})", from, target, event);
            Some(target)
        } else {
            debug!("Transition to {} suppressed by inertia ({:.2})", target, self.inertia);
            None
        }
    }

    /// Set the state unconditionally. The change is always recorded.
    pub fn force_state(&mut self, state: EmotionalState, trigger: GameEvent) {
        let from = self.current;
        self.record(from, state, trigger);
        self.current = state;
        debug!("Forced emotion: {} -> {}", from, state);
    }

    fn record(&mut self, from: EmotionalState, to: EmotionalState, trigger: GameEvent) {
        self.history.push_back(EmotionTransition { from, to, trigger });
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// Current state and the last three transitions, for prompts
    pub fn emotional_context(&self) -> String {
        if self.history.is_empty() {
            return format!("Current emotional state: {} (no transitions yet)", self.current);
        }

        let mut context = format!("Current emotional state: {}\nRecent emotional transitions:\n", self.current);
        let skip = self.history.len().saturating_sub(3);
        for t in self.history.iter().skip(skip) {
            let _ = writeln!(context, "- {} → {} (trigger: {})", t.from, t.to, t.trigger);
        }
        context
    }

    pub fn reset(&mut self) {
        self.current = EmotionalState::Calm;
        self.history.clear();
    }
}
