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

//! Template-driven lines and heuristic decisions used when the generator is
//! unavailable.

use crate::strings::StringTable;
use dealer_common::{
    AIDecisionResult, BehaviorPattern, DialogueCategory, FacialExpression, PersonalityProfile,
    Tempo,
};
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

const TEMPLATE_PREFIX: &str = "fallback.";
const PERSONALITY_CHANCE: f32 = 0.25;
const PERSONALITY_READ_CHANCE: f32 = 0.35;
const DEEP_READ_CHANCE: f32 = 0.15;
const EXPRESSION_READ_CHANCE: f32 = 0.2;
const PREDICT_CHANCE: f32 = 0.2;

/// Pick the template key for a category and the player's current behavior
pub fn template_key(
    category: DialogueCategory,
    pattern: &BehaviorPattern,
    pressure: f32,
) -> &'static str {
    match category {
        DialogueCategory::Stop => {
            if pattern.doubt_level > 0.7 {
                "stop_high_doubt"
            } else if pressure > 1.5 {
                "stop_medium"
            } else {
                "stop_low"
            }
        }
        DialogueCategory::Bait => {
            if pattern.tempo == Tempo::Fast {
                "bait_fast_tempo"
            } else if pressure > 2.0 {
                "bait_high_pressure"
            } else {
                "bait_medium"
            }
        }
        DialogueCategory::Mirror => {
            if pattern.streak_same_position >= 2 {
                "mirror_pattern_detected"
            } else if pattern.has_position_preference {
                "mirror_position_preference"
            } else {
                "mirror_pattern_detected"
            }
        }
        DialogueCategory::Hesitation => {
            if pressure < 1.0 {
                "hesitation_low_pressure"
            } else if pressure < 2.0 {
                "hesitation_medium_pressure"
            } else {
                "hesitation_high_pressure"
            }
        }
        DialogueCategory::General => {
            if pattern.expression_confidence > 0.5 {
                match pattern.last_expression {
                    FacialExpression::Fearful if pattern.doubt_level > 0.5 => {
                        return "general_nervous";
                    }
                    FacialExpression::Happy if pattern.doubt_level < 0.3 => {
                        return "general_player_confident";
                    }
                    FacialExpression::Surprise => return "general_surprised",
                    _ => {}
                }
            }
            if pressure > 1.5 {
                "general_confident"
            } else {
                "general_neutral"
            }
        }
    }
}

/// Usage-weighted pick: weight is `1 / (usage + 1)`, counted per template text
fn select_weighted(
    usage: &mut HashMap<String, u32>,
    options: &[String],
    rng: &mut impl Rng,
) -> Option<String> {
    let last = options.last()?;
    let weights: Vec<f32> = options
        .iter()
        .map(|o| 1.0 / (usage.get(o).copied().unwrap_or(0) as f32 + 1.0))
        .collect();
    let total: f32 = weights.iter().sum();

    let mut roll = rng.random::<f32>() * total;
    let mut picked = last;
    for (option, weight) in options.iter().zip(&weights) {
        if roll < *weight {
            picked = option;
            break;
        }
        roll -= weight;
    }

    *usage.entry(picked.clone()).or_insert(0) += 1;
    Some(picked.clone())
}

#[derive(Debug, Default)]
pub struct RuleBasedGenerator {
    templates: HashMap<String, Vec<String>>,
    usage: HashMap<String, u32>,
    profile: Option<PersonalityProfile>,
    personality_read_lines: Vec<String>,
    personality_read_index: usize,
}

impl RuleBasedGenerator {
    pub fn new(strings: &dyn StringTable) -> Self {
        let mut generator = Self::default();
        generator.reload(strings);
        generator
    }

    /// Reload templates for the active locale. Usage counts are kept.
    pub fn reload(&mut self, strings: &dyn StringTable) {
        self.templates = strings.get_array_dictionary(TEMPLATE_PREFIX);
        debug!("Loaded {} rule-based templates", self.templates.len());
    }

    pub fn reset_usage(&mut self) {
        self.usage.clear();
    }

    pub fn set_player_profile(&mut self, profile: Option<PersonalityProfile>) {
        self.profile = profile;
    }

    /// Lines produced in the background that read the player's personality
    pub fn set_personality_read_lines(&mut self, lines: Vec<String>) {
        self.personality_read_lines = lines;
        self.personality_read_index = 0;
    }

    pub fn has_templates(&self, key: &str) -> bool {
        self.templates.get(key).is_some_and(|t| !t.is_empty())
    }

    pub fn usage_of(&self, text: &str) -> u32 {
        self.usage.get(text).copied().unwrap_or(0)
    }

    fn pick(&mut self, key: &str, rng: &mut impl Rng) -> Option<String> {
        let options = self.templates.get(key)?;
        select_weighted(&mut self.usage, options, rng)
    }

    fn single(&self, key: &str, fallback: &str) -> String {
        self.templates
            .get(key)
            .and_then(|lines| lines.first())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn personality_key(&self, deep: bool) -> Option<String> {
        let (dominant, _) = self.profile.as_ref()?.dominant_trait()?;
        Some(if deep {
            format!("personality_read_{}_deep", dominant.key_suffix())
        } else {
            format!("personality_{}", dominant.key_suffix())
        })
    }

    /// Expand `{position}` and `{expression}`
    pub fn apply_pattern_replacement(&self, text: &str, pattern: &BehaviorPattern) -> String {
        let mut out = text.to_string();
        if out.contains("{position}") {
            let key = match pattern.preferred_position {
                0 => "position_left",
                1 => "position_center",
                2 => "position_right",
                _ => "position_default",
            };
            let fallback = dealer_common::position_label(pattern.preferred_position).unwrap_or("there");
            out = out.replace("{position}", &self.single(key, fallback));
        }
        if out.contains("{expression}") {
            out = out.replace("{expression}", pattern.last_expression.display_name());
        }
        out
    }

    fn pick_for(
        &mut self,
        key: &str,
        pattern: Option<&BehaviorPattern>,
        rng: &mut impl Rng,
    ) -> Option<String> {
        let line = self.pick(key, rng)?;
        Some(match pattern {
            Some(p) => self.apply_pattern_replacement(&line, p),
            None => line,
        })
    }

    /// Rule-based line for `category`, or `None` when no template exists
    pub fn generate(
        &mut self,
        category: DialogueCategory,
        pattern: &BehaviorPattern,
        pressure: f32,
        rng: &mut impl Rng,
    ) -> Option<String> {
        if self.profile.is_some() && rng.random::<f32>() < PERSONALITY_CHANCE {
            if let Some(key) = self.personality_key(false) {
                if self.has_templates(&key) {
                    return self.pick(&key, rng);
                }
            }
        }

        let key = template_key(category, pattern, pressure);
        self.pick_for(key, Some(pattern), rng)
    }

    /// Heuristic card choice
    pub fn decide(
        &self,
        card_count: i32,
        pattern: &BehaviorPattern,
        pressure: f32,
        rng: &mut impl Rng,
    ) -> AIDecisionResult {
        if card_count <= 0 {
            return AIDecisionResult::invalid();
        }

        let preferred = pattern.preferred_position;
        if pattern.has_position_preference
            && (0..card_count).contains(&preferred)
            && pattern.streak_same_position >= 2
            && card_count >= 2
        {
            let mut index = rng.random_range(0..card_count - 1);
            if index >= preferred {
                index += 1;
            }
            return AIDecisionResult::new(index, 0.7, "Adaptive");
        }

        if pattern.doubt_level > 0.7 && card_count >= 2 {
            return AIDecisionResult::new(card_count / 2, 0.65, "Aggressive");
        }

        if pressure > 2.0 && card_count >= 2 {
            let index = if rng.random_bool(0.5) { 0 } else { card_count - 1 };
            return AIDecisionResult::new(index, 0.55, "Cautious");
        }

        AIDecisionResult::new(rng.random_range(0..card_count), 0.5, "Adaptive")
    }

    /// Taunt at the start of the player's turn
    pub fn turn_start(
        &mut self,
        pattern: Option<&BehaviorPattern>,
        turn: u32,
        rng: &mut impl Rng,
    ) -> String {
        if turn <= 2 {
            return self
                .pick("turn_start_observation_early", rng)
                .or_else(|| self.pick("turn_start_general_early", rng))
                .unwrap_or_else(|| self.single("turn_start_early_fallback", "Show me what you've got."));
        }

        if !self.personality_read_lines.is_empty() && rng.random::<f32>() < PERSONALITY_READ_CHANCE {
            let line = self.personality_read_lines
                [self.personality_read_index % self.personality_read_lines.len()]
            .clone();
            self.personality_read_index += 1;
            return line;
        }

        if turn >= 4 && rng.random::<f32>() < DEEP_READ_CHANCE {
            if let Some(key) = self.personality_key(true) {
                if let Some(line) = self.pick(&key, rng) {
                    return line;
                }
            }
        }

        if let Some(p) = pattern {
            if p.expression_confidence > 0.5 && rng.random::<f32>() < EXPRESSION_READ_CHANCE {
                let key = match p.last_expression {
                    FacialExpression::Fearful | FacialExpression::Sad => Some("turn_start_read_nervous"),
                    FacialExpression::Happy => Some("turn_start_read_smiling"),
                    FacialExpression::Surprise => Some("turn_start_read_surprised"),
                    _ => None,
                };
                if let Some(line) = key.and_then(|k| self.pick_for(k, pattern, rng)) {
                    return line;
                }
            }
        }

        let key = match pattern {
            Some(p) if p.shows_position_streak() => "turn_start_read_position",
            Some(p) if p.tempo == Tempo::Fast => "turn_start_read_tempo",
            Some(p) if p.doubt_level > 0.5 => "turn_start_read_doubt",
            Some(p) if p.streak_same_position >= 2 => "turn_start_read_pattern",
            _ if turn >= 4 && rng.random::<f32>() < PREDICT_CHANCE => "turn_start_predict",
            _ if turn <= 3 => "turn_start_general_early",
            _ if turn <= 8 => "turn_start_general_mid",
            _ => "turn_start_general_late",
        };

        self.pick_for(key, pattern, rng)
            .unwrap_or_else(|| self.single("turn_start_fallback", "Go on, choose."))
    }

    /// Spoken justification as the AI begins its own draw
    pub fn ai_turn_reasoning(
        &mut self,
        pattern: Option<&BehaviorPattern>,
        turn: u32,
        player_card_count: u32,
        rng: &mut impl Rng,
    ) -> String {
        let key = match pattern {
            _ if player_card_count <= 3 => "ai_turn_reason_endgame",
            None => "ai_turn_reason_early",
            Some(_) if turn <= 3 => "ai_turn_reason_early",
            Some(p) if p.shows_position_streak() => "ai_turn_reason_position",
            Some(p) if p.tempo == Tempo::Fast => "ai_turn_reason_fast_tempo",
            Some(p) if p.doubt_level > 0.5 => "ai_turn_reason_doubt",
            Some(p) if p.streak_same_position >= 2 => "ai_turn_reason_pattern",
            Some(_) => "ai_turn_reason_general",
        };

        self.pick_for(key, pattern, rng)
            .unwrap_or_else(|| self.single("ai_turn_general_fallback", "My turn... now, which one?"))
    }

    pub fn ai_draw_comment(
        &mut self,
        drawn_joker: bool,
        formed_pair: bool,
        pattern: Option<&BehaviorPattern>,
        rng: &mut impl Rng,
    ) -> String {
        let key = if drawn_joker {
            "ai_draw_comment_joker"
        } else if formed_pair {
            "ai_draw_comment_pair"
        } else {
            "ai_draw_comment_neutral"
        };

        self.pick_for(key, pattern, rng)
            .unwrap_or_else(|| self.single("draw_comment_fallback", "Hmph..."))
    }

    pub fn joker_tease(&mut self, is_real_joker: bool, rng: &mut impl Rng) -> String {
        let key = if is_real_joker { "joker_tease_real" } else { "joker_tease_bluff" };
        self.pick(key, rng)
            .unwrap_or_else(|| self.single("joker_tease_fallback", "The joker is right here..."))
    }

    /// Taunt while the player stalls; `idle_index` selects the first or second nudge
    pub fn idle_taunt(
        &mut self,
        idle_index: u32,
        pattern: Option<&BehaviorPattern>,
        rng: &mut impl Rng,
    ) -> String {
        if let Some(p) = pattern.filter(|p| p.expression_confidence > 0.5) {
            let key = match p.last_expression {
                FacialExpression::Fearful | FacialExpression::Sad => Some("idle_taunt_expression_nervous"),
                FacialExpression::Angry => Some("idle_taunt_expression_angry"),
                FacialExpression::Happy => Some("idle_taunt_expression_smiling"),
                _ => None,
            };
            if let Some(line) = key.and_then(|k| self.pick_for(k, pattern, rng)) {
                return line;
            }
        }

        let (key, fallback_key, fallback) = if idle_index == 0 {
            ("idle_taunt_1", "idle_taunt_1_fallback", "Your hand stopped...")
        } else {
            ("idle_taunt_2", "idle_taunt_2_fallback", "Not that one...")
        };
        self.pick_for(key, pattern, rng)
            .unwrap_or_else(|| self.single(fallback_key, fallback))
    }
}
