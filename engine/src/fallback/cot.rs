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

//! Scripted reasoning steps shown when the generator returned none.

use crate::strings::StringTable;
use dealer_common::{AIDecisionResult, BehaviorPattern, CoTStep, FacialExpression, Tempo};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;

const THOUGHT_PREFIX: &str = "cot_thoughts.";

#[derive(Debug, Default)]
pub struct FallbackReasoning {
    thoughts: HashMap<String, Vec<String>>,
}

impl FallbackReasoning {
    pub fn new(strings: &dyn StringTable) -> Self {
        let mut reasoning = Self::default();
        reasoning.reload(strings);
        reasoning
    }

    pub fn reload(&mut self, strings: &dyn StringTable) {
        self.thoughts = strings.get_array_dictionary(THOUGHT_PREFIX);
    }

    fn pick(&self, key: &str, fallback: &[&str], rng: &mut impl Rng) -> String {
        match self.thoughts.get(key).filter(|t| !t.is_empty()) {
            Some(lines) => lines.choose(rng).cloned().unwrap_or_default(),
            None => fallback.choose(rng).map(|s| s.to_string()).unwrap_or_default(),
        }
    }

    /// Scan, deduce, narrow (only with more than two cards), then lock on the target
    pub fn generate(
        &self,
        decision: &AIDecisionResult,
        pattern: &BehaviorPattern,
        pressure: f32,
        card_count: i32,
        rng: &mut impl Rng,
    ) -> Vec<CoTStep> {
        if card_count <= 0 {
            return Vec::new();
        }
        let target = decision.selected_card_index.clamp(0, card_count - 1);
        let scan_card = (target + 1) % card_count;
        let deduce_card = if card_count > 2 { (target + 2) % card_count } else { scan_card };

        let mut steps = vec![
            CoTStep::new(scan_card, self.scan_thought(pattern, rng)),
            CoTStep::new(deduce_card, self.deduce_thought(pattern, pressure)),
        ];
        if card_count > 2 {
            steps.push(CoTStep::new(scan_card, self.narrow_thought(pattern, rng)));
        }
        steps.push(CoTStep::new(target, self.lock_thought(decision.confidence, rng)));
        steps
    }

    fn reads_expression(pattern: &BehaviorPattern) -> bool {
        pattern.last_expression != FacialExpression::Neutral && pattern.expression_confidence > 0.4
    }

    fn scan_thought(&self, pattern: &BehaviorPattern, rng: &mut impl Rng) -> String {
        if Self::reads_expression(pattern) {
            let (key, fallback) = match pattern.last_expression {
                FacialExpression::Happy => ("scan_expression_happy", "That smile... hiding something?"),
                FacialExpression::Fearful => ("scan_expression_fearful", "Scared? Interesting..."),
                FacialExpression::Surprise => ("scan_expression_surprise", "Oh, flinched there?"),
                FacialExpression::Angry => ("scan_expression_angry", "Angry? Must be cornered"),
                FacialExpression::Sad => ("scan_expression_sad", "Looking sad... pressured huh?"),
                _ => ("scan_expression_default", "Your face says something..."),
            };
            return self.pick(key, &[fallback], rng);
        }
        self.pick(
            "scan_generic",
            &["Let me see...", "Reading your eyes...", "I see everything though"],
            rng,
        )
    }

    fn deduce_thought(&self, pattern: &BehaviorPattern, pressure: f32) -> String {
        let (key, fallback) = if pattern.shows_position_streak() {
            ("scan_same_position", "Same spot again... I see a pattern")
        } else if pattern.doubt_level > 0.6 {
            ("scan_high_doubt", "Hesitating... protecting something?")
        } else if pattern.tempo == Tempo::Fast {
            ("scan_fast_tempo", "Fast moves... panicked decisions")
        } else if pattern.tempo == Tempo::Erratic {
            ("scan_erratic", "Rhythm's off... you're shaken")
        } else if pressure > 2.0 {
            ("scan_high_pressure", "Cornered... no room to breathe")
        } else {
            ("scan_default", "Hmm... pretending to think here")
        };
        self.thoughts
            .get(key)
            .and_then(|lines| lines.first())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn narrow_thought(&self, pattern: &BehaviorPattern, rng: &mut impl Rng) -> String {
        let mismatch = Self::reads_expression(pattern)
            && ((pattern.last_expression == FacialExpression::Happy && pattern.doubt_level > 0.5)
                || (pattern.last_expression == FacialExpression::Fearful && pattern.tempo == Tempo::Fast));
        if mismatch {
            return self.pick("narrow_mismatch", &["Face and actions don't match... liar"], rng);
        }
        self.pick(
            "narrow_generic",
            &["This one... no wait", "Narrowing down... two left", "Almost... getting clearer"],
            rng,
        )
    }

    fn lock_thought(&self, confidence: f32, rng: &mut impl Rng) -> String {
        if confidence > 0.7 {
            self.pick(
                "final_high_confidence",
                &["...Right here", "Got it. This one", "The answer's clear"],
                rng,
            )
        } else {
            self.pick(
                "final_low_confidence",
                &["...Probably this", "Going with my gut", "Taking a gamble"],
                rng,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::BuiltinStrings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_four_steps_for_three_cards() {
        let reasoning = FallbackReasoning::new(&BuiltinStrings::new());
        let mut rng = StdRng::seed_from_u64(1);
        let decision = AIDecisionResult::new(0, 0.9, "Adaptive");
        let steps = reasoning.generate(&decision, &BehaviorPattern::new(), 0.0, 3, &mut rng);

        let cards: Vec<i32> = steps.iter().map(|s| s.card_index).collect();
        assert_eq!(cards, vec![1, 2, 1, 0]);
        assert!(["...Right here", "Got it. This one", "The answer's clear"]
            .contains(&steps[3].thought.as_str()));
    }

    #[test]
    fn test_three_steps_for_two_cards() {
        let reasoning = FallbackReasoning::default();
        let mut rng = StdRng::seed_from_u64(1);
        let decision = AIDecisionResult::new(1, 0.3, "Random");
        let steps = reasoning.generate(&decision, &BehaviorPattern::new(), 0.0, 2, &mut rng);

        let cards: Vec<i32> = steps.iter().map(|s| s.card_index).collect();
        assert_eq!(cards, vec![0, 0, 1]);
        assert!(["...Probably this", "Going with my gut", "Taking a gamble"]
            .contains(&steps[2].thought.as_str()));
    }

    #[test]
    fn test_thoughts_read_behavior() {
        let reasoning = FallbackReasoning::new(&BuiltinStrings::new());
        let mut rng = StdRng::seed_from_u64(4);
        let pattern = BehaviorPattern::new()
            .with_doubt(0.7)
            .with_expression(FacialExpression::Happy, 0.8);
        let decision = AIDecisionResult::new(4, 0.5, "Adaptive");
        let steps = reasoning.generate(&decision, &pattern, 0.0, 4, &mut rng);

        assert_eq!(steps[0].thought, "That smile... hiding something?");
        assert_eq!(steps[1].thought, "Hesitating... protecting something?");
        assert_eq!(steps[2].thought, "Face and actions don't match... liar");
        assert_eq!(steps[3].card_index, 3);
    }

    #[test]
    fn test_no_cards_no_steps() {
        let reasoning = FallbackReasoning::default();
        let mut rng = StdRng::seed_from_u64(4);
        let decision = AIDecisionResult::new(0, 0.5, "Adaptive");
        assert!(reasoning
            .generate(&decision, &BehaviorPattern::new(), 0.0, 0, &mut rng)
            .is_empty());
    }
}
