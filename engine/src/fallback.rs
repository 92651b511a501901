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

//! Tiered resolution: the generator first, then rule-based templates, then a
//! static table that cannot fail.

mod cot;
mod rules;
mod static_table;

pub use cot::FallbackReasoning;
pub use rules::{RuleBasedGenerator, template_key};
pub use static_table::StaticDialogueTable;

use crate::llm::GenerationResult;
use crate::strings::StringTable;
use dealer_common::{AIDecisionResult, BehaviorPattern, CoTStep, DialogueCategory, PersonalityProfile};
use metrics::counter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Which tier produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Primary,
    RuleBased,
    Static,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::RuleBased => "rule_based",
            Tier::Static => "static",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub tier: Tier,
}

impl<T> Resolved<T> {
    fn new(value: T, tier: Tier) -> Self {
        counter!("dealer.generation.tier", "tier" => tier.as_str()).increment(1);
        Self { value, tier }
    }
}

/// Race `primary` against `timeout`, yielding only a successful value
async fn race<T, F>(primary: F, timeout: Duration) -> Option<T>
where
    F: Future<Output = GenerationResult<T>>,
{
    match tokio::time::timeout(timeout, primary).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("Primary generation failed: {}", e);
            None
        }
        Err(_) => {
            warn!("Primary generation timed out after {:?}", timeout);
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct FallbackController {
    rules: RuleBasedGenerator,
    statics: StaticDialogueTable,
    reasoning: FallbackReasoning,
}

impl FallbackController {
    pub fn new(strings: &dyn StringTable) -> Self {
        Self {
            rules: RuleBasedGenerator::new(strings),
            statics: StaticDialogueTable::new(strings),
            reasoning: FallbackReasoning::new(strings),
        }
    }

    /// Reload every tier for a new locale and forget template usage
    pub fn reload(&mut self, strings: &dyn StringTable) {
        self.rules.reload(strings);
        self.rules.reset_usage();
        self.statics.reload(strings);
        self.reasoning.reload(strings);
    }

    pub fn set_player_profile(&mut self, profile: Option<PersonalityProfile>) {
        self.rules.set_player_profile(profile);
    }

    pub fn rules(&self) -> &RuleBasedGenerator {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleBasedGenerator {
        &mut self.rules
    }

    /// Always yields a non-empty line. `primary` of `None` skips straight to
    /// the rule-based tier.
    pub async fn resolve_dialogue<F>(
        &mut self,
        primary: Option<F>,
        timeout: Duration,
        category: DialogueCategory,
        pattern: &BehaviorPattern,
        pressure: f32,
        rng: &mut impl Rng,
    ) -> Resolved<String>
    where
        F: Future<Output = GenerationResult<String>>,
    {
        if let Some(primary) = primary {
            if let Some(text) = race(primary, timeout).await {
                let text = text.trim();
                if !text.is_empty() {
                    return Resolved::new(text.to_string(), Tier::Primary);
                }
                debug!("Primary returned an empty line");
            }
        }

        if let Some(text) = self.rules.generate(category, pattern, pressure, rng) {
            if !text.is_empty() {
                return Resolved::new(text, Tier::RuleBased);
            }
        }

        Resolved::new(self.statics.get(category, pressure), Tier::Static)
    }

    /// Always yields a decision. Invalid card counts short-circuit without
    /// polling `primary`.
    pub async fn resolve_decision<F>(
        &mut self,
        primary: Option<F>,
        timeout: Duration,
        card_count: i32,
        pattern: &BehaviorPattern,
        pressure: f32,
        rng: &mut impl Rng,
    ) -> Resolved<AIDecisionResult>
    where
        F: Future<Output = GenerationResult<AIDecisionResult>>,
    {
        if card_count <= 0 {
            warn!("Decision requested with card count {}", card_count);
            return Resolved::new(AIDecisionResult::invalid(), Tier::Static);
        }

        if let Some(primary) = primary {
            if let Some(mut decision) = race(primary, timeout).await {
                if !decision.is_invalid() {
                    decision.selected_card_index = decision.selected_card_index.clamp(0, card_count - 1);
                    return Resolved::new(decision, Tier::Primary);
                }
            }
        }

        let decision = self.rules.decide(card_count, pattern, pressure, rng);
        if !decision.is_invalid() {
            return Resolved::new(decision, Tier::RuleBased);
        }

        Resolved::new(
            AIDecisionResult::new(rng.random_range(0..card_count), 0.3, "Random"),
            Tier::Static,
        )
    }

    pub fn fallback_cot_steps(
        &self,
        decision: &AIDecisionResult,
        pattern: &BehaviorPattern,
        pressure: f32,
        card_count: i32,
        rng: &mut impl Rng,
    ) -> Vec<CoTStep> {
        self.reasoning.generate(decision, pattern, pressure, card_count, rng)
    }

    /// Static tier on its own
    pub fn static_line(&self, category: DialogueCategory, pressure: f32) -> String {
        self.statics.get(category, pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationError;
    use crate::strings::BuiltinStrings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicBool, Ordering};

    type Primary = std::future::Ready<GenerationResult<String>>;

    fn controller() -> FallbackController {
        FallbackController::new(&BuiltinStrings::new())
    }

    #[tokio::test]
    async fn test_primary_success_is_used() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let resolved = controller
            .resolve_dialogue(
                Some(std::future::ready(Ok("  Nice try.  ".to_string()))),
                Duration::from_secs(1),
                DialogueCategory::Stop,
                &BehaviorPattern::new(),
                0.0,
                &mut rng,
            )
            .await;
        assert_eq!(resolved, Resolved { value: "Nice try.".to_string(), tier: Tier::Primary });
    }

    #[tokio::test]
    async fn test_empty_or_failed_primary_falls_to_rules() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let pattern = BehaviorPattern::new().with_doubt(0.9);
        let options = BuiltinStrings::new().get_array("fallback.stop_high_doubt");

        for primary in [
            Ok(String::new()),
            Err(GenerationError::Transport("down".to_string())),
        ] {
            let resolved = controller
                .resolve_dialogue(
                    Some(std::future::ready(primary)),
                    Duration::from_secs(1),
                    DialogueCategory::Stop,
                    &pattern,
                    0.0,
                    &mut rng,
                )
                .await;
            assert_eq!(resolved.tier, Tier::RuleBased);
            assert!(options.contains(&resolved.value));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_times_out() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, GenerationError>("too late".to_string())
        };
        let resolved = controller
            .resolve_dialogue(
                Some(slow),
                Duration::from_millis(500),
                DialogueCategory::General,
                &BehaviorPattern::new(),
                0.0,
                &mut rng,
            )
            .await;
        assert_ne!(resolved.tier, Tier::Primary);
        assert!(!resolved.value.is_empty());
    }

    #[tokio::test]
    async fn test_static_tier_when_no_templates() {
        let mut controller = FallbackController::default();
        let mut rng = StdRng::seed_from_u64(1);
        let resolved = controller
            .resolve_dialogue(
                None::<Primary>,
                Duration::from_secs(1),
                DialogueCategory::Bait,
                &BehaviorPattern::new(),
                0.0,
                &mut rng,
            )
            .await;
        assert_eq!(resolved, Resolved { value: "...".to_string(), tier: Tier::Static });
    }

    #[tokio::test]
    async fn test_invalid_card_count_never_polls_primary() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let polled = AtomicBool::new(false);
        let primary = async {
            polled.store(true, Ordering::SeqCst);
            Ok::<AIDecisionResult, GenerationError>(AIDecisionResult::new(0, 1.0, "Never"))
        };
        let resolved = controller
            .resolve_decision(
                Some(primary),
                Duration::from_secs(1),
                0,
                &BehaviorPattern::new(),
                0.0,
                &mut rng,
            )
            .await;
        assert!(!polled.load(Ordering::SeqCst));
        assert!(resolved.value.is_invalid());
        assert_eq!(resolved.value.confidence, 0.0);
        assert_eq!(resolved.value.selected_card_index, 0);
    }

    #[tokio::test]
    async fn test_primary_decision_index_is_clamped() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let resolved = controller
            .resolve_decision(
                Some(std::future::ready(Ok(AIDecisionResult::new(9, 0.8, "Analytical")))),
                Duration::from_secs(1),
                3,
                &BehaviorPattern::new(),
                0.0,
                &mut rng,
            )
            .await;
        assert_eq!(resolved.tier, Tier::Primary);
        assert_eq!(resolved.value.selected_card_index, 2);
    }

    #[tokio::test]
    async fn test_decision_without_primary_uses_rules() {
        let mut controller = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let resolved = controller
            .resolve_decision(
                None::<std::future::Ready<GenerationResult<AIDecisionResult>>>,
                Duration::from_secs(1),
                4,
                &BehaviorPattern::new().with_doubt(0.8),
                0.0,
                &mut rng,
            )
            .await;
        assert_eq!(resolved.tier, Tier::RuleBased);
        assert_eq!(resolved.value.selected_card_index, 2);
        assert_eq!(resolved.value.strategy, "Aggressive");
    }
}
