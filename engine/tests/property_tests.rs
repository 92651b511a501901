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

//! Statistical and property checks over the engine's building blocks
//!
//! - Every dialogue request resolves, whatever the generator does
//! - Usage-weighted template selection converges on uniform
//! - Adjacent moods are reached more often than distant ones
//! - Generated visit patterns cover every candidate
//! - Cleared caches miss
//! - Adaptation approaches observed behavior without overshooting

use dealer_common::{
    AIDecisionResult, BehaviorPattern, DialogueCategory, EmotionalState, GameEvent, GameStateData,
    PersonalityProfile, Tempo,
};
use dealer_engine::cache::ResponseCache;
use dealer_engine::config::{AdaptationConfig, CacheConfig, HesitationConfig};
use dealer_engine::emotion::EmotionalStateMachine;
use dealer_engine::fallback::{FallbackController, RuleBasedGenerator};
use dealer_engine::hesitation::HesitationEngine;
use dealer_engine::llm::{AudioClip, GenerationError};
use dealer_engine::personality::{ObservedTraits, PersonalityAdapter};
use dealer_engine::session::AISessionState;
use dealer_engine::strings::{BuiltinStrings, StringTable};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::time::Duration;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime")
}

fn category() -> impl Strategy<Value = DialogueCategory> {
    prop::sample::select(DialogueCategory::ALL.to_vec())
}

fn tempo() -> impl Strategy<Value = Tempo> {
    prop::sample::select(vec![Tempo::Slow, Tempo::Normal, Tempo::Fast, Tempo::Erratic])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_dialogue_always_resolves(
        category in category(),
        doubt in 0.0f32..=1.0,
        tempo in tempo(),
        streak in 0u32..5,
        pressure in 0.0f32..=3.0,
        stall in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let runtime = paused_runtime();
        let mut controller = FallbackController::new(&BuiltinStrings::new());
        let mut rng = StdRng::seed_from_u64(seed);
        let pattern = BehaviorPattern::new().with_doubt(doubt).with_tempo(tempo).with_streak(streak);
        let timeout = Duration::from_millis(500);

        let (resolved, elapsed) = runtime.block_on(async {
            let start = tokio::time::Instant::now();
            let primary = async move {
                if stall {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Err::<String, _>(GenerationError::Transport("always fails".to_string()))
            };
            let resolved = controller
                .resolve_dialogue(Some(primary), timeout, category, &pattern, pressure, &mut rng)
                .await;
            (resolved, start.elapsed())
        });

        prop_assert!(!resolved.value.trim().is_empty());
        prop_assert!(elapsed <= timeout + Duration::from_millis(5));
    }

    #[test]
    fn prop_visit_pattern_covers_candidates(
        card_count in 1usize..12,
        pressure in 0.0f32..=3.0,
        seed in any::<u64>(),
    ) {
        let engine = HesitationEngine::new(&HesitationConfig::default(), &BuiltinStrings::new());
        let mut rng = StdRng::seed_from_u64(seed);
        let pattern = engine.visit_pattern(card_count, pressure, &mut rng);

        prop_assert!(pattern.len() >= card_count);
        prop_assert_eq!(pattern.len(), engine.total_steps(card_count, pressure));
        let seen: HashSet<usize> = pattern.iter().copied().collect();
        prop_assert_eq!(seen, (0..card_count).collect::<HashSet<_>>());
    }

    #[test]
    fn prop_adaptation_converges_without_overshoot(
        start in 0.0f32..=1.0,
        doubt in 0.0f32..=1.0,
        hover in 0.0f32..=10.0,
        tempo in tempo(),
    ) {
        let adapter = PersonalityAdapter::new(&AdaptationConfig::default());
        let pattern = BehaviorPattern::new()
            .with_doubt(doubt)
            .with_tempo(tempo)
            .with_timings(hover, 2.0);
        let observed = ObservedTraits::from_behavior(&pattern);
        let profile = PersonalityProfile::new()
            .with_cautiousness(start)
            .with_intuition(start)
            .with_resilience(start);
        let mut session = AISessionState::default();
        session.begin(Some(profile), GameStateData::new(1, 7, 7));

        let distance = |s: &AISessionState| {
            let p = s.adapted_profile.as_ref().unwrap();
            [
                (p.cautiousness, observed.cautiousness),
                (p.intuition, observed.intuition),
                (p.resilience, observed.resilience),
            ]
        };

        let mut previous = distance(&session);
        for _ in 0..40 {
            adapter.adapt(&mut session, &pattern);
            let current = distance(&session);
            for ((before, target), (after, _)) in previous.iter().zip(current.iter()) {
                // never crosses the observed value
                prop_assert!((before - target) * (after - target) >= -1e-6);
                prop_assert!((after - target).abs() <= (before - target).abs() + 1e-6);
            }
            previous = current;
        }
    }
}

#[test]
fn test_adapt_is_noop_when_observed_matches() {
    let adapter = PersonalityAdapter::default();
    let pattern = BehaviorPattern::new()
        .with_doubt(0.3)
        .with_tempo(Tempo::Normal)
        .with_timings(2.0, 2.0);
    let observed = ObservedTraits::from_behavior(&pattern);
    let profile = PersonalityProfile::new()
        .with_cautiousness(observed.cautiousness)
        .with_intuition(observed.intuition)
        .with_resilience(observed.resilience);

    let mut session = AISessionState::default();
    session.begin(Some(profile.clone()), GameStateData::new(1, 7, 7));
    for _ in 0..10 {
        assert_eq!(adapter.adapt(&mut session, &pattern), 0);
    }
    assert_eq!(session.adapted_profile, Some(profile));
    assert_eq!(session.adaptation_notes().count(), 0);
}

#[test]
fn test_weighted_selection_converges_to_uniform() {
    let strings = BuiltinStrings::new();
    let mut generator = RuleBasedGenerator::new(&strings);
    let mut rng = StdRng::seed_from_u64(2024);
    let pattern = BehaviorPattern::new().with_doubt(0.9);
    let draws = 3000u32;

    for _ in 0..draws {
        generator.generate(DialogueCategory::Stop, &pattern, 0.0, &mut rng);
    }

    let options = strings.get_array("fallback.stop_high_doubt");
    let expected = draws as f32 / options.len() as f32;
    for option in &options {
        let share = generator.usage_of(option) as f32;
        assert!(
            (share - expected).abs() / expected < 0.1,
            "{} drawn {} times, expected about {}",
            option,
            share,
            expected
        );
    }
}

#[test]
fn test_adjacent_transitions_are_more_likely() {
    let mut machine = EmotionalStateMachine::new(5);
    machine.set_inertia(0.5);
    let mut rng = StdRng::seed_from_u64(11);
    let trials = 2000;

    let mut count = |event: GameEvent, target: EmotionalState| {
        let mut hits = 0;
        for _ in 0..trials {
            machine.reset();
            if machine.handle_event(event, None, None, &mut rng) == Some(target) {
                hits += 1;
            }
        }
        hits
    };

    // Calm -> Anticipating is adjacent, Calm -> Frustrated is not
    let adjacent = count(GameEvent::PlayerHesitating, EmotionalState::Anticipating);
    let distant = count(GameEvent::AIDrawJoker, EmotionalState::Frustrated);
    assert!(adjacent > distant * 2, "adjacent={} distant={}", adjacent, distant);
}

#[tokio::test]
async fn test_cleared_cache_misses_every_key() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let keys: Vec<String> = (0..10).map(|i| format!("Stop_d{}_tNormal_s0_p0", i)).collect();
    for key in &keys {
        cache.set(key, "Put it down.").await;
        cache.set_decision(key, AIDecisionResult::new(1, 0.6, "Adaptive")).await;
        cache
            .set_audio(key, AudioClip::new(vec![0u8; 4], Duration::from_millis(500)))
            .await;
    }
    for key in &keys {
        assert!(cache.get(key).await.is_some());
        assert!(cache.get_decision(key).await.is_some());
        assert!(cache.get_audio(key).await.is_some());
    }

    cache.clear().await;
    for key in &keys {
        assert!(cache.get(key).await.is_none());
        assert!(cache.get_decision(key).await.is_none());
        assert!(cache.get_audio(key).await.is_none());
    }
}
