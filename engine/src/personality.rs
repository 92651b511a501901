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

//! Turn-by-turn drift of the player's profile toward what their behavior shows.

use crate::cache::split_variations;
use crate::config::AdaptationConfig;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::session::AISessionState;
use dealer_common::{BehaviorPattern, PersonalityProfile, Tempo};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const STABLE_DIFF: f32 = 0.1;
const READ_LINE_COUNT: usize = 6;

/// Trait estimates read off a single behavior snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedTraits {
    pub cautiousness: f32,
    pub intuition: f32,
    pub resilience: f32,
}

impl ObservedTraits {
    pub fn from_behavior(pattern: &BehaviorPattern) -> Self {
        let hover_score = (pattern.avg_hover_time / 5.0).clamp(0.0, 1.0);
        let tempo_score = match pattern.tempo {
            Tempo::Fast => 1.0,
            Tempo::Normal => 0.5,
            _ => 0.0,
        };
        let resilience = if pattern.tempo == Tempo::Erratic {
            0.3
        } else if pattern.doubt_level < 0.5 {
            0.8
        } else {
            0.5
        };

        Self {
            cautiousness: (hover_score + pattern.doubt_level) / 2.0,
            intuition: (tempo_score + (1.0 - pattern.doubt_level)) / 2.0,
            resilience,
        }
    }
}

/// Weak points and tactics suggested by the generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsights {
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PersonalityAdapter {
    threshold: f32,
    rate: f32,
}

impl Default for PersonalityAdapter {
    fn default() -> Self {
        Self::new(&AdaptationConfig::default())
    }
}

impl PersonalityAdapter {
    pub fn new(config: &AdaptationConfig) -> Self {
        Self {
            threshold: config.threshold,
            rate: config.rate.clamp(0.0, 1.0),
        }
    }

    fn blend(&self, current: f32, observed: f32) -> Option<f32> {
        if (current - observed).abs() > self.threshold {
            Some(current + (observed - current) * self.rate)
        } else {
            None
        }
    }

    /// Nudge the session's adapted profile toward `pattern`. Returns how many
    /// traits moved.
    pub fn adapt(&self, session: &mut AISessionState, pattern: &BehaviorPattern) -> usize {
        let Some(profile) = session.adapted_profile.as_mut() else {
            return 0;
        };
        let observed = ObservedTraits::from_behavior(pattern);

        let mut notes = Vec::new();
        for (name, value, target) in [
            ("cautiousness", &mut profile.cautiousness, observed.cautiousness),
            ("intuition", &mut profile.intuition, observed.intuition),
            ("resilience", &mut profile.resilience, observed.resilience),
        ] {
            if let Some(blended) = self.blend(*value, target) {
                notes.push(format!(
                    "Adapted {}: {:.2} → {:.2} (observed {:.2})",
                    name, *value, blended, target
                ));
                *value = blended;
            }
        }

        if notes.is_empty() {
            debug!("No significant deviation detected, no adaptation needed");
        }
        for note in &notes {
            debug!("{}", note);
            session.add_adaptation_note(note);
        }
        notes.len()
    }

    /// Summary of drift between the frozen and adapted profiles
    pub fn adaptation_status(
        base: Option<&PersonalityProfile>,
        adapted: Option<&PersonalityProfile>,
    ) -> String {
        let (Some(base), Some(adapted)) = (base, adapted) else {
            return "No profile loaded".to_string();
        };

        let diffs = [
            ("cautiousness", adapted.cautiousness - base.cautiousness),
            ("intuition", adapted.intuition - base.intuition),
            ("resilience", adapted.resilience - base.resilience),
        ];
        if diffs.iter().all(|(_, d)| d.abs() < STABLE_DIFF) {
            return "Profile stable - prediction matches behavior".to_string();
        }

        let drift: Vec<String> = diffs
            .iter()
            .filter(|(_, d)| d.abs() >= STABLE_DIFF)
            .map(|(name, d)| format!("{} {:+.2}", name, d))
            .collect();
        format!("Profile adapted - {}", drift.join(", "))
    }

    pub fn enhancement_prompt(profile: &PersonalityProfile) -> String {
        format!(
            "Based on this personality profile:\n\
             - Cautiousness: {:.2}\n\
             - Intuition: {:.2}\n\
             - Resilience: {:.2}\n\
             - Curiosity: {:.2}\n\
             - Decision Style: {:?}\n\
             \n\
             Identify 3 psychological weaknesses and 3 effective exploitation strategies for a card game.\n\
             Format as JSON:\n\
             {{\n  \"weaknesses\": [\"weakness1\", \"weakness2\", \"weakness3\"],\n  \"strategies\": [\"strategy1\", \"strategy2\", \"strategy3\"]\n}}\n\
             \n\
             Output ONLY the JSON, no other text.",
            profile.cautiousness,
            profile.intuition,
            profile.resilience,
            profile.curiosity,
            profile.primary_decision_style,
        )
    }

    pub fn read_lines_prompt(profile: &PersonalityProfile) -> String {
        let dominant = profile
            .dominant_trait()
            .map_or("balanced", |(t, _)| t.display_name());
        format!(
            "You are a chatty card game dealer who acts like the Joker.\n\
             You've analyzed the player's personality:\n\
             - Dominant trait: {}\n\
             - Cautiousness: {:.2}, Intuition: {:.2}\n\
             - Resilience: {:.2}, Consistency: {:.2}, Adaptability: {:.2}\n\
             \n\
             Generate {} short personality commentary variations (each max 8 words).\n\
             Mid-game quips like a mischievous friend who knows too much.\n\
             Mix cheerful chatter, scary jokes and sudden cold shifts.\n\
             \n\
             Format: One line per row, no numbering, no quotes.",
            dominant,
            profile.cautiousness,
            profile.intuition,
            profile.resilience,
            profile.consistency,
            profile.adaptability,
            READ_LINE_COUNT,
        )
    }

    /// Quips that read the player's personality aloud. Empty on any failure.
    pub async fn read_lines(
        generator: &dyn TextGenerator,
        profile: &PersonalityProfile,
        timeout: Duration,
    ) -> Vec<String> {
        let request = GenerationRequest::new(Self::read_lines_prompt(profile))
            .with_max_tokens(200)
            .with_temperature(0.9);

        match tokio::time::timeout(timeout, generator.generate(request)).await {
            Ok(Ok(response)) => {
                let lines: Vec<String> = split_variations(&response)
                    .into_iter()
                    .map(|l| l.trim_matches('"').to_string())
                    .take(READ_LINE_COUNT)
                    .collect();
                info!("Pre-generated {} personality read lines", lines.len());
                lines
            }
            Ok(Err(e)) => {
                warn!("Personality line generation failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Personality line generation timed out after {:?}", timeout);
                Vec::new()
            }
        }
    }

    /// Best-effort insight request. Any failure, including the timeout, yields `None`.
    pub async fn enhance(
        generator: &dyn TextGenerator,
        profile: &PersonalityProfile,
        timeout: Duration,
    ) -> Option<ProfileInsights> {
        let request = GenerationRequest::new(Self::enhancement_prompt(profile))
            .with_max_tokens(300)
            .with_temperature(0.7);

        let response = match tokio::time::timeout(timeout, generator.generate(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Personality enhancement failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!("Personality enhancement timed out after {:?}", timeout);
                return None;
            }
        };

        match parse_insights(&response) {
            Some(insights) => {
                info!(
                    "Personality enhancement complete: {} weaknesses, {} strategies",
                    insights.weaknesses.len(),
                    insights.strategies.len()
                );
                Some(insights)
            }
            None => {
                warn!("Personality enhancement returned unparseable JSON");
                None
            }
        }
    }
}

/// Parse the outermost JSON object in `response`
fn parse_insights(response: &str) -> Option<ProfileInsights> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationError;
    use dealer_common::GameStateData;
    use mockall::mock;

    mock! {
        Generator {}

        #[async_trait::async_trait]
        impl TextGenerator for Generator {
            async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
            async fn is_available(&self) -> bool;
            fn name(&self) -> &str;
        }
    }

    fn session_with(profile: PersonalityProfile) -> AISessionState {
        let mut session = AISessionState::default();
        session.begin(Some(profile), GameStateData::new(1, 7, 7));
        session
    }

    #[test]
    fn test_observed_traits() {
        let pattern = BehaviorPattern::new()
            .with_doubt(0.6)
            .with_tempo(Tempo::Fast)
            .with_timings(10.0, 2.0);
        let observed = ObservedTraits::from_behavior(&pattern);
        assert!((observed.cautiousness - 0.8).abs() < 1e-6);
        assert!((observed.intuition - 0.7).abs() < 1e-6);
        assert_eq!(observed.resilience, 0.5);

        let erratic = BehaviorPattern::new().with_tempo(Tempo::Erratic);
        assert_eq!(ObservedTraits::from_behavior(&erratic).resilience, 0.3);
        assert_eq!(ObservedTraits::from_behavior(&BehaviorPattern::new()).resilience, 0.8);
    }

    #[test]
    fn test_blend_above_threshold() {
        let adapter = PersonalityAdapter::default();
        let mut session = session_with(
            PersonalityProfile::new()
                .with_cautiousness(0.1)
                .with_intuition(0.75)
                .with_resilience(0.8),
        );
        // observed cautiousness 0.5, intuition 0.75, resilience 0.8
        let pattern = BehaviorPattern::new().with_doubt(0.0).with_timings(7.5, 1.0);

        let moved = adapter.adapt(&mut session, &pattern);
        let adapted = session.adapted_profile.as_ref().unwrap();
        assert_eq!(moved, 1);
        assert!((adapted.cautiousness - (0.1 + (0.5 - 0.1) * 0.15)).abs() < 1e-6);
        assert_eq!(adapted.intuition, 0.75);
        assert_eq!(session.adaptation_notes().count(), 1);
    }

    #[test]
    fn test_below_threshold_is_stable() {
        let adapter = PersonalityAdapter::default();
        let profile = PersonalityProfile::new()
            .with_cautiousness(0.3)
            .with_intuition(0.6)
            .with_resilience(0.7);
        let mut session = session_with(profile.clone());
        let pattern = BehaviorPattern::new().with_doubt(0.3).with_timings(1.5, 1.0);

        for _ in 0..50 {
            assert_eq!(adapter.adapt(&mut session, &pattern), 0);
        }
        assert_eq!(session.adapted_profile, Some(profile));
        assert_eq!(
            PersonalityAdapter::adaptation_status(session.base_profile.as_ref(), session.adapted_profile.as_ref()),
            "Profile stable - prediction matches behavior"
        );
    }

    #[test]
    fn test_status_names_drift() {
        let base = PersonalityProfile::new().with_cautiousness(0.3).with_intuition(0.5);
        let adapted = PersonalityProfile::new().with_cautiousness(0.55).with_intuition(0.45);
        assert_eq!(
            PersonalityAdapter::adaptation_status(Some(&base), Some(&adapted)),
            "Profile adapted - cautiousness +0.25"
        );
        assert_eq!(PersonalityAdapter::adaptation_status(None, None), "No profile loaded");
    }

    #[test]
    fn test_adapt_without_profile_is_noop() {
        let adapter = PersonalityAdapter::default();
        let mut session = AISessionState::default();
        assert_eq!(adapter.adapt(&mut session, &BehaviorPattern::new().with_doubt(1.0)), 0);
    }

    #[tokio::test]
    async fn test_enhance_parses_json() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|r| r.max_tokens == 300 && r.prompt.contains("Output ONLY the JSON"))
            .returning(|_| {
                Ok("Sure: {\"weaknesses\": [\"a\", \"b\", \"c\"], \"strategies\": [\"x\"]}".to_string())
            });

        let insights = PersonalityAdapter::enhance(&generator, &PersonalityProfile::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(insights.weaknesses.len(), 3);
        assert_eq!(insights.strategies, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_enhance_failure_yields_none() {
        let mut generator = MockGenerator::new();
        generator.expect_generate().returning(|_| Ok("not json".to_string()));
        assert!(PersonalityAdapter::enhance(&generator, &PersonalityProfile::new(), Duration::from_secs(1))
            .await
            .is_none());

        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(GenerationError::Timeout(Duration::from_secs(1))));
        assert!(PersonalityAdapter::enhance(&generator, &PersonalityProfile::new(), Duration::from_secs(1))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_read_lines_split_and_capped() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|r| r.prompt.contains("Dominant trait: cautious"))
            .returning(|_| {
                Ok((1..=8)
                    .map(|i| format!("\"Quip number {}\"", i))
                    .collect::<Vec<_>>()
                    .join("\n"))
            });

        let profile = PersonalityProfile::new().with_cautiousness(0.9);
        let lines = PersonalityAdapter::read_lines(&generator, &profile, Duration::from_secs(1)).await;
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Quip number 1");
    }
}
