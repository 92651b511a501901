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

//! Player personality profile
//!
//! A profile is built once per session from onboarding data. The engine keeps a frozen
//! `base` copy and an `adapted` copy that drifts toward observed behavior turn by turn.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum trait value for a trait to count as dominant.
pub const DOMINANT_TRAIT_FLOOR: f32 = 0.4;

/// How the player primarily reaches decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecisionStyle {
    Analytical,
    Intuitive,
    Cautious,
    Aggressive,
    #[default]
    Adaptive,
}

impl fmt::Display for DecisionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the player reacts under stress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StressType {
    Shutdown,
    Impulsive,
    #[default]
    Analytical,
    Avoidant,
    Confrontational,
}

impl fmt::Display for StressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The most pronounced trait of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DominantTrait {
    Cautious,
    Intuitive,
    Resilient,
    Consistent,
    Adaptive,
}

impl DominantTrait {
    /// Human readable name used when the opponent "reads" the player aloud.
    pub fn display_name(&self) -> &'static str {
        match self {
            DominantTrait::Cautious => "cautious",
            DominantTrait::Intuitive => "intuitive",
            DominantTrait::Resilient => "calm",
            DominantTrait::Consistent => "consistent",
            DominantTrait::Adaptive => "adaptive",
        }
    }

    /// Suffix used to build template keys such as `personality_cautious`.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            DominantTrait::Cautious => "cautious",
            DominantTrait::Intuitive => "intuitive",
            DominantTrait::Resilient => "resilient",
            DominantTrait::Consistent => "consistent",
            DominantTrait::Adaptive => "adaptive",
        }
    }
}

/// Player personality profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityProfile {
    // Core traits, each in [0, 1]
    pub cautiousness: f32,
    pub intuition: f32,
    pub resilience: f32,
    pub curiosity: f32,
    pub consistency: f32,

    pub primary_decision_style: DecisionStyle,
    pub confidence: f32,
    pub adaptability: f32,

    pub stress_type: StressType,
    pub pressure_tolerance: f32,
    pub recovery_speed: f32,
}

impl Default for PersonalityProfile {
    fn default() -> Self {
        Self {
            cautiousness: 0.5,
            intuition: 0.5,
            resilience: 0.5,
            curiosity: 0.5,
            consistency: 0.5,
            primary_decision_style: DecisionStyle::default(),
            confidence: 0.5,
            adaptability: 0.5,
            stress_type: StressType::default(),
            pressure_tolerance: 0.5,
            recovery_speed: 0.5,
        }
    }
}

impl PersonalityProfile {
    /// Create a profile with every scalar at the neutral midpoint
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cautiousness(mut self, value: f32) -> Self {
        self.cautiousness = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_intuition(mut self, value: f32) -> Self {
        self.intuition = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_resilience(mut self, value: f32) -> Self {
        self.resilience = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_curiosity(mut self, value: f32) -> Self {
        self.curiosity = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_consistency(mut self, value: f32) -> Self {
        self.consistency = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_adaptability(mut self, value: f32) -> Self {
        self.adaptability = value.clamp(0.0, 1.0);
        self
    }

    pub fn with_decision_style(mut self, style: DecisionStyle) -> Self {
        self.primary_decision_style = style;
        self
    }

    pub fn with_stress_type(mut self, stress: StressType) -> Self {
        self.stress_type = stress;
        self
    }

    pub fn with_pressure_tolerance(mut self, value: f32) -> Self {
        self.pressure_tolerance = value.clamp(0.0, 1.0);
        self
    }

    /// Find the most pronounced trait.
    ///
    /// Ties resolve to the earlier trait in the order cautiousness, intuition, resilience,
    /// consistency, adaptability. Returns `None` when no trait reaches [`DOMINANT_TRAIT_FLOOR`].
    pub fn dominant_trait(&self) -> Option<(DominantTrait, f32)> {
        let candidates = [
            (DominantTrait::Cautious, self.cautiousness),
            (DominantTrait::Intuitive, self.intuition),
            (DominantTrait::Resilient, self.resilience),
            (DominantTrait::Consistent, self.consistency),
            (DominantTrait::Adaptive, self.adaptability),
        ];

        let mut best: Option<(DominantTrait, f32)> = None;
        for (kind, value) in candidates {
            if best.is_none_or(|(_, max)| value > max) {
                best = Some((kind, value));
            }
        }

        best.filter(|(_, value)| *value >= DOMINANT_TRAIT_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_neutral() {
        let profile = PersonalityProfile::default();
        assert_eq!(profile.cautiousness, 0.5);
        assert_eq!(profile.primary_decision_style, DecisionStyle::Adaptive);
        assert_eq!(profile.stress_type, StressType::Analytical);
    }

    #[test]
    fn test_builder_clamps_values() {
        let profile = PersonalityProfile::new()
            .with_cautiousness(1.7)
            .with_intuition(-0.2);
        assert_eq!(profile.cautiousness, 1.0);
        assert_eq!(profile.intuition, 0.0);
    }

    #[test]
    fn test_dominant_trait() {
        let profile = PersonalityProfile::new()
            .with_cautiousness(0.2)
            .with_intuition(0.9)
            .with_resilience(0.3)
            .with_consistency(0.1)
            .with_adaptability(0.1);
        let (kind, value) = profile.dominant_trait().unwrap();
        assert_eq!(kind, DominantTrait::Intuitive);
        assert_eq!(value, 0.9);
        assert_eq!(kind.display_name(), "intuitive");
    }

    #[test]
    fn test_dominant_trait_below_floor() {
        let profile = PersonalityProfile::new()
            .with_cautiousness(0.3)
            .with_intuition(0.1)
            .with_resilience(0.2)
            .with_consistency(0.35)
            .with_adaptability(0.39);
        assert!(profile.dominant_trait().is_none());
    }

    #[test]
    fn test_dominant_trait_tie_prefers_first() {
        let profile = PersonalityProfile::new();
        assert_eq!(
            profile.dominant_trait().map(|(k, _)| k),
            Some(DominantTrait::Cautious)
        );
    }

    #[test]
    fn test_profile_serde_tolerates_missing_fields() {
        let profile: PersonalityProfile =
            serde_json::from_str(r#"{"cautiousness":0.8}"#).unwrap();
        assert_eq!(profile.cautiousness, 0.8);
        assert_eq!(profile.intuition, 0.5);
    }
}
