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

//! Common types for generative providers

use dealer_common::EmotionalState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Text generation request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Fully built prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0, higher = more random)
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a new request with conservative defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 100,
            temperature: 0.9,
        }
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Generation error types
///
/// Timeouts and transport failures are soft: the engine falls through to its next tier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// Call exceeded its budget
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    /// Network, API or provider failure
    #[error("Transport failure: {0}")]
    Transport(String),
    /// Structured response was malformed
    #[error("Parse failure: {0}")]
    Parse(String),
    /// Input rejected before any call was made
    #[error("Validation failure: {0}")]
    Validation(String),
    /// Provider returned nothing usable
    #[error("Empty response")]
    Empty,
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Synthesized speech
///
/// The payload is reference counted so the cache and presentation can share it cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub id: Uuid,
    pub data: Arc<[u8]>,
    pub duration: Duration,
}

impl AudioClip {
    pub fn new(data: impl Into<Arc<[u8]>>, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            duration,
        }
    }

    /// Length in seconds
    pub fn length(&self) -> f32 {
        self.duration.as_secs_f32()
    }
}

/// Base voice timbre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceName {
    /// Low, composed
    Onyx,
    /// Sharper, tense
    Echo,
}

impl fmt::Display for VoiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceName::Onyx => write!(f, "onyx"),
            VoiceName::Echo => write!(f, "echo"),
        }
    }
}

/// Speech synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice: VoiceName,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: VoiceName::Onyx,
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
            speed: 0.9,
        }
    }
}

impl VoiceParams {
    /// Voice tuned to the opponent's current mood
    pub fn for_emotion(state: EmotionalState) -> Self {
        let (voice, stability, similarity_boost, style, use_speaker_boost) = match state {
            EmotionalState::Calm => (VoiceName::Onyx, 0.70, 0.75, 0.0, true),
            EmotionalState::Anticipating => (VoiceName::Echo, 0.40, 0.75, 0.30, true),
            EmotionalState::Pleased => (VoiceName::Onyx, 0.55, 0.80, 0.40, true),
            EmotionalState::Frustrated => (VoiceName::Echo, 0.30, 0.70, 0.50, true),
            EmotionalState::Hurt => (VoiceName::Onyx, 0.60, 0.80, 0.20, false),
            EmotionalState::Relieved => (VoiceName::Onyx, 0.65, 0.75, 0.15, true),
        };
        Self {
            voice,
            stability,
            similarity_boost,
            style,
            use_speaker_boost,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new("Say something")
            .with_temperature(0.6)
            .with_max_tokens(300);

        assert_eq!(request.prompt, "Say something");
        assert_eq!(request.temperature, 0.6);
        assert_eq!(request.max_tokens, 300);
    }

    #[test]
    fn test_voice_for_emotion() {
        assert_eq!(VoiceParams::for_emotion(EmotionalState::Calm).voice, VoiceName::Onyx);
        assert_eq!(
            VoiceParams::for_emotion(EmotionalState::Frustrated).voice,
            VoiceName::Echo
        );
        assert!(!VoiceParams::for_emotion(EmotionalState::Hurt).use_speaker_boost);
    }

    #[test]
    fn test_error_display() {
        let err = GenerationError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport failure: connection reset");
    }
}
