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

//! Offline providers that answer from canned material
//!
//! Used by the demo binary and for exercising the fallback ladder without a network.

use crate::llm::{
    AudioClip, GenerationError, GenerationRequest, GenerationResult, SpeechSynthesizer,
    TextGenerator, VoiceParams,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

const CANNED_LINES: &[&str] = &[
    "Oh, that one? Bold. Very bold.",
    "I'm just an AI, but even I can see you sweating.",
    "Go on, pick it. I promise nothing.",
    "We're friends, right? ...Right?",
    "Same spot again? You're adorable.",
    "Haha, this is fun! ...For me, anyway.",
];

/// Text generator returning canned lines after a fixed latency
pub struct ScriptedGenerator {
    latency: Duration,
    failure_rate: f32,
    rng: Mutex<StdRng>,
}

impl ScriptedGenerator {
    /// Create a new scripted generator
    pub fn new(latency: Duration, failure_rate: f32, seed: u64) -> Self {
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn roll(&self) -> (f32, usize, i32) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (
            rng.random::<f32>(),
            rng.random_range(0..CANNED_LINES.len()),
            rng.random_range(0..100),
        )
    }

    fn decision_json(prompt: &str, pick: i32) -> String {
        let max_index = prompt
            .split("positions 0 to ")
            .nth(1)
            .and_then(|rest| {
                rest.split(|c: char| !c.is_ascii_digit())
                    .next()
                    .and_then(|digits| digits.parse::<i32>().ok())
            })
            .unwrap_or(0);
        let position = pick % (max_index + 1);
        let scan = (position + 1) % (max_index + 1);
        serde_json::json!({
            "steps": [
                {"card": scan, "thought": "Hmm, this one twitched."},
                {"card": position, "thought": "No... it's this one."}
            ],
            "position": position,
            "confidence": 0.75,
            "strategy": "Adaptive"
        })
        .to_string()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<String> {
        tokio::time::sleep(self.latency).await;

        let (fail_roll, line, pick) = self.roll();
        if fail_roll < self.failure_rate {
            return Err(GenerationError::Transport(
                "scripted provider dropped the request".to_string(),
            ));
        }

        let prompt = request.prompt.as_str();
        if prompt.contains("Decision (JSON only):") {
            return Ok(Self::decision_json(prompt, pick));
        }
        if prompt.contains("\"weaknesses\"") {
            return Ok(serde_json::json!({
                "weaknesses": ["second-guesses under pressure", "repeats positions", "reacts to taunts"],
                "strategies": ["mirror their habits", "apply pressure late", "feign weakness"]
            })
            .to_string());
        }
        if prompt.contains("variations") {
            let lines: Vec<&str> = (0..3)
                .map(|i| CANNED_LINES[(line + i) % CANNED_LINES.len()])
                .collect();
            return Ok(lines.join("\n"));
        }
        Ok(CANNED_LINES[line].to_string())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Speech synthesizer producing silent clips sized to the text
pub struct ScriptedSynthesizer {
    latency: Duration,
}

impl ScriptedSynthesizer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> GenerationResult<AudioClip> {
        tokio::time::sleep(self.latency).await;
        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        let seconds = (text.chars().count() as f32 * 0.06 / voice.speed.max(0.1)).max(0.4);
        Ok(AudioClip::new(
            text.as_bytes().to_vec(),
            Duration::from_secs_f32(seconds),
        ))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
