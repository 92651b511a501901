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

//! Provider traits and built-in offline providers

mod scripted;

use super::types::{AudioClip, GenerationRequest, GenerationResult, VoiceParams};
use async_trait::async_trait;

pub use scripted::{ScriptedGenerator, ScriptedSynthesizer};

/// Trait for generative text providers
///
/// Implementations may fail or hang; the engine supplies its own timeout and never retries.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<String>;

    /// Check if the provider is available
    async fn is_available(&self) -> bool {
        true
    }

    /// Get provider name
    fn name(&self) -> &str;
}

/// Trait for speech synthesis providers
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize spoken audio for a line
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> GenerationResult<AudioClip>;

    /// Get provider name
    fn name(&self) -> &str;
}
