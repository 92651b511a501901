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

//! Dealer Engine Library
//!
//! Adaptive dialogue, card decisions and hesitation theatrics for a
//! psychological card-game opponent. Every generative call races a timeout
//! and falls back to rule-based and static tiers, so the table never waits
//! on a provider.

pub mod cache;
pub mod config;
pub mod context;
pub mod emotion;
pub mod engine;
pub mod fallback;
pub mod hesitation;
pub mod llm;
pub mod memory;
pub mod personality;
pub mod presentation;
pub mod session;
pub mod strings;

// Re-export commonly used types
pub use cache::{CacheStats, ResponseCache};
pub use config::{Arguments, Configuration};
pub use emotion::EmotionalStateMachine;
pub use engine::{Collaborators, DialogueEngine, EngineStats};
pub use fallback::{FallbackController, Tier};
pub use hesitation::{HesitationContext, HesitationEngine, HesitationOutcome};
pub use llm::{SpeechSynthesizer, TextGenerator};
pub use memory::{FileStore, InMemoryStore, KeyValueStore, SessionMemory};
pub use presentation::{LoggingSink, PresentationSink, RecordingSink};
pub use session::AISessionState;
pub use strings::{BuiltinStrings, StringTable, YamlStringTable};
