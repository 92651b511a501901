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

//! Outbound presentation callbacks
//!
//! The engine never renders anything itself. Hosts implement [`PresentationSink`]
//! to move a focus marker, show subtitles and play audio.

use crate::llm::AudioClip;
use dealer_common::EmotionalState;
use std::fmt;
use tracing::info;

/// Marker look while the opponent deliberates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualState {
    Scanning,
    Focusing,
    Locked,
}

impl fmt::Display for VisualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub trait PresentationSink: Send {
    fn on_focus_change(&mut self, index: usize);

    /// `intensity` is in [0, 1] and follows pressure
    fn on_text_update(&mut self, text: &str, intensity: f32);

    fn on_audio_cue(&mut self, clip: &AudioClip);

    fn on_emotion_changed(&mut self, state: EmotionalState);

    fn on_visual_state(&mut self, _state: VisualState) {}

    fn on_stop_audio(&mut self) {}
}

/// Sink that writes every callback to the log
#[derive(Debug, Default)]
pub struct LoggingSink;

impl PresentationSink for LoggingSink {
    fn on_focus_change(&mut self, index: usize) {
        info!("Focus -> card {}", index);
    }

    fn on_text_update(&mut self, text: &str, intensity: f32) {
        info!("Says ({:.2}): {}", intensity, text);
    }

    fn on_audio_cue(&mut self, clip: &AudioClip) {
        info!("Audio cue {} ({:.2}s)", clip.id, clip.length());
    }

    fn on_emotion_changed(&mut self, state: EmotionalState) {
        info!("Emotion -> {}", state);
    }

    fn on_visual_state(&mut self, state: VisualState) {
        info!("Marker -> {}", state);
    }

    fn on_stop_audio(&mut self) {
        info!("Audio stopped");
    }
}

/// A single recorded callback
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    Focus(usize),
    Text(String, f32),
    Audio(AudioClip),
    Emotion(EmotionalState),
    Visual(VisualState),
    StopAudio,
}

/// Sink that keeps every callback in order, for headless hosts and tests
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<PresentationEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus_indices(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::Focus(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::Text(t, _) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn audio_cues(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PresentationEvent::Audio(_)))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl PresentationSink for RecordingSink {
    fn on_focus_change(&mut self, index: usize) {
        self.events.push(PresentationEvent::Focus(index));
    }

    fn on_text_update(&mut self, text: &str, intensity: f32) {
        self.events.push(PresentationEvent::Text(text.to_string(), intensity));
    }

    fn on_audio_cue(&mut self, clip: &AudioClip) {
        self.events.push(PresentationEvent::Audio(clip.clone()));
    }

    fn on_emotion_changed(&mut self, state: EmotionalState) {
        self.events.push(PresentationEvent::Emotion(state));
    }

    fn on_visual_state(&mut self, state: VisualState) {
        self.events.push(PresentationEvent::Visual(state));
    }

    fn on_stop_audio(&mut self) {
        self.events.push(PresentationEvent::StopAudio);
    }
}
