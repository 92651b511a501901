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

//! Hesitation sequencing: turning a card pick into a timed, watchable deliberation.
//!
//! Two modes are supported:
//! - **Guided**: a decision's reasoning steps drive focus, text and optional
//!   pre-generated audio, one step at a time.
//! - **Generated**: a human-looking visit pattern is produced on the spot and
//!   each fresh visit gets a styled muttered line.
//!
//! All waiting goes through `tokio::time`, so tests can run on a paused clock.

use crate::config::HesitationConfig;
use crate::llm::AudioClip;
use crate::presentation::{PresentationSink, VisualState};
use crate::strings::{StringTable, apply_vars};
use async_trait::async_trait;
use dealer_common::{CoTStep, PersonalityProfile};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const STRING_PREFIX: &str = "hesitation_dialogue.";
/// Draws allowed when avoiding an immediate revisit before the repeat is accepted
const MAX_REPEAT_RETRIES: usize = 10;
const SINGLE_CARD_HOLD: Duration = Duration::from_millis(800);
const AUDIO_TAIL: Duration = Duration::from_millis(300);

/// Tone of a muttered line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HesitationStyle {
    /// Reading the player aloud
    Deduction,
    /// Fake certainty
    Bluff,
    /// Needling the player
    Provoke,
    /// Letting doubt show
    Vulnerable,
}

impl HesitationStyle {
    pub fn as_key(&self) -> &'static str {
        match self {
            HesitationStyle::Deduction => "deduction",
            HesitationStyle::Bluff => "bluff",
            HesitationStyle::Provoke => "provoke",
            HesitationStyle::Vulnerable => "vulnerable",
        }
    }

    fn fallback_line(&self) -> &'static str {
        match self {
            HesitationStyle::Deduction => "Something's off...",
            HesitationStyle::Bluff => "I already know...",
            HesitationStyle::Provoke => "Doesn't matter which...",
            HesitationStyle::Vulnerable => "I don't know...",
        }
    }
}

impl fmt::Display for HesitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Coarse stage of the game as seen from the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TablePhase {
    Early,
    Mid,
    Late,
}

/// Who is ahead, from the opponent's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advantage {
    Winning,
    Even,
    Losing,
}

/// What the table looks like while the opponent deliberates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HesitationContext {
    pub ai_card_count: u32,
    pub player_card_count: u32,
    pub ai_holds_joker: bool,
    pub turn_number: u32,
}

impl HesitationContext {
    pub fn new(ai_card_count: u32, player_card_count: u32, ai_holds_joker: bool, turn_number: u32) -> Self {
        Self {
            ai_card_count,
            player_card_count,
            ai_holds_joker,
            turn_number,
        }
    }

    pub fn phase(&self) -> TablePhase {
        if self.turn_number <= 2 {
            TablePhase::Early
        } else if self.ai_card_count + self.player_card_count <= 5 {
            TablePhase::Late
        } else {
            TablePhase::Mid
        }
    }

    /// Fewer cards than the player means the opponent is winning
    pub fn advantage(&self) -> Advantage {
        use std::cmp::Ordering;
        match self.ai_card_count.cmp(&self.player_card_count) {
            Ordering::Less => Advantage::Winning,
            Ordering::Greater => Advantage::Losing,
            Ordering::Equal => Advantage::Even,
        }
    }
}

/// What a line source is asked for at one step of a generated sequence
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub step: usize,
    pub total_steps: usize,
    pub pressure: f32,
    pub style: HesitationStyle,
    pub context: HesitationContext,
}

/// Optional producer of muttered lines, usually backed by a text generator.
/// Returning `None` falls back to the rule-based styled lines.
#[async_trait]
pub trait LineSource: Send {
    async fn line(&mut self, request: &LineRequest) -> Option<String>;
}

/// What a sequence did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HesitationOutcome {
    /// Card index focused at each step
    pub visits: Vec<usize>,
    /// Every line shown, in order
    pub lines: Vec<String>,
    /// Total time held
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct HesitationEngine {
    config: HesitationConfig,
    lines: HashMap<String, Vec<String>>,
}

impl HesitationEngine {
    pub fn new(config: &HesitationConfig, strings: &dyn StringTable) -> Self {
        let mut config = config.clone();
        config.min_dwell_time = config.min_dwell_time.max(0.0);
        config.max_dwell_time = config.max_dwell_time.max(config.min_dwell_time);
        Self {
            config,
            lines: strings.get_array_dictionary(STRING_PREFIX),
        }
    }

    pub fn reload(&mut self, strings: &dyn StringTable) {
        self.lines = strings.get_array_dictionary(STRING_PREFIX);
    }

    /// Steps a generated sequence takes over `card_count` candidates
    pub fn total_steps(&self, card_count: usize, pressure: f32) -> usize {
        let t = (pressure / 3.0).clamp(0.0, 1.0);
        let extra = (self.config.max_extra_steps as f32 * t).round_ties_even() as usize;
        (self.config.base_visit_steps + extra).max(card_count)
    }

    /// Every candidate once in shuffled order, then extra steps that try not to
    /// revisit the previous card
    pub fn visit_pattern<R: Rng + ?Sized>(&self, card_count: usize, pressure: f32, rng: &mut R) -> Vec<usize> {
        if card_count == 0 {
            return Vec::new();
        }
        let total = self.total_steps(card_count, pressure);
        let mut pattern: Vec<usize> = (0..card_count).collect();
        pattern.shuffle(rng);

        while pattern.len() < total {
            let previous = pattern[pattern.len() - 1];
            let mut next = rng.random_range(0..card_count);
            let mut attempts = 1;
            while next == previous && attempts < MAX_REPEAT_RETRIES {
                next = rng.random_range(0..card_count);
                attempts += 1;
            }
            pattern.push(next);
        }
        pattern
    }

    pub fn dwell_time<R: Rng + ?Sized>(
        &self,
        step: usize,
        total_steps: usize,
        pressure: f32,
        revisit: bool,
        rng: &mut R,
    ) -> Duration {
        let min = self.config.min_dwell_time;
        let max = self.config.max_dwell_time;
        let mut dwell = rng.random_range(min..=max);
        if revisit {
            dwell *= 0.6;
        }
        if step + 1 == total_steps {
            dwell *= 1.3;
        }
        dwell *= 1.0 + (pressure / 3.0) * 0.3;
        Duration::from_secs_f32(dwell.clamp(min, max * 1.5))
    }

    pub fn determine_style<R: Rng + ?Sized>(
        &self,
        context: &HesitationContext,
        pressure: f32,
        step: usize,
        total_steps: usize,
        rng: &mut R,
    ) -> HesitationStyle {
        use HesitationStyle::*;
        let phase = context.phase();
        let advantage = context.advantage();

        if step == 0 {
            return match (phase, advantage) {
                (TablePhase::Early, _) => pick(rng, 0.6, Deduction, Vulnerable),
                (TablePhase::Late, Advantage::Losing) => pick(rng, 0.6, Vulnerable, Deduction),
                _ => pick(rng, 0.5, Vulnerable, Deduction),
            };
        }
        if step + 1 == total_steps {
            return if phase == TablePhase::Late && advantage == Advantage::Winning {
                pick(rng, 0.5, Provoke, Bluff)
            } else {
                pick(rng, 0.4, Bluff, Deduction)
            };
        }

        if context.ai_holds_joker && rng.random::<f32>() < 0.35 {
            return Bluff;
        }
        if phase == TablePhase::Late && advantage == Advantage::Winning && rng.random::<f32>() < 0.4 {
            return Provoke;
        }
        if phase == TablePhase::Late && advantage == Advantage::Losing && rng.random::<f32>() < 0.4 {
            return pick(rng, 0.5, Vulnerable, Deduction);
        }
        if pressure >= 1.5 && rng.random::<f32>() < 0.4 {
            return Provoke;
        }
        if rng.random::<f32>() < 0.25 {
            return Bluff;
        }
        if pressure < 0.5 && rng.random::<f32>() < 0.3 {
            return Vulnerable;
        }
        Deduction
    }

    fn first(&self, key: &str, fallback: &str) -> String {
        self.lines
            .get(key)
            .and_then(|lines| lines.first())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn choose<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Option<String> {
        self.lines.get(key).and_then(|lines| lines.choose(rng)).cloned()
    }

    fn situational_line(&self, style: HesitationStyle, context: &HesitationContext) -> Option<String> {
        let phase = context.phase();
        let advantage = context.advantage();
        let key = match style {
            HesitationStyle::Deduction if phase == TablePhase::Late => "late_deduction",
            HesitationStyle::Deduction if advantage == Advantage::Winning => "winning_deduction",
            HesitationStyle::Deduction if advantage == Advantage::Losing && context.ai_holds_joker => {
                "losing_joker_deduction"
            }
            HesitationStyle::Bluff if context.ai_holds_joker => "bluff_has_joker",
            HesitationStyle::Bluff if phase == TablePhase::Late => "late_bluff",
            HesitationStyle::Provoke if phase == TablePhase::Late && advantage == Advantage::Winning => {
                "late_winning_provoke"
            }
            HesitationStyle::Provoke if advantage == Advantage::Losing => "losing_provoke",
            HesitationStyle::Vulnerable if phase == TablePhase::Late => "late_vulnerable",
            HesitationStyle::Vulnerable if advantage == Advantage::Losing => "losing_vulnerable",
            _ => return None,
        };
        self.lines
            .get(&format!("situational.{}", key))
            .and_then(|lines| lines.first())
            .cloned()
    }

    fn final_step_line(
        &self,
        style: HesitationStyle,
        context: &HesitationContext,
        trait_name: Option<&str>,
    ) -> String {
        if context.phase() == TablePhase::Late {
            return if context.advantage() == Advantage::Winning {
                self.first("final_step.late_winning", "Finishing blow")
            } else {
                self.first("final_step.late_default", "This card decides it...")
            };
        }
        match (style, trait_name) {
            (HesitationStyle::Deduction, Some(name)) => apply_vars(
                &self.first("final_step.deduction_with_trait", "{trait} one...right here"),
                &[("trait", name)],
            ),
            (HesitationStyle::Deduction, None) => {
                self.first("final_step.deduction_generic", "I have my reasons...here")
            }
            (HesitationStyle::Bluff, _) => self.first("final_step.bluff", "Knew it all along"),
            (HesitationStyle::Provoke, _) => self.first("final_step.provoke", "Brace yourself...this card"),
            (HesitationStyle::Vulnerable, _) => self.first("final_step.vulnerable", "...This'll do. Probably"),
        }
    }

    /// Rule-based muttered line for one step
    pub fn styled_line<R: Rng + ?Sized>(
        &self,
        step: usize,
        total_steps: usize,
        style: HesitationStyle,
        context: &HesitationContext,
        profile: Option<&PersonalityProfile>,
        rng: &mut R,
    ) -> String {
        let trait_name = profile
            .and_then(PersonalityProfile::dominant_trait)
            .map(|(t, _)| t.display_name());

        if step + 1 >= total_steps {
            return self.final_step_line(style, context, trait_name);
        }

        if let Some(line) = self.situational_line(style, context) {
            if rng.random::<f32>() < 0.5 {
                return line;
            }
        }

        if let Some(name) = trait_name {
            if let Some(template) = self.choose(&format!("{}_with_trait", style.as_key()), rng) {
                return apply_vars(&template, &[("trait", name)]);
            }
        }
        self.choose(&format!("{}_generic", style.as_key()), rng)
            .unwrap_or_else(|| style.fallback_line().to_string())
    }

    fn opening_line<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.choose("opening", rng)
            .unwrap_or_else(|| self.first("default_fallback", "Hmm..."))
    }

    async fn hold(duration: Duration, outcome: &mut HesitationOutcome) {
        tokio::time::sleep(duration).await;
        outcome.elapsed += duration;
    }

    async fn idle<R: Rng + ?Sized>(rng: &mut R) -> HesitationOutcome {
        debug!("No candidates, skipping hesitation");
        let mut outcome = HesitationOutcome::default();
        let wait = Duration::from_secs_f32(rng.random_range(0.5..=1.0));
        Self::hold(wait, &mut outcome).await;
        outcome
    }

    async fn single_card(
        &self,
        sink: &mut dyn PresentationSink,
        pressure: f32,
        clip: Option<&AudioClip>,
    ) -> HesitationOutcome {
        debug!("Single candidate, committing immediately");
        let mut outcome = HesitationOutcome::default();
        let line = self.first("single_card", "No choice, huh...");

        sink.on_focus_change(0);
        sink.on_text_update(&line, intensity(pressure));
        if let Some(clip) = clip {
            sink.on_audio_cue(clip);
        }
        outcome.visits.push(0);
        outcome.lines.push(line);

        Self::hold(SINGLE_CARD_HOLD, &mut outcome).await;
        if clip.is_some() {
            sink.on_stop_audio();
        }
        outcome
    }

    /// Walk a decision's reasoning steps. `audio[i]` is the optional pre-generated clip for step `i`.
    pub async fn play_guided<R: Rng + ?Sized>(
        &self,
        sink: &mut dyn PresentationSink,
        steps: &[CoTStep],
        audio: &[Option<AudioClip>],
        card_count: usize,
        pressure: f32,
        rng: &mut R,
    ) -> HesitationOutcome {
        if card_count == 0 || steps.is_empty() {
            return Self::idle(rng).await;
        }
        if card_count == 1 {
            let clip = audio.first().and_then(Option::as_ref);
            return self.single_card(sink, pressure, clip).await;
        }

        debug!("Guided hesitation: {} steps over {} cards", steps.len(), card_count);
        let mut outcome = HesitationOutcome::default();
        let total = steps.len();
        for (step, cot) in steps.iter().enumerate() {
            let index = cot.card_index.clamp(0, card_count as i32 - 1) as usize;
            let last = step + 1 == total;

            sink.on_focus_change(index);
            sink.on_visual_state(visual_state(step, total));
            outcome.visits.push(index);

            let thought = cot.thought.trim();
            if !thought.is_empty() {
                sink.on_text_update(thought, intensity(pressure));
                outcome.lines.push(thought.to_string());
            }

            let clip = audio.get(step).and_then(Option::as_ref);
            if let Some(clip) = clip {
                sink.on_audio_cue(clip);
            }

            let dwell = self.dwell_time(step, total, pressure, false, rng);
            let hold = clip.map_or(dwell, |c| dwell.max(c.duration + AUDIO_TAIL));
            debug!("Step {}: card={} hold={:?} thought=\"{}\"", step, index, hold, thought);
            Self::hold(hold, &mut outcome).await;

            if !last && clip.is_some() {
                sink.on_stop_audio();
            }
        }
        outcome
    }

    /// Improvise a deliberation over `card_count` candidates. Lines come from
    /// `source` when it has one, otherwise from the styled line tables.
    #[allow(clippy::too_many_arguments)]
    pub async fn play_generated<R: Rng + ?Sized>(
        &self,
        sink: &mut dyn PresentationSink,
        card_count: usize,
        pressure: f32,
        context: &HesitationContext,
        profile: Option<&PersonalityProfile>,
        mut source: Option<&mut dyn LineSource>,
        rng: &mut R,
    ) -> HesitationOutcome {
        if card_count == 0 {
            return Self::idle(rng).await;
        }
        if card_count == 1 {
            return self.single_card(sink, pressure, None).await;
        }

        let pattern = self.visit_pattern(card_count, pressure, rng);
        let total = pattern.len();
        debug!(
            "Generated hesitation {:?} ({:?}/{:?}, joker={})",
            pattern,
            context.phase(),
            context.advantage(),
            context.ai_holds_joker
        );

        let mut outcome = HesitationOutcome::default();
        let mut previous: Option<usize> = None;
        for (step, &index) in pattern.iter().enumerate() {
            let revisit = previous == Some(index);

            sink.on_focus_change(index);
            sink.on_visual_state(visual_state(step, total));
            outcome.visits.push(index);

            if step == 0 || !revisit {
                let style = self.determine_style(context, pressure, step, total, rng);
                let request = LineRequest {
                    step,
                    total_steps: total,
                    pressure,
                    style,
                    context: *context,
                };
                let generated = match source.as_mut() {
                    Some(source) => source.line(&request).await.filter(|l| !l.trim().is_empty()),
                    None => None,
                };
                let line = match generated {
                    Some(line) => line,
                    None if step == 0 => self.opening_line(rng),
                    None => self.styled_line(step, total, style, context, profile, rng),
                };
                debug!("[{}] step {}: \"{}\"", style, step, line);
                sink.on_text_update(&line, intensity(pressure));
                outcome.lines.push(line);
            }

            let dwell = self.dwell_time(step, total, pressure, revisit, rng);
            Self::hold(dwell, &mut outcome).await;
            previous = Some(index);
        }
        outcome
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, p: f32, a: HesitationStyle, b: HesitationStyle) -> HesitationStyle {
    if rng.random::<f32>() < p { a } else { b }
}

fn visual_state(step: usize, total: usize) -> VisualState {
    if step + 1 == total {
        VisualState::Locked
    } else if step >= total / 2 {
        VisualState::Focusing
    } else {
        VisualState::Scanning
    }
}

fn intensity(pressure: f32) -> f32 {
    (pressure / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::{PresentationEvent, RecordingSink};
    use crate::strings::BuiltinStrings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use tokio::time::Instant;

    fn engine() -> HesitationEngine {
        HesitationEngine::new(&HesitationConfig::default(), &BuiltinStrings)
    }

    struct FixedSource(&'static str, usize);

    #[async_trait]
    impl LineSource for FixedSource {
        async fn line(&mut self, _request: &LineRequest) -> Option<String> {
            self.1 += 1;
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_phase_and_advantage() {
        assert_eq!(HesitationContext::new(7, 7, false, 2).phase(), TablePhase::Early);
        assert_eq!(HesitationContext::new(2, 3, false, 6).phase(), TablePhase::Late);
        assert_eq!(HesitationContext::new(5, 5, false, 6).phase(), TablePhase::Mid);
        assert_eq!(HesitationContext::new(2, 3, false, 6).advantage(), Advantage::Winning);
        assert_eq!(HesitationContext::new(4, 3, false, 6).advantage(), Advantage::Losing);
        assert_eq!(HesitationContext::default().advantage(), Advantage::Even);
    }

    #[test]
    fn test_total_steps() {
        let engine = engine();
        assert_eq!(engine.total_steps(3, 0.0), 4);
        assert_eq!(engine.total_steps(3, 3.0), 8);
        assert_eq!(engine.total_steps(3, 1.5), 6);
        // half an extra step rounds to even
        assert_eq!(engine.total_steps(3, 0.375), 4);
        assert_eq!(engine.total_steps(6, 0.0), 6);
        assert_eq!(engine.total_steps(3, 9.0), 8);
    }

    #[test]
    fn test_visit_pattern_covers_every_candidate() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..=6 {
            for pressure in [0.0, 1.0, 2.0, 3.0] {
                let pattern = engine.visit_pattern(n, pressure, &mut rng);
                assert_eq!(pattern.len(), engine.total_steps(n, pressure));
                let seen: HashSet<usize> = pattern.iter().copied().collect();
                assert_eq!(seen, (0..n).collect::<HashSet<_>>());
                assert!(pattern.iter().all(|&i| i < n));
            }
        }
        assert!(engine.visit_pattern(0, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn test_visit_pattern_avoids_immediate_repeats() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let pattern = engine.visit_pattern(4, 3.0, &mut rng);
            for pair in pattern[4..].windows(2) {
                assert_ne!(pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_dwell_bounds() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            for (step, revisit) in [(0, false), (2, true), (4, false)] {
                let dwell = engine.dwell_time(step, 5, 3.0, revisit, &mut rng).as_secs_f32();
                assert!(dwell >= 0.3 - 1e-6 && dwell <= 1.8 + 1e-6, "dwell {}", dwell);
            }
        }
    }

    #[test]
    fn test_style_tree_branches() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(5);
        let early = HesitationContext::new(7, 7, false, 1);
        let late_winning = HesitationContext::new(2, 3, false, 9);

        for _ in 0..200 {
            let first = engine.determine_style(&early, 0.0, 0, 5, &mut rng);
            assert!(matches!(first, HesitationStyle::Deduction | HesitationStyle::Vulnerable));

            let last = engine.determine_style(&late_winning, 0.0, 4, 5, &mut rng);
            assert!(matches!(last, HesitationStyle::Provoke | HesitationStyle::Bluff));

            let other_last = engine.determine_style(&early, 0.0, 4, 5, &mut rng);
            assert!(matches!(other_last, HesitationStyle::Bluff | HesitationStyle::Deduction));
        }

        let styles: HashSet<HesitationStyle> = (0..500)
            .map(|_| engine.determine_style(&early, 0.2, 2, 5, &mut rng))
            .collect();
        assert!(styles.contains(&HesitationStyle::Bluff));
        assert!(styles.contains(&HesitationStyle::Vulnerable));
        assert!(styles.contains(&HesitationStyle::Deduction));
        // Provoke needs pressure or a winning endgame
        assert!(!styles.contains(&HesitationStyle::Provoke));
    }

    #[test]
    fn test_final_step_lines() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(1);
        let late_winning = HesitationContext::new(2, 3, false, 9);
        assert_eq!(
            engine.styled_line(3, 4, HesitationStyle::Bluff, &late_winning, None, &mut rng),
            "Finishing blow"
        );

        let mid = HesitationContext::new(6, 6, false, 5);
        let profile = PersonalityProfile::new().with_cautiousness(0.9);
        assert_eq!(
            engine.styled_line(3, 4, HesitationStyle::Deduction, &mid, Some(&profile), &mut rng),
            "cautious one...right here"
        );
        assert_eq!(
            engine.styled_line(3, 4, HesitationStyle::Vulnerable, &mid, None, &mut rng),
            "...This'll do. Probably"
        );
    }

    #[test]
    fn test_styled_line_uses_trait_templates() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(2);
        let mid = HesitationContext::new(6, 6, false, 5);
        let profile = PersonalityProfile::new().with_cautiousness(0.9);
        for _ in 0..20 {
            let line = engine.styled_line(1, 4, HesitationStyle::Provoke, &mid, Some(&profile), &mut rng);
            assert!(line.contains("cautious"), "{}", line);
            assert!(!line.contains("{trait}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_candidates_waits_without_callbacks() {
        let engine = engine();
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(4);
        let start = Instant::now();
        let outcome = engine
            .play_generated(&mut sink, 0, 1.0, &HesitationContext::default(), None, None, &mut rng)
            .await;
        let elapsed = start.elapsed();
        assert!(sink.events.is_empty());
        assert!(elapsed >= Duration::from_millis(500) && elapsed <= Duration::from_millis(1001));
        assert!(outcome.visits.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_candidate() {
        let engine = engine();
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(4);
        let clip = AudioClip::new(vec![1u8; 8], Duration::from_millis(400));
        let steps = vec![CoTStep::new(3, "ignored")];

        let start = Instant::now();
        let outcome = engine
            .play_guided(&mut sink, &steps, &[Some(clip)], 1, 0.0, &mut rng)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(sink.focus_indices(), vec![0]);
        assert_eq!(sink.texts(), vec!["No choice, huh..."]);
        assert_eq!(sink.audio_cues(), 1);
        assert!(elapsed >= Duration::from_millis(800) && elapsed < Duration::from_millis(850));
        assert_eq!(outcome.elapsed, Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_three_candidates_at_rest() {
        let engine = engine();
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(9);
        let context = HesitationContext::new(7, 7, false, 1);

        let outcome = engine
            .play_generated(&mut sink, 3, 0.0, &context, None, None, &mut rng)
            .await;

        assert_eq!(outcome.visits.len(), 4);
        assert_eq!(sink.focus_indices(), outcome.visits);
        let seen: HashSet<usize> = outcome.visits.iter().copied().collect();
        assert_eq!(seen, HashSet::from([0, 1, 2]));

        let openings = BuiltinStrings.get_array("hesitation_dialogue.opening");
        assert!(openings.contains(&outcome.lines[0]));
        let fresh_visits = outcome
            .visits
            .windows(2)
            .filter(|pair| pair[0] != pair[1])
            .count();
        assert_eq!(outcome.lines.len(), 1 + fresh_visits);

        // last step locks the marker
        let last_visual = sink
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                PresentationEvent::Visual(v) => Some(*v),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_visual, VisualState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_prefers_line_source() {
        let engine = engine();
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(9);
        let mut source = FixedSource("From the source", 0);

        let outcome = engine
            .play_generated(
                &mut sink,
                3,
                3.0,
                &HesitationContext::new(5, 5, true, 4),
                None,
                Some(&mut source),
                &mut rng,
            )
            .await;
        assert!(outcome.lines.iter().all(|l| l == "From the source"));
        assert_eq!(source.1, outcome.lines.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guided_sequence() {
        let engine = engine();
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(12);
        let steps = vec![
            CoTStep::new(1, "This one twitched"),
            CoTStep::new(9, "Too far right"),
            CoTStep::new(-2, ""),
            CoTStep::new(2, "Got you"),
        ];
        let long_clip = AudioClip::new(vec![0u8; 16], Duration::from_secs(3));
        let audio = vec![Some(long_clip), None];

        let start = Instant::now();
        let outcome = engine.play_guided(&mut sink, &steps, &audio, 4, 0.0, &mut rng).await;

        assert_eq!(outcome.visits, vec![1, 3, 0, 2]);
        assert_eq!(sink.texts(), vec!["This one twitched", "Too far right", "Got you"]);
        assert_eq!(sink.audio_cues(), 1);

        let visuals: Vec<VisualState> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::Visual(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(
            visuals,
            vec![
                VisualState::Scanning,
                VisualState::Scanning,
                VisualState::Focusing,
                VisualState::Locked
            ]
        );

        // the first step is held for the clip plus its tail
        assert!(start.elapsed() >= Duration::from_millis(3300));
        let stops = sink
            .events
            .iter()
            .filter(|e| matches!(e, PresentationEvent::StopAudio))
            .count();
        assert_eq!(stops, 1);
    }
}
