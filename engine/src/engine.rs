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

//! The opponent's front door: one engine per table, owning every component
//! and routing each request through cache, generator and fallback tiers.

use crate::cache::{CacheStats, DEFAULT_SCENARIOS, PreWarmReport, ResponseCache};
use crate::config::{Configuration, EngineSettings, TimeoutConfig};
use crate::context::{ContextBuilder, PromptContext};
use crate::emotion::EmotionalStateMachine;
use crate::fallback::{FallbackController, Tier};
use crate::hesitation::{HesitationContext, HesitationEngine, HesitationOutcome, LineRequest, LineSource};
use crate::llm::{
    AudioClip, GenerationError, GenerationRequest, SpeechSynthesizer, TextGenerator, VoiceParams,
};
use crate::memory::{KeyValueStore, SessionMemory};
use crate::personality::PersonalityAdapter;
use crate::presentation::PresentationSink;
use crate::session::AISessionState;
use crate::strings::StringTable;
use async_trait::async_trait;
use dealer_common::{
    AIDecisionResult, BehaviorPattern, CoTStep, DialogueCategory, EmotionalState, GameEvent,
    GameStateData, PersonalityProfile, PlayerAction, SessionSummary,
};
use futures::FutureExt;
use futures::future::join_all;
use metrics::histogram;
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const DEFAULT_STRATEGY: &str = "Adaptive";
const DEFAULT_CONFIDENCE: f32 = 0.5;

static DECISION_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:position|select|choice|card)\s*[:=]?\s*(\d+)").unwrap());

/// Call counters since the engine was built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub total_calls: u64,
    /// Answered by the generator
    pub successful_calls: u64,
    pub cached_calls: u64,
    /// Answered by the rule-based or static tiers
    pub fallback_calls: u64,
    pub cache_hit_rate: f32,
    pub cache: CacheStats,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Calls: {}, Successful: {}, Cached: {}, Fallback: {}, Cache Hit Rate: {:.1}%, {}",
            self.total_calls,
            self.successful_calls,
            self.cached_calls,
            self.fallback_calls,
            self.cache_hit_rate * 100.0,
            self.cache
        )
    }
}

/// Everything the engine talks to but does not own the behavior of
pub struct Collaborators<S> {
    /// `None` runs the engine entirely on its rule-based tiers
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub strings: Arc<dyn StringTable>,
    pub store: Arc<dyn KeyValueStore>,
    pub sink: S,
}

/// Cache key for a spoken line
pub fn dialogue_cache_key(category: DialogueCategory, pattern: &BehaviorPattern, pressure: f32) -> String {
    format!(
        "{}_d{}_t{}_s{}_p{}",
        category,
        (pattern.doubt_level * 10.0).floor() as i32,
        pattern.tempo,
        pattern.streak_same_position,
        (pressure * 2.0).floor() as i32
    )
}

/// Cache key for a card pick
pub fn decision_cache_key(pattern: &BehaviorPattern, pressure: f32, card_count: i32) -> String {
    let preferred = if pattern.preferred_position >= 0 {
        pattern.preferred_position
    } else {
        -1
    };
    format!(
        "decision_d{}_t{}_pos{}_s{}_pr{}_c{}",
        (pattern.doubt_level * 10.0).floor() as i32,
        pattern.tempo,
        preferred,
        pattern.streak_same_position,
        (pressure * 2.0).floor() as i32,
        card_count
    )
}

/// Read a generator's decision. Malformed JSON falls back to scraping a
/// position out of the prose.
pub fn parse_decision_response(response: &str, card_count: i32) -> AIDecisionResult {
    let max_index = i64::from((card_count - 1).max(0));
    match parse_decision_json(response, max_index) {
        Some(decision) => decision,
        None => {
            warn!("Decision response was not usable JSON, extracting from text");
            extract_decision(response, max_index)
        }
    }
}

fn as_index(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn parse_decision_json(response: &str, max_index: i64) -> Option<AIDecisionResult> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    let json: Value = serde_json::from_str(&response[start..=end]).ok()?;

    let position = json.get("position").and_then(as_index)?.clamp(0, max_index) as i32;
    let confidence = json
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(DEFAULT_CONFIDENCE, |c| c as f32)
        .clamp(0.0, 1.0);
    let strategy = json
        .get("strategy")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_STRATEGY);

    let steps: Vec<CoTStep> = json
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(|step| {
                    let card = step.get("card").and_then(as_index)?;
                    let thought = step.get("thought").and_then(Value::as_str)?;
                    Some(CoTStep::new(card.clamp(0, max_index) as i32, thought))
                })
                .collect()
        })
        .unwrap_or_default();

    debug!(
        "Parsed decision: position={} confidence={:.2} strategy={} steps={}",
        position,
        confidence,
        strategy,
        steps.len()
    );
    Some(AIDecisionResult::new(position, confidence, strategy).with_steps(steps))
}

fn extract_decision(text: &str, max_index: i64) -> AIDecisionResult {
    let position = DECISION_HINT
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(1)
        .clamp(0, max_index) as i32;
    debug!("Extracted decision from text: position={}", position);
    AIDecisionResult::new(position, DEFAULT_CONFIDENCE, DEFAULT_STRATEGY)
}

/// Synthesize one line, consulting and filling the audio cache when one is given
async fn speak(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: Option<ResponseCache>,
    text: String,
    voice: VoiceParams,
    timeout: Duration,
) -> Option<AudioClip> {
    if let Some(cache) = &cache {
        if let Some(clip) = cache.get_audio(&text).await {
            return Some(clip);
        }
    }

    let clip = match tokio::time::timeout(timeout, synthesizer.synthesize(&text, &voice)).await {
        Ok(Ok(clip)) => clip,
        Ok(Err(e)) => {
            warn!("Speech synthesis failed ({}): {}", synthesizer.name(), e);
            return None;
        }
        Err(_) => {
            warn!("Speech synthesis timed out after {:?}", timeout);
            return None;
        }
    };

    if let Some(cache) = &cache {
        cache.set_audio(&text, clip.clone()).await;
    }
    Some(clip)
}

/// Line source that asks the generator for each muttered line
struct GeneratorLines<'a> {
    generator: &'a dyn TextGenerator,
    builder: &'a ContextBuilder,
    pattern: Option<&'a BehaviorPattern>,
    profile: Option<&'a PersonalityProfile>,
    timeout: Duration,
    stats: &'a mut EngineStats,
}

#[async_trait]
impl<'a> LineSource for GeneratorLines<'a> {
    async fn line(&mut self, request: &LineRequest) -> Option<String> {
        let prompt = self.builder.hesitation_prompt(
            request.step,
            request.total_steps,
            request.pressure,
            request.style,
            self.pattern,
            self.profile,
            Some(&request.context),
        );
        let request = GenerationRequest::new(prompt)
            .with_max_tokens(60)
            .with_temperature(0.9);

        self.stats.total_calls += 1;
        let line = match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) => {
                let text = text.trim().trim_matches('"').trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Ok(Err(e)) => {
                debug!("Hesitation line generation failed: {}", e);
                None
            }
            Err(_) => {
                debug!("Hesitation line generation timed out");
                None
            }
        };
        if line.is_some() {
            self.stats.successful_calls += 1;
        } else {
            self.stats.fallback_calls += 1;
        }
        line
    }
}

/// Profile notes and commentary produced in the background at session start
#[derive(Debug, Default)]
struct SessionInsights {
    notes: Vec<String>,
    read_lines: Vec<String>,
}

/// Adaptive dialogue and decision engine for one table
pub struct DialogueEngine<S> {
    settings: EngineSettings,
    timeouts: TimeoutConfig,
    max_session_history: usize,
    generator: Option<Arc<dyn TextGenerator>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    strings: Arc<dyn StringTable>,
    cache: ResponseCache,
    fallback: FallbackController,
    emotion: EmotionalStateMachine,
    adapter: PersonalityAdapter,
    context: ContextBuilder,
    hesitation: HesitationEngine,
    memory: SessionMemory,
    session: AISessionState,
    sink: S,
    rng: StdRng,
    stats: EngineStats,
    pending_insights: Option<JoinHandle<SessionInsights>>,
}

impl<S: PresentationSink> DialogueEngine<S> {
    pub fn new(config: &Configuration, collaborators: Collaborators<S>) -> Self {
        let Collaborators {
            generator,
            synthesizer,
            strings,
            store,
            sink,
        } = collaborators;

        let generator = generator.filter(|_| config.engine.enable_generation);
        let rng = match config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut memory = SessionMemory::new(
            store,
            &config.memory.encryption_key,
            config.history.max_session_history,
        );
        memory.load();

        info!(
            "Dialogue engine ready (generator: {}, speech: {}, cache: {})",
            generator.is_some(),
            synthesizer.is_some(),
            config.engine.enable_cache
        );

        Self {
            settings: config.engine.clone(),
            timeouts: config.timeouts.clone(),
            max_session_history: config.history.max_session_history,
            fallback: FallbackController::new(strings.as_ref()),
            hesitation: HesitationEngine::new(&config.hesitation, strings.as_ref()),
            emotion: EmotionalStateMachine::new(config.history.max_transition_history),
            adapter: PersonalityAdapter::new(&config.adaptation),
            context: ContextBuilder::new(&config.history),
            session: AISessionState::new(&config.history),
            cache: ResponseCache::new(&config.cache),
            generator,
            synthesizer,
            strings,
            memory,
            sink,
            rng,
            stats: EngineStats::default(),
            pending_insights: None,
        }
    }

    pub fn session(&self) -> &AISessionState {
        &self.session
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn emotion(&self) -> &EmotionalStateMachine {
        &self.emotion
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pressure(&self) -> f32 {
        self.session.pressure()
    }

    fn timeout(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    // Session lifecycle

    /// Start a new game. Without an explicit `profile` the one remembered from
    /// earlier sessions is used.
    ///
    /// Profile enhancement runs on a background task and lands at a later turn
    /// boundary, so this returns immediately. With a generator configured it
    /// must be called from within a tokio runtime.
    #[instrument(skip(self, profile), fields(turn = game.turn_number))]
    pub fn begin_session(&mut self, profile: Option<PersonalityProfile>, game: GameStateData) {
        let profile = profile.or_else(|| self.memory.persistent_profile().cloned());

        self.session.begin(profile.clone(), game);
        self.context.clear_history();
        self.emotion.reset();
        self.emotion.set_profile(profile.clone());
        self.fallback.set_player_profile(profile.clone());
        self.fallback.rules_mut().set_personality_read_lines(Vec::new());

        if let Some(previous) = self.pending_insights.take() {
            previous.abort();
        }
        if let (Some(generator), Some(profile)) = (self.generator.clone(), profile) {
            let timeout = Self::timeout(self.timeouts.enhancement_ms);
            self.pending_insights = Some(tokio::spawn(async move {
                let (insights, read_lines) = futures::join!(
                    PersonalityAdapter::enhance(generator.as_ref(), &profile, timeout),
                    PersonalityAdapter::read_lines(generator.as_ref(), &profile, timeout),
                );
                let mut notes = Vec::new();
                if let Some(insights) = insights {
                    notes.extend(insights.weaknesses.iter().map(|w| format!("Weakness: {}", w)));
                    notes.extend(insights.strategies.iter().map(|s| format!("Strategy: {}", s)));
                }
                SessionInsights { notes, read_lines }
            }));
        }

        info!(
            "Session {} started (profile: {})",
            self.session.id,
            if self.session.base_profile.is_some() { "loaded" } else { "none" }
        );
    }

    /// Whether session-start enhancement is still running
    pub fn insights_pending(&self) -> bool {
        self.pending_insights.is_some()
    }

    /// Fold finished session-start insights into the session without waiting
    fn apply_pending_insights(&mut self) {
        let Some(handle) = self.pending_insights.as_mut() else {
            return;
        };
        if !handle.is_finished() {
            return;
        }
        let result = handle.now_or_never();
        self.pending_insights = None;

        match result {
            Some(Ok(insights)) => {
                debug!(
                    "Applying profile insights: {} notes, {} read lines",
                    insights.notes.len(),
                    insights.read_lines.len()
                );
                for note in &insights.notes {
                    self.session.add_adaptation_note(note);
                }
                self.fallback.rules_mut().set_personality_read_lines(insights.read_lines);
            }
            Some(Err(e)) => warn!("Profile enhancement task failed: {}", e),
            None => warn!("Profile enhancement finished without a result"),
        }
    }

    pub fn set_game_state(&mut self, mut game: GameStateData) {
        game.update_phase();
        self.session.game = game;
    }

    /// Log what the player just did and drift the profile toward it.
    /// Returns how many traits moved.
    pub fn record_player_action(&mut self, action: PlayerAction, pattern: &BehaviorPattern) -> usize {
        self.apply_pending_insights();
        self.session.record_behavior(action);
        let moved = self.adapter.adapt(&mut self.session, pattern);
        if moved > 0 {
            let adapted = self.session.adapted_profile.clone();
            self.emotion.update_profile(adapted.clone());
            self.fallback.set_player_profile(adapted);
            debug!(
                "{}",
                PersonalityAdapter::adaptation_status(
                    self.session.base_profile.as_ref(),
                    self.session.adapted_profile.as_ref()
                )
            );
        }
        moved
    }

    pub fn update_pressure(&mut self, delta: f32) {
        self.session.update_pressure(delta);
    }

    /// Advance idle time by `delta_time` seconds
    pub fn tick(&mut self, delta_time: f32) {
        self.session.decay_pressure(delta_time);
    }

    /// Feed a game event to the emotional state machine. The sink hears about
    /// any resulting change.
    pub fn handle_event(&mut self, event: GameEvent, pattern: Option<&BehaviorPattern>) -> Option<EmotionalState> {
        let last = self
            .session
            .last_decision()
            .map(|d| AIDecisionResult::new(d.selected_card_index, d.confidence, d.strategy.clone()));
        let changed = self
            .emotion
            .handle_event(event, pattern, last.as_ref(), &mut self.rng)?;

        self.session.emotion = changed;
        self.sink.on_emotion_changed(changed);
        info!("Emotion changed to {} after {}", changed, event);
        Some(changed)
    }

    /// Summarize the session and persist it with the adapted profile
    pub fn end_session(&mut self) -> SessionSummary {
        if let Some(pending) = self.pending_insights.take() {
            pending.abort();
        }
        let summary = self.memory.save_session(&self.session);
        info!(
            "Session {} ended after {} turns (player won: {})",
            self.session.id, summary.turn_count, summary.player_won
        );
        summary
    }

    /// Reload strings for a new locale. Cached lines and template usage are
    /// dropped since they belong to the old language.
    pub async fn reload_locale(&mut self) {
        if let Err(e) = self.strings.reload() {
            warn!("String table reload failed, keeping previous lines: {}", e);
        }
        self.cache.clear().await;
        self.fallback.reload(self.strings.as_ref());
        self.hesitation.reload(self.strings.as_ref());
        info!("Locale reloaded");
    }

    // Generation

    /// A line for `category`. Never fails.
    #[instrument(skip(self, pattern), fields(pressure = self.session.pressure()))]
    pub async fn generate_dialogue(&mut self, category: DialogueCategory, pattern: &BehaviorPattern) -> String {
        self.stats.total_calls += 1;
        let pressure = self.session.pressure();
        let key = dialogue_cache_key(category, pattern, pressure);

        if self.settings.enable_cache {
            if let Some(text) = self.cache.get(&key).await {
                self.stats.cached_calls += 1;
                debug!("Dialogue cache hit for {}", key);
                self.remember_dialogue(category, &text);
                return text;
            }
        }

        let start = Instant::now();
        let emotional = self.emotion.emotional_context();
        let sessions = self.memory.recent_sessions(Some(self.max_session_history));
        let primary = self.generator.clone().map(|generator| {
            let ctx = PromptContext::new(pattern, &self.session.game, pressure)
                .with_profile(self.session.adapted_profile.as_ref())
                .with_emotional_context(&emotional)
                .with_recent_sessions(&sessions);
            let request = GenerationRequest::new(self.context.dialogue_prompt(&ctx, category))
                .with_max_tokens(150)
                .with_temperature(0.8);
            async move { generator.generate(request).await }
        });

        let resolved = self
            .fallback
            .resolve_dialogue(
                primary,
                Self::timeout(self.timeouts.dialogue_ms),
                category,
                pattern,
                pressure,
                &mut self.rng,
            )
            .await;

        if resolved.tier == Tier::Primary {
            self.stats.successful_calls += 1;
            if self.settings.enable_cache {
                self.cache.set(&key, &resolved.value).await;
            }
        } else {
            self.stats.fallback_calls += 1;
        }
        histogram!("dealer.generation.duration", "kind" => "dialogue").record(start.elapsed().as_secs_f64());

        debug!("Dialogue ({} via {}): {}", category, resolved.tier, resolved.value);
        self.remember_dialogue(category, &resolved.value);
        resolved.value
    }

    fn remember_dialogue(&mut self, category: DialogueCategory, text: &str) {
        self.session.record_dialogue(category, text);
        self.context
            .add_dialogue(self.session.game.turn_number, text, category.as_key());
    }

    /// Pick one of `card_count` cards. A non-positive count yields the
    /// invalid result without consulting anything.
    #[instrument(skip(self, pattern), fields(pressure = self.session.pressure()))]
    pub async fn decide(&mut self, card_count: i32, pattern: &BehaviorPattern) -> AIDecisionResult {
        self.stats.total_calls += 1;
        let pressure = self.session.pressure();
        let key = decision_cache_key(pattern, pressure, card_count);

        if self.settings.enable_cache && card_count > 0 {
            if let Some(decision) = self.cache.get_decision(&key).await {
                self.stats.cached_calls += 1;
                debug!("Decision cache hit: position={}", decision.selected_card_index);
                self.session.record_decision(&decision);
                return decision;
            }
        }

        let start = Instant::now();
        let emotional = self.emotion.emotional_context();
        let sessions = self.memory.recent_sessions(Some(self.max_session_history));
        let primary = self.generator.clone().filter(|_| card_count > 0).map(|generator| {
            let ctx = PromptContext::new(pattern, &self.session.game, pressure)
                .with_profile(self.session.adapted_profile.as_ref())
                .with_emotional_context(&emotional)
                .with_recent_sessions(&sessions);
            let request = GenerationRequest::new(self.context.decision_prompt(&ctx, card_count))
                .with_max_tokens(300)
                .with_temperature(0.6);
            async move {
                let response = generator.generate(request).await?;
                Ok::<_, GenerationError>(parse_decision_response(&response, card_count))
            }
        });

        let resolved = self
            .fallback
            .resolve_decision(
                primary,
                Self::timeout(self.timeouts.decision_ms),
                card_count,
                pattern,
                pressure,
                &mut self.rng,
            )
            .await;
        histogram!("dealer.generation.duration", "kind" => "decision").record(start.elapsed().as_secs_f64());

        let mut decision = resolved.value;
        if decision.is_invalid() {
            self.stats.fallback_calls += 1;
            return decision;
        }
        if resolved.tier == Tier::Primary {
            self.stats.successful_calls += 1;
        } else {
            self.stats.fallback_calls += 1;
        }

        if decision.cot_steps.is_empty() {
            decision.cot_steps =
                self.fallback
                    .fallback_cot_steps(&decision, pattern, pressure, card_count, &mut self.rng);
            debug!("Generated {} fallback reasoning steps", decision.cot_steps.len());
        }

        info!(
            "Decision via {}: position={} confidence={:.2} strategy={}",
            resolved.tier, decision.selected_card_index, decision.confidence, decision.strategy
        );
        self.session.record_decision(&decision);
        if self.settings.enable_cache {
            self.cache.set_decision(&key, decision.clone()).await;
        }
        decision
    }

    /// A one-line reaction to the opponent's own mood. Only the generator can
    /// produce these.
    pub async fn emotional_reaction(&mut self, pattern: Option<&BehaviorPattern>) -> Option<String> {
        let generator = self.generator.clone()?;
        self.stats.total_calls += 1;

        let prompt = self.context.emotional_reaction_prompt(
            self.emotion.current(),
            pattern,
            self.session.game.turn_number,
        );
        let request = GenerationRequest::new(prompt)
            .with_max_tokens(100)
            .with_temperature(0.9);
        let timeout = Self::timeout(self.timeouts.dialogue_ms);

        match tokio::time::timeout(timeout, generator.generate(request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                self.stats.successful_calls += 1;
                Some(text.trim().replace('"', ""))
            }
            _ => {
                self.stats.fallback_calls += 1;
                None
            }
        }
    }

    // Rule-based extras

    pub fn turn_start_line(&mut self, pattern: Option<&BehaviorPattern>) -> String {
        self.apply_pending_insights();
        let turn = self.session.game.turn_number;
        self.fallback.rules_mut().turn_start(pattern, turn, &mut self.rng)
    }

    pub fn ai_turn_reasoning(&mut self, pattern: Option<&BehaviorPattern>) -> String {
        let game = &self.session.game;
        self.fallback.rules_mut().ai_turn_reasoning(
            pattern,
            game.turn_number,
            game.player_card_count,
            &mut self.rng,
        )
    }

    pub fn ai_draw_comment(&mut self, drawn_joker: bool, formed_pair: bool, pattern: Option<&BehaviorPattern>) -> String {
        self.fallback
            .rules_mut()
            .ai_draw_comment(drawn_joker, formed_pair, pattern, &mut self.rng)
    }

    pub fn joker_tease(&mut self, is_real_joker: bool) -> String {
        self.fallback.rules_mut().joker_tease(is_real_joker, &mut self.rng)
    }

    pub fn idle_taunt(&mut self, idle_index: u32, pattern: Option<&BehaviorPattern>) -> String {
        self.fallback
            .rules_mut()
            .idle_taunt(idle_index, pattern, &mut self.rng)
    }

    // Speech

    fn audio_cache(&self) -> Option<ResponseCache> {
        self.settings.enable_cache.then(|| self.cache.clone())
    }

    /// Spoken rendition of `text` in the voice for `emotion`
    pub async fn synthesize(&self, text: &str, emotion: EmotionalState) -> Option<AudioClip> {
        let synthesizer = self.synthesizer.clone()?;
        if text.trim().is_empty() {
            return None;
        }
        speak(
            synthesizer,
            self.audio_cache(),
            text.to_string(),
            VoiceParams::for_emotion(emotion),
            Self::timeout(self.timeouts.speech_ms),
        )
        .await
    }

    /// Start synthesizing every step's thought in the background, one task
    /// per step. Slot `i` of the result belongs to step `i`.
    pub fn pre_generate_cot_audio(
        &self,
        steps: &[CoTStep],
        emotion: EmotionalState,
    ) -> Option<JoinHandle<Vec<Option<AudioClip>>>> {
        let synthesizer = self.synthesizer.clone()?;
        if steps.is_empty() {
            return None;
        }

        let voice = VoiceParams::for_emotion(emotion);
        let timeout = Self::timeout(self.timeouts.speech_ms);
        let tasks: Vec<Option<JoinHandle<Option<AudioClip>>>> = steps
            .iter()
            .map(|step| {
                let thought = step.thought.trim();
                (!thought.is_empty()).then(|| {
                    tokio::spawn(speak(
                        synthesizer.clone(),
                        self.audio_cache(),
                        thought.to_string(),
                        voice.clone(),
                        timeout,
                    ))
                })
            })
            .collect();

        Some(tokio::spawn(async move {
            let clips: Vec<Option<AudioClip>> = join_all(tasks.into_iter().enumerate().map(|(i, task)| async move {
                match task {
                    Some(handle) => handle.await.unwrap_or_else(|e| {
                        warn!("Reasoning audio for step {} failed: {}", i, e);
                        None
                    }),
                    None => None,
                }
            }))
            .await;
            debug!(
                "Pre-generated reasoning audio: {}/{} clips",
                clips.iter().filter(|c| c.is_some()).count(),
                clips.len()
            );
            clips
        }))
    }

    /// Wait at most `wait` for pre-generated audio. On timeout the work is
    /// abandoned and the caller proceeds without audio.
    pub async fn collect_pre_generated(
        mut handle: JoinHandle<Vec<Option<AudioClip>>>,
        wait: Duration,
    ) -> Vec<Option<AudioClip>> {
        match tokio::time::timeout(wait, &mut handle).await {
            Ok(Ok(clips)) => clips,
            Ok(Err(e)) => {
                warn!("Audio pre-generation task failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Audio pre-generation not ready after {:?}, continuing without audio", wait);
                handle.abort();
                Vec::new()
            }
        }
    }

    pub fn pre_generation_wait(&self) -> Duration {
        Self::timeout(self.timeouts.pre_generation_wait_ms)
    }

    // Hesitation

    /// Play `decision`'s reasoning steps over `card_count` cards
    #[instrument(skip(self, decision, audio))]
    pub async fn play_decision(
        &mut self,
        decision: &AIDecisionResult,
        card_count: usize,
        audio: &[Option<AudioClip>],
    ) -> HesitationOutcome {
        let pressure = self.session.pressure();
        self.hesitation
            .play_guided(&mut self.sink, &decision.cot_steps, audio, card_count, pressure, &mut self.rng)
            .await
    }

    /// Improvise a deliberation over `card_count` cards, with generated lines
    /// when a generator is attached
    #[instrument(skip(self, table, pattern))]
    pub async fn play_hesitation(
        &mut self,
        card_count: usize,
        table: &HesitationContext,
        pattern: Option<&BehaviorPattern>,
    ) -> HesitationOutcome {
        let pressure = self.session.pressure();
        let profile = self.session.adapted_profile.as_ref();
        let timeout = Self::timeout(self.timeouts.dialogue_ms);
        let mut lines = self.generator.as_deref().map(|generator| GeneratorLines {
            generator,
            builder: &self.context,
            pattern,
            profile,
            timeout,
            stats: &mut self.stats,
        });
        let source = lines.as_mut().map(|l| l as &mut dyn LineSource);

        self.hesitation
            .play_generated(&mut self.sink, card_count, pressure, table, profile, source, &mut self.rng)
            .await
    }

    // Cache and statistics

    /// Fill the cache with canned scenario variations when pre-warming is enabled
    pub async fn pre_warm(&self) -> Option<PreWarmReport> {
        if !(self.settings.enable_pre_warming && self.settings.enable_cache) {
            return None;
        }
        let generator = self.generator.as_deref()?;
        Some(self.cache.pre_warm(generator, DEFAULT_SCENARIOS).await)
    }

    pub async fn stats(&self) -> EngineStats {
        let cache = if self.settings.enable_cache {
            self.cache.stats().await
        } else {
            CacheStats::default()
        };
        let cache_hit_rate = if self.stats.total_calls > 0 {
            self.stats.cached_calls as f32 / self.stats.total_calls as f32
        } else {
            0.0
        };
        EngineStats {
            cache_hit_rate,
            cache,
            ..self.stats.clone()
        }
    }

    pub async fn log_stats(&self) {
        info!("Engine statistics: {}", self.stats().await);
    }
}
