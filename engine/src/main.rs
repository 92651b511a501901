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

//! Scripted table run: a simulated player against the engine, with every
//! line, decision and hesitation beat going to the log.

use anyhow::Context;
use clap::Parser;
use dealer_common::{
    BehaviorPattern, DialogueCategory, FacialExpression, GameEvent, GameStateData,
    PersonalityProfile, PlayerAction, Tempo,
};
use dealer_engine::config::{Arguments, Configuration};
use dealer_engine::llm::{ScriptedGenerator, ScriptedSynthesizer};
use dealer_engine::{
    BuiltinStrings, Collaborators, DialogueEngine, FileStore, HesitationContext, InMemoryStore,
    KeyValueStore, LoggingSink, SpeechSynthesizer, StringTable, TextGenerator, YamlStringTable,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STARTING_CARDS: u32 = 7;

/// The simulated player's draws so far
#[derive(Default)]
struct PlayerModel {
    actions: Vec<PlayerAction>,
}

impl PlayerModel {
    fn act(&mut self, turn: u32, cards: u32, rng: &mut StdRng) -> PlayerAction {
        let nervous = rng.random_bool(0.4);
        let selected_position = match self.actions.last() {
            // Creatures of habit
            Some(last) if rng.random_bool(0.5) => last.selected_position.min(cards as i32 - 1),
            _ => rng.random_range(0..cards.max(1) as i32),
        };
        let action = PlayerAction {
            selected_position,
            hover_duration: if nervous { rng.random_range(2.0..6.0) } else { rng.random_range(0.3..2.0) },
            decision_time: if nervous { rng.random_range(3.0..8.0) } else { rng.random_range(0.5..2.5) },
            doubt_level: if nervous { rng.random_range(0.6..1.0) } else { rng.random_range(0.0..0.5) },
            turn_number: turn,
        };
        self.actions.push(action.clone());
        action
    }

    fn pattern(&self, rng: &mut StdRng) -> BehaviorPattern {
        let Some(last) = self.actions.last() else {
            return BehaviorPattern::new();
        };
        let n = self.actions.len() as f32;
        let avg = |f: fn(&PlayerAction) -> f32| self.actions.iter().map(f).sum::<f32>() / n;
        let avg_decision = avg(|a| a.decision_time);
        let tempo = match avg_decision {
            t if t < 1.5 => Tempo::Fast,
            t if t > 4.0 => Tempo::Slow,
            _ if self.actions.len() > 2 && rng.random_bool(0.2) => Tempo::Erratic,
            _ => Tempo::Normal,
        };
        let streak = self
            .actions
            .iter()
            .rev()
            .take_while(|a| a.selected_position == last.selected_position)
            .count() as u32;

        let mut pattern = BehaviorPattern::new()
            .with_doubt(avg(|a| a.doubt_level))
            .with_tempo(tempo)
            .with_timings(avg(|a| a.hover_duration), avg_decision)
            .with_streak(streak);
        if streak >= 2 {
            pattern = pattern.with_preference(last.selected_position, streak);
        }
        if last.doubt_level > 0.7 {
            pattern = pattern.with_expression(FacialExpression::Fearful, 0.7);
        }
        pattern
    }
}

fn pick_category(pattern: &BehaviorPattern, rng: &mut StdRng) -> DialogueCategory {
    if pattern.doubt_level > 0.6 {
        DialogueCategory::Stop
    } else if pattern.shows_position_streak() {
        DialogueCategory::Mirror
    } else if rng.random_bool(0.5) {
        DialogueCategory::Bait
    } else {
        DialogueCategory::General
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration, falling back to defaults when there is no file
    let mut config = if std::path::Path::new(&arguments.config_file).exists() {
        Configuration::load(&arguments.config_file)
            .with_context(|| format!("Unable to load configuration file {}", arguments.config_file))?
    } else {
        tracing::warn!("No configuration at {}, using defaults", arguments.config_file);
        Configuration::default()
    };
    let seed = arguments
        .seed
        .or(config.engine.seed)
        .unwrap_or_else(rand::random);
    config.engine.seed = Some(seed);
    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Dealer demo table (seed {})", seed);

    let strings: Arc<dyn StringTable> = if config.strings.table_path.is_empty() {
        Arc::new(BuiltinStrings::new())
    } else {
        Arc::new(YamlStringTable::open(&config.strings.table_path)?)
    };
    let store: Arc<dyn KeyValueStore> = if config.memory.store_path.is_empty() {
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(FileStore::open(config.memory.store_path.as_str())?)
    };
    let (generator, synthesizer): (Option<Arc<dyn TextGenerator>>, Option<Arc<dyn SpeechSynthesizer>>) =
        if arguments.offline {
            tracing::info!("Offline: speaking from rule-based tiers only");
            (None, None)
        } else {
            (
                Some(Arc::new(ScriptedGenerator::new(
                    Duration::from_millis(arguments.latency_ms),
                    arguments.failure_rate,
                    seed,
                ))),
                Some(Arc::new(ScriptedSynthesizer::new(Duration::from_millis(150)))),
            )
        };

    let mut engine = DialogueEngine::new(
        &config,
        Collaborators {
            generator,
            synthesizer,
            strings,
            store,
            sink: LoggingSink,
        },
    );
    if let Some(report) = engine.pre_warm().await {
        tracing::info!("Pre-warm: {} ok, {} failed", report.succeeded, report.failed);
    }

    let mut table = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut player = PlayerModel::default();
    let (mut player_cards, mut ai_cards) = (STARTING_CARDS, STARTING_CARDS);
    let mut ai_holds_joker = table.random_bool(0.5);

    let profile = PersonalityProfile::new()
        .with_cautiousness(table.random_range(0.2..0.9))
        .with_intuition(table.random_range(0.2..0.9))
        .with_resilience(table.random_range(0.2..0.9));
    engine.begin_session(Some(profile), GameStateData::new(1, player_cards, ai_cards));

    for turn in 1..=arguments.turns {
        engine.set_game_state(GameStateData::new(turn, player_cards, ai_cards));
        tracing::info!("=== Turn {} (player {} cards, dealer {} cards) ===", turn, player_cards, ai_cards);

        let pattern = player.pattern(&mut table);
        engine.handle_event(GameEvent::TurnStart, Some(&pattern));
        tracing::info!("Turn start: {}", engine.turn_start_line(Some(&pattern)));

        // Player draws from the dealer's hand
        if ai_holds_joker {
            tracing::info!("Tease: {}", engine.joker_tease(true));
        }
        let action = player.act(turn, ai_cards, &mut table);
        let pattern = player.pattern(&mut table);
        let moved = engine.record_player_action(action.clone(), &pattern);
        tracing::info!(
            "Player hovers {:.1}s, picks position {} (doubt {:.2}, {} traits adapted)",
            action.hover_duration,
            action.selected_position,
            action.doubt_level,
            moved
        );
        if action.doubt_level > 0.6 {
            engine.handle_event(GameEvent::PlayerHesitating, Some(&pattern));
        }
        if pattern.shows_position_streak() {
            engine.handle_event(GameEvent::PlayerShowingPattern, Some(&pattern));
        }

        let category = pick_category(&pattern, &mut table);
        let line = engine.generate_dialogue(category, &pattern).await;
        tracing::info!("Dealer ({}): {}", category, line);
        if let Some(clip) = engine.synthesize(&line, engine.emotion().current()).await {
            tracing::info!("Voiced line: {:.2}s", clip.length());
        }
        engine.update_pressure(if action.doubt_level > 0.6 { 0.5 } else { 0.2 });

        let drew_joker = ai_holds_joker && table.random_bool(1.0 / ai_cards.max(1) as f64);
        if drew_joker {
            ai_holds_joker = false;
            player_cards += 1;
            ai_cards -= 1;
            engine.handle_event(GameEvent::PlayerDrawJoker, Some(&pattern));
        } else if table.random_bool(0.5) {
            player_cards = player_cards.saturating_sub(1);
            ai_cards -= 1;
            engine.handle_event(GameEvent::PairMatched, Some(&pattern));
        } else {
            player_cards += 1;
            ai_cards -= 1;
            engine.handle_event(GameEvent::PlayerDrawSuccessful, Some(&pattern));
        }
        if ai_cards == 0 || player_cards == 0 {
            break;
        }

        // Dealer draws from the player's hand
        engine.set_game_state(GameStateData::new(turn, player_cards, ai_cards));
        tracing::info!("Dealer thinks: {}", engine.ai_turn_reasoning(Some(&pattern)));
        let decision = engine.decide(player_cards as i32, &pattern).await;
        tracing::info!(
            "Decision: card {} (confidence {:.2}, {}), {} reasoning steps",
            decision.selected_card_index,
            decision.confidence,
            decision.strategy,
            decision.cot_steps.len()
        );

        let outcome = if turn % 2 == 1 {
            let audio = match engine.pre_generate_cot_audio(&decision.cot_steps, engine.emotion().current()) {
                Some(handle) => {
                    DialogueEngine::<LoggingSink>::collect_pre_generated(handle, engine.pre_generation_wait()).await
                }
                None => Vec::new(),
            };
            engine.play_decision(&decision, player_cards as usize, &audio).await
        } else {
            let context = HesitationContext::new(ai_cards, player_cards, ai_holds_joker, turn);
            engine
                .play_hesitation(player_cards as usize, &context, Some(&pattern))
                .await
        };
        tracing::info!("Hesitation visited {:?} over {:?}", outcome.visits, outcome.elapsed);

        let took_joker = !ai_holds_joker && table.random_bool(1.0 / player_cards.max(1) as f64);
        let formed_pair = !took_joker && table.random_bool(0.5);
        tracing::info!("Dealer: {}", engine.ai_draw_comment(took_joker, formed_pair, Some(&pattern)));
        if took_joker {
            ai_holds_joker = true;
            ai_cards += 1;
            player_cards -= 1;
            engine.handle_event(GameEvent::AIDrawJoker, Some(&pattern));
        } else if formed_pair {
            ai_cards = ai_cards.saturating_sub(1);
            player_cards -= 1;
            engine.handle_event(GameEvent::AIDrawSuccessful, Some(&pattern));
        } else {
            ai_cards += 1;
            player_cards -= 1;
        }
        if ai_cards + player_cards < 6 {
            engine.handle_event(GameEvent::GameNearEnd, Some(&pattern));
        }
        if let Some(reaction) = engine.emotional_reaction(Some(&pattern)).await {
            tracing::info!("Reaction ({}): {}", engine.emotion().current(), reaction);
        }

        engine.tick(1.5);
        if ai_cards == 0 || player_cards == 0 {
            break;
        }
        if table.random_bool(0.3) {
            tracing::info!("Idle: {}", engine.idle_taunt(0, Some(&pattern)));
        }
    }

    engine.set_game_state(GameStateData::new(
        engine.session().game.turn_number,
        player_cards,
        ai_cards,
    ));
    let summary = engine.end_session();
    tracing::info!(
        "Session summary: {} turns, player won: {}, reactions: {}",
        summary.turn_count,
        summary.player_won,
        summary.player_reactions
    );

    engine.log_stats().await;
    println!("{}", engine.stats().await);
    Ok(())
}
