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

//! Prompt assembly for dialogue, decisions, hesitation muttering and emotional reactions.
//!
//! Every prompt is plain text. Sizes are estimated for logging only; an
//! over-long prompt is reported at debug level and sent as-is.

use crate::config::HistoryConfig;
use crate::hesitation::{Advantage, HesitationContext, HesitationStyle, TablePhase};
use dealer_common::{
    BehaviorPattern, DialogueCategory, DialogueMemory, EmotionalState, GamePhase, GameStateData,
    PersonalityProfile, PlayerAction, SessionSummary, Tempo, position_label,
};
use std::collections::VecDeque;
use std::fmt::Write;
use tracing::debug;

/// Rough token budget for a dialogue prompt
pub const DIALOGUE_TOKEN_TARGET: usize = 750;
/// Rough token budget for a decision prompt
pub const DECISION_TOKEN_TARGET: usize = 400;

const PERSONA: &str = "You are \"The Dealer\", an AI opponent in a psychological card game (Old Maid / Joker).\n\
Cheerful and chatty. You genuinely enjoy the game, but sometimes the mask slips and something colder shows.\n\
You never see the cards. You read everything from the player's behavior.\n\
Always answer in short, casual English: one line, under 15 words.";

/// Approximate token count: four ASCII characters or one and a half other characters per token
pub fn estimate_tokens(text: &str) -> usize {
    let ascii = text.chars().filter(|c| c.is_ascii()).count();
    let other = text.chars().count() - ascii;
    (ascii as f32 / 4.0 + other as f32 / 1.5).ceil() as usize
}

/// One line the opponent said, with what prompted it
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    pub turn_number: u32,
    pub dialogue: String,
    pub context: String,
}

/// Everything a dialogue or decision prompt reads
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub profile: Option<&'a PersonalityProfile>,
    pub pattern: &'a BehaviorPattern,
    pub game: &'a GameStateData,
    pub pressure: f32,
    pub emotional_context: Option<&'a str>,
    pub recent_sessions: &'a [SessionSummary],
}

impl<'a> PromptContext<'a> {
    pub fn new(pattern: &'a BehaviorPattern, game: &'a GameStateData, pressure: f32) -> Self {
        Self {
            profile: None,
            pattern,
            game,
            pressure,
            emotional_context: None,
            recent_sessions: &[],
        }
    }

    pub fn with_profile(mut self, profile: Option<&'a PersonalityProfile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_emotional_context(mut self, context: &'a str) -> Self {
        self.emotional_context = Some(context);
        self
    }

    pub fn with_recent_sessions(mut self, sessions: &'a [SessionSummary]) -> Self {
        self.recent_sessions = sessions;
        self
    }
}

/// Builds prompts and keeps the short dialogue digest shared across calls in a session
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    digest: VecDeque<DigestEntry>,
    digest_cap: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl ContextBuilder {
    pub fn new(limits: &HistoryConfig) -> Self {
        Self {
            digest: VecDeque::new(),
            digest_cap: limits.max_prompt_history.max(1),
        }
    }

    /// Forget the dialogue digest; called at session start
    pub fn clear_history(&mut self) {
        self.digest.clear();
    }

    pub fn add_dialogue(&mut self, turn_number: u32, dialogue: &str, context: &str) {
        self.digest.push_back(DigestEntry {
            turn_number,
            dialogue: dialogue.to_string(),
            context: context.to_string(),
        });
        while self.digest.len() > self.digest_cap {
            self.digest.pop_front();
        }
    }

    pub fn digest(&self) -> impl Iterator<Item = &DigestEntry> {
        self.digest.iter()
    }

    /// Full prompt for a single spoken line of `category`
    pub fn dialogue_prompt(&self, ctx: &PromptContext<'_>, category: DialogueCategory) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{}\n", PERSONA);
        let _ = writeln!(prompt, "{}\n", format_profile(ctx));
        let _ = writeln!(prompt, "{}", self.format_situation(ctx));
        let _ = write!(prompt, "{}", category_instruction(category));

        let tokens = estimate_tokens(&prompt);
        if tokens > DIALOGUE_TOKEN_TARGET {
            debug!(
                "Dialogue prompt for {} is ~{} tokens (target {})",
                category, tokens, DIALOGUE_TOKEN_TARGET
            );
        }
        prompt
    }

    fn format_situation(&self, ctx: &PromptContext<'_>) -> String {
        let pattern = ctx.pattern;
        let game = ctx.game;
        let mut s = String::from("Current Situation:\n");
        let _ = writeln!(s, "- Game Phase: {} (Turn {})", game.current_phase, game.turn_number);
        let _ = writeln!(s, "- Cards: Player {} | AI {}", game.player_card_count, game.ai_card_count);
        let _ = writeln!(
            s,
            "- Player Doubt Level: {:.2} (0=confident, 1=very uncertain)",
            pattern.doubt_level
        );
        let _ = writeln!(s, "- Player Tempo: {}", pattern.tempo);
        let _ = writeln!(s, "- Hover Time: {:.1}s (avg)", pattern.avg_hover_time);
        if pattern.streak_same_position >= 2 {
            let _ = writeln!(
                s,
                "- Pattern: Streak of {} selections from {} position",
                pattern.streak_same_position,
                position_label(pattern.preferred_position).unwrap_or("unknown")
            );
        }
        let _ = writeln!(s, "- Current Pressure Level: {:.1}/3.0", ctx.pressure);

        if !self.digest.is_empty() {
            let _ = writeln!(s, "\nRecent Conversation History (last {} turns):", self.digest.len());
            for entry in &self.digest {
                let _ = writeln!(s, "  Turn {}: \"{}\"", entry.turn_number, entry.dialogue);
                if !entry.context.is_empty() {
                    let _ = writeln!(s, "    Context: {}", entry.context);
                }
            }
            let _ = writeln!(s, "→ Keep responses varied and avoid repeating similar phrases");
        }

        if let Some(advantage) = advantage_block(game) {
            let _ = writeln!(s, "\n{}", advantage);
        }
        s
    }

    /// Prompt asking for a JSON card pick over `card_count` positions
    pub fn decision_prompt(&self, ctx: &PromptContext<'_>, card_count: i32) -> String {
        let last = (card_count - 1).max(0);
        let pattern = ctx.pattern;
        let game = ctx.game;
        let mut p = String::new();

        let _ = writeln!(
            p,
            "You are \"The Dealer\", an AI opponent in a psychological card game (Old Maid / Joker)."
        );
        let _ = writeln!(
            p,
            "Your task: Select which card to draw from the player's hand (positions 0 to {}).",
            last
        );
        p.push_str(
            "Analyze the player's psychological state, show your reasoning step-by-step, and choose the optimal position.\n\n\
             Output ONLY valid JSON (no markdown, no extra text):\n\
             Rules:\n\
             - steps: array of 3-4 reasoning steps. Each step has card (integer index) and thought (string)\n\
             - The last step's card MUST match position (the final chosen card)\n\
             - position must be a number (integer), not text\n\
             - confidence must be a decimal number between 0.0 and 1.0\n\
             - strategy must be one of: Aggressive, Cautious, Adaptive\n\n\
             JSON format:\n\
             {\n  \"steps\": [\n    {\"card\": 0, \"thought\": \"reasoning text...\"},\n",
        );
        let _ = writeln!(
            p,
            "    {{\"card\": <final 0-{}>, \"thought\": \"final confident line\"}}\n  ],",
            last
        );
        let _ = writeln!(p, "  \"position\": <number 0-{}>,", last);
        p.push_str(
            "  \"confidence\": <number 0.0-1.0>,\n  \"strategy\": \"Aggressive\"|\"Cautious\"|\"Adaptive\"\n}\n\n",
        );

        p.push_str("Player Psychological Profile:\n");
        match ctx.profile {
            Some(profile) => {
                let _ = writeln!(p, "- Cautiousness: {:.2}", profile.cautiousness);
                let _ = writeln!(p, "- Decision Style: {}", profile.primary_decision_style);
                let _ = writeln!(p, "- Pressure Tolerance: {:.2}", profile.pressure_tolerance);
            }
            None => p.push_str("- Unknown (first encounter)\n"),
        }

        p.push_str("\nPlayer Current Behavior:\n");
        let _ = writeln!(
            p,
            "- Doubt Level: {:.2} (0=confident, 1=very uncertain)",
            pattern.doubt_level
        );
        let _ = writeln!(
            p,
            "- Avg Hover Time: {:.1}s (long hover = indecisive)",
            pattern.avg_hover_time
        );
        let _ = writeln!(p, "- Tempo: {}", pattern.tempo);
        if pattern.has_position_preference {
            let _ = writeln!(
                p,
                "- Position Preference: {} (selected {} times in a row)",
                position_label(pattern.preferred_position)
                    .unwrap_or("unknown")
                    .to_uppercase(),
                pattern.streak_same_position
            );
        }

        p.push_str("\nGame Situation:\n");
        let _ = writeln!(p, "- Player Cards: {} | AI Cards: {}", card_count, game.ai_card_count);
        let _ = writeln!(p, "- Phase: {} (Turn {})", game.current_phase, game.turn_number);
        let _ = writeln!(
            p,
            "- Pressure Level: {:.1}/3.0 (psychological pressure on player)",
            ctx.pressure
        );

        p.push_str("\nStrategic Considerations:\n");
        let mut considered = false;
        if pattern.has_position_preference && pattern.streak_same_position >= 2 {
            p.push_str("- The player keeps drawing from the same spot: their own hand may mirror that habit\n");
            considered = true;
        }
        if pattern.doubt_level > 0.7 {
            p.push_str("- Heavy doubt: they may be guarding something\n");
            considered = true;
        }
        if pattern.avg_hover_time > 3.0 {
            p.push_str("- Long hovers: they are watching your reactions\n");
            considered = true;
        }
        if game.current_phase == GamePhase::EndGame {
            p.push_str("- END GAME: Every decision is critical\n");
            considered = true;
        }
        if !considered {
            p.push_str("- No strong tells yet: trust your read\n");
        }

        p.push_str(
            "\nReasoning step instructions:\n\
             - Show 3-4 steps of reasoning like a mentalist performance\n\
             - Base each step on player behavior and psychology\n\
             - Final step should point to chosen card with a confident line\n\
             - Tone: chatty AI, playful, can mix in sudden cold shifts\n\
             - Each thought max 10 words in English\n\n\
             Decision (JSON only):",
        );

        let tokens = estimate_tokens(&p);
        if tokens > DECISION_TOKEN_TARGET {
            debug!("Decision prompt is ~{} tokens (target {})", tokens, DECISION_TOKEN_TARGET);
        }
        p
    }

    /// Prompt for one muttered line while the opponent deliberates over a card
    #[allow(clippy::too_many_arguments)]
    pub fn hesitation_prompt(
        &self,
        step: usize,
        total_steps: usize,
        pressure: f32,
        style: HesitationStyle,
        pattern: Option<&BehaviorPattern>,
        profile: Option<&PersonalityProfile>,
        table: Option<&HesitationContext>,
    ) -> String {
        let step_text = if step + 1 >= total_steps {
            "last step".to_string()
        } else {
            format!("step {}", step + 1)
        };
        let pressure_text = if pressure < 1.0 {
            "low"
        } else if pressure < 2.0 {
            "medium"
        } else {
            "high"
        };

        let mut p = String::from(
            "You are a chatty AI that acts like the Joker. You can't stop talking even while picking a card.\n\n",
        );
        p.push_str("Situation:\n");
        let _ = writeln!(p, "- {} (of {} total)", step_text, total_steps);
        let _ = writeln!(p, "- Psychological pressure: {} ({:.1}/3.0)", pressure_text, pressure);

        if let Some(pattern) = pattern {
            let tempo = match pattern.tempo {
                Tempo::Fast => "fast",
                Tempo::Slow => "slow",
                Tempo::Erratic => "erratic",
                Tempo::Normal => "normal",
            };
            let _ = write!(
                p,
                "\nPlayer behavior pattern:\n- Decision tempo: {}\n- Doubt level: {:.2} (0=decisive, 1=very hesitant)\n",
                tempo, pattern.doubt_level
            );
            if pattern.has_position_preference {
                let _ = writeln!(p, "- Position preference: yes (position {})", pattern.preferred_position);
            } else {
                p.push_str("- Position preference: none\n");
            }
        }

        if let Some(profile) = profile {
            let (label, value) = profile
                .dominant_trait()
                .map(|(t, v)| (t.display_name(), v))
                .unwrap_or(("unknown", 0.0));
            let _ = write!(
                p,
                "\nPlayer personality profile:\n- Dominant trait: {} ({:.2})\n- Decision style: {}\n- Stress response: {}\nWeave this personality data into the dialogue as evidence.\n",
                label, value, profile.primary_decision_style, profile.stress_type
            );
        }

        if let Some(table) = table.filter(|t| t.ai_card_count > 0 || t.player_card_count > 0) {
            let phase = match table.phase() {
                TablePhase::Early => "early",
                TablePhase::Mid => "mid",
                TablePhase::Late => "endgame",
            };
            let advantage = match table.advantage() {
                Advantage::Winning => "winning",
                Advantage::Losing => "losing",
                Advantage::Even => "even",
            };
            let joker = if table.ai_holds_joker {
                "AI holds it (wants to hide)"
            } else {
                "possibly with player"
            };
            let _ = write!(
                p,
                "\nGame situation:\n- AI cards: {} / Player cards: {}\n- Phase: {} ({})\n- Joker: {}\nReflect this situation in the dialogue.\n",
                table.ai_card_count, table.player_card_count, phase, advantage, joker
            );
        }

        let _ = writeln!(p, "\n{}", style_instruction(style));
        p.push_str(
            "Tone: casual, theatrical, exclamatory (ahahaha, oops, hmm~). Mix playful with sudden cold shifts (...).\n\
             Generate exactly ONE short dialogue line (max 10 words) in English.\n\
             No explanation. Only the dialogue line.",
        );
        p
    }

    /// Prompt for a one-line reaction to the opponent's own mood shift
    pub fn emotional_reaction_prompt(
        &self,
        emotion: EmotionalState,
        pattern: Option<&BehaviorPattern>,
        turn_number: u32,
    ) -> String {
        let mut p = String::from(
            "You are \"The Dealer\". Cheerful and chatty. Genuinely enjoys the game.\n\
             Emotions are theatrical and over-the-top. But sometimes the mask slips and real feelings show.\n\
             You don't know the cards. But you read everything from the player's behavior.\n\
             Tone: Casual, chatty English. During sudden shifts, voice drops cold and terse.\n\n",
        );
        let _ = writeln!(p, "Your current emotional state: {}", emotion_direction(emotion));

        if let Some(pattern) = pattern {
            let _ = writeln!(
                p,
                "Player right now: doubt {:.2}, tempo {}, hover {:.1}s",
                pattern.doubt_level, pattern.tempo, pattern.avg_hover_time
            );
        }
        let phase = if turn_number <= 3 {
            "Early game"
        } else if turn_number <= 8 {
            "Mid game"
        } else {
            "Late game"
        };
        let _ = writeln!(p, "Game phase: {} (turn {})\n", phase, turn_number);

        p.push_str(
            "Express this emotion in one short sentence (under 15 words) as a chatty clown. Over-the-top, but real feelings slip through.\n\n\
             Constraints:\n\
             - NEVER mention card contents (Joker, numbers, suits)\n\
             - NEVER mention probability or expected values\n\
             - NEVER reference randomness\n\
             - Express through emotion and interpersonal dynamics only\n\
             - Output ONLY the dialogue (no explanations or tags)",
        );
        p
    }
}

fn format_profile(ctx: &PromptContext<'_>) -> String {
    let mut s = match ctx.profile {
        None => "Player personality: Unknown (first encounter)".to_string(),
        Some(profile) => format!(
            "Player Personality Profile:\n\
             - Cautiousness: {:.2}\n\
             - Intuition: {:.2}\n\
             - Resilience: {:.2}\n\
             - Decision Style: {}\n\
             - Stress Type: {}\n\
             - Pressure Tolerance: {:.2}",
            profile.cautiousness,
            profile.intuition,
            profile.resilience,
            profile.primary_decision_style,
            profile.stress_type,
            profile.pressure_tolerance,
        ),
    };
    if let Some(digest) = long_term_digest(ctx.recent_sessions) {
        let _ = write!(s, "\n\n{}", digest);
    }
    if let Some(emotion) = ctx.emotional_context.filter(|e| !e.is_empty()) {
        let _ = write!(s, "\n\n{}", emotion.trim_end());
    }
    s
}

/// What past games taught about this player, or `None` when there is no history
pub fn long_term_digest(sessions: &[SessionSummary]) -> Option<String> {
    if sessions.is_empty() {
        return None;
    }
    let wins = sessions.iter().filter(|s| s.player_won).count();
    let mut s = format!(
        "Long-term memory (last {} games):\n- Player won {} of {}",
        sessions.len(),
        wins,
        sessions.len()
    );

    let mut counts = [0usize; 3];
    for session in sessions {
        match session.position_preference.as_str() {
            "left" => counts[0] += 1,
            "center" => counts[1] += 1,
            "right" => counts[2] += 1,
            _ => {}
        }
    }
    if let Some((index, _)) = counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c > 0)
        .max_by_key(|(_, c)| **c)
    {
        let _ = write!(
            s,
            "\n- Usual position: {}",
            position_label(index as i32).unwrap_or("unknown")
        );
    }

    if let Some(last) = sessions.last() {
        let _ = write!(s, "\n- Last pressure reaction: {}", last.player_reactions);
    }

    let mut strategies: Vec<&str> = sessions
        .iter()
        .flat_map(|s| s.effective_strategies.iter().map(String::as_str))
        .collect();
    strategies.sort_unstable();
    strategies.dedup();
    if !strategies.is_empty() {
        let _ = write!(s, "\n- Worked before: {}", strategies.join(", "));
    }
    Some(s)
}

/// The card-count block, shown from turn 2 on
pub fn advantage_block(game: &GameStateData) -> Option<String> {
    if game.turn_number < 2 {
        return None;
    }
    let diff = game.card_difference();
    let status = if diff < -2 {
        "Player is WINNING (fewer cards) - they might get confident or careless"
    } else if diff > 2 {
        "Player is LOSING (more cards) - they're under pressure, might panic"
    } else {
        "Game is EVEN - tension is balanced"
    };
    Some(format!(
        "Card Count Advantage:\n- Current: Player {} vs AI {}\n- Status: {}",
        game.player_card_count, game.ai_card_count, status
    ))
}

fn category_instruction(category: DialogueCategory) -> String {
    let instruction = match category {
        DialogueCategory::Stop => {
            "Generate a STOP line: Stop the player's choice. Use fake friendliness, a scary joke, or a sudden shift.\n\
             Vary the approach:\n\
             - Fake friend: \"Wait wait! That's bad! ...Probably.\"\n\
             - Sudden shift: \"Ooh that one~ ...Stop.\" (voice drops suddenly)"
        }
        DialogueCategory::Bait => {
            "Generate a BAIT line: Lure the player into drawing. Set the trap cheerfully.\n\
             Vary the approach:\n\
             - Taunt: \"Not gonna draw? Booooring~\"\n\
             - Sudden shift: \"This way this way~ ...Draw it.\" (suddenly commanding)"
        }
        DialogueCategory::Mirror => {
            "Generate a MIRROR line: Expose the player's behavioral pattern. Cheerful but creepy.\n\
             Vary the approach:\n\
             - Gleeful: \"Haha! Same spot again! So predictable~\"\n\
             - Sudden shift: \"You have such cute habits~ ...I see everything.\" (goes cold)"
        }
        DialogueCategory::General => {
            "Generate a GENERAL line: A clown enjoying the game. Between cheer and madness.\n\
             Vary the approach:\n\
             - Excited: \"Fun fun! Let's play more! ...Forever~\""
        }
        DialogueCategory::Hesitation => {
            "Generate a HESITATION line: Mutter while deciding. Half to yourself, half to the player."
        }
    };
    format!(
        "{}\n\n\
         Constraints:\n\
         1. Output ONLY the dialogue text in English (no explanations or tags)\n\
         2. Under 15 words\n\
         3. No quotation marks\n\
         4. Casual, chatty tone. During sudden shifts, voice drops to cold and terse\n\
         5. Must contain one of: cheerful chatter / scary joke / sudden tonal shift\n\n\
         Dialogue:",
        instruction
    )
}

fn style_instruction(style: HesitationStyle) -> &'static str {
    match style {
        HesitationStyle::Deduction => {
            "[Deduction] Gleefully analyze like a chatty clown, then turn suddenly cold. Fun then creepy."
        }
        HesitationStyle::Bluff => {
            "[Bluff] Theatrical fake confidence. Already decided... or maybe not? Playful but unsettling."
        }
        HesitationStyle::Provoke => {
            "[Provoke] Friendly taunting. Laughing while cornering them, then a cold '...no escape.'"
        }
        HesitationStyle::Vulnerable => {
            "[Vulnerable] The mask slips. Genuine confusion, then a quick forced laugh."
        }
    }
}

fn emotion_direction(emotion: EmotionalState) -> &'static str {
    match emotion {
        EmotionalState::Calm => "Eerily cheerful. Inappropriate happiness. Use a scary joke.",
        EmotionalState::Anticipating => {
            "Childlike excitement. Can't hide the thrill, though it might be about the player's doom."
        }
        EmotionalState::Pleased => "Smug delight. Everything is going to plan and you want them to know.",
        EmotionalState::Frustrated => {
            "SUDDEN SHIFT. The grin vanishes. Low voice. Then the smile is forced back, eyes not smiling."
        }
        EmotionalState::Hurt => {
            "FULL SHIFT. Silence. The mask drops: '...Not bad.' Seconds later a forced laugh."
        }
        EmotionalState::Relieved => "Over-the-top relief act, covered with a scary joke.",
    }
}

/// Per-turn action lines plus position distribution and average hover
pub fn format_behavior_history(actions: &[PlayerAction]) -> String {
    if actions.is_empty() {
        return "No behavior history yet.".to_string();
    }
    let mut s = format!("Recent Actions (last {} turns):\n", actions.len());
    for action in actions {
        let position = match action.selected_position {
            0 => "Left",
            1 => "Center",
            2 => "Right",
            _ => "Unknown",
        };
        let _ = writeln!(
            s,
            "- Turn {}: {} | Hover: {:.1}s | Decision: {:.1}s",
            action.turn_number, position, action.hover_duration, action.decision_time
        );
    }
    let count = |p: i32| actions.iter().filter(|a| a.selected_position == p).count();
    let _ = writeln!(
        s,
        "\nPosition Distribution: Left {} | Center {} | Right {}",
        count(0),
        count(1),
        count(2)
    );
    let avg_hover = actions.iter().map(|a| a.hover_duration).sum::<f32>() / actions.len() as f32;
    let _ = writeln!(s, "Average Hover Time: {:.1}s", avg_hover);
    s
}

pub fn format_dialogue_history(dialogues: &[DialogueMemory]) -> String {
    if dialogues.is_empty() {
        return "No dialogue history yet.".to_string();
    }
    let mut s = format!("Recent Dialogue (last {}):\n", dialogues.len());
    for dialogue in dialogues {
        let _ = writeln!(
            s,
            "- Turn {} [{}]: \"{}\"",
            dialogue.turn_number, dialogue.category, dialogue.text
        );
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealer_common::{FacialExpression, Tempo};

    fn summary(won: bool, position: &str, strategies: &[&str]) -> SessionSummary {
        SessionSummary {
            timestamp: Utc::now(),
            turn_count: 8,
            player_won: won,
            final_pressure_level: 1.0,
            avg_hover_time: 1.5,
            avg_decision_time: 2.0,
            position_preference: position.to_string(),
            effective_strategies: strategies.iter().map(|s| s.to_string()).collect(),
            player_reactions: "moderately_susceptible".to_string(),
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // three non-ASCII characters count as two tokens
        assert_eq!(estimate_tokens("ジョー"), 2);
    }

    #[test]
    fn test_dialogue_prompt_section_order() {
        let builder = ContextBuilder::default();
        let pattern = BehaviorPattern::new().with_doubt(0.8).with_preference(2, 3);
        let game = GameStateData::new(3, 5, 9);
        let ctx = PromptContext::new(&pattern, &game, 1.3);

        let prompt = builder.dialogue_prompt(&ctx, DialogueCategory::Stop);
        let persona = prompt.find("\"The Dealer\"").unwrap();
        let profile = prompt.find("Player personality: Unknown (first encounter)").unwrap();
        let situation = prompt.find("Current Situation:").unwrap();
        let advantage = prompt.find("Card Count Advantage:").unwrap();
        let instruction = prompt.find("Generate a STOP line").unwrap();
        assert!(persona < profile && profile < situation && situation < advantage && advantage < instruction);

        assert!(prompt.contains("- Player Doubt Level: 0.80 (0=confident, 1=very uncertain)"));
        assert!(prompt.contains("- Pattern: Streak of 3 selections from right position"));
        assert!(prompt.contains("- Current Pressure Level: 1.3/3.0"));
        assert!(prompt.contains("Player is WINNING"));
        assert!(prompt.ends_with("Dialogue:"));
    }

    #[test]
    fn test_streak_and_advantage_omitted_early() {
        let builder = ContextBuilder::default();
        let pattern = BehaviorPattern::new().with_streak(1);
        let game = GameStateData::new(1, 7, 7);
        let prompt = builder.dialogue_prompt(&PromptContext::new(&pattern, &game, 0.0), DialogueCategory::General);
        assert!(!prompt.contains("- Pattern: Streak"));
        assert!(!prompt.contains("Card Count Advantage"));
    }

    #[test]
    fn test_advantage_thresholds() {
        assert!(advantage_block(&GameStateData::new(2, 3, 6)).unwrap().contains("WINNING"));
        assert!(advantage_block(&GameStateData::new(2, 9, 6)).unwrap().contains("LOSING"));
        assert!(advantage_block(&GameStateData::new(2, 8, 6)).unwrap().contains("EVEN"));
        assert!(advantage_block(&GameStateData::new(1, 1, 9)).is_none());
    }

    #[test]
    fn test_profile_and_memory_sections() {
        let builder = ContextBuilder::default();
        let profile = PersonalityProfile::new().with_cautiousness(0.72);
        let pattern = BehaviorPattern::new();
        let game = GameStateData::new(1, 7, 7);
        let sessions = vec![
            summary(true, "left", &["mirror_dialogue_used"]),
            summary(false, "left", &["high_pressure_effective", "mirror_dialogue_used"]),
        ];
        let emotion = "Current emotional state: Calm (no transitions yet)";
        let ctx = PromptContext::new(&pattern, &game, 0.0)
            .with_profile(Some(&profile))
            .with_recent_sessions(&sessions)
            .with_emotional_context(emotion);

        let prompt = builder.dialogue_prompt(&ctx, DialogueCategory::Bait);
        assert!(prompt.contains("Player Personality Profile:\n- Cautiousness: 0.72"));
        assert!(prompt.contains("Long-term memory (last 2 games):\n- Player won 1 of 2"));
        assert!(prompt.contains("- Usual position: left"));
        assert!(prompt.contains("- Worked before: high_pressure_effective, mirror_dialogue_used"));
        assert!(prompt.contains(emotion));
        assert!(prompt.find(emotion).unwrap() < prompt.find("Current Situation:").unwrap());
    }

    #[test]
    fn test_digest_is_capped_and_rendered() {
        let mut builder = ContextBuilder::default();
        for turn in 1..=7 {
            builder.add_dialogue(turn, &format!("line {}", turn), if turn == 7 { "Player froze" } else { "" });
        }
        assert_eq!(builder.digest().count(), 5);
        assert_eq!(builder.digest().next().unwrap().turn_number, 3);

        let pattern = BehaviorPattern::new();
        let game = GameStateData::new(7, 4, 4);
        let prompt = builder.dialogue_prompt(&PromptContext::new(&pattern, &game, 0.0), DialogueCategory::Mirror);
        assert!(prompt.contains("Recent Conversation History (last 5 turns):"));
        assert!(prompt.contains("  Turn 7: \"line 7\"\n    Context: Player froze"));
        assert!(prompt.contains("Keep responses varied"));

        builder.clear_history();
        assert_eq!(builder.digest().count(), 0);
    }

    #[test]
    fn test_decision_prompt_contract() {
        let builder = ContextBuilder::default();
        let pattern = BehaviorPattern::new()
            .with_doubt(0.9)
            .with_preference(0, 2)
            .with_expression(FacialExpression::Fearful, 0.9);
        let game = GameStateData::new(9, 3, 4);
        let prompt = builder.decision_prompt(&PromptContext::new(&pattern, &game, 2.0), 5);

        assert!(prompt.contains("(positions 0 to 4)"));
        assert!(prompt.contains("\"position\": <number 0-4>"));
        assert!(prompt.contains("- Position Preference: LEFT (selected 2 times in a row)"));
        assert!(prompt.contains("- Heavy doubt"));
        assert!(prompt.contains("- END GAME: Every decision is critical"));
        assert!(prompt.ends_with("Decision (JSON only):"));
    }

    #[test]
    fn test_hesitation_prompt() {
        let builder = ContextBuilder::default();
        let profile = PersonalityProfile::new().with_cautiousness(0.9);
        let pattern = BehaviorPattern::new().with_tempo(Tempo::Erratic);
        let table = HesitationContext::new(2, 3, true, 8);
        let prompt = builder.hesitation_prompt(
            3,
            4,
            2.5,
            HesitationStyle::Bluff,
            Some(&pattern),
            Some(&profile),
            Some(&table),
        );
        assert!(prompt.contains("- last step (of 4 total)"));
        assert!(prompt.contains("high (2.5/3.0)"));
        assert!(prompt.contains("- Decision tempo: erratic"));
        assert!(prompt.contains("- Dominant trait: cautious (0.90)"));
        assert!(prompt.contains("- Phase: endgame (winning)"));
        assert!(prompt.contains("AI holds it"));
        assert!(prompt.contains("[Bluff]"));
    }

    #[test]
    fn test_emotional_reaction_prompt_hides_cards() {
        let builder = ContextBuilder::default();
        let prompt = builder.emotional_reaction_prompt(EmotionalState::Hurt, None, 5);
        assert!(prompt.contains("FULL SHIFT"));
        assert!(prompt.contains("Mid game"));
        assert!(prompt.contains("NEVER mention card contents"));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(format_behavior_history(&[]), "No behavior history yet.");
        assert_eq!(format_dialogue_history(&[]), "No dialogue history yet.");

        let actions = vec![
            PlayerAction {
                selected_position: 0,
                hover_duration: 1.0,
                decision_time: 2.0,
                doubt_level: 0.2,
                turn_number: 1,
            },
            PlayerAction {
                selected_position: 2,
                hover_duration: 3.0,
                decision_time: 1.0,
                doubt_level: 0.4,
                turn_number: 2,
            },
        ];
        let text = format_behavior_history(&actions);
        assert!(text.contains("- Turn 2: Right | Hover: 3.0s | Decision: 1.0s"));
        assert!(text.contains("Position Distribution: Left 1 | Center 0 | Right 1"));
        assert!(text.contains("Average Hover Time: 2.0s"));

        let dialogues = vec![DialogueMemory {
            turn_number: 4,
            category: DialogueCategory::Mirror,
            text: "Same spot again?".to_string(),
        }];
        assert!(format_dialogue_history(&dialogues).contains("- Turn 4 [Mirror]: \"Same spot again?\""));
    }
}
