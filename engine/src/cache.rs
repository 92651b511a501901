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

//! Response, decision and audio cache.
//!
//! Three keyed stores behind one async lock so that [`ResponseCache::clear`]
//! is atomic with respect to readers. Handles are cheap to clone and share the
//! same storage.

use crate::config::CacheConfig;
use crate::llm::{AudioClip, GenerationRequest, TextGenerator};
use dealer_common::AIDecisionResult;
use metrics::counter;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Scenario prompts warmed when no explicit list is given
pub const DEFAULT_SCENARIOS: &[&str] = &[
    "category:stop,pressure:medium",
    "category:bait,pressure:high",
    "category:mirror,pressure:low",
    "category:general,pressure:medium",
];

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").unwrap());

#[derive(Debug, Clone)]
struct CachedVariant {
    text: String,
    usage: u32,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    texts: HashMap<String, Vec<CachedVariant>>,
    decisions: HashMap<String, AIDecisionResult>,
    audio: HashMap<String, AudioClip>,
    total_variants: usize,
    next_seq: u64,
}

impl CacheInner {
    /// Drop whole keys, oldest entry first, until the global cap holds
    fn enforce_global_cap(&mut self, cap: usize) {
        while self.total_variants > cap {
            let oldest = self
                .texts
                .iter()
                .filter_map(|(key, variants)| variants.iter().map(|v| v.seq).min().map(|s| (s, key)))
                .min_by_key(|(seq, _)| *seq)
                .map(|(_, key)| key.clone());

            let Some(key) = oldest else { break };
            if let Some(removed) = self.texts.remove(&key) {
                self.total_variants -= removed.len();
                debug!("Evicted cache key {} ({} variants)", key, removed.len());
            }
        }
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_keys: usize,
    pub total_entries: usize,
    pub total_audio_clips: usize,
    pub total_decisions: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Keys: {}, Entries: {}, Audio Clips: {}, Decisions: {}",
            self.total_keys, self.total_entries, self.total_audio_clips, self.total_decisions
        )
    }
}

/// Outcome of a pre-warm pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreWarmReport {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<RwLock<CacheInner>>,
    per_key_cap: usize,
    global_cap: usize,
    pre_warm_delay: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            per_key_cap: config.per_key_cap.max(1),
            global_cap: config.global_cap.max(1),
            pre_warm_delay: Duration::from_millis(config.pre_warm_delay_ms),
        }
    }

    /// Least-used variant for `key`, counting this read as a use
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.write().await;
        let picked = inner.texts.get_mut(key).and_then(|variants| {
            // min_by_key keeps the first of equal minima
            variants.iter_mut().min_by_key(|v| v.usage).map(|v| {
                v.usage += 1;
                v.text.clone()
            })
        });

        match picked {
            Some(text) => {
                counter!("dealer.cache.hits", "store" => "text").increment(1);
                Some(text)
            }
            None => {
                counter!("dealer.cache.misses", "store" => "text").increment(1);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, text: &str) {
        if key.is_empty() || text.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        let per_key_cap = self.per_key_cap;

        let variants = inner.texts.entry(key.to_string()).or_default();
        if variants.iter().any(|v| v.text == text) {
            return;
        }
        variants.push(CachedVariant {
            text: text.to_string(),
            usage: 0,
            seq,
        });
        let mut delta: isize = 1;
        while variants.len() > per_key_cap {
            variants.remove(0);
            delta -= 1;
        }

        inner.next_seq += 1;
        inner.total_variants = inner.total_variants.saturating_add_signed(delta);
        inner.enforce_global_cap(self.global_cap);
    }

    pub async fn set_variations<S: AsRef<str>>(&self, key: &str, texts: &[S]) {
        for text in texts {
            self.set(key, text.as_ref()).await;
        }
    }

    pub async fn get_decision(&self, key: &str) -> Option<AIDecisionResult> {
        let inner = self.inner.read().await;
        let hit = inner.decisions.get(key).cloned();
        let outcome = if hit.is_some() { "dealer.cache.hits" } else { "dealer.cache.misses" };
        counter!(outcome, "store" => "decision").increment(1);
        hit
    }

    pub async fn set_decision(&self, key: &str, decision: AIDecisionResult) {
        if key.is_empty() {
            return;
        }
        self.inner
            .write()
            .await
            .decisions
            .insert(key.to_string(), decision);
    }

    pub async fn get_audio(&self, key: &str) -> Option<AudioClip> {
        let inner = self.inner.read().await;
        let hit = inner.audio.get(key).cloned();
        let outcome = if hit.is_some() { "dealer.cache.hits" } else { "dealer.cache.misses" };
        counter!(outcome, "store" => "audio").increment(1);
        hit
    }

    /// Store `clip`, handing back whatever clip it replaced
    pub async fn set_audio(&self, key: &str, clip: AudioClip) -> Option<AudioClip> {
        if key.is_empty() {
            return None;
        }
        let replaced = self.inner.write().await.audio.insert(key.to_string(), clip);
        if let Some(old) = &replaced {
            debug!("Released cached audio {} for {}", old.id, key);
        }
        replaced
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = CacheInner::default();
        info!("Response cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            total_keys: inner.texts.len(),
            total_entries: inner.total_variants,
            total_audio_clips: inner.audio.len(),
            total_decisions: inner.decisions.len(),
        }
    }

    /// Ask `generator` for three variations per scenario and store them
    /// under the scenario key
    pub async fn pre_warm<S: AsRef<str>>(
        &self,
        generator: &dyn TextGenerator,
        scenarios: &[S],
    ) -> PreWarmReport {
        info!("Pre-warming cache with {} scenarios", scenarios.len());
        let mut report = PreWarmReport::default();

        for scenario in scenarios {
            let scenario = scenario.as_ref();
            let prompt = format!(
                "{}\n\nGenerate 3 different dialogue variations, each on a new line:",
                scenario
            );
            let request = GenerationRequest::new(prompt)
                .with_max_tokens(200)
                .with_temperature(0.8);

            match generator.generate(request).await {
                Ok(response) => {
                    let variations = split_variations(&response);
                    if variations.is_empty() {
                        report.failed += 1;
                        warn!("No valid variations for scenario: {}", scenario);
                    } else {
                        self.set_variations(scenario, &variations).await;
                        report.succeeded += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Pre-warming failed for scenario '{}': {}", scenario, e);
                }
            }

            tokio::time::sleep(self.pre_warm_delay).await;
        }

        info!(
            "Pre-warming complete. Success: {}, Failed: {}",
            report.succeeded, report.failed
        );
        report
    }
}

/// One candidate line per response line, list markers removed
pub fn split_variations(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| line.chars().count() > 5)
        .collect()
}
