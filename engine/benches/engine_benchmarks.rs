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

//! Performance benchmarks for the cache, visit patterns and session memory
//!
//! Run with: cargo bench --bench engine_benchmarks

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use dealer_common::{AIDecisionResult, BehaviorPattern, DialogueCategory};
use dealer_engine::cache::ResponseCache;
use dealer_engine::config::{CacheConfig, HesitationConfig};
use dealer_engine::engine::{decision_cache_key, dialogue_cache_key, parse_decision_response};
use dealer_engine::hesitation::HesitationEngine;
use dealer_engine::memory::{decrypt, encrypt};
use dealer_engine::strings::BuiltinStrings;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

/// Benchmark cache writes under the global cap
fn bench_cache_set(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let keys: Vec<String> = (0..200)
        .map(|i| dialogue_cache_key(DialogueCategory::ALL[i % 5], &BehaviorPattern::new().with_streak(i as u32), 1.0))
        .collect();

    let keys = &keys;

    let mut group = c.benchmark_group("cache_set");
    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("200_keys", |b| {
        b.to_async(&rt).iter_batched(
            || ResponseCache::new(&CacheConfig::default()),
            |cache| async move {
                for key in keys {
                    cache.set(std::hint::black_box(key), "Are you sure about that one?").await;
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

/// Benchmark least-used reads from a warm cache
fn bench_cache_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = ResponseCache::new(&CacheConfig::default());
    let key = dialogue_cache_key(DialogueCategory::Stop, &BehaviorPattern::new().with_doubt(0.8), 2.0);
    rt.block_on(async {
        cache
            .set_variations(&key, &["Stop.", "Put it down.", "Think again.", "Not that one.", "Careful."])
            .await;
        cache
            .set_decision("decision_d8_tNormal_pos-1_s0_pr4_c5", AIDecisionResult::new(2, 0.65, "Aggressive"))
            .await;
    });
    let cache = &cache;
    let key = key.as_str();

    c.bench_function("cache_get_text", |b| {
        b.to_async(&rt).iter(|| async move { cache.get(std::hint::black_box(key)).await });
    });
    c.bench_function("cache_get_decision", |b| {
        b.to_async(&rt).iter(|| async move {
            cache
                .get_decision(std::hint::black_box("decision_d8_tNormal_pos-1_s0_pr4_c5"))
                .await
        });
    });
}

/// Benchmark visit pattern generation across candidate counts
fn bench_visit_pattern(c: &mut Criterion) {
    let engine = HesitationEngine::new(&HesitationConfig::default(), &BuiltinStrings::new());
    let mut rng = StdRng::seed_from_u64(7);

    let mut group = c.benchmark_group("visit_pattern");
    for cards in [2usize, 5, 10, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(cards), &cards, |b, &cards| {
            b.iter(|| engine.visit_pattern(std::hint::black_box(cards), 2.0, &mut rng));
        });
    }
    group.finish();
}

/// Benchmark decision parsing, both JSON and the text fallback
fn bench_decision_parse(c: &mut Criterion) {
    let json = r#"{"steps": [{"card": 1, "thought": "Hmm."}, {"card": 0, "thought": "This one."}],
        "position": 0, "confidence": 0.82, "strategy": "Cautious"}"#;
    c.bench_function("parse_decision_json", |b| {
        b.iter(|| parse_decision_response(std::hint::black_box(json), 5))
    });
    c.bench_function("parse_decision_text", |b| {
        b.iter(|| parse_decision_response(std::hint::black_box("I'll take position 3."), 5))
    });
    c.bench_function("decision_cache_key", |b| {
        let pattern = BehaviorPattern::new().with_doubt(0.4).with_preference(1, 2);
        b.iter(|| decision_cache_key(std::hint::black_box(&pattern), 1.5, 5))
    });
}

/// Benchmark the at-rest cipher on a session-sized payload
fn bench_cipher(c: &mut Criterion) {
    let payload = "{\"version\":\"1.0\",\"sessions\":[]}".repeat(64);
    let key = "dealer_personality_2026";
    let encoded = encrypt(&payload, key);

    let mut group = c.benchmark_group("cipher");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("encrypt", |b| b.iter(|| encrypt(std::hint::black_box(&payload), key)));
    group.bench_function("decrypt", |b| b.iter(|| decrypt(std::hint::black_box(&encoded), key)));
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets =
        bench_cache_set,
        bench_cache_get,
        bench_visit_pattern,
        bench_decision_parse,
        bench_cipher,
}

criterion_main!(benches);
