// Copyright 2024 Nathan Hoos
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use once_cell::sync::Lazy;
use std::env;

/// Maximum number of compiled rewrite rules to cache.
///
/// Set via `FST_UTILS_RULE_CACHE_SIZE`; defaults to 100 rules with LRU
/// eviction. Each cached rule stores a full compiled FST, so the cache
/// size trades memory for skipped union/closure/epsilon-removal work on
/// repeated rule compilations.
pub static RULE_CACHE_SIZE: Lazy<usize> = Lazy::new(|| {
    env::var("FST_UTILS_RULE_CACHE_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
});

/// Global flag to disable the rewrite-rule cache.
///
/// Set `FST_UTILS_DISABLE_CACHE` to "1", "true" or "yes" (case
/// insensitive) to disable; anything else, or unset, keeps it on.
/// Useful when debugging rule compilation or pinning down memory.
pub static DISABLE_CACHE: Lazy<bool> =
    Lazy::new(|| match env::var("FST_UTILS_DISABLE_CACHE") {
        Ok(val) => {
            let val_lower = val.to_lowercase();
            let is_disabled = val_lower == "1" || val_lower == "true" || val_lower == "yes";
            if is_disabled {
                println!("Rule cache is disabled via FST_UTILS_DISABLE_CACHE.");
            }
            is_disabled
        }
        Err(_) => false,
    });

/// Optional ceiling on the number of states weighted determinization may
/// create before giving up.
///
/// Determinization of a non-determinizable input does not terminate;
/// callers are expected to pre-optimize, but an explicit ceiling via
/// `FST_UTILS_DETERMINIZE_STATE_LIMIT` turns a runaway construction into
/// an error. Unset means unlimited.
pub static DETERMINIZE_STATE_LIMIT: Lazy<Option<usize>> = Lazy::new(|| {
    env::var("FST_UTILS_DETERMINIZE_STATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
});
