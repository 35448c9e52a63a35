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
use crate::environment::{DISABLE_CACHE, RULE_CACHE_SIZE};
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::{Arc, Mutex};

// Entries are type-erased so one cache serves every semiring; the key
// already encodes the weight type, and the downcast re-checks it.
pub(crate) struct ModuleState {
    pub rule_cache: Mutex<LruCache<u64, Arc<dyn Any + Send + Sync>>>,
}

pub(crate) static MODULE_STATE: Lazy<ModuleState> = Lazy::new(|| ModuleState {
    rule_cache: Mutex::new(LruCache::new(
        std::num::NonZeroUsize::new((*RULE_CACHE_SIZE).max(1)).unwrap(),
    )),
});

pub(crate) fn get_cached_rule<W: Semiring>(key: u64) -> Option<MutableFst<W>> {
    if *DISABLE_CACHE {
        return None;
    }
    let mut cache = MODULE_STATE.rule_cache.lock().unwrap();
    cache
        .get(&key)
        .and_then(|entry| entry.downcast_ref::<MutableFst<W>>())
        .cloned()
}

pub(crate) fn insert_rule_to_cache<W: Semiring>(key: u64, rule: &MutableFst<W>) {
    if *DISABLE_CACHE {
        return;
    }
    let mut cache = MODULE_STATE.rule_cache.lock().unwrap();
    cache.put(key, Arc::new(rule.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{LogWeight, TropicalWeight};
    use crate::strings::compile_bytes;

    #[test]
    fn round_trips_a_rule() {
        let rule = compile_bytes::<TropicalWeight>(b"rule-a");
        insert_rule_to_cache(0xfeed_0001, &rule);
        let cached = get_cached_rule::<TropicalWeight>(0xfeed_0001);
        match cached {
            Some(found) => assert_eq!(found.num_states(), rule.num_states()),
            None => {
                // The cache can legitimately be disabled via env var.
                assert!(*DISABLE_CACHE);
            }
        }
    }

    #[test]
    fn downcast_guards_against_weight_type_confusion() {
        let rule = compile_bytes::<TropicalWeight>(b"rule-b");
        insert_rule_to_cache(0xfeed_0002, &rule);
        // Same key, wrong semiring: the downcast must refuse.
        assert!(get_cached_rule::<LogWeight>(0xfeed_0002).is_none());
    }

    #[test]
    fn unknown_keys_miss() {
        assert!(get_cached_rule::<TropicalWeight>(0xdead_beef_dead_beef).is_none());
    }
}
