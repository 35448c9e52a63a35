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
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::StateId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

// Structural hash over start, per-state final weight bits and arc
// tuples. Weight bits go through the canonical form so differently
// encoded zeros hash alike, matching weight equality.
pub(crate) fn fst_hash<W: Semiring>(fst: &MutableFst<W>) -> u64 {
    let mut hasher = DefaultHasher::new();
    fst.start().hash(&mut hasher);
    (fst.num_states() as u64).hash(&mut hasher);
    for s in 0..fst.num_states() as StateId {
        fst.final_weight(s).canonical_bits().hash(&mut hasher);
        (fst.num_arcs(s) as u64).hash(&mut hasher);
        for arc in fst.arcs(s) {
            arc.ilabel.hash(&mut hasher);
            arc.olabel.hash(&mut hasher);
            arc.weight.canonical_bits().hash(&mut hasher);
            arc.nextstate.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Cache key for a compiled rewrite rule: the weight type plus the
/// structural hashes of all four rule components, hashed together.
pub(crate) fn rule_cache_key<W: Semiring>(
    tau: &MutableFst<W>,
    lambda: &MutableFst<W>,
    rho: &MutableFst<W>,
    sigma: &MutableFst<W>,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    W::WEIGHT_TYPE.hash(&mut hasher);
    for fst in [tau, lambda, rho, sigma] {
        fst_hash(fst).hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;
    use crate::strings::compile_bytes;

    type W = TropicalWeight;

    #[test]
    fn structural_changes_change_the_hash() {
        let a = compile_bytes::<W>(b"abc");
        let b = compile_bytes::<W>(b"abd");
        assert_ne!(fst_hash(&a), fst_hash(&b));

        let mut reweighted = a.clone();
        reweighted.set_final(3, W::new(0.5)).unwrap();
        assert_ne!(fst_hash(&a), fst_hash(&reweighted));
    }

    #[test]
    fn identical_structure_hashes_identically() {
        let a = compile_bytes::<W>(b"abc");
        let b = compile_bytes::<W>(b"abc");
        assert_eq!(fst_hash(&a), fst_hash(&b));
    }

    #[test]
    fn rule_key_depends_on_every_component() {
        let tau = compile_bytes::<W>(b"a");
        let lambda = compile_bytes::<W>(b"c");
        let rho = compile_bytes::<W>(b"d");
        let sigma = compile_bytes::<W>(b"z");
        let base = rule_cache_key(&tau, &lambda, &rho, &sigma);
        let other = rule_cache_key(&tau, &lambda, &rho, &compile_bytes(b"y"));
        assert_ne!(base, other);
        let swapped = rule_cache_key(&lambda, &tau, &rho, &sigma);
        assert_ne!(base, swapped);
    }
}
