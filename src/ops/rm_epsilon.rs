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
use crate::error::Result;
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, StateId, NO_STATE};
use rustc_hash::FxHashMap;

/// Removes epsilon transitions (arcs where both labels are 0).
///
/// For every state `s` the weighted epsilon closure is computed by
/// worklist fixpoint: each reachable `t` carries the ⊕-sum over epsilon
/// paths of the ⊗-product along the path. The result keeps the state
/// set and start; `s`'s final weight becomes
/// `fw(s) ⊕ Σ w(s⇝t) ⊗ fw(t)` and every non-epsilon arc of every `t` in
/// the closure is re-rooted at `s` with the closure weight multiplied
/// in.
pub fn rm_epsilon<W: Semiring>(fst: &MutableFst<W>) -> Result<MutableFst<W>> {
    let n = fst.num_states();
    let mut result = MutableFst::new();
    result.add_states(n);
    if fst.start() != NO_STATE {
        result.set_start(fst.start())?;
    }

    for s in 0..n as StateId {
        let mut closure: FxHashMap<StateId, W> = FxHashMap::default();
        closure.insert(s, W::one());
        let mut worklist: Vec<StateId> = vec![s];
        while let Some(t) = worklist.pop() {
            let wt = closure[&t];
            for arc in fst.arcs(t) {
                if !arc.is_epsilon() {
                    continue;
                }
                let via = wt.times(&arc.weight);
                let merged = match closure.get(&arc.nextstate) {
                    None => via,
                    Some(old) => old.plus(&via),
                };
                let changed = closure
                    .get(&arc.nextstate)
                    .map_or(true, |old| *old != merged);
                if changed {
                    closure.insert(arc.nextstate, merged);
                    worklist.push(arc.nextstate);
                }
            }
        }

        let mut fw = fst.final_weight(s);
        for (&t, ws) in &closure {
            if t == s {
                continue;
            }
            let ft = fst.final_weight(t);
            if !ft.is_zero() {
                fw = fw.plus(&ws.times(&ft));
            }
        }
        if !fw.is_zero() {
            result.set_final(s, fw)?;
        }

        // Deterministic arc order: closure members ascending by state id.
        let mut members: Vec<(StateId, W)> = closure.into_iter().collect();
        members.sort_by_key(|&(t, _)| t);
        for (t, ws) in members {
            for arc in fst.arcs(t) {
                if arc.is_epsilon() {
                    continue;
                }
                result.add_arc(
                    s,
                    Arc::new(arc.ilabel, arc.olabel, ws.times(&arc.weight), arc.nextstate),
                )?;
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit::{accepts, has_epsilon_arcs};
    use crate::ops::{closure as close_op, union, ClosureType};
    use crate::semiring::TropicalWeight;
    use crate::strings::compile_bytes;
    use crate::types::EPSILON;

    type W = TropicalWeight;

    #[test]
    fn removes_all_epsilon_arcs() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"c")).unwrap();
        close_op(&mut fst, ClosureType::Star);
        assert!(has_epsilon_arcs(&fst));
        let clean = rm_epsilon(&fst).unwrap();
        assert!(!has_epsilon_arcs(&clean));
        assert!(accepts(&clean, b""));
        assert!(accepts(&clean, b"ab"));
        assert!(accepts(&clean, b"cab"));
        assert!(!accepts(&clean, b"b"));
    }

    #[test]
    fn closure_weights_multiply_and_merge() {
        // Two epsilon paths from q0 to q2 with weights 1.0 and 2.0+0.25;
        // the closure keeps their ⊕-sum (min), and the outgoing arc of
        // q2 is re-rooted with it.
        let mut fst = MutableFst::<W>::new();
        let q0 = fst.add_state();
        let q1 = fst.add_state();
        let q2 = fst.add_state();
        let q3 = fst.add_state();
        fst.set_start(q0).unwrap();
        fst.set_final(q3, W::one()).unwrap();
        fst.add_arc(q0, Arc::new(EPSILON, EPSILON, W::new(1.0), q2))
            .unwrap();
        fst.add_arc(q0, Arc::new(EPSILON, EPSILON, W::new(2.0), q1))
            .unwrap();
        fst.add_arc(q1, Arc::new(EPSILON, EPSILON, W::new(0.25), q2))
            .unwrap();
        fst.add_arc(q2, Arc::new(5, 5, W::new(0.5), q3)).unwrap();

        let clean = rm_epsilon(&fst).unwrap();
        let rooted: Vec<&Arc<W>> = clean
            .arcs(q0)
            .iter()
            .filter(|a| a.ilabel == 5)
            .collect();
        assert_eq!(rooted.len(), 1);
        assert_eq!(rooted[0].weight, W::new(1.5));
        assert_eq!(rooted[0].nextstate, q3);
    }

    #[test]
    fn final_weight_absorbs_epsilon_reachable_finals() {
        let mut fst = MutableFst::<W>::new();
        let q0 = fst.add_state();
        let q1 = fst.add_state();
        fst.set_start(q0).unwrap();
        fst.set_final(q1, W::new(0.5)).unwrap();
        fst.add_arc(q0, Arc::new(EPSILON, EPSILON, W::new(1.0), q1))
            .unwrap();
        let clean = rm_epsilon(&fst).unwrap();
        assert_eq!(clean.final_weight(q0), W::new(1.5));
        assert_eq!(clean.final_weight(q1), W::new(0.5));
    }

    #[test]
    fn preserves_state_set_and_start() {
        let mut fst = compile_bytes::<W>(b"ab");
        close_op(&mut fst, ClosureType::Star);
        let clean = rm_epsilon(&fst).unwrap();
        assert_eq!(clean.num_states(), fst.num_states());
        assert_eq!(clean.start(), fst.start());
    }
}
