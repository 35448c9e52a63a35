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
use crate::environment::DETERMINIZE_STATE_LIMIT;
use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// One result state = a weighted set of input states, canonically sorted
/// ascending by state id with the common weight factored out.
type Subset<W> = SmallVec<[(StateId, W); 4]>;

/// Canonical byte encoding of a subset: per element, 4 bytes of state id
/// and 8 bytes of weight bits, both little-endian. Equivalent subsets
/// must hash identically or the construction diverges, which is why the
/// sort and the common-factor division happen before this runs.
fn subset_key<W: Semiring>(subset: &Subset<W>) -> Vec<u8> {
    let mut key = Vec::with_capacity(subset.len() * 12);
    for (s, w) in subset {
        key.extend_from_slice(&s.to_le_bytes());
        key.extend_from_slice(&w.to_bits().to_le_bytes());
    }
    key
}

/// Weighted subset construction. The input must be epsilon-free (run
/// [`crate::ops::rm_epsilon`] first); epsilon arcs are not followed.
/// Transducers are conventionally pre-encoded as acceptors by the
/// optimize pipeline; the arc output label here is taken from the first
/// arc matching the input label in canonical subset order.
pub fn determinize<W: Semiring>(fst: &MutableFst<W>) -> Result<MutableFst<W>> {
    let mut result = MutableFst::new();
    if fst.start() == NO_STATE {
        return Ok(result);
    }
    let limit = *DETERMINIZE_STATE_LIMIT;

    let mut subsets: Vec<Subset<W>> = Vec::new();
    let mut ids: FxHashMap<Vec<u8>, StateId> = FxHashMap::default();
    let mut queue: VecDeque<StateId> = VecDeque::new();

    let initial: Subset<W> = smallvec::smallvec![(fst.start(), W::one())];
    let s0 = result.add_state();
    result.set_start(s0)?;
    ids.insert(subset_key(&initial), s0);
    subsets.push(initial);
    queue.push_back(s0);

    while let Some(id) = queue.pop_front() {
        let subset = subsets[id as usize].clone();

        let mut final_weight = W::zero();
        for &(s, ref residual) in &subset {
            let fw = fst.final_weight(s);
            if !fw.is_zero() {
                final_weight = final_weight.plus(&residual.times(&fw));
            }
        }
        if !final_weight.is_zero() {
            result.set_final(id, final_weight)?;
        }

        let mut labels: Vec<Label> = Vec::new();
        for &(s, _) in &subset {
            for arc in fst.arcs(s) {
                if arc.ilabel != EPSILON {
                    labels.push(arc.ilabel);
                }
            }
        }
        labels.sort_unstable();
        labels.dedup();

        for &label in &labels {
            let mut olabel = None;
            let mut gathered: FxHashMap<StateId, W> = FxHashMap::default();
            for &(s, ref residual) in &subset {
                for arc in fst.arcs(s) {
                    if arc.ilabel != label {
                        continue;
                    }
                    if olabel.is_none() {
                        olabel = Some(arc.olabel);
                    }
                    let w = residual.times(&arc.weight);
                    gathered
                        .entry(arc.nextstate)
                        .and_modify(|old| *old = old.plus(&w))
                        .or_insert(w);
                }
            }
            let mut next: Subset<W> = gathered
                .into_iter()
                .filter(|(_, w)| !w.is_zero())
                .collect();
            if next.is_empty() {
                continue;
            }
            let olabel = match olabel {
                Some(l) => l,
                None => continue,
            };
            next.sort_by_key(|&(s, _)| s);

            // Factor the ⊕-sum out as the arc weight; the residuals form
            // the canonical identity of the destination subset.
            let mut common = W::zero();
            for (_, w) in &next {
                common = common.plus(w);
            }
            for (_, w) in next.iter_mut() {
                *w = w.divide(&common);
            }

            let key = subset_key(&next);
            let next_id = match ids.get(&key) {
                Some(&existing) => existing,
                None => {
                    let fresh = result.add_state();
                    if let Some(limit) = limit {
                        if result.num_states() > limit {
                            return Err(FstError::InvalidArgument(format!(
                                "determinization exceeded {} states",
                                limit
                            )));
                        }
                    }
                    ids.insert(key, fresh);
                    subsets.push(next);
                    queue.push_back(fresh);
                    fresh
                }
            };
            result.add_arc(id, Arc::new(label, olabel, common, next_id))?;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit::accepts;
    use crate::ops::{rm_epsilon, union};
    use crate::semiring::TropicalWeight;
    use crate::strings::{byte_label, compile_bytes};

    type W = TropicalWeight;

    fn is_deterministic(fst: &MutableFst<W>) -> bool {
        (0..fst.num_states() as StateId).all(|s| {
            let mut labels: Vec<Label> =
                fst.arcs(s).iter().map(|a| a.ilabel).collect();
            labels.sort_unstable();
            let before = labels.len();
            labels.dedup();
            labels.len() == before
        })
    }

    #[test]
    fn merges_parallel_arcs_keeping_min_weight() {
        // Two `a` arcs to distinct final states, weights 1.0 and 2.0;
        // the subset arc carries the min.
        let mut fst = MutableFst::<W>::new();
        let q0 = fst.add_state();
        let q1 = fst.add_state();
        let q2 = fst.add_state();
        fst.set_start(q0).unwrap();
        fst.set_final(q1, W::one()).unwrap();
        fst.set_final(q2, W::one()).unwrap();
        let a = byte_label(b'a');
        fst.add_arc(q0, Arc::new(a, a, W::new(1.0), q1)).unwrap();
        fst.add_arc(q0, Arc::new(a, a, W::new(2.0), q2)).unwrap();

        let det = determinize(&fst).unwrap();
        assert!(is_deterministic(&det));
        assert_eq!(det.arcs(det.start()).len(), 1);
        let arc = det.arcs(det.start())[0];
        assert_eq!(arc.ilabel, a);
        assert_eq!(arc.weight, W::new(1.0));
        // The residual 1.0 on the slower state survives in its final
        // weight contribution.
        assert_eq!(det.final_weight(arc.nextstate), W::one());
    }

    #[test]
    fn preserves_language() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"ac")).unwrap();
        union(&mut fst, &compile_bytes(b"b")).unwrap();
        let det = determinize(&rm_epsilon(&fst).unwrap()).unwrap();
        assert!(is_deterministic(&det));
        for word in [&b"ab"[..], b"ac", b"b"] {
            assert!(accepts(&det, word));
        }
        for word in [&b"a"[..], b"bc", b"", b"abc"] {
            assert!(!accepts(&det, word));
        }
    }

    #[test]
    fn shared_prefixes_collapse() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"ac")).unwrap();
        let det = determinize(&rm_epsilon(&fst).unwrap()).unwrap();
        // One arc out of the start on `a`.
        assert_eq!(det.arcs(det.start()).len(), 1);
    }

    #[test]
    fn idempotent_on_state_count() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"ac")).unwrap();
        let once = determinize(&rm_epsilon(&fst).unwrap()).unwrap();
        let twice = determinize(&once).unwrap();
        assert_eq!(once.num_states(), twice.num_states());
    }

    #[test]
    fn empty_input_determinizes_to_empty() {
        let fst = MutableFst::<W>::new();
        let det = determinize(&fst).unwrap();
        assert_eq!(det.num_states(), 0);
    }
}
