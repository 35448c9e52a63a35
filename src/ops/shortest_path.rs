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
use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, StateId, NO_STATE};
use fixedbitset::FixedBitSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct HeapEntry<W> {
    weight: W,
    state: StateId,
}

impl<W: Semiring> PartialEq for HeapEntry<W> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<W: Semiring> Eq for HeapEntry<W> {}

impl<W: Semiring> PartialOrd for HeapEntry<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed for BinaryHeap: smallest weight first, ties on the lower
// state id.
impl<W: Semiring> Ord for HeapEntry<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .natural_cmp(&self.weight)
            .then_with(|| other.state.cmp(&self.state))
    }
}

/// Single best path under the semiring's natural order: Dijkstra with
/// back-pointers, then a backtrace from the best final state (by
/// `dist ⊗ final_weight`, ties to the lower state id) into a linear FST.
///
/// Equal-distance relaxations prefer the smaller previous state id, then
/// the smaller arc index. Only `n == 1` is supported; `n == 0` returns
/// the empty FST and an FST with no accepting path also yields the empty
/// FST.
pub fn shortest_path<W: Semiring>(fst: &MutableFst<W>, n: u32) -> Result<MutableFst<W>> {
    if n == 0 {
        return Ok(MutableFst::new());
    }
    if n != 1 {
        return Err(FstError::UnsupportedNShortest(n));
    }
    let num_states = fst.num_states();
    if fst.start() == NO_STATE || num_states == 0 {
        return Ok(MutableFst::new());
    }

    let mut dist: Vec<Option<W>> = vec![None; num_states];
    let mut back: Vec<Option<(StateId, usize)>> = vec![None; num_states];
    let mut settled = FixedBitSet::with_capacity(num_states);
    let mut heap: BinaryHeap<HeapEntry<W>> = BinaryHeap::new();

    dist[fst.start() as usize] = Some(W::one());
    heap.push(HeapEntry {
        weight: W::one(),
        state: fst.start(),
    });

    while let Some(entry) = heap.pop() {
        let s = entry.state;
        if settled.contains(s as usize) {
            continue; // stale queue entry
        }
        settled.insert(s as usize);
        let ds = match dist[s as usize] {
            Some(w) => w,
            None => continue,
        };
        for (idx, arc) in fst.arcs(s).iter().enumerate() {
            if settled.contains(arc.nextstate as usize) {
                continue;
            }
            let nd = ds.times(&arc.weight);
            let replace = match &dist[arc.nextstate as usize] {
                None => true,
                Some(old) => match nd.natural_cmp(old) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => match &back[arc.nextstate as usize] {
                        None => true,
                        Some((prev, prev_idx)) => (s, idx) < (*prev, *prev_idx),
                    },
                },
            };
            if replace {
                dist[arc.nextstate as usize] = Some(nd);
                back[arc.nextstate as usize] = Some((s, idx));
                heap.push(HeapEntry {
                    weight: nd,
                    state: arc.nextstate,
                });
            }
        }
    }

    // Best reachable final state by total weight.
    let mut best: Option<(StateId, W)> = None;
    for s in 0..num_states as StateId {
        let Some(ds) = dist[s as usize] else { continue };
        let fw = fst.final_weight(s);
        if fw.is_zero() {
            continue;
        }
        let total = ds.times(&fw);
        let improves = match &best {
            None => true,
            Some((best_state, best_total)) => match total.natural_cmp(best_total) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => s < *best_state,
            },
        };
        if improves {
            best = Some((s, total));
        }
    }
    let Some((best_state, _)) = best else {
        return Ok(MutableFst::new());
    };

    let mut arcs_on_path: Vec<Arc<W>> = Vec::new();
    let mut cur = best_state;
    while cur != fst.start() {
        let (prev, idx) = back[cur as usize].ok_or_else(|| {
            FstError::InvalidArgument("broken back-pointer chain".to_string())
        })?;
        arcs_on_path.push(fst.arcs(prev)[idx]);
        cur = prev;
    }
    arcs_on_path.reverse();

    let mut result = MutableFst::new();
    let mut prev = result.add_state();
    result.set_start(prev)?;
    for arc in &arcs_on_path {
        let next = result.add_state();
        result.add_arc(prev, Arc::new(arc.ilabel, arc.olabel, arc.weight, next))?;
        prev = next;
    }
    result.set_final(prev, fst.final_weight(best_state))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{union, concat};
    use crate::semiring::TropicalWeight;
    use crate::strings::{byte_label, compile_bytes, print_string};

    type W = TropicalWeight;

    #[test]
    fn picks_the_cheaper_branch() {
        let mut cheap = compile_bytes::<W>(b"ab");
        let n = cheap.num_states() as StateId - 1;
        cheap.set_final(n, W::new(0.5)).unwrap();
        let mut costly = compile_bytes::<W>(b"cd");
        let m = costly.num_states() as StateId - 1;
        costly.set_final(m, W::new(3.0)).unwrap();
        let mut fst = cheap;
        union(&mut fst, &costly).unwrap();

        let best = shortest_path(&fst, 1).unwrap();
        assert_eq!(print_string(&best).unwrap(), "ab");
        // Path states reproduce the chain: one state per step.
        assert_eq!(best.num_states(), best.total_arcs() + 1);
    }

    #[test]
    fn accumulates_weights_along_path() {
        let mut fst = compile_bytes::<W>(b"ab");
        concat(&mut fst, &compile_bytes(b"c")).unwrap();
        let best = shortest_path(&fst, 1).unwrap();
        assert_eq!(print_string(&best).unwrap(), "abc");
    }

    #[test]
    fn equal_weights_break_toward_lower_state_ids() {
        // Two unit-weight paths on different labels; the tie goes to the
        // path through the smaller state ids, which is the first branch
        // added.
        let mut fst = MutableFst::<W>::new();
        let q0 = fst.add_state();
        let q1 = fst.add_state();
        let q2 = fst.add_state();
        fst.set_start(q0).unwrap();
        fst.set_final(q1, W::one()).unwrap();
        fst.set_final(q2, W::one()).unwrap();
        let (a, b) = (byte_label(b'a'), byte_label(b'b'));
        fst.add_arc(q0, Arc::new(b, b, W::one(), q2)).unwrap();
        fst.add_arc(q0, Arc::new(a, a, W::one(), q1)).unwrap();
        let best = shortest_path(&fst, 1).unwrap();
        // q1 < q2, so the `a` path wins even though `b` was added first.
        assert_eq!(print_string(&best).unwrap(), "a");
    }

    #[test]
    fn rejects_multi_path_requests() {
        let fst = compile_bytes::<W>(b"a");
        assert!(matches!(
            shortest_path(&fst, 2),
            Err(FstError::UnsupportedNShortest(2))
        ));
    }

    #[test]
    fn zero_paths_is_the_empty_fst() {
        let fst = compile_bytes::<W>(b"a");
        let empty = shortest_path(&fst, 0).unwrap();
        assert_eq!(empty.num_states(), 0);
    }

    #[test]
    fn no_accepting_path_yields_empty_fst() {
        let mut fst = MutableFst::<W>::new();
        let q0 = fst.add_state();
        fst.set_start(q0).unwrap();
        let best = shortest_path(&fst, 1).unwrap();
        assert_eq!(best.num_states(), 0);
    }
}
