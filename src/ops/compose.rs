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

//! Composition with the three-valued epsilon-sequencing filter, plus the
//! fused compose-then-shortest-path that explores the product graph on
//! demand instead of materializing the full lattice.
//!
//! A product state is `(left state, right state, filter)`. The filter
//! tracks which side moved last on an epsilon so each path of the result
//! corresponds to exactly one aligned pair of input paths:
//!
//! ```text
//! filter 0: free          (any move allowed)
//! filter 1: right moved   (left epsilon output blocked)
//! filter 2: left moved    (right epsilon input blocked)
//! ```
//!
//! Omitting the filter double-counts epsilon alignments and corrupts
//! weights.

use crate::error::{FstError, Result};
use crate::frozen::FrozenFst;
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

type ProductKey = (StateId, StateId, u8);

/// Right-hand side of a composition. The mutable form scans arc lists;
/// the frozen form answers label queries with its contiguous
/// ilabel-sorted sub-ranges, which is the point of composing against a
/// snapshot.
pub(crate) trait ComposeRhs<W: Semiring> {
    fn rhs_start(&self) -> StateId;
    fn rhs_final_weight(&self, s: StateId) -> W;
    fn for_each_arc_with_ilabel(&self, s: StateId, ilabel: Label, f: impl FnMut(Arc<W>));
}

impl<W: Semiring> ComposeRhs<W> for MutableFst<W> {
    fn rhs_start(&self) -> StateId {
        self.start()
    }

    fn rhs_final_weight(&self, s: StateId) -> W {
        self.final_weight(s)
    }

    fn for_each_arc_with_ilabel(&self, s: StateId, ilabel: Label, mut f: impl FnMut(Arc<W>)) {
        for arc in self.arcs(s) {
            if arc.ilabel == ilabel {
                f(*arc);
            }
        }
    }
}

impl<W: Semiring> ComposeRhs<W> for FrozenFst<W> {
    fn rhs_start(&self) -> StateId {
        self.start()
    }

    fn rhs_final_weight(&self, s: StateId) -> W {
        self.final_weight(s)
    }

    fn for_each_arc_with_ilabel(&self, s: StateId, ilabel: Label, mut f: impl FnMut(Arc<W>)) {
        for arc in self.arcs_by_ilabel(s, ilabel) {
            f(arc);
        }
    }
}

/// Emits every transition out of one product state, filter rules
/// applied. `emit` receives (ilabel, olabel, weight, next product key).
fn product_transitions<W, R>(
    a: &MutableFst<W>,
    b: &R,
    key: ProductKey,
    mut emit: impl FnMut(Label, Label, W, ProductKey),
) where
    W: Semiring,
    R: ComposeRhs<W>,
{
    let (sa, sb, filter) = key;
    for arc_a in a.arcs(sa) {
        if arc_a.olabel != EPSILON {
            // Non-epsilon match: weights multiply, filter resets.
            b.for_each_arc_with_ilabel(sb, arc_a.olabel, |arc_b| {
                emit(
                    arc_a.ilabel,
                    arc_b.olabel,
                    arc_a.weight.times(&arc_b.weight),
                    (arc_a.nextstate, arc_b.nextstate, 0),
                );
            });
        } else {
            // Left side consumes its epsilon output alone.
            if filter != 1 {
                let next_filter = if filter == 0 { 2 } else { filter };
                emit(
                    arc_a.ilabel,
                    EPSILON,
                    arc_a.weight,
                    (arc_a.nextstate, sb, next_filter),
                );
            }
            // Both sides move on epsilon together, only from the free
            // filter state.
            if filter == 0 {
                b.for_each_arc_with_ilabel(sb, EPSILON, |arc_b| {
                    emit(
                        arc_a.ilabel,
                        arc_b.olabel,
                        arc_a.weight.times(&arc_b.weight),
                        (arc_a.nextstate, arc_b.nextstate, 0),
                    );
                });
            }
        }
    }
    // Right side consumes its epsilon input alone.
    if filter != 2 {
        let next_filter = if filter == 0 { 1 } else { filter };
        b.for_each_arc_with_ilabel(sb, EPSILON, |arc_b| {
            emit(
                EPSILON,
                arc_b.olabel,
                arc_b.weight,
                (sa, arc_b.nextstate, next_filter),
            );
        });
    }
}

fn compose_with<W, R>(a: &MutableFst<W>, b: &R) -> Result<MutableFst<W>>
where
    W: Semiring,
    R: ComposeRhs<W>,
{
    let mut result = MutableFst::new();
    if a.start() == NO_STATE || b.rhs_start() == NO_STATE {
        return Ok(result);
    }

    let mut ids: FxHashMap<ProductKey, StateId> = FxHashMap::default();
    let mut queue: VecDeque<ProductKey> = VecDeque::new();
    let start_key = (a.start(), b.rhs_start(), 0u8);
    let s0 = result.add_state();
    result.set_start(s0)?;
    ids.insert(start_key, s0);
    queue.push_back(start_key);

    let mut pending: Vec<(Label, Label, W, ProductKey)> = Vec::new();
    while let Some(key) = queue.pop_front() {
        let id = ids[&key];
        let fa = a.final_weight(key.0);
        let fb = b.rhs_final_weight(key.1);
        if !fa.is_zero() && !fb.is_zero() {
            result.set_final(id, fa.times(&fb))?;
        }
        pending.clear();
        product_transitions(a, b, key, |il, ol, w, next_key| {
            pending.push((il, ol, w, next_key));
        });
        for &(il, ol, w, next_key) in &pending {
            let next_id = match ids.get(&next_key) {
                Some(&existing) => existing,
                None => {
                    let fresh = result.add_state();
                    ids.insert(next_key, fresh);
                    queue.push_back(next_key);
                    fresh
                }
            };
            result.add_arc(id, Arc::new(il, ol, w, next_id))?;
        }
    }
    Ok(result)
}

/// Composes two builders: the result relates `x` to `z` iff `a` relates
/// `x` to some `y` and `b` relates `y` to `z`, weights multiplied along
/// matched arcs and over final states. Either side lacking a start
/// yields the empty FST.
pub fn compose<W: Semiring>(a: &MutableFst<W>, b: &MutableFst<W>) -> Result<MutableFst<W>> {
    compose_with(a, b)
}

/// Composition against a frozen right-hand side, matching arcs through
/// the snapshot's label-indexed accessor.
pub fn compose_frozen<W: Semiring>(a: &MutableFst<W>, b: &FrozenFst<W>) -> Result<MutableFst<W>> {
    compose_with(a, b)
}

#[derive(Clone, Copy)]
struct BackPointer<W> {
    prev: u32,
    ilabel: Label,
    olabel: Label,
    weight: W,
}

struct HeapEntry<W> {
    weight: W,
    id: u32,
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

// BinaryHeap is a max-heap; reverse the natural order so the smallest
// weight pops first, ties on the lower id.
impl<W: Semiring> Ord for HeapEntry<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .natural_cmp(&self.weight)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Shortest path through `compose(a, b)` without building the lattice:
/// Dijkstra over product states generated on demand. Equal relaxations
/// are broken by lower previous product id, then lower ilabel, then
/// lower olabel. Only `n == 1` is supported; `n == 0` returns the empty
/// FST.
pub fn compose_frozen_shortest_path<W: Semiring>(
    a: &MutableFst<W>,
    b: &FrozenFst<W>,
    n: u32,
) -> Result<MutableFst<W>> {
    if n == 0 {
        return Ok(MutableFst::new());
    }
    if n != 1 {
        return Err(FstError::UnsupportedNShortest(n));
    }
    if a.start() == NO_STATE || b.start() == NO_STATE {
        return Ok(MutableFst::new());
    }

    let mut keys: Vec<ProductKey> = Vec::new();
    let mut ids: FxHashMap<ProductKey, u32> = FxHashMap::default();
    let mut dist: Vec<Option<W>> = Vec::new();
    let mut back: Vec<Option<BackPointer<W>>> = Vec::new();
    let mut settled = FixedBitSet::new();
    let mut heap: BinaryHeap<HeapEntry<W>> = BinaryHeap::new();

    let start_key = (a.start(), b.start(), 0u8);
    keys.push(start_key);
    ids.insert(start_key, 0);
    dist.push(Some(W::one()));
    back.push(None);
    heap.push(HeapEntry {
        weight: W::one(),
        id: 0,
    });

    let mut best: Option<(u32, W)> = None;
    while let Some(entry) = heap.pop() {
        let p = entry.id as usize;
        if settled.contains(p) {
            continue; // stale queue entry
        }
        if let Some((_, best_total)) = &best {
            // Settle order is monotone under ⊗, so once the frontier
            // passes the best accepting total nothing can improve it.
            if entry.weight.natural_cmp(best_total) == Ordering::Greater {
                break;
            }
        }
        settled.grow(p + 1);
        settled.insert(p);

        let key = keys[p];
        let dp = match dist[p] {
            Some(w) => w,
            None => continue,
        };
        let fa = a.final_weight(key.0);
        let fb = b.final_weight(key.1);
        if !fa.is_zero() && !fb.is_zero() {
            let total = dp.times(&fa.times(&fb));
            let improves = match &best {
                None => true,
                Some((best_id, best_total)) => match total.natural_cmp(best_total) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => (p as u32) < *best_id,
                },
            };
            if improves {
                best = Some((p as u32, total));
            }
        }

        product_transitions(a, b, key, |il, ol, w, next_key| {
            let next = match ids.get(&next_key) {
                Some(&x) => x,
                None => {
                    let x = keys.len() as u32;
                    keys.push(next_key);
                    ids.insert(next_key, x);
                    dist.push(None);
                    back.push(None);
                    x
                }
            };
            if settled.contains(next as usize) {
                return;
            }
            let nd = dp.times(&w);
            let replace = match &dist[next as usize] {
                None => true,
                Some(old) => match nd.natural_cmp(old) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => match &back[next as usize] {
                        None => true,
                        Some(old_back) => {
                            (p as u32, il, ol) < (old_back.prev, old_back.ilabel, old_back.olabel)
                        }
                    },
                },
            };
            if replace {
                dist[next as usize] = Some(nd);
                back[next as usize] = Some(BackPointer {
                    prev: p as u32,
                    ilabel: il,
                    olabel: ol,
                    weight: w,
                });
                heap.push(HeapEntry {
                    weight: nd,
                    id: next,
                });
            }
        });
    }

    let Some((best_id, _)) = best else {
        return Ok(MutableFst::new());
    };
    let (fsa, fsb, _) = keys[best_id as usize];
    let final_weight = a.final_weight(fsa).times(&b.final_weight(fsb));

    let mut path: Vec<BackPointer<W>> = Vec::new();
    let mut cur = best_id;
    while cur != 0 {
        let bp = back[cur as usize].ok_or_else(|| {
            FstError::InvalidArgument("broken back-pointer chain".to_string())
        })?;
        path.push(bp);
        cur = bp.prev;
    }
    path.reverse();

    let mut result = MutableFst::new();
    let mut prev = result.add_state();
    result.set_start(prev)?;
    for step in &path {
        let next = result.add_state();
        result.add_arc(prev, Arc::new(step.ilabel, step.olabel, step.weight, next))?;
        prev = next;
    }
    result.set_final(prev, final_weight)?;
    Ok(result)
}
