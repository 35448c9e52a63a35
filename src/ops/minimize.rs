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
use crate::types::{StateId, NO_STATE};
use rustc_hash::FxHashMap;

/// Merges states with indistinguishable futures by signature refinement.
///
/// Requires deterministic, epsilon-free input (run determinize first).
/// Arcs are sorted so signatures are order-independent; the initial
/// partition groups states by final-weight bits plus the
/// (ilabel, olabel, weight bits) sequence of their arcs, then each round
/// extends signatures with the destination class of every arc until the
/// partition stabilizes. It can only refine, so termination is
/// guaranteed. The quotient keeps the first state of each class and is
/// applied through the remap primitive.
pub fn minimize<W: Semiring>(fst: &mut MutableFst<W>) -> Result<()> {
    let n = fst.num_states();
    if n == 0 {
        return Ok(());
    }
    fst.sort_all_arcs();

    let mut class_of: Vec<u32> = vec![0; n];
    let mut num_classes;
    {
        let mut table: FxHashMap<Vec<u64>, u32> = FxHashMap::default();
        for s in 0..n {
            let sid = s as StateId;
            let mut signature: Vec<u64> = Vec::with_capacity(1 + 3 * fst.num_arcs(sid));
            signature.push(fst.final_weight(sid).canonical_bits());
            for arc in fst.arcs(sid) {
                signature.push(arc.ilabel as u64);
                signature.push(arc.olabel as u64);
                signature.push(arc.weight.canonical_bits());
            }
            let fresh = table.len() as u32;
            class_of[s] = *table.entry(signature).or_insert(fresh);
        }
        num_classes = table.len();
    }

    loop {
        let mut table: FxHashMap<Vec<u64>, u32> = FxHashMap::default();
        let mut next_class: Vec<u32> = vec![0; n];
        for s in 0..n {
            let sid = s as StateId;
            let mut signature: Vec<u64> = Vec::with_capacity(1 + fst.num_arcs(sid));
            signature.push(class_of[s] as u64);
            for arc in fst.arcs(sid) {
                signature.push(class_of[arc.nextstate as usize] as u64);
            }
            let fresh = table.len() as u32;
            next_class[s] = *table.entry(signature).or_insert(fresh);
        }
        let refined = table.len();
        class_of = next_class;
        if refined == num_classes {
            break;
        }
        num_classes = refined;
    }

    // First encountered state of each class represents it; new ids follow
    // first-occurrence order so the remap merge keeps exactly those.
    let mut class_new_id: Vec<StateId> = vec![NO_STATE; num_classes];
    let mut mapping: Vec<StateId> = vec![NO_STATE; n];
    let mut next = 0 as StateId;
    for s in 0..n {
        let class = class_of[s] as usize;
        if class_new_id[class] == NO_STATE {
            class_new_id[class] = next;
            next += 1;
        }
        mapping[s] = class_new_id[class];
    }
    fst.remap_states(&mapping)
}
