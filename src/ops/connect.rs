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
use fixedbitset::FixedBitSet;

/// Trims states that are not both accessible (reachable from the start)
/// and coaccessible (able to reach a final state), renumbering the
/// survivors contiguously. An FST whose start is trimmed collapses to
/// the empty FST.
pub fn connect<W: Semiring>(fst: &mut MutableFst<W>) -> Result<()> {
    let n = fst.num_states();
    if n == 0 {
        return Ok(());
    }
    if fst.start() == NO_STATE {
        fst.delete_states();
        return Ok(());
    }

    // Forward reachability.
    let mut accessible = FixedBitSet::with_capacity(n);
    let mut stack: Vec<StateId> = vec![fst.start()];
    accessible.insert(fst.start() as usize);
    while let Some(s) = stack.pop() {
        for arc in fst.arcs(s) {
            if !accessible.contains(arc.nextstate as usize) {
                accessible.insert(arc.nextstate as usize);
                stack.push(arc.nextstate);
            }
        }
    }

    // Backward reachability over the reversed arc graph.
    let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for s in 0..n as StateId {
        for arc in fst.arcs(s) {
            reverse[arc.nextstate as usize].push(s);
        }
    }
    let mut coaccessible = FixedBitSet::with_capacity(n);
    let mut stack: Vec<StateId> = (0..n as StateId).filter(|&s| fst.is_final(s)).collect();
    for &s in &stack {
        coaccessible.insert(s as usize);
    }
    while let Some(s) = stack.pop() {
        for &p in &reverse[s as usize] {
            if !coaccessible.contains(p as usize) {
                coaccessible.insert(p as usize);
                stack.push(p);
            }
        }
    }

    let mut mapping: Vec<StateId> = vec![NO_STATE; n];
    let mut next = 0 as StateId;
    for s in 0..n {
        if accessible.contains(s) && coaccessible.contains(s) {
            mapping[s] = next;
            next += 1;
        }
    }
    if mapping[fst.start() as usize] == NO_STATE {
        fst.delete_states();
        return Ok(());
    }
    fst.remap_states(&mapping)
}
