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
use crate::ops::compose;
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};
use rustc_hash::FxHashSet;

/// `difference(a, b) = a ∩ complement(b)`.
///
/// `b` must be a deterministic acceptor without epsilon transitions;
/// the precondition is not validated and violating it gives unspecified
/// results. The complement is taken over the union of labels appearing
/// in `a` and `b`: `b` is completed with a sink state catching every
/// missing (state, label) transition, then final and non-final states
/// swap roles.
pub fn difference<W: Semiring>(
    a: &MutableFst<W>,
    b: &MutableFst<W>,
) -> Result<MutableFst<W>> {
    let mut labels: Vec<Label> = Vec::new();
    for fst in [a, b] {
        for s in 0..fst.num_states() as StateId {
            for arc in fst.arcs(s) {
                if arc.ilabel != EPSILON {
                    labels.push(arc.ilabel);
                }
            }
        }
    }
    labels.sort_unstable();
    labels.dedup();

    let mut complement = b.clone();
    if complement.start() == NO_STATE {
        let s = complement.add_state();
        complement.set_start(s)?;
    }
    let original_states = complement.num_states() as StateId;
    let sink = complement.add_state();
    for &label in &labels {
        complement.add_arc(sink, Arc::new(label, label, W::one(), sink))?;
    }
    for s in 0..original_states {
        let present: FxHashSet<Label> =
            complement.arcs(s).iter().map(|arc| arc.ilabel).collect();
        for &label in &labels {
            if !present.contains(&label) {
                complement.add_arc(s, Arc::new(label, label, W::one(), sink))?;
            }
        }
    }
    for s in 0..complement.num_states() as StateId {
        if complement.is_final(s) {
            complement.set_final(s, W::zero())?;
        } else {
            complement.set_final(s, W::one())?;
        }
    }

    compose(a, &complement)
}
