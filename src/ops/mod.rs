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

//! The algebraic operations over FSTs.
//!
//! Operations are either pure (take `&MutableFst`, return a fresh FST) or
//! in-place (take `&mut MutableFst`). In-place operations that fail
//! partway leave the recipient inconsistent; clone first when rollback
//! matters.

mod compose;
mod connect;
mod determinize;
mod difference;
mod minimize;
mod optimize;
mod project;
mod rational;
mod replace;
mod reverse;
mod rewrite;
mod rm_epsilon;
mod shortest_path;

pub use compose::{compose, compose_frozen, compose_frozen_shortest_path};
pub use connect::connect;
pub use determinize::determinize;
pub use difference::difference;
pub use minimize::minimize;
pub use optimize::optimize;
pub use project::{invert, project, ProjectType};
pub use rational::{closure, concat, repeat, union, ClosureType};
pub use replace::replace;
pub use reverse::reverse;
pub use rewrite::{cdrewrite, rewrite, rewrite_string};
pub use rm_epsilon::rm_epsilon;
pub use shortest_path::shortest_path;

#[cfg(test)]
pub(crate) mod testkit {
    use crate::mutable::MutableFst;
    use crate::semiring::Semiring;
    use crate::strings::byte_label;
    use crate::types::{Arc, StateId, EPSILON, NO_STATE};
    use rustc_hash::FxHashSet;

    /// Subset simulation over the input tape, epsilon closure included.
    /// Good enough for the small language-membership checks the op tests
    /// make; not a performance path.
    pub(crate) fn accepts<W: Semiring>(fst: &MutableFst<W>, input: &[u8]) -> bool {
        if fst.start() == NO_STATE {
            return false;
        }
        let mut cur: FxHashSet<StateId> = FxHashSet::default();
        cur.insert(fst.start());
        eps_close(fst, &mut cur);
        for &b in input {
            let label = byte_label(b);
            let mut next: FxHashSet<StateId> = FxHashSet::default();
            for &s in &cur {
                for arc in fst.arcs(s) {
                    if arc.ilabel == label {
                        next.insert(arc.nextstate);
                    }
                }
            }
            eps_close(fst, &mut next);
            if next.is_empty() {
                return false;
            }
            cur = next;
        }
        cur.iter().any(|&s| fst.is_final(s))
    }

    fn eps_close<W: Semiring>(fst: &MutableFst<W>, set: &mut FxHashSet<StateId>) {
        let mut stack: Vec<StateId> = set.iter().copied().collect();
        while let Some(s) = stack.pop() {
            for arc in fst.arcs(s) {
                if arc.ilabel == EPSILON && set.insert(arc.nextstate) {
                    stack.push(arc.nextstate);
                }
            }
        }
    }

    /// Every arc as a (source, arc) pair in canonical order, for
    /// structural equality checks between two FSTs.
    pub(crate) fn canonical_arcs<W: Semiring>(fst: &MutableFst<W>) -> Vec<(StateId, Arc<W>)> {
        let mut out: Vec<(StateId, Arc<W>)> = Vec::new();
        for s in 0..fst.num_states() as StateId {
            let mut arcs = fst.arcs(s).to_vec();
            arcs.sort_by(Arc::sort_cmp);
            for arc in arcs {
                out.push((s, arc));
            }
        }
        out
    }

    /// True when any both-tape epsilon arc exists anywhere.
    pub(crate) fn has_epsilon_arcs<W: Semiring>(fst: &MutableFst<W>) -> bool {
        (0..fst.num_states() as StateId)
            .any(|s| fst.arcs(s).iter().any(|a| a.is_epsilon()))
    }
}
