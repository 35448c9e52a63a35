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
use crate::semiring::Semiring;
use crate::types::{Arc, StateId, NO_STATE};
use smallvec::SmallVec;

#[derive(Debug, Clone)]
struct MutableState<W> {
    final_weight: W,
    arcs: SmallVec<[Arc<W>; 4]>,
}

impl<W: Semiring> MutableState<W> {
    fn new() -> Self {
        MutableState {
            final_weight: W::zero(),
            arcs: SmallVec::new(),
        }
    }
}

/// The builder form of an FST: an ordered list of states, each carrying a
/// final weight and a dynamic list of outgoing arcs, plus a designated
/// start state.
///
/// A state is final iff its final weight is non-zero. Arc order is
/// insertion order until an explicit sort. Ownership is single-writer;
/// concurrent mutation of one instance is undefined and only *detected*,
/// never prevented, by the generation counter.
///
/// # Generation counter
/// Every structural mutation (state/arc addition or removal, sort,
/// final-weight change, start change, whole-FST remap) bumps `generation`.
/// Arc views obtained from [`MutableFst::arcs`] borrow into the state
/// table; a caller holding indices across unrelated mutations can snapshot
/// the generation and `debug_assert_eq!` it later to catch silent
/// invalidation.
#[derive(Debug)]
pub struct MutableFst<W> {
    states: Vec<MutableState<W>>,
    start: StateId,
    generation: u64,
}

impl<W: Semiring> MutableFst<W> {
    pub fn new() -> Self {
        MutableFst {
            states: Vec::new(),
            start: NO_STATE,
            generation: 0,
        }
    }

    #[inline(always)]
    fn bump(&mut self) {
        self.generation += 1;
    }

    fn check_state(&self, s: StateId) -> Result<()> {
        if (s as usize) < self.states.len() {
            Ok(())
        } else {
            Err(FstError::InvalidState(s))
        }
    }

    /// Adds a fresh state with zero final weight and no arcs.
    pub fn add_state(&mut self) -> StateId {
        let id = self.states.len() as StateId;
        self.states.push(MutableState::new());
        self.bump();
        id
    }

    /// Bulk state addition; returns the id of the first new state.
    pub fn add_states(&mut self, n: usize) -> StateId {
        let first = self.states.len() as StateId;
        self.states
            .resize_with(self.states.len() + n, MutableState::new);
        self.bump();
        first
    }

    pub fn set_start(&mut self, s: StateId) -> Result<()> {
        self.check_state(s)?;
        self.start = s;
        self.bump();
        Ok(())
    }

    pub fn set_final(&mut self, s: StateId, weight: W) -> Result<()> {
        self.check_state(s)?;
        self.states[s as usize].final_weight = weight;
        self.bump();
        Ok(())
    }

    /// Appends an arc to `s`. Both `s` and the arc's destination must
    /// already be present.
    pub fn add_arc(&mut self, s: StateId, arc: Arc<W>) -> Result<()> {
        self.check_state(s)?;
        self.check_state(arc.nextstate)?;
        self.states[s as usize].arcs.push(arc);
        self.bump();
        Ok(())
    }

    pub fn delete_arcs(&mut self, s: StateId) -> Result<()> {
        self.check_state(s)?;
        self.states[s as usize].arcs.clear();
        self.bump();
        Ok(())
    }

    /// Clears every state and the start designation.
    pub fn delete_states(&mut self) {
        self.states.clear();
        self.start = NO_STATE;
        self.bump();
    }

    /// Sorts the arcs of `s` by the lexicographic key
    /// (ilabel, olabel, weight, nextstate).
    pub fn sort_arcs(&mut self, s: StateId) -> Result<()> {
        self.check_state(s)?;
        self.states[s as usize].arcs.sort_by(Arc::sort_cmp);
        self.bump();
        Ok(())
    }

    pub fn sort_all_arcs(&mut self) {
        for state in self.states.iter_mut() {
            state.arcs.sort_by(Arc::sort_cmp);
        }
        self.bump();
    }

    #[inline(always)]
    pub fn start(&self) -> StateId {
        self.start
    }

    /// Final weight of `s`. Panics if `s` is out of range; state ids held
    /// by callers are expected to come from this FST.
    #[inline(always)]
    pub fn final_weight(&self, s: StateId) -> W {
        self.states[s as usize].final_weight
    }

    #[inline(always)]
    pub fn is_final(&self, s: StateId) -> bool {
        !self.states[s as usize].final_weight.is_zero()
    }

    #[inline(always)]
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    #[inline(always)]
    pub fn num_arcs(&self, s: StateId) -> usize {
        self.states[s as usize].arcs.len()
    }

    pub fn total_arcs(&self) -> usize {
        self.states.iter().map(|st| st.arcs.len()).sum()
    }

    /// Contiguous view of the outgoing arcs of `s`. Invalidated by any
    /// structural mutation; see the generation counter notes on the type.
    #[inline(always)]
    pub fn arcs(&self, s: StateId) -> &[Arc<W>] {
        &self.states[s as usize].arcs
    }

    #[inline(always)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True iff every arc carries the same label on both tapes.
    pub fn is_acceptor(&self) -> bool {
        self.states
            .iter()
            .all(|st| st.arcs.iter().all(|a| a.ilabel == a.olabel))
    }

    /// Applies `f` to every arc in the FST, in place.
    pub(crate) fn for_each_arc_mut(&mut self, mut f: impl FnMut(&mut Arc<W>)) {
        for state in self.states.iter_mut() {
            for arc in state.arcs.iter_mut() {
                f(arc);
            }
        }
        self.bump();
    }

    /// Appends a copy of `other`'s states, arc destinations shifted past
    /// this FST's current states. Returns the shift. Start and final
    /// weights of `other` are copied as-is (its start is *not* adopted).
    pub(crate) fn append_states(&mut self, other: &MutableFst<W>) -> StateId {
        let offset = self.states.len() as StateId;
        self.states.reserve(other.states.len());
        for st in other.states.iter() {
            let mut arcs = st.arcs.clone();
            for arc in arcs.iter_mut() {
                arc.nextstate += offset;
            }
            self.states.push(MutableState {
                final_weight: st.final_weight,
                arcs,
            });
        }
        self.bump();
        offset
    }

    /// Replaces the state sequence: state `i` moves to `mapping[i]`, or is
    /// dropped when the mapping entry is [`NO_STATE`]. When several old
    /// states map to one new id the first occurrence wins and later
    /// duplicates are discarded. Arc destinations and the start state are
    /// rewritten through the mapping; arcs whose destination is dropped
    /// are removed.
    pub fn remap_states(&mut self, mapping: &[StateId]) -> Result<()> {
        if mapping.len() != self.states.len() {
            return Err(FstError::InvalidArgument(format!(
                "remap table covers {} states, fst has {}",
                mapping.len(),
                self.states.len()
            )));
        }
        let mut new_len = 0usize;
        for &m in mapping {
            if m != NO_STATE {
                new_len = new_len.max(m as usize + 1);
            }
        }
        let old = std::mem::take(&mut self.states);
        let mut slots: Vec<Option<MutableState<W>>> = Vec::new();
        slots.resize_with(new_len, || None);
        for (i, mut st) in old.into_iter().enumerate() {
            let m = mapping[i];
            if m == NO_STATE || slots[m as usize].is_some() {
                continue;
            }
            st.arcs.retain(|arc| {
                let target = mapping[arc.nextstate as usize];
                if target == NO_STATE {
                    false
                } else {
                    arc.nextstate = target;
                    true
                }
            });
            slots[m as usize] = Some(st);
        }
        self.states = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(MutableState::new))
            .collect();
        if self.start != NO_STATE {
            self.start = mapping[self.start as usize];
        }
        self.bump();
        Ok(())
    }
}

impl<W: Semiring> Default for MutableFst<W> {
    fn default() -> Self {
        Self::new()
    }
}

// Clones start life with a fresh generation: the counter tracks mutations
// of one instance, not lineage.
impl<W: Semiring> Clone for MutableFst<W> {
    fn clone(&self) -> Self {
        MutableFst {
            states: self.states.clone(),
            start: self.start,
            generation: 0,
        }
    }
}
