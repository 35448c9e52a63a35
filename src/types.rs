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
use crate::semiring::Semiring;
use std::cmp::Ordering;

/// Arc label. Label 0 is reserved for epsilon and never names a concrete
/// symbol; string helpers encode byte `b` as label `b + 1`.
pub type Label = u32;

/// State identifier within one FST.
pub type StateId = u32;

/// The reserved "no symbol" label.
pub const EPSILON: Label = 0;

/// Sentinel for "no state": an unset start state, a dropped slot in a
/// remap, an invalid return at the boundary.
pub const NO_STATE: StateId = u32::MAX;

/// A weighted transition: input label, output label, weight, destination.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arc<W> {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: W,
    pub nextstate: StateId,
}

impl<W: Semiring> Arc<W> {
    pub fn new(ilabel: Label, olabel: Label, weight: W, nextstate: StateId) -> Self {
        Arc {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }

    /// An epsilon arc consumes and emits nothing: both labels are 0.
    #[inline(always)]
    pub fn is_epsilon(&self) -> bool {
        self.ilabel == EPSILON && self.olabel == EPSILON
    }

    /// Lexicographic arc order: (ilabel, olabel, weight, nextstate).
    /// This is the sort key `sort_arcs` and `freeze` use; ilabel-major
    /// order is what the frozen binary search relies on.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.ilabel
            .cmp(&other.ilabel)
            .then(self.olabel.cmp(&other.olabel))
            .then(self.weight.natural_cmp(&other.weight))
            .then(self.nextstate.cmp(&other.nextstate))
    }
}
