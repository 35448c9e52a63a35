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
use crate::mutable::MutableFst;
use crate::semiring::Semiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Input,
    Output,
}

/// Restricts the transduction to one tape, copying that tape's label over
/// the other on every arc. In place, O(total arcs).
pub fn project<W: Semiring>(fst: &mut MutableFst<W>, kind: ProjectType) {
    match kind {
        ProjectType::Input => fst.for_each_arc_mut(|arc| arc.olabel = arc.ilabel),
        ProjectType::Output => fst.for_each_arc_mut(|arc| arc.ilabel = arc.olabel),
    }
}

/// Swaps input and output labels on every arc. In place, O(total arcs).
pub fn invert<W: Semiring>(fst: &mut MutableFst<W>) {
    fst.for_each_arc_mut(|arc| std::mem::swap(&mut arc.ilabel, &mut arc.olabel));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit::canonical_arcs;
    use crate::semiring::TropicalWeight;
    use crate::strings::compile_transducer;

    type W = TropicalWeight;

    #[test]
    fn project_input_makes_acceptor() {
        let mut fst = compile_transducer::<W>(b"ab", b"xy");
        assert!(!fst.is_acceptor());
        project(&mut fst, ProjectType::Input);
        assert!(fst.is_acceptor());
        assert_eq!(fst.arcs(0)[0].olabel, fst.arcs(0)[0].ilabel);
    }

    #[test]
    fn project_output_keeps_output_tape() {
        let mut fst = compile_transducer::<W>(b"ab", b"xy");
        let expected = fst.arcs(0)[0].olabel;
        project(&mut fst, ProjectType::Output);
        assert_eq!(fst.arcs(0)[0].ilabel, expected);
    }

    #[test]
    fn invert_is_an_involution() {
        let fst = compile_transducer::<W>(b"ab", b"xyz");
        let mut twice = fst.clone();
        invert(&mut twice);
        invert(&mut twice);
        assert_eq!(canonical_arcs(&fst), canonical_arcs(&twice));
    }

    #[test]
    fn invert_swaps_tapes() {
        let mut fst = compile_transducer::<W>(b"a", b"b");
        let (il, ol) = (fst.arcs(0)[0].ilabel, fst.arcs(0)[0].olabel);
        invert(&mut fst);
        assert_eq!(fst.arcs(0)[0].ilabel, ol);
        assert_eq!(fst.arcs(0)[0].olabel, il);
    }
}
