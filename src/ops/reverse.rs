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
use crate::types::{Arc, StateId, EPSILON, NO_STATE};

/// Reverses the relation: a super-start state (id 0, every original
/// state shifted up by one) gets an epsilon arc to each original final
/// state carrying `reverse(final_weight)`, every arc flips direction
/// with its weight reversed, and the original start becomes the sole
/// final state with weight one.
pub fn reverse<W: Semiring>(fst: &MutableFst<W>) -> Result<MutableFst<W>> {
    let n = fst.num_states();
    let mut result = MutableFst::new();
    let super_start = result.add_state();
    result.add_states(n);
    result.set_start(super_start)?;

    for s in 0..n as StateId {
        let fw = fst.final_weight(s);
        if !fw.is_zero() {
            result.add_arc(
                super_start,
                Arc::new(EPSILON, EPSILON, fw.reverse(), s + 1),
            )?;
        }
        for arc in fst.arcs(s) {
            result.add_arc(
                arc.nextstate + 1,
                Arc::new(arc.ilabel, arc.olabel, arc.weight.reverse(), s + 1),
            )?;
        }
    }
    if fst.start() != NO_STATE {
        result.set_final(fst.start() + 1, W::one())?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit::accepts;
    use crate::ops::union;
    use crate::semiring::TropicalWeight;
    use crate::strings::compile_bytes;

    type W = TropicalWeight;

    #[test]
    fn reverses_the_language() {
        let fst = compile_bytes::<W>(b"abc");
        let rev = reverse(&fst).unwrap();
        assert!(accepts(&rev, b"cba"));
        assert!(!accepts(&rev, b"abc"));
    }

    #[test]
    fn double_reverse_preserves_language() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"xyz")).unwrap();
        let back = reverse(&reverse(&fst).unwrap()).unwrap();
        assert!(accepts(&back, b"ab"));
        assert!(accepts(&back, b"xyz"));
        assert!(!accepts(&back, b"ba"));
    }

    #[test]
    fn final_weight_moves_to_entry_arc() {
        let mut fst = compile_bytes::<W>(b"a");
        fst.set_final(1, W::new(2.0)).unwrap();
        let rev = reverse(&fst).unwrap();
        let entry = rev.arcs(0);
        assert_eq!(entry.len(), 1);
        assert!(entry[0].is_epsilon());
        assert_eq!(entry[0].weight, W::new(2.0));
        // Old start is the unique final state.
        assert_eq!(rev.final_weight(fst.start() + 1), W::one());
    }
}
