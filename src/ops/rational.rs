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

//! The rational operations: union, concatenation, closure and bounded
//! repetition. All of them splice epsilon arcs between existing
//! structure; none of them rebuilds the recipient.

use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, StateId, EPSILON, NO_STATE};

/// Unions `other` into `fst`: appends `other`'s states and adds a fresh
/// super-start with unit epsilon arcs to both original starts.
pub fn union<W: Semiring>(fst: &mut MutableFst<W>, other: &MutableFst<W>) -> Result<()> {
    let offset = fst.append_states(other);
    let old_start = fst.start();
    let ns = fst.add_state();
    if old_start != NO_STATE {
        fst.add_arc(ns, Arc::new(EPSILON, EPSILON, W::one(), old_start))?;
    }
    if other.start() != NO_STATE {
        fst.add_arc(ns, Arc::new(EPSILON, EPSILON, W::one(), other.start() + offset))?;
    }
    fst.set_start(ns)
}

/// Concatenates `other` onto `fst`: every final state of `fst` gets an
/// epsilon arc carrying its final weight to `other`'s start, then stops
/// being final.
pub fn concat<W: Semiring>(fst: &mut MutableFst<W>, other: &MutableFst<W>) -> Result<()> {
    let n1 = fst.num_states() as StateId;
    let offset = fst.append_states(other);
    let target = if other.start() != NO_STATE {
        Some(other.start() + offset)
    } else {
        None
    };
    for s in 0..n1 {
        let fw = fst.final_weight(s);
        if fw.is_zero() {
            continue;
        }
        if let Some(t) = target {
            fst.add_arc(s, Arc::new(EPSILON, EPSILON, fw, t))?;
        }
        fst.set_final(s, W::zero())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureType {
    /// Zero or more repetitions.
    Star,
    /// One or more repetitions.
    Plus,
    /// Zero or one occurrence.
    Optional,
}

/// Kleene closure, in place. `Star` adds a new final super-start with an
/// epsilon arc to the old start plus back-arcs from every old final to
/// the old start; `Plus` adds only the back-arcs; `Optional` only the
/// super-start. Back-arcs carry the closing state's final weight, which
/// the state keeps.
pub fn closure<W: Semiring>(fst: &mut MutableFst<W>, kind: ClosureType) {
    let old_start = fst.start();
    let n = fst.num_states() as StateId;

    if matches!(kind, ClosureType::Star | ClosureType::Plus) && old_start != NO_STATE {
        for s in 0..n {
            let fw = fst.final_weight(s);
            if !fw.is_zero() {
                // Both states exist, cannot fail.
                let _ = fst.add_arc(s, Arc::new(EPSILON, EPSILON, fw, old_start));
            }
        }
    }

    if matches!(kind, ClosureType::Star | ClosureType::Optional) {
        let ns = fst.add_state();
        let _ = fst.set_final(ns, W::one());
        if old_start != NO_STATE {
            let _ = fst.add_arc(ns, Arc::new(EPSILON, EPSILON, W::one(), old_start));
        }
        let _ = fst.set_start(ns);
    }
}

/// Between `min` and `max` copies of `fst`, built from `min`
/// concatenations followed by `max - min` optional copies.
pub fn repeat<W: Semiring>(fst: &MutableFst<W>, min: u32, max: u32) -> Result<MutableFst<W>> {
    if max < min {
        return Err(FstError::InvalidRange { min, max });
    }
    let mut result = MutableFst::new();
    let q0 = result.add_state();
    result.set_start(q0)?;
    result.set_final(q0, W::one())?;
    for _ in 0..min {
        concat(&mut result, fst)?;
    }
    if max > min {
        let mut optional = fst.clone();
        closure(&mut optional, ClosureType::Optional);
        for _ in 0..(max - min) {
            concat(&mut result, &optional)?;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit::accepts;
    use crate::semiring::TropicalWeight;
    use crate::strings::compile_bytes;

    type W = TropicalWeight;

    #[test]
    fn union_accepts_either() {
        let mut fst = compile_bytes::<W>(b"ab");
        union(&mut fst, &compile_bytes(b"cd")).unwrap();
        assert!(accepts(&fst, b"ab"));
        assert!(accepts(&fst, b"cd"));
        assert!(!accepts(&fst, b"ac"));
        assert!(!accepts(&fst, b""));
    }

    #[test]
    fn concat_joins_languages() {
        let mut fst = compile_bytes::<W>(b"ab");
        concat(&mut fst, &compile_bytes(b"cd")).unwrap();
        assert!(accepts(&fst, b"abcd"));
        assert!(!accepts(&fst, b"ab"));
        assert!(!accepts(&fst, b"cd"));
    }

    #[test]
    fn concat_moves_final_weight_onto_splice() {
        let mut fst = compile_bytes::<W>(b"a");
        fst.set_final(1, W::new(2.5)).unwrap();
        concat(&mut fst, &compile_bytes(b"b")).unwrap();
        assert!(!fst.is_final(1));
        let splice = fst
            .arcs(1)
            .iter()
            .find(|a| a.is_epsilon())
            .expect("splice arc");
        assert_eq!(splice.weight, W::new(2.5));
    }

    #[test]
    fn star_absorbs_empty_and_repeats() {
        let mut fst = compile_bytes::<W>(b"ab");
        closure(&mut fst, ClosureType::Star);
        assert!(accepts(&fst, b""));
        assert!(accepts(&fst, b"ab"));
        assert!(accepts(&fst, b"abab"));
        assert!(!accepts(&fst, b"aba"));
    }

    #[test]
    fn plus_requires_one_occurrence() {
        let mut fst = compile_bytes::<W>(b"ab");
        closure(&mut fst, ClosureType::Plus);
        assert!(!accepts(&fst, b""));
        assert!(accepts(&fst, b"ab"));
        assert!(accepts(&fst, b"ababab"));
    }

    #[test]
    fn optional_allows_zero_or_one() {
        let mut fst = compile_bytes::<W>(b"ab");
        closure(&mut fst, ClosureType::Optional);
        assert!(accepts(&fst, b""));
        assert!(accepts(&fst, b"ab"));
        assert!(!accepts(&fst, b"abab"));
    }

    #[test]
    fn repeat_bounds_occurrences() {
        let fst = compile_bytes::<W>(b"a");
        let rep = repeat(&fst, 1, 3).unwrap();
        assert!(!accepts(&rep, b""));
        assert!(accepts(&rep, b"a"));
        assert!(accepts(&rep, b"aa"));
        assert!(accepts(&rep, b"aaa"));
        assert!(!accepts(&rep, b"aaaa"));
    }

    #[test]
    fn repeat_rejects_inverted_range() {
        let fst = compile_bytes::<W>(b"a");
        assert!(matches!(
            repeat(&fst, 3, 1),
            Err(FstError::InvalidRange { min: 3, max: 1 })
        ));
    }
}
