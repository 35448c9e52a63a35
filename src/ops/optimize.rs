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

//! The optimize pipeline:
//! rm_epsilon → (encode) → determinize → minimize → (decode) → connect.
//!
//! Subset construction is defined for acceptors, so a transducer is
//! first encoded: every distinct (ilabel, olabel) pair gets a fresh
//! label on both tapes, determinize/minimize run on the resulting
//! acceptor, and decoding restores the pairs afterwards. The relation is
//! preserved because encoding is a bijection on arcs.

use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::ops::{connect, determinize, minimize, rm_epsilon};
use crate::semiring::Semiring;
use crate::types::Label;
use rustc_hash::FxHashMap;

struct EncodeTable {
    pairs: Vec<(Label, Label)>,
    ids: FxHashMap<(Label, Label), Label>,
}

fn encode<W: Semiring>(fst: &mut MutableFst<W>) -> Result<EncodeTable> {
    let mut table = EncodeTable {
        pairs: Vec::new(),
        ids: FxHashMap::default(),
    };
    let mut overflowed = false;
    fst.for_each_arc_mut(|arc| {
        let pair = (arc.ilabel, arc.olabel);
        let label = match table.ids.get(&pair) {
            Some(&label) => label,
            None => {
                // Fresh labels count up from 1; label 0 stays epsilon.
                if table.pairs.len() as u64 + 1 >= Label::MAX as u64 {
                    overflowed = true;
                    return;
                }
                let label = table.pairs.len() as Label + 1;
                table.pairs.push(pair);
                table.ids.insert(pair, label);
                label
            }
        };
        arc.ilabel = label;
        arc.olabel = label;
    });
    if overflowed {
        return Err(FstError::LabelOverflow);
    }
    Ok(table)
}

fn decode<W: Semiring>(fst: &mut MutableFst<W>, table: &EncodeTable) {
    fst.for_each_arc_mut(|arc| {
        let (ilabel, olabel) = table.pairs[(arc.ilabel - 1) as usize];
        arc.ilabel = ilabel;
        arc.olabel = olabel;
    });
}

/// Runs the full pipeline and returns a fresh, trimmed, deterministic,
/// minimal FST with the same relation as the input.
pub fn optimize<W: Semiring>(fst: &MutableFst<W>) -> Result<MutableFst<W>> {
    let mut work = rm_epsilon(fst)?;
    let is_transducer = !work.is_acceptor();
    let table = if is_transducer {
        Some(encode(&mut work)?)
    } else {
        None
    };
    let mut work = determinize(&work)?;
    minimize(&mut work)?;
    if let Some(table) = &table {
        decode(&mut work, table);
    }
    connect(&mut work)?;
    Ok(work)
}
