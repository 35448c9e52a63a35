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

//! String helpers and character-class acceptors.
//!
//! Byte `b` is encoded as label `b + 1`, keeping label 0 free for epsilon.

use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::ops::{closure, ClosureType};
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};

/// Label for byte `b`.
#[inline(always)]
pub fn byte_label(b: u8) -> Label {
    b as Label + 1
}

/// Inverse of [`byte_label`]; `None` for epsilon or out-of-range labels.
#[inline(always)]
pub fn label_byte(l: Label) -> Option<u8> {
    if (1..=256).contains(&l) {
        Some((l - 1) as u8)
    } else {
        None
    }
}

/// Which tape to read when printing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tape {
    Input,
    Output,
}

/// Compiles a byte sequence into a linear chain acceptor: one state per
/// prefix, unit arc weights, final weight one at the end.
pub fn compile_bytes<W: Semiring>(input: &[u8]) -> MutableFst<W> {
    let mut fst = MutableFst::new();
    let mut prev = fst.add_state();
    // set_start/add_arc cannot fail here: every id was just created.
    let _ = fst.set_start(prev);
    for &b in input {
        let next = fst.add_state();
        let label = byte_label(b);
        let _ = fst.add_arc(prev, Arc::new(label, label, W::one(), next));
        prev = next;
    }
    let _ = fst.set_final(prev, W::one());
    fst
}

/// Compiles an input/output byte pair into a linear chain transducer.
/// When the sides differ in length the shorter tape is padded with
/// epsilons at the tail.
pub fn compile_transducer<W: Semiring>(input: &[u8], output: &[u8]) -> MutableFst<W> {
    let n = input.len().max(output.len());
    let mut fst = MutableFst::new();
    let mut prev = fst.add_state();
    let _ = fst.set_start(prev);
    for i in 0..n {
        let next = fst.add_state();
        let ilabel = input.get(i).map_or(EPSILON, |&b| byte_label(b));
        let olabel = output.get(i).map_or(EPSILON, |&b| byte_label(b));
        let _ = fst.add_arc(prev, Arc::new(ilabel, olabel, W::one(), next));
        prev = next;
    }
    let _ = fst.set_final(prev, W::one());
    fst
}

/// Reads the single path of a linear FST off one tape, skipping epsilons.
///
/// Fails with `NoAcceptingPath` when the FST has no start or the walk
/// dead-ends before a final state, and `InvalidArgument` when a state
/// branches (the input is not a single path).
pub fn print_path<W: Semiring>(fst: &MutableFst<W>, tape: Tape) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut cur = fst.start();
    if cur == NO_STATE {
        return Err(FstError::NoAcceptingPath);
    }
    let mut steps = 0usize;
    loop {
        let arcs = fst.arcs(cur);
        if arcs.is_empty() {
            if fst.is_final(cur) {
                return Ok(out);
            }
            return Err(FstError::NoAcceptingPath);
        }
        if arcs.len() > 1 {
            return Err(FstError::InvalidArgument(format!(
                "state {} branches, not a linear fst",
                cur
            )));
        }
        let arc = &arcs[0];
        let label = match tape {
            Tape::Input => arc.ilabel,
            Tape::Output => arc.olabel,
        };
        if label != EPSILON {
            match label_byte(label) {
                Some(b) => out.push(b),
                None => {
                    return Err(FstError::InvalidArgument(format!(
                        "label {} is not a byte label",
                        label
                    )))
                }
            }
        }
        cur = arc.nextstate;
        steps += 1;
        if steps > fst.num_states() {
            // A cycle cannot be a linear accepting path.
            return Err(FstError::NoAcceptingPath);
        }
    }
}

/// [`print_path`] decoded as UTF-8, input tape.
pub fn print_string<W: Semiring>(fst: &MutableFst<W>) -> Result<String> {
    bytes_to_string(print_path(fst, Tape::Input)?)
}

/// [`print_path`] decoded as UTF-8, output tape.
pub fn print_output_string<W: Semiring>(fst: &MutableFst<W>) -> Result<String> {
    bytes_to_string(print_path(fst, Tape::Output)?)
}

fn bytes_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| FstError::InvalidArgument(format!("path is not valid utf-8: {}", e)))
}

/// Two-state acceptor matching any single byte `b` with `filter(b)` true.
pub fn byte_class_acceptor<W: Semiring>(filter: impl Fn(u8) -> bool) -> MutableFst<W> {
    let mut fst = MutableFst::new();
    let q0 = fst.add_state();
    let q1 = fst.add_state();
    let _ = fst.set_start(q0);
    let _ = fst.set_final(q1, W::one());
    for b in 0..=u8::MAX {
        if filter(b) {
            let label = byte_label(b);
            let _ = fst.add_arc(q0, Arc::new(label, label, W::one(), q1));
        }
    }
    fst
}

/// Acceptor for any single byte.
pub fn byte_acceptor<W: Semiring>() -> MutableFst<W> {
    byte_class_acceptor(|_| true)
}

/// Acceptor for a single ASCII letter.
pub fn alpha_acceptor<W: Semiring>() -> MutableFst<W> {
    byte_class_acceptor(|b| b.is_ascii_alphabetic())
}

/// Acceptor for a single ASCII digit.
pub fn digit_acceptor<W: Semiring>() -> MutableFst<W> {
    byte_class_acceptor(|b| b.is_ascii_digit())
}

/// Acceptor for one UTF-8 encoded scalar as its byte sequence: lead byte
/// classes fan out to the right number of continuation bytes.
pub fn utf8_char_acceptor<W: Semiring>() -> MutableFst<W> {
    let mut fst = MutableFst::new();
    let q0 = fst.add_state();
    let end = fst.add_state();
    let c1 = fst.add_state();
    let c2 = fst.add_state();
    let c3 = fst.add_state();
    let _ = fst.set_start(q0);
    let _ = fst.set_final(end, W::one());

    let mut add = |from: StateId, lo: u8, hi: u8, to: StateId| {
        for b in lo..=hi {
            let label = byte_label(b);
            let _ = fst.add_arc(from, Arc::new(label, label, W::one(), to));
        }
    };
    // 1-byte scalars.
    add(q0, 0x00, 0x7f, end);
    // Lead bytes of 2-, 3- and 4-byte sequences.
    add(q0, 0xc2, 0xdf, c1);
    add(q0, 0xe0, 0xef, c2);
    add(q0, 0xf0, 0xf4, c3);
    // Continuation bytes.
    add(c3, 0x80, 0xbf, c2);
    add(c2, 0x80, 0xbf, c1);
    add(c1, 0x80, 0xbf, end);
    fst
}

/// Σ*: zero or more of any byte.
pub fn byte_sigma_star<W: Semiring>() -> MutableFst<W> {
    let mut fst = byte_acceptor();
    closure(&mut fst, ClosureType::Star);
    fst
}
