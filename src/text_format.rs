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

//! The AT&T tabular text format.
//!
//! Arc lines are `src dst ilabel olabel [weight]`, final-state lines are
//! `state [weight]`, fields whitespace-separated, weights defaulting to
//! semiring one. Empty lines are skipped, unknown states are created on
//! demand, and the first state mentioned becomes the start.

use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId};
use anyhow::Context;
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

fn parse_id(field: &str) -> Result<u32> {
    field
        .parse::<u32>()
        .map_err(|_| FstError::InvalidFormat(format!("bad integer field {:?}", field)))
}

fn parse_weight<W: Semiring>(field: &str) -> Result<W> {
    field
        .parse::<f64>()
        .map(W::from_value)
        .map_err(|_| FstError::InvalidFormat(format!("bad weight field {:?}", field)))
}

fn ensure_state<W: Semiring>(fst: &mut MutableFst<W>, s: StateId) {
    if (s as usize) >= fst.num_states() {
        fst.add_states(s as usize + 1 - fst.num_states());
    }
}

/// Parses the tabular text into a builder FST.
pub fn parse_text<W: Semiring>(text: &str) -> Result<MutableFst<W>> {
    let mut fst = MutableFst::new();
    let mut started = false;
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            0 => {}
            1 | 2 => {
                let s = parse_id(fields[0])?;
                let weight = if fields.len() == 2 {
                    parse_weight::<W>(fields[1])?
                } else {
                    W::one()
                };
                ensure_state(&mut fst, s);
                if !started {
                    fst.set_start(s)?;
                    started = true;
                }
                fst.set_final(s, weight)?;
            }
            4 | 5 => {
                let src = parse_id(fields[0])?;
                let dst = parse_id(fields[1])?;
                let ilabel: Label = parse_id(fields[2])?;
                let olabel: Label = parse_id(fields[3])?;
                let weight = if fields.len() == 5 {
                    parse_weight::<W>(fields[4])?
                } else {
                    W::one()
                };
                ensure_state(&mut fst, src);
                ensure_state(&mut fst, dst);
                if !started {
                    fst.set_start(src)?;
                    started = true;
                }
                fst.add_arc(src, Arc::new(ilabel, olabel, weight, dst))?;
            }
            n => {
                return Err(FstError::InvalidFormat(format!(
                    "line {:?} has {} fields",
                    line, n
                )))
            }
        }
    }
    Ok(fst)
}

/// Emits the tabular text. The start state's lines come first so a
/// round trip through [`parse_text`] reconstructs the same start.
pub fn write_text<W: Semiring>(fst: &MutableFst<W>) -> String {
    let mut out = String::new();
    let n = fst.num_states() as StateId;
    let order = (0..n).filter(|&s| s == fst.start()).chain(
        (0..n).filter(|&s| s != fst.start()),
    );
    for s in order {
        for arc in fst.arcs(s) {
            // Infallible string writes.
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                s, arc.nextstate, arc.ilabel, arc.olabel, arc.weight
            );
        }
        if fst.is_final(s) {
            let _ = writeln!(out, "{}\t{}", s, fst.final_weight(s));
        }
    }
    out
}

pub fn load_text<W: Semiring, P: AsRef<Path>>(path: P) -> Result<MutableFst<W>> {
    parse_text(&std::fs::read_to_string(path)?)
}

pub fn save_text<W: Semiring, P: AsRef<Path>>(fst: &MutableFst<W>, path: P) -> Result<()> {
    std::fs::write(path, write_text(fst))?;
    Ok(())
}

/// Imports an OpenFst binary file by running an external AT&T-printing
/// tool (`fstprint`-compatible: takes the path, prints the tabular text
/// on stdout) and parsing its output. Anything going wrong with the
/// tool itself (spawn failure, non-zero exit, undecodable output)
/// surfaces as `ExternalToolFailed`.
pub fn import_att<W: Semiring, P: AsRef<Path>>(path: P, tool: &str) -> Result<MutableFst<W>> {
    let text = run_print_tool(tool, path.as_ref())
        .map_err(|e| FstError::ExternalToolFailed(format!("{:#}", e)))?;
    parse_text(&text)
}

fn run_print_tool(tool: &str, path: &Path) -> anyhow::Result<String> {
    let output = Command::new(tool)
        .arg(path)
        .output()
        .with_context(|| format!("spawning {:?}", tool))?;
    if !output.status.success() {
        anyhow::bail!("{:?} exited with {}", tool, output.status);
    }
    String::from_utf8(output.stdout).context("tool printed non-utf8 output")
}
