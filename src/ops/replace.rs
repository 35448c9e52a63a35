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
use crate::mutable::MutableFst;
use crate::semiring::Semiring;
use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};
use rustc_hash::FxHashMap;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

fn visit(
    node: usize,
    deps: &[Vec<usize>],
    labels: &[Label],
    colors: &mut [Color],
    order: &mut Vec<usize>,
) -> Result<()> {
    colors[node] = Color::Gray;
    for &dep in &deps[node] {
        match colors[dep] {
            Color::White => visit(dep, deps, labels, colors, order)?,
            Color::Gray => return Err(FstError::CyclicDependency(labels[dep])),
            Color::Black => {}
        }
    }
    colors[node] = Color::Black;
    order.push(node);
    Ok(())
}

/// Inlines one already-resolved body for every arc of `g` whose input
/// label has an entry in `bodies`. The replaced arc becomes a unit
/// epsilon arc into the body's start, and each final state of the body
/// exits with an epsilon arc to the original destination weighted by
/// `final_weight ⊗ original arc weight`. Inlined copies stop being
/// final so they cannot accept mid-expansion.
fn expand<W: Semiring>(
    g: &MutableFst<W>,
    bodies: &FxHashMap<Label, MutableFst<W>>,
) -> Result<MutableFst<W>> {
    let mut out = g.clone();
    let original_states = out.num_states() as StateId;
    for s in 0..original_states {
        let (plain, replaced): (Vec<Arc<W>>, Vec<Arc<W>>) = out
            .arcs(s)
            .iter()
            .copied()
            .partition(|arc| !bodies.contains_key(&arc.ilabel));
        if replaced.is_empty() {
            continue;
        }
        out.delete_arcs(s)?;
        for arc in plain {
            out.add_arc(s, arc)?;
        }
        for arc in replaced {
            let body = &bodies[&arc.ilabel];
            if body.start() == NO_STATE {
                // Empty body: the path through this arc vanishes.
                continue;
            }
            let offset = out.append_states(body);
            out.add_arc(s, Arc::new(EPSILON, EPSILON, W::one(), body.start() + offset))?;
            for f in 0..body.num_states() as StateId {
                let fw = body.final_weight(f);
                if fw.is_zero() {
                    continue;
                }
                out.set_final(f + offset, W::zero())?;
                out.add_arc(
                    f + offset,
                    Arc::new(EPSILON, EPSILON, fw.times(&arc.weight), arc.nextstate),
                )?;
            }
        }
    }
    Ok(out)
}

/// Recursive substitution: every arc of `root` whose input label is one
/// of the replacement labels is replaced by an inline expansion of the
/// corresponding sub-FST, and likewise inside the sub-FSTs themselves.
///
/// Sub-FSTs are expanded leaves-first along the dependency order, so
/// each body is fully resolved before anything includes it. A
/// dependency cycle between sub-FSTs fails with `CyclicDependency`.
pub fn replace<W: Semiring>(
    root: &MutableFst<W>,
    substitutions: &[(Label, MutableFst<W>)],
) -> Result<MutableFst<W>> {
    let index: FxHashMap<Label, usize> = substitutions
        .iter()
        .enumerate()
        .map(|(i, (label, _))| (*label, i))
        .collect();
    let labels: Vec<Label> = substitutions.iter().map(|(label, _)| *label).collect();

    let deps: Vec<Vec<usize>> = substitutions
        .iter()
        .map(|(_, fst)| {
            let mut found: Vec<usize> = Vec::new();
            for s in 0..fst.num_states() as StateId {
                for arc in fst.arcs(s) {
                    if let Some(&dep) = index.get(&arc.ilabel) {
                        found.push(dep);
                    }
                }
            }
            found.sort_unstable();
            found.dedup();
            found
        })
        .collect();

    let mut colors = vec![Color::White; substitutions.len()];
    let mut order: Vec<usize> = Vec::new();
    for node in 0..substitutions.len() {
        if colors[node] == Color::White {
            visit(node, &deps, &labels, &mut colors, &mut order)?;
        }
    }

    let mut bodies: FxHashMap<Label, MutableFst<W>> = FxHashMap::default();
    for &node in &order {
        let body = expand(&substitutions[node].1, &bodies)?;
        bodies.insert(substitutions[node].0, body);
    }
    expand(root, &bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::shortest_path;
    use crate::semiring::TropicalWeight;
    use crate::strings::{compile_bytes, print_string};

    type W = TropicalWeight;

    // Replacement labels live far above the byte range.
    const L_A: Label = 1000;
    const L_B: Label = 1001;

    fn root_with(label: Label) -> MutableFst<W> {
        let mut fst = MutableFst::new();
        let q0 = fst.add_state();
        let q1 = fst.add_state();
        fst.set_start(q0).unwrap();
        fst.set_final(q1, W::one()).unwrap();
        fst.add_arc(q0, Arc::new(label, label, W::one(), q1))
            .unwrap();
        fst
    }

    #[test]
    fn expands_nested_references() {
        // root -> L_A, F_A -> L_B, F_B = "xy": both levels inline.
        let root = root_with(L_A);
        let f_a = root_with(L_B);
        let f_b = compile_bytes::<W>(b"xy");
        let expanded = replace(&root, &[(L_A, f_a), (L_B, f_b)]).unwrap();
        let best = shortest_path(&expanded, 1).unwrap();
        assert_eq!(print_string(&best).unwrap(), "xy");
        // No replacement label survives.
        for s in 0..expanded.num_states() as StateId {
            for arc in expanded.arcs(s) {
                assert!(arc.ilabel != L_A && arc.ilabel != L_B);
            }
        }
    }

    #[test]
    fn expansion_weights_fold_into_exit_arcs() {
        let mut root = root_with(L_A);
        root.delete_arcs(0).unwrap();
        root.add_arc(0, Arc::new(L_A, L_A, W::new(2.0), 1)).unwrap();
        let mut body = compile_bytes::<W>(b"x");
        body.set_final(1, W::new(0.5)).unwrap();
        let expanded = replace(&root, &[(L_A, body)]).unwrap();
        let best = shortest_path(&expanded, 1).unwrap();
        // Path weight: entry ε (1) ⊗ x (1) ⊗ exit ε (0.5 ⊗ 2.0).
        let total: f64 = (0..best.num_states() as StateId)
            .flat_map(|s| best.arcs(s).iter())
            .map(|a| a.weight.value())
            .sum();
        assert!((total - 2.5).abs() < 1e-9);
    }

    #[test]
    fn cycles_are_rejected() {
        let root = root_with(L_A);
        let f_a = root_with(L_B);
        let f_b = root_with(L_A);
        assert!(matches!(
            replace(&root, &[(L_A, f_a), (L_B, f_b)]),
            Err(FstError::CyclicDependency(_))
        ));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let root = root_with(L_A);
        let f_a = root_with(L_A);
        assert!(matches!(
            replace(&root, &[(L_A, f_a)]),
            Err(FstError::CyclicDependency(L_A))
        ));
    }

    #[test]
    fn untouched_arcs_survive() {
        let mut root = compile_bytes::<W>(b"q");
        root.add_arc(0, Arc::new(L_A, L_A, W::one(), 1)).unwrap();
        let expanded = replace(&root, &[(L_A, compile_bytes(b"zz"))]).unwrap();
        // The plain `q` arc is still there.
        assert!(expanded
            .arcs(0)
            .iter()
            .any(|a| a.ilabel == crate::strings::byte_label(b'q')));
    }
}
