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

//! Obligatory left-to-right context-dependent rewrite of τ in the
//! context λ _ ρ over σ*.
//!
//! The compiled rule is `rm_epsilon((λ·τ·ρ | σ_one)*)` where σ_one
//! accepts any single alphabet symbol at a fixed identity penalty.
//! Matched contexts pass through τ at unit weight while identity
//! pass-through pays the penalty per symbol, so shortest-path over
//! `input ∘ rule` takes every available replacement: the obligatory
//! reading. The penalty must keep τ's total weight below
//! `|τ| × penalty`, which unit-weight τ with penalty 1.0 satisfies.
//!
//! Rule compilation runs union/closure/epsilon-removal over the whole
//! alphabet, so compiled rules are memoized in the global LRU cache
//! keyed by a structural hash of all four components.

use crate::caching::{get_cached_rule, insert_rule_to_cache, rule_cache_key};
use crate::error::{FstError, Result};
use crate::mutable::MutableFst;
use crate::ops::{closure, compose, concat, project, shortest_path, union};
use crate::ops::{rm_epsilon, ClosureType, ProjectType};
use crate::semiring::Semiring;
use crate::strings::{compile_bytes, print_string};
use crate::types::{Arc, Label, StateId, EPSILON};

/// Weight placed on every identity pass-through symbol.
const IDENTITY_PENALTY: f64 = 1.0;

fn is_unit_weight<W: Semiring>(fst: &MutableFst<W>) -> bool {
    for s in 0..fst.num_states() as StateId {
        let fw = fst.final_weight(s);
        if !fw.is_zero() && fw != W::one() {
            return false;
        }
        for arc in fst.arcs(s) {
            if arc.weight != W::one() {
                return false;
            }
        }
    }
    true
}

// An ε-only trivial context accepts at most the empty string and
// contributes nothing to λ·τ·ρ.
fn is_trivial_context<W: Semiring>(fst: &MutableFst<W>) -> bool {
    fst.total_arcs() == 0
}

/// Compiles the rewrite rule FST for τ → (its output side) in the
/// context λ _ ρ, over the alphabet read off `sigma`'s input labels.
/// τ, λ and ρ must carry unit weights everywhere
/// (`UnsupportedWeightedRewrite` otherwise).
pub fn cdrewrite<W: Semiring>(
    tau: &MutableFst<W>,
    lambda: &MutableFst<W>,
    rho: &MutableFst<W>,
    sigma: &MutableFst<W>,
) -> Result<MutableFst<W>> {
    for component in [tau, lambda, rho] {
        if !is_unit_weight(component) {
            return Err(FstError::UnsupportedWeightedRewrite);
        }
    }

    let key = rule_cache_key(tau, lambda, rho, sigma);
    if let Some(rule) = get_cached_rule::<W>(key) {
        return Ok(rule);
    }

    // context = λ·τ·ρ with trivial sides dropped.
    let mut context = if is_trivial_context(lambda) {
        tau.clone()
    } else {
        let mut joined = lambda.clone();
        concat(&mut joined, tau)?;
        joined
    };
    if !is_trivial_context(rho) {
        concat(&mut context, rho)?;
    }

    // σ_one: any single alphabet symbol at the identity penalty.
    let mut alphabet: Vec<Label> = Vec::new();
    for s in 0..sigma.num_states() as StateId {
        for arc in sigma.arcs(s) {
            if arc.ilabel != EPSILON {
                alphabet.push(arc.ilabel);
            }
        }
    }
    alphabet.sort_unstable();
    alphabet.dedup();
    let penalty = W::from_value(IDENTITY_PENALTY);
    let mut sigma_one = MutableFst::new();
    let q0 = sigma_one.add_state();
    let q1 = sigma_one.add_state();
    sigma_one.set_start(q0)?;
    sigma_one.set_final(q1, W::one())?;
    for &label in &alphabet {
        sigma_one.add_arc(q0, Arc::new(label, label, penalty, q1))?;
    }

    // rule = (context | σ_one)*
    let mut rule = context;
    union(&mut rule, &sigma_one)?;
    closure(&mut rule, ClosureType::Star);
    let rule = rm_epsilon(&rule)?;

    insert_rule_to_cache(key, &rule);
    Ok(rule)
}

/// Applies a compiled rule to an input acceptor: compose, project onto
/// the output tape, take the single best path.
pub fn rewrite<W: Semiring>(
    input: &MutableFst<W>,
    rule: &MutableFst<W>,
) -> Result<MutableFst<W>> {
    let mut lattice = compose(input, rule)?;
    project(&mut lattice, ProjectType::Output);
    shortest_path(&lattice, 1)
}

/// [`rewrite`] over a string: compiles the input, applies the rule, and
/// reads the rewritten string back off the best path.
pub fn rewrite_string<W: Semiring>(input: &str, rule: &MutableFst<W>) -> Result<String> {
    let best = rewrite(&compile_bytes(input.as_bytes()), rule)?;
    print_string(&best)
}
