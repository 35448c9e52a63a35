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

//! The handle-based boundary surface, monomorphized to the tropical
//! semiring.
//!
//! Callers hold opaque 32-bit handles into two global registries, one
//! for builders and one for frozen snapshots. Each registry sits behind
//! a single global mutex that only covers table bookkeeping: heavy
//! computation runs on snapshots cloned under the lock (with the
//! optimistic-commit protocol for in-place mutators) or on pinned
//! frozen objects read lock-free.
//!
//! Queries return `Option` (`None` for a dead handle or bad state id),
//! handle-producing calls return [`INVALID_HANDLE`] on failure, and
//! in-place mutators return a [`Status`]. Concurrent calls are safe;
//! two mutators racing on one handle lose with `Status::InvalidArg`
//! rather than corrupting anything.

use crate::error::FstError;
use crate::frozen::FrozenFst;
use crate::mutable::MutableFst;
use crate::ops;
use crate::registry::{Handle, HandleTable, INVALID_HANDLE};
use crate::semiring::{Semiring, TropicalWeight};
use crate::strings;
use crate::text_format;
use crate::types::{Arc, Label, StateId, NO_STATE};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Mutex;

pub use crate::ops::{ClosureType, ProjectType};

type BoundaryFst = MutableFst<TropicalWeight>;
type BoundaryFrozen = FrozenFst<TropicalWeight>;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    OutOfMemory = 1,
    InvalidArg = 2,
    InvalidState = 3,
    IoError = 4,
}

impl Status {
    fn from_error(err: &FstError) -> Status {
        match err {
            FstError::OutOfMemory => Status::OutOfMemory,
            FstError::InvalidState(_) => Status::InvalidState,
            FstError::Io(_)
            | FstError::ExternalToolFailed(_)
            | FstError::InvalidFormat(_)
            | FstError::InvalidMagic(_)
            | FstError::UnsupportedVersion(_)
            | FstError::WeightTypeMismatch { .. }
            | FstError::UnexpectedEof => Status::IoError,
            _ => Status::InvalidArg,
        }
    }
}

struct Tables {
    mutable: Mutex<HandleTable<BoundaryFst>>,
    frozen: Mutex<HandleTable<BoundaryFrozen>>,
}

static TABLES: Lazy<Tables> = Lazy::new(|| Tables {
    mutable: Mutex::new(HandleTable::new()),
    frozen: Mutex::new(HandleTable::new()),
});

fn insert_fst(fst: BoundaryFst) -> Handle {
    TABLES.mutable.lock().unwrap().insert(fst)
}

fn snapshot(h: Handle) -> Option<BoundaryFst> {
    TABLES.mutable.lock().unwrap().get_const(h).cloned()
}

fn snapshot2(a: Handle, b: Handle) -> Option<(BoundaryFst, BoundaryFst)> {
    let table = TABLES.mutable.lock().unwrap();
    Some((table.get_const(a)?.clone(), table.get_const(b)?.clone()))
}

// ---- lifecycle ----

pub fn fst_new() -> Handle {
    insert_fst(MutableFst::new())
}

pub fn fst_clone(h: Handle) -> Handle {
    match snapshot(h) {
        Some(fst) => insert_fst(fst),
        None => INVALID_HANDLE,
    }
}

pub fn fst_free(h: Handle) -> Status {
    if TABLES.mutable.lock().unwrap().remove(h) {
        Status::Ok
    } else {
        Status::InvalidArg
    }
}

pub fn frozen_free(h: Handle) -> Status {
    if TABLES.frozen.lock().unwrap().remove(h) {
        Status::Ok
    } else {
        Status::InvalidArg
    }
}

/// Freezes a builder into the frozen registry; the builder handle stays
/// valid.
pub fn fst_freeze(h: Handle) -> Handle {
    let Some(fst) = snapshot(h) else {
        return INVALID_HANDLE;
    };
    match FrozenFst::freeze(&fst) {
        Ok(frozen) => TABLES.frozen.lock().unwrap().insert(frozen),
        Err(_) => INVALID_HANDLE,
    }
}

/// Loads a native binary snapshot into a fresh builder handle.
pub fn fst_load<P: AsRef<Path>>(path: P) -> Handle {
    let loaded = FrozenFst::<TropicalWeight>::load(path).and_then(|frozen| frozen.thaw());
    match loaded {
        Ok(fst) => insert_fst(fst),
        Err(_) => INVALID_HANDLE,
    }
}

/// Loads a native binary snapshot directly into the frozen registry.
pub fn frozen_load<P: AsRef<Path>>(path: P) -> Handle {
    match FrozenFst::<TropicalWeight>::load(path) {
        Ok(frozen) => TABLES.frozen.lock().unwrap().insert(frozen),
        Err(_) => INVALID_HANDLE,
    }
}

/// Imports an OpenFst binary through an external AT&T-printing tool.
pub fn fst_load_text<P: AsRef<Path>>(path: P, tool: &str) -> Handle {
    match text_format::import_att::<TropicalWeight, _>(path, tool) {
        Ok(fst) => insert_fst(fst),
        Err(_) => INVALID_HANDLE,
    }
}

pub fn fst_save<P: AsRef<Path>>(h: Handle, path: P) -> Status {
    let Some(fst) = snapshot(h) else {
        return Status::InvalidArg;
    };
    match FrozenFst::freeze(&fst).and_then(|frozen| frozen.save(path)) {
        Ok(()) => Status::Ok,
        Err(e) => Status::from_error(&e),
    }
}

// ---- builder surface ----

pub fn fst_add_state(h: Handle) -> StateId {
    match TABLES.mutable.lock().unwrap().get(h) {
        Some(fst) => fst.add_state(),
        None => NO_STATE,
    }
}

pub fn fst_set_start(h: Handle, s: StateId) -> Status {
    match TABLES.mutable.lock().unwrap().get(h) {
        Some(fst) => match fst.set_start(s) {
            Ok(()) => Status::Ok,
            Err(e) => Status::from_error(&e),
        },
        None => Status::InvalidArg,
    }
}

pub fn fst_set_final(h: Handle, s: StateId, weight: f64) -> Status {
    match TABLES.mutable.lock().unwrap().get(h) {
        Some(fst) => match fst.set_final(s, TropicalWeight::new(weight)) {
            Ok(()) => Status::Ok,
            Err(e) => Status::from_error(&e),
        },
        None => Status::InvalidArg,
    }
}

pub fn fst_add_arc(
    h: Handle,
    s: StateId,
    ilabel: Label,
    olabel: Label,
    weight: f64,
    nextstate: StateId,
) -> Status {
    match TABLES.mutable.lock().unwrap().get(h) {
        Some(fst) => {
            let arc = Arc::new(ilabel, olabel, TropicalWeight::new(weight), nextstate);
            match fst.add_arc(s, arc) {
                Ok(()) => Status::Ok,
                Err(e) => Status::from_error(&e),
            }
        }
        None => Status::InvalidArg,
    }
}

pub fn fst_start(h: Handle) -> Option<StateId> {
    TABLES.mutable.lock().unwrap().get_const(h).map(|fst| fst.start())
}

pub fn fst_num_states(h: Handle) -> Option<usize> {
    TABLES
        .mutable
        .lock()
        .unwrap()
        .get_const(h)
        .map(|fst| fst.num_states())
}

pub fn fst_num_arcs(h: Handle, s: StateId) -> Option<usize> {
    let table = TABLES.mutable.lock().unwrap();
    let fst = table.get_const(h)?;
    if (s as usize) < fst.num_states() {
        Some(fst.num_arcs(s))
    } else {
        None
    }
}

pub fn fst_is_final(h: Handle, s: StateId) -> Option<bool> {
    let table = TABLES.mutable.lock().unwrap();
    let fst = table.get_const(h)?;
    if (s as usize) < fst.num_states() {
        Some(fst.is_final(s))
    } else {
        None
    }
}

pub fn fst_final_weight(h: Handle, s: StateId) -> Option<f64> {
    let table = TABLES.mutable.lock().unwrap();
    let fst = table.get_const(h)?;
    if (s as usize) < fst.num_states() {
        Some(fst.final_weight(s).value())
    } else {
        None
    }
}

// ---- operations returning fresh handles ----

fn insert_result(result: crate::error::Result<BoundaryFst>) -> Handle {
    match result {
        Ok(fst) => insert_fst(fst),
        Err(_) => INVALID_HANDLE,
    }
}

pub fn fst_compose(a: Handle, b: Handle) -> Handle {
    let Some((fa, fb)) = snapshot2(a, b) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::compose(&fa, &fb))
}

/// Composition against a pinned frozen snapshot: the pin lets the heavy
/// traversal run outside the registry lock while `remove` of the
/// snapshot is deferred until the unpin below.
pub fn fst_compose_frozen(a: Handle, frozen: Handle) -> Handle {
    let Some(fa) = snapshot(a) else {
        return INVALID_HANDLE;
    };
    let Some(ptr) = TABLES.frozen.lock().unwrap().pin_const(frozen) else {
        return INVALID_HANDLE;
    };
    // Pinned bodies are stable heap allocations; the pin keeps this one
    // alive until the unpin, and frozen snapshots are reader-safe.
    let result = ops::compose_frozen(&fa, unsafe { &*ptr });
    TABLES.frozen.lock().unwrap().unpin(frozen);
    insert_result(result)
}

pub fn fst_compose_frozen_shortest_path(a: Handle, frozen: Handle, n: u32) -> Handle {
    let Some(fa) = snapshot(a) else {
        return INVALID_HANDLE;
    };
    let Some(ptr) = TABLES.frozen.lock().unwrap().pin_const(frozen) else {
        return INVALID_HANDLE;
    };
    let result = ops::compose_frozen_shortest_path(&fa, unsafe { &*ptr }, n);
    TABLES.frozen.lock().unwrap().unpin(frozen);
    insert_result(result)
}

pub fn fst_determinize(h: Handle) -> Handle {
    let Some(fst) = snapshot(h) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::determinize(&fst))
}

pub fn fst_rm_epsilon(h: Handle) -> Handle {
    let Some(fst) = snapshot(h) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::rm_epsilon(&fst))
}

pub fn fst_shortest_path(h: Handle, n: u32) -> Handle {
    let Some(fst) = snapshot(h) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::shortest_path(&fst, n))
}

pub fn fst_optimize(h: Handle) -> Handle {
    let Some(fst) = snapshot(h) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::optimize(&fst))
}

pub fn fst_difference(a: Handle, b: Handle) -> Handle {
    let Some((fa, fb)) = snapshot2(a, b) else {
        return INVALID_HANDLE;
    };
    insert_result(ops::difference(&fa, &fb))
}

pub fn fst_replace(root: Handle, substitutions: &[(Label, Handle)]) -> Handle {
    let resolved = {
        let table = TABLES.mutable.lock().unwrap();
        let Some(root_fst) = table.get_const(root).cloned() else {
            return INVALID_HANDLE;
        };
        let mut pairs: Vec<(Label, BoundaryFst)> = Vec::with_capacity(substitutions.len());
        for &(label, handle) in substitutions {
            match table.get_const(handle) {
                Some(fst) => pairs.push((label, fst.clone())),
                None => return INVALID_HANDLE,
            }
        }
        (root_fst, pairs)
    };
    insert_result(ops::replace(&resolved.0, &resolved.1))
}

pub fn fst_cdrewrite(tau: Handle, lambda: Handle, rho: Handle, sigma: Handle) -> Handle {
    let snapshots = {
        let table = TABLES.mutable.lock().unwrap();
        match (
            table.get_const(tau),
            table.get_const(lambda),
            table.get_const(rho),
            table.get_const(sigma),
        ) {
            (Some(t), Some(l), Some(r), Some(s)) => {
                Some((t.clone(), l.clone(), r.clone(), s.clone()))
            }
            _ => None,
        }
    };
    let Some((t, l, r, s)) = snapshots else {
        return INVALID_HANDLE;
    };
    insert_result(ops::cdrewrite(&t, &l, &r, &s))
}

// ---- in-place operations under optimistic commit ----

/// Snapshot `h` and its generation under the lock, run `work` on the
/// snapshot unlocked, then commit only if the generation is untouched.
/// A concurrent commit or removal in the gap surfaces as `InvalidArg`.
fn commit_in_place(
    h: Handle,
    work: impl FnOnce(&mut BoundaryFst) -> crate::error::Result<()>,
) -> Status {
    let (mut body, generation) = {
        let table = TABLES.mutable.lock().unwrap();
        let (Some(obj), Some(generation)) = (table.get_const(h), table.generation(h)) else {
            return Status::InvalidArg;
        };
        (obj.clone(), generation)
    };
    if let Err(e) = work(&mut body) {
        return Status::from_error(&e);
    }
    let mut table = TABLES.mutable.lock().unwrap();
    if table.generation(h) != Some(generation) {
        return Status::InvalidArg;
    }
    table.replace(h, body);
    Status::Ok
}

pub fn fst_minimize(h: Handle) -> Status {
    commit_in_place(h, |fst| ops::minimize(fst))
}

pub fn fst_union(h: Handle, other: Handle) -> Status {
    let Some(rhs) = snapshot(other) else {
        return Status::InvalidArg;
    };
    commit_in_place(h, |fst| ops::union(fst, &rhs))
}

pub fn fst_concat(h: Handle, other: Handle) -> Status {
    let Some(rhs) = snapshot(other) else {
        return Status::InvalidArg;
    };
    commit_in_place(h, |fst| ops::concat(fst, &rhs))
}

pub fn fst_closure(h: Handle, kind: ClosureType) -> Status {
    commit_in_place(h, |fst| {
        ops::closure(fst, kind);
        Ok(())
    })
}

pub fn fst_invert(h: Handle) -> Status {
    commit_in_place(h, |fst| {
        ops::invert(fst);
        Ok(())
    })
}

pub fn fst_project(h: Handle, kind: ProjectType) -> Status {
    commit_in_place(h, |fst| {
        ops::project(fst, kind);
        Ok(())
    })
}

// ---- string utilities ----

pub fn fst_compile_string(input: &str) -> Handle {
    insert_fst(strings::compile_bytes(input.as_bytes()))
}

pub fn fst_print(h: Handle) -> Option<String> {
    let fst = snapshot(h)?;
    strings::print_string(&fst).ok()
}

pub fn fst_print_output(h: Handle) -> Option<String> {
    let fst = snapshot(h)?;
    strings::print_output_string(&fst).ok()
}

// ---- teardown ----

/// Drops every live object in both registries. Only for process
/// shutdown; every outstanding handle becomes invalid.
pub fn teardown() {
    TABLES.mutable.lock().unwrap().clear();
    TABLES.frozen.lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn build_abc() -> Handle {
        fst_compile_string("abc")
    }

    #[test]
    #[serial]
    fn builder_lifecycle_over_handles() {
        let h = fst_new();
        let q0 = fst_add_state(h);
        let q1 = fst_add_state(h);
        assert_eq!(fst_set_start(h, q0), Status::Ok);
        assert_eq!(fst_set_final(h, q1, 0.0), Status::Ok);
        assert_eq!(fst_add_arc(h, q0, 98, 98, 0.5, q1), Status::Ok);
        assert_eq!(fst_num_states(h), Some(2));
        assert_eq!(fst_num_arcs(h, q0), Some(1));
        assert_eq!(fst_is_final(h, q1), Some(true));
        assert_eq!(fst_start(h), Some(q0));
        assert_eq!(fst_free(h), Status::Ok);
        assert_eq!(fst_free(h), Status::InvalidArg);
        assert_eq!(fst_num_states(h), None);
    }

    #[test]
    #[serial]
    fn bad_state_ids_report_invalid_state() {
        let h = fst_new();
        assert_eq!(fst_set_start(h, 5), Status::InvalidState);
        assert_eq!(fst_add_arc(h, 0, 1, 1, 0.0, 0), Status::InvalidState);
        assert_eq!(fst_num_arcs(h, 3), None);
        fst_free(h);
    }

    #[test]
    #[serial]
    fn compose_and_print_over_handles() {
        let a = fst_compile_string("ab");
        let b = fst_compile_string("ab");
        let composed = fst_compose(a, b);
        assert_ne!(composed, INVALID_HANDLE);
        assert_eq!(fst_print(composed).as_deref(), Some("ab"));
        for h in [a, b, composed] {
            fst_free(h);
        }
    }

    #[test]
    #[serial]
    fn frozen_compose_via_pin() {
        let a = build_abc();
        let b = build_abc();
        let frozen = fst_freeze(b);
        assert_ne!(frozen, INVALID_HANDLE);
        let composed = fst_compose_frozen(a, frozen);
        assert_ne!(composed, INVALID_HANDLE);
        assert_eq!(fst_print(composed).as_deref(), Some("abc"));
        let best = fst_compose_frozen_shortest_path(a, frozen, 1);
        assert_eq!(fst_print(best).as_deref(), Some("abc"));
        assert_eq!(frozen_free(frozen), Status::Ok);
        for h in [a, b, composed, best] {
            fst_free(h);
        }
    }

    #[test]
    #[serial]
    fn in_place_mutators_commit() {
        let h = fst_compile_string("ab");
        let other = fst_compile_string("cd");
        assert_eq!(fst_union(h, other), Status::Ok);
        assert_eq!(fst_closure(h, ClosureType::Star), Status::Ok);
        assert_eq!(fst_invert(h), Status::Ok);
        assert_eq!(fst_project(h, ProjectType::Input), Status::Ok);
        let det = fst_determinize(fst_rm_epsilon(h));
        assert_ne!(det, INVALID_HANDLE);
        fst_free(other);
        fst_free(h);
    }

    #[test]
    #[serial]
    fn stale_generation_rejects_commit() {
        let h = fst_compile_string("ab");
        // Simulate an interfering commit between snapshot and commit by
        // bumping the generation mid-protocol.
        let (body, generation) = {
            let table = TABLES.mutable.lock().unwrap();
            (
                table.get_const(h).unwrap().clone(),
                table.generation(h).unwrap(),
            )
        };
        TABLES.mutable.lock().unwrap().bump_generation(h);
        let status = {
            let mut table = TABLES.mutable.lock().unwrap();
            if table.generation(h) != Some(generation) {
                Status::InvalidArg
            } else {
                table.replace(h, body);
                Status::Ok
            }
        };
        assert_eq!(status, Status::InvalidArg);
        fst_free(h);
    }

    #[test]
    #[serial]
    fn shortest_path_rejects_n_above_one() {
        let h = build_abc();
        assert_eq!(fst_shortest_path(h, 3), INVALID_HANDLE);
        let best = fst_shortest_path(h, 1);
        assert_eq!(fst_print(best).as_deref(), Some("abc"));
        fst_free(best);
        fst_free(h);
    }

    #[test]
    #[serial]
    fn binary_save_load_round_trip() {
        let h = build_abc();
        let path = std::env::temp_dir().join(format!(
            "fst_utils_boundary_{}.fst",
            std::process::id()
        ));
        assert_eq!(fst_save(h, &path), Status::Ok);
        let reloaded = fst_load(&path);
        std::fs::remove_file(&path).ok();
        assert_ne!(reloaded, INVALID_HANDLE);
        assert_eq!(fst_print(reloaded).as_deref(), Some("abc"));
        fst_free(reloaded);
        fst_free(h);
    }

    #[test]
    #[serial]
    fn teardown_invalidates_everything() {
        let h = build_abc();
        teardown();
        assert_eq!(fst_num_states(h), None);
        assert_eq!(fst_free(h), Status::InvalidArg);
    }
}
