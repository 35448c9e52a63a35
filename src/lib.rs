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

//! Weighted finite-state transducers over a configurable semiring:
//! builders, frozen runtime snapshots, the algebraic operations
//! (composition, determinization, minimization, shortest path, rewrite
//! rules and friends), AT&T text and native binary I/O, and a
//! handle-based boundary layer for callers that cannot hold pointers.

mod caching;
mod environment;
mod error;
pub mod boundary;
pub mod frozen;
pub mod mutable;
pub mod ops;
pub mod registry;
pub mod semiring;
pub mod strings;
pub mod text_format;
pub mod types;

pub use crate::error::{FstError, Result};
pub use crate::frozen::FrozenFst;
pub use crate::mutable::MutableFst;
pub use crate::semiring::{LogWeight, Semiring, TropicalWeight};
pub use crate::types::{Arc, Label, StateId, EPSILON, NO_STATE};
