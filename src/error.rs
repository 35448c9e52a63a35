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
use crate::types::{Label, StateId};
use thiserror::Error;

/// Every failure the crate can report. Operations return either a valid
/// result or one of these; there are no panicking error paths.
///
/// In-place mutating operations (union, concat, closure, minimize) leave
/// the recipient FST in an unspecified state if they fail partway through.
/// Callers that need rollback should clone first.
#[derive(Debug, Error)]
pub enum FstError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("state {0} is out of range")]
    InvalidState(StateId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external tool failed: {0}")]
    ExternalToolFailed(String),

    #[error("invalid binary format: {0}")]
    InvalidFormat(String),

    #[error("bad magic number {0:#010x}")]
    InvalidMagic(u32),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("weight type mismatch: expected {expected}, found {found}")]
    WeightTypeMismatch { expected: u8, found: u8 },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid repeat range min={min} max={max}")]
    InvalidRange { min: u32, max: u32 },

    #[error("cyclic replacement dependency through label {0}")]
    CyclicDependency(Label),

    #[error("label space exhausted while encoding label pairs")]
    LabelOverflow,

    #[error("rewrite rule components must carry unit weights")]
    UnsupportedWeightedRewrite,

    #[error("only 1-shortest-path extraction is supported, got n={0}")]
    UnsupportedNShortest(u32),

    #[error("no accepting path")]
    NoAcceptingPath,
}

pub type Result<T> = std::result::Result<T, FstError>;
