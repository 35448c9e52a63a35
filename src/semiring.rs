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
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::hash::Hasher;

/// Algebraic weight type every FST structure and operation is parameterized
/// on. Implementations must satisfy the usual semiring laws: ⊕ and ⊗ are
/// associative and commutative, ⊗ distributes over ⊕, `one` is the ⊗
/// identity, `zero` is the ⊕ identity and annihilates under ⊗.
///
/// `natural_cmp` is the total order shortest-path relaxation runs on; it
/// must be monotone with respect to ⊗ for Dijkstra-style settling to be
/// correct. Both concrete semirings below use the natural order on the
/// real line.
///
/// Everything is monomorphized: the operation set per semiring is small and
/// closed, and the inner loops are hot, so no dynamic dispatch.
pub trait Semiring:
    Copy + Clone + PartialEq + Debug + Display + Send + Sync + 'static
{
    /// Discriminator byte stored in the binary container header.
    const WEIGHT_TYPE: u8;

    fn zero() -> Self;
    fn one() -> Self;

    fn plus(&self, rhs: &Self) -> Self;
    fn times(&self, rhs: &Self) -> Self;

    /// ⊗-inverse applied on the right: `a.times(&b).divide(&b) == a` for
    /// non-zero `b`. Used by determinization to factor a common weight out
    /// of subset residuals.
    fn divide(&self, rhs: &Self) -> Self;

    fn is_zero(&self) -> bool;

    /// Total order used by shortest-path. Smaller is better.
    fn natural_cmp(&self, rhs: &Self) -> Ordering;

    /// Weight of the reversed path. An involution; the identity for both
    /// concrete semirings here.
    fn reverse(&self) -> Self;

    /// Construct from the raw numeric value (text format, tests).
    fn from_value(value: f64) -> Self;
    fn value(&self) -> f64;

    /// Bit pattern written to the 8-byte little-endian storage format.
    fn to_bits(&self) -> u64;
    fn from_bits(bits: u64) -> Self;

    /// Bits with every zero collapsed to one canonical pattern, so that
    /// hashes agree wherever equality does.
    fn canonical_bits(&self) -> u64 {
        if self.is_zero() {
            Self::zero().to_bits()
        } else {
            self.to_bits()
        }
    }

    fn hash_weight<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.canonical_bits());
    }
}

/// Tropical semiring: ⊕ = min, ⊗ = +, zero = +∞, one = 0.
///
/// The workhorse for shortest-path style problems; all end-to-end tests in
/// this crate run over it.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TropicalWeight {
    value: f64,
}

impl TropicalWeight {
    pub fn new(value: f64) -> Self {
        TropicalWeight { value }
    }
}

impl PartialEq for TropicalWeight {
    fn eq(&self, other: &Self) -> bool {
        // Two zeros are equal whatever their bit patterns.
        (self.is_zero() && other.is_zero()) || self.value == other.value
    }
}

impl Display for TropicalWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Semiring for TropicalWeight {
    const WEIGHT_TYPE: u8 = 0;

    fn zero() -> Self {
        TropicalWeight {
            value: f64::INFINITY,
        }
    }

    fn one() -> Self {
        TropicalWeight { value: 0.0 }
    }

    fn plus(&self, rhs: &Self) -> Self {
        if self.natural_cmp(rhs) == Ordering::Greater {
            *rhs
        } else {
            *self
        }
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            Self::zero()
        } else {
            TropicalWeight {
                value: self.value + rhs.value,
            }
        }
    }

    fn divide(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            Self::zero()
        } else {
            TropicalWeight {
                value: self.value - rhs.value,
            }
        }
    }

    fn is_zero(&self) -> bool {
        self.value == f64::INFINITY
    }

    fn natural_cmp(&self, rhs: &Self) -> Ordering {
        self.value.total_cmp(&rhs.value)
    }

    fn reverse(&self) -> Self {
        *self
    }

    fn from_value(value: f64) -> Self {
        TropicalWeight { value }
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn to_bits(&self) -> u64 {
        self.value.to_bits()
    }

    fn from_bits(bits: u64) -> Self {
        TropicalWeight {
            value: f64::from_bits(bits),
        }
    }
}

/// Log semiring: ⊕ = -ln(e^-a + e^-b), ⊗ = +, zero = +∞, one = 0.
///
/// Same order and storage format as tropical; only ⊕ differs.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogWeight {
    value: f64,
}

impl LogWeight {
    pub fn new(value: f64) -> Self {
        LogWeight { value }
    }
}

impl PartialEq for LogWeight {
    fn eq(&self, other: &Self) -> bool {
        (self.is_zero() && other.is_zero()) || self.value == other.value
    }
}

impl Display for LogWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Semiring for LogWeight {
    const WEIGHT_TYPE: u8 = 1;

    fn zero() -> Self {
        LogWeight {
            value: f64::INFINITY,
        }
    }

    fn one() -> Self {
        LogWeight { value: 0.0 }
    }

    fn plus(&self, rhs: &Self) -> Self {
        if self.is_zero() {
            return *rhs;
        }
        if rhs.is_zero() {
            return *self;
        }
        // -ln(e^-a + e^-b) computed against the smaller operand so the
        // exponent never overflows.
        let (lo, hi) = if self.value <= rhs.value {
            (self.value, rhs.value)
        } else {
            (rhs.value, self.value)
        };
        LogWeight {
            value: lo - (lo - hi).exp().ln_1p(),
        }
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            Self::zero()
        } else {
            LogWeight {
                value: self.value + rhs.value,
            }
        }
    }

    fn divide(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            Self::zero()
        } else {
            LogWeight {
                value: self.value - rhs.value,
            }
        }
    }

    fn is_zero(&self) -> bool {
        self.value == f64::INFINITY
    }

    fn natural_cmp(&self, rhs: &Self) -> Ordering {
        self.value.total_cmp(&rhs.value)
    }

    fn reverse(&self) -> Self {
        *self
    }

    fn from_value(value: f64) -> Self {
        LogWeight { value }
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn to_bits(&self) -> u64 {
        self.value.to_bits()
    }

    fn from_bits(bits: u64) -> Self {
        LogWeight {
            value: f64::from_bits(bits),
        }
    }
}
