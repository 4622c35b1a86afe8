// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module defines the two capability traits every instantiation of the
//! search is generic over: `Value`, the type of the things variables get
//! assigned, and `Utility`, the type of the costs being minimized. Both come
//! with the byte encoding used by the frame codec, so that every field of a
//! message can round-trip through the transport.

use std::fmt::Debug;
use std::hash::Hash;

use crate::WireError;

/// What it takes to be a domain value: equality and hashing (contexts and
/// bound tables are keyed by values), a total order for tie-breaking, and a
/// byte encoding for the wire.
pub trait Value: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {
    /// Appends the encoding of this value to the given buffer.
    fn write_to(&self, buf: &mut Vec<u8>);
    /// Decodes one value off the front of `input`, advancing it past the
    /// consumed bytes.
    fn read_from(input: &mut &[u8]) -> Result<Self, WireError>;
}

/// What it takes to be a utility: a zero, an absorbing `+∞`, addition and
/// subtraction with the usual cost conventions, and a total order.
///
/// The conventions are those of non-negative cost minimization:
/// `x + ∞ = ∞`, `∞ − x = ∞`, and `x − y` saturates at zero (the search never
/// legitimately produces a negative intermediate result, so clamping is
/// sound).
pub trait Utility: Copy + Eq + Ord + Debug + Send + Sync + 'static {
    fn zero() -> Self;
    fn plus_inf() -> Self;
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn is_inf(self) -> bool {
        self == Self::plus_inf()
    }
    /// Appends the encoding of this utility to the given buffer.
    fn write_to(&self, buf: &mut Vec<u8>);
    /// Decodes one utility off the front of `input`, advancing it past the
    /// consumed bytes.
    fn read_from(input: &mut &[u8]) -> Result<Self, WireError>;
}

// ----------------------------------------------------------------------------
// --- PRIMITIVE IMPLS --------------------------------------------------------
// ----------------------------------------------------------------------------

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], WireError> {
    if input.len() < n {
        Err(WireError::Truncated)
    } else {
        let (head, tail) = input.split_at(n);
        *input = tail;
        Ok(head)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {$(
        impl Value for $t {
            fn write_to(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }
            fn read_from(input: &mut &[u8]) -> Result<Self, WireError> {
                let raw = take(input, std::mem::size_of::<$t>())?;
                Ok(<$t>::from_le_bytes(raw.try_into().unwrap()))
            }
        }
    )*};
}
int_value!(i32, i64, u32, u64);

impl Value for String {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.as_bytes());
    }
    fn read_from(input: &mut &[u8]) -> Result<Self, WireError> {
        let len = take(input, 4)?;
        let len = u32::from_le_bytes(len.try_into().unwrap()) as usize;
        let raw = take(input, len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::BadUtf8)
    }
}

/// The unsigned integers use their `MAX` as `+∞`. Saturating addition makes
/// infinity absorbing on its own; a sum of finite costs that saturates is
/// treated as infinite as well.
macro_rules! unsigned_utility {
    ($($t:ty),*) => {$(
        impl Utility for $t {
            fn zero() -> Self { 0 }
            fn plus_inf() -> Self { <$t>::MAX }
            fn add(self, other: Self) -> Self {
                self.saturating_add(other)
            }
            fn sub(self, other: Self) -> Self {
                if self.is_inf() { self } else { self.saturating_sub(other) }
            }
            fn write_to(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }
            fn read_from(input: &mut &[u8]) -> Result<Self, WireError> {
                let raw = take(input, std::mem::size_of::<$t>())?;
                Ok(<$t>::from_le_bytes(raw.try_into().unwrap()))
            }
        }
    )*};
}
unsigned_utility!(u32, u64);

/// Signed costs exist so that the non-negativity validation has something to
/// reject; a well-formed problem never feeds a negative `i64` to the engine.
impl Utility for i64 {
    fn zero() -> Self {
        0
    }
    fn plus_inf() -> Self {
        i64::MAX
    }
    fn add(self, other: Self) -> Self {
        if self.is_inf() || other.is_inf() {
            i64::MAX
        } else {
            self.saturating_add(other)
        }
    }
    fn sub(self, other: Self) -> Self {
        if self.is_inf() {
            self
        } else {
            self.saturating_sub(other).max(0)
        }
    }
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
    fn read_from(input: &mut &[u8]) -> Result<Self, WireError> {
        let raw = take(input, 8)?;
        Ok(i64::from_le_bytes(raw.try_into().unwrap()))
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_utility {
    use crate::*;

    #[test]
    fn infinity_is_absorbing_for_add() {
        assert_eq!(u64::plus_inf(), u64::plus_inf().add(0));
        assert_eq!(u64::plus_inf(), u64::plus_inf().add(42));
        assert_eq!(u64::plus_inf(), 42u64.add(u64::plus_inf()));
        assert_eq!(u32::plus_inf(), u32::plus_inf().add(u32::plus_inf()));
    }

    #[test]
    fn zero_plus_infinity_is_infinity() {
        assert_eq!(u64::plus_inf(), u64::zero().add(u64::plus_inf()));
    }

    #[test]
    fn infinity_minus_anything_is_infinity() {
        assert_eq!(u64::plus_inf(), u64::plus_inf().sub(17));
        assert_eq!(u64::plus_inf(), u64::plus_inf().sub(u64::plus_inf()));
    }

    #[test]
    fn subtraction_saturates_at_zero() {
        assert_eq!(0, 3u64.sub(8));
        assert_eq!(5, 8u64.sub(3));
        assert_eq!(0, Utility::sub(3i64, 8i64));
    }

    #[test]
    fn signed_add_preserves_infinity() {
        assert_eq!(i64::plus_inf(), Utility::add(i64::plus_inf(), 1));
        assert_eq!(i64::plus_inf(), Utility::add(1, i64::plus_inf()));
    }
}
