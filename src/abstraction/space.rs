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

//! This module defines the `CostSpace` trait, the seam between the search
//! engine and whatever representation of the constraints the surrounding
//! system uses.

use std::fmt::Debug;

use rustc_hash::FxHashMap;

/// One constraint space: a named scope and a cost function over assignments
/// to that scope.
///
/// The engine evaluates the spaces a variable is responsible for with the
/// variable pinned to each of its domain values in turn and the ancestors
/// pinned to whatever the current context says. A space whose scope is not
/// fully covered by the given assignment contributes zero; the join of the
/// spaces owned by one variable is the sum of their evaluations.
pub trait CostSpace<V, U>: Debug + Send + Sync {
    /// The variables this space constrains.
    fn scope(&self) -> &[String];
    /// The cost of the given (possibly partial) assignment. Must return zero
    /// when some variable of the scope is unbound.
    fn utility(&self, assignment: &FxHashMap<String, V>) -> U;
}
