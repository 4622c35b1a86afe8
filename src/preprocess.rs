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

//! This module provides the pre-processing phase: the lower-bound estimates
//! every variable must receive before it can start searching. One message per
//! variable carries its own per-value bounds, and one message per (parent,
//! child) pair carries a scalar bound on the child's subtree.
//!
//! The shipped heuristic is the zero bound. It is trivially sound (costs are
//! non-negative), and the engine's `LB(d)` formula degrades gracefully to
//! `delta(d) + lbSum[d]`. A sharper heuristic only has to produce the same
//! two message shapes.

use rustc_hash::FxHashMap;

use crate::{BoundsMsg, Dcop, DfsView, Utility, Value};

/// Produces the zero-bound pre-processing messages for every variable of the
/// given forest.
pub fn zero_bounds<V: Value, U: Utility>(
    problem: &Dcop<V, U>,
    views: &[DfsView<V, U>],
) -> Vec<BoundsMsg<V, U>> {
    let mut out = Vec::with_capacity(2 * views.len());
    for view in views {
        let h: FxHashMap<V, U> = problem
            .domain_of(&view.var)
            .unwrap_or_default()
            .iter()
            .map(|d| (d.clone(), U::zero()))
            .collect();
        out.push(BoundsMsg::Own {
            var: view.var.clone(),
            h,
        });
        for child in &view.children {
            out.push(BoundsMsg::Child {
                var: view.var.clone(),
                child: child.clone(),
                h: U::zero(),
            });
        }
    }
    out
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
