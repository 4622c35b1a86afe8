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

//! This module defines the `Version` trait, the strategy seam along which
//! variants of the search algorithm plug into an agent.

use crate::{Msg, MsgKind, Postbox, ProtocolError, Utility, Value, VariableEngine};

/// A variant of the search algorithm. The dispatcher selects one
/// implementation at agent construction and routes every algorithm message
/// through it; the engine it operates on is passed as a borrowed handle into
/// each call.
///
/// The shipped implementation is `Original`, the plain asynchronous
/// branch-and-bound search. Alternative versions (different reselection
/// rules, extra message kinds) implement this same trait.
pub trait Version<V: Value, U: Utility> {
    /// Called once per variable, when both its tree view and its
    /// pre-processing bounds have arrived.
    fn init(
        &self,
        var: &mut VariableEngine<V, U>,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError>;

    /// Called for every algorithm message addressed to `var`.
    fn notify(
        &self,
        var: &mut VariableEngine<V, U>,
        msg: Msg<V, U>,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError>;

    /// The message kinds this version understands; anything else is dropped
    /// by the dispatcher.
    fn message_kinds(&self) -> &'static [MsgKind];
}
