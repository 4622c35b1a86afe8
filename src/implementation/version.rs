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

//! This module provides `Original`, the default `Version` of the search: the
//! plain asynchronous branch-and-bound algorithm. What lives here is policy,
//! not mechanism: which messages reach the engine, and what happens to the
//! ones that arrive too early or twice.

use log::trace;

use crate::{Msg, MsgKind, Postbox, ProtocolError, Utility, Value, Version, VariableEngine};

/// The original search version. Stateless: all per-variable state lives in
/// the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct Original;

impl<V: Value, U: Utility> Version<V, U> for Original {
    fn init(
        &self,
        var: &mut VariableEngine<V, U>,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError> {
        var.init(post)
    }

    fn notify(
        &self,
        var: &mut VariableEngine<V, U>,
        msg: Msg<V, U>,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError> {
        // A COST for a variable that is not searching yet is dropped without
        // being remembered: the child may re-send the very same report later,
        // and that re-send must go through.
        if msg.kind() == MsgKind::Cost && !var.running() {
            trace!("[{}] COST before init dropped", var.name());
            return Ok(());
        }
        // A replay of the last message of the same kind carries no new
        // information and would only regenerate identical traffic.
        if !var.record_if_new(&msg) {
            trace!("[{}] duplicate {:?} dropped", var.name(), msg.kind());
            return Ok(());
        }
        match msg {
            Msg::Value {
                sender,
                value,
                threshold,
                stamp,
                ..
            } => {
                if var.running() {
                    var.on_value(&sender, value, threshold, stamp, post)
                } else {
                    // keep the claim so the first delta computation already
                    // sees the true context
                    var.absorb_value_context(&sender, value, stamp);
                    Ok(())
                }
            }
            Msg::Cost {
                sender,
                context,
                lb,
                ub,
                ..
            } => var.on_cost(&sender, context, lb, ub, post),
            // the dispatcher re-enqueues TERMINATEs for uninitialised
            // variables, so the engine is guaranteed to be running here
            Msg::Terminate { context, .. } => var.on_terminate(context, post),
        }
    }

    fn message_kinds(&self) -> &'static [MsgKind] {
        &[MsgKind::Value, MsgKind::Cost, MsgKind::Terminate]
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
