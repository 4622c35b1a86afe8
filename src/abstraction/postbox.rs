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

//! This module defines the `Postbox` trait: the outbound side of a variable
//! engine.

use crate::{Msg, ProtocolError, StatsMsg};

/// The handle through which a variable engine emits messages. It is borrowed
/// into every handler call, so the engine never owns a back-edge to the agent
/// that hosts it; in tests, a plain recording vector does the job.
pub trait Postbox<V, U> {
    /// Sends an algorithm message to the named variable, wherever it lives.
    fn send(&mut self, to: &str, msg: Msg<V, U>) -> Result<(), ProtocolError>;
    /// Reports a terminated variable's result upward to the stats channel.
    fn stats(&mut self, msg: StatsMsg<V>) -> Result<(), ProtocolError>;
}
