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

//! This module defines the most basic data types that are used throughout all
//! the code of our library: the stamped assignments exchanged between agents,
//! the messages that travel on the wire, the control and stats envelopes, and
//! the error taxonomy.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{Context, CostSpace};

// ----------------------------------------------------------------------------
// --- STAMPED ASSIGNMENT -----------------------------------------------------
// ----------------------------------------------------------------------------
/// A value assignment tagged with the sender's stamp at the time the value was
/// selected. The stamp is a per-variable monotonic counter: when two claims
/// about the same variable race, the one bearing the strictly greater stamp
/// wins (see `Context::priority_merge`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<V> {
    pub value: V,
    pub stamp: u64,
}

/// One point of a variable's assignment history: the value it switched to and
/// the number of microseconds elapsed (on the owning agent's clock) when the
/// switch occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePoint<V> {
    pub micros: u64,
    pub value: V,
}

// ----------------------------------------------------------------------------
// --- DIRECTORY --------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The static, read-only description of who owns what: for every variable of
/// the problem, the name of the agent hosting it and its ordered domain. It is
/// built once before the agents start and shared behind an `Arc` thereafter.
#[derive(Debug, Clone, Default)]
pub struct Directory<V> {
    owners: FxHashMap<String, String>,
    domains: FxHashMap<String, Vec<V>>,
}

impl<V> Directory<V> {
    pub fn new() -> Self {
        Directory {
            owners: FxHashMap::default(),
            domains: FxHashMap::default(),
        }
    }
    /// Registers a variable along with its owning agent and its domain.
    pub fn insert(&mut self, var: impl Into<String>, agent: impl Into<String>, domain: Vec<V>) {
        let var = var.into();
        self.owners.insert(var.clone(), agent.into());
        self.domains.insert(var, domain);
    }
    /// The agent owning the given variable, if the variable is known.
    pub fn owner_of(&self, var: &str) -> Option<&str> {
        self.owners.get(var).map(String::as_str)
    }
    /// The ordered domain of the given variable, if the variable is known.
    pub fn domain_of(&self, var: &str) -> Option<&[V]> {
        self.domains.get(var).map(Vec::as_slice)
    }
    pub fn nb_variables(&self) -> usize {
        self.owners.len()
    }
    /// The distinct agent names, sorted.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = self.owners.values().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.into_iter()
    }
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }
}

// ----------------------------------------------------------------------------
// --- ALGORITHM MESSAGES -----------------------------------------------------
// ----------------------------------------------------------------------------
/// The three messages of the search protocol proper. These are the only
/// messages exchanged between variables once the search is running, and the
/// only ones subject to the duplicate-dropping rule of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg<V, U> {
    /// The sender announces its current assignment. The threshold is only
    /// meaningful when the sender is the receiver's tree parent; pseudo
    /// parents always send an infinite one.
    Value {
        sender: String,
        receiver: String,
        value: V,
        threshold: U,
        stamp: u64,
    },
    /// The sender (a tree child of the receiver) reports the bounds on its
    /// subtree cost under the attached context.
    Cost {
        sender: String,
        receiver: String,
        context: Context<V>,
        lb: U,
        ub: U,
    },
    /// The sender (the receiver's tree parent) orders the receiver to settle
    /// on its best value under the attached context and shut down.
    Terminate {
        sender: String,
        receiver: String,
        context: Context<V>,
    },
}

impl<V, U> Msg<V, U> {
    pub fn kind(&self) -> MsgKind {
        match self {
            Msg::Value { .. } => MsgKind::Value,
            Msg::Cost { .. } => MsgKind::Cost,
            Msg::Terminate { .. } => MsgKind::Terminate,
        }
    }
    pub fn sender(&self) -> &str {
        match self {
            Msg::Value { sender, .. } => sender,
            Msg::Cost { sender, .. } => sender,
            Msg::Terminate { sender, .. } => sender,
        }
    }
    pub fn receiver(&self) -> &str {
        match self {
            Msg::Value { receiver, .. } => receiver,
            Msg::Cost { receiver, .. } => receiver,
            Msg::Terminate { receiver, .. } => receiver,
        }
    }
}

/// Discriminant of the algorithm messages; what a `Version` declares to
/// understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    Value,
    Cost,
    Terminate,
}

// ----------------------------------------------------------------------------
// --- CONTROL MESSAGES -------------------------------------------------------
// ----------------------------------------------------------------------------
/// The pseudo-tree view of one variable, as produced by the tree construction
/// collaborator: its neighbourhood split by priority, and the constraint
/// spaces it is responsible for.
#[derive(Debug, Clone)]
pub struct DfsView<V, U> {
    pub var: String,
    /// The single higher-priority tree neighbour; `None` iff this variable is
    /// the root of its component.
    pub parent: Option<String>,
    pub pseudo_parents: Vec<String>,
    /// Lower-priority tree neighbours, in an order that is fixed for the whole
    /// run and defines the child index.
    pub children: Vec<String>,
    pub pseudo_children: Vec<String>,
    pub spaces: Vec<Arc<dyn CostSpace<V, U>>>,
}

/// A pre-processing message carrying lower-bound estimates. One `Own` message
/// per variable and one `Child` message per (parent, child) pair must be
/// delivered before the variable can start searching.
#[derive(Debug, Clone)]
pub enum BoundsMsg<V, U> {
    /// Per-value lower bounds `h(var, d)` on the cost of the whole subtree
    /// rooted at `var`.
    Own { var: String, h: FxHashMap<V, U> },
    /// A scalar lower bound on the subtree cost of `child`, addressed to its
    /// parent `var`.
    Child { var: String, child: String, h: U },
}

impl<V, U> BoundsMsg<V, U> {
    /// The variable whose engine consumes this message.
    pub fn destination(&self) -> &str {
        match self {
            BoundsMsg::Own { var, .. } => var,
            BoundsMsg::Child { var, .. } => var,
        }
    }
}

/// Everything an agent can find in its inbox.
#[derive(Debug, Clone)]
pub enum Envelope<V, U> {
    Algo(Msg<V, U>),
    /// An algorithm message as an encoded frame. This is what travels when
    /// `Config::framed_transport` is on: the router runs every algorithm
    /// message through the frame codec and the receiving dispatcher decodes
    /// it back.
    Frame(Vec<u8>),
    DfsView(DfsView<V, U>),
    Bounds(BoundsMsg<V, U>),
    /// Externally triggered start-of-run signal.
    Start,
    /// Self-emitted by the dispatcher once every owned variable terminated;
    /// makes the agent loop drain and exit.
    AgentFinished,
}

// ----------------------------------------------------------------------------
// --- STATS MESSAGES ---------------------------------------------------------
// ----------------------------------------------------------------------------
/// What a variable reports upward to the stats channel when it terminates.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsMsg<V> {
    /// The final, optimal assignment of one variable. Emitted exactly once per
    /// variable.
    Assignment { var: String, value: V },
    /// The assignment history of one variable; emitted at most once, and only
    /// when `Config::convergence` is set.
    Trace {
        var: String,
        history: Vec<TracePoint<V>>,
    },
}

// ----------------------------------------------------------------------------
// --- CONFIG -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Run-wide knobs. All default to off.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Record and report the assignment history of every variable.
    pub convergence: bool,
    /// Deliver every algorithm message twice back-to-back on its link. The
    /// outcome must not change; this knob exists to exercise the duplicate
    /// dropping rule of the engine.
    pub duplicate_delivery: bool,
    /// Carry every algorithm message as an encoded frame instead of a typed
    /// enum value. In-process delivery does not need the bytes, so this is
    /// off by default; a deployment whose links cross process or host
    /// boundaries runs with it on, and so do the tests that prove the codec
    /// against the real transport path.
    pub framed_transport: bool,
}

impl Config {
    pub fn with_convergence(mut self) -> Self {
        self.convergence = true;
        self
    }
    pub fn with_duplicate_delivery(mut self) -> Self {
        self.duplicate_delivery = true;
        self
    }
    pub fn with_framed_transport(mut self) -> Self {
        self.framed_transport = true;
        self
    }
}

// ----------------------------------------------------------------------------
// --- ERRORS -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Problems detected before the agents even start, or reported by an agent
/// that had to abort.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("maximization problems are not supported; this search minimizes non-negative costs")]
    UnsupportedMaximize,
    #[error("negative cost detected in the scope of {scope:?}; all costs must be non-negative")]
    NegativeCost { scope: Vec<String> },
    #[error("cost table references unknown variable `{0}`")]
    Dangling(String),
    #[error("variable `{0}` has an empty domain")]
    EmptyDomain(String),
    #[error("agent `{agent}` aborted: {source}")]
    Agent {
        agent: String,
        source: ProtocolError,
    },
}

/// Fatal wiring or transport conditions, detected while the search runs. None
/// of these is recovered from: the owning agent logs and aborts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message addressed to unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("COST message for `{var}` from `{sender}`, which is not one of its children")]
    UnexpectedCost { var: String, sender: String },
    #[error("channel to agent `{0}` is closed")]
    ChannelClosed(String),
    #[error("malformed frame on the wire: {0}")]
    BadFrame(WireError),
}

/// Decoding failures of the frame codec.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("frame ended in the middle of a field")]
    Truncated,
    #[error("unknown message tag {0:#04x}")]
    BadTag(u8),
    #[error("name field is not valid UTF-8")]
    BadUtf8,
    #[error("frame carries {0} trailing bytes")]
    TrailingBytes(usize),
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
