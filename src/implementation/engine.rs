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

//! This module provides the search engine of a single variable: the state
//! machine that reacts to VALUE, COST and TERMINATE messages, keeps the bound
//! bookkeeping tight under a moving context, reselects its assignment, and
//! detects termination.
//!
//! An engine is owned by exactly one agent and is only ever mutated from that
//! agent's thread. It never talks to the transport directly: every handler
//! receives a borrowed `Postbox` through which it emits its messages.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    BoundsMsg, BoundsTable, Config, Context, CostSpace, DfsView, Directory, Msg, MsgKind, Postbox,
    ProtocolError, StatsMsg, TracePoint, Utility, Value,
};

/// Where a variable stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the tree view or the pre-processing bounds.
    Uninitialised,
    /// Both inputs arrived; `init` has not run yet.
    Ready,
    /// Searching: the variable holds an assignment and trades messages.
    Running,
    /// Done: the final assignment has been emitted.
    Terminated,
}

/// The per-variable search engine.
pub struct VariableEngine<V: Value, U: Utility> {
    name: String,
    domain: Vec<V>,
    value_idx: FxHashMap<V, usize>,
    directory: Arc<Directory<V>>,
    config: Config,

    // -- pseudo-tree view, fixed once `on_dfs_view` ran ----------------------
    parent: Option<String>,
    pseudo_parents: Vec<String>,
    /// Children first (their position is the child index), pseudo-children
    /// after.
    lower_neighbours: Vec<String>,
    nb_children: usize,
    lower_idx: FxHashMap<String, usize>,
    spaces: Vec<Arc<dyn CostSpace<V, U>>>,
    has_view: bool,

    // -- pre-processing inputs ----------------------------------------------
    h_self: Option<FxHashMap<V, U>>,
    h_child: FxHashMap<String, U>,

    // -- search state --------------------------------------------------------
    bounds: BoundsTable<V, U>,
    context: Context<V>,
    current: usize,
    stamp: u64,
    threshold: U,
    running: bool,
    terminate_received: bool,
    terminated: bool,

    // -- duplicate dropping: last message seen, per kind ---------------------
    last_value: Option<Msg<V, U>>,
    last_cost: Option<Msg<V, U>>,
    last_terminate: Option<Msg<V, U>>,

    // -- convergence history -------------------------------------------------
    started: Instant,
    history: Vec<TracePoint<V>>,
}

impl<V: Value, U: Utility> VariableEngine<V, U> {
    pub fn new(
        name: impl Into<String>,
        domain: Vec<V>,
        directory: Arc<Directory<V>>,
        config: Config,
    ) -> Self {
        let name = name.into();
        let value_idx = domain
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        let nb_values = domain.len().max(1);
        VariableEngine {
            name,
            domain,
            value_idx,
            directory,
            config,
            parent: None,
            pseudo_parents: vec![],
            lower_neighbours: vec![],
            nb_children: 0,
            lower_idx: FxHashMap::default(),
            spaces: vec![],
            has_view: false,
            h_self: None,
            h_child: FxHashMap::default(),
            bounds: BoundsTable::new(nb_values, 0),
            context: Context::new(),
            current: 0,
            stamp: 0,
            threshold: U::plus_inf(),
            running: false,
            terminate_received: false,
            terminated: false,
            last_value: None,
            last_cost: None,
            last_terminate: None,
            started: Instant::now(),
            history: vec![],
        }
    }

    // ------------------------------------------------------------------------
    // --- QUERIES ------------------------------------------------------------
    // ------------------------------------------------------------------------
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn running(&self) -> bool {
        self.running
    }
    pub fn terminated(&self) -> bool {
        self.terminated
    }
    pub fn state(&self) -> EngineState {
        if self.terminated {
            EngineState::Terminated
        } else if self.running {
            EngineState::Running
        } else if self.is_ready() {
            EngineState::Ready
        } else {
            EngineState::Uninitialised
        }
    }
    /// Ready means: the tree view arrived, the own pre-processing bounds
    /// arrived, and a per-child bound arrived for every child.
    pub fn is_ready(&self) -> bool {
        self.has_view
            && self.h_self.is_some()
            && self.lower_neighbours[..self.nb_children]
                .iter()
                .all(|c| self.h_child.contains_key(c))
    }
    /// A singleton has no neighbours at all; it decides on its own, without
    /// a single message exchange.
    pub fn is_singleton(&self) -> bool {
        self.has_view
            && self.parent.is_none()
            && self.pseudo_parents.is_empty()
            && self.lower_neighbours.is_empty()
    }
    pub fn current_value(&self) -> &V {
        &self.domain[self.current]
    }
    pub fn lb(&self) -> U {
        self.bounds.lb()
    }
    pub fn ub(&self) -> U {
        self.bounds.ub()
    }
    /// The stamp carried by the next outgoing VALUE message.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }
    /// The threshold most recently allocated by the parent.
    pub fn threshold(&self) -> U {
        self.threshold
    }
    /// This variable's current belief about its ancestors.
    pub fn context(&self) -> &Context<V> {
        &self.context
    }
    /// The bound bookkeeping, exposed read-only.
    pub fn bounds(&self) -> &BoundsTable<V, U> {
        &self.bounds
    }

    // ------------------------------------------------------------------------
    // --- SETUP INPUTS -------------------------------------------------------
    // ------------------------------------------------------------------------
    /// Installs the pseudo-tree neighbourhood and the constraint spaces this
    /// variable is responsible for.
    pub fn on_dfs_view(&mut self, view: DfsView<V, U>) {
        if self.has_view {
            debug!("[{}] duplicate tree view ignored", self.name);
            return;
        }
        self.parent = view.parent;
        self.pseudo_parents = view.pseudo_parents;
        self.nb_children = view.children.len();
        self.lower_neighbours = view.children;
        self.lower_neighbours.extend(view.pseudo_children);
        self.lower_idx = self
            .lower_neighbours
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        self.spaces = view.spaces;
        self.has_view = true;
    }

    /// Stores a pre-processing bound, own or per-child.
    pub fn on_bounds(&mut self, msg: BoundsMsg<V, U>) {
        match msg {
            BoundsMsg::Own { h, .. } => self.h_self = Some(h),
            BoundsMsg::Child { child, h, .. } => {
                self.h_child.insert(child, h);
            }
        }
    }

    // ------------------------------------------------------------------------
    // --- INIT ---------------------------------------------------------------
    // ------------------------------------------------------------------------
    /// Boots the search for this variable: placeholder context entries for
    /// every separator member, fresh child bounds, local costs, an initial
    /// assignment, and the opening round of VALUE/COST messages.
    pub fn init(&mut self, post: &mut dyn Postbox<V, U>) -> Result<(), ProtocolError> {
        // Placeholder assignments let `delta` be evaluated before any real
        // VALUE arrives. Stamp 0 guarantees that the first real VALUE (stamp
        // >= 1) wins the merge, and entries merged before init are kept.
        let separator: Vec<String> = self
            .parent
            .iter()
            .chain(self.pseudo_parents.iter())
            .cloned()
            .collect();
        for ancestor in separator {
            let first = self
                .directory
                .domain_of(&ancestor)
                .and_then(<[V]>::first)
                .ok_or_else(|| ProtocolError::UnknownVariable(ancestor.clone()))?;
            self.context.put_if_absent(ancestor, first.clone(), 0);
        }

        self.stamp = 0;
        self.bounds = BoundsTable::new(self.domain.len(), self.nb_children);
        for value in 0..self.domain.len() {
            for child in 0..self.nb_children {
                self.bounds.init_child(value, child);
            }
        }
        if let Some(h) = self.h_self.as_ref() {
            for (i, d) in self.domain.iter().enumerate() {
                let bound = h.get(d).copied().unwrap_or_else(U::zero);
                self.bounds.set_h(i, bound);
            }
        }
        self.set_delta();
        self.init_self();
        if self.config.convergence {
            self.history.push(TracePoint {
                micros: self.elapsed_micros(),
                value: self.domain[self.current].clone(),
            });
        }
        self.running = true;
        debug!(
            "[{}] initialised: assignment {:?}, LB {:?}, UB {:?}",
            self.name,
            self.current_value(),
            self.lb(),
            self.ub()
        );
        self.backtrack(post)?;
        self.debug_check();
        Ok(())
    }

    /// An isolated variable needs no search: it picks the value minimising
    /// its local cost, reports it, and is done.
    pub fn decide_singleton(&mut self, post: &mut dyn Postbox<V, U>) -> Result<(), ProtocolError> {
        self.bounds = BoundsTable::new(self.domain.len(), 0);
        self.set_delta();
        let mut best = 0;
        for i in 1..self.domain.len() {
            if self.bounds.delta_of(i) < self.bounds.delta_of(best) {
                best = i;
            }
        }
        self.current = best;
        debug!(
            "[{}] singleton settles on {:?}",
            self.name,
            self.current_value()
        );
        if self.config.convergence {
            self.history.push(TracePoint {
                micros: self.elapsed_micros(),
                value: self.domain[best].clone(),
            });
        }
        self.running = true;
        self.terminated = true;
        post.stats(StatsMsg::Assignment {
            var: self.name.clone(),
            value: self.domain[best].clone(),
        })?;
        if self.config.convergence {
            post.stats(StatsMsg::Trace {
                var: self.name.clone(),
                history: std::mem::take(&mut self.history),
            })?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // --- MESSAGE HANDLERS ---------------------------------------------------
    // ------------------------------------------------------------------------
    /// Remembers the given message as the last one received of its kind.
    /// Returns false (and leaves the memory untouched) when the message is
    /// structurally equal to the remembered one: re-processing it would only
    /// regenerate the exact same traffic, over and over, under cooperative
    /// scheduling.
    pub fn record_if_new(&mut self, msg: &Msg<V, U>) -> bool {
        let slot = match msg.kind() {
            MsgKind::Value => &mut self.last_value,
            MsgKind::Cost => &mut self.last_cost,
            MsgKind::Terminate => &mut self.last_terminate,
        };
        if slot.as_ref() == Some(msg) {
            false
        } else {
            *slot = Some(msg.clone());
            true
        }
    }

    /// What happens to a VALUE that arrives before `init`: the claim is
    /// merged into the context store (so that the first `delta` computation
    /// can already use it) and nothing else.
    pub fn absorb_value_context(&mut self, sender: &str, value: V, stamp: u64) {
        self.context.priority_merge(sender, value, stamp);
    }

    /// VALUE handler: merge the sender's claim, discard child bounds that the
    /// new context invalidates, adopt the parent's threshold, and re-run the
    /// reselection step.
    pub fn on_value(
        &mut self,
        sender: &str,
        value: V,
        threshold: U,
        stamp: u64,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError> {
        if self.terminated || self.terminate_received {
            return Ok(());
        }
        trace!(
            "[{}] VALUE from {}: {:?} (stamp {})",
            self.name,
            sender,
            value,
            stamp
        );
        let before = self.context.clone();
        self.context.priority_merge(sender, value, stamp);

        if self.lower_neighbours.is_empty() {
            // a leaf has no child bounds to invalidate
            if !before.compatible(&self.context) {
                self.set_delta();
                self.init_self();
            }
        } else {
            let reset = self.reset_stale_children();
            self.set_delta();
            if reset {
                self.init_self();
            }
        }
        // after init_self, which resets the threshold to +inf
        if self.parent.as_deref() == Some(sender) {
            self.threshold = threshold;
        }
        self.backtrack(post)?;
        self.debug_check();
        Ok(())
    }

    /// COST handler: the attached context carries the child's claim about
    /// this very variable (that claim selects the row to update) and about
    /// the ancestors (those decide whether the bounds are still meaningful).
    pub fn on_cost(
        &mut self,
        sender: &str,
        mut context: Context<V>,
        lb: U,
        ub: U,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError> {
        trace!(
            "[{}] COST from {}: [{:?}, {:?}]",
            self.name,
            sender,
            lb,
            ub
        );
        let claim = context.remove(&self.name);

        if !self.terminate_received && !self.terminated {
            let merged = self
                .context
                .priority_merge_many(&context, &self.lower_neighbours[..self.nb_children]);
            let reset = self.reset_stale_children();
            // a merged separator entry moves delta, not only a reset
            if merged || reset {
                self.set_delta();
            }
            if reset {
                self.init_self();
            }
        }

        let child = match self.lower_idx.get(sender) {
            Some(&k) if k < self.nb_children => k,
            _ => {
                return Err(ProtocolError::UnexpectedCost {
                    var: self.name.clone(),
                    sender: sender.to_string(),
                })
            }
        };

        if context.compatible(&self.context) {
            match claim {
                Some(stamped) => {
                    if let Some(&row) = self.value_idx.get(&stamped.value) {
                        self.bounds.update(row, child, lb, ub);
                        self.bounds.save_ctx(row, child, context);
                    } else {
                        debug!(
                            "[{}] COST from {} claims out-of-domain value {:?}; ignored",
                            self.name, sender, stamped.value
                        );
                    }
                }
                // the child's context is silent about us: the report holds
                // whatever we are assigned
                None => {
                    for row in 0..self.domain.len() {
                        self.bounds.update(row, child, lb, ub);
                        self.bounds.save_ctx(row, child, context.clone());
                    }
                }
            }
            self.bounds.recompute_aggregates();
        }

        self.backtrack(post)?;
        self.debug_check();
        Ok(())
    }

    /// TERMINATE handler: adopt the parent's view of the world, settle on the
    /// best value under it, and propagate the shutdown.
    pub fn on_terminate(
        &mut self,
        context: Context<V>,
        post: &mut dyn Postbox<V, U>,
    ) -> Result<(), ProtocolError> {
        trace!("[{}] TERMINATE received", self.name);
        self.terminate_received = true;
        self.context = context.filtered(|k| k != self.name && !self.lower_neighbours.iter().any(|l| l == k));

        if self.lower_neighbours.is_empty() {
            self.set_delta();
            self.init_self();
        } else {
            let reset = self.reset_stale_children();
            self.set_delta();
            if reset {
                self.init_self();
            }
        }
        self.backtrack(post)?;
        self.debug_check();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // --- INTERNALS ----------------------------------------------------------
    // ------------------------------------------------------------------------
    /// Re-evaluates the local cost of every value under the current context
    /// and refreshes the derived bounds.
    fn set_delta(&mut self) {
        let mut eval: FxHashMap<String, V> =
            FxHashMap::with_capacity_and_hasher(self.context.len() + 1, Default::default());
        for (var, stamped) in self.context.iter() {
            eval.insert(var.to_string(), stamped.value.clone());
        }
        for (i, d) in self.domain.iter().enumerate() {
            eval.insert(self.name.clone(), d.clone());
            let cost = self
                .spaces
                .iter()
                .fold(U::zero(), |acc, space| acc.add(space.utility(&eval)));
            self.bounds.set_delta(i, cost);
        }
        self.bounds.recompute_aggregates();
    }

    /// Re-derives the per-value bounds, points the assignment at the lower
    /// bound argmin, bumps the stamp, and forgets the allocated threshold.
    fn init_self(&mut self) {
        self.bounds.recompute_aggregates();
        self.current = self.bounds.lb_idx();
        self.stamp += 1;
        self.threshold = U::plus_inf();
    }

    /// Discards every child bound whose saved context disagrees with the
    /// current one. Returns whether anything was discarded.
    fn reset_stale_children(&mut self) -> bool {
        let mut reset = false;
        for value in 0..self.domain.len() {
            for child in 0..self.nb_children {
                if !self.bounds.child_ctx(value, child).compatible(&self.context) {
                    self.bounds.reset(value, child);
                    reset = true;
                }
            }
        }
        if reset {
            self.bounds.recompute_aggregates();
        }
        reset
    }

    /// The slice of the (parent-allocated or own) upper bound a child may
    /// spend: what remains of `min(threshold, UB)` once the local cost and
    /// the other children's lower bounds are paid for. Never negative.
    fn allocation_threshold(&self, child: usize) -> U {
        let row = self.current;
        let mut others = U::zero();
        for j in 0..self.nb_children {
            if j != child {
                others = others.add(self.bounds.child_lb(row, j));
            }
        }
        let cap = self.threshold.min(self.bounds.ub());
        cap.sub(self.bounds.delta_of(row)).sub(others)
    }

    /// The value reselection and message emission step run at the end of
    /// every handler.
    fn backtrack(&mut self, post: &mut dyn Postbox<V, U>) -> Result<(), ProtocolError> {
        if self.terminated {
            return Ok(());
        }

        // reselection: once the current value provably cannot beat the
        // allocated threshold nor the best known upper bound, move to the
        // most promising value
        let row = self.current;
        if self.bounds.lb_of(row) >= self.threshold || self.bounds.lb_of(row) >= self.bounds.ub() {
            let best = self.bounds.lb_idx();
            if best != row {
                self.stamp += 1;
                debug!(
                    "[{}] switches {:?} -> {:?} (stamp {})",
                    self.name, self.domain[row], self.domain[best], self.stamp
                );
                if self.config.convergence {
                    self.history.push(TracePoint {
                        micros: self.elapsed_micros(),
                        value: self.domain[best].clone(),
                    });
                }
            }
            self.current = best;
        }

        // termination: ordered from above, or root with a closed gap
        if self.terminate_received || (self.parent.is_none() && self.bounds.ub() <= self.bounds.lb())
        {
            self.terminated = true;
            debug!(
                "[{}] terminates with {:?} (LB {:?}, UB {:?})",
                self.name,
                self.current_value(),
                self.lb(),
                self.ub()
            );
            let mut handoff = self.context.clone();
            handoff.put(
                self.name.clone(),
                self.domain[self.current].clone(),
                self.stamp,
            );
            for child in &self.lower_neighbours[..self.nb_children] {
                post.send(
                    child,
                    Msg::Terminate {
                        sender: self.name.clone(),
                        receiver: child.clone(),
                        context: handoff.clone(),
                    },
                )?;
            }
            post.stats(StatsMsg::Assignment {
                var: self.name.clone(),
                value: self.domain[self.current].clone(),
            })?;
            if self.config.convergence {
                post.stats(StatsMsg::Trace {
                    var: self.name.clone(),
                    history: std::mem::take(&mut self.history),
                })?;
            }
            return Ok(());
        }

        // VALUE to every lower neighbour; identical re-sends are fine, the
        // receiving side drops them
        for (k, neighbour) in self.lower_neighbours.iter().enumerate() {
            let threshold = if k < self.nb_children {
                self.allocation_threshold(k)
            } else {
                U::plus_inf()
            };
            post.send(
                neighbour,
                Msg::Value {
                    sender: self.name.clone(),
                    receiver: neighbour.clone(),
                    value: self.domain[self.current].clone(),
                    threshold,
                    stamp: self.stamp,
                },
            )?;
        }

        // COST to the parent; the root reports to nobody
        if let Some(parent) = &self.parent {
            post.send(
                parent,
                Msg::Cost {
                    sender: self.name.clone(),
                    receiver: parent.clone(),
                    context: self.context.clone(),
                    lb: self.bounds.lb(),
                    ub: self.bounds.ub(),
                },
            )?;
        }
        Ok(())
    }

    fn elapsed_micros(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }

    /// Post-handler self check: the accounting identities of the bounds table
    /// plus the reset invariant (an incompatible saved context implies the
    /// vacuous interval).
    fn debug_check(&self) {
        if cfg!(debug_assertions) && self.running && !self.terminated {
            debug_assert!(self.bounds.consistent());
            for value in 0..self.domain.len() {
                for child in 0..self.nb_children {
                    if !self.bounds.child_ctx(value, child).compatible(&self.context) {
                        debug_assert!(self.bounds.child_lb(value, child) == U::zero());
                        debug_assert!(self.bounds.child_ub(value, child).is_inf());
                    }
                }
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
