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

//! This module provides the agent dispatcher: the single-threaded event loop
//! that owns one or more variable engines, routes every inbound envelope to
//! the right one, and shuts the agent down once all of them terminated.
//!
//! The agent is the only place where engine state is mutated; engines share
//! nothing with one another, and agents share nothing but the read-only
//! router. Handlers never block: the one blocking point is the wait on the
//! inbox.

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::wire;
use crate::{
    Config, Directory, Envelope, Msg, MsgKind, Original, Postbox, ProtocolError, Router, StatsMsg,
    Utility, Value, VariableEngine, Version,
};

/// One agent: a bundle of variable engines behind a single FIFO inbox.
pub struct Agent<V: Value, U: Utility> {
    name: String,
    engines: FxHashMap<String, VariableEngine<V, U>>,
    inbox: Receiver<Envelope<V, U>>,
    /// The sending side of our own inbox, used to re-enqueue early TERMINATEs
    /// and to post the agent-finished signal.
    loopback: Sender<Envelope<V, U>>,
    router: Arc<Router<V, U>>,
    stats: Sender<StatsMsg<V>>,
    directory: Arc<Directory<V>>,
    config: Config,
    version: Box<dyn Version<V, U> + Send>,
    done: FxHashSet<String>,
}

/// The borrowed outbound handle passed into every engine call.
struct AgentPost<'a, V, U> {
    router: &'a Router<V, U>,
    stats: &'a Sender<StatsMsg<V>>,
}

impl<V: Value, U: Utility> Postbox<V, U> for AgentPost<'_, V, U> {
    fn send(&mut self, to: &str, msg: Msg<V, U>) -> Result<(), ProtocolError> {
        self.router.send_to_variable(to, Envelope::Algo(msg))
    }
    fn stats(&mut self, msg: StatsMsg<V>) -> Result<(), ProtocolError> {
        self.stats
            .send(msg)
            .map_err(|_| ProtocolError::ChannelClosed("stats".to_string()))
    }
}

impl<V: Value, U: Utility> Agent<V, U> {
    pub fn new(
        name: impl Into<String>,
        inbox: Receiver<Envelope<V, U>>,
        loopback: Sender<Envelope<V, U>>,
        router: Arc<Router<V, U>>,
        stats: Sender<StatsMsg<V>>,
        directory: Arc<Directory<V>>,
        config: Config,
    ) -> Self {
        Agent {
            name: name.into(),
            engines: FxHashMap::default(),
            inbox,
            loopback,
            router,
            stats,
            directory,
            config,
            version: Box::new(Original),
            done: FxHashSet::default(),
        }
    }

    /// Swaps the algorithm version this agent runs. Must be called before the
    /// first message is processed.
    pub fn with_version(mut self, version: Box<dyn Version<V, U> + Send>) -> Self {
        self.version = version;
        self
    }

    /// Creates the engine for one owned variable.
    pub fn add_variable(&mut self, var: impl Into<String>, domain: Vec<V>) {
        let var = var.into();
        let engine = VariableEngine::new(
            var.clone(),
            domain,
            Arc::clone(&self.directory),
            self.config,
        );
        self.engines.insert(var, engine);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn nb_variables(&self) -> usize {
        self.engines.len()
    }

    /// The agent's event loop: drain the inbox in arrival order until the
    /// agent-finished signal comes around. A protocol error aborts the agent
    /// after logging; nothing is rolled back.
    pub fn run(mut self) -> Result<(), ProtocolError> {
        let outcome = self.event_loop();
        if let Err(e) = &outcome {
            error!("agent {} aborts: {}", self.name, e);
        }
        outcome
    }

    fn event_loop(&mut self) -> Result<(), ProtocolError> {
        while let Ok(env) = self.inbox.recv() {
            match env {
                Envelope::AgentFinished => {
                    debug!("agent {} finished", self.name);
                    break;
                }
                Envelope::Start => {
                    trace!("agent {} started", self.name);
                }
                Envelope::DfsView(view) => {
                    let var = view.var.clone();
                    self.engine_mut(&var)?.on_dfs_view(view);
                    self.try_init(&var)?;
                }
                Envelope::Bounds(bounds) => {
                    let var = bounds.destination().to_string();
                    self.engine_mut(&var)?.on_bounds(bounds);
                    self.try_init(&var)?;
                }
                Envelope::Algo(msg) => self.on_algo(msg)?,
                Envelope::Frame(frame) => {
                    // a frame that does not decode is a transport failure:
                    // fatal to this agent, no recovery attempted
                    let msg = wire::decode(&frame).map_err(ProtocolError::BadFrame)?;
                    self.on_algo(msg)?;
                }
            }
        }
        Ok(())
    }

    fn engine_mut(&mut self, var: &str) -> Result<&mut VariableEngine<V, U>, ProtocolError> {
        self.engines
            .get_mut(var)
            .ok_or_else(|| ProtocolError::UnknownVariable(var.to_string()))
    }

    /// Boots the engine once both its tree view and its bounds are in.
    fn try_init(&mut self, var: &str) -> Result<(), ProtocolError> {
        let engine = self
            .engines
            .get_mut(var)
            .ok_or_else(|| ProtocolError::UnknownVariable(var.to_string()))?;
        if engine.running() || !engine.is_ready() {
            return Ok(());
        }
        let mut post = AgentPost {
            router: &self.router,
            stats: &self.stats,
        };
        if engine.is_singleton() {
            engine.decide_singleton(&mut post)?;
        } else {
            self.version.init(engine, &mut post)?;
        }
        self.note_done(var)
    }

    fn on_algo(&mut self, msg: Msg<V, U>) -> Result<(), ProtocolError> {
        if !self.version.message_kinds().contains(&msg.kind()) {
            debug!(
                "agent {} drops unhandled {:?} for {}",
                self.name,
                msg.kind(),
                msg.receiver()
            );
            return Ok(());
        }
        let var = msg.receiver().to_string();
        let engine = self
            .engines
            .get_mut(&var)
            .ok_or_else(|| ProtocolError::UnknownVariable(var.clone()))?;

        // a TERMINATE that outruns the variable's init is retried in arrival
        // order once the variable is up
        if msg.kind() == MsgKind::Terminate && !engine.running() {
            trace!("agent {} requeues TERMINATE for {}", self.name, var);
            return self
                .loopback
                .send(Envelope::Algo(msg))
                .map_err(|_| ProtocolError::ChannelClosed(self.name.clone()));
        }

        let mut post = AgentPost {
            router: &self.router,
            stats: &self.stats,
        };
        self.version.notify(engine, msg, &mut post)?;
        self.note_done(&var)
    }

    /// Bookkeeping of terminated variables; posts the agent-finished signal
    /// once the last one is done.
    fn note_done(&mut self, var: &str) -> Result<(), ProtocolError> {
        let terminated = self
            .engines
            .get(var)
            .map(VariableEngine::terminated)
            .unwrap_or(false);
        if terminated && self.done.insert(var.to_string()) && self.done.len() == self.engines.len()
        {
            self.loopback
                .send(Envelope::AgentFinished)
                .map_err(|_| ProtocolError::ChannelClosed(self.name.clone()))?;
        }
        Ok(())
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_agent {
    use std::sync::Arc;

    use crossbeam::channel::unbounded;

    use crate::*;

    /// A one-agent world hosting a single leaf-less root variable `x` with a
    /// unary cost table. Enough to drive the dispatcher end to end.
    fn world() -> (
        Agent<i32, u64>,
        Arc<Router<i32, u64>>,
        crossbeam::channel::Receiver<StatsMsg<i32>>,
    ) {
        let mut dir = Directory::new();
        dir.insert("x", "a1", vec![0, 1, 2]);
        let dir = Arc::new(dir);

        let (tx, rx) = unbounded();
        let mut router = Router::new(Arc::clone(&dir), Config::default());
        router.register("a1", tx.clone());
        let router = Arc::new(router);
        let (stx, srx) = unbounded();

        let mut agent = Agent::new(
            "a1",
            rx,
            tx,
            Arc::clone(&router),
            stx,
            dir,
            Config::default(),
        );
        agent.add_variable("x", vec![0, 1, 2]);
        (agent, router, srx)
    }

    fn view() -> DfsView<i32, u64> {
        DfsView {
            var: "x".to_string(),
            parent: None,
            pseudo_parents: vec![],
            children: vec![],
            pseudo_children: vec![],
            spaces: vec![Arc::new(CostTable::new(
                ["x"],
                [(vec![0], 7u64), (vec![1], 3u64), (vec![2], 5u64)],
            ))],
        }
    }

    fn bounds() -> BoundsMsg<i32, u64> {
        BoundsMsg::Own {
            var: "x".to_string(),
            h: [(0, 0u64), (1, 0u64), (2, 0u64)].into_iter().collect(),
        }
    }

    #[test]
    fn a_singleton_agent_runs_to_completion() {
        let (agent, router, stats) = world();
        router.send_to_variable("x", Envelope::DfsView(view())).unwrap();
        router.send_to_variable("x", Envelope::Bounds(bounds())).unwrap();
        router.send_to_agent("a1", Envelope::Start).unwrap();

        agent.run().unwrap();

        let reported: Vec<StatsMsg<i32>> = stats.try_iter().collect();
        assert_eq!(
            vec![StatsMsg::Assignment {
                var: "x".to_string(),
                value: 1
            }],
            reported
        );
    }

    #[test]
    fn a_message_for_an_unknown_variable_aborts_the_agent() {
        let (agent, router, _stats) = world();
        router
            .send_to_agent(
                "a1",
                Envelope::Algo(Msg::Value {
                    sender: "x".to_string(),
                    receiver: "ghost".to_string(),
                    value: 0,
                    threshold: 0,
                    stamp: 1,
                }),
            )
            .unwrap();

        let outcome = agent.run();
        assert_eq!(
            Err(ProtocolError::UnknownVariable("ghost".to_string())),
            outcome
        );
    }

    #[test]
    fn an_early_terminate_is_requeued_until_after_init() {
        let (agent, router, stats) = world();
        // TERMINATE first, then the inputs the variable needs to boot: the
        // dispatcher must park the TERMINATE and serve it afterwards
        let mut ctx = Context::new();
        ctx.put("r", 0, 1);
        router
            .send_to_agent(
                "a1",
                Envelope::Algo(Msg::Terminate {
                    sender: "r".to_string(),
                    receiver: "x".to_string(),
                    context: ctx,
                }),
            )
            .unwrap();
        router.send_to_variable("x", Envelope::DfsView(view())).unwrap();
        router.send_to_variable("x", Envelope::Bounds(bounds())).unwrap();

        agent.run().unwrap();

        let reported: Vec<StatsMsg<i32>> = stats.try_iter().collect();
        assert_eq!(1, reported.len());
    }

    #[test]
    fn a_framed_message_is_decoded_and_dispatched() {
        let (agent, router, stats) = world();
        // same early-TERMINATE exercise, but delivered as an encoded frame
        // the way a framed router would hand it over
        let mut ctx = Context::new();
        ctx.put("r", 0, 1);
        let frame = wire::encode(&Msg::<i32, u64>::Terminate {
            sender: "r".to_string(),
            receiver: "x".to_string(),
            context: ctx,
        });
        router.send_to_agent("a1", Envelope::Frame(frame)).unwrap();
        router.send_to_variable("x", Envelope::DfsView(view())).unwrap();
        router.send_to_variable("x", Envelope::Bounds(bounds())).unwrap();

        agent.run().unwrap();

        let reported: Vec<StatsMsg<i32>> = stats.try_iter().collect();
        assert_eq!(1, reported.len());
    }

    #[test]
    fn a_malformed_frame_aborts_the_agent() {
        let (agent, router, _stats) = world();
        router
            .send_to_agent("a1", Envelope::Frame(vec![0x7f, 1, 2, 3]))
            .unwrap();

        let outcome = agent.run();
        assert_eq!(
            Err(ProtocolError::BadFrame(WireError::BadTag(0x7f))),
            outcome
        );
    }
}
