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

//! This module provides the in-process transport: one unbounded FIFO channel
//! per agent, and the router that resolves a destination variable to the
//! mailbox of its owning agent.
//!
//! Channels guarantee exactly what the algorithm needs from its transport:
//! per-sender-per-receiver FIFO delivery, no loss, no spontaneous
//! duplication. Nothing is assumed about cross-pair ordering.

use std::sync::Arc;

use crossbeam::channel::Sender;
use rustc_hash::FxHashMap;

use crate::wire;
use crate::{Config, Directory, Envelope, ProtocolError, Utility, Value};

/// Resolves variable names to agent mailboxes. Built once before the agents
/// start, read-only afterwards (every agent holds it behind an `Arc`).
#[derive(Debug)]
pub struct Router<V, U> {
    directory: Arc<Directory<V>>,
    mailboxes: FxHashMap<String, Sender<Envelope<V, U>>>,
    /// Algorithm messages go out twice back-to-back on their link; control
    /// traffic is never duplicated.
    duplicate: bool,
    /// Algorithm messages are encoded into frames before they hit the
    /// channel; the receiving dispatcher decodes them.
    framed: bool,
}

impl<V: Value, U: Utility> Router<V, U> {
    pub fn new(directory: Arc<Directory<V>>, config: Config) -> Self {
        Router {
            directory,
            mailboxes: FxHashMap::default(),
            duplicate: config.duplicate_delivery,
            framed: config.framed_transport,
        }
    }

    /// Registers the inbox of one agent.
    pub fn register(&mut self, agent: impl Into<String>, inbox: Sender<Envelope<V, U>>) {
        self.mailboxes.insert(agent.into(), inbox);
    }

    pub fn directory(&self) -> &Arc<Directory<V>> {
        &self.directory
    }

    /// Delivers an envelope to the agent owning the named variable. An
    /// unknown variable is a wiring bug upstream and is fatal.
    pub fn send_to_variable(&self, var: &str, env: Envelope<V, U>) -> Result<(), ProtocolError> {
        let agent = self
            .directory
            .owner_of(var)
            .ok_or_else(|| ProtocolError::UnknownVariable(var.to_string()))?;
        self.send_to_agent(agent, env)
    }

    /// Delivers an envelope straight to an agent's inbox.
    ///
    /// An agent drops its inbox when all its variables have terminated, and
    /// termination races message emission elsewhere in the tree: algorithm
    /// traffic towards a wound-down agent is moot and silently discarded.
    /// A closed channel is only an error for control envelopes, which must
    /// reach a live agent.
    pub fn send_to_agent(&self, agent: &str, env: Envelope<V, U>) -> Result<(), ProtocolError> {
        let inbox = self
            .mailboxes
            .get(agent)
            .ok_or_else(|| ProtocolError::ChannelClosed(agent.to_string()))?;
        let env = match env {
            Envelope::Algo(msg) if self.framed => Envelope::Frame(wire::encode(&msg)),
            other => other,
        };
        let algo = matches!(env, Envelope::Algo(_) | Envelope::Frame(_));
        if self.duplicate && algo && inbox.send(env.clone()).is_err() {
            log::trace!("agent {agent} is gone; message dropped");
            return Ok(());
        }
        match inbox.send(env) {
            Ok(()) => Ok(()),
            Err(_) if algo => {
                log::trace!("agent {agent} is gone; message dropped");
                Ok(())
            }
            Err(_) => Err(ProtocolError::ChannelClosed(agent.to_string())),
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_router {
    use std::sync::Arc;

    use crossbeam::channel::unbounded;

    use crate::*;

    fn directory() -> Arc<Directory<i32>> {
        let mut dir = Directory::new();
        dir.insert("x", "a1", vec![0, 1]);
        dir.insert("y", "a2", vec![0, 1]);
        Arc::new(dir)
    }

    fn value_msg() -> Envelope<i32, u64> {
        Envelope::Algo(Msg::Value {
            sender: "x".to_string(),
            receiver: "y".to_string(),
            value: 0,
            threshold: 0,
            stamp: 1,
        })
    }

    #[test]
    fn messages_reach_the_owner_of_the_destination_variable() {
        let mut router = Router::new(directory(), Config::default());
        let (tx1, rx1) = unbounded();
        let (tx2, rx2) = unbounded();
        router.register("a1", tx1);
        router.register("a2", tx2);

        router.send_to_variable("y", value_msg()).unwrap();
        assert!(rx1.is_empty());
        assert_eq!(1, rx2.len());
    }

    #[test]
    fn an_unknown_variable_is_fatal() {
        let mut router = Router::new(directory(), Config::default());
        let (tx, _rx) = unbounded();
        router.register("a1", tx);

        let outcome = router.send_to_variable("nope", value_msg());
        assert_eq!(
            Err(ProtocolError::UnknownVariable("nope".to_string())),
            outcome
        );
    }

    #[test]
    fn duplicate_mode_doubles_algorithm_traffic_only() {
        let mut router = Router::new(directory(), Config::default().with_duplicate_delivery());
        let (tx2, rx2) = unbounded();
        router.register("a2", tx2);

        router.send_to_variable("y", value_msg()).unwrap();
        assert_eq!(2, rx2.len());

        router.send_to_agent("a2", Envelope::Start).unwrap();
        assert_eq!(3, rx2.len());
    }

    #[test]
    fn framed_mode_carries_algorithm_messages_as_decodable_frames() {
        let mut router = Router::new(directory(), Config::default().with_framed_transport());
        let (tx2, rx2) = unbounded();
        router.register("a2", tx2);

        let msg = match value_msg() {
            Envelope::Algo(msg) => msg,
            _ => unreachable!(),
        };
        router
            .send_to_variable("y", Envelope::Algo(msg.clone()))
            .unwrap();
        match rx2.recv().unwrap() {
            Envelope::Frame(frame) => {
                assert_eq!(msg, wire::decode::<i32, u64>(&frame).unwrap());
            }
            other => panic!("expected a frame, got {other:?}"),
        }

        // control traffic is never framed
        router.send_to_agent("a2", Envelope::Start).unwrap();
        assert!(matches!(rx2.recv().unwrap(), Envelope::Start));
    }

    #[test]
    fn per_link_delivery_preserves_send_order() {
        let mut router: Router<i32, u64> = Router::new(directory(), Config::default());
        let (tx2, rx2) = unbounded();
        router.register("a2", tx2);

        for stamp in 1..=5u64 {
            router
                .send_to_variable(
                    "y",
                    Envelope::Algo(Msg::Value {
                        sender: "x".to_string(),
                        receiver: "y".to_string(),
                        value: 0,
                        threshold: 0,
                        stamp,
                    }),
                )
                .unwrap();
        }
        let stamps: Vec<u64> = rx2
            .try_iter()
            .map(|env| match env {
                Envelope::Algo(Msg::Value { stamp, .. }) => stamp,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(vec![1, 2, 3, 4, 5], stamps);
    }
}
