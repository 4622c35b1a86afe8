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

//! This module provides the stats gathering end of a run: it drains the
//! assignment (and, optionally, convergence trace) messages the variables
//! emit as they terminate, and hands the aggregate back to the caller.

use crossbeam::channel::Receiver;
use log::trace;
use rustc_hash::FxHashMap;

use crate::{StatsMsg, TracePoint, Value};

/// What the collector gathered by the end of a run.
#[derive(Debug, Clone, Default)]
pub struct Gathered<V> {
    pub assignment: FxHashMap<String, V>,
    pub traces: FxHashMap<String, Vec<TracePoint<V>>>,
}

/// Drains the stats channel until every expected variable reported. If the
/// channel disconnects early (every agent gone, some of them without
/// reporting), the partial aggregate is returned as is and the caller decides
/// what the missing entries mean.
pub struct StatsCollector<V> {
    inbox: Receiver<StatsMsg<V>>,
    expected: usize,
    convergence: bool,
}

impl<V: Value> StatsCollector<V> {
    pub fn new(inbox: Receiver<StatsMsg<V>>, expected: usize, convergence: bool) -> Self {
        StatsCollector {
            inbox,
            expected,
            convergence,
        }
    }

    fn complete(&self, gathered: &Gathered<V>) -> bool {
        gathered.assignment.len() == self.expected
            && (!self.convergence || gathered.traces.len() == self.expected)
    }

    pub fn collect(self) -> Gathered<V> {
        let mut gathered = Gathered {
            assignment: FxHashMap::default(),
            traces: FxHashMap::default(),
        };
        while !self.complete(&gathered) {
            match self.inbox.recv() {
                Ok(StatsMsg::Assignment { var, value }) => {
                    trace!("assignment {var} = {value:?}");
                    gathered.assignment.insert(var, value);
                }
                Ok(StatsMsg::Trace { var, history }) => {
                    gathered.traces.insert(var, history);
                }
                Err(_) => break,
            }
        }
        gathered
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_stats {
    use crossbeam::channel::unbounded;

    use crate::*;

    #[test]
    fn collection_stops_once_every_variable_reported() {
        let (tx, rx) = unbounded();
        tx.send(StatsMsg::Assignment {
            var: "x".to_string(),
            value: 1,
        })
        .unwrap();
        tx.send(StatsMsg::Assignment {
            var: "y".to_string(),
            value: 0,
        })
        .unwrap();

        let gathered = StatsCollector::new(rx, 2, false).collect();
        assert_eq!(2, gathered.assignment.len());
        assert_eq!(Some(&1), gathered.assignment.get("x"));
    }

    #[test]
    fn convergence_mode_also_waits_for_the_traces() {
        let (tx, rx) = unbounded();
        tx.send(StatsMsg::Assignment {
            var: "x".to_string(),
            value: 1,
        })
        .unwrap();
        tx.send(StatsMsg::Trace {
            var: "x".to_string(),
            history: vec![TracePoint { micros: 0, value: 1 }],
        })
        .unwrap();

        let gathered = StatsCollector::new(rx, 1, true).collect();
        assert_eq!(1, gathered.assignment.len());
        assert_eq!(1, gathered.traces.len());
    }

    #[test]
    fn a_disconnected_channel_yields_the_partial_aggregate() {
        let (tx, rx) = unbounded::<StatsMsg<i32>>();
        tx.send(StatsMsg::Assignment {
            var: "x".to_string(),
            value: 1,
        })
        .unwrap();
        drop(tx);

        let gathered = StatsCollector::new(rx, 5, false).collect();
        assert_eq!(1, gathered.assignment.len());
    }
}
