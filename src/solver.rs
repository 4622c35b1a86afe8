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

//! This module provides the orchestration layer: the one call that takes a
//! problem, spins up one thread per agent, feeds every variable its tree view
//! and pre-processing bounds, and blocks until the optimal assignment has
//! been gathered.

use std::sync::Arc;

use crossbeam::channel::unbounded;
use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    build_pseudo_forest, zero_bounds, Agent, Config, Dcop, Envelope, Router, SolveError,
    StatsCollector, TracePoint, Utility, Value,
};

/// The result of a complete run: the optimal assignment, its total cost, and
/// (when requested) the assignment history of every variable.
#[derive(Debug, Clone)]
pub struct Outcome<V, U> {
    pub assignment: FxHashMap<String, V>,
    pub cost: U,
    pub traces: FxHashMap<String, Vec<TracePoint<V>>>,
}

/// Solves the given problem to optimality.
///
/// One OS thread is spawned per agent; agents exchange messages over FIFO
/// channels and share nothing mutable. The call returns once every variable
/// reported its final assignment and every agent wound down. There is no
/// internal timeout: on a well-formed problem the search provably
/// terminates, and an outer harness owns the wall-clock policy.
pub fn solve<V: Value, U: Utility>(
    problem: &Dcop<V, U>,
    config: Config,
) -> Result<Outcome<V, U>, SolveError> {
    problem.validate()?;

    let directory = Arc::new(problem.directory());
    let views = build_pseudo_forest(problem);
    let bounds = zero_bounds(problem, &views);

    let agent_names: Vec<String> = directory.agents().map(str::to_string).collect();
    let mut router = Router::new(Arc::clone(&directory), config);
    let mut plumbing = vec![];
    for name in &agent_names {
        let (tx, rx) = unbounded();
        router.register(name.clone(), tx.clone());
        plumbing.push((name.clone(), rx, tx));
    }
    let router = Arc::new(router);
    let (stats_tx, stats_rx) = unbounded();

    let mut agents = vec![];
    for (name, inbox, loopback) in plumbing {
        let mut agent = Agent::new(
            name.clone(),
            inbox,
            loopback,
            Arc::clone(&router),
            stats_tx.clone(),
            Arc::clone(&directory),
            config,
        );
        for var in problem.variables() {
            if var.agent == name {
                agent.add_variable(var.name.clone(), var.domain.clone());
            }
        }
        agents.push(agent);
    }
    // only the agents may keep the stats channel open: the collector must
    // observe a disconnect when they are gone
    drop(stats_tx);

    // channels are unbounded, so the whole setup can be injected before a
    // single agent thread runs
    for view in views {
        let var = view.var.clone();
        router
            .send_to_variable(&var, Envelope::DfsView(view))
            .map_err(|source| SolveError::Agent {
                agent: var.clone(),
                source,
            })?;
    }
    for msg in bounds {
        let var = msg.destination().to_string();
        router
            .send_to_variable(&var, Envelope::Bounds(msg))
            .map_err(|source| SolveError::Agent {
                agent: var.clone(),
                source,
            })?;
    }
    for name in &agent_names {
        router
            .send_to_agent(name, Envelope::Start)
            .map_err(|source| SolveError::Agent {
                agent: name.clone(),
                source,
            })?;
    }

    let mut failures = vec![];
    let gathered = std::thread::scope(|scope| {
        let handles: Vec<_> = agents
            .into_iter()
            .map(|agent| {
                let name = agent.name().to_string();
                (name, scope.spawn(move || agent.run()))
            })
            .collect();

        let collector = StatsCollector::new(stats_rx, directory.nb_variables(), config.convergence);
        let gathered = collector.collect();

        for (name, handle) in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(source)) => failures.push((name, source)),
                Err(_) => debug!("agent {name} panicked"),
            }
        }
        gathered
    });

    if let Some((agent, source)) = failures.into_iter().next() {
        return Err(SolveError::Agent { agent, source });
    }

    let cost = problem.eval(&gathered.assignment);
    debug!(
        "solved: {} variables, total cost {:?}",
        gathered.assignment.len(),
        cost
    );
    Ok(Outcome {
        assignment: gathered.assignment,
        cost,
        traces: gathered.traces,
    })
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// The solver itself is mostly exercised by the end-to-end scenarios under
/// `tests/`; here we only pin down the pre-flight behavior.
#[cfg(test)]
mod test_solver {
    use crate::*;

    #[test]
    fn an_invalid_problem_is_rejected_before_any_thread_spawns() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("x", vec![0, 1], "a1");
        problem.set_objective(Objective::Maximize);

        let outcome = solve(&problem, Config::default());
        assert!(matches!(outcome, Err(SolveError::UnsupportedMaximize)));
    }

    #[test]
    fn a_lone_variable_solves_in_line() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("x", vec![0, 1, 2], "a1");
        problem.add_table(["x"], [(vec![0], 7u64), (vec![1], 3u64), (vec![2], 5u64)]);

        let outcome = solve(&problem, Config::default()).unwrap();
        assert_eq!(Some(&1), outcome.assignment.get("x"));
        assert_eq!(3, outcome.cost);
    }
}
