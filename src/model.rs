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

//! This module provides the problem model: named variables with ordered
//! domains, a partition of the variables among agents, and explicit cost
//! tables. This is the representation the collaborator modules (tree
//! construction, pre-processing, orchestration) work from; the engine itself
//! only ever sees it through the `CostSpace` trait.

use rustc_hash::FxHashMap;

use crate::{CostSpace, Directory, SolveError, Utility, Value};
use std::sync::Arc;

/// The optimization direction. Only minimization is supported; the field
/// exists so that a problem built for maximization is rejected loudly instead
/// of being solved wrongly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    #[default]
    Minimize,
    Maximize,
}

/// One variable of the problem.
#[derive(Debug, Clone)]
pub struct VariableDef<V> {
    pub name: String,
    pub domain: Vec<V>,
    pub agent: String,
}

/// A cost table: an explicit, possibly sparse mapping from assignments of its
/// scope to costs. Combinations absent from the table cost zero.
#[derive(Debug, Clone)]
pub struct CostTable<V, U> {
    scope: Vec<String>,
    entries: FxHashMap<Vec<V>, U>,
}

impl<V: Value, U: Utility> CostTable<V, U> {
    pub fn new<S, E>(scope: S, entries: E) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        E: IntoIterator<Item = (Vec<V>, U)>,
    {
        CostTable {
            scope: scope.into_iter().map(Into::into).collect(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Vec<V>, &U)> {
        self.entries.iter()
    }
}

impl<V: Value, U: Utility> CostSpace<V, U> for CostTable<V, U> {
    fn scope(&self) -> &[String] {
        &self.scope
    }

    fn utility(&self, assignment: &FxHashMap<String, V>) -> U {
        let mut key = Vec::with_capacity(self.scope.len());
        for var in &self.scope {
            match assignment.get(var) {
                Some(value) => key.push(value.clone()),
                None => return U::zero(),
            }
        }
        self.entries.get(&key).copied().unwrap_or_else(U::zero)
    }
}

/// A distributed constraint optimization problem: who owns which variable,
/// which values it ranges over, and the joint cost to minimize.
#[derive(Debug, Clone, Default)]
pub struct Dcop<V, U> {
    objective: Objective,
    variables: Vec<VariableDef<V>>,
    tables: Vec<Arc<CostTable<V, U>>>,
}

impl<V: Value, U: Utility> Dcop<V, U> {
    pub fn new() -> Self {
        Dcop {
            objective: Objective::Minimize,
            variables: vec![],
            tables: vec![],
        }
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: Vec<V>,
        agent: impl Into<String>,
    ) {
        self.variables.push(VariableDef {
            name: name.into(),
            domain,
            agent: agent.into(),
        });
    }

    pub fn add_table<S, E>(&mut self, scope: S, entries: E)
    where
        S: IntoIterator,
        S::Item: Into<String>,
        E: IntoIterator<Item = (Vec<V>, U)>,
    {
        self.tables.push(Arc::new(CostTable::new(scope, entries)));
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
    }

    pub fn variables(&self) -> &[VariableDef<V>] {
        &self.variables
    }
    pub fn tables(&self) -> &[Arc<CostTable<V, U>>] {
        &self.tables
    }
    pub fn nb_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn domain_of(&self, var: &str) -> Option<&[V]> {
        self.variables
            .iter()
            .find(|v| v.name == var)
            .map(|v| v.domain.as_slice())
    }

    /// The owner map and domain registry shared with the agents.
    pub fn directory(&self) -> Directory<V> {
        let mut dir = Directory::new();
        for var in &self.variables {
            dir.insert(var.name.clone(), var.agent.clone(), var.domain.clone());
        }
        dir
    }

    /// Checks the preconditions of the search: minimization only, known
    /// scopes, non-empty domains, and not a single negative cost anywhere
    /// (the lower bounds rely on it).
    pub fn validate(&self) -> Result<(), SolveError> {
        if self.objective == Objective::Maximize {
            return Err(SolveError::UnsupportedMaximize);
        }
        for var in &self.variables {
            if var.domain.is_empty() {
                return Err(SolveError::EmptyDomain(var.name.clone()));
            }
        }
        for table in &self.tables {
            for name in table.scope() {
                if !self.variables.iter().any(|v| &v.name == name) {
                    return Err(SolveError::Dangling(name.clone()));
                }
            }
            for (_, cost) in table.entries() {
                if *cost < U::zero() {
                    return Err(SolveError::NegativeCost {
                        scope: table.scope().to_vec(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The total cost of a complete assignment: the sum of every table's
    /// evaluation. This is what the stats side reports as the optimal cost at
    /// the end of a run.
    pub fn eval(&self, assignment: &FxHashMap<String, V>) -> U {
        self.tables
            .iter()
            .fold(U::zero(), |acc, t| acc.add(t.utility(assignment)))
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_model {
    use crate::*;
    use rustc_hash::FxHashMap;

    fn equality_pair() -> Dcop<i32, u64> {
        let mut problem = Dcop::new();
        problem.add_variable("x", vec![0, 1], "a1");
        problem.add_variable("y", vec![0, 1], "a2");
        problem.add_table(["x", "y"], [(vec![0, 1], 1u64), (vec![1, 0], 1u64)]);
        problem
    }

    #[test]
    fn absent_table_entries_cost_zero() {
        let problem = equality_pair();
        let mut asg = FxHashMap::default();
        asg.insert("x".to_string(), 0);
        asg.insert("y".to_string(), 0);
        assert_eq!(0, problem.eval(&asg));

        asg.insert("y".to_string(), 1);
        assert_eq!(1, problem.eval(&asg));
    }

    #[test]
    fn partially_bound_scopes_cost_zero() {
        let table: CostTable<i32, u64> = CostTable::new(["x", "y"], [(vec![0, 0], 5u64)]);
        let mut asg = FxHashMap::default();
        asg.insert("x".to_string(), 0);
        assert_eq!(0, table.utility(&asg));
    }

    #[test]
    fn a_valid_problem_passes_validation() {
        assert_eq!(Ok(()), equality_pair().validate());
    }

    #[test]
    fn maximization_is_rejected() {
        let mut problem = equality_pair();
        problem.set_objective(Objective::Maximize);
        assert_eq!(Err(SolveError::UnsupportedMaximize), problem.validate());
    }

    #[test]
    fn negative_costs_are_rejected() {
        let mut problem: Dcop<i32, i64> = Dcop::new();
        problem.add_variable("x", vec![0, 1], "a1");
        problem.add_table(["x"], [(vec![0], -3i64)]);
        assert!(matches!(
            problem.validate(),
            Err(SolveError::NegativeCost { .. })
        ));
    }

    #[test]
    fn dangling_scopes_are_rejected() {
        let mut problem = equality_pair();
        problem.add_table(["x", "ghost"], [(vec![0, 0], 1u64)]);
        assert_eq!(
            Err(SolveError::Dangling("ghost".to_string())),
            problem.validate()
        );
    }

    #[test]
    fn empty_domains_are_rejected() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("x", vec![], "a1");
        assert_eq!(
            Err(SolveError::EmptyDomain("x".to_string())),
            problem.validate()
        );
    }

    #[test]
    fn the_directory_mirrors_the_problem() {
        let dir = equality_pair().directory();
        assert_eq!(Some("a1"), dir.owner_of("x"));
        assert_eq!(Some("a2"), dir.owner_of("y"));
        assert_eq!(Some(&[0, 1][..]), dir.domain_of("x"));
    }
}
