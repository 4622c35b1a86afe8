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

//! # BnB-ADOPT
//! A generic framework to build asynchronous branch-and-bound solvers for
//! distributed constraint optimization problems (DCOP) in Rust. A DCOP is a
//! set of variables partitioned among agents with a joint, non-negative cost
//! to minimize; this library implements the complete asynchronous search of
//! Yeoh, Felner and Koenig ("BnB-ADOPT: an asynchronous branch-and-bound DCOP
//! algorithm", AAMAS'08): agents exchange VALUE, COST and TERMINATE messages
//! along a depth-first pseudo-tree and terminate with a provably optimal
//! assignment.
//!
//! ## Side benefit
//! Agents share nothing mutable: each one runs on its own thread behind a
//! FIFO mailbox, so a multi-agent problem naturally spreads over your cores.
//!
//! ## Quick Example
//! The following solves the smallest interesting problem there is: two
//! agents, one variable each, paying 1 whenever the two variables disagree.
//!
//! ```
//! use bnb_adopt::*;
//!
//! // 1. Describe the problem: variables, owners, and cost tables
//! let mut problem: Dcop<i32, u64> = Dcop::new();
//! problem.add_variable("x", vec![0, 1], "agent-1");
//! problem.add_variable("y", vec![0, 1], "agent-2");
//! problem.add_table(["x", "y"], [(vec![0, 1], 1u64), (vec![1, 0], 1u64)]);
//!
//! // 2. Run the search to optimality
//! let outcome = solve(&problem, Config::default()).unwrap();
//!
//! // 3. Both variables agree, at total cost zero
//! assert_eq!(0, outcome.cost);
//! assert_eq!(outcome.assignment["x"], outcome.assignment["y"]);
//! ```
//!
//! ## Going further
//! The pieces compose the way the modules do: `Dcop` (or anything that can
//! produce `DfsView`s and `CostSpace`s) describes the problem,
//! `build_pseudo_forest` shapes the agent hierarchy, `Agent` hosts one or
//! more `VariableEngine`s behind a mailbox, and `solve` wires it all up. The
//! search itself is generic over the value type (`Value`) and the cost type
//! (`Utility`), and alternative variants of the algorithm plug in through the
//! `Version` trait.

mod abstraction;
mod common;
mod implementation;
mod model;
mod preprocess;
mod solver;
mod tree;

pub use abstraction::*;
pub use common::*;
pub use implementation::*;
pub use model::*;
pub use preprocess::*;
pub use solver::*;
pub use tree::*;
