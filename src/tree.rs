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

//! This module provides the pseudo-tree construction: a depth-first traversal
//! of the constraint graph that hands every variable its parent, pseudo
//! parents, children and pseudo children, and makes it responsible for the
//! constraint tables whose scope it closes.
//!
//! The traversal is deterministic: the first unvisited variable (in
//! declaration order) roots a component, and neighbours are explored in
//! declaration order too. Priority is DFS discovery order, ancestors first.

use rustc_hash::FxHashMap;

use crate::{CostSpace, Dcop, DfsView, Utility, Value};

/// Builds one `DfsView` per variable of the problem. Disconnected problems
/// yield a forest, one root per component; an isolated variable becomes a
/// singleton view with no neighbours at all.
pub fn build_pseudo_forest<V: Value, U: Utility>(problem: &Dcop<V, U>) -> Vec<DfsView<V, U>> {
    let order: Vec<String> = problem.variables().iter().map(|v| v.name.clone()).collect();
    let rank: FxHashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    // adjacency from the primal graph: two variables are neighbours iff they
    // share a table scope
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for name in &order {
        adjacency.insert(name, vec![]);
    }
    for table in problem.tables() {
        let scope = table.scope();
        for (i, a) in scope.iter().enumerate() {
            for b in scope.iter().skip(i + 1) {
                if a != b {
                    if let Some(neighbours) = adjacency.get_mut(a.as_str()) {
                        neighbours.push(b);
                    }
                    if let Some(neighbours) = adjacency.get_mut(b.as_str()) {
                        neighbours.push(a);
                    }
                }
            }
        }
    }
    for neighbours in adjacency.values_mut() {
        neighbours.sort_unstable_by_key(|n| rank[n]);
        neighbours.dedup();
    }

    // iterative DFS, one root per component
    let mut parent: FxHashMap<&str, Option<&str>> = FxHashMap::default();
    let mut depth: FxHashMap<&str, usize> = FxHashMap::default();
    let mut preorder: FxHashMap<&str, usize> = FxHashMap::default();
    let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    let mut visit = 0usize;

    for root in &order {
        if preorder.contains_key(root.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, Option<&str>)> = vec![(root, None)];
        while let Some((node, from)) = stack.pop() {
            if preorder.contains_key(node) {
                continue;
            }
            preorder.insert(node, visit);
            visit += 1;
            parent.insert(node, from);
            let d = from.map(|f| depth[f] + 1).unwrap_or(0);
            depth.insert(node, d);
            children.entry(node).or_default();
            if let Some(from) = from {
                children.entry(from).or_default().push(node);
            }
            // reversed so the smallest-ranked neighbour is explored first
            for neighbour in adjacency[node].iter().rev() {
                if !preorder.contains_key(*neighbour) {
                    stack.push((neighbour, Some(node)));
                }
            }
        }
    }

    // non-tree edges are back edges (a DFS on an undirected graph produces no
    // cross edges): the shallower endpoint is the pseudo parent of the deeper
    let mut pseudo_parents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    let mut pseudo_children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for name in &order {
        let node = name.as_str();
        for neighbour in &adjacency[node] {
            // consider each edge once, from its deeper endpoint
            if depth[*neighbour] >= depth[node] {
                continue;
            }
            if parent[node] == Some(*neighbour) {
                continue;
            }
            debug_assert!(is_ancestor(&parent, neighbour, node));
            pseudo_parents.entry(node).or_default().push(neighbour);
            pseudo_children.entry(neighbour).or_default().push(node);
        }
    }
    for list in pseudo_parents.values_mut() {
        list.sort_unstable_by_key(|n| preorder[n]);
    }
    for list in pseudo_children.values_mut() {
        list.sort_unstable_by_key(|n| preorder[n]);
    }

    // every table is the responsibility of the deepest variable in its scope
    // (the scope is a clique, so it lies on a single branch)
    let mut spaces: FxHashMap<&str, Vec<std::sync::Arc<dyn CostSpace<V, U>>>> =
        FxHashMap::default();
    for table in problem.tables() {
        if let Some(owner) = table
            .scope()
            .iter()
            .max_by_key(|name| depth[name.as_str()])
        {
            let space: std::sync::Arc<dyn CostSpace<V, U>> = table.clone();
            spaces.entry(owner.as_str()).or_default().push(space);
        }
    }

    order
        .iter()
        .map(|name| {
            let node = name.as_str();
            DfsView {
                var: name.clone(),
                parent: parent[node].map(str::to_string),
                pseudo_parents: collect(&pseudo_parents, node),
                children: children[node].iter().map(|c| c.to_string()).collect(),
                pseudo_children: collect(&pseudo_children, node),
                spaces: spaces.remove(node).unwrap_or_default(),
            }
        })
        .collect()
}

fn collect(map: &FxHashMap<&str, Vec<&str>>, node: &str) -> Vec<String> {
    map.get(node)
        .map(|list| list.iter().map(|n| n.to_string()).collect())
        .unwrap_or_default()
}

fn is_ancestor(parent: &FxHashMap<&str, Option<&str>>, candidate: &str, node: &str) -> bool {
    let mut cursor = parent.get(node).copied().flatten();
    while let Some(up) = cursor {
        if up == candidate {
            return true;
        }
        cursor = parent.get(up).copied().flatten();
    }
    false
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_tree {
    use crate::*;

    fn view<'a>(views: &'a [DfsView<i32, u64>], var: &str) -> &'a DfsView<i32, u64> {
        views.iter().find(|v| v.var == var).unwrap()
    }

    fn chain() -> Dcop<i32, u64> {
        let mut problem = Dcop::new();
        problem.add_variable("x1", vec![0, 1], "a1");
        problem.add_variable("x2", vec![0, 1], "a2");
        problem.add_variable("x3", vec![0, 1], "a3");
        problem.add_table(["x1", "x2"], [(vec![0, 0], 1u64)]);
        problem.add_table(["x2", "x3"], [(vec![0, 0], 1u64)]);
        problem
    }

    #[test]
    fn a_chain_becomes_a_path_rooted_at_the_first_variable() {
        let views = build_pseudo_forest(&chain());
        assert_eq!(None, view(&views, "x1").parent);
        assert_eq!(vec!["x2"], view(&views, "x1").children);
        assert_eq!(Some("x1".to_string()), view(&views, "x2").parent);
        assert_eq!(vec!["x3"], view(&views, "x2").children);
        assert_eq!(Some("x2".to_string()), view(&views, "x3").parent);
        assert!(view(&views, "x3").children.is_empty());
        assert!(views.iter().all(|v| v.pseudo_parents.is_empty()));
    }

    #[test]
    fn tables_go_to_the_deepest_variable_in_scope() {
        let views = build_pseudo_forest(&chain());
        assert!(view(&views, "x1").spaces.is_empty());
        assert_eq!(1, view(&views, "x2").spaces.len());
        assert_eq!(1, view(&views, "x3").spaces.len());
    }

    #[test]
    fn a_cycle_produces_a_back_edge() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("x", vec![0, 1], "a1");
        problem.add_variable("y", vec![0, 1], "a2");
        problem.add_variable("z", vec![0, 1], "a3");
        problem.add_table(["x", "y"], [(vec![0, 0], 1u64)]);
        problem.add_table(["y", "z"], [(vec![0, 0], 1u64)]);
        problem.add_table(["x", "z"], [(vec![0, 0], 1u64)]);

        let views = build_pseudo_forest(&problem);
        // DFS order: x, y, z; the x-z edge closes the cycle
        assert_eq!(vec!["y"], view(&views, "x").children);
        assert_eq!(vec!["z"], view(&views, "y").children);
        assert_eq!(vec!["z"], view(&views, "x").pseudo_children);
        assert_eq!(vec!["x"], view(&views, "z").pseudo_parents);
        // z closes both the y-z and x-z tables
        assert_eq!(2, view(&views, "z").spaces.len());
    }

    #[test]
    fn disconnected_components_each_get_a_root() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("a", vec![0, 1], "a1");
        problem.add_variable("b", vec![0, 1], "a2");
        problem.add_variable("lonely", vec![0, 1], "a3");
        problem.add_table(["a", "b"], [(vec![0, 0], 1u64)]);

        let views = build_pseudo_forest(&problem);
        assert_eq!(None, view(&views, "a").parent);
        assert_eq!(None, view(&views, "lonely").parent);
        assert!(view(&views, "lonely").children.is_empty());
        assert!(view(&views, "lonely").pseudo_parents.is_empty());
    }

    #[test]
    fn unary_tables_stay_with_their_variable() {
        let mut problem: Dcop<i32, u64> = Dcop::new();
        problem.add_variable("s", vec![0, 1, 2], "a1");
        problem.add_table(["s"], [(vec![0], 7u64), (vec![1], 3u64)]);

        let views = build_pseudo_forest(&problem);
        assert_eq!(1, view(&views, "s").spaces.len());
    }
}
