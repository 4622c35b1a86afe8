//! Shared helpers for the integration tests: a brute-force reference solver
//! that enumerates every complete assignment.

use bnb_adopt::Dcop;
use rustc_hash::FxHashMap;

/// The optimal cost of the problem, by exhaustive enumeration. Only suitable
/// for the small instances used in tests.
pub fn brute_force(problem: &Dcop<i32, u64>) -> u64 {
    let vars = problem.variables();
    if vars.is_empty() {
        return 0;
    }
    let domains: Vec<&[i32]> = vars.iter().map(|v| v.domain.as_slice()).collect();
    let mut indices = vec![0usize; vars.len()];
    let mut assignment: FxHashMap<String, i32> = FxHashMap::default();
    let mut best = u64::MAX;
    loop {
        for (i, var) in vars.iter().enumerate() {
            assignment.insert(var.name.clone(), domains[i][indices[i]]);
        }
        best = best.min(problem.eval(&assignment));

        // odometer step over the cartesian product of the domains
        let mut k = 0;
        loop {
            if k == indices.len() {
                return best;
            }
            indices[k] += 1;
            if indices[k] < domains[k].len() {
                break;
            }
            indices[k] = 0;
            k += 1;
        }
    }
}
