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

//! This module provides the bounds table of one variable: for every domain
//! value, the bounds reported by each child together with the context they
//! were reported under, the cached sums of those bounds, and the per-value
//! and aggregate lower/upper bounds derived from them.

use crate::{Context, Utility, Value};

/// The bound bookkeeping attached to a single domain value.
#[derive(Debug, Clone)]
struct Row<V, U> {
    /// Local cost of this value under the current context.
    delta: U,
    /// Pre-processing lower bound `h(self, d)` on the whole subtree cost.
    h: U,
    /// Latest compatible lower bound reported by each child.
    lb: Vec<U>,
    /// Latest compatible upper bound reported by each child.
    ub: Vec<U>,
    /// The context each child bound was reported under. An empty context
    /// means the slot is fresh (or has been reset) and is compatible with
    /// anything.
    ctx: Vec<Context<V>>,
    lb_sum: U,
    ub_sum: U,
    /// `LB(d) = max(h, delta + lb_sum)`
    lb_d: U,
    /// `UB(d) = delta + ub_sum`
    ub_d: U,
}

impl<V: Value, U: Utility> Row<V, U> {
    fn new(nb_children: usize) -> Self {
        Row {
            delta: U::zero(),
            h: U::zero(),
            lb: vec![U::zero(); nb_children],
            ub: vec![U::zero(); nb_children],
            ctx: vec![Context::new(); nb_children],
            lb_sum: U::zero(),
            ub_sum: U::zero(),
            lb_d: U::zero(),
            ub_d: U::zero(),
        }
    }

    /// Full recomputation of the cached sums and derived bounds. The child
    /// arrays are small, so there is no point in maintaining them
    /// incrementally.
    fn refresh(&mut self) {
        self.lb_sum = self.lb.iter().fold(U::zero(), |acc, b| acc.add(*b));
        self.ub_sum = self.ub.iter().fold(U::zero(), |acc, b| acc.add(*b));
        self.lb_d = self.delta.add(self.lb_sum).max(self.h);
        self.ub_d = self.delta.add(self.ub_sum);
    }
}

/// The bounds table of one variable. Rows are indexed by the position of the
/// value in the domain; children by their position among the lower
/// neighbours.
#[derive(Debug, Clone)]
pub struct BoundsTable<V, U> {
    rows: Vec<Row<V, U>>,
    lb: U,
    ub: U,
    lb_idx: usize,
    ub_idx: usize,
}

impl<V: Value, U: Utility> BoundsTable<V, U> {
    pub fn new(nb_values: usize, nb_children: usize) -> Self {
        assert!(nb_values > 0);
        BoundsTable {
            rows: (0..nb_values).map(|_| Row::new(nb_children)).collect(),
            lb: U::zero(),
            ub: U::zero(),
            lb_idx: 0,
            ub_idx: 0,
        }
    }

    pub fn nb_values(&self) -> usize {
        self.rows.len()
    }
    pub fn nb_children(&self) -> usize {
        self.rows[0].lb.len()
    }

    /// Aggregate lower bound: `min_d LB(d)`.
    pub fn lb(&self) -> U {
        self.lb
    }
    /// Aggregate upper bound: `min_d UB(d)`.
    pub fn ub(&self) -> U {
        self.ub
    }
    /// Index of the value achieving `lb()`. Always a concrete value.
    pub fn lb_idx(&self) -> usize {
        self.lb_idx
    }
    /// Index of the value achieving `ub()`. Always a concrete value.
    pub fn ub_idx(&self) -> usize {
        self.ub_idx
    }
    pub fn lb_of(&self, value: usize) -> U {
        self.rows[value].lb_d
    }
    pub fn ub_of(&self, value: usize) -> U {
        self.rows[value].ub_d
    }
    pub fn delta_of(&self, value: usize) -> U {
        self.rows[value].delta
    }
    pub fn lb_sum_of(&self, value: usize) -> U {
        self.rows[value].lb_sum
    }
    pub fn ub_sum_of(&self, value: usize) -> U {
        self.rows[value].ub_sum
    }
    pub fn h_of(&self, value: usize) -> U {
        self.rows[value].h
    }
    pub fn child_lb(&self, value: usize, child: usize) -> U {
        self.rows[value].lb[child]
    }
    pub fn child_ub(&self, value: usize, child: usize) -> U {
        self.rows[value].ub[child]
    }
    pub fn child_ctx(&self, value: usize, child: usize) -> &Context<V> {
        &self.rows[value].ctx[child]
    }

    /// Stores the pre-processing bound for one value.
    pub fn set_h(&mut self, value: usize, h: U) {
        self.rows[value].h = h;
        self.rows[value].refresh();
    }

    /// Stores the local cost of one value under the current context.
    pub fn set_delta(&mut self, value: usize, delta: U) {
        self.rows[value].delta = delta;
        self.rows[value].refresh();
    }

    /// Puts one (value, child) slot in its fresh state: no information from
    /// the child, hence the vacuous `[0, +∞]` interval. The per-child
    /// pre-processing bound is deliberately not written here: it is dominated
    /// by the `max` with `h(self, d)` inside `LB(d)`, and zero keeps the slot
    /// indistinguishable from a reset one.
    pub fn init_child(&mut self, value: usize, child: usize) {
        let row = &mut self.rows[value];
        row.lb[child] = U::zero();
        row.ub[child] = U::plus_inf();
        row.refresh();
    }

    /// Merges a child report into one slot: the lower bound may only grow and
    /// the upper bound only shrink, so bounds tighten monotonically as long
    /// as the context stands.
    pub fn update(&mut self, value: usize, child: usize, new_lb: U, new_ub: U) {
        let row = &mut self.rows[value];
        row.lb[child] = row.lb[child].max(new_lb);
        row.ub[child] = row.ub[child].min(new_ub);
        row.refresh();
    }

    /// Saves the context a child bound was reported under.
    pub fn save_ctx(&mut self, value: usize, child: usize, ctx: Context<V>) {
        self.rows[value].ctx[child] = ctx;
    }

    /// Forgets everything a child reported for one value: bounds back to
    /// `[0, +∞]`, saved context cleared.
    pub fn reset(&mut self, value: usize, child: usize) {
        let row = &mut self.rows[value];
        row.lb[child] = U::zero();
        row.ub[child] = U::plus_inf();
        row.ctx[child] = Context::new();
        row.refresh();
    }

    /// Refreshes the aggregate bounds and their argmins from the per-value
    /// rows. Ties are broken by domain iteration order, so the argmins always
    /// denote a concrete domain value even when every bound is infinite.
    pub fn recompute_aggregates(&mut self) {
        let mut lb_idx = 0;
        let mut ub_idx = 0;
        for (i, row) in self.rows.iter().enumerate().skip(1) {
            if row.lb_d < self.rows[lb_idx].lb_d {
                lb_idx = i;
            }
            if row.ub_d < self.rows[ub_idx].ub_d {
                ub_idx = i;
            }
        }
        self.lb_idx = lb_idx;
        self.ub_idx = ub_idx;
        self.lb = self.rows[lb_idx].lb_d;
        self.ub = self.rows[ub_idx].ub_d;
    }

    /// Accounting self-check: the cached sums match their definitions, the
    /// derived bounds match theirs, and the aggregates are true argmins.
    /// Handlers run this under `debug_assertions` after every mutation batch.
    pub fn consistent(&self) -> bool {
        for row in self.rows.iter() {
            let lb_sum = row.lb.iter().fold(U::zero(), |acc, b| acc.add(*b));
            let ub_sum = row.ub.iter().fold(U::zero(), |acc, b| acc.add(*b));
            if row.lb_sum != lb_sum || row.ub_sum != ub_sum {
                return false;
            }
            if row.lb_d != row.delta.add(lb_sum).max(row.h) {
                return false;
            }
            if row.ub_d != row.delta.add(ub_sum) {
                return false;
            }
            if !row.ub_d.is_inf() && row.lb_d > row.ub_d {
                return false;
            }
        }
        let lb = self.rows.iter().map(|r| r.lb_d).min().unwrap();
        let ub = self.rows.iter().map(|r| r.ub_d).min().unwrap();
        self.lb == lb
            && self.ub == ub
            && self.rows[self.lb_idx].lb_d == lb
            && self.rows[self.ub_idx].ub_d == ub
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_bounds {
    use crate::*;

    fn table() -> BoundsTable<i32, u64> {
        // three values, two children
        let mut table = BoundsTable::new(3, 2);
        for value in 0..3 {
            for child in 0..2 {
                table.init_child(value, child);
            }
        }
        table.recompute_aggregates();
        table
    }

    #[test]
    fn fresh_slots_hold_the_vacuous_interval() {
        let table = table();
        for value in 0..3 {
            for child in 0..2 {
                assert_eq!(0, table.child_lb(value, child));
                assert_eq!(u64::plus_inf(), table.child_ub(value, child));
                assert!(table.child_ctx(value, child).is_empty());
            }
            assert_eq!(0, table.lb_of(value));
            assert_eq!(u64::plus_inf(), table.ub_of(value));
        }
        assert!(table.consistent());
    }

    #[test]
    fn update_tightens_but_never_loosens() {
        let mut table = table();
        table.update(0, 0, 5, 10);
        assert_eq!(5, table.child_lb(0, 0));
        assert_eq!(10, table.child_ub(0, 0));

        // a looser report must not undo the tighter one
        table.update(0, 0, 3, 20);
        assert_eq!(5, table.child_lb(0, 0));
        assert_eq!(10, table.child_ub(0, 0));

        // a tighter one still applies
        table.update(0, 0, 7, 8);
        assert_eq!(7, table.child_lb(0, 0));
        assert_eq!(8, table.child_ub(0, 0));
        assert!(table.consistent());
    }

    #[test]
    fn sums_match_the_child_arrays() {
        let mut table = table();
        table.update(1, 0, 3, 6);
        table.update(1, 1, 2, 4);
        table.recompute_aggregates();

        assert_eq!(5, table.lb_sum_of(1));
        assert_eq!(10, table.ub_sum_of(1));
        assert_eq!(5, table.lb_of(1));
        assert_eq!(10, table.ub_of(1));
        assert!(table.consistent());
    }

    #[test]
    fn delta_and_h_feed_the_per_value_bounds() {
        let mut table = table();
        table.set_delta(2, 4);
        table.update(2, 0, 1, 2);
        table.update(2, 1, 1, 3);
        assert_eq!(4 + 2, table.lb_of(2));
        assert_eq!(4 + 5, table.ub_of(2));

        // a dominating preprocessing bound lifts LB(d) but not UB(d)
        table.set_h(2, 100);
        assert_eq!(100, table.lb_of(2));
        assert_eq!(9, table.ub_of(2));
    }

    #[test]
    fn reset_restores_the_fresh_state() {
        let mut table = table();
        let mut ctx = Context::new();
        ctx.put("p", 1, 1);
        table.update(0, 1, 5, 9);
        table.save_ctx(0, 1, ctx);

        table.reset(0, 1);
        assert_eq!(0, table.child_lb(0, 1));
        assert_eq!(u64::plus_inf(), table.child_ub(0, 1));
        assert!(table.child_ctx(0, 1).is_empty());
        assert!(table.consistent());
    }

    #[test]
    fn aggregates_are_first_argmins() {
        let mut table = table();
        for value in 0..3 {
            table.update(value, 0, 0, 7);
            table.update(value, 1, 0, 0);
        }
        table.set_delta(0, 3);
        table.set_delta(1, 2);
        table.set_delta(2, 2);
        table.recompute_aggregates();

        // values 1 and 2 tie; iteration order keeps the first
        assert_eq!(1, table.lb_idx());
        assert_eq!(1, table.ub_idx());
        assert_eq!(2, table.lb());
        assert_eq!(9, table.ub());
    }

    #[test]
    fn all_infinite_rows_still_name_a_concrete_argmin() {
        let mut table = BoundsTable::<i32, u64>::new(2, 1);
        table.init_child(0, 0);
        table.init_child(1, 0);
        table.set_delta(0, u64::plus_inf());
        table.set_delta(1, u64::plus_inf());
        table.recompute_aggregates();

        assert_eq!(0, table.lb_idx());
        assert_eq!(0, table.ub_idx());
        assert!(table.consistent());
    }

    #[test]
    fn childless_tables_reduce_to_delta_and_h() {
        let mut table = BoundsTable::<i32, u64>::new(2, 0);
        table.set_delta(0, 7);
        table.set_delta(1, 3);
        table.set_h(1, 4);
        table.recompute_aggregates();

        assert_eq!(4, table.lb_of(1));
        assert_eq!(3, table.ub_of(1));
        assert_eq!(7, table.lb_of(0));
        assert_eq!(7, table.ub());
        // the h bound may push LB(d) above UB(d); only UB feeds ub()
        assert_eq!(4, table.lb());
    }
}
