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

//! This module provides the context store: a variable's current belief about
//! its ancestors' assignments, and the compatibility test that decides
//! whether child-reported bounds are still meaningful.

use rustc_hash::FxHashMap;

use crate::Stamped;

/// A mapping from variable names to stamped values. The same type serves as
/// the per-variable context store, as the context attached to COST and
/// TERMINATE messages, and as the context saved alongside each child-reported
/// bound.
///
/// Merging is last-write-wins by strictly greater stamp, which makes the
/// store track the most recent assignment per ancestor no matter in which
/// order racing messages are delivered. Equal stamps are idempotent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context<V> {
    entries: FxHashMap<String, Stamped<V>>,
}

impl<V: Clone + Eq> Context<V> {
    pub fn new() -> Self {
        Context {
            entries: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn get(&self, var: &str) -> Option<&Stamped<V>> {
        self.entries.get(var)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Stamped<V>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Unconditionally writes an entry. This is only appropriate when the
    /// store is being (re)built wholesale; message handling goes through
    /// `priority_merge`.
    pub fn put(&mut self, var: impl Into<String>, value: V, stamp: u64) {
        self.entries.insert(var.into(), Stamped { value, stamp });
    }

    /// Writes an entry only if the variable has no entry yet. Used for the
    /// placeholder assignments installed at init time, which must never
    /// clobber a real VALUE that arrived early.
    pub fn put_if_absent(&mut self, var: impl Into<String>, value: V, stamp: u64) {
        self.entries
            .entry(var.into())
            .or_insert(Stamped { value, stamp });
    }

    pub fn remove(&mut self, var: &str) -> Option<Stamped<V>> {
        self.entries.remove(var)
    }

    /// Merges one claim into the store: the entry is written iff the variable
    /// is unknown or its stored stamp is strictly less than `stamp`. Returns
    /// whether the store changed.
    pub fn priority_merge(&mut self, var: &str, value: V, stamp: u64) -> bool {
        match self.entries.get_mut(var) {
            Some(entry) => {
                if stamp <= entry.stamp {
                    false
                } else {
                    *entry = Stamped { value, stamp };
                    true
                }
            }
            None => {
                self.entries
                    .insert(var.to_string(), Stamped { value, stamp });
                true
            }
        }
    }

    /// Merges every entry of `other` whose key satisfies none of the
    /// exclusions, each with `priority_merge` semantics. Returns whether any
    /// entry was written.
    pub fn priority_merge_many(&mut self, other: &Context<V>, exclude: &[String]) -> bool {
        let mut changed = false;
        for (var, claim) in other.entries.iter() {
            if exclude.iter().any(|x| x == var) {
                continue;
            }
            changed |= self.priority_merge(var, claim.value.clone(), claim.stamp);
        }
        changed
    }

    /// Two contexts are compatible iff they agree on the value of every
    /// variable present in both. Stamps play no part in this test: a claim
    /// about the same value is the same claim, however old.
    pub fn compatible(&self, other: &Context<V>) -> bool {
        for (var, claim) in self.entries.iter() {
            if let Some(theirs) = other.entries.get(var) {
                if claim.value != theirs.value {
                    return false;
                }
            }
        }
        true
    }

    /// A copy of this context restricted to the keys for which `keep` holds.
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> Context<V> {
        Context {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_context {
    use crate::*;

    #[test]
    fn merge_writes_unknown_variables() {
        let mut ctx: Context<i32> = Context::new();
        assert!(ctx.priority_merge("x", 3, 1));
        assert_eq!(3, ctx.get("x").unwrap().value);
        assert_eq!(1, ctx.get("x").unwrap().stamp);
    }

    #[test]
    fn merge_keeps_the_strictly_greater_stamp() {
        let mut ctx: Context<i32> = Context::new();
        ctx.priority_merge("x", 3, 5);

        assert!(!ctx.priority_merge("x", 9, 4));
        assert!(!ctx.priority_merge("x", 9, 5));
        assert_eq!(3, ctx.get("x").unwrap().value);

        assert!(ctx.priority_merge("x", 9, 6));
        assert_eq!(9, ctx.get("x").unwrap().value);
    }

    #[test]
    fn stored_stamps_never_decrease() {
        let mut ctx: Context<i32> = Context::new();
        let updates = [(1, 0), (3, 1), (2, 0), (3, 7), (5, 2), (4, 9)];

        let mut last = 0;
        for (stamp, value) in updates {
            ctx.priority_merge("x", value, stamp);
            let stored = ctx.get("x").unwrap().stamp;
            assert!(stored >= last);
            last = stored;
        }
        assert_eq!(5, last);
    }

    #[test]
    fn placeholders_do_not_clobber_existing_entries() {
        let mut ctx: Context<i32> = Context::new();
        ctx.priority_merge("x", 1, 1);
        ctx.put_if_absent("x", 0, 0);
        ctx.put_if_absent("y", 0, 0);

        assert_eq!(1, ctx.get("x").unwrap().value);
        assert_eq!(0, ctx.get("y").unwrap().value);
    }

    #[test]
    fn merge_many_honours_the_exclusions() {
        let mut store: Context<i32> = Context::new();
        let mut other: Context<i32> = Context::new();
        other.put("a", 1, 1);
        other.put("b", 2, 1);
        other.put("c", 3, 1);

        let changed = store.priority_merge_many(&other, &["b".to_string()]);
        assert!(changed);
        assert_eq!(2, store.len());
        assert!(store.get("b").is_none());
    }

    #[test]
    fn merge_many_reports_no_change_on_stale_claims() {
        let mut store: Context<i32> = Context::new();
        store.put("a", 1, 5);
        let mut other: Context<i32> = Context::new();
        other.put("a", 7, 3);

        assert!(!store.priority_merge_many(&other, &[]));
        assert_eq!(1, store.get("a").unwrap().value);
    }

    #[test]
    fn disjoint_contexts_are_compatible() {
        let mut a: Context<i32> = Context::new();
        a.put("x", 1, 1);
        let mut b: Context<i32> = Context::new();
        b.put("y", 2, 1);

        assert!(a.compatible(&b));
        assert!(b.compatible(&a));
    }

    #[test]
    fn compatibility_ignores_stamps() {
        let mut a: Context<i32> = Context::new();
        a.put("x", 1, 1);
        let mut b: Context<i32> = Context::new();
        b.put("x", 1, 99);

        assert!(a.compatible(&b));
    }

    #[test]
    fn value_disagreement_makes_contexts_incompatible() {
        let mut a: Context<i32> = Context::new();
        a.put("x", 1, 1);
        a.put("y", 2, 1);
        let mut b: Context<i32> = Context::new();
        b.put("y", 3, 1);

        assert!(!a.compatible(&b));
        assert!(!b.compatible(&a));
    }

    #[test]
    fn the_empty_context_is_compatible_with_everything() {
        let empty: Context<i32> = Context::new();
        let mut b: Context<i32> = Context::new();
        b.put("x", 1, 1);

        assert!(empty.compatible(&b));
        assert!(b.compatible(&empty));
    }

    #[test]
    fn filtered_keeps_only_matching_keys() {
        let mut ctx: Context<i32> = Context::new();
        ctx.put("x", 1, 1);
        ctx.put("y", 2, 1);

        let kept = ctx.filtered(|k| k != "y");
        assert_eq!(1, kept.len());
        assert!(kept.get("x").is_some());
    }
}
