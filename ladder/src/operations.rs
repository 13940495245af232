use std::collections::{BTreeMap, BTreeSet};

use crate::automaton::StateId;
use crate::grammar::RuleId;
use crate::relations::{Relations, StateSymbol};
use crate::symbol::SymbolId;

/// The DeRemer-Pennello digraph/SCC traversal: given a domain, a relation
/// (edges out of each element) and a base assignment, returns each
/// element's transitive closure under the relation, merged across an SCC in
/// one pass rather than iterated to a fixed point. Used for both `Read`
/// (over the `reads` relation) and `Follow` (over `includes`) — see §4.4.
pub fn digraph<X, T>(
    domain: &[X],
    relation: impl Fn(&X) -> Vec<X>,
    mut base: impl FnMut(&X) -> BTreeSet<T>,
) -> BTreeMap<X, BTreeSet<T>>
where
    X: Ord + Copy,
    T: Ord + Clone,
{
    let mut result: BTreeMap<X, BTreeSet<T>> = BTreeMap::new();
    let mut depth: BTreeMap<X, usize> = BTreeMap::new();
    let mut stack: Vec<X> = Vec::new();

    fn traverse<X, T>(
        x: X,
        relation: &impl Fn(&X) -> Vec<X>,
        base: &mut impl FnMut(&X) -> BTreeSet<T>,
        depth: &mut BTreeMap<X, usize>,
        stack: &mut Vec<X>,
        result: &mut BTreeMap<X, BTreeSet<T>>,
    ) where
        X: Ord + Copy,
        T: Ord + Clone,
    {
        stack.push(x);
        let d = stack.len();
        depth.insert(x, d);
        result.insert(x, base(&x));

        for y in relation(&x) {
            if !depth.contains_key(&y) {
                traverse(y, relation, base, depth, stack, result);
            }
            let dy = depth[&y];
            if dy < depth[&x] {
                depth.insert(x, dy);
            }
            let y_set = result.get(&y).cloned().unwrap_or_default();
            result.get_mut(&x).unwrap().extend(y_set);
        }

        if depth[&x] == d {
            let x_set = result.get(&x).cloned().unwrap_or_default();
            loop {
                let z = stack.pop().unwrap();
                depth.insert(z, usize::MAX);
                result.insert(z, x_set.clone());
                if z == x {
                    break;
                }
            }
        }
    }

    for &x in domain {
        if !depth.contains_key(&x) {
            traverse(x, &relation, &mut base, &mut depth, &mut stack, &mut result);
        }
    }
    result
}

/// `Read` and `Follow`, computed once per automaton over the relations in
/// [`crate::relations`]. `Lookahead` is not stored here since it is only
/// ever needed per `(state, rule)` at table-build time — see
/// [`Operations::lookahead`].
pub struct Operations {
    pub read: BTreeMap<StateSymbol, BTreeSet<SymbolId>>,
    pub follow: BTreeMap<StateSymbol, BTreeSet<SymbolId>>,
}

impl Operations {
    pub fn compute(relations: &Relations) -> Self {
        let mut domain: BTreeSet<StateSymbol> = BTreeSet::new();
        domain.extend(relations.direct_read.keys().copied());
        domain.extend(relations.reads.keys().copied());
        for v in relations.reads.values() {
            domain.extend(v.iter().copied());
        }
        domain.extend(relations.includes.keys().copied());
        for v in relations.includes.values() {
            domain.extend(v.iter().copied());
        }
        let domain: Vec<StateSymbol> = domain.into_iter().collect();

        let read = digraph(
            &domain,
            |x| {
                relations
                    .reads
                    .get(x)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default()
            },
            |x| relations.direct_read.get(x).cloned().unwrap_or_default(),
        );

        let follow = digraph(
            &domain,
            |x| {
                relations
                    .includes
                    .get(x)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default()
            },
            |x| read.get(x).cloned().unwrap_or_default(),
        );

        Self { read, follow }
    }

    /// `Lookahead(q, A→α) = ⋃ { Follow(p,A) : (p,A) ∈ Lookback(q, A→α) }`.
    pub fn lookahead(&self, relations: &Relations, state: StateId, rule: RuleId) -> BTreeSet<SymbolId> {
        let mut result = BTreeSet::new();
        if let Some(sources) = relations.lookback.get(&(state, rule)) {
            for pair in sources {
                if let Some(set) = self.follow.get(pair) {
                    result.extend(set.iter().copied());
                }
            }
        }
        result
    }
}
