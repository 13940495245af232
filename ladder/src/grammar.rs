use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::GrammarError;
use crate::symbol::{Associativity, Precedence, Symbol, SymbolId, SymbolKind};

/// Dense, zero-based identity of a [`Rule`] within a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

pub type Action<V> = Box<dyn Fn(Vec<V>) -> V>;

pub struct Rule<V> {
    pub id: RuleId,
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub action: Option<Action<V>>,
    pub precedence: Option<Precedence>,
    pub is_start: bool,
    /// `Some(k)` marks this as a synthetic `Mᵢ → ε` rule produced by
    /// mid-rule-action desugaring (§4.7); `k` is the number of rhs symbols
    /// to its left in the production it was extracted from, i.e. how many
    /// already-pushed stack values the driver must pass to `action`
    /// *without popping them*.
    pub midrule_size: Option<usize>,
}

impl<V> fmt::Debug for Rule<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .field("is_start", &self.is_start)
            .field("midrule_size", &self.midrule_size)
            .finish()
    }
}

/// One element of a production's right-hand side as declared by the
/// embedder: either a grammar symbol, or an embedded semantic action fired
/// at that point in a right-to-left sense (§4.7). Used with
/// [`Grammar::add_production`]; plain productions with no embedded actions
/// should just use [`Grammar::add_rule`].
pub enum Part<V> {
    Symbol(SymbolId),
    Action(Box<dyn Fn(&[V]) -> V>),
}

/// Owns every [`Symbol`] and [`Rule`] in a grammar and answers Empty/First
/// on arbitrary symbol strings, memoized per symbol with a visited-lhs guard
/// against left-recursive cycles (§4.1).
pub struct Grammar<V> {
    symbols: Vec<Symbol>,
    name_to_symbol: BTreeMap<String, SymbolId>,
    rules: Vec<Rule<V>>,
    rules_by_lhs: BTreeMap<SymbolId, Vec<RuleId>>,
    start_symbol: Option<SymbolId>,
    start_rule: Option<RuleId>,
    augmented_start: SymbolId,
    end_symbol: SymbolId,
    next_midrule: u32,
    empty_memo: RefCell<BTreeMap<SymbolId, bool>>,
    first_memo: RefCell<BTreeMap<SymbolId, BTreeSet<SymbolId>>>,
}

impl<V> Default for Grammar<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Grammar<V> {
    pub fn new() -> Self {
        let end_symbol = Symbol {
            id: SymbolId(0),
            name: "@end".to_string(),
            kind: SymbolKind::End,
            description: None,
            precedence: None,
        };
        let augmented_start = Symbol {
            id: SymbolId(1),
            name: "@start".to_string(),
            kind: SymbolKind::Nonterminal,
            description: None,
            precedence: None,
        };
        Self {
            symbols: vec![end_symbol, augmented_start],
            name_to_symbol: BTreeMap::new(),
            rules: Vec::new(),
            rules_by_lhs: BTreeMap::new(),
            start_symbol: None,
            start_rule: None,
            augmented_start: SymbolId(1),
            end_symbol: SymbolId(0),
            next_midrule: 0,
            empty_memo: RefCell::new(BTreeMap::new()),
            first_memo: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn end_symbol(&self) -> SymbolId {
        self.end_symbol
    }

    pub fn augmented_start(&self) -> SymbolId {
        self.augmented_start
    }

    pub fn start_symbol(&self) -> Option<SymbolId> {
        self.start_symbol
    }

    pub fn start_rule(&self) -> Option<RuleId> {
        self.start_rule
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn rule(&self, id: RuleId) -> &Rule<V> {
        &self.rules[id.0 as usize]
    }

    pub fn rules(&self) -> &[Rule<V>] {
        &self.rules
    }

    pub fn rules_for_lhs(&self, lhs: SymbolId) -> &[RuleId] {
        self.rules_by_lhs.get(&lhs).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Declares a symbol, or returns the existing one if `name` was already
    /// declared with the same kind.
    pub fn add_symbol(&mut self, kind: SymbolKind, name: &str) -> Result<SymbolId, GrammarError> {
        if let Some(&id) = self.name_to_symbol.get(name) {
            if self.symbols[id.0 as usize].kind == kind {
                return Ok(id);
            }
            return Err(GrammarError::DuplicateSymbolName(name.to_string()));
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name: name.to_string(),
            kind,
            description: None,
            precedence: None,
        });
        self.name_to_symbol.insert(name.to_string(), id);
        Ok(id)
    }

    fn push_rule(&mut self, lhs: SymbolId, rhs: Vec<SymbolId>, action: Option<Action<V>>) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule {
            id,
            lhs,
            rhs,
            action,
            precedence: None,
            is_start: false,
            midrule_size: None,
        });
        self.rules_by_lhs.entry(lhs).or_default().push(id);
        id
    }

    pub fn add_rule(
        &mut self,
        lhs: SymbolId,
        rhs: Vec<SymbolId>,
        action: Option<Action<V>>,
    ) -> RuleId {
        self.push_rule(lhs, rhs, action)
    }

    /// Declares a production whose rhs may interleave embedded actions with
    /// symbols. Each embedded action is extracted into a synthetic
    /// `Mᵢ → ε` rule per §4.7 and replaced in the rhs by `Mᵢ`; `final_action`
    /// (if any) is the ordinary action for the production as a whole, fired
    /// on reducing the *outer* rule with every rhs value including the
    /// synthetic ones for each `Mᵢ`.
    pub fn add_production(
        &mut self,
        lhs: SymbolId,
        parts: Vec<Part<V>>,
        final_action: Option<Action<V>>,
    ) -> RuleId
    where
        V: 'static,
    {
        let mut rhs = Vec::new();
        for part in parts {
            match part {
                Part::Symbol(symbol) => rhs.push(symbol),
                Part::Action(action) => {
                    let k = rhs.len();
                    let name = format!("@M{}", self.next_midrule);
                    self.next_midrule += 1;
                    let midrule_symbol = self
                        .add_symbol(SymbolKind::Nonterminal, &name)
                        .expect("synthetic midrule nonterminal name cannot collide");
                    let wrapped: Action<V> = Box::new(move |values: Vec<V>| action(&values));
                    let midrule_id = self.push_rule(midrule_symbol, Vec::new(), Some(wrapped));
                    self.rules[midrule_id.0 as usize].midrule_size = Some(k);
                    rhs.push(midrule_symbol);
                }
            }
        }
        self.push_rule(lhs, rhs, final_action)
    }

    /// Installs the synthetic start rule `@start → user_start @end`. May be
    /// called only once.
    pub fn set_start_symbol(&mut self, symbol: SymbolId) -> Result<(), GrammarError> {
        if !self.symbol(symbol).is_nonterminal() {
            return Err(GrammarError::StartSymbolMustBeNonterminal(symbol));
        }
        self.start_symbol = Some(symbol);
        let rule_id = self.push_rule(self.augmented_start, vec![symbol, self.end_symbol], None);
        self.rules[rule_id.0 as usize].is_start = true;
        self.start_rule = Some(rule_id);
        Ok(())
    }

    pub fn set_symbol_precedence(
        &mut self,
        symbol: SymbolId,
        level: u32,
        assoc: Associativity,
    ) -> Result<(), GrammarError> {
        if symbol.0 as usize >= self.symbols.len() {
            return Err(GrammarError::UnknownSymbol(symbol));
        }
        self.symbols[symbol.0 as usize].precedence = Some(Precedence::new(level, assoc));
        Ok(())
    }

    pub fn set_rule_precedence(&mut self, rule: RuleId, level: u32, assoc: Associativity) {
        self.rules[rule.0 as usize].precedence = Some(Precedence::new(level, assoc));
    }

    /// The rule's own precedence if set, else the precedence of its
    /// rightmost terminal (§4.8).
    pub fn effective_rule_precedence(&self, rule: RuleId) -> Option<Precedence> {
        let rule = self.rule(rule);
        if let Some(prec) = rule.precedence {
            return Some(prec);
        }
        rule.rhs
            .iter()
            .rev()
            .find(|&&s| self.symbol(s).is_terminal())
            .and_then(|&s| self.symbol(s).precedence)
    }

    fn empty_of_symbol(&self, sym: SymbolId, visiting: &mut BTreeSet<SymbolId>) -> bool {
        if let Some(&cached) = self.empty_memo.borrow().get(&sym) {
            return cached;
        }
        if self.symbol(sym).is_terminal() {
            self.empty_memo.borrow_mut().insert(sym, false);
            return false;
        }
        if !visiting.insert(sym) {
            return false;
        }
        let mut result = false;
        for &rule_id in self.rules_for_lhs(sym) {
            if self.empty_of_string(&self.rule(rule_id).rhs, visiting) {
                result = true;
                break;
            }
        }
        visiting.remove(&sym);
        self.empty_memo.borrow_mut().insert(sym, result);
        result
    }

    fn empty_of_string(&self, rhs: &[SymbolId], visiting: &mut BTreeSet<SymbolId>) -> bool {
        rhs.iter().all(|&s| self.empty_of_symbol(s, visiting))
    }

    pub fn empty_of(&self, sym: SymbolId) -> bool {
        self.empty_of_symbol(sym, &mut BTreeSet::new())
    }

    pub fn empty(&self, rhs: &[SymbolId]) -> bool {
        self.empty_of_string(rhs, &mut BTreeSet::new())
    }

    fn first_of_symbol(&self, sym: SymbolId, visiting: &mut BTreeSet<SymbolId>) -> BTreeSet<SymbolId> {
        if let Some(cached) = self.first_memo.borrow().get(&sym) {
            return cached.clone();
        }
        if self.symbol(sym).is_terminal() {
            let set: BTreeSet<SymbolId> = std::iter::once(sym).collect();
            self.first_memo.borrow_mut().insert(sym, set.clone());
            return set;
        }
        // Cycle guard: contribute nothing for the recursive occurrence, but
        // let the outer call (which still holds `sym` out of `visiting`)
        // keep merging contributions from this symbol's other rules and
        // from symbols visited earlier in the same top-level call. See
        // the resolved Open Question in the design notes.
        if !visiting.insert(sym) {
            return BTreeSet::new();
        }
        let mut result = BTreeSet::new();
        for &rule_id in self.rules_for_lhs(sym) {
            result.extend(self.first_of_string(&self.rule(rule_id).rhs, visiting));
        }
        visiting.remove(&sym);
        self.first_memo.borrow_mut().insert(sym, result.clone());
        result
    }

    fn first_of_string(&self, rhs: &[SymbolId], visiting: &mut BTreeSet<SymbolId>) -> BTreeSet<SymbolId> {
        let mut result = BTreeSet::new();
        for &s in rhs {
            result.extend(self.first_of_symbol(s, visiting));
            if !self.empty_of_symbol(s, &mut BTreeSet::new()) {
                break;
            }
        }
        result
    }

    pub fn first_of(&self, sym: SymbolId) -> BTreeSet<SymbolId> {
        self.first_of_symbol(sym, &mut BTreeSet::new())
    }

    pub fn first(&self, rhs: &[SymbolId]) -> BTreeSet<SymbolId> {
        self.first_of_string(rhs, &mut BTreeSet::new())
    }

    /// Follow sets on the plain grammar, exposed for diagnostics only — the
    /// parsing table's lookaheads come from the automaton-level operations
    /// in [`crate::operations`], not from this (§4.1).
    pub fn follow_sets(&self) -> BTreeMap<SymbolId, BTreeSet<SymbolId>> {
        let mut follow: BTreeMap<SymbolId, BTreeSet<SymbolId>> = BTreeMap::new();
        if let Some(start) = self.start_symbol {
            follow.entry(start).or_default().insert(self.end_symbol);
        }
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &self.rules {
                for (i, &sym) in rule.rhs.iter().enumerate() {
                    if !self.symbol(sym).is_nonterminal() {
                        continue;
                    }
                    let rest = &rule.rhs[i + 1..];
                    let first_rest = self.first(rest);
                    let rest_empty = self.empty(rest);
                    let lhs_follow = follow.get(&rule.lhs).cloned().unwrap_or_default();
                    let entry = follow.entry(sym).or_default();
                    let before = entry.len();
                    entry.extend(first_rest);
                    if rest_empty {
                        entry.extend(lhs_follow);
                    }
                    if entry.len() != before {
                        changed = true;
                    }
                }
            }
        }
        follow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr_grammar() -> (Grammar<i64>, SymbolId, SymbolId, SymbolId) {
        let mut g: Grammar<i64> = Grammar::new();
        let expr = g.add_symbol(SymbolKind::Nonterminal, "Expr").unwrap();
        let plus = g.add_symbol(SymbolKind::Terminal, "+").unwrap();
        let num = g.add_symbol(SymbolKind::Terminal, "num").unwrap();
        g.add_rule(expr, vec![expr, plus, expr], None);
        g.add_rule(expr, vec![num], None);
        g.set_start_symbol(expr).unwrap();
        (g, expr, plus, num)
    }

    #[test]
    fn add_symbol_is_idempotent_on_name() {
        let mut g: Grammar<()> = Grammar::new();
        let a = g.add_symbol(SymbolKind::Terminal, "a").unwrap();
        let b = g.add_symbol(SymbolKind::Terminal, "a").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn add_symbol_rejects_kind_change() {
        let mut g: Grammar<()> = Grammar::new();
        g.add_symbol(SymbolKind::Terminal, "a").unwrap();
        assert!(g.add_symbol(SymbolKind::Nonterminal, "a").is_err());
    }

    #[test]
    fn first_of_left_recursive_nonterminal_includes_num() {
        let (g, expr, _plus, num) = expr_grammar();
        assert_eq!(g.first_of(expr), [num].into_iter().collect());
    }

    #[test]
    fn empty_is_false_for_expr_grammar() {
        let (g, expr, _plus, _num) = expr_grammar();
        assert!(!g.empty_of(expr));
    }

    #[test]
    fn empty_string_is_vacuously_empty() {
        let (g, _expr, _plus, _num) = expr_grammar();
        assert!(g.empty(&[]));
    }

    #[test]
    fn follow_of_start_symbol_contains_end() {
        let (g, expr, _plus, _num) = expr_grammar();
        let follow = g.follow_sets();
        assert!(follow[&expr].contains(&g.end_symbol()));
    }

    #[test]
    fn effective_rule_precedence_falls_back_to_rightmost_terminal() {
        let (mut g, expr, plus, _num) = expr_grammar();
        g.set_symbol_precedence(plus, 1, Associativity::Left).unwrap();
        let rule_using_plus = g.rules_for_lhs(expr)[0];
        let prec = g.effective_rule_precedence(rule_using_plus).unwrap();
        assert_eq!(prec.level, 1);
    }

    #[test]
    fn midrule_action_is_extracted_into_synthetic_rule() {
        let mut g: Grammar<i64> = Grammar::new();
        let s = g.add_symbol(SymbolKind::Nonterminal, "S").unwrap();
        let a = g.add_symbol(SymbolKind::Terminal, "a").unwrap();
        let b = g.add_symbol(SymbolKind::Terminal, "b").unwrap();
        let rule_id = g.add_production(
            s,
            vec![
                Part::Symbol(a),
                Part::Action(Box::new(|values: &[i64]| values[0] + 1)),
                Part::Symbol(b),
            ],
            None,
        );
        let rule = g.rule(rule_id);
        assert_eq!(rule.rhs.len(), 3);
        let midrule_sym = rule.rhs[1];
        assert!(g.symbol(midrule_sym).is_nonterminal());
        let midrule_rule_id = g.rules_for_lhs(midrule_sym)[0];
        let midrule_rule = g.rule(midrule_rule_id);
        assert_eq!(midrule_rule.midrule_size, Some(1));
        assert!(midrule_rule.rhs.is_empty());
    }
}
