use std::collections::BTreeSet;

use crate::automaton::{Automaton, StateId};
use crate::error::{GrammarError, ParseError, PrepareError};
use crate::grammar::Grammar;
use crate::report::ParserReport;
use crate::symbol::SymbolId;
use crate::table::{Action, ParsingTable};

/// Ties a [`Grammar`] to a [`lexregex::Tokenizer`] scanning the grammar's own
/// terminal [`SymbolId`]s, and drives the classical table-driven LR loop over
/// both once [`Parser::prepare`] has built the automaton and tables (§4.10,
/// §6). `V` is the embedder's semantic value type; it must be `Clone`
/// because a mid-rule action inspects the top of the value stack without
/// popping it (§4.7) — the only place this driver ever needs to duplicate a
/// value rather than move it.
pub struct Parser<V: Default + Clone> {
    grammar: Grammar<V>,
    tokenizer: lexregex::Tokenizer<SymbolId, V>,
    automaton: Option<Automaton>,
    table: Option<ParsingTable>,
}

impl<V: Default + Clone> Parser<V> {
    pub fn new(grammar: Grammar<V>) -> Self {
        let end = grammar.end_symbol();
        Self {
            grammar,
            tokenizer: lexregex::Tokenizer::new(end),
            automaton: None,
            table: None,
        }
    }

    pub fn grammar(&self) -> &Grammar<V> {
        &self.grammar
    }

    pub fn grammar_mut(&mut self) -> &mut Grammar<V> {
        &mut self.grammar
    }

    pub fn tokenizer_mut(&mut self) -> &mut lexregex::Tokenizer<SymbolId, V> {
        &mut self.tokenizer
    }

    pub fn is_prepared(&self) -> bool {
        self.table.is_some()
    }

    /// Builds the LR(0) automaton, the LALR(1) ACTION/GOTO tables, and
    /// compiles the tokenizer's regex sets. May be called more than once
    /// (e.g. after declaring more rules); running it twice on an unchanged
    /// grammar reproduces equal tables (§8 round-trip property).
    pub fn prepare(&mut self) -> Result<ParserReport, PrepareError> {
        if self.grammar.start_symbol().is_none() {
            return Err(GrammarError::StartSymbolNotSet.into());
        }
        let automaton = Automaton::build(&self.grammar);
        let (table, report) = ParsingTable::build(&self.grammar, &automaton);
        self.tokenizer.prepare()?;
        self.automaton = Some(automaton);
        self.table = Some(table);
        Ok(report)
    }

    /// Like [`Parser::prepare`], but treats any shift/reduce or
    /// reduce/reduce conflict in the resulting report as fatal (§6's
    /// "BuildError if prepare() sees unresolvable conflicts and the caller
    /// opts to treat the report as fatal"). The table is still built and
    /// installed on success or on a conflict error alike — only the return
    /// value differs from [`Parser::prepare`].
    pub fn prepare_strict(&mut self) -> Result<(), PrepareError> {
        let report = self.prepare()?;
        if report.is_clean() {
            Ok(())
        } else {
            Err(PrepareError::Conflicts(report))
        }
    }

    /// Parses `input` to completion, replacing any input streams already on
    /// the tokenizer's stack with a single fresh one labelled `label`.
    /// [`Parser::prepare`] must have been called first.
    pub fn parse(
        &mut self,
        input: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<V, ParseError<SymbolId>> {
        let table = self
            .table
            .as_ref()
            .expect("Parser::prepare must be called before Parser::parse");

        self.tokenizer.clear_input_streams();
        self.tokenizer.push_input_stream(input, label);

        let mut state_stack: Vec<StateId> = vec![StateId(0)];
        let mut value_stack: Vec<V> = Vec::new();

        let (mut lookahead_token, mut lookahead_value) =
            self.tokenizer.next_token().map_err(ParseError::Tokenization)?;

        loop {
            let current_state = *state_stack.last().expect("state stack is never empty");
            match table.action(current_state, lookahead_token.tag()) {
                Some(Action::Accept) => {
                    return Ok(value_stack.pop().expect("accept with an empty value stack"));
                }
                Some(Action::Shift(next_state)) => {
                    state_stack.push(next_state);
                    value_stack.push(lookahead_value);
                    let (token, value) =
                        self.tokenizer.next_token().map_err(ParseError::Tokenization)?;
                    lookahead_token = token;
                    lookahead_value = value;
                }
                Some(Action::Reduce(rule_id)) => {
                    let rule = self.grammar.rule(rule_id);
                    let rhs_len = rule.rhs.len();
                    state_stack.truncate(state_stack.len() - rhs_len);

                    // Mid-rule actions (§4.7) read the top `k` already-pushed
                    // values without popping them — they belong to the outer
                    // reduction that is still in progress.
                    let args: Vec<V> = if let Some(k) = rule.midrule_size {
                        let len = value_stack.len();
                        value_stack[len - k..].to_vec()
                    } else {
                        value_stack.split_off(value_stack.len() - rhs_len)
                    };

                    let value = match &rule.action {
                        Some(action) => action(args),
                        // No action declared: pass the sole rhs value
                        // through unchanged (the common "$$ = $1" case),
                        // or a default value for a rule with no rhs.
                        None => args.into_iter().next().unwrap_or_default(),
                    };

                    let top_state = *state_stack.last().expect("state stack is never empty");
                    let goto_state = table
                        .goto(top_state, rule.lhs)
                        .unwrap_or_else(|| panic!("missing GOTO[{}, {}] (generator bug)", top_state, rule.lhs));
                    state_stack.push(goto_state);
                    value_stack.push(value);
                }
                None => {
                    let expected: BTreeSet<SymbolId> = table.expected(current_state).into_iter().collect();
                    return Err(ParseError::Syntax {
                        unexpected: lookahead_token,
                        expected,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Part;
    use crate::symbol::{Associativity, SymbolKind};

    fn terminal(grammar: &mut Grammar<i64>, name: &str) -> SymbolId {
        grammar.add_symbol(SymbolKind::Terminal, name).unwrap()
    }

    /// `E -> E + E | E * E | num`, `+` left level 1, `*` left level 2.
    fn arith_parser() -> Parser<i64> {
        let mut g: Grammar<i64> = Grammar::new();
        let expr = g.add_symbol(SymbolKind::Nonterminal, "Expr").unwrap();
        let plus = terminal(&mut g, "+");
        let star = terminal(&mut g, "*");
        let num = terminal(&mut g, "num");
        g.set_symbol_precedence(plus, 1, Associativity::Left).unwrap();
        g.set_symbol_precedence(star, 2, Associativity::Left).unwrap();
        g.add_rule(
            expr,
            vec![expr, plus, expr],
            Some(Box::new(|mut v: Vec<i64>| {
                let r = v.pop().unwrap();
                v.pop();
                let l = v.pop().unwrap();
                l + r
            })),
        );
        g.add_rule(
            expr,
            vec![expr, star, expr],
            Some(Box::new(|mut v: Vec<i64>| {
                let r = v.pop().unwrap();
                v.pop();
                let l = v.pop().unwrap();
                l * r
            })),
        );
        g.add_rule(expr, vec![num], None);
        g.set_start_symbol(expr).unwrap();

        let mut parser = Parser::new(g);
        let num_sym = num;
        let plus_sym = plus;
        let star_sym = star;
        let tok = parser.tokenizer_mut();
        let num_handle = tok.add_token("[0-9]+", Some(num_sym), &[]).unwrap();
        tok.set_action(num_handle, |s| s.parse::<i64>().unwrap());
        tok.add_literal_token("+", Some(plus_sym), &[]).unwrap();
        tok.add_literal_token("*", Some(star_sym), &[]).unwrap();
        tok.add_token(r"\s+", None, &[]).unwrap();
        parser
    }

    #[test]
    fn left_associative_addition() {
        let mut parser = arith_parser();
        parser.prepare().unwrap();
        assert_eq!(parser.parse("1+2+3", "test").unwrap(), 6);
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let mut parser = arith_parser();
        parser.prepare().unwrap();
        assert_eq!(parser.parse("1+2*3", "test").unwrap(), 7);
        assert_eq!(parser.parse("1*2+3*4", "test").unwrap(), 14);
    }

    #[test]
    fn syntax_error_reports_expected_symbols() {
        let mut parser = arith_parser();
        parser.prepare().unwrap();
        let error = parser.parse("1+", "test").unwrap_err();
        match error {
            ParseError::Syntax { expected, .. } => assert!(!expected.is_empty()),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn right_associativity_nests_on_the_right() {
        // Same shape as `arith_parser` but `+` is Right instead of Left, and
        // the action builds a parenthesized string so the two associativities
        // are visibly distinguishable (both reduce to the same numeric sum).
        let mut g: Grammar<String> = Grammar::new();
        let expr = g.add_symbol(SymbolKind::Nonterminal, "Expr").unwrap();
        let plus = g.add_symbol(SymbolKind::Terminal, "+").unwrap();
        let num = g.add_symbol(SymbolKind::Terminal, "num").unwrap();
        g.set_symbol_precedence(plus, 1, Associativity::Right).unwrap();
        g.add_rule(
            expr,
            vec![expr, plus, expr],
            Some(Box::new(|mut v: Vec<String>| {
                let r = v.pop().unwrap();
                v.pop();
                let l = v.pop().unwrap();
                format!("({},+,{})", l, r)
            })),
        );
        g.add_rule(expr, vec![num], None);
        g.set_start_symbol(expr).unwrap();

        let mut parser = Parser::new(g);
        let tok = parser.tokenizer_mut();
        let num_handle = tok.add_token("[0-9]+", Some(num), &[]).unwrap();
        tok.set_action(num_handle, |s| s.to_string());
        tok.add_literal_token("+", Some(plus), &[]).unwrap();

        parser.prepare().unwrap();
        assert_eq!(parser.parse("1+2+3", "test").unwrap(), "(1,+,(2,+,3))");
    }

    #[test]
    fn prepare_strict_rejects_an_ambiguous_grammar() {
        // `E -> E + E | num` with no precedence declared is ambiguous: the
        // state after "num + num" faces a shift/reduce conflict on `+` that
        // nothing resolves. `prepare` reports it and defaults to shift;
        // `prepare_strict` must treat that as fatal instead.
        let mut g: Grammar<i64> = Grammar::new();
        let expr = g.add_symbol(SymbolKind::Nonterminal, "Expr").unwrap();
        let plus = terminal(&mut g, "+");
        let num = terminal(&mut g, "num");
        g.add_rule(expr, vec![expr, plus, expr], None);
        g.add_rule(expr, vec![num], None);
        g.set_start_symbol(expr).unwrap();

        let mut parser = Parser::new(g);
        let tok = parser.tokenizer_mut();
        let num_handle = tok.add_token("[0-9]+", Some(num), &[]).unwrap();
        tok.set_action(num_handle, |s| s.parse::<i64>().unwrap());
        tok.add_literal_token("+", Some(plus), &[]).unwrap();
        tok.add_token(r"\s+", None, &[]).unwrap();

        assert!(parser.prepare_strict().is_err());
        assert!(parser.is_prepared(), "prepare_strict still installs the table");
    }

    #[test]
    fn empty_input_against_nullable_start_accepts_immediately() {
        let mut g: Grammar<()> = Grammar::new();
        let s = g.add_symbol(SymbolKind::Nonterminal, "S").unwrap();
        g.add_rule(s, vec![], None);
        g.set_start_symbol(s).unwrap();
        let mut parser: Parser<()> = Parser::new(g);
        parser.prepare().unwrap();
        assert!(parser.parse("", "test").is_ok());
    }

    #[test]
    fn midrule_action_fires_before_the_rest_of_the_production() {
        let mut g: Grammar<String> = Grammar::new();
        let s = g.add_symbol(SymbolKind::Nonterminal, "S").unwrap();
        let a = terminal(&mut g, "a");
        let b = terminal(&mut g, "b");
        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::<String>::new()));
        let order_for_action = order.clone();
        g.add_production(
            s,
            vec![
                Part::Symbol(a),
                Part::Action(Box::new(move |values: &[String]| {
                    order_for_action.borrow_mut().push(format!("act({})", values[0]));
                    String::new()
                })),
                Part::Symbol(b),
            ],
            Some(Box::new(move |values: Vec<String>| {
                format!("{}|{}|{}", values[0], values[1], values[2])
            })),
        );
        g.set_start_symbol(s).unwrap();

        let mut parser = Parser::new(g);
        let tok = parser.tokenizer_mut();
        let a_handle = tok.add_literal_token("a", Some(a), &[]).unwrap();
        tok.set_action(a_handle, |s| s.to_string());
        let b_handle = tok.add_literal_token("b", Some(b), &[]).unwrap();
        tok.set_action(b_handle, |s| s.to_string());
        tok.add_token(r"\s+", None, &[]).unwrap();

        parser.prepare().unwrap();
        let result = parser.parse("a b", "test").unwrap();
        assert_eq!(result, "a||b");
        assert_eq!(order.borrow().as_slice(), ["act(a)".to_string()]);
    }
}
