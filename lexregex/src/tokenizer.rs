use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use crate::error::{BuildError, Error};
use crate::location::Location;
use crate::matcher::RegexMatcher;
use crate::token::Token;

/// The always-present start-condition a token belongs to when it names no
/// other one explicitly.
pub const DEFAULT_STATE: &str = "@default";

/// A handle to a previously added token, used to attach an action, a state
/// transition or a description to it after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHandle(usize);

struct TokenDef<T, V> {
    index: usize,
    pattern: String,
    symbol: Option<T>,
    action: Option<Box<dyn Fn(&str) -> V>>,
    states: Vec<String>,
    transition_to: Option<String>,
    #[allow(dead_code)]
    description: Option<String>,
}

struct InputStream {
    content: String,
    cursor: usize,
    location: Location,
    at_end: bool,
}

impl InputStream {
    fn new(content: String, label: String) -> Self {
        let at_end = content.is_empty();
        Self {
            content,
            cursor: 0,
            location: Location::new(label),
            at_end,
        }
    }

    fn rest(&self) -> &str {
        &self.content[self.cursor..]
    }
}

/// A stateful, longest-match regex scanner with named start-conditions and a
/// stack of input streams (for include-file style nesting).
///
/// Build one with [`Tokenizer::new`], declare tokens with [`Tokenizer::add_token`]
/// / [`Tokenizer::add_literal_token`], call [`Tokenizer::prepare`] once, push
/// at least one input stream, then pull tokens with [`Tokenizer::next_token`].
pub struct Tokenizer<T: Display + Copy + Eq, V: Default> {
    tokens: Vec<TokenDef<T, V>>,
    matchers: BTreeMap<String, RegexMatcher<usize>>,
    current_state: String,
    input_stack: Vec<InputStream>,
    global_action: Option<Box<dyn FnMut(&str)>>,
    end_symbol: T,
    prepared: bool,
}

impl<T: Display + Copy + Eq, V: Default> Tokenizer<T, V> {
    pub fn new(end_symbol: T) -> Self {
        Self {
            tokens: Vec::new(),
            matchers: BTreeMap::new(),
            current_state: DEFAULT_STATE.to_string(),
            input_stack: Vec::new(),
            global_action: None,
            end_symbol,
            prepared: false,
        }
    }

    /// Declares a token matching the (unanchored) regex `pattern`. `symbol`
    /// is `None` for silent tokens such as whitespace. `active_states` lists
    /// the start-conditions this token is scanned in; an empty slice means
    /// [`DEFAULT_STATE`]. Unknown state names are created on first mention.
    pub fn add_token(
        &mut self,
        pattern: &str,
        symbol: Option<T>,
        active_states: &[&str],
    ) -> Result<TokenHandle, BuildError> {
        if pattern.is_empty() {
            return Err(BuildError::EmptyPattern);
        }
        let index = self.tokens.len();
        let states = if active_states.is_empty() {
            vec![DEFAULT_STATE.to_string()]
        } else {
            active_states.iter().map(|s| s.to_string()).collect()
        };
        self.tokens.push(TokenDef {
            index,
            pattern: pattern.to_string(),
            symbol,
            action: None,
            states,
            transition_to: None,
            description: None,
        });
        self.prepared = false;
        Ok(TokenHandle(index))
    }

    /// Declares a token matching the exact literal string `text`, with the
    /// "fullword" boundary applied so e.g. keyword `if` does not match the
    /// prefix of identifier `ifx`.
    pub fn add_literal_token(
        &mut self,
        text: &str,
        symbol: Option<T>,
        active_states: &[&str],
    ) -> Result<TokenHandle, BuildError> {
        let pattern = format!("{}(?:\\b|$)", regex::escape(text));
        self.add_token(&pattern, symbol, active_states)
    }

    pub fn set_action(&mut self, handle: TokenHandle, action: impl Fn(&str) -> V + 'static) {
        self.tokens[handle.0].action = Some(Box::new(action));
    }

    pub fn set_transition_to_state(&mut self, handle: TokenHandle, state: &str) {
        self.tokens[handle.0].transition_to = Some(state.to_string());
    }

    pub fn set_description(&mut self, handle: TokenHandle, description: &str) {
        self.tokens[handle.0].description = Some(description.to_string());
    }

    pub fn global_action(&mut self, callback: impl FnMut(&str) + 'static) {
        self.global_action = Some(Box::new(callback));
    }

    /// Compiles one regex set per start-condition. Must be called before
    /// [`Tokenizer::next_token`]; may be called again after further
    /// declarations, idempotently re-deriving the same tables.
    pub fn prepare(&mut self) -> Result<(), BuildError> {
        let mut per_state: BTreeMap<String, Vec<(usize, &str)>> = BTreeMap::new();
        per_state.entry(DEFAULT_STATE.to_string()).or_default();
        for token in &self.tokens {
            for state in &token.states {
                per_state
                    .entry(state.clone())
                    .or_default()
                    .push((token.index, token.pattern.as_str()));
            }
        }
        let mut matchers = BTreeMap::new();
        for (state, patterns) in per_state {
            matchers.insert(state, RegexMatcher::new(&patterns)?);
        }
        self.matchers = matchers;
        self.prepared = true;
        Ok(())
    }

    pub fn push_input_stream(&mut self, content: impl Into<String>, label: impl Into<String>) {
        self.input_stack
            .push(InputStream::new(content.into(), label.into()));
    }

    pub fn pop_input_stream(&mut self) {
        self.input_stack.pop();
    }

    pub fn clear_input_streams(&mut self) {
        self.input_stack.clear();
    }

    pub fn is_input_exhausted(&self) -> bool {
        self.input_stack.is_empty()
    }

    /// Scans and returns the next non-silent token, or the end-of-input
    /// token once every pushed stream is exhausted. Silent tokens (those
    /// declared with `symbol: None`) are matched and skipped internally.
    pub fn next_token(&mut self) -> Result<(Token<T>, V), Error> {
        assert!(self.prepared, "Tokenizer::prepare() must be called first");
        loop {
            let stream = match self.input_stack.last() {
                None => {
                    return Ok((
                        Token::new(self.end_symbol, String::new(), Location::default()),
                        V::default(),
                    ))
                }
                Some(stream) => stream,
            };
            if stream.at_end {
                let location = stream.location.clone();
                return Ok((
                    Token::new(self.end_symbol, String::new(), location),
                    V::default(),
                ));
            }

            let matcher = self
                .matchers
                .get(&self.current_state)
                .unwrap_or_else(|| panic!("unknown start-condition \"{}\"", self.current_state));
            let text = stream.rest();

            let (tok_idx, len) = match matcher.longest_match(text) {
                Some(found) => found,
                None => {
                    let bad_len = text.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
                    return Err(Error {
                        text: text[..bad_len].to_string(),
                        location: stream.location.clone(),
                        state: self.current_state.clone(),
                    });
                }
            };

            let stream = self.input_stack.last_mut().unwrap();
            let matched = stream.content[stream.cursor..stream.cursor + len].to_string();
            let location = stream.location.clone();
            stream.location.advance_over(&matched);
            stream.cursor += len;
            if stream.cursor >= stream.content.len() {
                stream.at_end = true;
            }

            let def = &self.tokens[tok_idx];
            let symbol = def.symbol;
            let transition_to = def.transition_to.clone();
            // The action runs even for silent tokens (no `symbol`): a
            // stateful lexer commonly uses a silent token's action purely
            // for its side effect, e.g. accumulating a quoted string's body
            // into an externally-shared buffer that a later token reads from
            // (§4.9 scenario: two start-conditions, body accumulates).
            let value = match &def.action {
                Some(action) => action(&matched),
                None => V::default(),
            };

            if let Some(target) = transition_to {
                self.current_state = target;
            }
            if let Some(global) = &mut self.global_action {
                global(&matched);
            }

            match symbol {
                None => continue,
                Some(symbol) => return Ok((Token::new(symbol, matched, location), value)),
            }
        }
    }
}
