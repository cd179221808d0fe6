// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Regex-match filter node (§4.2 "Regex match").

use flowlog_core::message::LogMessage;
use flowlog_core::template::Template;
use flowlog_core::value::LogValue;
use regex::{Regex, RegexBuilder};

/// Which matcher semantics compiled the pattern. `Pcre` is realized with the
/// `regex` crate (no real PCRE backtracking semantics available without a
/// native dependency); `StringLiteral` is a plain substring search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherType {
    Pcre,
    StringLiteral,
}

/// What the pattern is evaluated against.
#[derive(Debug)]
pub enum MatchTarget {
    /// A single named message value.
    Value(String),
    /// A formatted template.
    Template(Box<dyn Template>),
    /// Neither set: the synthetic `"<program>[<pid>]: <message>"` string.
    Synthetic,
}

/// The compiled form of the pattern, holding the `Regex` by construction in
/// the `Pcre` arm so evaluation never needs a fallible lookup on a parallel
/// `Option`.
#[derive(Debug)]
enum CompiledMatcher {
    StringLiteral,
    Pcre(Regex),
}

#[derive(Debug)]
pub struct RegexMatchNode {
    pattern: String,
    icase: bool,
    match_only: bool,
    store_matches: bool,
    compiled: CompiledMatcher,
    target: MatchTarget,
}

impl RegexMatchNode {
    pub fn new(
        pattern: impl Into<String>,
        matcher_type: MatcherType,
        icase: bool,
        match_only: bool,
        store_matches: bool,
        dup_names: bool,
        target: MatchTarget,
    ) -> Result<Self, crate::error::FilterInitError> {
        let pattern = pattern.into();
        let compiled = match matcher_type {
            MatcherType::StringLiteral => CompiledMatcher::StringLiteral,
            MatcherType::Pcre => CompiledMatcher::Pcre(
                RegexBuilder::new(&pattern)
                    .case_insensitive(icase)
                    .octal(false)
                    .build()
                    .map_err(|e| crate::error::FilterInitError::RegexCompileFailed(e.to_string()))?,
            ),
        };
        let _ = dup_names; // the `regex` crate already tolerates repeated group names
        Ok(RegexMatchNode { pattern, icase, match_only, store_matches, compiled, target })
    }

    fn subject(&self, messages: &[LogMessage]) -> String {
        match &self.target {
            MatchTarget::Value(name) => messages
                .last()
                .and_then(|m| m.value(name))
                .map(|v| v.as_str().into_owned())
                .unwrap_or_default(),
            MatchTarget::Template(tpl) => {
                let (bytes, _) = tpl.format_with_type(messages);
                String::from_utf8_lossy(&bytes).into_owned()
            }
            MatchTarget::Synthetic => {
                let program = messages.last().and_then(|m| m.value("program")).map(|v| v.as_str().into_owned()).unwrap_or_default();
                let pid = messages.last().and_then(|m| m.value("pid")).map(|v| v.as_str().into_owned()).unwrap_or_default();
                let message = messages.last().and_then(|m| m.value("message")).map(|v| v.as_str().into_owned()).unwrap_or_default();
                format!("{program}[{pid}]: {message}")
            }
        }
    }

    /// Evaluate against the primary (last) message. `store_matches` writes
    /// captures into `messages.last_mut()`, which the caller must have
    /// already made writable (mirrors `modifies_message` in §4.2).
    pub fn eval(&self, messages: &mut [LogMessage]) -> bool {
        let subject = self.subject(messages);
        match &self.compiled {
            CompiledMatcher::StringLiteral => {
                let hay = if self.icase { subject.to_lowercase() } else { subject.clone() };
                let needle = if self.icase { self.pattern.to_lowercase() } else { self.pattern.clone() };
                hay.contains(&needle)
            }
            CompiledMatcher::Pcre(re) => {
                match re.captures(&subject) {
                    None => false,
                    Some(caps) => {
                        if self.store_matches && !self.match_only {
                            if let Some(last) = messages.last_mut() {
                                let data = last.make_writable();
                                for name in re.capture_names().flatten() {
                                    if let Some(m) = caps.name(name) {
                                        data.values.insert(name.to_string(), LogValue::string(m.as_str()));
                                    }
                                }
                            }
                        }
                        true
                    }
                }
            }
        }
    }

    pub fn modifies_message(&self) -> bool {
        self.store_matches && !self.match_only && matches!(self.compiled, CompiledMatcher::Pcre(_))
    }
}
