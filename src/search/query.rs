//! Query compilation: raw query text plus mode flags into a [`Predicate`].
use crate::error::{Result, SearchError};
use log::{debug, warn};
use lru::LruCache;
use memchr::memmem;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags {
    pub enable_regex: bool,
    pub search_in_path: bool,
}

impl QueryFlags {
    pub fn new(enable_regex: bool, search_in_path: bool) -> Self {
        Self {
            enable_regex,
            search_in_path,
        }
    }
}

/// Whitespace separated tokens that must all occur in a candidate.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    tokens: Vec<String>,
    finders: Vec<memmem::Finder<'static>>,
}

impl LiteralMatcher {
    fn new(query: &str) -> Option<Self> {
        let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if tokens.is_empty() {
            return None;
        }
        let finders = tokens
            .iter()
            .map(|t| memmem::Finder::new(t.as_bytes()).into_owned())
            .collect();
        Some(Self { tokens, finders })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// `folded` must already be lowercased.
    pub fn is_match(&self, folded: &str) -> bool {
        let haystack = folded.as_bytes();
        self.finders.iter().all(|f| f.find(haystack).is_some())
    }
}

/// Compiled match test. Holds nothing borrowed from an index.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Empty query; matches no candidate.
    Nothing,
    Literal(LiteralMatcher),
    Regex(Regex),
}

impl Predicate {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Predicate::Nothing)
    }

    pub fn tokens(&self) -> &[String] {
        match self {
            Predicate::Literal(m) => m.tokens(),
            _ => &[],
        }
    }

    pub fn pattern(&self) -> Option<&Regex> {
        match self {
            Predicate::Regex(re) => Some(re),
            _ => None,
        }
    }

    /// Tests a candidate, folding it first when needed.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Predicate::Nothing => false,
            Predicate::Literal(m) => m.is_match(&candidate.to_lowercase()),
            Predicate::Regex(re) => re.is_match(candidate),
        }
    }

    /// Tests a candidate whose lowercased form is already known.
    pub fn matches_folded(&self, candidate: &str, folded: &str) -> bool {
        match self {
            Predicate::Nothing => false,
            Predicate::Literal(m) => m.is_match(folded),
            Predicate::Regex(re) => re.is_match(candidate),
        }
    }
}

/// Compiles a query without caching.
pub fn compile(query: &str, flags: QueryFlags) -> Result<Predicate> {
    if query.is_empty() {
        return Ok(Predicate::Nothing);
    }
    if flags.enable_regex {
        build_regex(query).map(Predicate::Regex)
    } else {
        Ok(LiteralMatcher::new(query).map_or(Predicate::Nothing, Predicate::Literal))
    }
}

fn build_regex(query: &str) -> Result<Regex> {
    RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .map_err(|source| SearchError::Compile {
            query: query.to_string(),
            source,
        })
}

/// Compiler that remembers recently built regexes, so editing a pattern
/// back to an earlier form does not rebuild it.
pub struct QueryCompiler {
    regex_cache: LruCache<String, Regex>,
}

impl QueryCompiler {
    pub fn new(cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            regex_cache: LruCache::new(capacity),
        }
    }

    pub fn compile(&mut self, query: &str, flags: QueryFlags) -> Result<Predicate> {
        if query.is_empty() || !flags.enable_regex {
            return compile(query, flags);
        }

        if let Some(re) = self.regex_cache.get(query) {
            debug!("Regex cache hit for '{query}'");
            return Ok(Predicate::Regex(re.clone()));
        }

        match build_regex(query) {
            Ok(re) => {
                self.regex_cache.put(query.to_string(), re.clone());
                Ok(Predicate::Regex(re))
            }
            Err(e) => {
                warn!("{e}");
                Err(e)
            }
        }
    }

    pub fn cached_patterns(&self) -> usize {
        self.regex_cache.len()
    }
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(32)
    }
}
