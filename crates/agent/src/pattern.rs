// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hex byte patterns with wildcard positions, as accepted by the scanners.
//!
//! The wire form is space-separated hex pairs, `??` marking a byte that
//! matches anything: `"48 8b ?? 04"`.

use std::fmt;

/// A parse failure, carrying the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError(pub String);

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pattern: {}", self.0)
    }
}

impl std::error::Error for PatternError {}

/// A parsed byte pattern; `None` positions are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePattern {
    bytes: Vec<Option<u8>>,
}

impl BytePattern {
    /// Parse the wire form.  At least one byte must be concrete.
    pub fn parse(spec: &str) -> Result<Self, PatternError> {
        let mut bytes = Vec::new();
        for token in spec.split_whitespace() {
            match token {
                "?" | "??" => bytes.push(None),
                t if t.len() == 2 => {
                    let b = u8::from_str_radix(t, 16)
                        .map_err(|_| PatternError(t.to_owned()))?;
                    bytes.push(Some(b));
                }
                t => return Err(PatternError(t.to_owned())),
            }
        }
        if bytes.is_empty() {
            return Err(PatternError("empty pattern".to_owned()));
        }
        if bytes.iter().all(Option::is_none) {
            return Err(PatternError("all wildcards".to_owned()));
        }
        Ok(Self { bytes })
    }

    /// An exact pattern with no wildcards.
    pub fn from_bytes(needle: &[u8]) -> Self {
        Self { bytes: needle.iter().copied().map(Some).collect() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the pattern matches `hay` starting at `at`.
    pub fn matches_at(&self, hay: &[u8], at: usize) -> bool {
        if at + self.bytes.len() > hay.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(&hay[at..at + self.bytes.len()])
            .all(|(want, got)| match want {
                Some(b) => b == got,
                None => true,
            })
    }

    /// All match offsets in `hay`, up to `limit` results.
    pub fn find_all(&self, hay: &[u8], limit: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if self.bytes.len() > hay.len() || limit == 0 {
            return out;
        }
        for at in 0..=(hay.len() - self.bytes.len()) {
            if self.matches_at(hay, at) {
                out.push(at);
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
