//! Environment-list grammar and expansion.
//!
//! An envlist entry is a literal name optionally interleaved with brace
//! groups: `py{37,38,39,310}` or `{lint,type}-py{38,39}`. Each entry
//! expands to the Cartesian product of its groups, in declaration order.
//! The resolved list is deduplicated keeping the first occurrence, so
//! resolution is deterministic and idempotent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, Result};

/// One parsed piece of an environment spec.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Literal text outside any brace group.
    Literal(String),
    /// A brace group: one variant per comma-separated alternative.
    Group(Vec<String>),
}

/// The ordered, deduplicated expansion of an envlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEnvs {
    /// Concrete environment identifiers, declaration-ordered.
    pub ids: Vec<String>,
}

impl ResolvedEnvs {
    /// SHA-256 over the ordered identifiers. Equal digests witness that
    /// two resolutions produced byte-identical output.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for id in &self.ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.'
}

/// Parse one spec into segments, validating the brace structure.
///
/// Nested `{`, a stray `}`, and an unterminated group are all
/// [`ConfigError::UnbalancedBrace`]. An empty variant alongside other
/// variants (`py{37,}`) is [`ConfigError::EmptyVariant`]; a lone `{}`
/// is permitted and contributes the empty string.
fn parse_spec(spec: &str) -> Result<Vec<Segment>> {
    if spec.is_empty() {
        return Err(ConfigError::EmptySpec);
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut group: Option<Vec<String>> = None;
    let mut variant = String::new();

    for ch in spec.chars() {
        match ch {
            '{' => {
                if group.is_some() {
                    return Err(ConfigError::UnbalancedBrace {
                        spec: spec.to_string(),
                    });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                group = Some(Vec::new());
            }
            '}' => {
                let mut variants = group.take().ok_or_else(|| ConfigError::UnbalancedBrace {
                    spec: spec.to_string(),
                })?;
                variants.push(std::mem::take(&mut variant));
                if variants.len() > 1 && variants.iter().any(|v| v.is_empty()) {
                    return Err(ConfigError::EmptyVariant {
                        spec: spec.to_string(),
                    });
                }
                segments.push(Segment::Group(variants));
            }
            ',' => match group.as_mut() {
                Some(variants) => variants.push(std::mem::take(&mut variant)),
                None => {
                    return Err(ConfigError::InvalidCharacter {
                        spec: spec.to_string(),
                        ch,
                    })
                }
            },
            _ => {
                if !is_name_char(ch) {
                    return Err(ConfigError::InvalidCharacter {
                        spec: spec.to_string(),
                        ch,
                    });
                }
                if group.is_some() {
                    variant.push(ch);
                } else {
                    literal.push(ch);
                }
            }
        }
    }

    if group.is_some() {
        return Err(ConfigError::UnbalancedBrace {
            spec: spec.to_string(),
        });
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Expand one spec into its Cartesian product of concrete identifiers.
///
/// A spec with `k` groups of sizes `n1..nk` yields exactly `n1 * .. * nk`
/// identifiers; a spec without groups yields itself.
pub fn expand_spec(spec: &str) -> Result<Vec<String>> {
    let segments = parse_spec(spec)?;

    let mut expanded = vec![String::new()];
    for segment in &segments {
        match segment {
            Segment::Literal(text) => {
                for id in &mut expanded {
                    id.push_str(text);
                }
            }
            Segment::Group(variants) => {
                let mut next = Vec::with_capacity(expanded.len() * variants.len());
                for prefix in &expanded {
                    for v in variants {
                        let mut id = prefix.clone();
                        id.push_str(v);
                        next.push(id);
                    }
                }
                expanded = next;
            }
        }
    }

    if expanded.iter().any(|id| id.is_empty()) {
        return Err(ConfigError::EmptySpec);
    }
    Ok(expanded)
}

/// Expand every spec and union the results, keeping first occurrences.
///
/// Fails on the first malformed spec without producing partial output.
pub fn resolve_envlist(specs: &[String]) -> Result<ResolvedEnvs> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();

    for spec in specs {
        for id in expand_spec(spec)? {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }

    Ok(ResolvedEnvs { ids })
}
