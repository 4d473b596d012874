//! Entity resolver.
//!
//! Maps a free-form hint (e.g. "billing documents") onto a concrete entity
//! set in the discovery snapshot. Resolution is pure and deterministic: the
//! same snapshot and hint always produce the same outcome, and no network
//! traffic is involved.
//!
//! The ladder:
//! 1. Exact case-insensitive entity set name match scores 1.0 and beats any
//!    fuzzy candidate outright; only another entity set with the same exact
//!    name can contend with it.
//! 2. Otherwise the hint is tokenized (separator and camelCase boundaries,
//!    lowercased) and scored by token overlap against the candidate's name
//!    tokens plus its owning service's title tokens: an exact token hit earns
//!    full credit, a substring hit earns partial credit, and the sum is
//!    normalized by the size of the token union.
//!
//! A best score below the threshold is a no-match error. Candidates within the
//! tie margin of the best are an ambiguity error carrying every contender.

use sap_odata_config::constants::{
    DEFAULT_MATCH_THRESHOLD, DEFAULT_PARTIAL_WEIGHT, DEFAULT_TIE_MARGIN,
};

use crate::error::{ClientError, Result};
use crate::models::{MatchResult, MatchedTerm, SystemSnapshot};

/// Tunables for hint resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// Minimum best score required for any resolution.
    pub threshold: f64,
    /// Candidates scoring within this margin of the best are tied.
    pub tie_margin: f64,
    /// Credit for a substring (non-exact) token hit.
    pub partial_weight: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            tie_margin: DEFAULT_TIE_MARGIN,
            partial_weight: DEFAULT_PARTIAL_WEIGHT,
        }
    }
}

/// Split an identifier or phrase into lowercase tokens. Both separator
/// characters and camelCase boundaries split: `BillingDocumentItem` and
/// `billing document item` tokenize identically.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.dedup();
    tokens
}

/// Score a tokenized hint against a candidate name's tokens.
fn score_tokens(
    hint_tokens: &[String],
    candidate_tokens: &[String],
    partial_weight: f64,
) -> (f64, Vec<MatchedTerm>) {
    if hint_tokens.is_empty() || candidate_tokens.is_empty() {
        return (0.0, Vec::new());
    }

    let mut credit = 0.0;
    let mut matched_terms = Vec::new();
    for hint in hint_tokens {
        // Prefer an exact token hit over any substring hit.
        if let Some(token) = candidate_tokens.iter().find(|t| *t == hint) {
            credit += 1.0;
            matched_terms.push(MatchedTerm {
                hint: hint.clone(),
                matched: token.clone(),
                partial: false,
            });
            continue;
        }
        if let Some(token) = candidate_tokens
            .iter()
            .find(|t| t.contains(hint.as_str()) || hint.contains(t.as_str()))
        {
            credit += partial_weight;
            matched_terms.push(MatchedTerm {
                hint: hint.clone(),
                matched: token.clone(),
                partial: true,
            });
        }
    }

    let union = hint_tokens
        .iter()
        .chain(candidate_tokens.iter().filter(|t| !hint_tokens.contains(t)))
        .count();
    (credit / union as f64, matched_terms)
}

/// Score every entity set in the snapshot against the hint, best first.
/// An optional service hint restricts candidates to that service (matched
/// case-insensitively against the technical service name).
pub fn rank(
    snapshot: &SystemSnapshot,
    hint: &str,
    service_hint: Option<&str>,
    config: &ResolverConfig,
) -> Vec<MatchResult> {
    let hint_trimmed = hint.trim();
    let hint_tokens = tokenize(hint_trimmed);

    let mut results: Vec<MatchResult> = snapshot
        .all_entity_sets()
        .filter(|(svc, _)| match service_hint {
            Some(wanted) => svc.name.eq_ignore_ascii_case(wanted.trim()),
            None => true,
        })
        .map(|(svc, entity_set)| {
            if entity_set.name.eq_ignore_ascii_case(hint_trimmed) {
                return MatchResult {
                    entity_set: entity_set.clone(),
                    score: 1.0,
                    matched_terms: vec![MatchedTerm {
                        hint: hint_trimmed.to_lowercase(),
                        matched: entity_set.name.to_lowercase(),
                        partial: false,
                    }],
                };
            }
            // The owning service's title contributes candidate tokens too:
            // a hint like "billing" may only appear in the service label.
            let mut candidate_tokens = tokenize(&entity_set.name);
            for token in tokenize(&svc.title) {
                if !candidate_tokens.contains(&token) {
                    candidate_tokens.push(token);
                }
            }
            let (score, matched_terms) =
                score_tokens(&hint_tokens, &candidate_tokens, config.partial_weight);
            MatchResult {
                entity_set: entity_set.clone(),
                score,
                matched_terms,
            }
        })
        .filter(|r| r.score > 0.0)
        .collect();

    // Stable order: score descending, then name for determinism across runs.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_set.name.cmp(&b.entity_set.name))
    });
    results
}

/// Resolve a hint to exactly one entity set, or fail with a no-match or
/// ambiguity error.
pub fn resolve(
    snapshot: &SystemSnapshot,
    hint: &str,
    service_hint: Option<&str>,
    config: &ResolverConfig,
) -> Result<MatchResult> {
    if let Some(wanted) = service_hint {
        if snapshot.service(wanted.trim()).is_none()
            && !snapshot
                .services
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(wanted.trim()))
        {
            return Err(ClientError::UnknownService {
                service: wanted.trim().to_string(),
            });
        }
    }

    let ranked = rank(snapshot, hint, service_hint, config);

    // An exact name match settles resolution before any tie evaluation:
    // fuzzy candidates can reach 1.0 too (tokenwise-identical names), but
    // they never contend with an exact match. Only a second entity set with
    // the same exact name forces ambiguity.
    let exact: Vec<&MatchResult> = ranked
        .iter()
        .filter(|r| r.entity_set.name.eq_ignore_ascii_case(hint.trim()))
        .collect();
    match exact.as_slice() {
        [] => {}
        [winner] => return Ok((*winner).clone()),
        several => {
            return Err(ClientError::AmbiguousMatch {
                hint: hint.to_string(),
                candidates: several.iter().map(|r| (*r).clone()).collect(),
            });
        }
    }

    let Some(best) = ranked.first() else {
        return Err(ClientError::NoMatch {
            hint: hint.to_string(),
            best_score: 0.0,
            threshold: config.threshold,
        });
    };

    if best.score < config.threshold {
        return Err(ClientError::NoMatch {
            hint: hint.to_string(),
            best_score: best.score,
            threshold: config.threshold,
        });
    }

    let tied: Vec<MatchResult> = ranked
        .iter()
        .take_while(|r| best.score - r.score <= config.tie_margin)
        .cloned()
        .collect();
    if tied.len() > 1 {
        return Err(ClientError::AmbiguousMatch {
            hint: hint.to_string(),
            candidates: tied,
        });
    }

    Ok(best.clone())
}
