// src/services/scope.rs

//! URL scope and anchor-text filters.
//!
//! Both predicates are pure and total: anything that cannot be parsed is
//! simply out of scope.

use url::Url;

use crate::models::{ScopeConfig, SiteContext};

/// Decide whether a candidate URL may be queued for this site.
///
/// All rules must pass:
/// 1. host equals the site's root host exactly
/// 2. scheme is http or https
/// 3. path does not end in a blocked extension
/// 4. URL does not contain an excluded keyword (case-insensitive)
pub fn is_in_scope(candidate: &str, site: &SiteContext) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };

    if parsed.host_str() != Some(site.root_host.as_str()) {
        return false;
    }

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    if has_blocked_extension(parsed.path(), &site.scope.blocked_extensions) {
        return false;
    }

    let lower = candidate.to_lowercase();
    !site
        .scope
        .excluded_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && lower.contains(&keyword.to_lowercase()))
}

fn has_blocked_extension(path: &str, blocked: &[String]) -> bool {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    // A dot in a directory name is not an extension.
    if ext.contains('/') {
        return false;
    }
    blocked.iter().any(|b| b.eq_ignore_ascii_case(ext))
}

/// Decide whether a link's anchor text marks a link worth following.
///
/// The text is rejected when it contains any banned phrase, compared
/// case-insensitively.
pub fn is_followable_anchor(text: &str, scope: &ScopeConfig) -> bool {
    let text = text.trim();
    if text.is_empty() || text.chars().count() < scope.min_anchor_chars.max(1) {
        return false;
    }

    let lower = text.to_lowercase();
    !scope.banned_anchor_phrases.iter().any(|phrase| {
        let phrase = phrase.trim();
        !phrase.is_empty() && lower.contains(&phrase.to_lowercase())
    })
}
