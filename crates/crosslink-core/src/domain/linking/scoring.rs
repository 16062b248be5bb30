//! Relevance scoring heuristics
//!
//! Pure functions, no I/O. Internal linking uses a two-tier
//! first-match-wins scheme (keyword substring, then title-token overlap);
//! external linking uses an additive score over topical keyword groups
//! plus a trust baseline. Matching is deliberately substring/token based:
//! the goal is a deterministic, auditable batch job, not a search engine.

use super::entity::{Article, AuthoritySource, LinkSuggestion, MatchType};

/// A primary keyword must be longer than this to count (char count)
const MIN_KEYWORD_CHARS: usize = 3;

/// A title token must be longer than this to count (char count)
const MIN_TITLE_TOKEN_CHARS: usize = 4;

/// Minimum distinct title tokens that must appear in the source body
const MIN_TITLE_TOKEN_HITS: usize = 2;

/// Portuguese function words excluded from title tokenization.
///
/// Tokens of four characters or fewer are dropped before this list is
/// consulted, so only longer function words need listing.
const STOP_WORDS: &[&str] = &[
    "ainda", "antes", "assim", "contra", "depois", "desde", "deste", "desta", "durante",
    "enquanto", "entre", "estão", "foram", "mesma", "mesmo", "muito", "nesta", "neste", "nunca",
    "outra", "outras", "outro", "outros", "pelas", "pelos", "porque", "quais", "qualquer",
    "quando", "quanto", "sejam", "sempre", "serão", "sobre", "também", "todas", "todos",
];

/// Topical keyword groups for external citation matching.
///
/// A group contributes a bonus only when the article text and the source
/// metadata both contain a token of the same group.
const TOPIC_GROUPS: &[(&str, &[&str])] = &[
    (
        "carbon",
        &[
            "carbono",
            "carbon",
            "co2",
            "emissões",
            "emissão",
            "descarbonização",
            "compensação",
        ],
    ),
    (
        "esg",
        &[
            "esg",
            "sustentabilidade",
            "sustentável",
            "governança",
            "ambiental",
        ],
    ),
    (
        "blockchain",
        &[
            "blockchain",
            "tokenização",
            "token",
            "cripto",
            "web3",
            "rastreabilidade",
        ],
    ),
    (
        "energy",
        &[
            "energia",
            "renovável",
            "renováveis",
            "solar",
            "eólica",
            "biomassa",
        ],
    ),
    (
        "financial",
        &[
            "financeiro",
            "investimento",
            "investidores",
            "mercado de capitais",
            "ativos",
        ],
    ),
    (
        "regulatory",
        &[
            "regulação",
            "regulamentação",
            "regulatório",
            "compliance",
            "auditoria",
            "certificação",
        ],
    ),
];

/// Score an internal-linking candidate against a source article.
///
/// `source_body` must already be case-folded (fold once per source
/// article, not per candidate). Two tiers, first match wins:
///
/// 1. The candidate's primary keyword (> 3 chars) appears as a substring
///    of the source body -> keyword match, anchored on the keyword.
/// 2. At least two significant title tokens appear in the source body ->
///    title match, anchored on the full title.
///
/// A candidate failing both tiers yields `None`; there is no partial
/// credit and no numeric score on this path.
pub fn score_internal(source_body: &str, candidate: &Article) -> Option<LinkSuggestion> {
    if let Some(keyword) = &candidate.primary_keyword {
        if keyword.chars().count() > MIN_KEYWORD_CHARS
            && source_body.contains(&keyword.to_lowercase())
        {
            return Some(LinkSuggestion {
                target_id: candidate.id,
                anchor_text: keyword.clone(),
                match_type: MatchType::Keyword,
                score: None,
            });
        }
    }

    let tokens = title_tokens(&candidate.title);
    let hits = tokens
        .iter()
        .filter(|token| source_body.contains(token.as_str()))
        .count();
    if hits >= MIN_TITLE_TOKEN_HITS {
        return Some(LinkSuggestion {
            target_id: candidate.id,
            anchor_text: candidate.title.clone(),
            match_type: MatchType::Title,
            score: None,
        });
    }

    None
}

/// Extract the significant tokens of an article title.
///
/// Whitespace tokenization, punctuation trimmed, case-folded; tokens of
/// four characters or fewer and stop words are dropped.
pub fn title_tokens(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| token.chars().count() > MIN_TITLE_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// Score an external-citation candidate against an article.
///
/// `article_text` must be the article's case-folded combined text
/// (title + keyword + body). Each topical group adds `group_bonus` when
/// both the article text and the source metadata contain a token of that
/// group; the source's trust score contributes a tenth of its value as an
/// unconditional baseline.
pub fn score_external(article_text: &str, source: &AuthoritySource, group_bonus: f64) -> f64 {
    let metadata = source.combined_metadata();
    let mut score = 0.0;

    for (_, tokens) in TOPIC_GROUPS {
        let article_hit = tokens.iter().any(|token| article_text.contains(token));
        let source_hit = tokens.iter().any(|token| metadata.contains(token));
        if article_hit && source_hit {
            score += group_bonus;
        }
    }

    score + source.trust_score / 10.0
}
