//! Query construction and candidate ordering for company research.

use reqwest::Url;

use crate::schema::{SearchPlan, SearchResult};

/// Used when no industry keyword matches the job posting.
pub const GENERIC_MARKET_KEYWORD: &str = "市場動向";

const INDUSTRY_KEYWORDS: &[(&str, &[&str])] = &[
    ("防衛産業", &["防衛", "レーダー", "ミサイル", "衛星", "航空宇宙", "defense", "aerospace"]),
    ("自動車産業", &["自動車", "EV", "ADAS", "電動化", "モビリティ", "automotive"]),
    ("製薬産業", &["製薬", "医薬品", "創薬", "バイオ", "pharma", "biotech"]),
    ("金融業界", &["金融", "銀行", "保険", "フィンテック", "fintech", "banking"]),
    ("IT業界", &["IT", "ソフトウェア", "システム開発", "SaaS", "software", "backend"]),
    ("製造業", &["製造", "工場", "生産", "FA", "manufacturing"]),
];

const LEGAL_FORM_TOKENS: &[&str] = &[
    "株式会社",
    "ホールディングス",
    "Holdings",
    "HD",
    "Inc.",
    "Inc",
    "Corporation",
    "Corp.",
    "Corp",
    "Co., Ltd.",
    "Ltd.",
];

const DOCUMENT_LINK_TOKENS: &[&str] = &[
    "ir",
    "investor",
    "finance",
    "financial",
    "report",
    "settlement",
    "yuuka",
    "kessan",
    "earnings",
    "disclosure",
];

const DOCUMENT_TITLE_TOKENS: &[&str] = &["決算", "ir", "investor", "financial", "annual report"];

/// IR / annual report documents first, company profile pages as the fallback.
pub fn company_plan(company_name: &str) -> SearchPlan {
    let company = company_name.trim();
    SearchPlan {
        primary: format!("{company} 決算説明資料 IR annual report pdf"),
        fallback: format!("{company} 会社概要 事業内容"),
    }
}

pub fn market_plan(industry: &str) -> SearchPlan {
    let industry = industry.trim();
    SearchPlan {
        primary: format!("{industry} 市場規模 成長率"),
        fallback: format!("{industry} トレンド"),
    }
}

/// Picks the first industry whose keywords occur in the posting.
///
/// Short acronyms ("IT", "EV") only match case-sensitively.
pub fn classify_industry(job_posting: &str) -> &'static str {
    let lowered = job_posting.to_lowercase();
    INDUSTRY_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                job_posting.contains(*kw)
                    || (kw.len() > 3 && lowered.contains(&kw.to_lowercase()))
            })
        })
        .map(|(industry, _)| *industry)
        .unwrap_or(GENERIC_MARKET_KEYWORD)
}

/// The company name plus its forms without legal-entity tokens.
pub fn company_aliases(company_name: &str) -> Vec<String> {
    let full = company_name.trim().to_string();
    let mut aliases = vec![full.clone()];

    let stripped = strip_legal_forms(&full);

    // Very short remainders ("A", "NE") match far too much text
    if stripped.chars().count() > 2 && stripped != full {
        aliases.push(stripped);
    }
    aliases
}

/// Removes legal-form tokens from either end of the name until none is left.
fn strip_legal_forms(name: &str) -> String {
    let mut rest = name.trim().to_string();
    loop {
        let Some(next) = LEGAL_FORM_TOKENS
            .iter()
            .find_map(|token| strip_legal_form(&rest, token))
        else {
            return rest;
        };
        rest = next;
    }
}

/// Latin tokens only count as whole words; `株式会社` and friends attach directly.
fn strip_legal_form(name: &str, token: &str) -> Option<String> {
    const SEPARATORS: [char; 2] = [' ', ','];
    let whole_word = token.is_ascii();

    if let Some(head) = name.strip_suffix(token) {
        if !whole_word || head.is_empty() || head.ends_with(SEPARATORS) {
            return Some(head.trim_end_matches(SEPARATORS).trim().to_string());
        }
    }
    if let Some(tail) = name.strip_prefix(token) {
        if !whole_word || tail.is_empty() || tail.starts_with(SEPARATORS) {
            return Some(tail.trim_start_matches(SEPARATORS).trim().to_string());
        }
    }
    None
}

pub fn mentions_company(text: &str, company_name: &str) -> bool {
    company_aliases(company_name)
        .iter()
        .any(|alias| !alias.is_empty() && text.contains(alias.as_str()))
}

pub fn is_document_link(url: &str) -> bool {
    let lowered = url.to_lowercase();
    let path = lowered.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".pdf") && DOCUMENT_LINK_TOKENS.iter().any(|t| path.contains(*t))
}

fn document_score(company_name: &str, result: &SearchResult) -> u32 {
    let title = result.title.to_lowercase();
    let mut score = 0;

    if company_aliases(company_name)
        .iter()
        .any(|alias| result.title.contains(alias.as_str()))
    {
        score += 10;
    }
    if DOCUMENT_TITLE_TOKENS.iter().any(|kw| title.contains(*kw)) {
        score += 5;
    }
    if ["2025", "2024", "2023"].iter().any(|year| title.contains(*year)) {
        score += 3;
    }
    score
}

/// Absolute http(s) URL with a host.
pub fn is_fetchable_link(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// Document-looking links first (by title score, stable), then the rest in input order.
/// Links that cannot be fetched are dropped.
pub fn rank_document_candidates(
    company_name: &str,
    results: &[SearchResult],
    max_candidates: usize,
) -> Vec<String> {
    let mut documents: Vec<(u32, &SearchResult)> = results
        .iter()
        .filter(|r| is_fetchable_link(&r.url) && is_document_link(&r.url))
        .map(|r| (document_score(company_name, r), r))
        .collect();
    documents.sort_by(|a, b| b.0.cmp(&a.0));

    let mut links: Vec<String> = Vec::new();
    let ordered = documents
        .into_iter()
        .map(|(_, r)| r)
        .chain(
            results
                .iter()
                .filter(|r| is_fetchable_link(&r.url) && !is_document_link(&r.url)),
        );

    for result in ordered {
        if !links.contains(&result.url) {
            links.push(result.url.clone());
        }
    }
    links.truncate(max_candidates);
    links
}
