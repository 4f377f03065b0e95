use std::collections::{BTreeMap, HashSet};

use extract::ExtractedDocument;
use search::SearchResult;

use crate::schema::{InfoBundle, Query};

/// Merge search leads and the extracted document into one bundle.
///
/// Blank snippets and byte-identical repeats are dropped; everything else is
/// kept verbatim and in input order.
pub fn aggregate(
    query: &Query,
    search_results: &[SearchResult],
    extracted_document: &ExtractedDocument,
) -> InfoBundle {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut raw_snippets = Vec::new();

    for result in search_results {
        let snippet = result.snippet.as_str();
        if snippet.trim().is_empty() || !seen.insert(snippet) {
            continue;
        }
        if result.title.trim().is_empty() {
            raw_snippets.push(snippet.to_string());
        } else {
            raw_snippets.push(format!("{}\n{}", result.title, snippet));
        }
    }

    let mut structured_facts = BTreeMap::new();
    structured_facts.insert("company_name".to_string(), query.company_name().to_string());
    structured_facts.insert(
        "search_result_count".to_string(),
        search_results.len().to_string(),
    );

    let documents = if extracted_document.extraction_succeeded {
        structured_facts.insert("document_status".to_string(), "extracted".to_string());
        structured_facts.insert(
            "document_source".to_string(),
            extracted_document.source_url.clone(),
        );
        vec![extracted_document.clone()]
    } else {
        structured_facts.insert("document_status".to_string(), "unavailable".to_string());
        Vec::new()
    };

    InfoBundle {
        company_name: query.company_name().to_string(),
        job_posting_text: query.job_posting_text().to_string(),
        structured_facts,
        raw_snippets,
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Query {
        Query::new("Acme Corp", "Senior Backend Engineer, Tokyo").unwrap()
    }

    #[test]
    fn test_dedup_and_order() {
        let results = vec![
            SearchResult::new("A", "https://a", "same text"),
            SearchResult::new("B", "https://b", "other text"),
            SearchResult::new("C", "https://c", "same text"),
            SearchResult::new("D", "https://d", "  "),
            SearchResult::new("", "https://e", "untitled"),
            SearchResult::new("F", "https://f", "same text "),
        ];

        let bundle = aggregate(&query(), &results, &ExtractedDocument::failed());

        assert_eq!(
            bundle.raw_snippets,
            vec!["A\nsame text", "B\nother text", "untitled", "F\nsame text "]
        );
        assert_eq!(bundle.structured_facts["search_result_count"], "6");
        assert_eq!(bundle.structured_facts["document_status"], "unavailable");
        assert!(!bundle.structured_facts.contains_key("document_source"));
        assert!(bundle.documents.is_empty());
    }

    #[test]
    fn test_extracted_document_is_carried() {
        let doc = ExtractedDocument::succeeded("https://acme.example/ir.pdf", "Revenue 5.2B".into());
        let bundle = aggregate(&query(), &[], &doc);

        assert_eq!(bundle.documents, vec![doc]);
        assert_eq!(bundle.structured_facts["document_source"], "https://acme.example/ir.pdf");
        assert_eq!(bundle.job_posting_text, "Senior Backend Engineer, Tokyo");
    }

    #[test]
    fn test_deterministic() {
        let results = vec![SearchResult::new("A", "https://a", "x")];
        let doc = ExtractedDocument::failed();
        assert_eq!(aggregate(&query(), &results, &doc), aggregate(&query(), &results, &doc));
    }
}
