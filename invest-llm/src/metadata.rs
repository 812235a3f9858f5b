//! Filename and content based document metadata
//!
//! Extracted metadata is attached to vector store files as attributes so
//! searches can be scoped and results explained.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// "Acme Holdings Corp", "Globex Inc" (suffix matched case-insensitively)
static COMPANY_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(?i:corp|inc|ltd|llc|company|co)\b").unwrap()
});

static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2,})\b").unwrap());

static CAMEL_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+)\b").unwrap());

static CONTENT_COMPANY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(?:Inc|Corp|Ltd|LLC)\b").unwrap()
});

/// Document type keywords, checked in order; first hit wins
const DOCUMENT_TYPES: &[(&str, &[&str])] = &[
    ("financial", &["financial", "finance", "earnings", "revenue", "profit", "loss", "balance", "income", "cash flow"]),
    ("annual report", &["annual", "yearly", "10k", "10 k"]),
    ("quarterly report", &["quarterly", "quarter", "10q", "10 q", "q1", "q2", "q3", "q4"]),
    ("presentation", &["presentation", "deck", "slides", "ppt", "pitch"]),
    ("research", &["research", "analysis", "study", "report"]),
    ("prospectus", &["prospectus", "offering", "ipo"]),
    ("due_diligence", &["due diligence", "dd", "diligence"]),
    ("investment", &["investment", "invest", "funding", "round"]),
    ("contract", &["contract", "agreement", "terms", "conditions"]),
    ("legal", &["legal", "law", "regulation", "compliance"]),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("financial_statements", &["balance sheet", "income statement", "cash flow", "p&l", "profit loss"]),
    ("market_research", &["market", "industry", "sector", "competitive"]),
    ("investment_materials", &["investment", "funding", "valuation", "term sheet"]),
    ("legal_documents", &["contract", "agreement", "legal", "terms"]),
    ("operational", &["operations", "business plan", "strategy"]),
    ("compliance", &["compliance", "regulatory", "audit"]),
];

const FINANCIAL_TERMS: &[&str] = &["revenue", "ebitda", "margin", "profit", "loss", "assets", "liabilities"];
const INVESTMENT_TERMS: &[&str] = &["valuation", "funding", "investment", "roi", "irr", "multiple"];

pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

/// Metadata derived from a document's filename (and optionally its content)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub original_filename: String,
    /// Lowercase extension including the dot, empty if none
    pub file_extension: String,
    /// RFC 3339 extraction time
    pub extracted_at: String,
    pub year: Option<String>,
    pub company: Option<String>,
    pub document_type: String,
    pub category: String,
    /// Share of {year, company, known document type} found, 0.0 to 1.0
    pub extraction_confidence: f64,
}

/// Extract metadata from a filename using keyword tables and patterns
pub fn extract_metadata_from_filename(filename: &str) -> DocumentMetadata {
    let path = Path::new(filename);
    let file_extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let clean_name = filename.to_lowercase().replace(['_', '-'], " ");
    let display_name = stem.replace(['_', '-'], " ");

    let year = YEAR_RE.find(&clean_name).map(|m| m.as_str().to_string());
    let company = find_company(&display_name);

    let document_type = first_keyword_match(DOCUMENT_TYPES, &clean_name)
        .unwrap_or_else(|| document_type_for_extension(&file_extension))
        .to_string();

    let category = first_keyword_match(CATEGORIES, &clean_name)
        .unwrap_or("general")
        .to_string();

    let found = [
        year.is_some(),
        company.is_some(),
        document_type != UNKNOWN_DOCUMENT_TYPE,
    ]
    .iter()
    .filter(|hit| **hit)
    .count();

    DocumentMetadata {
        original_filename: filename.to_string(),
        file_extension,
        extracted_at: invest_common::time::now_rfc3339(),
        year,
        company,
        document_type,
        category,
        extraction_confidence: (found as f64 / 3.0).min(1.0),
    }
}

fn find_company(name: &str) -> Option<String> {
    [&*COMPANY_SUFFIX_RE, &*ACRONYM_RE, &*CAMEL_CASE_RE]
        .iter()
        .find_map(|re| re.captures(name).map(|c| c[1].to_string()))
}

fn first_keyword_match(table: &'static [(&'static str, &'static [&'static str])], haystack: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(name, _)| *name)
}

fn document_type_for_extension(ext: &str) -> &'static str {
    match ext {
        ".pdf" => "document",
        ".xls" | ".xlsx" | ".csv" => "financial",
        ".ppt" | ".pptx" => "presentation",
        _ => UNKNOWN_DOCUMENT_TYPE,
    }
}

impl DocumentMetadata {
    /// Refine metadata with a sample of the document text
    pub fn enhance_with_content(&mut self, content_sample: &str) {
        if content_sample.is_empty() {
            return;
        }

        let lower = content_sample.to_lowercase();

        if self.document_type == UNKNOWN_DOCUMENT_TYPE
            && FINANCIAL_TERMS.iter().any(|t| lower.contains(t))
        {
            self.document_type = "financial".to_string();
        }

        if INVESTMENT_TERMS.iter().any(|t| lower.contains(t)) {
            self.category = "investment_materials".to_string();
        }

        if self.company.is_none() {
            self.company = CONTENT_COMPANY_RE
                .captures(content_sample)
                .map(|c| c[1].to_string());
        }
    }

    /// Render as vector store file attributes
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("original_filename".into(), Value::from(self.original_filename.clone()));
        attrs.insert("file_extension".into(), Value::from(self.file_extension.clone()));
        attrs.insert("extracted_at".into(), Value::from(self.extracted_at.clone()));
        if let Some(year) = &self.year {
            attrs.insert("year".into(), Value::from(year.clone()));
        }
        if let Some(company) = &self.company {
            attrs.insert("company".into(), Value::from(company.clone()));
        }
        attrs.insert("document_type".into(), Value::from(self.document_type.clone()));
        attrs.insert("category".into(), Value::from(self.category.clone()));
        attrs.insert("extraction_confidence".into(), Value::from(self.extraction_confidence));
        attrs
    }
}
