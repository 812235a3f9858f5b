//! Prompt catalogs for summaries, analyses and investment insights
//!
//! Every selector parses leniently: unknown names fall back to `General`.

use serde::{Deserialize, Serialize};

/// System instruction for multi-document investment insights
pub const SENIOR_ANALYST_INSTRUCTIONS: &str = "You are a senior investment analyst with expertise in due diligence and financial analysis. Provide actionable insights based on the documents.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    General,
    Executive,
    Technical,
}

impl SummaryType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "executive" => SummaryType::Executive,
            "technical" => SummaryType::Technical,
            _ => SummaryType::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::General => "general",
            SummaryType::Executive => "executive",
            SummaryType::Technical => "technical",
        }
    }

    /// System prompt used when the text to summarize is sent inline
    pub fn text_prompt(&self) -> &'static str {
        match self {
            SummaryType::General => "Provide a comprehensive summary of the following text, highlighting key points and main themes:",
            SummaryType::Executive => "Create an executive summary focusing on key decisions, outcomes, and strategic implications:",
            SummaryType::Technical => "Provide a technical summary emphasizing methodologies, processes, and detailed findings:",
        }
    }

    /// Query used when the document is reached through file search
    pub fn document_prompt(&self) -> &'static str {
        match self {
            SummaryType::General => "Provide a comprehensive summary of this document, highlighting key points and main themes.",
            SummaryType::Executive => "Create an executive summary focusing on key decisions, outcomes, and strategic implications.",
            SummaryType::Technical => "Provide a technical summary emphasizing methodologies, processes, and detailed findings.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Investment,
    Financial,
    Risk,
    General,
}

impl AnalysisType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "investment" => AnalysisType::Investment,
            "financial" => AnalysisType::Financial,
            "risk" => AnalysisType::Risk,
            _ => AnalysisType::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Investment => "investment",
            AnalysisType::Financial => "financial",
            AnalysisType::Risk => "risk",
            AnalysisType::General => "general",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            AnalysisType::Investment => "Analyze this investment document and provide:
1. Risk assessment (low, medium, high) with justification
2. Key financial metrics and projections
3. Market opportunity and competitive landscape
4. Management team and execution capability
5. Potential red flags or concerns
6. Investment recommendation with rationale",
            AnalysisType::Financial => "Perform financial analysis of this document focusing on:
1. Revenue trends and growth patterns
2. Profitability metrics and margins
3. Cash flow analysis
4. Debt and leverage ratios
5. Key performance indicators
6. Financial health assessment",
            AnalysisType::Risk => "Conduct risk analysis focusing on:
1. Business risks and market factors
2. Financial risks and leverage
3. Operational risks
4. Regulatory and compliance risks
5. Risk mitigation strategies
6. Overall risk rating and explanation",
            AnalysisType::General => "Analyze this document comprehensively:
1. Document type and purpose
2. Key information and findings
3. Important data points and metrics
4. Conclusions and recommendations
5. Areas requiring attention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightFocus {
    DueDiligence,
    Valuation,
    MarketAnalysis,
    General,
}

impl InsightFocus {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "due_diligence" => InsightFocus::DueDiligence,
            "valuation" => InsightFocus::Valuation,
            "market_analysis" => InsightFocus::MarketAnalysis,
            _ => InsightFocus::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightFocus::DueDiligence => "due_diligence",
            InsightFocus::Valuation => "valuation",
            InsightFocus::MarketAnalysis => "market_analysis",
            InsightFocus::General => "general",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            InsightFocus::DueDiligence => "Perform comprehensive due diligence analysis across these documents:
1. Business model validation
2. Financial performance analysis
3. Market position assessment
4. Management team evaluation
5. Risk factor identification
6. Investment thesis validation
7. Deal structure recommendations",
            InsightFocus::Valuation => "Focus on valuation analysis:
1. Financial metrics and multiples
2. Comparable company analysis
3. Revenue and growth projections
4. Discount rates and assumptions
5. Valuation range and methodology
6. Value drivers and sensitivities",
            InsightFocus::MarketAnalysis => "Analyze market dynamics:
1. Market size and growth potential
2. Competitive landscape
3. Industry trends and disruptions
4. Customer behavior and demand
5. Regulatory environment
6. Market entry barriers",
            InsightFocus::General => "Provide comprehensive investment insights:
1. Executive summary of opportunity
2. Key strengths and advantages
3. Risk factors and mitigation
4. Financial highlights
5. Market opportunity
6. Investment recommendation",
        }
    }
}

/// Instructions for a file-search query over a set of documents
pub fn search_instructions(query: &str, scoped_to_documents: bool) -> String {
    let scope = if scoped_to_documents {
        "Specific documents"
    } else {
        "All documents in vector store"
    };

    format!(
        "You are an expert document analyst. Search through the provided documents to answer: {query}

Provide a comprehensive response that includes:
1. Direct answer to the question
2. Supporting evidence from the documents
3. Source references with page numbers when available
4. Any limitations or uncertainties in the information

Document scope: {scope}"
    )
}

/// Instructions for precise question answering over documents
pub fn qa_instructions(question: &str) -> String {
    format!(
        "You are an expert document analyst specializing in precise question answering.

Your task:
1. Answer the specific question based on the documents
2. Provide exact quotes or evidence from the source material
3. Include page numbers and section references when available
4. If the information is not in the documents, clearly state that
5. Structure your response clearly with supporting evidence

Question: {question}"
    )
}
