//! Hand-off to the analysis step
//!
//! The data layer stops at [`AnalysisInput`]: the user question plus the
//! bounded context. Whatever model answers it sits behind [`AnalysisEngine`].

use async_trait::async_trait;
use serde::Serialize;

use crate::context::{AnalysisScope, Context};

const SYSTEM_PROMPT: &str = "\
You are FinQ, an expert financial analyst AI assistant with deep knowledge of:
- Financial statement analysis (Income Statement, Balance Sheet, Cash Flow)
- Market analysis and stock valuation
- Economic indicators and macroeconomic trends
- SEC filings and regulatory compliance
- Risk assessment and financial modeling

Guidelines:
- Base your analysis only on the evidence provided
- Be specific with numbers and metrics when available
- Highlight trends and patterns
- Identify potential risks or concerns
- If evidence is missing or insufficient, say which data would help
- Format responses with clear sections and bullet points when appropriate";

/// Everything the analysis step receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisInput {
    pub question: String,
    pub scope: AnalysisScope,
    /// Tickers with local fundamentals, offered to the model as candidates
    pub available_companies: Vec<String>,
    pub context: Context,
}

impl AnalysisInput {
    pub fn new(question: impl Into<String>, context: Context) -> Self {
        Self {
            question: question.into().trim().to_string(),
            scope: context.scope(),
            available_companies: Vec::new(),
            context,
        }
    }

    pub fn with_available_companies(mut self, tickers: Vec<String>) -> Self {
        self.available_companies = tickers;
        self
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Question, scope and evidence in one message
    pub fn user_prompt(&self) -> String {
        let mut parts = vec![
            format!("User Question: {}", self.question),
            format!("Analysis Scope: {}", self.scope),
        ];
        if !self.available_companies.is_empty() {
            parts.push(format!("Available Companies: {}", self.available_companies.join(", ")));
        }

        if self.context.is_empty() {
            parts.push("Evidence: none could be retrieved for this request.".to_string());
        } else {
            parts.push(format!("Evidence:\n{}", self.context.render()));
        }

        parts.push(
            "Please provide a comprehensive analysis based on the evidence above.".to_string(),
        );
        parts.join("\n\n")
    }
}

/// A model that answers an [`AnalysisInput`]
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn analyze(&self, input: &AnalysisInput) -> Result<String, Self::Error>;

    /// Engine name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextBuilder, SizeBudget};
    use crate::manager::ResultBundle;

    fn empty_context(scope: AnalysisScope) -> Context {
        ContextBuilder::default().build(&ResultBundle::new(vec![]), scope, SizeBudget::Chars(100))
    }

    #[test]
    fn test_user_prompt_without_evidence() {
        let input = AnalysisInput::new("  How is the labor market?  ", empty_context(AnalysisScope::Macro));

        assert_eq!(input.question, "How is the labor market?");
        assert_eq!(input.scope, AnalysisScope::Macro);
        let prompt = input.user_prompt();
        assert!(prompt.starts_with("User Question: How is the labor market?\n\nAnalysis Scope: macro"));
        assert!(prompt.contains("none could be retrieved"));
    }

    #[test]
    fn test_user_prompt_lists_available_companies() {
        let input = AnalysisInput::new("Compare margins", empty_context(AnalysisScope::Fundamentals))
            .with_available_companies(vec!["AAPL".to_string(), "MSFT".to_string()]);

        let prompt = input.user_prompt();
        assert!(prompt.contains("Analysis Scope: fundamentals\n\nAvailable Companies: AAPL, MSFT\n\nEvidence"));

        let bare = AnalysisInput::new("Compare margins", empty_context(AnalysisScope::Fundamentals));
        assert!(!bare.user_prompt().contains("Available Companies"));
    }

    #[test]
    fn test_system_prompt_names_assistant() {
        let input = AnalysisInput::new("q", empty_context(AnalysisScope::Company));
        assert!(input.system_prompt().starts_with("You are FinQ"));
    }
}
