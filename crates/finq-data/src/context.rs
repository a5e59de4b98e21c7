//! Bounded, deterministic analysis context
//!
//! [`ContextBuilder::build`] turns a [`ResultBundle`] into text fragments,
//! orders them by how relevant their family is to the analysis scope and keeps
//! the longest prefix of that order that fits the size budget. Fragments are
//! never cut in the middle. Failure notes are placed first since they are the
//! only trace of evidence that could not be fetched.
//!
//! The same bundle, scope and budget always render byte-identical output:
//! fields iterate in sorted order, numbers use [`crate::record::format_number`]
//! and timestamps are RFC 3339 with second precision.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::key::{ProviderFamily, SourceKey};
use crate::manager::ResultBundle;
use crate::record::{FieldValue, NormalizedRecord, format_point};

/// Default number of trailing points rendered per series
pub const DEFAULT_MAX_SERIES_POINTS: usize = 12;

/// Focus of the analysis; decides which families lead the context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisScope {
    #[default]
    Company,
    Macro,
    Filings,
    Fundamentals,
}

impl AnalysisScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisScope::Company => "company",
            AnalysisScope::Macro => "macro",
            AnalysisScope::Filings => "filings",
            AnalysisScope::Fundamentals => "fundamentals",
        }
    }

    /// Families that answer the question directly
    pub fn primary(&self) -> &'static [ProviderFamily] {
        use ProviderFamily::{Filings, Fundamentals, Macro, Market};
        match self {
            AnalysisScope::Company => &[Market, Fundamentals],
            AnalysisScope::Macro => &[Macro],
            AnalysisScope::Filings => &[Filings],
            AnalysisScope::Fundamentals => &[Fundamentals],
        }
    }

    /// Families that give useful background
    pub fn supporting(&self) -> &'static [ProviderFamily] {
        use ProviderFamily::{Filings, Fundamentals, Macro, Market};
        match self {
            AnalysisScope::Company => &[Filings, Macro],
            AnalysisScope::Macro => &[Market],
            AnalysisScope::Filings => &[Fundamentals, Market],
            AnalysisScope::Fundamentals => &[Market, Filings],
        }
    }

    /// (tier, position within tier); lower sorts first
    fn rank(self, family: ProviderFamily) -> (u8, usize) {
        if let Some(i) = self.primary().iter().position(|f| *f == family) {
            return (0, i);
        }
        if let Some(i) = self.supporting().iter().position(|f| *f == family) {
            return (1, i);
        }
        (2, family as usize)
    }
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "company" => Ok(Self::Company),
            "macro" => Ok(Self::Macro),
            "filings" => Ok(Self::Filings),
            "fundamentals" => Ok(Self::Fundamentals),
            other => Err(format!("unknown analysis scope: {other}")),
        }
    }
}

/// Upper bound on the rendered context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBudget {
    /// Unicode scalar values
    Chars(usize),
    /// Estimated model tokens, four characters each, rounded up
    Tokens(usize),
}

impl SizeBudget {
    pub fn limit(&self) -> usize {
        match self {
            SizeBudget::Chars(n) | SizeBudget::Tokens(n) => *n,
        }
    }

    /// Size of `text` in this budget's unit
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            SizeBudget::Chars(_) => chars,
            SizeBudget::Tokens(_) => chars.div_ceil(4),
        }
    }

    pub fn fits(&self, text: &str) -> bool {
        self.measure(text) <= self.limit()
    }
}

impl fmt::Display for SizeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBudget::Chars(n) => write!(f, "{n} chars"),
            SizeBudget::Tokens(n) => write!(f, "{n} tokens"),
        }
    }
}

/// Rendered text for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFragment {
    pub key: SourceKey,
    pub family: ProviderFamily,
    pub text: String,
}

/// The bounded package handed to the analysis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    scope: AnalysisScope,
    budget: SizeBudget,
    fragments: Vec<ContextFragment>,
    notes: Vec<String>,
    omitted: Vec<SourceKey>,
    omitted_notes: usize,
    show_omitted: bool,
}

impl Context {
    fn empty(scope: AnalysisScope, budget: SizeBudget) -> Self {
        Self {
            scope,
            budget,
            fragments: Vec::new(),
            notes: Vec::new(),
            omitted: Vec::new(),
            omitted_notes: 0,
            show_omitted: false,
        }
    }

    pub fn scope(&self) -> AnalysisScope {
        self.scope
    }

    pub fn budget(&self) -> SizeBudget {
        self.budget
    }

    /// Kept fragments in priority order
    pub fn fragments(&self) -> &[ContextFragment] {
        &self.fragments
    }

    /// Failure notes that made it into the budget
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Keys whose fragments were dropped to fit the budget
    pub fn omitted(&self) -> &[SourceKey] {
        &self.omitted
    }

    /// Failure notes dropped because even they did not fit
    pub fn omitted_notes(&self) -> usize {
        self.omitted_notes
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.notes.is_empty()
    }

    /// Size of [`Context::render`] in the budget's unit
    pub fn size(&self) -> usize {
        self.budget.measure(&self.render())
    }

    /// Final text: notes, fragments, then the omission line when shown
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();
        if !self.notes.is_empty() {
            sections.push(format!("Missing evidence:\n{}", self.notes.join("\n")));
        }
        sections.extend(self.fragments.iter().map(|f| f.text.clone()));
        if self.show_omitted {
            sections.push(omission_line(self.omitted.len()));
        }
        sections.join("\n\n")
    }

    fn fits(&self) -> bool {
        self.budget.fits(&self.render())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn omission_line(count: usize) -> String {
    format!("({count} lower-priority records omitted to fit budget)")
}

/// Serializes result bundles into bounded contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    max_series_points: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SERIES_POINTS)
    }
}

impl ContextBuilder {
    pub fn new(max_series_points: usize) -> Self {
        Self { max_series_points }
    }

    /// Compact text for one record, labeled with its key and provenance
    pub fn fragment(&self, key: &SourceKey, record: &NormalizedRecord) -> String {
        let mut text = format!(
            "### {key} | {} | {}",
            record.provider(),
            record.fetched_at().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        for (name, value) in record.fields() {
            text.push_str("\n- ");
            text.push_str(name);
            text.push_str(": ");
            text.push_str(&self.render_value(value));
        }
        text
    }

    fn render_value(&self, value: &FieldValue) -> String {
        let FieldValue::Series(points) = value else {
            return value.to_string();
        };
        let start = points.len().saturating_sub(self.max_series_points);
        let shown: Vec<String> = points[start..].iter().map(format_point).collect();
        if start > 0 {
            format!("(last {} of {}) {}", shown.len(), points.len(), shown.join(", "))
        } else {
            shown.join(", ")
        }
    }

    /// Build the context for `bundle` under `scope` within `budget`
    pub fn build(&self, bundle: &ResultBundle, scope: AnalysisScope, budget: SizeBudget) -> Context {
        let mut context = Context::empty(scope, budget);

        let mut notes_full = false;
        for failure in bundle.failures() {
            if !notes_full {
                context.notes.push(failure.note());
                if context.fits() {
                    continue;
                }
                context.notes.pop();
                notes_full = true;
            }
            context.omitted_notes += 1;
        }

        let mut ranked: Vec<_> = bundle
            .successes()
            .map(|(key, record)| (scope.rank(key.family()), key.to_string(), key, record))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut fragments_full = notes_full;
        for (_, _, key, record) in ranked {
            if !fragments_full {
                context.fragments.push(ContextFragment {
                    key: key.clone(),
                    family: key.family(),
                    text: self.fragment(key, record),
                });
                if context.fits() {
                    continue;
                }
                context.fragments.pop();
                fragments_full = true;
            }
            context.omitted.push(key.clone());
        }

        if !context.omitted.is_empty() {
            context.show_omitted = true;
            if !context.fits() {
                context.show_omitted = false;
            }
        }

        tracing::debug!(
            %scope,
            %budget,
            fragments = context.fragments.len(),
            notes = context.notes.len(),
            omitted = context.omitted.len(),
            "Built analysis context"
        );
        context
    }
}
