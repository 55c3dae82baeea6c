//! Citation prompt templates
//!
//! Templates are plain strings with `{name}` placeholders. Rendering is a
//! single pass: values are inserted verbatim and never re-scanned.

use citeforge_common::errors::{AppError, Result};
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

/// Question-answering prompt over numbered sources
pub const CITATION_QA_TEMPLATE: &str = concat!(
    "Please provide an answer based only on the given sources. ",
    "When referencing information from a source, ",
    "cite the appropriate source(s) by their numbers. ",
    "All answers should provide at least one source. ",
    "Do not use a source if it does not help answer a question. ",
    "If no sources are helpful, you should say that. ",
    "For example:\n",
    "Source 1:\n",
    "The sky is red in the evening and blue in the morning.\n",
    "Source 2:\n",
    "Water is wet when the sky is red.\n",
    "Query: When is water wet?\n",
    "Answer: Water will be wet when the sky is red [2], ",
    "which happens in the evening [1].\n",
    "Now it's your turn. Below are several numbered sources of information:",
    "\n------\n",
    "{context_str}",
    "\n------\n",
    "Query: {query_str}\n",
    "Answer: ",
);

/// Refine prompt: improves an existing answer with further sources
pub const CITATION_REFINE_TEMPLATE: &str = concat!(
    "Please provide an answer based only on the given sources. ",
    "When referencing information from a source, cite the appropriate source(s). ",
    "All answers should provide at least one source. ",
    "Do not use a source if it does not help answer a question. ",
    "For example:\n",
    "Source 1:\n",
    "The sky is red in the evening and blue in the morning.\n",
    "Source 2:\n",
    "Water is wet when the sky is red.\n",
    "Query: When is water wet?\n",
    "Answer: Water will be wet when the sky is red [2], ",
    "which happens in the evening [1].\n",
    "Now it's your turn. ",
    "We have provided an existing answer: {existing_answer}",
    "Below are several numbered sources of information. ",
    "Use them to refine the existing answer. ",
    "If the provided sources are not helpful, you will repeat the existing answer.",
    "\nBegin refining!",
    "\n------\n",
    "{context_msg}",
    "\n------\n",
    "Query: {query_str}\n",
    "Answer: ",
);

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// A prompt with named placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let mut variables: Vec<String> = Vec::new();
        for caps in placeholder().captures_iter(&template) {
            let name = &caps[1];
            if !variables.iter().any(|v| v == name) {
                variables.push(name.to_string());
            }
        }
        Self {
            template,
            variables,
        }
    }

    /// The question-answering citation template
    pub fn citation_qa() -> Self {
        Self::new(CITATION_QA_TEMPLATE)
    }

    /// The refine citation template
    pub fn citation_refine() -> Self {
        Self::new(CITATION_REFINE_TEMPLATE)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Render with `(name, value)` pairs; every placeholder needs a value
    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        if let Some(missing) = self
            .variables
            .iter()
            .find(|var| !values.iter().any(|(name, _)| name == var))
        {
            return Err(AppError::Template {
                message: format!("missing value for placeholder {{{}}}", missing),
            });
        }

        let rendered = placeholder().replace_all(&self.template, |caps: &Captures<'_>| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}
