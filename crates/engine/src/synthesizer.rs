//! Answer synthesis from citation nodes
//!
//! Provides:
//! - The `Synthesizer` collaborator trait
//! - A template-driven synthesizer over any `LanguageModel`
//! - Compact and refine response modes
//! - Node postprocessing ahead of prompt batching

use crate::llm::LanguageModel;
use crate::postprocessor::NodePostprocessor;
use crate::prompts::PromptTemplate;
use async_trait::async_trait;
use citeforge_common::config::{ResponseMode, SynthesisConfig};
use citeforge_common::errors::Result;
use citeforge_common::schema::{CitationNode, QueryBundle, Response, ScoredNode};
use citeforge_common::DEFAULT_MAX_CONTEXT_CHARS;
use std::sync::Arc;
use tracing::debug;

/// Produces the final answer from citation nodes.
///
/// `additional_source_nodes` are provenance only: they are returned with the
/// response but never numbered, chunked or shown to the model as sources.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn synthesize(
        &self,
        query: &QueryBundle,
        nodes: Vec<CitationNode>,
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response>;

    async fn asynthesize(
        &self,
        query: &QueryBundle,
        nodes: Vec<CitationNode>,
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        self.synthesize(query, nodes, additional_source_nodes)
    }
}

/// Separator between labeled sources packed into one prompt
const SOURCE_SEPARATOR: &str = "\n";

/// Synthesizer that renders the citation templates for a language model
pub struct ResponseSynthesizer {
    model: Arc<dyn LanguageModel>,
    qa_template: PromptTemplate,
    refine_template: PromptTemplate,
    response_mode: ResponseMode,
    max_context_chars: usize,
    postprocessors: Vec<Arc<dyn NodePostprocessor>>,
}

impl ResponseSynthesizer {
    /// Compact mode with the citation templates
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            qa_template: PromptTemplate::citation_qa(),
            refine_template: PromptTemplate::citation_refine(),
            response_mode: ResponseMode::Compact,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            postprocessors: Vec::new(),
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &SynthesisConfig) -> Self {
        Self::new(model)
            .with_response_mode(config.response_mode)
            .with_max_context_chars(config.max_context_chars)
    }

    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = response_mode;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars.max(1);
        self
    }

    /// Replace the question-answering and refine templates
    pub fn with_templates(
        mut self,
        qa_template: PromptTemplate,
        refine_template: PromptTemplate,
    ) -> Self {
        self.qa_template = qa_template;
        self.refine_template = refine_template;
        self
    }

    /// Run these postprocessors, in order, over the citation nodes
    pub fn with_postprocessors(mut self, postprocessors: Vec<Arc<dyn NodePostprocessor>>) -> Self {
        self.postprocessors = postprocessors;
        self
    }

    fn postprocess(&self, query: &QueryBundle, nodes: Vec<CitationNode>) -> Vec<CitationNode> {
        self.postprocessors
            .iter()
            .fold(nodes, |nodes, postprocessor| postprocessor.postprocess(nodes, query))
    }

    /// Group labeled source texts into one context string per model call
    fn context_batches(&self, nodes: &[CitationNode]) -> Vec<String> {
        match self.response_mode {
            ResponseMode::Refine => nodes.iter().map(|n| n.text().to_string()).collect(),
            ResponseMode::Compact => {
                let mut batches = Vec::new();
                let mut current = String::new();
                let mut current_len = 0usize;

                for node in nodes {
                    let text = node.text();
                    let len = text.chars().count();
                    if !current.is_empty() {
                        if current_len + SOURCE_SEPARATOR.len() + len > self.max_context_chars {
                            batches.push(std::mem::take(&mut current));
                            current_len = 0;
                        } else {
                            current.push_str(SOURCE_SEPARATOR);
                            current_len += SOURCE_SEPARATOR.len();
                        }
                    }
                    current.push_str(text);
                    current_len += len;
                }
                if !current.is_empty() {
                    batches.push(current);
                }
                batches
            }
        }
    }

    /// First batch answers the question, later batches refine the answer
    fn prompt(
        &self,
        query: &QueryBundle,
        context: &str,
        existing_answer: Option<&str>,
    ) -> Result<String> {
        match existing_answer {
            None => self.qa_template.format(&[
                ("context_str", context),
                ("query_str", &query.query_str),
            ]),
            Some(existing) => self.refine_template.format(&[
                ("existing_answer", existing),
                ("context_msg", context),
                ("query_str", &query.query_str),
            ]),
        }
    }
}

fn assemble(
    answer: Option<String>,
    nodes: Vec<CitationNode>,
    additional_source_nodes: Option<Vec<ScoredNode>>,
) -> Response {
    let mut source_nodes = nodes;
    source_nodes.extend(additional_source_nodes.unwrap_or_default());
    Response::new(answer, source_nodes)
}

#[async_trait]
impl Synthesizer for ResponseSynthesizer {
    fn synthesize(
        &self,
        query: &QueryBundle,
        nodes: Vec<CitationNode>,
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        let nodes = self.postprocess(query, nodes);
        let batches = self.context_batches(&nodes);
        debug!(
            model = self.model.model_name(),
            node_count = nodes.len(),
            call_count = batches.len(),
            "Synthesizing answer"
        );

        let mut answer: Option<String> = None;
        for context in &batches {
            let prompt = self.prompt(query, context, answer.as_deref())?;
            answer = Some(self.model.predict(&prompt)?);
        }

        Ok(assemble(answer, nodes, additional_source_nodes))
    }

    async fn asynthesize(
        &self,
        query: &QueryBundle,
        nodes: Vec<CitationNode>,
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        let nodes = self.postprocess(query, nodes);
        let batches = self.context_batches(&nodes);
        debug!(
            model = self.model.model_name(),
            node_count = nodes.len(),
            call_count = batches.len(),
            "Synthesizing answer"
        );

        let mut answer: Option<String> = None;
        for context in &batches {
            let prompt = self.prompt(query, context, answer.as_deref())?;
            answer = Some(self.model.apredict(&prompt).await?);
        }

        Ok(assemble(answer, nodes, additional_source_nodes))
    }
}
