//! Citation query orchestration
//!
//! Sequences retrieval, citation chunking and synthesis. The blocking and
//! async paths share every step except the two collaborator calls, so they
//! produce the same responses, events and state histories.

mod state;

pub use state::{QueryRun, QueryState};

use crate::citation::CitationNodeBuilder;
use crate::document::{split_document, Document};
use crate::llm::LanguageModel;
use crate::postprocessor::NodePostprocessor;
use crate::retriever::Retriever;
use crate::splitter::{OverlapSplitter, Splitter};
use crate::synthesizer::{ResponseSynthesizer, Synthesizer};
use citeforge_common::callbacks::{
    CallbackHandler, CallbackManager, EventId, EventKind, EventPayload, TracingHandler,
};
use citeforge_common::config::{AppConfig, ChunkingConfig, SynthesisConfig};
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::{self, QueryMetrics, QueryPath};
use citeforge_common::schema::{CitationNode, Passage, QueryBundle, Response, ScoredNode};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Retrieval-augmented query engine whose answers cite numbered sources
pub struct CitationQueryEngine {
    retriever: Arc<dyn Retriever>,
    synthesizer: Arc<dyn Synthesizer>,
    citation_builder: CitationNodeBuilder,
    source_splitter: Arc<dyn Splitter>,
    callback_manager: CallbackManager,
}

/// Event ids of the phases opened by `begin`
struct OpenEvents {
    query: EventId,
    retrieve: EventId,
}

impl CitationQueryEngine {
    pub fn builder(retriever: Arc<dyn Retriever>) -> CitationQueryEngineBuilder {
        CitationQueryEngineBuilder::new(retriever)
    }

    /// Engine wired from application configuration, logging events via tracing
    pub fn from_config(
        config: &AppConfig,
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        config.validate()?;

        Self::builder(retriever)
            .language_model(model)
            .synthesis_config(config.synthesis.clone())
            .source_chunking(config.source.clone())
            .citation_chunking(config.citation.clone())
            .callback_handler(Arc::new(TracingHandler))
            .build()
    }

    pub fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    /// Retrieval-granularity splitter, for preparing passages
    pub fn source_splitter(&self) -> &Arc<dyn Splitter> {
        &self.source_splitter
    }

    pub fn callback_manager(&self) -> &CallbackManager {
        &self.callback_manager
    }

    /// Split a document into passages with the source splitter
    pub fn split_document(&self, document: &Document) -> Vec<Passage> {
        split_document(document, self.source_splitter.as_ref())
    }

    /// Re-split passages into numbered citation nodes
    pub fn create_citation_nodes(&self, passages: &[Passage]) -> Vec<CitationNode> {
        let nodes = self.citation_builder.build(passages);
        metrics::record_citation_nodes(nodes.len());
        nodes
    }

    pub fn retrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>> {
        self.retriever.retrieve(query)
    }

    pub async fn aretrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>> {
        self.retriever.aretrieve(query).await
    }

    /// Answer from already retrieved passages.
    ///
    /// Passages become citation nodes; `additional_source_nodes` are passed
    /// through unnumbered.
    pub fn synthesize(
        &self,
        query: &QueryBundle,
        passages: &[Passage],
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        let nodes = self.create_citation_nodes(passages);
        self.synthesizer.synthesize(query, nodes, additional_source_nodes)
    }

    pub async fn asynthesize(
        &self,
        query: &QueryBundle,
        passages: &[Passage],
        additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        let nodes = self.create_citation_nodes(passages);
        self.synthesizer
            .asynthesize(query, nodes, additional_source_nodes)
            .await
    }

    /// Run the full pipeline, blocking the caller
    pub fn query(&self, query: impl Into<QueryBundle>) -> Result<Response> {
        let mut run = QueryRun::new();
        self.query_with_run(&query.into(), &mut run)
    }

    /// Run the full pipeline, recording visited states in `run`
    #[instrument(skip_all, fields(path = "blocking"))]
    pub fn query_with_run(&self, query: &QueryBundle, run: &mut QueryRun) -> Result<Response> {
        let query_metrics = QueryMetrics::start(QueryPath::Blocking);

        let result = self.run_blocking(query, run);
        settle(&result, run);

        query_metrics.finish(result.is_ok());
        result
    }

    /// Run the full pipeline without blocking the scheduler
    pub async fn aquery(&self, query: impl Into<QueryBundle>) -> Result<Response> {
        let mut run = QueryRun::new();
        self.aquery_with_run(&query.into(), &mut run).await
    }

    #[instrument(skip_all, fields(path = "async"))]
    pub async fn aquery_with_run(
        &self,
        query: &QueryBundle,
        run: &mut QueryRun,
    ) -> Result<Response> {
        let query_metrics = QueryMetrics::start(QueryPath::Async);

        let result = self.run_async(query, run).await;
        settle(&result, run);

        query_metrics.finish(result.is_ok());
        result
    }

    fn run_blocking(&self, query: &QueryBundle, run: &mut QueryRun) -> Result<Response> {
        let events = self.begin(query, run)?;
        let passages = self.retriever.retrieve(query)?;
        let nodes = self.finish_retrieval(passages, &events, run)?;
        let response = self.synthesizer.synthesize(query, nodes, None)?;
        self.complete(response, &events, run)
    }

    async fn run_async(&self, query: &QueryBundle, run: &mut QueryRun) -> Result<Response> {
        let events = self.begin(query, run)?;
        let passages = self.retriever.aretrieve(query).await?;
        let nodes = self.finish_retrieval(passages, &events, run)?;
        let response = self.synthesizer.asynthesize(query, nodes, None).await?;
        self.complete(response, &events, run)
    }

    /// Enter retrieval and announce the query and retrieval phases
    fn begin(&self, query: &QueryBundle, run: &mut QueryRun) -> Result<OpenEvents> {
        run.advance(QueryState::Retrieving)?;

        let query_event = self
            .callback_manager
            .on_event_start(EventKind::Query, EventPayload::QueryStr(query.query_str.clone()));
        let retrieve_event = self
            .callback_manager
            .on_event_start(EventKind::Retrieve, EventPayload::Empty);

        Ok(OpenEvents {
            query: query_event,
            retrieve: retrieve_event,
        })
    }

    /// Chunk retrieved passages and close the retrieval phase with the nodes
    fn finish_retrieval(
        &self,
        passages: Vec<Passage>,
        events: &OpenEvents,
        run: &mut QueryRun,
    ) -> Result<Vec<CitationNode>> {
        run.advance(QueryState::Chunking)?;
        metrics::record_retrieval(passages.len());

        let nodes = self.create_citation_nodes(&passages);
        info!(
            passage_count = passages.len(),
            citation_count = nodes.len(),
            "Passages chunked into citation nodes"
        );

        self.callback_manager.on_event_end(
            EventKind::Retrieve,
            EventPayload::Nodes(nodes.clone()),
            events.retrieve,
        );
        run.advance(QueryState::Synthesizing)?;
        Ok(nodes)
    }

    fn complete(
        &self,
        response: Response,
        events: &OpenEvents,
        run: &mut QueryRun,
    ) -> Result<Response> {
        run.advance(QueryState::Done)?;
        self.callback_manager.on_event_end(
            EventKind::Query,
            EventPayload::Response(response.clone()),
            events.query,
        );
        Ok(response)
    }
}

/// Mark the run failed when a phase in progress raised an error
fn settle(result: &Result<Response>, run: &mut QueryRun) {
    if let Err(err) = result {
        warn!(state = %run.state(), error = %err, "Citation query failed");
        if let Err(rejected) = run.fail() {
            debug!(error = %rejected, "Run already settled");
        }
    }
}

/// Builder for [`CitationQueryEngine`]
pub struct CitationQueryEngineBuilder {
    retriever: Arc<dyn Retriever>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    synthesis_config: Option<SynthesisConfig>,
    source_chunking: ChunkingConfig,
    citation_chunking: ChunkingConfig,
    source_splitter: Option<Arc<dyn Splitter>>,
    citation_splitter: Option<Arc<dyn Splitter>>,
    node_postprocessors: Vec<Arc<dyn NodePostprocessor>>,
    callback_manager: CallbackManager,
}

impl CitationQueryEngineBuilder {
    fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            synthesizer: None,
            language_model: None,
            synthesis_config: None,
            source_chunking: ChunkingConfig::source_default(),
            citation_chunking: ChunkingConfig::citation_default(),
            source_splitter: None,
            citation_splitter: None,
            node_postprocessors: Vec::new(),
            callback_manager: CallbackManager::default(),
        }
    }

    /// Use this synthesizer; takes precedence over `language_model`
    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Synthesize with a [`ResponseSynthesizer`] over this model
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    pub fn synthesis_config(mut self, config: SynthesisConfig) -> Self {
        self.synthesis_config = Some(config);
        self
    }

    pub fn source_chunking(mut self, config: ChunkingConfig) -> Self {
        self.source_chunking = config;
        self
    }

    pub fn citation_chunking(mut self, config: ChunkingConfig) -> Self {
        self.citation_chunking = config;
        self
    }

    /// Custom source splitter; `source_chunking` is then ignored
    pub fn source_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.source_splitter = Some(splitter);
        self
    }

    /// Custom citation splitter; `citation_chunking` is then ignored
    pub fn citation_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.citation_splitter = Some(splitter);
        self
    }

    /// Filter or rerank citation nodes before synthesis, in registration order.
    ///
    /// Applies to the synthesizer built from `language_model`.
    pub fn node_postprocessor(mut self, postprocessor: Arc<dyn NodePostprocessor>) -> Self {
        self.node_postprocessors.push(postprocessor);
        self
    }

    pub fn callback_manager(mut self, callback_manager: CallbackManager) -> Self {
        self.callback_manager = callback_manager;
        self
    }

    pub fn callback_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callback_manager.add_handler(handler);
        self
    }

    pub fn build(self) -> Result<CitationQueryEngine> {
        let synthesizer: Arc<dyn Synthesizer> = match (self.synthesizer, self.language_model) {
            (Some(_), _) if !self.node_postprocessors.is_empty() => {
                return Err(AppError::Configuration {
                    message: "node postprocessors need a language model, not a custom synthesizer"
                        .to_string(),
                })
            }
            (Some(synthesizer), _) => synthesizer,
            (None, Some(model)) => {
                let synthesizer = match &self.synthesis_config {
                    Some(config) => ResponseSynthesizer::from_config(model, config),
                    None => ResponseSynthesizer::new(model),
                };
                Arc::new(synthesizer.with_postprocessors(self.node_postprocessors))
            }
            (None, None) => {
                return Err(AppError::Configuration {
                    message: "a synthesizer or language model is required".to_string(),
                })
            }
        };

        let source_splitter: Arc<dyn Splitter> = match self.source_splitter {
            Some(splitter) => splitter,
            None => Arc::new(OverlapSplitter::new(&self.source_chunking)?),
        };
        let citation_splitter: Arc<dyn Splitter> = match self.citation_splitter {
            Some(splitter) => splitter,
            None => Arc::new(OverlapSplitter::new(&self.citation_chunking)?),
        };

        Ok(CitationQueryEngine {
            retriever: self.retriever,
            synthesizer,
            citation_builder: CitationNodeBuilder::new(citation_splitter),
            source_splitter,
            callback_manager: self.callback_manager,
        })
    }
}
