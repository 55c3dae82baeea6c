//! End-to-end citation query tests with deterministic collaborators

use async_trait::async_trait;
use citeforge_common::callbacks::{CallbackHandler, EventId, EventKind, EventPayload};
use citeforge_common::errors::{AppError, Result};
use citeforge_common::schema::{CitationNode, Passage, QueryBundle, Response, ScoredNode};
use citeforge_engine::{
    cited_sources, CitationQueryEngine, LanguageModel, QueryRun, QueryState, Retriever,
    StaticRetriever, Synthesizer,
};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ANSWER: &str = "Water will be wet when the sky is red [2], which happens in the evening [1].";

fn water_passages() -> Vec<Passage> {
    vec![
        ScoredNode::from_text("The sky is red in the evening and blue in the morning.", 0.9),
        ScoredNode::from_text("Water is wet when the sky is red.", 0.8),
    ]
}

/// Fixed answer; keeps every prompt it was given
#[derive(Default)]
struct RecordingModel {
    prompts: Mutex<Vec<String>>,
}

impl LanguageModel for RecordingModel {
    fn predict(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(ANSWER.to_string())
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Recorded {
    started: bool,
    kind: EventKind,
    payload: EventPayload,
    id: EventId,
}

#[derive(Default)]
struct EventRecorder {
    events: Mutex<Vec<Recorded>>,
}

impl EventRecorder {
    fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// Events without their random ids
    fn sequence(&self) -> Vec<(bool, EventKind, EventPayload)> {
        self.events()
            .into_iter()
            .map(|e| (e.started, e.kind, e.payload))
            .collect()
    }
}

impl CallbackHandler for EventRecorder {
    fn on_event_start(&self, kind: EventKind, payload: &EventPayload, id: EventId) {
        self.events.lock().unwrap().push(Recorded {
            started: true,
            kind,
            payload: payload.clone(),
            id,
        });
    }

    fn on_event_end(&self, kind: EventKind, payload: &EventPayload, id: EventId) {
        self.events.lock().unwrap().push(Recorded {
            started: false,
            kind,
            payload: payload.clone(),
            id,
        });
    }
}

/// Fails on the first call only
#[derive(Default)]
struct FlakyRetriever {
    calls: AtomicUsize,
}

impl Retriever for FlakyRetriever {
    fn retrieve(&self, _query: &QueryBundle) -> Result<Vec<Passage>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(AppError::Retrieval {
                message: "index offline".into(),
            });
        }
        Ok(water_passages())
    }
}

struct FailingSynthesizer;

impl Synthesizer for FailingSynthesizer {
    fn synthesize(
        &self,
        _query: &QueryBundle,
        _nodes: Vec<CitationNode>,
        _additional_source_nodes: Option<Vec<ScoredNode>>,
    ) -> Result<Response> {
        Err(AppError::Synthesis {
            message: "context window exceeded".into(),
        })
    }
}

/// Returns the query text as its only passage, yielding before it does
struct EchoingRetriever;

#[async_trait]
impl Retriever for EchoingRetriever {
    fn retrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>> {
        Ok(vec![ScoredNode::from_text(query.query_str.clone(), 1.0)])
    }

    async fn aretrieve(&self, query: &QueryBundle) -> Result<Vec<Passage>> {
        tokio::task::yield_now().await;
        self.retrieve(query)
    }
}

struct Fixture {
    engine: CitationQueryEngine,
    model: Arc<RecordingModel>,
    recorder: Arc<EventRecorder>,
}

fn fixture(retriever: Arc<dyn Retriever>) -> Fixture {
    let model = Arc::new(RecordingModel::default());
    let recorder = Arc::new(EventRecorder::default());
    let engine = CitationQueryEngine::builder(retriever)
        .language_model(model.clone())
        .callback_handler(recorder.clone())
        .build()
        .unwrap();

    Fixture {
        engine,
        model,
        recorder,
    }
}

fn water_fixture() -> Fixture {
    fixture(Arc::new(StaticRetriever::new(water_passages())))
}

#[test]
fn test_water_end_to_end() {
    let f = water_fixture();

    let response = f.engine.query("When is water wet?").unwrap();

    assert_eq!(response.response.as_deref(), Some(ANSWER));
    assert_eq!(response.source_nodes.len(), 2);
    assert_eq!(
        response.source_nodes[0].text(),
        "Source 1:\nThe sky is red in the evening and blue in the morning.\n"
    );
    assert_eq!(response.source_nodes[1].text(), "Source 2:\nWater is wet when the sky is red.\n");
    assert_eq!(response.source_nodes[0].score, Some(0.9));

    let prompts = f.model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(
        "------\nSource 1:\nThe sky is red in the evening and blue in the morning.\n\n\
         Source 2:\nWater is wet when the sky is red.\n\n------\n\
         Query: When is water wet?\nAnswer: "
    ));

    let cited: Vec<_> = cited_sources(ANSWER, &response.source_nodes)
        .iter()
        .filter_map(|n| n.citation_number())
        .collect();
    assert_eq!(cited, vec![1, 2]);
}

#[test]
fn test_event_order_and_payloads() {
    let f = water_fixture();
    let response = f.engine.query("When is water wet?").unwrap();

    let events = f.recorder.events();
    let order: Vec<_> = events.iter().map(|e| (e.started, e.kind)).collect();
    assert_eq!(
        order,
        vec![
            (true, EventKind::Query),
            (true, EventKind::Retrieve),
            (false, EventKind::Retrieve),
            (false, EventKind::Query),
        ]
    );

    assert_eq!(events[0].payload, EventPayload::QueryStr("When is water wet?".into()));
    assert_eq!(events[1].payload, EventPayload::Empty);
    assert_eq!(events[2].payload, EventPayload::Nodes(response.source_nodes.clone()));
    assert_eq!(events[3].payload, EventPayload::Response(response));

    assert_eq!(events[0].id, events[3].id);
    assert_eq!(events[1].id, events[2].id);
    assert_ne!(events[0].id, events[1].id);
}

#[test]
fn test_blocking_and_async_paths_agree() {
    let blocking = water_fixture();
    let suspended = water_fixture();
    let query = QueryBundle::new("When is water wet?");

    let mut blocking_run = QueryRun::new();
    let blocking_response = blocking.engine.query_with_run(&query, &mut blocking_run).unwrap();

    let mut async_run = QueryRun::new();
    let async_response =
        tokio_test::block_on(suspended.engine.aquery_with_run(&query, &mut async_run)).unwrap();

    assert_eq!(blocking_response, async_response);
    assert_eq!(
        serde_json::to_string(&blocking_response).unwrap(),
        serde_json::to_string(&async_response).unwrap()
    );
    assert_eq!(blocking.recorder.sequence(), suspended.recorder.sequence());
    assert_eq!(blocking_run, async_run);
    assert_eq!(
        blocking_run.history(),
        [
            QueryState::Idle,
            QueryState::Retrieving,
            QueryState::Chunking,
            QueryState::Synthesizing,
            QueryState::Done,
        ]
    );
}

#[test]
fn test_retriever_failure_propagates_and_engine_recovers() {
    let f = fixture(Arc::new(FlakyRetriever::default()));
    let query = QueryBundle::new("When is water wet?");

    let mut run = QueryRun::new();
    let err = f.engine.query_with_run(&query, &mut run).unwrap_err();

    assert!(matches!(err, AppError::Retrieval { ref message } if message == "index offline"));
    assert_eq!(
        run.history(),
        [QueryState::Idle, QueryState::Retrieving, QueryState::Failed]
    );
    assert!(f.recorder.events().iter().all(|e| e.started));
    assert!(f.model.prompts.lock().unwrap().is_empty());

    let response = f.engine.query(query).unwrap();
    assert_eq!(response.source_nodes.len(), 2);
}

#[tokio::test]
async fn test_synthesizer_failure_propagates() {
    let recorder = Arc::new(EventRecorder::default());
    let engine = CitationQueryEngine::builder(Arc::new(StaticRetriever::new(water_passages())))
        .synthesizer(Arc::new(FailingSynthesizer))
        .callback_handler(recorder.clone())
        .build()
        .unwrap();

    let mut run = QueryRun::new();
    let err = engine
        .aquery_with_run(&QueryBundle::new("When is water wet?"), &mut run)
        .await
        .unwrap_err();

    assert!(err.is_collaborator_error());
    assert!(matches!(err, AppError::Synthesis { .. }));
    assert_eq!(run.state(), QueryState::Failed);
    assert_eq!(run.history()[run.history().len() - 2], QueryState::Synthesizing);

    let order: Vec<_> = recorder.events().iter().map(|e| (e.started, e.kind)).collect();
    assert_eq!(
        order,
        vec![
            (true, EventKind::Query),
            (true, EventKind::Retrieve),
            (false, EventKind::Retrieve),
        ]
    );
}

#[test]
fn test_additional_sources_are_not_cited() {
    let f = water_fixture();
    let query = QueryBundle::new("When is water wet?");
    let passages = f.engine.retrieve(&query).unwrap();
    let extra = vec![
        ScoredNode::from_text("Harbour tide tables", 0.3),
        ScoredNode::from_text("Almanac for March", 0.1),
    ];

    let response = f.engine.synthesize(&query, &passages, Some(extra.clone())).unwrap();

    assert_eq!(response.source_nodes.len(), 4);
    let numbers: Vec<_> = response.source_nodes.iter().map(|n| n.citation_number()).collect();
    assert_eq!(numbers, vec![Some(1), Some(2), None, None]);
    assert_eq!(&response.source_nodes[2..], extra.as_slice());

    let prompts = f.model.prompts.lock().unwrap();
    assert!(!prompts[0].contains("Harbour tide tables"));
    assert!(!prompts[0].contains("Source 3:"));
}

#[test]
fn test_finished_run_is_rejected() {
    let f = water_fixture();
    let query = QueryBundle::new("When is water wet?");

    let mut run = QueryRun::new();
    f.engine.query_with_run(&query, &mut run).unwrap();
    let err = f.engine.query_with_run(&query, &mut run).unwrap_err();

    assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    assert_eq!(run.state(), QueryState::Done);
    assert_eq!(run.history().len(), 5);
    assert_eq!(f.recorder.events().len(), 4);
    assert_eq!(f.model.prompts.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_concurrent_async_queries_are_independent() {
    let f = fixture(Arc::new(EchoingRetriever));
    let queries = ["tides", "fog", "harbour", "evening sky"];

    let responses = join_all(queries.iter().map(|q| f.engine.aquery(*q))).await;

    for (query, response) in queries.iter().zip(responses) {
        let response = response.unwrap();
        assert_eq!(response.source_nodes.len(), 1);
        assert_eq!(response.source_nodes[0].text(), format!("Source 1:\n{}\n", query));
    }

    let events = f.recorder.events();
    assert_eq!(events.len(), queries.len() * 4);
    for start in events.iter().filter(|e| e.started) {
        let ends = events
            .iter()
            .filter(|e| !e.started && e.id == start.id && e.kind == start.kind)
            .count();
        assert_eq!(ends, 1);
    }
}

#[tokio::test]
async fn test_async_retrieval_uses_aretrieve() {
    let f = fixture(Arc::new(EchoingRetriever));

    let passages = f.engine.aretrieve(&QueryBundle::new("fog")).await.unwrap();
    assert_eq!(passages[0].text(), "fog");

    let response = f.engine.aquery("fog").await.unwrap();
    assert_eq!(response.source_nodes[0].text(), "Source 1:\nfog\n");
}
