//! Per-query lifecycle record

use citeforge_common::errors::{AppError, Result};
use std::fmt;
use tracing::debug;

/// Phase of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    Idle,
    Retrieving,
    Chunking,
    Synthesizing,
    Done,
    Failed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Idle => "idle",
            QueryState::Retrieving => "retrieving",
            QueryState::Chunking => "chunking",
            QueryState::Synthesizing => "synthesizing",
            QueryState::Done => "done",
            QueryState::Failed => "failed",
        }
    }

    /// The only state reachable by `advance` from this one
    fn successor(&self) -> Option<QueryState> {
        match self {
            QueryState::Idle => Some(QueryState::Retrieving),
            QueryState::Retrieving => Some(QueryState::Chunking),
            QueryState::Chunking => Some(QueryState::Synthesizing),
            QueryState::Synthesizing => Some(QueryState::Done),
            QueryState::Done | QueryState::Failed => None,
        }
    }

    /// Retrieving, chunking or synthesizing
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            QueryState::Retrieving | QueryState::Chunking | QueryState::Synthesizing
        )
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States visited by one query, oldest first.
///
/// Owned by the caller of a single query; the engine keeps no run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRun {
    history: Vec<QueryState>,
}

impl Default for QueryRun {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRun {
    /// A fresh run in `Idle`
    pub fn new() -> Self {
        Self {
            history: vec![QueryState::Idle],
        }
    }

    pub fn state(&self) -> QueryState {
        self.history.last().copied().unwrap_or(QueryState::Idle)
    }

    pub fn history(&self) -> &[QueryState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state(), QueryState::Done | QueryState::Failed)
    }

    /// Move to the next pipeline state
    pub fn advance(&mut self, next: QueryState) -> Result<()> {
        let current = self.state();
        if current.successor() != Some(next) {
            return Err(invalid(current, next));
        }
        debug!(from = %current, to = %next, "Query state transition");
        self.history.push(next);
        Ok(())
    }

    /// Record a failure of the phase in progress
    pub fn fail(&mut self) -> Result<()> {
        let current = self.state();
        if !current.is_active() {
            return Err(invalid(current, QueryState::Failed));
        }
        debug!(from = %current, to = %QueryState::Failed, "Query state transition");
        self.history.push(QueryState::Failed);
        Ok(())
    }
}

fn invalid(from: QueryState, to: QueryState) -> AppError {
    AppError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut run = QueryRun::new();
        for next in [
            QueryState::Retrieving,
            QueryState::Chunking,
            QueryState::Synthesizing,
            QueryState::Done,
        ] {
            run.advance(next).unwrap();
        }

        assert_eq!(
            run.history(),
            [
                QueryState::Idle,
                QueryState::Retrieving,
                QueryState::Chunking,
                QueryState::Synthesizing,
                QueryState::Done,
            ]
        );
        assert!(run.is_terminal());
    }

    #[test]
    fn test_skipping_rejected() {
        let mut run = QueryRun::new();
        let err = run.advance(QueryState::Synthesizing).unwrap_err();

        assert!(matches!(
            err,
            AppError::InvalidStateTransition { ref from, ref to }
                if from == "idle" && to == "synthesizing"
        ));
        assert_eq!(run.state(), QueryState::Idle);
    }

    #[test]
    fn test_fail_from_active_states_only() {
        let mut idle = QueryRun::new();
        assert!(idle.fail().is_err());

        let mut run = QueryRun::new();
        run.advance(QueryState::Retrieving).unwrap();
        run.fail().unwrap();
        assert_eq!(run.state(), QueryState::Failed);
        assert!(run.is_terminal());
        assert!(run.fail().is_err());
    }

    #[test]
    fn test_terminal_run_cannot_restart() {
        let mut run = QueryRun::new();
        run.advance(QueryState::Retrieving).unwrap();
        run.fail().unwrap();

        assert!(run.advance(QueryState::Retrieving).is_err());
        assert_eq!(run.history().len(), 3);
    }
}
