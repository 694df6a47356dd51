//! In-memory expectation store.

use super::{Expectation, ProviderError, ResponseProvider, UnsatisfiedExpectation};
use crate::matcher::MatchingStrategy;
use crate::model::{Request, Response};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Status answered for unmatched requests unless configured otherwise.
pub const DEFAULT_NOT_FOUND_STATUS: u16 = 500;

/// Mutable state, guarded by one lock so a whole resolve is atomic.
#[derive(Debug, Default)]
struct StoreState {
    expectations: Vec<Expectation<Response>>,
    unexpected: Vec<Request>,
}

/// Expectations declared by a test, resolved against inbound requests.
///
/// Resolution tries an exact match against the unfiltered request first,
/// then each registered strategy in registration order. The first
/// expectation that matches and still has an unconsumed response wins.
#[derive(Debug)]
pub struct ExpectationStore {
    strategies: Vec<MatchingStrategy>,
    not_found_status: u16,
    state: Mutex<StoreState>,
}

impl Default for ExpectationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpectationStore {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            not_found_status: DEFAULT_NOT_FOUND_STATUS,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Register a strategy tried after the exact match, in registration order.
    pub fn with_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_not_found_status(mut self, status: u16) -> Self {
        self.not_found_status = status;
        self
    }

    /// Declare that `request` should be answered with `response`. Declaring
    /// the same request again queues another response behind the first.
    pub fn expect(&self, request: Request, response: Response) {
        let mut state = self.state.lock();
        match state
            .expectations
            .iter_mut()
            .find(|e| e.request().as_ref() == &request)
        {
            Some(existing) => existing.slots_mut().push(response),
            None => {
                debug!("New expectation: {} {}", request.method(), request.path());
                let mut expectation = Expectation::new(request);
                expectation.slots_mut().push(response);
                state.expectations.push(expectation);
            }
        }
    }

    /// Resolve `candidate` to a declared response, consuming it.
    pub fn resolve(&self, candidate: &Request) -> Option<Response> {
        let mut state = self.state.lock();

        if let Some(response) = state
            .expectations
            .iter_mut()
            .filter(|e| e.slots().has_unconsumed())
            .find(|e| e.request().as_ref() == candidate)
            .and_then(|e| e.slots_mut().consume().cloned())
        {
            debug!(
                "Exact match for {} {}",
                candidate.method(),
                candidate.path()
            );
            return Some(response);
        }

        let candidate_arc = Arc::new(candidate.clone());
        let placeholder = Arc::new(Response::new(200));
        for strategy in &self.strategies {
            for expectation in state.expectations.iter_mut() {
                if !expectation.slots().has_unconsumed() {
                    continue;
                }
                let Some(context) =
                    strategy.try_match(expectation.request(), &candidate_arc, &placeholder)
                else {
                    continue;
                };
                let Some(stored) = expectation.slots_mut().consume() else {
                    continue;
                };
                debug!(
                    "Strategy '{}' matched {} {}",
                    strategy.matcher().name(),
                    candidate.method(),
                    candidate.path()
                );
                return Some(strategy.matcher().adapt(
                    context.expected(),
                    stored,
                    context.candidate(),
                ));
            }
        }

        warn!(
            "Unexpected request: {} {}",
            candidate.method(),
            candidate.path_and_query()
        );
        state.unexpected.push(candidate.clone());
        None
    }

    /// Report every unconsumed response and every unexpected request.
    pub fn verify(&self) -> Result<(), UnsatisfiedExpectation> {
        let state = self.state.lock();
        UnsatisfiedExpectation {
            missing: state
                .expectations
                .iter()
                .flat_map(|e| e.missing())
                .collect(),
            unexpected: state.unexpected.clone(),
        }
        .into_result()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.expectations.clear();
        state.unexpected.clear();
    }

    pub fn unexpected_requests(&self) -> Vec<Request> {
        self.state.lock().unexpected.clone()
    }

    /// Number of declared responses not yet consumed.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .expectations
            .iter()
            .map(|e| e.slots().unconsumed().len())
            .sum()
    }

    /// Number of distinct expected requests.
    pub fn len(&self) -> usize {
        self.state.lock().expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseProvider for ExpectationStore {
    fn resolve(&self, request: &Request) -> Result<Option<Response>, ProviderError> {
        Ok(ExpectationStore::resolve(self, request))
    }

    fn verify(&self) -> Result<(), ProviderError> {
        ExpectationStore::verify(self).map_err(ProviderError::from)
    }

    fn reset(&self) {
        ExpectationStore::reset(self)
    }

    fn not_found_status(&self) -> u16 {
        self.not_found_status
    }
}
