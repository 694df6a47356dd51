use crate::codec::{CodecError, ExchangeCodec};
use crate::matcher::BoundMatcher;
use crate::model::{Request, Response};
use crate::store::{ProviderError, ResponseProvider, ResponseSlots, UnsatisfiedExpectation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Status answered for unmatched requests during replay unless configured otherwise.
pub const DEFAULT_REPLAY_NOT_FOUND_STATUS: u16 = 404;

/// Where a recorded response lives. Nothing is cached; `load` reads the
/// files every time.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    codec: Arc<ExchangeCodec>,
    sequence: u32,
}

impl RecordedResponse {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn load(&self) -> Result<Response, CodecError> {
        self.codec.read_response(self.sequence)
    }
}

#[derive(Debug)]
struct Binding {
    matcher: BoundMatcher,
    slots: ResponseSlots<RecordedResponse>,
}

impl Binding {
    fn new(matcher: BoundMatcher) -> Self {
        Self {
            matcher,
            slots: ResponseSlots::new(),
        }
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    bindings: Option<Vec<Binding>>,
    unexpected: Vec<Request>,
}

/// Serves the exchanges recorded under one base name in one directory.
///
/// Every recorded request is bound to the most recently registered custom
/// matcher that accepts it, or else to an exact matcher for that request.
/// Identical recorded requests share a binding, so they are answered in
/// recording order.
#[derive(Debug)]
pub struct FileReplayProvider {
    codec: Arc<ExchangeCodec>,
    not_found_status: u16,
    custom: Vec<BoundMatcher>,
    state: Mutex<ReplayState>,
}

impl FileReplayProvider {
    pub fn new(codec: ExchangeCodec) -> Self {
        Self {
            codec: Arc::new(codec),
            not_found_status: DEFAULT_REPLAY_NOT_FOUND_STATUS,
            custom: Vec::new(),
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Register a custom matcher. Later registrations take precedence when
    /// several accept the same recorded request.
    pub fn with_matcher(mut self, matcher: BoundMatcher) -> Self {
        self.custom.push(matcher);
        self
    }

    pub fn with_not_found_status(mut self, status: u16) -> Self {
        self.not_found_status = status;
        self
    }

    pub fn codec(&self) -> &ExchangeCodec {
        &self.codec
    }

    /// Number of recorded exchanges, loading them if needed.
    pub fn recorded_exchanges(&self) -> Result<usize, CodecError> {
        let mut guard = self.state.lock();
        let bindings = self.loaded(&mut guard.bindings)?;
        Ok(bindings.iter().map(|b| b.slots.len()).sum())
    }

    pub fn resolve(&self, candidate: &Request) -> Result<Option<Response>, CodecError> {
        let candidate = Arc::new(candidate.clone());

        let hit = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let bindings = self.loaded(&mut state.bindings)?;

            let index = bindings
                .iter()
                .position(|b| {
                    b.slots.has_unconsumed() && b.matcher.expected().as_ref() == candidate.as_ref()
                })
                .or_else(|| {
                    bindings
                        .iter()
                        .position(|b| b.slots.has_unconsumed() && b.matcher.matches(&candidate))
                });

            let hit = index.and_then(|i| {
                let binding = &mut bindings[i];
                let recorded = binding.slots.consume().cloned()?;
                Some((binding.matcher.clone(), recorded))
            });
            if hit.is_none() {
                warn!(
                    "Unexpected request during replay: {} {}",
                    candidate.method(),
                    candidate.path_and_query()
                );
                state.unexpected.push(candidate.as_ref().clone());
            }
            hit
        };

        let Some((matcher, recorded)) = hit else {
            return Ok(None);
        };
        debug!(
            "Replaying exchange #{} for {} {}",
            recorded.sequence(),
            candidate.method(),
            candidate.path()
        );
        let response = recorded.load()?;
        Ok(Some(matcher.adapt(response, &candidate)))
    }

    pub fn verify(&self) -> Result<(), ProviderError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let bindings = self.loaded(&mut state.bindings)?;
        let missing = bindings
            .iter()
            .flat_map(|b| {
                b.slots
                    .unconsumed()
                    .iter()
                    .map(|_| b.matcher.expected().as_ref().clone())
            })
            .collect();
        UnsatisfiedExpectation {
            missing,
            unexpected: state.unexpected.clone(),
        }
        .into_result()
        .map_err(ProviderError::from)
    }

    /// Forget loaded bindings and the unexpected log; the next lookup re-scans.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.bindings = None;
        state.unexpected.clear();
    }

    pub fn unexpected_requests(&self) -> Vec<Request> {
        self.state.lock().unexpected.clone()
    }

    fn loaded<'a>(
        &self,
        bindings: &'a mut Option<Vec<Binding>>,
    ) -> Result<&'a mut Vec<Binding>, CodecError> {
        let loaded = match bindings.take() {
            Some(existing) => existing,
            None => self.load()?,
        };
        Ok(bindings.insert(loaded))
    }

    fn load(&self) -> Result<Vec<Binding>, CodecError> {
        let mut bindings: Vec<Binding> = self
            .custom
            .iter()
            .rev()
            .cloned()
            .map(Binding::new)
            .collect();
        let custom_count = bindings.len();

        let mut sequence = 1;
        while self.codec.has_request(sequence) {
            if !self.codec.has_response(sequence) {
                return Err(CodecError::MissingRecording(
                    self.codec.paths(sequence).response,
                ));
            }
            // Bodies stay on disk, but a broken response file fails here
            self.codec.read_response_head(sequence)?;
            let request = Arc::new(self.codec.read_request(sequence)?);
            let recorded = RecordedResponse {
                codec: Arc::clone(&self.codec),
                sequence,
            };

            let custom = bindings[..custom_count]
                .iter()
                .position(|b| b.matcher.matches(&request));
            let auto = || {
                bindings[custom_count..]
                    .iter()
                    .position(|b| b.matcher.expected() == &request)
                    .map(|i| i + custom_count)
            };
            match custom.or_else(auto) {
                Some(i) => bindings[i].slots.push(recorded),
                None => {
                    let mut binding = Binding::new(BoundMatcher::exact(request.as_ref().clone()));
                    binding.slots.push(recorded);
                    bindings.push(binding);
                }
            }
            sequence += 1;
        }

        if sequence == 1 {
            return Err(CodecError::MissingRecording(self.codec.paths(1).request));
        }
        info!(
            "Loaded {} recorded exchange(s) for '{}' from {}",
            sequence - 1,
            self.codec.base_name(),
            self.codec.directory().display()
        );
        Ok(bindings)
    }
}

impl ResponseProvider for FileReplayProvider {
    fn resolve(&self, request: &Request) -> Result<Option<Response>, ProviderError> {
        FileReplayProvider::resolve(self, request).map_err(ProviderError::from)
    }

    fn verify(&self) -> Result<(), ProviderError> {
        FileReplayProvider::verify(self)
    }

    fn reset(&self) {
        FileReplayProvider::reset(self)
    }

    fn not_found_status(&self) -> u16 {
        self.not_found_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchingStrategy, RequestMatcher, SimpleMatcher};
    use crate::model::Method;
    use std::fs;
    use tempfile::TempDir;

    fn get(path: &str) -> Request {
        Request::builder(Method::Get, path).build().unwrap()
    }

    fn body(response: &Response) -> String {
        String::from_utf8(response.content().unwrap().to_vec()).unwrap()
    }

    fn recorded(dir: &TempDir, exchanges: &[(Request, Response)]) -> ExchangeCodec {
        let codec = ExchangeCodec::new(dir.path(), "ex");
        for (i, (request, response)) in exchanges.iter().enumerate() {
            codec
                .write_exchange(i as u32 + 1, request, response)
                .unwrap();
        }
        codec
    }

    #[test]
    fn test_identical_recordings_replay_in_order() {
        let dir = TempDir::new().unwrap();
        let codec = recorded(
            &dir,
            &[
                (get("/a"), Response::new(200).with_content("first")),
                (get("/b"), Response::new(200).with_content("other")),
                (get("/a"), Response::new(200).with_content("second")),
            ],
        );
        let provider = FileReplayProvider::new(codec);
        assert_eq!(provider.recorded_exchanges().unwrap(), 3);

        assert_eq!(body(&provider.resolve(&get("/a")).unwrap().unwrap()), "first");
        assert_eq!(body(&provider.resolve(&get("/a")).unwrap().unwrap()), "second");
        assert!(provider.resolve(&get("/a")).unwrap().is_none());

        let err = provider.verify().unwrap_err();
        match err {
            ProviderError::Unsatisfied(u) => {
                assert_eq!(u.missing, vec![get("/b")]);
                assert_eq!(u.unexpected, vec![get("/a")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_responses_are_read_from_disk_on_each_hit() {
        let dir = TempDir::new().unwrap();
        let codec = recorded(
            &dir,
            &[
                (get("/a"), Response::new(200).with_content("old")),
                (get("/a"), Response::new(200).with_content("old")),
            ],
        );
        let entity = codec.paths(2).response_entity;
        let provider = FileReplayProvider::new(codec);
        assert_eq!(body(&provider.resolve(&get("/a")).unwrap().unwrap()), "old");

        fs::write(entity, "new").unwrap();
        assert_eq!(body(&provider.resolve(&get("/a")).unwrap().unwrap()), "new");
    }

    #[test]
    fn test_missing_response_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let codec = recorded(&dir, &[(get("/a"), Response::new(200))]);
        fs::remove_file(codec.paths(1).response).unwrap();
        let provider = FileReplayProvider::new(codec.clone());

        let err = provider.resolve(&get("/a")).unwrap_err();
        assert!(matches!(err, CodecError::MissingRecording(ref p) if p == &codec.paths(1).response));
    }

    #[test]
    fn test_malformed_response_file_fails_before_any_slot_is_used() {
        let dir = TempDir::new().unwrap();
        let codec = recorded(
            &dir,
            &[
                (get("/a"), Response::new(200).with_content("ok")),
                (get("/b"), Response::new(200)),
            ],
        );
        fs::write(codec.paths(2).response, "garbage\n").unwrap();
        let provider = FileReplayProvider::new(codec.clone());

        let err = provider.resolve(&get("/a")).unwrap_err();
        assert!(
            matches!(err, CodecError::MalformedRecording { ref path, .. } if path == &codec.paths(2).response)
        );
        assert!(matches!(
            provider.verify(),
            Err(ProviderError::Recording(CodecError::MalformedRecording { .. }))
        ));
    }

    #[test]
    fn test_empty_directory_is_missing_recording() {
        let dir = TempDir::new().unwrap();
        let provider = FileReplayProvider::new(ExchangeCodec::new(dir.path(), "none"));
        assert!(matches!(
            provider.recorded_exchanges(),
            Err(CodecError::MissingRecording(_))
        ));
    }

    #[test]
    fn test_later_custom_matcher_takes_precedence() {
        #[derive(Debug)]
        struct Tagging(&'static str);
        impl RequestMatcher for Tagging {
            fn name(&self) -> &'static str {
                self.0
            }
            fn matches(&self, expected: &Request, candidate: &Request) -> bool {
                SimpleMatcher.matches(expected, candidate)
            }
            fn adapt(&self, _: &Request, response: &Response, _: &Request) -> Response {
                Response::new(response.status()).with_content(self.0)
            }
        }

        let dir = TempDir::new().unwrap();
        let noisy = Request::builder(Method::Get, "/a")
            .header("X-Trace", "1")
            .build()
            .unwrap();
        let codec = recorded(&dir, &[(noisy, Response::new(200))]);
        let provider = FileReplayProvider::new(codec)
            .with_matcher(BoundMatcher::new(get("/a"), MatchingStrategy::new(Tagging("early"))))
            .with_matcher(BoundMatcher::new(get("/a"), MatchingStrategy::new(Tagging("late"))));

        let candidate = Request::builder(Method::Get, "/a")
            .header("X-Trace", "2")
            .build()
            .unwrap();
        let response = provider.resolve(&candidate).unwrap().unwrap();
        assert_eq!(body(&response), "late");
        assert!(provider.verify().is_ok());
    }

    #[test]
    fn test_reset_rescans_recordings() {
        let dir = TempDir::new().unwrap();
        let codec = recorded(&dir, &[(get("/a"), Response::new(200).with_content("x"))]);
        let provider = FileReplayProvider::new(codec);

        assert!(provider.resolve(&get("/a")).unwrap().is_some());
        assert!(provider.resolve(&get("/a")).unwrap().is_none());
        assert_eq!(provider.unexpected_requests().len(), 1);

        provider.reset();
        assert!(provider.unexpected_requests().is_empty());
        assert!(provider.resolve(&get("/a")).unwrap().is_some());
        assert!(provider.verify().is_ok());
    }

    #[test]
    fn test_default_not_found_status() {
        let provider = FileReplayProvider::new(ExchangeCodec::new("/nonexistent", "x"));
        assert_eq!(ResponseProvider::not_found_status(&provider), 404);
        let provider = provider.with_not_found_status(418);
        assert_eq!(ResponseProvider::not_found_status(&provider), 418);
    }
}
