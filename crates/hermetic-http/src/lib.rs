// Hermetic HTTP test doubles: an expectation-matching mock server, file
// based record/replay, and an intercepting proxy that records real traffic.

// ===== Matching engine =====
pub mod filter;
pub mod matcher;
pub mod model;
pub mod store;

// ===== Record / replay =====
pub mod codec;
pub mod proxy;
pub mod replay;

// ===== Serving =====
pub mod config;
pub mod transport;

pub use matcher::{BoundMatcher, MatchingStrategy, RequestMatcher};
pub use model::{Content, ContentComparator, Method, Request, Response};
pub use store::{ExpectationStore, ResponseProvider, UnsatisfiedExpectation};
pub use transport::MockServer;
