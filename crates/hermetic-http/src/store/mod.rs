//! Declared expectations and the providers that answer from them.
//!
//! - `slots` - consumption-ordered response slots
//! - `expectation` - an expected request plus its slots
//! - `memory` - `ExpectationStore`, the in-memory mock provider
//!
//! Both the in-memory store and the file replay provider implement
//! `ResponseProvider`, which is what the mock server drives.

mod expectation;
mod memory;
mod slots;

pub use expectation::Expectation;
pub use memory::{ExpectationStore, DEFAULT_NOT_FOUND_STATUS};
pub use slots::ResponseSlots;

use crate::codec::CodecError;
use crate::model::{Request, Response};
use std::fmt;
use thiserror::Error;

/// Something that resolves inbound requests to declared responses.
pub trait ResponseProvider: Send + Sync {
    /// Consume and return the response for `request`, or `None` when nothing
    /// matches (the request is then logged as unexpected).
    fn resolve(&self, request: &Request) -> Result<Option<Response>, ProviderError>;

    /// Fail unless every declared response was consumed and nothing unexpected arrived.
    fn verify(&self) -> Result<(), ProviderError>;

    /// Forget every expectation and the unexpected-request log.
    fn reset(&self);

    /// Status answered when `resolve` finds no match.
    fn not_found_status(&self) -> u16;
}

/// Errors surfaced by response providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Recording(#[from] CodecError),
    #[error(transparent)]
    Unsatisfied(#[from] UnsatisfiedExpectation),
}

/// Verification failure: declared responses never consumed, and requests
/// nothing matched. A partly consumed expectation appears in `missing` once
/// per unconsumed slot.
#[derive(Debug, Clone, Default)]
pub struct UnsatisfiedExpectation {
    pub missing: Vec<Request>,
    pub unexpected: Vec<Request>,
}

impl UnsatisfiedExpectation {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }

    /// `Err(self)` when anything is missing or unexpected.
    pub fn into_result(self) -> Result<(), UnsatisfiedExpectation> {
        if self.is_satisfied() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for UnsatisfiedExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected request(s) not received, {} unexpected request(s)",
            self.missing.len(),
            self.unexpected.len()
        )?;
        for request in &self.missing {
            write!(f, "\nmissing: {} {}", request.method(), request.path_and_query())?;
        }
        for request in &self.unexpected {
            write!(
                f,
                "\nunexpected: {} {}",
                request.method(),
                request.path_and_query()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsatisfiedExpectation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    #[test]
    fn test_unsatisfied_display_lists_requests() {
        let err = UnsatisfiedExpectation {
            missing: vec![Request::builder(Method::Get, "/a").build().unwrap()],
            unexpected: vec![Request::builder(Method::Post, "/b")
                .query("x", "1")
                .build()
                .unwrap()],
        };
        let text = err.to_string();
        assert!(text.starts_with("1 expected request(s) not received, 1 unexpected request(s)"));
        assert!(text.contains("missing: GET /a"));
        assert!(text.contains("unexpected: POST /b?x=1"));
    }

    #[test]
    fn test_empty_is_satisfied() {
        assert!(UnsatisfiedExpectation::default().into_result().is_ok());
    }
}
