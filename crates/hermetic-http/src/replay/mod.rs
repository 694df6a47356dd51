//! Replay of recorded exchanges.
//!
//! `FileReplayProvider` reconstructs expectations from an exchange
//! directory on first lookup and serves them through the same
//! `ResponseProvider` contract as the in-memory store. Response bodies stay
//! on disk and are read again on every hit.

mod provider;

pub use provider::{FileReplayProvider, RecordedResponse, DEFAULT_REPLAY_NOT_FOUND_STATUS};
