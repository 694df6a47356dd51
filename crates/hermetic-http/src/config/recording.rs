//! Where exchanges are recorded to and replayed from.

use crate::codec::ExchangeCodec;
use crate::replay::DEFAULT_REPLAY_NOT_FOUND_STATUS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_directory")]
    pub directory: PathBuf,
    /// File name prefix shared by every file of a recording
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// Record mode only: continue numbering after existing exchanges
    /// instead of overwriting them from sequence 1
    #[serde(default)]
    pub append: bool,
}

impl RecordingConfig {
    pub fn codec(&self) -> ExchangeCodec {
        ExchangeCodec::new(&self.directory, &self.base_name)
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: default_recording_directory(),
            base_name: default_base_name(),
            append: false,
        }
    }
}

fn default_recording_directory() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_base_name() -> String {
    "exchange".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Status answered when no recorded exchange matches
    #[serde(default = "default_not_found_status")]
    pub not_found_status: u16,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            not_found_status: default_not_found_status(),
        }
    }
}

fn default_not_found_status() -> u16 {
    DEFAULT_REPLAY_NOT_FOUND_STATUS
}
