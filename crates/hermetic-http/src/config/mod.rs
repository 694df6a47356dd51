//! Configuration for the `hermetic` binary.

mod listen;
mod recording;
mod upstream;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use listen::ListenConfig;
pub use recording::{RecordingConfig, ReplayConfig};
pub use upstream::{ConnectionPoolConfig, UpstreamConfig};

/// What the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve recorded exchanges from disk
    #[default]
    Replay,
    /// Forward to the upstream and record every exchange
    Record,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Required in record mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.listen.socket_addr()?;

        let base_name = &self.recording.base_name;
        if base_name.trim().is_empty() {
            anyhow::bail!("'recording.base_name' must not be empty");
        }
        if base_name.contains(['/', '\\']) {
            anyhow::bail!(
                "'recording.base_name' must be a file name prefix, not a path: '{base_name}'"
            );
        }

        if !(100..=999).contains(&self.replay.not_found_status) {
            anyhow::bail!(
                "'replay.not_found_status' must be a valid HTTP status code, got {}",
                self.replay.not_found_status
            );
        }

        if self.mode == Mode::Record {
            let Some(ref upstream) = self.upstream else {
                anyhow::bail!(
                    "An 'upstream' is required in record mode. \
                     Please provide 'upstream.host' and 'upstream.port'"
                );
            };
            if upstream.host.trim().is_empty() {
                anyhow::bail!("'upstream.host' must not be empty");
            }
            if upstream.port == 0 {
                anyhow::bail!("'upstream.port' must not be 0");
            }
        }
        Ok(())
    }
}
