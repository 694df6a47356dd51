use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hermetic_http::config::{Config, Mode, UpstreamConfig};
use hermetic_http::proxy::{ExchangeRecorder, Forwarder, HyperOutboundClient, InterceptingProxy, Scheme};
use hermetic_http::replay::FileReplayProvider;
use hermetic_http::transport::MockServer;
use tracing_subscriber::EnvFilter;

/// Serve recorded HTTP exchanges, or record them through a proxy.
#[derive(Parser, Debug)]
#[command(name = "hermetic", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "HERMETIC_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides listen.port)
    #[arg(short, long, env = "HERMETIC_PORT")]
    port: Option<u16>,

    /// Replay recordings or record through the proxy (overrides mode)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Recording directory (overrides recording.directory)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Upstream to record, as host:port (overrides upstream)
    #[arg(short, long)]
    upstream: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(directory) = self.directory {
            config.recording.directory = directory;
        }
        if let Some(upstream) = self.upstream {
            config.upstream = Some(parse_upstream(&upstream)?);
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_upstream(value: &str) -> anyhow::Result<UpstreamConfig> {
    let (scheme, rest) = match value.split_once("://") {
        Some(("https", rest)) => (Scheme::Https, rest),
        Some(("http", rest)) => (Scheme::Http, rest),
        Some((other, _)) => anyhow::bail!("Unsupported upstream protocol '{other}'"),
        None => (Scheme::Http, value),
    };
    let (host, port) = rest
        .rsplit_once(':')
        .with_context(|| format!("Upstream '{value}' must be host:port"))?;
    let port = port
        .trim_end_matches('/')
        .parse()
        .with_context(|| format!("Invalid upstream port in '{value}'"))?;
    Ok(UpstreamConfig {
        host: host.to_string(),
        port,
        protocol: scheme,
        tls_skip_verify: false,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = args.into_config()?;
    let addr = config.listen.socket_addr()?;
    tracing::info!(
        "Starting {} V{} in {:?} mode",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.mode
    );

    match config.mode {
        Mode::Replay => {
            let provider = FileReplayProvider::new(config.recording.codec())
                .with_not_found_status(config.replay.not_found_status);
            let exchanges = provider
                .recorded_exchanges()
                .context("Failed to load recordings")?;
            tracing::info!(
                "Replaying {} exchange(s) from {}",
                exchanges,
                config.recording.directory.display()
            );
            let server = MockServer::start(addr, Arc::new(provider)).await?;
            shutdown_signal().await;
            if let Err(e) = server.verify() {
                tracing::warn!("{}", e);
            }
            server.stop().await?;
        }
        Mode::Record => {
            let upstream = config
                .upstream
                .as_ref()
                .context("An upstream is required in record mode")?;
            let codec = config.recording.codec();
            let recorder = if config.recording.append {
                ExchangeRecorder::appending(codec)
            } else {
                ExchangeRecorder::new(codec)
            };
            let client = HyperOutboundClient::new(&config.connection_pool, upstream.tls_skip_verify)?;
            let forwarder = Forwarder::new(Arc::new(client))
                .with_route(upstream.route())
                .with_recorder(Arc::new(recorder));
            let proxy = InterceptingProxy::new(addr, forwarder);
            let bound = proxy.start().await?;
            tracing::info!(
                "Recording {}://{}:{} through {}",
                upstream.protocol,
                upstream.host,
                upstream.port,
                bound
            );
            shutdown_signal().await;
            proxy.stop().await?;
            if let Some(recorder) = proxy.forwarder().recorder() {
                tracing::info!("Recorded {} exchange(s)", recorder.last_sequence());
            }
        }
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Cannot install signal handlers, falling back to Ctrl+C");
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = sigint.recv() => tracing::trace!("Received SIGINT"),
        _ = sigterm.recv() => tracing::trace!("Received SIGTERM"),
    }
}

#[cfg(target_os = "windows")]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_without_config_file() {
        let args = Args::try_parse_from([
            "hermetic",
            "--mode",
            "record",
            "--port",
            "0",
            "--upstream",
            "https://api.example.com:8443",
            "--directory",
            "/tmp/rec",
        ])
        .unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.mode, Mode::Record);
        assert_eq!(config.listen.port, 0);
        assert_eq!(config.recording.directory, PathBuf::from("/tmp/rec"));
        let upstream = config.upstream.unwrap();
        assert_eq!(upstream.protocol, Scheme::Https);
        assert_eq!(upstream.host, "api.example.com");
        assert_eq!(upstream.port, 8443);
    }

    #[test]
    fn test_record_without_upstream_fails() {
        let args = Args::try_parse_from(["hermetic", "--mode", "record"]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_parse_upstream() {
        let upstream = parse_upstream("localhost:9000").unwrap();
        assert_eq!(upstream.protocol, Scheme::Http);
        assert_eq!(upstream.port, 9000);
        assert!(parse_upstream("ftp://host:21").is_err());
        assert!(parse_upstream("no-port").is_err());
    }
}
