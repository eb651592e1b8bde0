//! SpaceAPI CLI entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration**: command-line flags and `SPACEAPI_*`
//!    environment variables become a [`spaceapi::ClientConfig`].
//! 2. **Wire observability**: `tracing-subscriber` on stderr, text or JSON,
//!    plus an OpenTelemetry OTLP exporter when `OTEL_EXPORTER_OTLP_ENDPOINT`
//!    is set. See [`telemetry`].
//! 3. **Construct infrastructure**: `ReqwestTransport`, `HickoryNameResolver`,
//!    `MdnsLocalDiscovery` (or its unavailable stand-in) and
//!    `JsonFileHealthStore`, injected into a [`spaceapi::SpaceBrowser`].
//! 4. **Dispatch the subcommand** and print results on stdout.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dns::HickoryNameResolver;
use http_transport::ReqwestTransport;
use mdns::{MdnsConfig, MdnsLocalDiscovery, UnavailableLocalDiscovery};
use spaceapi::{
    AccessError, ApiErrorKind, ClientConfig, LocalDiscovery, Progress, RequestOptions, Resolver,
    SpaceApi, SpaceBrowser, DEFAULT_DIRECTORY_URL,
};
use store::JsonFileHealthStore;
use tracing::warn;

use crate::telemetry::LogFormat;

/// Per-request timeout for directory probes when `--timeout` is not given.
const DIRECTORY_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Find and query SpaceAPI endpoints.
#[derive(Debug, Parser)]
#[command(name = "spaceapi-cli", version, about)]
struct Cli {
    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "SPACEAPI_TIMEOUT", value_name = "SECS")]
    timeout: Option<u64>,

    /// Do not verify TLS certificates.
    #[arg(long, global = true, env = "SPACEAPI_INSECURE")]
    insecure: bool,

    /// Upper bound on local network discovery, in seconds.
    #[arg(long, global = true, env = "SPACEAPI_DISCOVERY_TIMEOUT", default_value_t = 10, value_name = "SECS")]
    discovery_timeout: u64,

    /// How long each mDNS browse listens, in seconds.
    #[arg(long, global = true, env = "SPACEAPI_MDNS_WINDOW", default_value_t = 3, value_name = "SECS")]
    mdns_window: u64,

    /// Log line format on stderr.
    #[arg(long, global = true, env = "SPACEAPI_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the hackerspace directory for working endpoints.
    Directory(DirectoryArgs),
    /// Find endpoints on the local network and via the DNS default service.
    Discover,
    /// Resolve one URL and print its details.
    Show {
        /// Website or SpaceAPI URL.
        url: String,
    },
    /// Directory scan followed by discovery.
    All(DirectoryArgs),
}

#[derive(Debug, clap::Args)]
struct DirectoryArgs {
    /// Probe every candidate and leave the health cache untouched.
    #[arg(long)]
    no_cache: bool,

    /// Directory listing to scan.
    #[arg(long, env = "SPACEAPI_DIRECTORY_URL", default_value = DEFAULT_DIRECTORY_URL)]
    directory_url: String,

    /// Health cache file. Defaults to the user cache directory.
    #[arg(long, env = "SPACEAPI_CACHE_FILE", value_name = "PATH")]
    cache_file: Option<PathBuf>,

    /// Verify TLS certificates during the scan (off by default).
    #[arg(long)]
    verify_tls: bool,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut builder = ClientConfig::builder()
            .verify_tls(!self.insecure)
            .discovery_timeout(Duration::from_secs(self.discovery_timeout));
        if let Some(secs) = self.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Command::Directory(args) | Command::All(args) = &self.command {
            builder = builder
                .directory_url(args.directory_url.clone())
                .cache_enabled(!args.no_cache);
        }
        builder.build()
    }

    fn cache_file(&self) -> Option<PathBuf> {
        match &self.command {
            Command::Directory(args) | Command::All(args) => args.cache_file.clone(),
            _ => None,
        }
    }

    /// Per-call options for directory probes.
    fn scan_options(&self, args: &DirectoryArgs) -> RequestOptions {
        let timeout = self
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DIRECTORY_PROBE_TIMEOUT);
        RequestOptions::inherit()
            .verify_tls(args.verify_tls && !self.insecure)
            .timeout(timeout)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.log_format, cli.verbose)?;

    let result = run(&cli).await;

    telemetry.shutdown();
    result
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let browser = build_browser(cli)?;

    match &cli.command {
        Command::Directory(args) => {
            let found = browser
                .directory(&cli.scan_options(args), print_progress)
                .await
                .context("scanning directory")?;
            print_summaries(&found).await;
        }
        Command::Discover => {
            let found = browser
                .discover(&RequestOptions::inherit())
                .await
                .context("discovering endpoints")?;
            print_summaries(&found).await;
        }
        Command::Show { url } => {
            let api = browser.endpoint(url)?;
            let document = api
                .load()
                .await
                .with_context(|| format!("loading {}", api.apiurl()))?;
            println!("url:     {}", api.apiurl());
            for (label, key) in [("name", "space"), ("address", "address"), ("logo", "logo"), ("api", "api")] {
                println!("{:<8} {}", format!("{label}:"), document.get_str(key).unwrap_or("-"));
            }
        }
        Command::All(args) => {
            let found = browser
                .all(&cli.scan_options(args), print_progress)
                .await
                .context("listing endpoints")?;
            print_summaries(&found).await;
        }
    }
    Ok(())
}

fn build_browser(cli: &Cli) -> anyhow::Result<SpaceBrowser> {
    let transport = ReqwestTransport::with_defaults().context("building HTTP transport")?;
    let names = HickoryNameResolver::from_system_or_default();
    let resolver = Arc::new(Resolver::new(
        Arc::new(transport),
        Arc::new(names),
        cli.client_config(),
    ));

    let store = match cli.cache_file() {
        Some(path) => JsonFileHealthStore::new(path),
        None => JsonFileHealthStore::at_default_path(),
    };

    let mdns_config = MdnsConfig {
        browse_window: Duration::from_secs(cli.mdns_window),
    };
    let local: Arc<dyn LocalDiscovery> = match MdnsLocalDiscovery::new(mdns_config) {
        Ok(local) => Arc::new(local),
        Err(err) => {
            warn!(error = %err, "mDNS unavailable");
            Arc::new(UnavailableLocalDiscovery::new(err.to_string()))
        }
    };

    Ok(SpaceBrowser::new(resolver, Arc::new(store), local))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_progress(progress: &Progress) {
    println!("{}", progress_line(progress));
}

fn progress_line(progress: &Progress) -> String {
    let status = if progress.success { '+' } else { '-' };
    format!("{}/{} {} {}", progress.index, progress.total, status, progress.url)
}

async fn print_summaries(found: &[SpaceApi]) {
    for api in found {
        if let Some(line) = outcome_line(api.apiurl(), describe(api).await) {
            println!("{line}");
        }
    }
}

async fn describe(api: &SpaceApi) -> Result<String, AccessError> {
    Ok(address_line(&api.name().await?, &api.address().await?))
}

fn address_line(name: &str, address: &str) -> String {
    format!("{name}: {address}")
}

/// The line to print for one endpoint. A missing field prints nothing.
fn outcome_line(apiurl: &str, outcome: Result<String, AccessError>) -> Option<String> {
    match outcome {
        Ok(line) => Some(line),
        Err(AccessError::MissingField { .. }) => None,
        Err(AccessError::Api(err)) => Some(match err.kind() {
            ApiErrorKind::Connect => format!("Could not load {apiurl}"),
            ApiErrorKind::Discovery => format!("Could not discover API for {apiurl}"),
            ApiErrorKind::Parse | ApiErrorKind::Url => format!("Unknown error with {apiurl}"),
        }),
    }
}
