#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_sdk::{resource::Resource, trace as sdktrace};
use rama::{
    Layer as RamaLayer,
    graceful::Shutdown,
    http::{layer::trace::TraceLayer, server::HttpServer},
    layer::ConsumeErrLayer,
    rt::Executor,
    tcp::server::TcpListener,
};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};
use sluice_adapter::{
    FilesystemStorage, MemoryObjectStore, MemoryResponseCache, ObjectStore, ResponseCache,
};

use sluice::config::{self, Config, EdgeCacheBackend, StorageBackend};
use sluice::edge::EdgeCache;
use sluice::hotcache::{RedbResponseCache, spawn_sweep_scheduler};
use sluice::legacy::{HttpLegacyWorker, LegacyWorker};
use sluice::npmrc::Npmrc;
use sluice::origin::{HttpOrigin, HttpRegistry};
use sluice::proxy::SluiceProxy;
use sluice::purge::PURGE_PATH;
use sluice::resolver::Resolver;
use sluice::storage::StorageTier;
use sluice::target::target_from_user_agent;
use sluice::tasks::BackgroundTasks;

#[derive(Debug, Parser)]
#[command(author, version, about = "sluice ES module edge proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the proxy server
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Print the build target negotiated for a user agent
    Target {
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Ask a running instance to purge a package's stored builds
    Purge {
        /// Base URL of the running instance
        #[arg(long, default_value = "http://127.0.0.1:8346")]
        url: String,
        /// Package name
        package: String,
        /// Version (all versions when omitted)
        version: Option<String>,
    },
    /// Perform a health check against a running instance
    Health {
        /// URL of the health endpoint (defaults to local proxy)
        #[arg(long, default_value = "http://127.0.0.1:8346/status.json")]
        url: String,
        /// Timeout in seconds for the request
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => run_server(config),
        Command::Target { user_agent } => {
            println!("{}", target_from_user_agent(user_agent.as_deref()));
            Ok(())
        }
        Command::Purge {
            url,
            package,
            version,
        } => run_purge(url, package, version),
        Command::Health { url, timeout } => run_health(url, timeout),
    }
}

fn run_server(config_path: PathBuf) -> Result<()> {
    let config = Config::load(Some(config_path)).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    init_tracing(&config)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("constructing setup runtime")?;

    let store: Option<Arc<dyn ObjectStore>> = match config.storage.backend {
        StorageBackend::Filesystem => {
            let fs = FilesystemStorage::new(config.storage.path.clone());
            rt.block_on(fs.prepare())
                .context("preparing storage directory")?;
            tracing::info!(path = %config.storage.path.display(), "filesystem storage ready");
            Some(Arc::new(fs))
        }
        StorageBackend::Memory => {
            tracing::warn!("memory storage selected, builds are lost on restart");
            Some(Arc::new(MemoryObjectStore::new()))
        }
        StorageBackend::None => None,
    };
    drop(rt);

    let edge_cache: Option<Arc<dyn ResponseCache>> = match config.edge_cache.backend {
        EdgeCacheBackend::Memory => Some(Arc::new(MemoryResponseCache::new(
            config.edge_cache.max_entries,
            config.edge_cache.max_bytes,
        ))),
        EdgeCacheBackend::Redb => Some(Arc::new(
            RedbResponseCache::open(&config.edge_cache.path, config.edge_cache.max_entries)
                .context("opening edge cache")?,
        )),
        EdgeCacheBackend::None => None,
    };
    if let Some(cache) = &edge_cache {
        spawn_sweep_scheduler(&config.edge_cache.sweep_schedule, cache.clone());
    }

    let tasks = BackgroundTasks::new();
    let npmrc = Arc::new(Npmrc::from_config(&config.npm));
    let origin = Arc::new(HttpOrigin::new(&config.origin, config.npm.npmrc.as_deref()));
    let resolver = Resolver::new(npmrc, Arc::new(HttpRegistry));
    let edge = EdgeCache::new(edge_cache, config.origin.zone_id.clone(), tasks.clone());
    let storage = StorageTier::new(
        store,
        origin,
        config.origin.zone_id.clone(),
        config.storage.stream_writes,
        tasks.clone(),
    );
    let legacy = config
        .legacy
        .url
        .clone()
        .map(|url| Arc::new(HttpLegacyWorker::new(url)) as Arc<dyn LegacyWorker>);

    let proxy = SluiceProxy::new(&config, resolver, edge, storage, legacy);

    let rt_server = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("constructing server runtime")?;

    rt_server.block_on(async move {
        let graceful = Shutdown::default();
        let addr = format!("{}:{}", config.server.host, config.server.port);

        tracing::info!(%addr, origin = %config.origin.url, "starting Rama HTTP server");

        graceful.spawn_task_fn(move |guard| {
            let proxy = proxy.clone();
            let addr = addr.clone();
            async move {
                let tcp_service = match TcpListener::build().bind(addr.clone()).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        tracing::error!(%addr, error = %err, "failed to bind listener");
                        return;
                    }
                };

                let exec = Executor::graceful(guard.clone());
                let http_service = HttpServer::auto(exec).service(
                    (TraceLayer::new_for_http(), ConsumeErrLayer::default()).into_layer(proxy),
                );

                tcp_service.serve_graceful(guard, http_service).await;
            }
        });

        // Wait for ctrl+c to initiate graceful shutdown
        tokio::signal::ctrl_c()
            .await
            .context("listening for shutdown signal")?;

        graceful
            .shutdown_with_limit(Duration::from_secs(30))
            .await?;

        if !tasks.drain(Duration::from_secs(30)).await {
            tracing::warn!("background writes still pending at shutdown");
        }

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn run_purge(url: String, package: String, version: Option<String>) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building purge client")?;

    let mut form = vec![("package", package)];
    if let Some(version) = version {
        form.push(("version", version));
    }

    let endpoint = format!("{}{PURGE_PATH}", url.trim_end_matches('/'));
    let response = client
        .post(&endpoint)
        .form(&form)
        .send()
        .context("sending purge request")?;

    let status = response.status();
    let body = response.text().context("reading purge response")?;
    if !status.is_success() {
        bail!("purge endpoint returned status {status}: {body}");
    }
    println!("{body}");
    Ok(())
}

fn run_health(url: String, timeout: u64) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("building health check client")?;

    let response = client
        .get(&url)
        .send()
        .context("sending health check request")?;

    if response.status().is_success() {
        println!("sluice healthy: {}", response.status());
        Ok(())
    } else {
        bail!("health endpoint returned status {}", response.status());
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("building log filter")?;

    let fmt_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        use opentelemetry_otlp::WithExportConfig;

        let resource = Resource::builder_empty()
            .with_attributes([
                KeyValue::new("service.name", "sluice"),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ])
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()?;

        let provider = sdktrace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build();

        let tracer = provider.tracer("sluice");
        global::set_tracer_provider(provider);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        registry.try_init()?;
    }
    Ok(())
}
