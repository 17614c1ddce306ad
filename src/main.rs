use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docent_core::bootstrap::{AppBuilder, warmup_provider};
use docent_core::{ChatService, Router};
use docent_gateway::GatewayServer;
use docent_index::document::{IngestError, IngestReport, IngestStatus};
use docent_llm::provider::Message;

#[derive(Debug, Parser)]
#[command(
    name = "docent",
    version,
    about = "Answer questions from indexed document collections"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(
        long,
        env = "DOCENT_CONFIG",
        default_value = "config/default.toml",
        global = true
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chunk, embed and index every supported file in the data directory.
    Ingest {
        /// Overrides `ingest.data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Documents processed at once; overrides `ingest.concurrency`.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Run the HTTP chat API.
    Serve,
    /// Answer a single question and print the result.
    Ask {
        /// Skip routing and search this collection.
        #[arg(long)]
        collection: Option<String>,
        question: String,
    },
    /// List catalog collections with their stored entry counts.
    Collections,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_subscriber(&cli.config);

    let builder = AppBuilder::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Command::Ingest {
            data_dir,
            concurrency,
        } => run_ingest(builder, data_dir, concurrency).await,
        Command::Serve => run_serve(builder).await.map(|()| ExitCode::SUCCESS),
        Command::Ask {
            collection,
            question,
        } => run_ask(&builder, collection, &question)
            .await
            .map(|()| ExitCode::SUCCESS),
        Command::Collections => run_collections(&builder).await.map(|()| ExitCode::SUCCESS),
    }
}

async fn run_ingest(
    mut builder: AppBuilder,
    data_dir: Option<PathBuf>,
    concurrency: Option<usize>,
) -> anyhow::Result<ExitCode> {
    if let Some(n) = concurrency {
        builder.config_mut().ingest.concurrency = n.max(1);
    }
    let dir = data_dir.unwrap_or_else(|| PathBuf::from(&builder.config().ingest.data_dir));

    let provider = builder.build_provider()?;
    warmup_provider(&provider).await;
    let index = builder.build_index().await?;
    let pipeline = builder.build_pipeline(index, &provider);

    match pipeline.ingest_dir(&dir).await {
        Ok(report) => {
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(IngestError::NoDocuments(dir)) => {
            eprintln!("no supported documents found in {}", dir.display());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("ingestion of {} failed", dir.display())),
    }
}

fn print_report(report: &IngestReport) {
    for outcome in &report.outcomes {
        let name = &outcome.collection;
        match &outcome.status {
            IngestStatus::Indexed {
                chunks,
                inserted,
                skipped,
            } => println!("indexed  {name}: {chunks} chunks ({inserted} new, {skipped} existing)"),
            IngestStatus::Skipped { reason } => println!("skipped  {name}: {reason}"),
            IngestStatus::Failed { error } => println!("failed   {name}: {error}"),
        }
    }
    println!(
        "{} indexed, {} skipped, {} failed",
        report.indexed(),
        report.skipped(),
        report.failed()
    );
}

async fn run_serve(builder: AppBuilder) -> anyhow::Result<()> {
    let config = builder.config();
    let sessions = builder.build_sessions();
    let chat: Arc<ChatService> = Arc::new(builder.build_chat_service(Arc::clone(&sessions)).await?);

    let (shutdown_tx, shutdown_rx) = AppBuilder::build_shutdown();
    let eviction = Arc::clone(&sessions).spawn_eviction(
        Duration::from_secs(config.session.sweep_interval_secs.max(1)),
        shutdown_rx.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &config.gateway;
    let server = GatewayServer::new(&gateway.bind, gateway.port, chat, shutdown_rx)
        .with_auth(
            config
                .secrets
                .gateway_token
                .as_ref()
                .map(|t| t.expose().to_owned()),
        )
        .with_rate_limit(gateway.rate_limit)
        .with_max_body_size(gateway.max_body_size)
        .with_cors_origins(gateway.cors_origins.clone());
    server.serve().await?;

    eviction.await.ok();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn run_ask(
    builder: &AppBuilder,
    collection: Option<String>,
    question: &str,
) -> anyhow::Result<()> {
    let question = question.trim();
    anyhow::ensure!(!question.is_empty(), "question cannot be empty");

    let (collection, query) = if let Some(name) = collection {
        anyhow::ensure!(
            builder.config().catalog.contains(&name),
            "unknown collection '{name}', run `docent collections` to list them"
        );
        (name, question.to_owned())
    } else {
        let route = builder
            .build_router()?
            .route(&[Message::user(question)])
            .await?;
        tracing::info!(collection = %route.collection, query = %route.query, "routed question");
        (route.collection, route.query)
    };

    let provider = builder.build_provider()?;
    let index = builder.build_index().await?;
    let answer = builder
        .build_retriever(index, provider)
        .answer(&collection, &query)
        .await?;
    println!("[{collection}] {answer}");
    Ok(())
}

async fn run_collections(builder: &AppBuilder) -> anyhow::Result<()> {
    let index = builder.build_index().await?;
    let catalog = &builder.config().catalog;
    for entry in &catalog.collections {
        let count = index.count(&entry.name).await.unwrap_or_else(|e| {
            tracing::warn!(collection = %entry.name, "count failed: {e}");
            0
        });
        let marker = if entry.name == catalog.default_collection {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<28} {count:>6}  {}",
            entry.name, entry.description
        );
    }
    Ok(())
}

fn init_subscriber(config_path: &Path) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    #[cfg(feature = "otel")]
    {
        let config = docent_core::Config::load(config_path).ok();
        let use_otlp = config
            .as_ref()
            .is_some_and(|c| c.observability.exporter == "otlp");

        if use_otlp {
            let endpoint = config
                .as_ref()
                .map_or("http://localhost:4317", |c| &c.observability.endpoint);

            match setup_otel_tracer(endpoint) {
                Ok(tracer) => {
                    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt_layer)
                        .with(otel_layer)
                        .init();
                    return;
                }
                Err(e) => {
                    eprintln!("OTel initialization failed, falling back to fmt: {e}");
                }
            }
        }
    }

    #[cfg(not(feature = "otel"))]
    let _ = config_path;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(feature = "otel")]
fn setup_otel_tracer(endpoint: &str) -> anyhow::Result<opentelemetry_sdk::trace::SdkTracer> {
    use opentelemetry::trace::TracerProvider;
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer("docent");
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracer)
}
