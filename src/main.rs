use anyhow::Context;
use clap::Parser;
use docingest::config::Config;
use docingest::embedding::build_embedding_client;
use docingest::logging;
use docingest::pipeline::{BatchEmbedder, IndexWriter, IngestionPipeline, RunOptions, RunStatus};
use docingest::qdrant::QdrantService;
use docingest::source::{CrawlRequest, TavilyCrawler};

/// Ingest a documentation site into the configured vector index.
#[derive(Debug, Parser)]
#[command(name = "docingest", version, about)]
struct Cli {
    /// Root URL of the documentation site to ingest.
    url: String,
    /// Maximum link depth explored from the root.
    #[arg(long, default_value_t = 5)]
    max_depth: usize,
    /// Maximum number of links followed per page.
    #[arg(long, default_value_t = 20)]
    max_breadth: usize,
    /// Upper bound on the number of pages fetched.
    #[arg(long, default_value_t = 1000)]
    max_pages: usize,
    /// Free-text instructions guiding content extraction.
    #[arg(long)]
    instructions: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let source = TavilyCrawler::new(&config.crawl).context("failed to build crawl client")?;
    let embedding_client =
        build_embedding_client(&config.embedding).context("failed to build embedding client")?;
    let embedder = BatchEmbedder::new(
        embedding_client,
        config.embedding.batch_size,
        config.pipeline.retry.clone(),
    );
    let qdrant = QdrantService::new(&config.qdrant).context("failed to build Qdrant client")?;
    let writer = IndexWriter::new(
        qdrant,
        config.qdrant.collection_name.clone(),
        config.embedding.dimension as u64,
        config.pipeline.retry.clone(),
    );

    let options = RunOptions {
        crawl: CrawlRequest {
            root_url: cli.url,
            max_depth: cli.max_depth,
            max_breadth: cli.max_breadth,
            max_pages: cli.max_pages,
            instructions: cli.instructions,
        },
        chunk_size: config.pipeline.chunk_size,
        chunk_overlap: config.pipeline.chunk_overlap,
        max_concurrent_documents: config.pipeline.max_concurrent_documents,
        failure_threshold: config.pipeline.failure_threshold,
    };

    let pipeline = IngestionPipeline::new(Box::new(source), embedder, writer, options);
    let summary = pipeline.run().await.context("ingestion run failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.status == RunStatus::Aborted {
        std::process::exit(1);
    }
    Ok(())
}
