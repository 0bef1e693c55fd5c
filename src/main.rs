use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdsl_query::config;
use pdsl_query::fetch::{HttpFetcher, JsonFetcher};
use pdsl_query::manifest::ManifestStore;
use pdsl_query::models::Document;
use pdsl_query::search::{BatchOutcome, SearchOutcome, SearchSession};

#[derive(Parser)]
#[command(name = "pdsl-query")]
#[command(about = "Query a statically sharded server directory index")]
#[command(version)]
struct Cli {
    /// Fetch every matching document instead of paginating
    #[arg(long)]
    export: bool,

    /// Number of pagination ticks to run
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Query terms; empty browses the most popular servers
    query: Vec<String>,
}

fn print_documents(docs: &[Document]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for doc in docs {
        serde_json::to_writer(&mut out, doc)?;
        writeln!(out)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout 只输出结果，日志写到 stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdsl_query=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::info!("pdsl-query {} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));

    // Load configuration / 加载配置
    let app_config = config::load_config(&config::get_config_path())?;
    tracing::info!("Reading index from {}", app_config.source.root_url);

    let fetcher: Arc<dyn JsonFetcher> = Arc::new(HttpFetcher::new(&app_config.http)?);

    let store = match ManifestStore::load(fetcher.as_ref(), &app_config.source).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: Could not load the search manifest. The service might be down.");
            std::process::exit(1);
        }
    };

    let session = SearchSession::new(fetcher, store, &app_config);
    tracing::info!("{}", session.ready_message());

    let query = cli.query.join(" ");
    match session.search(&query, query.trim().is_empty()).await {
        SearchOutcome::Ignored => return Ok(()),
        SearchOutcome::NoResults => {
            eprintln!("No results found.");
            return Ok(());
        }
        SearchOutcome::Found { total, .. } => {
            tracing::info!("{} candidate id(s)", total);
        }
    }

    if cli.export {
        let docs = session.export().await.unwrap_or_default();
        print_documents(&docs)?;
        eprintln!("Exported {} servers", docs.len());
        return Ok(());
    }

    for _ in 1..cli.pages {
        if session.load_next_batch().await == BatchOutcome::Exhausted {
            break;
        }
    }

    print_documents(&session.documents())?;
    eprintln!("{}", session.status());
    Ok(())
}
