use anyhow::Result;
use async_openai::{config::OpenAIConfig, Client};
use axum::serve;
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use rag_qa_server::api::{self, AppState};
use rag_qa_server::config::Settings;
use rag_qa_server::database::VectorDB;
use rag_qa_server::document::DocumentProcessor;
use rag_qa_server::llm::{EmbeddingGenerator, RagChain, RagEvaluator};
use rag_qa_server::providers::OpenAiProvider;

#[derive(Parser, Debug)]
#[command(author, version, about = "RAG question-answering server", long_about = None)]
struct Args {
    /// Bind address, overriding API_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overriding API_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(host) = args.host {
        settings.api_host = host;
    }
    if let Some(port) = args.port {
        settings.api_port = port;
    }
    let settings = Arc::new(settings);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting rag-qa-server");

    let openai = Client::with_config(
        OpenAIConfig::new().with_api_key(settings.openai_api_key.clone()),
    );

    let processor = Arc::new(DocumentProcessor::new(
        settings.chunk_size,
        settings.chunk_overlap,
    ));
    let embeddings = Arc::new(EmbeddingGenerator::new(
        openai.clone(),
        settings.embedding_model.clone(),
        settings.embedding_dimension,
    ));

    let vector_db = Arc::new(
        VectorDB::connect(&settings.qdrant_url, settings.qdrant_api_key.clone()).await?,
    );
    vector_db
        .ensure_collection(
            &settings.collection_name,
            settings.embedding_dimension as u64,
        )
        .await?;

    let provider = Arc::new(OpenAiProvider::new(
        openai.clone(),
        settings.llm_model.clone(),
        settings.llm_temperature,
    ));

    let evaluator = if settings.enable_evaluation {
        let judge = Arc::new(OpenAiProvider::new(
            openai.clone(),
            settings.evaluation_llm_model().to_string(),
            settings.llm_temperature,
        ));
        let judge_embeddings = Arc::new(EmbeddingGenerator::new(
            openai,
            settings.evaluation_embedding_model().to_string(),
            settings.embedding_dimension,
        ));
        Some(Arc::new(RagEvaluator::new(
            judge,
            judge_embeddings,
            settings.evaluation_timeout(),
        )))
    } else {
        None
    };

    let rag = Arc::new(RagChain::new(
        provider,
        embeddings.clone(),
        vector_db.clone(),
        evaluator,
        settings.collection_name.clone(),
        settings.top_k_retrieval,
    ));

    let state = AppState {
        settings: settings.clone(),
        processor,
        vector_db,
        embeddings,
        rag,
    };
    let app = api::create_api(state);

    let addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
