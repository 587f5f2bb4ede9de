use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;

/// Build a Qdrant client from a configured URL, with an optional API key for
/// hosted clusters, and probe the connection before handing it out.
pub async fn create_qdrant_client(
    url: &str,
    api_key: Option<String>,
) -> Result<Qdrant, Box<dyn std::error::Error + Send + Sync>> {
    // Clean the URL
    let (scheme, clean_url) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), rest.to_string()),
        None => ("http".to_string(), url.to_string()),
    };

    // Replace port 6333 with 6334 for gRPC if needed
    let grpc_url = if clean_url.ends_with(":6333") {
        clean_url.replace(":6333", ":6334")
    } else {
        clean_url
    };

    let url_with_scheme = format!("{}://{}", scheme, grpc_url);
    log::info!("Attempting to connect to Qdrant with URL: {}", url_with_scheme);

    let mut config = QdrantConfig::from_url(&url_with_scheme);
    config.api_key = api_key;
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);

    let client = Qdrant::new(config)?;

    // Test the connection
    match client.list_collections().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(format!("Failed to connect to Qdrant: {}", e).into())
        }
    }
}
