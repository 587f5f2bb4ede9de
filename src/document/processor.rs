use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::loader::{self, DocumentError};
use crate::document::splitter::TextSplitter;

/// The retrieval unit: a bounded text span plus its source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Loads uploaded files and splits them into chunks ready for embedding.
pub struct DocumentProcessor {
    splitter: TextSplitter,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        tracing::info!(chunk_size, chunk_overlap, "document processor initialized");
        Self {
            splitter: TextSplitter::new(chunk_size, chunk_overlap),
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Load an uploaded file from its raw bytes and split it into chunks.
    ///
    /// Text extraction (PDF in particular) is CPU-bound, so the whole load
    /// runs on the blocking thread pool rather than the request task.
    pub async fn process_upload(
        &self,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<Vec<DocumentChunk>, DocumentError> {
        let filename = filename.trim().to_string();
        if filename.is_empty() {
            return Err(DocumentError::MissingFilename);
        }

        tracing::info!(%filename, bytes = data.len(), "processing upload");

        let load_name = filename.clone();
        let documents =
            tokio::task::spawn_blocking(move || loader::load_bytes(&data, &load_name))
                .await
                .map_err(|e| DocumentError::Processing(e.to_string()))??;

        let chunks = self.split_documents(&documents, &filename);
        if chunks.is_empty() {
            return Err(DocumentError::EmptyDocument);
        }

        tracing::info!(
            %filename,
            documents = documents.len(),
            chunks = chunks.len(),
            "upload processed"
        );
        Ok(chunks)
    }

    fn split_documents(&self, documents: &[String], source: &str) -> Vec<DocumentChunk> {
        let ingested_at = Utc::now();
        let mut chunks = Vec::new();
        for document in documents {
            for text in self.splitter.split(document) {
                chunks.push(DocumentChunk {
                    text,
                    source: source.to_string(),
                    chunk_index: chunks.len(),
                    ingested_at,
                });
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_txt_upload() {
        let processor = DocumentProcessor::new(1000, 200);
        let chunks = processor
            .process_upload(b"some short note".to_vec(), "note.txt")
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "some short note");
        assert_eq!(chunks[0].source, "note.txt");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn test_chunk_indexes_run_across_documents() {
        let processor = DocumentProcessor::new(1000, 200);
        let data = b"name,role\nada,engineer\ngrace,admiral\n".to_vec();
        let chunks = processor.process_upload(data, "people.csv").await.unwrap();
        assert_eq!(chunks.len(), 2);
        let indexes: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert!(chunks.iter().all(|c| c.source == "people.csv"));
    }

    #[tokio::test]
    async fn test_blank_filename_rejected() {
        let processor = DocumentProcessor::new(1000, 200);
        let err = processor
            .process_upload(b"content".to_vec(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingFilename));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_chunk_count_matches_splitter_output() {
        let processor = DocumentProcessor::new(40, 10);
        let text = "The quick brown fox jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs."
            .to_string();
        let expected = TextSplitter::new(40, 10).split(&text).len();
        let chunks = processor
            .process_upload(text.clone().into_bytes(), "pangrams.txt")
            .await
            .unwrap();
        assert_eq!(chunks.len(), expected);
    }
}
