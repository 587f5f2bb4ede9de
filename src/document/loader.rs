use std::path::Path;
use thiserror::Error;

/// Fixed allow-list of ingestable file types.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "csv"];

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Filename is required")]
    MissingFilename,
    #[error("Unsupported file extension: .{0}. Supported extensions are: .pdf, .txt, .csv")]
    UnsupportedExtension(String),
    #[error("No content was extracted from the document")]
    EmptyDocument,
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Document processing failed: {0}")]
    Processing(String),
}

impl DocumentError {
    /// Expected validation failures map to HTTP 400; everything else is an
    /// unexpected failure and maps to a logged 500.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFilename | Self::UnsupportedExtension(_) | Self::EmptyDocument
        )
    }
}

/// Lower-cased extension of `filename`, checked against the allow-list.
pub fn extension_of(filename: &str) -> Result<String, DocumentError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(DocumentError::UnsupportedExtension(extension))
    }
}

/// Load the raw documents contained in an uploaded file.
///
/// A PDF or TXT file yields one document; a CSV yields one document per row.
/// Whitespace-only documents are discarded, and an upload from which nothing
/// survives is rejected.
pub fn load_bytes(data: &[u8], filename: &str) -> Result<Vec<String>, DocumentError> {
    let documents = match extension_of(filename)?.as_str() {
        "pdf" => load_pdf(data)?,
        "txt" => load_txt(data),
        "csv" => load_csv(data)?,
        other => return Err(DocumentError::UnsupportedExtension(other.to_string())),
    };

    let documents: Vec<String> = documents
        .into_iter()
        .filter(|d| !d.trim().is_empty())
        .collect();

    if documents.is_empty() {
        return Err(DocumentError::EmptyDocument);
    }
    Ok(documents)
}

fn load_pdf(data: &[u8]) -> Result<Vec<String>, DocumentError> {
    let text =
        pdf_extract::extract_text_from_mem(data).map_err(|e| DocumentError::Pdf(e.to_string()))?;
    Ok(vec![text])
}

fn load_txt(data: &[u8]) -> Vec<String> {
    vec![String::from_utf8_lossy(data).into_owned()]
}

/// One document per CSV row, rendered as `header: value` lines.
fn load_csv(data: &[u8]) -> Result<Vec<String>, DocumentError> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers()?.clone();

    let mut documents = Vec::new();
    for record in reader.records() {
        let record = record?;
        let lines: Vec<String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header, value))
            .collect();
        documents.push(lines.join("\n"));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_dispatch() {
        assert_eq!(extension_of("report.pdf").unwrap(), "pdf");
        assert_eq!(extension_of("notes.TXT").unwrap(), "txt");
        assert_eq!(extension_of("data.csv").unwrap(), "csv");
        assert!(matches!(
            extension_of("image.png"),
            Err(DocumentError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            extension_of("no_extension"),
            Err(DocumentError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_load_txt() {
        let docs = load_bytes(b"plain text content", "notes.txt").unwrap();
        assert_eq!(docs, vec!["plain text content".to_string()]);
    }

    #[test]
    fn test_load_empty_txt_rejected() {
        assert!(matches!(
            load_bytes(b"   \n  ", "empty.txt"),
            Err(DocumentError::EmptyDocument)
        ));
        assert!(matches!(
            load_bytes(b"", "empty.txt"),
            Err(DocumentError::EmptyDocument)
        ));
    }

    #[test]
    fn test_load_csv_row_per_document() {
        let data = b"name,role\nada,engineer\ngrace,admiral\n";
        let docs = load_bytes(data, "people.csv").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], "name: ada\nrole: engineer");
        assert_eq!(docs[1], "name: grace\nrole: admiral");
    }

    #[test]
    fn test_load_csv_header_only_rejected() {
        assert!(matches!(
            load_bytes(b"name,role\n", "people.csv"),
            Err(DocumentError::EmptyDocument)
        ));
    }

    #[test]
    fn test_validation_split() {
        assert!(DocumentError::MissingFilename.is_validation());
        assert!(DocumentError::UnsupportedExtension("png".into()).is_validation());
        assert!(DocumentError::EmptyDocument.is_validation());
        assert!(!DocumentError::Pdf("broken".into()).is_validation());
    }
}
