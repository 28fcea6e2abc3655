//! Document ingestion: file sniffing, text extraction and chunking.
//!
//! Uploads arrive as raw bytes plus the file name Telegram reported. The
//! format is decided from magic bytes first and the extension second, then
//! the text is extracted, cut into overlapping chunks, embedded and stored.

use std::fmt;
use std::io::{Cursor, Write};
use std::sync::Arc;

use calamine::{Ods, Reader, Xls, Xlsx};
use tracing::{debug, info};

use crate::chunk::{Collection, DocumentChunk};
use crate::embedding::EmbeddingGenerator;
use crate::error::{MemoryError, Result};
use crate::store::ChunkStore;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    PowerPoint,
    Excel,
    OpenDocument,
    Text,
}

impl FileKind {
    /// Extension handed to external converters.
    fn extension(&self, filename: &str) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "docx",
            Self::PowerPoint => "pptx",
            Self::Excel => "xlsx",
            Self::OpenDocument if extension_of(filename) == "odp" => "odp",
            Self::OpenDocument => "odt",
            Self::Text => "txt",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "PDF",
            Self::Word => "Word",
            Self::PowerPoint => "PowerPoint",
            Self::Excel => "spreadsheet",
            Self::OpenDocument => "OpenDocument",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn kind_from_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "pdf" => Some(FileKind::Pdf),
        "docx" => Some(FileKind::Word),
        "pptx" => Some(FileKind::PowerPoint),
        "xlsx" | "xlsm" | "xls" | "ods" => Some(FileKind::Excel),
        "odt" | "odp" => Some(FileKind::OpenDocument),
        "txt" | "md" | "markdown" | "csv" => Some(FileKind::Text),
        _ => None,
    }
}

/// Decide the format of an upload.
pub fn sniff(bytes: &[u8], filename: &str) -> Result<FileKind> {
    let ext = extension_of(filename);

    if bytes.starts_with(PDF_MAGIC) {
        return Ok(FileKind::Pdf);
    }

    if bytes.starts_with(ZIP_MAGIC) {
        // Office Open XML and OpenDocument are all zip containers.
        return match kind_from_extension(&ext) {
            Some(kind) if kind != FileKind::Pdf && kind != FileKind::Text => Ok(kind),
            _ => Err(MemoryError::UnsupportedFile(format!(
                "{} (zip archive)",
                filename
            ))),
        };
    }

    if bytes.starts_with(OLE_MAGIC) && ext == "xls" {
        return Ok(FileKind::Excel);
    }

    if !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok() {
        return Ok(FileKind::Text);
    }

    kind_from_extension(&ext)
        .filter(|k| *k != FileKind::Text)
        .ok_or_else(|| MemoryError::UnsupportedFile(filename.to_string()))
}

fn extraction_failed(filename: &str, reason: impl ToString) -> MemoryError {
    MemoryError::ExtractionFailed {
        file: filename.to_string(),
        reason: reason.to_string(),
    }
}

/// Extract plain text from an upload of a known kind.
pub async fn extract_text(kind: FileKind, filename: &str, bytes: &[u8]) -> Result<String> {
    match kind {
        FileKind::Text => String::from_utf8(bytes.to_vec())
            .map_err(|e| extraction_failed(filename, e)),
        FileKind::Pdf => {
            let data = bytes.to_vec();
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| extraction_failed(filename, e))?
                .map_err(|e| extraction_failed(filename, e))
        }
        FileKind::Excel => {
            let data = bytes.to_vec();
            let ext = extension_of(filename);
            tokio::task::spawn_blocking(move || match ext.as_str() {
                "xls" => sheets_to_text::<Xls<Cursor<Vec<u8>>>>(data),
                "ods" => sheets_to_text::<Ods<Cursor<Vec<u8>>>>(data),
                _ => sheets_to_text::<Xlsx<Cursor<Vec<u8>>>>(data),
            })
            .await
            .map_err(|e| extraction_failed(filename, e))?
            .map_err(|reason| extraction_failed(filename, reason))
        }
        FileKind::Word | FileKind::PowerPoint | FileKind::OpenDocument => {
            pandoc_to_text(kind.extension(filename), filename, bytes).await
        }
    }
}

/// Render every worksheet as tab-separated rows under a `# <sheet>` header.
fn sheets_to_text<R>(data: Vec<u8>) -> std::result::Result<String, String>
where
    R: Reader<Cursor<Vec<u8>>>,
{
    let mut workbook = R::new(Cursor::new(data)).map_err(|e| format!("{:?}", e))?;

    let mut out = String::new();
    for (name, range) in workbook.worksheets() {
        out.push_str(&format!("# {}\n", name));
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            if cells.iter().any(|c| !c.trim().is_empty()) {
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Convert an Office/OpenDocument file with the `pandoc` binary.
async fn pandoc_to_text(ext: &str, filename: &str, bytes: &[u8]) -> Result<String> {
    let pandoc = which::which("pandoc")
        .map_err(|_| extraction_failed(filename, "pandoc is not installed"))?;

    let mut input = tempfile::Builder::new()
        .prefix("tutorbot-upload-")
        .suffix(&format!(".{}", ext))
        .tempfile()?;
    input.write_all(bytes)?;
    input.flush()?;

    debug!(file = %filename, pandoc = %pandoc.display(), "Converting with pandoc");
    let output = tokio::process::Command::new(pandoc)
        .arg(input.path())
        .arg("-t")
        .arg("plain")
        .output()
        .await?;

    if !output.status.success() {
        return Err(extraction_failed(
            filename,
            format!(
                "pandoc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Split text into overlapping character windows.
///
/// Chunks are trimmed and empty ones dropped. `overlap` must be smaller than
/// `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(MemoryError::ConfigError(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }

    let chars: Vec<char> = text.trim().chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub source: String,
    pub kind: FileKind,
    pub chunks: usize,
}

/// Turns uploads into stored, embedded chunks.
pub struct Ingestor {
    store: Arc<dyn ChunkStore>,
    embedder: EmbeddingGenerator,
    chunk_size: usize,
    overlap: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: EmbeddingGenerator,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(MemoryError::ConfigError(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            store,
            embedder,
            chunk_size,
            overlap,
        })
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    pub fn embedder(&self) -> &EmbeddingGenerator {
        &self.embedder
    }

    /// Sniff, extract, chunk, embed and store one upload.
    pub async fn ingest(
        &self,
        collection: Collection,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport> {
        let kind = sniff(bytes, filename)?;
        let text = extract_text(kind, filename, bytes).await?;
        let pieces = chunk_text(&text, self.chunk_size, self.overlap)?;
        if pieces.is_empty() {
            return Err(MemoryError::EmptyDocument(filename.to_string()));
        }

        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs).await?;

        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (content, embedding))| {
                DocumentChunk::new(collection, filename, index, content, embedding)
            })
            .collect();
        let count = chunks.len();
        self.store.insert_many(chunks).await?;

        info!(
            collection = %collection,
            file = %filename,
            kind = %kind,
            chunks = count,
            "Ingested document"
        );
        Ok(IngestReport {
            source: filename.to_string(),
            kind,
            chunks: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStore;
    use tempfile::TempDir;
    use tutor_models::UserId;

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(sniff(b"%PDF-1.7 ...", "scan.bin").unwrap(), FileKind::Pdf);
        assert_eq!(sniff(b"PK\x03\x04rest", "essay.docx").unwrap(), FileKind::Word);
        assert_eq!(sniff(b"PK\x03\x04rest", "deck.PPTX").unwrap(), FileKind::PowerPoint);
        assert_eq!(sniff(b"PK\x03\x04rest", "marks.xlsx").unwrap(), FileKind::Excel);
        assert_eq!(sniff(b"PK\x03\x04rest", "notes.odt").unwrap(), FileKind::OpenDocument);
        assert_eq!(
            sniff(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1], "old.xls").unwrap(),
            FileKind::Excel
        );
    }

    #[test]
    fn test_sniff_text_and_unsupported() {
        assert_eq!(sniff("Ohm's law: V = IR".as_bytes(), "notes").unwrap(), FileKind::Text);
        assert!(matches!(
            sniff(b"PK\x03\x04rest", "archive.zip"),
            Err(MemoryError::UnsupportedFile(_))
        ));
        assert!(matches!(
            sniff(&[0xFF, 0x00, 0xFE], "image.png"),
            Err(MemoryError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_chunk_text_short() {
        assert_eq!(chunk_text("  Hello world ", 100, 20).unwrap(), vec!["Hello world"]);
        assert!(chunk_text("   ", 100, 20).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_text_overlap() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, 10, 4).unwrap();
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "ghijklmnop");
        assert_eq!(chunks.last().unwrap(), "stuvwxyz");
    }

    #[test]
    fn test_chunk_text_multibyte() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, 10, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_chunk_text_rejects_bad_overlap() {
        assert!(matches!(
            chunk_text("abc", 10, 10),
            Err(MemoryError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_pdf() {
        let bytes = include_bytes!("../tests/fixtures/circuits.pdf");
        let kind = sniff(bytes, "circuits.pdf").unwrap();
        assert_eq!(kind, FileKind::Pdf);

        let text = extract_text(kind, "circuits.pdf", bytes).await.unwrap();
        assert!(text.contains("Kirchhoff"), "extracted: {:?}", text);
    }

    #[tokio::test]
    async fn test_extract_corrupt_pdf() {
        let bytes = b"%PDF-1.4\nthis file was truncated";
        let err = extract_text(FileKind::Pdf, "broken.pdf", bytes).await.unwrap_err();
        match err {
            MemoryError::ExtractionFailed { file, .. } => assert_eq!(file, "broken.pdf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_xlsx() {
        let bytes = include_bytes!("../tests/fixtures/marks.xlsx");
        let kind = sniff(bytes, "marks.xlsx").unwrap();
        assert_eq!(kind, FileKind::Excel);

        let text = extract_text(kind, "marks.xlsx", bytes).await.unwrap();
        assert!(text.starts_with("# Resistors\n"), "extracted: {:?}", text);
        assert!(text.contains("Part\tOhms\n"));
        assert!(text.contains("R1\t4.7\n"));
        assert!(text.contains("R2\t220\n"));
    }

    #[tokio::test]
    async fn test_extract_ods() {
        let bytes = include_bytes!("../tests/fixtures/lab.ods");
        let kind = sniff(bytes, "lab.ods").unwrap();
        assert_eq!(kind, FileKind::Excel);

        let text = extract_text(kind, "lab.ods", bytes).await.unwrap();
        assert!(text.starts_with("# Week1\n"), "extracted: {:?}", text);
        assert!(text.contains("ada\tThevenin\n"));
    }

    #[tokio::test]
    async fn test_extract_corrupt_spreadsheet() {
        let err = extract_text(FileKind::Excel, "marks.xlsx", b"PK\x03\x04not a workbook")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::ExtractionFailed { .. }));
    }

    #[tokio::test]
    async fn test_ingest_text_upload() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn ChunkStore> =
            Arc::new(LocalStore::new(dir.path().to_path_buf()).await.unwrap());
        let ingestor =
            Ingestor::new(store.clone(), EmbeddingGenerator::hash_based(8), 20, 5).unwrap();

        let collection = Collection::User(UserId(7));
        let text = "Newton's second law relates force, mass and acceleration.";
        let report = ingestor
            .ingest(collection, "physics.txt", text.as_bytes())
            .await
            .unwrap();

        assert_eq!(report.kind, FileKind::Text);
        assert!(report.chunks > 1);
        assert_eq!(store.count(&collection).await.unwrap(), report.chunks);
        assert_eq!(store.count(&Collection::Global).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_empty_document() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn ChunkStore> =
            Arc::new(LocalStore::new(dir.path().to_path_buf()).await.unwrap());
        let ingestor = Ingestor::new(store, EmbeddingGenerator::hash_based(8), 20, 5).unwrap();

        let err = ingestor
            .ingest(Collection::Global, "blank.txt", b"  \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::EmptyDocument(_)));
    }

    #[test]
    fn test_ingestor_rejects_bad_chunking() {
        let store: Arc<dyn ChunkStore> = Arc::new(NullStore);
        assert!(Ingestor::new(store, EmbeddingGenerator::hash_based(8), 10, 12).is_err());
    }

    struct NullStore;

    #[async_trait::async_trait]
    impl ChunkStore for NullStore {
        async fn insert_many(&self, _chunks: Vec<DocumentChunk>) -> Result<()> {
            Ok(())
        }
        async fn search(
            &self,
            _q: &[f32],
            _c: &Collection,
            _l: usize,
        ) -> Result<Vec<crate::chunk::SearchHit>> {
            Ok(Vec::new())
        }
        async fn list_sources(&self, _c: &Collection) -> Result<Vec<crate::chunk::SourceSummary>> {
            Ok(Vec::new())
        }
        async fn count(&self, _c: &Collection) -> Result<usize> {
            Ok(0)
        }
        async fn clear(&self, _c: &Collection) -> Result<usize> {
            Ok(0)
        }
    }
}
