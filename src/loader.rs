//! File loaders: turn uploaded bytes into plain text.
//!
//! A closed set of loaders selected by [`FileType`]: PDF, DOCX, and plain
//! text. Unknown types fall back to lossy UTF-8 decoding, so an upload with
//! an unrecognized extension still ingests as text.

use std::io::{Cursor, Read};

use tracing::debug;

use crate::document::FileType;
use crate::error::{RagError, Result};

/// A text extractor for one family of file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// PDF text extraction.
    Pdf,
    /// DOCX (OOXML) text extraction.
    Docx,
    /// Plain text (lossy UTF-8). Also the fallback for unknown types.
    Text,
}

impl Loader {
    /// Select the loader for a declared file type.
    pub fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Pdf => Loader::Pdf,
            FileType::Docx => Loader::Docx,
            FileType::Text | FileType::Unknown => Loader::Text,
        }
    }

    /// Extract plain text from raw file bytes.
    ///
    /// PDF and DOCX parsing are CPU-bound and run on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the bytes cannot be parsed as the
    /// declared type. Plain-text loading never fails (decoding is lossy).
    pub async fn load(&self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Loader::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Loader::Pdf => {
                debug!(bytes = bytes.len(), "extracting pdf text");
                run_blocking("pdf", move || {
                    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
                })
                .await
            }
            Loader::Docx => {
                debug!(bytes = bytes.len(), "extracting docx text");
                run_blocking("docx", move || extract_docx_text(&bytes)).await
            }
        }
    }
}

async fn run_blocking<F>(file_type: &str, parse: F) -> Result<String>
where
    F: FnOnce() -> std::result::Result<String, String> + Send + 'static,
{
    let file_type = file_type.to_string();
    tokio::task::spawn_blocking(parse)
        .await
        .map_err(|e| RagError::Pipeline(format!("loader task failed: {e}")))?
        .map_err(|message| RagError::Load { file_type, message })
}

/// Extract plain text from a DOCX container.
///
/// A DOCX file is a ZIP archive; the body lives in `word/document.xml`.
/// Text runs (`<w:t>`) are concatenated, paragraphs (`</w:p>`) become
/// newlines, tabs and breaks are preserved.
fn extract_docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a zip archive: {e}"))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable document.xml: {e}"))?;
    Ok(strip_document_xml(&xml))
}

/// Reduce WordprocessingML to plain text.
fn strip_document_xml(xml: &str) -> String {
    let mut out = String::new();
    let mut tag = String::new();
    let mut in_tag = false;
    let mut in_text_run = false;

    for ch in xml.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' => {
                in_tag = false;
                let closing = tag.starts_with('/');
                let name = tag
                    .trim_start_matches('/')
                    .trim_end_matches('/')
                    .split_whitespace()
                    .next()
                    .unwrap_or("");
                match name {
                    "w:t" => in_text_run = !closing,
                    "w:p" if closing => out.push('\n'),
                    "w:tab" => out.push('\t'),
                    "w:br" => out.push('\n'),
                    _ => {}
                }
            }
            _ if in_tag => tag.push(ch),
            _ if in_text_run => out.push(ch),
            _ => {}
        }
    }

    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_loader_decodes_lossy() {
        let text = Loader::Text.load(b"hello \xff world".to_vec()).await.unwrap();
        assert!(text.starts_with("hello "));
        assert!(text.ends_with(" world"));
    }

    #[tokio::test]
    async fn unknown_type_falls_back_to_text() {
        let loader = Loader::for_file_type(FileType::Unknown);
        assert_eq!(loader, Loader::Text);
        let text = loader.load(b"a,b,c\n1,2,3\n".to_vec()).await.unwrap();
        assert_eq!(text, "a,b,c\n1,2,3\n");
    }

    #[tokio::test]
    async fn pdf_loader_rejects_garbage() {
        let err = Loader::Pdf.load(b"definitely not a pdf".to_vec()).await.unwrap_err();
        assert!(matches!(err, RagError::Load { .. }));
    }

    #[tokio::test]
    async fn docx_loader_rejects_garbage() {
        let err = Loader::Docx.load(b"definitely not a zip".to_vec()).await.unwrap_err();
        assert!(matches!(err, RagError::Load { .. }));
    }

    #[test]
    fn strips_wordprocessingml() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p><w:r><w:t>Fish &amp; chips</w:t><w:br/><w:t>next line</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = strip_document_xml(xml);
        assert!(text.contains("Hello world"));
        assert!(text.contains("Fish & chips\nnext line"));
    }
}
