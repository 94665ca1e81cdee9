//! Text extraction for uploaded documents, dispatched on the declared MIME type.
//!
//! | MIME type | Extraction |
//! |---|---|
//! | `text/plain` | strict UTF-8 decode |
//! | `application/pdf` | per-page text, pages extracted in parallel and joined with `\n` |
//! | DOCX / `application/msword` | body paragraphs joined with `\n` |
//!
//! Any other type yields an empty string rather than an error.

use std::io::{Cursor, Read};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use quick_xml::{Reader, events::Event};

use super::types::ExtractionError;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MSWORD_MIME: &str = "application/msword";
const DOCX_BODY_PART: &str = "word/document.xml";

/// Document formats with a dedicated extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// UTF-8 plain text.
    PlainText,
    /// Portable Document Format.
    Pdf,
    /// Word processing document.
    Docx,
}

impl DocumentKind {
    /// Map a declared content type to a document kind.
    ///
    /// Parameters such as `; charset=utf-8` are ignored and matching is case-insensitive.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(Self::PlainText),
            "application/pdf" => Some(Self::Pdf),
            DOCX_MIME | MSWORD_MIME => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Extract text from `content` according to its declared content type.
///
/// `pdf_workers` bounds the number of PDF pages processed at once.
pub async fn extract_text(
    content: Vec<u8>,
    content_type: &str,
    pdf_workers: usize,
) -> Result<String, ExtractionError> {
    let Some(kind) = DocumentKind::from_mime(content_type) else {
        tracing::warn!(content_type, "Unsupported content type; treating as empty document");
        return Ok(String::new());
    };

    let text = match kind {
        DocumentKind::PlainText => String::from_utf8(content)?,
        DocumentKind::Pdf => extract_pdf_text(content, pdf_workers).await?,
        DocumentKind::Docx => tokio::task::spawn_blocking(move || extract_docx_text(&content))
            .await
            .map_err(|error| ExtractionError::Task(error.to_string()))??,
    };
    tracing::debug!(?kind, bytes = text.len(), "Extracted document text");
    Ok(text)
}

/// Extract text page by page.
///
/// Each page runs on the blocking pool; at most `workers` pages are in flight and results are
/// joined in page order regardless of completion order. Pages without text contribute an empty
/// line.
async fn extract_pdf_text(content: Vec<u8>, workers: usize) -> Result<String, ExtractionError> {
    let document = tokio::task::spawn_blocking(move || lopdf::Document::load_mem(&content))
        .await
        .map_err(|error| ExtractionError::Task(error.to_string()))?
        .map_err(|error| ExtractionError::Pdf(error.to_string()))?;
    let document = Arc::new(document);
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    tracing::debug!(pages = page_numbers.len(), workers, "Extracting PDF pages");

    let pages: Vec<String> = stream::iter(page_numbers)
        .map(|page| {
            let document = Arc::clone(&document);
            async move {
                tokio::task::spawn_blocking(move || {
                    document.extract_text(&[page]).unwrap_or_else(|error| {
                        tracing::debug!(page, error = %error, "Page has no extractable text");
                        String::new()
                    })
                })
                .await
                .map_err(|error| ExtractionError::Task(error.to_string()))
            }
        })
        .buffered(workers.max(1))
        .try_collect()
        .await?;

    Ok(pages.join("\n"))
}

/// Extract body paragraphs from a DOCX archive.
///
/// Paragraphs nested in tables are skipped, as are paragraphs nested inside another paragraph
/// (text boxes). Within a paragraph, `w:t` runs are concatenated, `w:tab` becomes a tab and
/// `w:br` a newline.
pub(crate) fn extract_docx_text(content: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content))
        .map_err(|error| ExtractionError::Docx(error.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|error| ExtractionError::Docx(format!("{DOCX_BODY_PART}: {error}")))?
        .read_to_string(&mut xml)
        .map_err(|error| ExtractionError::Docx(error.to_string()))?;

    paragraphs_from_document_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

fn paragraphs_from_document_xml(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut table_depth = 0usize;
    let mut paragraph_depth = 0usize;
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|error| ExtractionError::Docx(error.to_string()))?;
        let in_body_paragraph = table_depth == 0 && paragraph_depth == 1;
        match event {
            Event::Start(element) => match element.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"p" if table_depth == 0 => paragraph_depth += 1,
                b"t" => in_text_run = true,
                _ => {}
            },
            Event::Empty(element) => match element.local_name().as_ref() {
                b"tab" if in_body_paragraph => current.push('\t'),
                b"br" | b"cr" if in_body_paragraph => current.push('\n'),
                b"p" if table_depth == 0 && paragraph_depth == 0 => {
                    paragraphs.push(String::new())
                }
                _ => {}
            },
            Event::Text(text) if in_text_run && in_body_paragraph => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| ExtractionError::Docx(error.to_string()))?;
                current.push_str(&unescaped);
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"p" if table_depth == 0 => {
                    if paragraph_depth == 1 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    paragraph_depth = paragraph_depth.saturating_sub(1);
                }
                b"t" => in_text_run = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};
    use std::io::Write;

    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode")));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCX_BODY_PART, zip::write::FileOptions::default())
            .expect("start file");
        writer.write_all(xml.as_bytes()).expect("write xml");
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn maps_known_mime_types() {
        assert_eq!(
            DocumentKind::from_mime("text/plain; charset=utf-8"),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(
            DocumentKind::from_mime("Application/PDF"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_mime(DOCX_MIME), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_mime(MSWORD_MIME), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_mime("image/png"), None);
    }

    #[tokio::test]
    async fn plain_text_is_decoded() {
        let text = extract_text("Hello there.".as_bytes().to_vec(), "text/plain", 2)
            .await
            .unwrap();
        assert_eq!(text, "Hello there.");
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let error = extract_text(vec![0xff, 0xfe, 0x00], "text/plain", 2)
            .await
            .expect_err("invalid utf-8");
        assert!(matches!(error, ExtractionError::InvalidUtf8(_)));
    }

    #[tokio::test]
    async fn unknown_type_yields_empty_text() {
        let text = extract_text(b"GIF89a".to_vec(), "image/gif", 2)
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn malformed_pdf_is_an_error() {
        let error = extract_text(b"not a pdf".to_vec(), "application/pdf", 2)
            .await
            .expect_err("malformed pdf");
        assert!(matches!(error, ExtractionError::Pdf(_)));
    }

    #[tokio::test]
    async fn pdf_pages_are_joined_in_page_order() {
        let pdf = pdf_with_pages(&["First page.", "Second page.", "Third page."]);

        let text = extract_text(pdf, "application/pdf", 3).await.unwrap();

        let pages: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        assert_eq!(pages, ["First page.", "Second page.", "Third page."]);
    }

    #[tokio::test]
    async fn docx_paragraphs_are_joined_with_newlines() {
        let docx = docx_with_body(
            "<w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>tabbed</w:t></w:r></w:p>",
        );
        let text = extract_text(docx, DOCX_MIME, 2).await.unwrap();
        assert_eq!(text, "First paragraph.\n\nTom & Jerry\ttabbed");
    }

    #[test]
    fn docx_table_paragraphs_are_skipped() {
        let docx = docx_with_body(
            "<w:p><w:r><w:t>Before</w:t></w:r></w:p>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>\
             <w:p><w:r><w:t>After</w:t></w:r></w:p>",
        );
        assert_eq!(extract_docx_text(&docx).unwrap(), "Before\nAfter");
    }

    #[test]
    fn docx_text_box_paragraphs_do_not_reset_the_outer_paragraph() {
        let docx = docx_with_body(
            "<w:p><w:r><w:t>Before box. </w:t></w:r>\
             <w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></w:pict></w:r>\
             <w:r><w:t>After box.</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Next</w:t></w:r></w:p>",
        );
        assert_eq!(
            extract_docx_text(&docx).unwrap(),
            "Before box. After box.\nNext"
        );
    }

    #[test]
    fn non_zip_docx_is_an_error() {
        let error = extract_docx_text(b"plain bytes").expect_err("not a zip");
        assert!(matches!(error, ExtractionError::Docx(_)));
    }
}
