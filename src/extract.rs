//! PDF text extraction.
//!
//! Extraction is page-by-page: a page whose text layer cannot be decoded contributes empty
//! text instead of failing the document, so a partially corrupt PDF still yields whatever is
//! recoverable. Only a document that fails to parse at all, or that yields no text on any
//! page, is treated as an extraction failure by the caller.

use lopdf::Document;
use std::path::Path;
use thiserror::Error;

/// Errors raised while extracting text from a PDF.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document structure could not be parsed.
    #[error("failed to parse PDF: {0}")]
    Parse(#[from] lopdf::Error),
}

/// Extract the text layer from a PDF on disk.
///
/// Pages are visited in order; per-page decode failures are logged and substituted with
/// empty text. The result is trimmed, so a document with no extractable text returns an
/// empty string rather than an error.
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let document = Document::load(path)?;
    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut text_parts = Vec::with_capacity(page_numbers.len());
    for page in page_numbers {
        match document.extract_text(&[page]) {
            Ok(text) => text_parts.push(text),
            Err(error) => {
                tracing::warn!(page, error = %error, "Page extraction failed; substituting empty text");
                text_parts.push(String::new());
            }
        }
    }

    Ok(text_parts.join("\n\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn pdf_with_text(text: &str) -> Document {
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
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn extracts_text_from_simple_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sample.pdf");
        pdf_with_text("Winter wheat thrives in cold climates")
            .save(&path)
            .expect("save pdf");

        let text = extract_pdf_text(&path).expect("extract");
        assert!(text.contains("Winter wheat"));
    }

    #[test]
    fn empty_document_yields_empty_string() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blank.pdf");
        pdf_with_text("").save(&path).expect("save pdf");

        let text = extract_pdf_text(&path).expect("extract");
        assert!(text.is_empty());
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("not-a-pdf.pdf");
        std::fs::write(&path, b"this is not a pdf").expect("write");

        assert!(extract_pdf_text(&path).is_err());
    }
}
