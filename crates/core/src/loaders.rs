use crate::error::{RagError, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Upload formats the loaders understand, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Markdown,
    Json,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// Extracted text plus the identity a corpus will file it under.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub id: String,
    pub filename: String,
    pub type_tag: String,
    pub text: String,
}

/// Extract text from a supported file. The corpus makes no assumption
/// about how text was produced; this is the whole format boundary.
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| RagError::UnsupportedFormat(path.display().to_string()))?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RagError::MissingFileName(path.display().to_string()))?
        .to_string();

    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(path)?,
        DocumentKind::Text | DocumentKind::Markdown => {
            fs::read_to_string(path)?.trim().to_string()
        }
        DocumentKind::Json => extract_json_text(path)?,
    };

    Ok(LoadedDocument {
        id: derive_document_id(&filename, &text),
        filename,
        type_tag: kind.type_tag().to_string(),
        text,
    })
}

/// Every supported file under `folder`, recursively, sorted by path.
pub fn discover_supported_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if DocumentKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let document =
        lopdf::Document::load(path).map_err(|error| RagError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| RagError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(text.trim().to_string());
        }
    }

    if pages.is_empty() {
        return Err(RagError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages.join("\n\n"))
}

/// Concatenate every string value in the JSON document, depth first.
fn extract_json_text(path: &Path) -> Result<String> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let mut parts = Vec::new();
    collect_strings(&value, &mut parts);
    Ok(parts.join("\n"))
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(fields) => {
            for field in fields.values() {
                collect_strings(field, out);
            }
        }
        _ => {}
    }
}

fn derive_document_id(filename: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::{discover_supported_files, load_document, DocumentKind};
    use crate::error::RagError;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn plain_text_is_loaded_and_trimmed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "  some notes\n")?;

        let document = load_document(&path)?;
        assert_eq!(document.filename, "notes.txt");
        assert_eq!(document.type_tag, "txt");
        assert_eq!(document.text, "some notes");
        assert_eq!(document.id.len(), 16);
        Ok(())
    }

    #[test]
    fn json_loader_collects_nested_string_values() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{"title": "Report", "items": [{"note": "first"}, "second"], "count": 3}"#,
        )?;

        let document = load_document(&path)?;
        assert_eq!(document.type_tag, "json");
        assert!(document.text.contains("Report"));
        assert!(document.text.contains("first"));
        assert!(document.text.contains("second"));
        assert!(!document.text.contains('3'));
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = load_document(Path::new("archive.zip"));
        assert!(matches!(result, Err(RagError::UnsupportedFormat(_))));
    }

    #[test]
    fn unreadable_pdf_reports_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = load_document(&path);
        assert!(matches!(result, Err(RagError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn document_id_is_stable_for_identical_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("a.md");
        fs::write(&path, "# heading")?;

        let first = load_document(&path)?;
        let second = load_document(&path)?;
        assert_eq!(first.id, second.id);
        Ok(())
    }

    #[test]
    fn discovery_is_recursive_and_skips_unknown_formats(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.txt")).and_then(|mut file| file.write_all(b"a"))?;
        File::create(nested.join("b.md")).and_then(|mut file| file.write_all(b"b"))?;
        File::create(nested.join("c.zip")).and_then(|mut file| file.write_all(b"c"))?;

        let files = discover_supported_files(base);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|path| DocumentKind::from_path(path).is_some()));
        Ok(())
    }
}
