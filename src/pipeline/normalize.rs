//! Document normalization: turn a list of input files into one text blob.
//!
//! The model sees every document in a single request, so it has to be told
//! where one ends and the next begins. Each document is rendered as Markdown
//! and introduced by a provenance banner carrying its name and, when the
//! filename gives it away, whether it is the previous or the current version
//! of the design under review.
//!
//! Textual inputs (`.md`, `.markdown`, `.txt`) are read as UTF-8. Everything
//! else goes through a [`DocumentConverter`]; the default one extracts page
//! text with pdfium. This stage only reads.

use crate::config::VersionMarkers;
use crate::error::{BoxError, ReviewError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Width of the `=` rule above and below each banner.
pub const BANNER_WIDTH: usize = 80;

const TEXT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Converts a non-textual document into Markdown.
///
/// Conversion is blocking; callers on an async runtime should run it via
/// `spawn_blocking` (the extraction client does).
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<String, BoxError>;
}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type SharedConverter = Arc<dyn DocumentConverter>;

/// How a document's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Handed to the converter (PDF exports of workbook sheets, in practice).
    Pdf,
    /// Read as-is.
    Markdown,
}

impl SourceFormat {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            SourceFormat::Markdown
        } else {
            SourceFormat::Pdf
        }
    }
}

/// One input document, rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub text: String,
}

impl NormalizedDocument {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Stem plus lower-cased extension, e.g. `design_V7.pdf`.
    fn label(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}.{}", ext.to_lowercase()),
            None => stem,
        }
    }

    /// Render the banner and body. `position` is 1-based.
    pub fn render_section(&self, position: usize, markers: &VersionMarkers) -> String {
        let name = self.file_name();
        let annotation = markers.annotate(&name, position);
        let rule = "=".repeat(BANNER_WIDTH);
        format!(
            "\n{rule}\nドキュメント: {label}{annotation}\nファイル名: {name}\n{rule}\n\n{text}\n",
            label = self.label(),
            text = self.text,
        )
    }
}

impl VersionMarkers {
    /// Banner annotation for `file_name`: the logical version when the name
    /// carries a marker for it, otherwise the document's position.
    pub fn annotate(&self, file_name: &str, position: usize) -> String {
        if self.matches(file_name, self.previous) {
            format!(" (前回の設計書 V{})", self.previous)
        } else if self.matches(file_name, self.current) {
            format!(" (今回の設計書 V{})", self.current)
        } else {
            format!(" (Document {position})")
        }
    }

    fn matches(&self, file_name: &str, version: u32) -> bool {
        file_name.to_uppercase().contains(&format!("V{version}"))
            || file_name.contains(&format!("_{version}"))
    }
}

/// Fail with [`ReviewError::NotFound`] for the first path that does not exist.
pub fn ensure_exist(paths: &[PathBuf]) -> Result<(), ReviewError> {
    match paths.iter().find(|p| !p.exists()) {
        Some(missing) => Err(ReviewError::NotFound {
            path: missing.clone(),
        }),
        None => Ok(()),
    }
}

/// Load every document, in order.
pub fn load_documents(
    paths: &[PathBuf],
    converter: &dyn DocumentConverter,
) -> Result<Vec<NormalizedDocument>, ReviewError> {
    ensure_exist(paths)?;
    paths.iter().map(|p| load_document(p, converter)).collect()
}

fn load_document(
    path: &Path,
    converter: &dyn DocumentConverter,
) -> Result<NormalizedDocument, ReviewError> {
    let format = SourceFormat::of(path);
    info!("Processing file: {}", path.display());

    let text = match format {
        SourceFormat::Markdown => {
            let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
            String::from_utf8(bytes).map_err(|source| ReviewError::Decode {
                path: path.to_path_buf(),
                source,
            })?
        }
        SourceFormat::Pdf => converter
            .convert(path)
            .map_err(|e| ReviewError::Conversion {
                file: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                detail: e.to_string(),
            })?,
    };

    debug!("{}: {} chars ({:?})", path.display(), text.len(), format);
    Ok(NormalizedDocument {
        path: path.to_path_buf(),
        format,
        text,
    })
}

fn io_error(path: &Path, e: std::io::Error) -> ReviewError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ReviewError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ReviewError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

/// Concatenate rendered sections, in input order, separated by a blank line.
pub fn render_documents(docs: &[NormalizedDocument], markers: &VersionMarkers) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, d)| d.render_section(i + 1, markers))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Load and render `paths` into the single text blob sent to the model.
pub fn normalize(
    paths: &[PathBuf],
    converter: &dyn DocumentConverter,
    markers: &VersionMarkers,
) -> Result<String, ReviewError> {
    let docs = load_documents(paths, converter)?;
    let text = render_documents(&docs, markers);
    info!(
        "Combined {} files into Markdown ({} characters)",
        docs.len(),
        text.chars().count()
    );
    Ok(text)
}

// ── pdfium converter ─────────────────────────────────────────────────────

/// Extracts page text with pdfium.
///
/// Binding order: `PDFIUM_LIB_PATH` if set, then the platform library in
/// the working directory, then the system library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumConverter {
    password: Option<String>,
}

impl PdfiumConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// User password for encrypted PDFs.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    fn bind() -> Result<Pdfium, PdfiumError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(p) if !p.is_empty() => Pdfium::bind_to_library(p)?,
            _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl DocumentConverter for PdfiumConverter {
    fn convert(&self, path: &Path) -> Result<String, BoxError> {
        let pdfium = Self::bind().map_err(|e| format!("failed to bind pdfium: {e:?}"))?;
        let document = pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| describe_load_error(&format!("{e:?}"), self.password.is_some()))?;

        let mut pages = Vec::new();
        for page in document.pages().iter() {
            let text = page.text().map_err(|e| format!("{e:?}"))?;
            let body = text.all();
            let body = body.trim();
            if !body.is_empty() {
                pages.push(body.to_string());
            }
        }
        debug!("{}: extracted {} text pages", path.display(), pages.len());
        Ok(pages.join("\n\n"))
    }
}

/// Turn a pdfium load failure into a message that says what to do about it.
fn describe_load_error(detail: &str, password_given: bool) -> String {
    if detail.contains("Password") || detail.contains("password") {
        if password_given {
            "wrong password for encrypted PDF".to_string()
        } else {
            "PDF is password-protected; supply one with --password".to_string()
        }
    } else {
        format!("not a readable PDF: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns fixed text per file name; fails for names it does not know.
    struct FixedConverter(HashMap<String, String>);

    impl FixedConverter {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl DocumentConverter for FixedConverter {
        fn convert(&self, path: &Path) -> Result<String, BoxError> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.0
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("unsupported document {name}").into())
        }
    }

    fn touch(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn sections_follow_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "specA.pdf", b"%PDF");
        let b = touch(tmp.path(), "specB.pdf", b"%PDF");
        let conv = FixedConverter::new(&[("specA.pdf", "REQ-1: foo"), ("specB.pdf", "REQ-1: bar")]);

        let text = normalize(&[a, b], &conv, &VersionMarkers::default()).unwrap();
        let foo = text.find("REQ-1: foo").unwrap();
        let bar = text.find("REQ-1: bar").unwrap();
        assert!(foo < bar);
        assert_eq!(text.matches("ファイル名: ").count(), 2);
        assert!(text.contains("ドキュメント: specA.pdf (Document 1)"));
        assert!(text.contains("ドキュメント: specB.pdf (Document 2)"));
    }

    #[test]
    fn markdown_is_read_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let md = touch(tmp.path(), "notes.MD", "# 見出し\n本文".as_bytes());
        // The converter knows nothing, so reaching it would fail.
        let conv = FixedConverter::new(&[]);

        let docs = load_documents(&[md], &conv).unwrap();
        assert_eq!(docs[0].format, SourceFormat::Markdown);
        assert_eq!(docs[0].text, "# 見出し\n本文");
        assert!(docs[0].render_section(1, &VersionMarkers::default()).contains("notes.md"));
    }

    #[test]
    fn missing_path_fails_at_any_position() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "a.md", b"a");
        let b = touch(tmp.path(), "b.md", b"b");
        let missing = tmp.path().join("gone.md");
        let conv = FixedConverter::new(&[]);

        for paths in [
            vec![missing.clone(), a.clone(), b.clone()],
            vec![a.clone(), missing.clone(), b.clone()],
            vec![a.clone(), b.clone(), missing.clone()],
        ] {
            match normalize(&paths, &conv, &VersionMarkers::default()) {
                Err(ReviewError::NotFound { path }) => assert_eq!(path, missing),
                other => panic!("expected NotFound, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = touch(tmp.path(), "bad.md", &[0xff, 0xfe, 0x41]);
        let err = normalize(&[bad], &FixedConverter::new(&[]), &VersionMarkers::default())
            .unwrap_err();
        assert!(matches!(err, ReviewError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn converter_failure_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = touch(tmp.path(), "broken.pdf", b"%PDF");
        let err = normalize(&[pdf], &FixedConverter::new(&[]), &VersionMarkers::default())
            .unwrap_err();
        match err {
            ReviewError::Conversion { file, detail } => {
                assert_eq!(file, "broken.pdf");
                assert!(detail.contains("unsupported"));
            }
            other => panic!("expected Conversion, got {other:?}"),
        }
    }

    #[test]
    fn version_markers_annotate_banners() {
        let m = VersionMarkers::default();
        assert_eq!(m.annotate("設計書_画面_V6.pdf", 1), " (前回の設計書 V6)");
        assert_eq!(m.annotate("design_v7.pdf", 1), " (今回の設計書 V7)");
        assert_eq!(m.annotate("design_7.md", 1), " (今回の設計書 V7)");
        assert_eq!(m.annotate("requirements.pdf", 3), " (Document 3)");

        let custom = VersionMarkers {
            previous: 2,
            current: 3,
        };
        assert_eq!(custom.annotate("spec_V3.pdf", 1), " (今回の設計書 V3)");
    }

    #[test]
    fn banner_layout() {
        let doc = NormalizedDocument {
            path: PathBuf::from("/tmp/req.pdf"),
            format: SourceFormat::Pdf,
            text: "BODY".into(),
        };
        let rule = "=".repeat(BANNER_WIDTH);
        let s = doc.render_section(1, &VersionMarkers::default());
        assert_eq!(
            s,
            format!("\n{rule}\nドキュメント: req.pdf (Document 1)\nファイル名: req.pdf\n{rule}\n\nBODY\n")
        );
    }

    #[test]
    fn password_errors_are_explained() {
        let err = "PdfiumLibraryInternalError(PasswordError)";
        assert!(describe_load_error(err, false).contains("--password"));
        assert_eq!(
            describe_load_error(err, true),
            "wrong password for encrypted PDF"
        );
        assert!(describe_load_error("FormatError", false).contains("FormatError"));
    }

    #[test]
    fn converter_keeps_password() {
        assert_eq!(PdfiumConverter::new().password(), None);
        assert_eq!(PdfiumConverter::with_password("s3cret").password(), Some("s3cret"));
    }
}
