//! Stage-2 adapter backed by PDFium, for the in-process modes.
//!
//! | Mode       | Token | Output                                           |
//! |------------|-------|--------------------------------------------------|
//! | `Layout`   | `y1`  | DOCX, one rendered picture per page              |
//! | `Text`     | `y1x` | TXT, extracted text with spaces removed          |
//! | `TextDocx` | `y1d` | DOCX, one body-style paragraph per text line     |
//!
//! One bound library is shared by every worker; pdfium-render's `sync`
//! feature serialises the calls. Every conversion runs on the blocking pool.
//! The document is loaded and dropped inside that job, so no handle on the
//! intermediate outlives the call. A job whose caller timed out stops at the
//! next page and never publishes its output.

use super::docx::{DocxBuilder, PageImage};
use super::{run_blocking, text, write_atomically, CancelFlag, Stage2Converter};
use crate::config::ConversionMode;
use crate::error::{BatchError, ConverterError};
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Rendering resolution for `Layout` mode.
pub const DEFAULT_RENDER_DPI: u32 = 150;
/// Longest rendered edge, whatever the page size.
pub const MAX_RENDERED_PIXELS: u32 = 4000;

pub struct PdfiumStage2 {
    pdfium: Arc<Pdfium>,
    mode: ConversionMode,
    render_dpi: u32,
}

impl PdfiumStage2 {
    /// Wrap an already bound library. `mode` must be an in-process mode.
    pub fn new(pdfium: Arc<Pdfium>, mode: ConversionMode) -> Result<Self, BatchError> {
        if !mode.is_in_process() {
            return Err(BatchError::InvalidConfig(format!(
                "mode {mode} is not handled by the PDFium adapter"
            )));
        }
        Ok(Self {
            pdfium,
            mode,
            render_dpi: DEFAULT_RENDER_DPI,
        })
    }

    /// Bind PDFium via `converter-locate` and wrap it.
    pub fn bind(mode: ConversionMode, library: Option<&Path>) -> Result<Self, BatchError> {
        let pdfium =
            converter_locate::bind_pdfium(library).map_err(|e| BatchError::ConverterNotFound {
                converter: "PDFium".to_string(),
                detail: e.to_string(),
            })?;
        Self::new(Arc::new(pdfium), mode)
    }

    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi.max(1);
        self
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }
}

#[async_trait]
impl Stage2Converter for PdfiumStage2 {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn final_extension(&self) -> &str {
        self.mode.final_extension()
    }

    async fn to_final(&self, intermediate: &Path, output: &Path) -> Result<(), ConverterError> {
        let pdfium = Arc::clone(&self.pdfium);
        let mode = self.mode;
        let dpi = self.render_dpi;
        let input = intermediate.to_path_buf();
        let output = output.to_path_buf();

        run_blocking(move |cancel| convert_blocking(&pdfium, mode, dpi, &input, &output, cancel))
            .await
    }
}

fn convert_blocking(
    pdfium: &Pdfium,
    mode: ConversionMode,
    dpi: u32,
    input: &Path,
    output: &Path,
    cancel: &CancelFlag,
) -> Result<(), ConverterError> {
    let document = pdfium
        .load_pdf_from_file(input, None)
        .map_err(|e| ConverterError::Library(format!("cannot open PDF: {e:?}")))?;

    let page_count = document.pages().len();
    debug!("{}: {} page(s)", input.display(), page_count);

    match mode {
        ConversionMode::Text => {
            let text = text::clean_extracted(&extract_text(&document)?);
            write_atomically(output, cancel, |file| {
                let mut w = BufWriter::new(file);
                w.write_all(text.as_bytes())
                    .and_then(|_| w.flush())
                    .map_err(|e| io_error(output, e))
            })
        }
        ConversionMode::TextDocx => {
            let text = text::clean_extracted(&extract_text(&document)?);
            let mut builder = DocxBuilder::new();
            for line in text::paragraph_lines(&text) {
                builder.push_paragraph(line);
            }
            write_docx(&builder, output, cancel)
        }
        ConversionMode::Layout => {
            let builder = render_layout(&document, dpi, cancel)?;
            write_docx(&builder, output, cancel)
        }
        ConversionMode::External => Err(ConverterError::Library(
            "external mode routed to the PDFium adapter".to_string(),
        )),
    }
}

fn extract_text(document: &PdfDocument) -> Result<String, ConverterError> {
    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| {
            ConverterError::Library(format!("text extraction failed on page {}: {e:?}", idx + 1))
        })?;
        pages.push(text.all());
    }
    Ok(text::join_pages(pages))
}

fn render_layout(
    document: &PdfDocument,
    dpi: u32,
    cancel: &CancelFlag,
) -> Result<DocxBuilder, ConverterError> {
    let mut builder = DocxBuilder::new();

    for (idx, page) in document.pages().iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }
        let width_pt = page.width().value;
        let height_pt = page.height().value;
        let target = ((width_pt / 72.0) * dpi as f32).round().max(1.0) as u32;

        let config = PdfRenderConfig::new()
            .set_target_width(target.min(MAX_RENDERED_PIXELS) as i32)
            .set_maximum_height(MAX_RENDERED_PIXELS as i32);

        let bitmap = page.render_with_config(&config).map_err(|e| {
            ConverterError::Library(format!("rendering page {} failed: {e:?}", idx + 1))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| {
                ConverterError::Library(format!("encoding page {} failed: {e}", idx + 1))
            })?;

        builder.push_page(PageImage {
            png,
            width_pt,
            height_pt,
        });
    }

    Ok(builder)
}

fn write_docx(
    builder: &DocxBuilder,
    output: &Path,
    cancel: &CancelFlag,
) -> Result<(), ConverterError> {
    write_atomically(output, cancel, |file| {
        builder
            .write(BufWriter::new(file))
            .and_then(|mut w| w.flush().map_err(Into::into))
            .map_err(|e| ConverterError::Library(format!("writing DOCX failed: {e}")))
    })
}

fn io_error(path: &Path, source: std::io::Error) -> ConverterError {
    ConverterError::Io {
        path: PathBuf::from(path),
        source,
    }
}
