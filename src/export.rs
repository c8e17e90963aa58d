//! PDF export of a laid-out report via `printpdf`.
//!
//! Draws exactly the pages `layout` produced: page 1 carries the header
//! grid followed by its body lines, later pages carry body lines from the
//! top margin. No pagination decisions are made here.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::*;
use serde::Serialize;

use crate::error::ExportError;
use crate::layout::{HeaderBlock, PaginatedDocument};

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PDF_EXTENSION: &str = "pdf";

/// Millimetres per PostScript point.
const MM_PER_PT: f32 = 25.4 / 72.0;

/// PDF bytes plus the name they are stored under. Regenerated on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl ExportedDocument {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// File name for a report: template display name with spaces replaced by
/// underscores, plus `.pdf`. Path separators are replaced too.
pub fn file_name_for(template_name: &str) -> String {
    let stem: String = template_name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "report".to_string() } else { stem };
    format!("{stem}.{PDF_EXTENSION}")
}

/// Page size and fonts used to draw a `PaginatedDocument`. Positions from
/// the layout are millimetres from the page top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentExporter {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub left_margin_mm: f32,
    pub body_font_size: f32,
    pub header_font_size: f32,
    /// Height of one header grid row (labels, then values).
    pub grid_row_height_mm: f32,
}

impl Default for DocumentExporter {
    fn default() -> Self {
        Self::a4()
    }
}

impl DocumentExporter {
    pub fn a4() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            left_margin_mm: 15.0,
            body_font_size: 10.0,
            header_font_size: 8.0,
            grid_row_height_mm: 7.0,
        }
    }

    /// Render the pages to PDF bytes. The layout must have been cut for a
    /// page no taller than this exporter's page.
    pub fn render(&self, document: &PaginatedDocument, title: &str) -> Result<Vec<u8>, ExportError> {
        let budget = document.geometry.page_height_budget;
        if budget > self.page_height_mm {
            return Err(ExportError::Geometry(format!(
                "page height budget {budget} exceeds page height {} mm",
                self.page_height_mm
            )));
        }

        let width = Mm(self.page_width_mm);
        let height = Mm(self.page_height_mm);
        let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");

        let body_font = doc
            .add_builtin_font(BuiltinFont::Courier)
            .map_err(|e| ExportError::Font(e.to_string()))?;
        let label_font = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Font(e.to_string()))?;
        let value_font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Font(e.to_string()))?;

        let geometry = &document.geometry;
        for (index, page) in document.pages.iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (p, l) = doc.add_page(width, height, "Layer 1");
                doc.get_page(p).get_layer(l)
            };

            let origin = if page.is_first_page {
                self.draw_header(
                    &layer,
                    &document.header,
                    geometry.top_margin,
                    geometry.header_height,
                    &label_font,
                    &value_font,
                );
                geometry.first_page_origin()
            } else {
                geometry.continuation_origin()
            };

            for (row, line) in page.lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let top = origin + row as f32 * geometry.line_height;
                let baseline = top + geometry.line_height * 0.75;
                layer.use_text(
                    line.as_str(),
                    self.body_font_size,
                    Mm(self.left_margin_mm),
                    Mm(self.page_height_mm - baseline),
                    &body_font,
                );
            }
        }

        tracing::debug!(pages = document.page_count(), "PDF rendered");

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ExportError::Save(e.to_string()))?;
        buf.into_inner()
            .map_err(|e| ExportError::Buffer(e.to_string()))
    }

    /// Two-row grid (labels over values), one column per header field,
    /// spanning the printable width below the top margin.
    fn draw_header(
        &self,
        layer: &PdfLayerReference,
        header: &HeaderBlock,
        top: f32,
        reserved: f32,
        label_font: &IndirectFontRef,
        value_font: &IndirectFontRef,
    ) {
        if header.columns.is_empty() || reserved <= 0.0 {
            return;
        }
        let row_h = self.grid_row_height_mm.min(reserved / 2.0);
        let left = self.left_margin_mm;
        let right = self.page_width_mm - self.left_margin_mm;
        let col_w = (right - left) / header.columns.len() as f32;
        let y = |from_top: f32| Mm(self.page_height_mm - from_top);

        layer.set_outline_thickness(0.5);
        for row in 0..=2 {
            let at = top + row as f32 * row_h;
            layer.add_line(segment((Mm(left), y(at)), (Mm(right), y(at))));
        }
        for col in 0..=header.columns.len() {
            let x = Mm(left + col as f32 * col_w);
            layer.add_line(segment((x, y(top)), (x, y(top + 2.0 * row_h))));
        }

        let max_chars = cell_capacity(col_w, self.header_font_size);
        for (col, column) in header.columns.iter().enumerate() {
            let x = Mm(left + col as f32 * col_w + 1.5);
            layer.use_text(
                fit_cell(&column.label, max_chars),
                self.header_font_size,
                x,
                y(top + row_h * 0.7),
                label_font,
            );
            layer.use_text(
                fit_cell(&column.value, max_chars),
                self.header_font_size,
                x,
                y(top + row_h * 1.7),
                value_font,
            );
        }
    }
}

fn segment(from: (Mm, Mm), to: (Mm, Mm)) -> Line {
    Line {
        points: vec![
            (Point::new(from.0, from.1), false),
            (Point::new(to.0, to.1), false),
        ],
        is_closed: false,
    }
}

/// Characters of a proportional font that fit a cell, assuming an average
/// glyph width of 0.55 em and 3 mm of padding.
fn cell_capacity(col_width_mm: f32, font_size: f32) -> usize {
    let glyph_mm = font_size * 0.55 * MM_PER_PT;
    (((col_width_mm - 3.0) / glyph_mm).floor().max(1.0)) as usize
}

/// Truncate a cell value with an ellipsis when it would overflow the cell.
fn fit_cell(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    // builtin fonts are WinAnsi; stay ASCII
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Render with the default A4 exporter and name the result after the template.
pub fn export_document(
    document: &PaginatedDocument,
    template_name: &str,
) -> Result<ExportedDocument, ExportError> {
    let bytes = DocumentExporter::a4().render(document, template_name)?;
    Ok(ExportedDocument {
        bytes,
        file_name: file_name_for(template_name),
    })
}

/// Write PDF bytes into `dir`, creating it if needed. Returns the file path.
pub fn export_pdf_to_file(
    pdf_bytes: &[u8],
    file_name: &str,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, pdf_bytes)?;
    Ok(path)
}
