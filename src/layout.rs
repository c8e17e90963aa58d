//! Paginated document layout — draft text + study header → pages.
//!
//! Positions are measured downwards from the top edge of the page in the
//! geometry's unit (millimetres for the PDF geometry). Page 1 reserves room
//! for the header grid; continuation pages start at the top margin. A line
//! moves to the next page only when it would end strictly below the budget.

use serde::Serialize;

use crate::display_date::{normalize_display_date, parse_study_date};
use crate::error::LayoutError;
use crate::models::StudyMetadata;

/// Header reserve used by `layout`, in line heights.
pub const HEADER_RESERVE_LINES: f32 = 10.0;

/// Float slack for the boundary comparison.
const LAYOUT_EPSILON: f32 = 1e-3;

/// Printable columns for the Courier body font on A4 with 15 mm margins.
pub const A4_WRAP_COLUMNS: usize = 85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Lowest position a line may end at, measured from the page top.
    pub page_height_budget: f32,
    pub line_height: f32,
    /// Vertical space reserved for the header grid on page 1.
    pub header_height: f32,
    pub top_margin: f32,
}

impl PageGeometry {
    /// Geometry with the default header reserve and no top margin.
    pub fn new(page_height_budget: f32, line_height: f32) -> Self {
        Self {
            page_height_budget,
            line_height,
            header_height: HEADER_RESERVE_LINES * line_height,
            top_margin: 0.0,
        }
    }

    /// A4 portrait in millimetres, 15 mm top and bottom margins.
    pub fn a4() -> Self {
        Self {
            page_height_budget: 297.0 - 15.0,
            line_height: 5.0,
            header_height: 22.0,
            top_margin: 15.0,
        }
    }

    pub fn with_header_height(mut self, header_height: f32) -> Self {
        self.header_height = header_height;
        self
    }

    pub fn with_top_margin(mut self, top_margin: f32) -> Self {
        self.top_margin = top_margin;
        self
    }

    /// Cursor position of the first body line on page 1.
    pub fn first_page_origin(&self) -> f32 {
        self.header_height + self.top_margin
    }

    /// Cursor position of the first body line on continuation pages.
    pub fn continuation_origin(&self) -> f32 {
        self.top_margin
    }

    /// Lines that fit on a continuation page.
    pub fn lines_per_continuation_page(&self) -> usize {
        lines_fitting(self.continuation_origin(), self)
    }

    /// Lines that fit below the header on page 1.
    pub fn lines_on_first_page(&self) -> usize {
        lines_fitting(self.first_page_origin(), self)
    }

    fn overflows(&self, cursor: f32) -> bool {
        cursor + self.line_height > self.page_height_budget + LAYOUT_EPSILON
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let non_negative = |v: f32| v.is_finite() && v >= 0.0;

        if !positive(self.line_height) {
            return Err(LayoutError::InvalidGeometry(format!(
                "line height must be positive, got {}",
                self.line_height
            )));
        }
        if !positive(self.page_height_budget) {
            return Err(LayoutError::InvalidGeometry(format!(
                "page height budget must be positive, got {}",
                self.page_height_budget
            )));
        }
        if !non_negative(self.header_height) || !non_negative(self.top_margin) {
            return Err(LayoutError::InvalidGeometry(
                "header height and top margin must be non-negative".into(),
            ));
        }
        if self.overflows(self.continuation_origin()) {
            return Err(LayoutError::InvalidGeometry(format!(
                "a continuation page cannot hold one line (budget {}, top margin {}, line height {})",
                self.page_height_budget, self.top_margin, self.line_height
            )));
        }
        Ok(())
    }
}

fn lines_fitting(origin: f32, geometry: &PageGeometry) -> usize {
    let mut n = 0usize;
    while !geometry.overflows(origin + n as f32 * geometry.line_height) {
        n += 1;
    }
    n
}

// ─── Header block ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderColumn {
    pub label: String,
    pub value: String,
}

/// Patient/study identification grid printed on page 1 only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderBlock {
    pub columns: Vec<HeaderColumn>,
}

impl HeaderBlock {
    /// Six columns when age and sex are tracked, five (with location)
    /// otherwise. The date is normalized to `DD-Month-YYYY`, falling back
    /// to the raw value.
    pub fn from_metadata(metadata: &StudyMetadata) -> Self {
        let column = |label: &str, value: &str| HeaderColumn {
            label: label.to_string(),
            value: value.trim().to_string(),
        };
        if parse_study_date(&metadata.date).is_none() {
            tracing::debug!(
                study_uid = %metadata.study_instance_uid,
                raw_date = %metadata.date,
                "Unparseable study date, printing raw value"
            );
        }
        let date = normalize_display_date(&metadata.date);

        let columns = match (&metadata.patient_age, &metadata.patient_sex) {
            (Some(age), Some(sex)) if metadata.tracks_age_and_sex() => vec![
                column("Patient ID", &metadata.patient_id),
                column("Patient Name", &metadata.patient_name),
                column("Age Yrs", age),
                column("Date", &date),
                column("Gender", sex),
                column("Ref Doctor", &metadata.referring_physician),
            ],
            _ => vec![
                column("Patient ID", &metadata.patient_id),
                column("Patient Name", &metadata.patient_name),
                column("Date", &date),
                column("Location", &metadata.location),
                column("Ref Doctor", &metadata.referring_physician),
            ],
        };
        Self { columns }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn value(&self, label: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.value.as_str())
    }
}

// ─── Pages ────────────────────────────────────────────────────────────────────

/// One bounded-height slice of the document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub lines: Vec<String>,
    pub is_first_page: bool,
}

/// Layout result: the header record, the geometry the pages were cut
/// with, and the pages in order. The exporter draws exactly these pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedDocument {
    pub header: HeaderBlock,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl PaginatedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Joins every page's lines with `\n`; equals the laid-out text.
    pub fn body_text(&self) -> String {
        self.pages
            .iter()
            .flat_map(|p| p.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lay out `body_text` under the study header with the default header
/// reserve (`HEADER_RESERVE_LINES` line heights) and no top margin.
pub fn layout(
    body_text: &str,
    header: &StudyMetadata,
    page_height_budget: f32,
    line_height: f32,
) -> Result<PaginatedDocument, LayoutError> {
    layout_with(
        body_text,
        header,
        &PageGeometry::new(page_height_budget, line_height),
    )
}

/// Lay out `body_text` with explicit geometry.
pub fn layout_with(
    body_text: &str,
    header: &StudyMetadata,
    geometry: &PageGeometry,
) -> Result<PaginatedDocument, LayoutError> {
    geometry.validate()?;

    let mut pages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut is_first_page = true;
    let mut origin = geometry.first_page_origin();

    if !body_text.is_empty() {
        for line in body_text.split('\n') {
            // Cursor recomputed from the line count so float error does not accumulate
            let cursor = origin + current.len() as f32 * geometry.line_height;
            if geometry.overflows(cursor) {
                pages.push(Page {
                    lines: std::mem::take(&mut current),
                    is_first_page,
                });
                is_first_page = false;
                origin = geometry.continuation_origin();
            }
            current.push(line.to_string());
        }
    }
    pages.push(Page {
        lines: current,
        is_first_page,
    });

    tracing::debug!(
        pages = pages.len(),
        lines = pages.iter().map(|p| p.lines.len()).sum::<usize>(),
        "Report laid out"
    );

    Ok(PaginatedDocument {
        header: HeaderBlock::from_metadata(header),
        geometry: *geometry,
        pages,
    })
}

// ─── Display wrapping ─────────────────────────────────────────────────────────

/// Wrap every line of `text` so its visible part fits in `columns`
/// characters.
///
/// Only line breaks are inserted: removing them gives back `text`
/// exactly. Breaks go after a whitespace run, which stays at the end of
/// its row; the leading indent stays on the first row. A word longer than
/// the room left on an otherwise empty row is split mid-word.
pub fn wrap_text(text: &str, columns: usize) -> String {
    text.split('\n')
        .flat_map(|line| wrap_line(line, columns))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, columns: usize) -> Vec<String> {
    if columns == 0 || line.chars().count() <= columns {
        return vec![line.to_string()];
    }

    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_len = 0usize;
    let mut has_word = false;

    for (word, gap) in word_runs(line) {
        let mut word: Vec<char> = word.chars().collect();

        if !word.is_empty() && has_word && row_len + word.len() > columns {
            rows.push(std::mem::take(&mut row));
            row_len = 0;
            has_word = false;
        }
        while row_len + word.len() > columns {
            let take = columns.saturating_sub(row_len).min(word.len());
            row.extend(word.drain(..take));
            rows.push(std::mem::take(&mut row));
            row_len = 0;
            has_word = false;
        }
        if !word.is_empty() {
            row_len += word.len();
            row.extend(word);
            has_word = true;
        }
        row.push_str(gap);
        row_len += gap.chars().count();
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }
    rows
}

/// Split a line into (word, following whitespace) pairs. A leading indent
/// comes out as a pair with an empty word.
fn word_runs(line: &str) -> Vec<(&str, &str)> {
    let mut runs = Vec::new();
    let mut rest = line;
    while !rest.is_empty() {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (word, tail) = rest.split_at(word_end);
        let gap_end = tail
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(tail.len());
        let (gap, next) = tail.split_at(gap_end);
        runs.push((word, gap));
        rest = next;
    }
    runs
}
