//! Bordered table drawing with header, wrapped cells and the totals line.

use crate::canvas::Canvas;
use crate::columns::column_offsets;
use crate::error::InvoiceError;
use crate::fit::{FitState, Row, TableMetrics};
use crate::font::{FontFamily, FontRegistry, FontStyle};
use crate::frame::{AddResult, Frame};
use crate::layout::{CellAlign, TableLayoutConfig};
use crate::model::HEADERS;
use crate::text::TextMeasure;
use crate::types::Pt;

/// Border width used for every cell.
pub const BORDER_WIDTH_MM: f32 = 0.2;
/// Gap between the top border and the first wrapped line.
pub const WRAP_TOP_INSET_MM: f32 = 0.5;

/// What to do with rows that do not fit on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Continue on a new page with the header repeated.
    #[default]
    Paginate,
    /// Keep drawing past the bottom edge.
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePhase {
    Pending,
    HeaderDrawn,
    RowsDrawn(usize),
    TotalsDrawn,
}

pub struct TableRenderer<'a> {
    config: &'a TableLayoutConfig,
    state: &'a FitState,
    registry: &'a FontRegistry,
    family: &'a FontFamily,
    left: Pt,
    offsets: Vec<Pt>,
    phase: TablePhase,
}

impl<'a> TableRenderer<'a> {
    pub fn new(
        config: &'a TableLayoutConfig,
        state: &'a FitState,
        registry: &'a FontRegistry,
        family: &'a FontFamily,
        left: Pt,
    ) -> Self {
        Self {
            config,
            state,
            registry,
            family,
            left,
            offsets: column_offsets(left, &state.column_widths),
            phase: TablePhase::Pending,
        }
    }

    pub fn phase(&self) -> TablePhase {
        self.phase
    }

    pub fn table_width(&self) -> Pt {
        self.state.column_widths.iter().copied().sum()
    }

    fn measure(&self, style: FontStyle) -> TextMeasure<'a> {
        TextMeasure::new(self.registry, self.family.name(style))
    }

    fn cells(&self) -> impl Iterator<Item = (usize, Pt, Pt)> + '_ {
        self.offsets
            .iter()
            .zip(&self.state.column_widths)
            .enumerate()
            .map(|(index, (x, width))| (index, *x, *width))
    }

    /// Bold, centered column titles. May repeat at the top of a continuation page.
    pub fn draw_header(&mut self, canvas: &mut Canvas, y: Pt) -> Result<Pt, InvoiceError> {
        let next = match self.phase {
            TablePhase::Pending | TablePhase::HeaderDrawn => TablePhase::HeaderDrawn,
            TablePhase::RowsDrawn(n) => TablePhase::RowsDrawn(n),
            TablePhase::TotalsDrawn => return Err(self.out_of_order("header")),
        };
        let height = self.config.header_height;
        let bold = self.measure(FontStyle::Bold);
        canvas.set_line_width(Pt::from_mm(BORDER_WIDTH_MM));
        for (index, x, width) in self.cells() {
            canvas.draw_rect(x, y, width, height);
            let title = HEADERS.get(index).copied().unwrap_or_default();
            let size = bold.fitted_font_size(
                title,
                self.state.font_size,
                width,
                self.config.min_cell_font_size,
            );
            canvas.set_font(bold.font(), size);
            canvas.draw_text(x, y, width, height, title, CellAlign::Center);
        }
        self.phase = next;
        Ok(height)
    }

    /// Draws one row at the height measured by the fit loop.
    pub fn draw_row(
        &mut self,
        canvas: &mut Canvas,
        y: Pt,
        row: &Row,
        height: Pt,
    ) -> Result<(), InvoiceError> {
        let drawn = match self.phase {
            TablePhase::HeaderDrawn => 0,
            TablePhase::RowsDrawn(n) => n,
            _ => return Err(self.out_of_order("row")),
        };
        let regular = self.measure(FontStyle::Regular);
        let font_size = self.state.font_size;
        for (index, x, width) in self.cells() {
            canvas.draw_rect(x, y, width, height);
            let text = row.get(index).map(String::as_str).unwrap_or_default();
            if self.config.is_wrap_column(index) {
                canvas.set_font(regular.font(), font_size);
                let lines = regular.wrap_lines(text, width, font_size);
                canvas.draw_wrapped_text(
                    x,
                    y + Pt::from_mm(WRAP_TOP_INSET_MM),
                    width,
                    self.state.row_height,
                    lines,
                    CellAlign::Left,
                );
            } else {
                let size = regular.fitted_font_size(
                    text,
                    font_size,
                    width,
                    self.config.min_cell_font_size,
                );
                canvas.set_font(regular.font(), size);
                canvas.draw_text(x, y, width, height, text, self.config.align(index));
            }
        }
        self.phase = TablePhase::RowsDrawn(drawn + 1);
        Ok(())
    }

    /// Right-aligned bold summary under the last row.
    pub fn draw_totals(
        &mut self,
        canvas: &mut Canvas,
        y: Pt,
        summary: &str,
    ) -> Result<Pt, InvoiceError> {
        if !matches!(self.phase, TablePhase::HeaderDrawn | TablePhase::RowsDrawn(_)) {
            return Err(self.out_of_order("totals"));
        }
        let bold = self.measure(FontStyle::Bold);
        let width = self.table_width();
        let size = bold.fitted_font_size(
            summary,
            self.config.totals_font_size(self.state.font_size),
            width,
            self.config.min_cell_font_size,
        );
        canvas.set_font(bold.font(), size);
        canvas.draw_text(
            self.left,
            y + self.config.totals_gap,
            width,
            self.config.totals_height,
            summary,
            CellAlign::Right,
        );
        self.phase = TablePhase::TotalsDrawn;
        Ok(self.config.totals_gap + self.config.totals_height)
    }

    fn out_of_order(&self, what: &str) -> InvoiceError {
        InvoiceError::Layout(format!("cannot draw {what} in phase {:?}", self.phase))
    }
}

/// Pages touched by one table draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePlacement {
    /// Rows drawn on each page the table touched, in order.
    pub rows_per_page: Vec<usize>,
    /// True when something was drawn past the bottom of its frame.
    pub overflowed: bool,
}

impl TablePlacement {
    pub fn rows_drawn(&self) -> usize {
        self.rows_per_page.iter().sum()
    }
}

/// Draws the whole table into `frame`, asking `next_page` for a fresh frame
/// whenever the policy says to break.
pub fn draw_table(
    renderer: &mut TableRenderer<'_>,
    canvas: &mut Canvas,
    frame: &mut Frame,
    rows: &[Row],
    metrics: &TableMetrics,
    summary: &str,
    policy: OverflowPolicy,
    next_page: &mut dyn FnMut(&mut Canvas) -> Frame,
) -> Result<TablePlacement, InvoiceError> {
    let mut placement = TablePlacement {
        rows_per_page: vec![0],
        overflowed: false,
    };
    let y = reserve(frame, metrics.header_height, &mut placement);
    renderer.draw_header(canvas, y)?;

    for (row, height) in rows.iter().zip(&metrics.row_heights) {
        let y = match frame.add(*height) {
            AddResult::Placed(y) => y,
            AddResult::Overflow => match policy {
                OverflowPolicy::Overflow => {
                    placement.overflowed = true;
                    frame.force(*height)
                }
                OverflowPolicy::Paginate => {
                    *frame = next_page(canvas);
                    placement.rows_per_page.push(0);
                    let header_y = reserve(frame, metrics.header_height, &mut placement);
                    renderer.draw_header(canvas, header_y)?;
                    reserve(frame, *height, &mut placement)
                }
            },
        };
        renderer.draw_row(canvas, y, row, *height)?;
        if let Some(count) = placement.rows_per_page.last_mut() {
            *count += 1;
        }
    }

    let y = match frame.add(metrics.totals_height) {
        AddResult::Placed(y) => y,
        AddResult::Overflow => match policy {
            OverflowPolicy::Overflow => {
                placement.overflowed = true;
                frame.force(metrics.totals_height)
            }
            OverflowPolicy::Paginate => {
                *frame = next_page(canvas);
                placement.rows_per_page.push(0);
                reserve(frame, metrics.totals_height, &mut placement)
            }
        },
    };
    renderer.draw_totals(canvas, y, summary)?;
    Ok(placement)
}

fn reserve(frame: &mut Frame, height: Pt, placement: &mut TablePlacement) -> Pt {
    match frame.add(height) {
        AddResult::Placed(y) => y,
        AddResult::Overflow => {
            placement.overflowed = true;
            frame.force(height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::fit::measure_table;
    use crate::layout::PageGeometry;
    use crate::model::{Density, Orientation};
    use crate::types::{Rect, Size};

    struct Fixture {
        registry: FontRegistry,
        family: FontFamily,
        config: TableLayoutConfig,
        state: FitState,
    }

    fn fixture() -> Fixture {
        let registry = FontRegistry::new();
        let family = FontFamily::default();
        let config = TableLayoutConfig::preset(Orientation::Portrait, Density::Normal);
        let geometry = PageGeometry::preset(Orientation::Portrait, Density::Normal);
        let state = {
            let measure = TextMeasure::new(&registry, &family.regular);
            FitState::initial(&config, geometry.size, geometry.margins, &measure)
        };
        Fixture {
            registry,
            family,
            config,
            state,
        }
    }

    fn row(qty: &str, service: &str) -> Row {
        [
            "2025-08-01".into(),
            service.into(),
            "M54.5".into(),
            String::new(),
            "0190".into(),
            "0000000000".into(),
            qty.into(),
            "R100.00".into(),
            "100.00".into(),
        ]
    }

    fn frame(height_mm: f32) -> Frame {
        Frame::new(Rect {
            x: Pt::from_mm(10.0),
            y: Pt::from_mm(60.0),
            width: Pt::from_mm(190.0),
            height: Pt::from_mm(height_mm),
        })
    }

    #[test]
    fn phases_advance_in_order() {
        let f = fixture();
        let mut canvas = Canvas::new(Size::a4());
        let mut renderer =
            TableRenderer::new(&f.config, &f.state, &f.registry, &f.family, Pt::from_mm(10.0));
        assert_eq!(renderer.phase(), TablePhase::Pending);
        assert!(renderer.draw_row(&mut canvas, Pt::ZERO, &row("1", "x"), Pt::from_i32(12)).is_err());
        renderer.draw_header(&mut canvas, Pt::ZERO).unwrap();
        assert_eq!(renderer.phase(), TablePhase::HeaderDrawn);
        renderer
            .draw_row(&mut canvas, Pt::from_i32(16), &row("1", "Consult"), Pt::from_i32(12))
            .unwrap();
        renderer
            .draw_row(&mut canvas, Pt::from_i32(28), &row("2", "Consult"), Pt::from_i32(12))
            .unwrap();
        assert_eq!(renderer.phase(), TablePhase::RowsDrawn(2));
        renderer.draw_header(&mut canvas, Pt::ZERO).unwrap();
        assert_eq!(renderer.phase(), TablePhase::RowsDrawn(2));
        renderer.draw_totals(&mut canvas, Pt::from_i32(40), "Total").unwrap();
        assert_eq!(renderer.phase(), TablePhase::TotalsDrawn);
        assert!(renderer.draw_header(&mut canvas, Pt::ZERO).is_err());
        assert!(renderer.draw_totals(&mut canvas, Pt::ZERO, "again").is_err());
    }

    #[test]
    fn row_draws_bordered_cells_and_literal_text() {
        let f = fixture();
        let mut canvas = Canvas::new(Size::a4());
        let mut renderer =
            TableRenderer::new(&f.config, &f.state, &f.registry, &f.family, Pt::from_mm(10.0));
        renderer.draw_header(&mut canvas, Pt::ZERO).unwrap();
        renderer
            .draw_row(&mut canvas, Pt::from_i32(20), &row("abc", "Consult"), Pt::from_i32(14))
            .unwrap();
        let doc = canvas.finish();
        let page = &doc.pages[0];
        let rects = page
            .commands
            .iter()
            .filter(|c| matches!(c, Command::DrawRect { .. }))
            .count();
        assert_eq!(rects, 18);
        let texts: Vec<&str> = page.texts().collect();
        assert!(texts.contains(&"abc"));
        assert!(texts.contains(&"ICD-10 Secondary"));
        let qty_align = page.commands.iter().find_map(|c| match c {
            Command::DrawText { text, align, .. } if text == "abc" => Some(*align),
            _ => None,
        });
        assert_eq!(qty_align, Some(CellAlign::Right));
        let wrapped = page.commands.iter().any(|c| {
            matches!(c, Command::DrawWrappedText { lines, align: CellAlign::Left, .. } if lines == &["Consult".to_string()])
        });
        assert!(wrapped);
    }

    #[test]
    fn paginate_draws_every_row_once() {
        let f = fixture();
        let measure = TextMeasure::new(&f.registry, &f.family.regular);
        let rows: Vec<Row> = (0..60).map(|i| row(&format!("q-{i}"), "Consult")).collect();
        let metrics = measure_table(&rows, &f.state, &f.config, &measure);
        let mut canvas = Canvas::new(Size::a4());
        let mut renderer =
            TableRenderer::new(&f.config, &f.state, &f.registry, &f.family, Pt::from_mm(10.0));
        let mut current = frame(120.0);
        let mut next_page = |canvas: &mut Canvas| {
            canvas.show_page();
            frame(200.0)
        };
        let placement = draw_table(
            &mut renderer,
            &mut canvas,
            &mut current,
            &rows,
            &metrics,
            "Total (Incl. VAT): R6000.00",
            OverflowPolicy::Paginate,
            &mut next_page,
        )
        .unwrap();
        assert_eq!(placement.rows_drawn(), 60);
        assert!(!placement.overflowed);
        assert!(placement.rows_per_page.len() >= 2);
        assert_eq!(renderer.phase(), TablePhase::TotalsDrawn);
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), placement.rows_per_page.len());
        for page in &doc.pages {
            assert!(page.texts().any(|t| t == "Unit Price"));
        }
        let qty_cells: usize = doc
            .pages
            .iter()
            .map(|p| p.texts().filter(|t| t.starts_with("q-")).count())
            .sum();
        assert_eq!(qty_cells, 60);
    }

    #[test]
    fn overflow_policy_stays_on_one_page() {
        let f = fixture();
        let measure = TextMeasure::new(&f.registry, &f.family.regular);
        let rows: Vec<Row> = (0..60).map(|i| row(&format!("q-{i}"), "Consult")).collect();
        let metrics = measure_table(&rows, &f.state, &f.config, &measure);
        let mut canvas = Canvas::new(Size::a4());
        let mut renderer =
            TableRenderer::new(&f.config, &f.state, &f.registry, &f.family, Pt::from_mm(10.0));
        let mut current = frame(120.0);
        let mut next_page = |_: &mut Canvas| -> Frame { unreachable!("no page breaks") };
        let placement = draw_table(
            &mut renderer,
            &mut canvas,
            &mut current,
            &rows,
            &metrics,
            "Total",
            OverflowPolicy::Overflow,
            &mut next_page,
        )
        .unwrap();
        assert_eq!(placement.rows_per_page, vec![60]);
        assert!(placement.overflowed);
        assert_eq!(canvas.finish().pages.len(), 1);
    }

    #[test]
    fn empty_table_has_header_and_totals_only() {
        let f = fixture();
        let measure = TextMeasure::new(&f.registry, &f.family.regular);
        let metrics = measure_table(&[], &f.state, &f.config, &measure);
        let mut canvas = Canvas::new(Size::a4());
        let mut renderer =
            TableRenderer::new(&f.config, &f.state, &f.registry, &f.family, Pt::from_mm(10.0));
        let mut current = frame(120.0);
        let mut next_page = |_: &mut Canvas| -> Frame { unreachable!("no page breaks") };
        let summary = "Excl. VAT: R0.00   |   VAT @15%: R0.00   |   Total (Incl. VAT): R0.00";
        let placement = draw_table(
            &mut renderer,
            &mut canvas,
            &mut current,
            &[],
            &metrics,
            summary,
            OverflowPolicy::Paginate,
            &mut next_page,
        )
        .unwrap();
        assert_eq!(placement.rows_drawn(), 0);
        let doc = canvas.finish();
        let texts: Vec<&str> = doc.pages[0].texts().collect();
        assert_eq!(texts.len(), HEADERS.len() + 1);
        assert_eq!(texts.last(), Some(&summary));
    }
}
