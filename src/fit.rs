//! Auto-fit shrink loop: font, then row height, then margins.

use std::fmt;

use crate::columns::allocate_column_widths;
use crate::layout::TableLayoutConfig;
use crate::model::COLUMN_COUNT;
use crate::text::TextMeasure;
use crate::types::{Margins, Pt, Size};

pub type Row = [String; COLUMN_COUNT];

/// One point in the search space. Every step produces a new state.
#[derive(Debug, Clone, PartialEq)]
pub struct FitState {
    pub font_size: Pt,
    pub row_height: Pt,
    pub margins: Margins,
    pub column_widths: Vec<Pt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitAction {
    ShrinkFont,
    ShrinkRowHeight,
    ShrinkMargins,
}

impl FitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FitAction::ShrinkFont => "shrink_font",
            FitAction::ShrinkRowHeight => "shrink_row_height",
            FitAction::ShrinkMargins => "shrink_margins",
        }
    }
}

impl FitState {
    pub fn initial(
        config: &TableLayoutConfig,
        page: Size,
        margins: Margins,
        measure: &TextMeasure<'_>,
    ) -> Self {
        let font_size = config.base_font_size.max(config.min_font_size);
        let row_height = config.row_height.max(config.min_row_height);
        Self::with_widths(config, page, font_size, row_height, margins, measure)
    }

    fn with_widths(
        config: &TableLayoutConfig,
        page: Size,
        font_size: Pt,
        row_height: Pt,
        margins: Margins,
        measure: &TextMeasure<'_>,
    ) -> Self {
        let usable = usable_width(page, &margins);
        Self {
            font_size,
            row_height,
            margins,
            column_widths: allocate_column_widths(usable, config, measure, font_size),
        }
    }

    pub fn usable_width(&self, page: Size) -> Pt {
        usable_width(page, &self.margins)
    }

    /// Upper bound on shrink iterations from this state.
    pub fn iteration_bound(&self, config: &TableLayoutConfig) -> u32 {
        let font = self
            .font_size
            .steps_to(config.min_font_size, config.font_step);
        let row = self
            .row_height
            .steps_to(config.min_row_height, config.row_height_step);
        let margins = [self.margins.left, self.margins.right, self.margins.bottom]
            .into_iter()
            .map(|m| m.steps_to(config.margin_floor, config.margin_step))
            .max()
            .unwrap_or(0);
        font + row + margins
    }

    fn can_shrink_margins(&self, config: &TableLayoutConfig) -> bool {
        let floor = config.margin_floor;
        is_step(config.margin_step)
            && (self.margins.left > floor
                || self.margins.right > floor
                || self.margins.bottom > floor)
    }

    /// Next state in priority order, or `None` once every knob is at its floor.
    pub fn next(
        &self,
        config: &TableLayoutConfig,
        page: Size,
        measure: &TextMeasure<'_>,
    ) -> Option<(FitAction, FitState)> {
        if self.font_size > config.min_font_size && is_step(config.font_step) {
            let font = self
                .font_size
                .step_down(config.font_step, config.min_font_size);
            let state =
                Self::with_widths(config, page, font, self.row_height, self.margins, measure);
            return Some((FitAction::ShrinkFont, state));
        }
        if self.row_height > config.min_row_height && is_step(config.row_height_step) {
            let row = self
                .row_height
                .step_down(config.row_height_step, config.min_row_height);
            let state = FitState {
                row_height: row,
                ..self.clone()
            };
            return Some((FitAction::ShrinkRowHeight, state));
        }
        if self.can_shrink_margins(config) {
            let (step, floor) = (config.margin_step, config.margin_floor);
            let margins = Margins {
                top: self.margins.top,
                right: self.margins.right.step_down(step, floor),
                bottom: self.margins.bottom.step_down(step, floor),
                left: self.margins.left.step_down(step, floor),
            };
            let state = Self::with_widths(
                config,
                page,
                self.font_size,
                self.row_height,
                margins,
                measure,
            );
            return Some((FitAction::ShrinkMargins, state));
        }
        None
    }
}

/// A knob whose step rounds to zero milli-points is treated as already at its floor.
fn is_step(step: Pt) -> bool {
    step.to_milli_i64() > 0
}

fn usable_width(page: Size, margins: &Margins) -> Pt {
    (page.width - margins.left - margins.right).max(Pt::ZERO)
}

/// Heights of every part of the table for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetrics {
    pub header_height: Pt,
    pub row_heights: Vec<Pt>,
    /// Gap above the totals line plus the line itself.
    pub totals_height: Pt,
}

impl TableMetrics {
    pub fn total(&self) -> Pt {
        self.header_height + self.row_heights.iter().copied().sum::<Pt>() + self.totals_height
    }
}

/// Height of one row: the tallest wrapped cell plus safety, never below the base row.
pub fn row_height(
    row: &Row,
    state: &FitState,
    config: &TableLayoutConfig,
    measure: &TextMeasure<'_>,
) -> Pt {
    let mut height = state.row_height;
    for &index in &config.wrap_columns {
        let (Some(text), Some(width)) = (row.get(index), state.column_widths.get(index)) else {
            continue;
        };
        let wrapped = measure.wrapped_height(text, *width, state.row_height, state.font_size)
            + config.wrap_safety;
        height = height.max(wrapped);
    }
    height
}

pub fn measure_table(
    rows: &[Row],
    state: &FitState,
    config: &TableLayoutConfig,
    measure: &TextMeasure<'_>,
) -> TableMetrics {
    TableMetrics {
        header_height: config.header_height,
        row_heights: rows
            .iter()
            .map(|row| row_height(row, state, config, measure))
            .collect(),
        totals_height: config.totals_gap + config.totals_height,
    }
}

/// Where the table sits on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest<'a> {
    pub rows: &'a [Row],
    pub page: Size,
    pub margins: Margins,
    /// Cursor y where the table header starts.
    pub content_top: Pt,
    /// Footer band kept free above the bottom margin.
    pub reserved_bottom: Pt,
}

impl FitRequest<'_> {
    pub fn available_height(&self, margins: &Margins) -> Pt {
        (self.page.height - margins.bottom - self.reserved_bottom - self.content_top)
            .max(Pt::ZERO)
    }
}

/// One shrink iteration, kept for the debug log.
#[derive(Debug, Clone, PartialEq)]
pub struct FitStep {
    pub iteration: u32,
    pub action: FitAction,
    pub font_size: Pt,
    pub row_height: Pt,
    pub margins: Margins,
    pub table_height: Pt,
    pub available_height: Pt,
}

/// Every knob reached its floor and the table is still too tall.
#[derive(Debug, Clone, PartialEq)]
pub struct FitWarning {
    pub required_height: Pt,
    pub available_height: Pt,
    pub font_size: Pt,
    pub row_height: Pt,
    pub iterations: u32,
}

impl FitWarning {
    pub fn overflow(&self) -> Pt {
        (self.required_height - self.available_height).max(Pt::ZERO)
    }
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table needs {:.1}mm but {:.1}mm is available at font {:.1}pt, row {:.2}mm after {} iterations",
            self.required_height.to_mm(),
            self.available_height.to_mm(),
            self.font_size.to_f32(),
            self.row_height.to_mm(),
            self.iterations
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Fitted,
    Degraded(FitWarning),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub state: FitState,
    pub metrics: TableMetrics,
    pub available_height: Pt,
    pub outcome: FitOutcome,
    pub steps: Vec<FitStep>,
}

impl FitResult {
    pub fn iterations(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn warning(&self) -> Option<&FitWarning> {
        match &self.outcome {
            FitOutcome::Fitted => None,
            FitOutcome::Degraded(warning) => Some(warning),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.warning().is_some()
    }
}

/// Shrinks until the table fits between `content_top` and the bottom margin,
/// or returns the floor configuration with a warning.
pub fn fit_table(
    request: &FitRequest<'_>,
    config: &TableLayoutConfig,
    measure: &TextMeasure<'_>,
) -> FitResult {
    let mut state = FitState::initial(config, request.page, request.margins, measure);
    let bound = state.iteration_bound(config);
    let mut steps = Vec::new();
    loop {
        let metrics = measure_table(request.rows, &state, config, measure);
        let required = metrics.total();
        let available = request.available_height(&state.margins);
        if required <= available {
            return FitResult {
                state,
                metrics,
                available_height: available,
                outcome: FitOutcome::Fitted,
                steps,
            };
        }
        let next = if steps.len() < bound as usize {
            state.next(config, request.page, measure)
        } else {
            None
        };
        let Some((action, next)) = next else {
            let warning = FitWarning {
                required_height: required,
                available_height: available,
                font_size: state.font_size,
                row_height: state.row_height,
                iterations: steps.len() as u32,
            };
            return FitResult {
                state,
                metrics,
                available_height: available,
                outcome: FitOutcome::Degraded(warning),
                steps,
            };
        };
        let iteration = steps.len() as u32 + 1;
        tracing::trace!(
            iteration,
            action = action.as_str(),
            table_mm = required.to_mm(),
            available_mm = available.to_mm(),
            "table does not fit, shrinking"
        );
        steps.push(FitStep {
            iteration,
            action,
            font_size: next.font_size,
            row_height: next.row_height,
            margins: next.margins,
            table_height: required,
            available_height: available,
        });
        state = next;
    }
}
