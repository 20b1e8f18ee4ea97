//! Table and page configuration with the reference presets.

use crate::error::InvoiceError;
use crate::model::{COLUMN_COUNT, Density, Orientation};
use crate::types::{Margins, Pt, Size};

pub const NAPPI_COLUMN: usize = 5;
pub const UNIT_PRICE_COLUMN: usize = 7;
pub const TOTAL_COLUMN: usize = 8;

pub const DEFAULT_MIN_FONT: f32 = 6.2;
pub const MIN_FONT_LOWER_BOUND: f32 = 5.0;
pub const MIN_FONT_UPPER_BOUND: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAlign {
    Left,
    Center,
    Right,
}

/// A column that must stay wide enough for its widest sample text.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedColumn {
    pub index: usize,
    pub samples: Vec<String>,
}

impl ProtectedColumn {
    pub fn new<I, S>(index: usize, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            samples: samples.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableLayoutConfig {
    pub orientation: Orientation,
    pub density: Density,
    pub base_font_size: Pt,
    pub min_font_size: Pt,
    pub font_step: Pt,
    /// Floor for per-cell fitted fonts in single-line columns.
    pub min_cell_font_size: Pt,
    pub header_height: Pt,
    pub row_height: Pt,
    pub min_row_height: Pt,
    pub row_height_step: Pt,
    pub margin_floor: Pt,
    pub margin_step: Pt,
    /// Column weights in thousandths.
    pub weights: [u32; COLUMN_COUNT],
    pub wrap_columns: Vec<usize>,
    pub alignments: [CellAlign; COLUMN_COUNT],
    pub protected: Vec<ProtectedColumn>,
    /// Donor columns in the order they give up width.
    pub donors: Vec<usize>,
    pub donor_floor: Pt,
    pub protect_padding: Pt,
    /// Added to every wrapped cell so the last line never touches the border.
    pub wrap_safety: Pt,
    pub totals_gap: Pt,
    pub totals_height: Pt,
    /// Totals font relative to the fitted table font.
    pub totals_font_delta: Pt,
}

impl TableLayoutConfig {
    pub fn preset(orientation: Orientation, density: Density) -> Self {
        let compact = density.is_compact();
        let pick = |normal: f32, compact_value: f32| if compact { compact_value } else { normal };
        let (weights, base_font, header_h, row_h, totals_gap, totals_h, totals_delta) =
            match orientation {
                Orientation::Portrait => (
                    [1.1, 1.8, 3.4, 3.4, 0.8, 1.2, 0.8, 1.2, 1.3],
                    pick(8.2, 7.8),
                    pick(5.6, 5.2),
                    pick(4.4, 4.0),
                    0.6,
                    pick(5.6, 5.2),
                    -0.1,
                ),
                Orientation::Landscape => (
                    [0.9, 1.8, 3.8, 3.8, 0.7, 1.3, 0.6, 1.1, 1.0],
                    pick(8.6, 8.0),
                    pick(7.0, 6.0),
                    pick(5.4, 4.8),
                    pick(1.0, 0.5),
                    pick(7.0, 6.0),
                    pick(0.7, 0.5),
                ),
            };
        Self {
            orientation,
            density,
            base_font_size: Pt::from_f32(base_font),
            min_font_size: Pt::from_f32(DEFAULT_MIN_FONT),
            font_step: Pt::from_f32(0.2),
            min_cell_font_size: Pt::from_f32(6.0),
            header_height: Pt::from_mm(header_h),
            row_height: Pt::from_mm(row_h),
            min_row_height: Pt::from_mm(3.2),
            row_height_step: Pt::from_mm(0.08),
            margin_floor: Pt::from_mm(6.0),
            margin_step: Pt::from_mm(1.0),
            weights: weights.map(|w: f32| (w * 1000.0).round() as u32),
            wrap_columns: vec![1, 2, 3],
            alignments: [
                CellAlign::Center,
                CellAlign::Left,
                CellAlign::Left,
                CellAlign::Left,
                CellAlign::Right,
                CellAlign::Center,
                CellAlign::Right,
                CellAlign::Right,
                CellAlign::Right,
            ],
            protected: vec![
                ProtectedColumn::new(NAPPI_COLUMN, ["0000000000"]),
                ProtectedColumn::new(UNIT_PRICE_COLUMN, ["R0000000.00", "0000000.00"]),
            ],
            donors: vec![2, 3, 1, 4],
            donor_floor: Pt::from_mm(14.0),
            protect_padding: Pt::from_mm(3.0),
            wrap_safety: Pt::from_mm(0.6),
            totals_gap: Pt::from_mm(totals_gap),
            totals_height: Pt::from_mm(totals_h),
            totals_font_delta: Pt::from_f32(totals_delta),
        }
    }

    /// Sets the font floor, clamped to 5..10pt. Non-finite input keeps the default.
    pub fn with_min_font(mut self, min_font: f32) -> Self {
        let value = if min_font.is_finite() {
            min_font.clamp(MIN_FONT_LOWER_BOUND, MIN_FONT_UPPER_BOUND)
        } else {
            DEFAULT_MIN_FONT
        };
        self.min_font_size = Pt::from_f32(value);
        self
    }

    /// Rejects steps that cannot move a knob and weights that leave no width to split.
    pub fn validate(&self) -> Result<(), InvoiceError> {
        let steps = [
            ("font_step", self.font_step),
            ("row_height_step", self.row_height_step),
            ("margin_step", self.margin_step),
        ];
        for (name, step) in steps {
            if step.to_milli_i64() <= 0 {
                return Err(InvoiceError::InvalidConfiguration(format!(
                    "{name} must be positive, got {:.3}pt",
                    step.to_f32()
                )));
            }
        }
        if self.weight_sum() == 0 {
            return Err(InvoiceError::InvalidConfiguration(
                "column weights sum to zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_wrap_column(&self, index: usize) -> bool {
        self.wrap_columns.contains(&index)
    }

    pub fn align(&self, index: usize) -> CellAlign {
        self.alignments
            .get(index)
            .copied()
            .unwrap_or(CellAlign::Center)
    }

    pub fn totals_font_size(&self, table_font: Pt) -> Pt {
        (table_font + self.totals_font_delta).max(self.min_cell_font_size)
    }

    pub fn weight_sum(&self) -> u32 {
        self.weights.iter().sum()
    }
}

/// Page size and margins. Only the fit loop narrows the margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub size: Size,
    pub margins: Margins,
}

impl PageGeometry {
    pub fn new(size: Size, margins: Margins) -> Self {
        Self { size, margins }
    }

    /// A4 in the given orientation with the reference margins for `density`.
    pub fn preset(orientation: Orientation, density: Density) -> Self {
        let size = match orientation {
            Orientation::Portrait => Size::a4().portrait(),
            Orientation::Landscape => Size::a4().landscape(),
        };
        let (side, bottom) = if density.is_compact() {
            (6.0, 8.0)
        } else {
            (10.0, 12.0)
        };
        Self {
            size,
            margins: Margins {
                top: Pt::from_mm(side),
                right: Pt::from_mm(side),
                bottom: Pt::from_mm(bottom),
                left: Pt::from_mm(side),
            },
        }
    }

    pub fn usable_width(&self) -> Pt {
        (self.size.width - self.margins.left - self.margins.right).max(Pt::ZERO)
    }

    pub fn usable_height(&self) -> Pt {
        (self.size.height - self.margins.top - self.margins.bottom).max(Pt::ZERO)
    }

    /// y coordinate where content must stop.
    pub fn content_bottom(&self) -> Pt {
        self.size.height - self.margins.bottom
    }

    pub fn content_right(&self) -> Pt {
        self.size.width - self.margins.right
    }
}
