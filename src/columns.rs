//! Weighted column allocation with protected minimum widths.

use crate::layout::{ProtectedColumn, TableLayoutConfig};
use crate::text::TextMeasure;
use crate::types::Pt;

/// Splits `usable_width` by weight, then raises protected columns to fit their
/// samples at `font_size`, taking width from donors down to `donor_floor`.
///
/// Pure: the same inputs always produce the same widths, and the result is
/// recomputed from scratch on every call.
pub fn allocate_column_widths(
    usable_width: Pt,
    config: &TableLayoutConfig,
    measure: &TextMeasure<'_>,
    font_size: Pt,
) -> Vec<Pt> {
    let mut widths = weighted_split(usable_width, &config.weights);
    for protected in &config.protected {
        let need = protected_minimum(protected, measure, font_size, config.protect_padding);
        protect_column(&mut widths, protected.index, need, config);
    }
    widths
}

/// Widest sample plus padding.
pub fn protected_minimum(
    protected: &ProtectedColumn,
    measure: &TextMeasure<'_>,
    font_size: Pt,
    padding: Pt,
) -> Pt {
    let widest = protected
        .samples
        .iter()
        .map(|sample| measure.measure_width(sample, font_size))
        .fold(Pt::ZERO, Pt::max);
    widest + padding
}

/// Left edge of every column starting at `left`.
pub fn column_offsets(left: Pt, widths: &[Pt]) -> Vec<Pt> {
    let mut x = left;
    widths
        .iter()
        .map(|width| {
            let start = x;
            x += *width;
            start
        })
        .collect()
}

fn weighted_split(usable_width: Pt, weights: &[u32]) -> Vec<Pt> {
    let total: u32 = weights.iter().sum();
    if weights.is_empty() {
        return Vec::new();
    }
    if total == 0 {
        let share = usable_width / weights.len() as i32;
        return vec![share; weights.len()];
    }
    let mut widths: Vec<Pt> = weights
        .iter()
        .map(|weight| usable_width.mul_ratio(*weight as i32, total as i32))
        .collect();
    // Rounding remainder goes to the last column so the sum is exact.
    let assigned: Pt = widths.iter().copied().sum();
    if let Some(last) = widths.last_mut() {
        *last = (*last + usable_width - assigned).max(Pt::ZERO);
    }
    widths
}

fn protect_column(widths: &mut [Pt], index: usize, need: Pt, config: &TableLayoutConfig) {
    let Some(current) = widths.get(index).copied() else {
        return;
    };
    if current >= need {
        return;
    }
    let mut deficit = need - current;
    for &donor in &config.donors {
        if deficit <= Pt::ZERO {
            break;
        }
        if donor == index || config.protected.iter().any(|p| p.index == donor) {
            continue;
        }
        let Some(width) = widths.get_mut(donor) else {
            continue;
        };
        let spare = (*width - config.donor_floor).max(Pt::ZERO);
        let take = spare.min(deficit);
        *width -= take;
        deficit -= take;
    }
    // Out of donors: the protected column wins and the table runs wide.
    widths[index] = need;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontRegistry, HELVETICA};
    use crate::layout::{NAPPI_COLUMN, UNIT_PRICE_COLUMN};
    use crate::model::{Density, Orientation};

    fn portrait() -> TableLayoutConfig {
        TableLayoutConfig::preset(Orientation::Portrait, Density::Normal)
    }

    #[test]
    fn wide_table_follows_weights_exactly() {
        let registry = FontRegistry::new();
        let m = TextMeasure::new(&registry, HELVETICA);
        let cfg = portrait();
        let usable = Pt::from_mm(190.0);
        let widths = allocate_column_widths(usable, &cfg, &m, Pt::from_f32(8.2));
        assert_eq!(widths.len(), 9);
        let sum: Pt = widths.iter().copied().sum();
        assert_eq!(sum, usable);
        assert_eq!(widths[2], widths[3]);
        assert!(widths[2] > widths[1] && widths[1] > widths[0]);
    }

    #[test]
    fn protected_columns_reach_their_minimum() {
        let registry = FontRegistry::new();
        let m = TextMeasure::new(&registry, HELVETICA);
        let cfg = portrait();
        let size = Pt::from_f32(8.2);
        for usable_mm in [90.0, 120.0, 150.0, 190.0, 277.0] {
            let widths = allocate_column_widths(Pt::from_mm(usable_mm), &cfg, &m, size);
            for protected in &cfg.protected {
                let need = protected_minimum(protected, &m, size, cfg.protect_padding);
                assert!(widths[protected.index] >= need, "{usable_mm}mm col {}", protected.index);
            }
        }
    }

    #[test]
    fn donors_give_in_order_and_respect_floor() {
        let registry = FontRegistry::new();
        let m = TextMeasure::new(&registry, HELVETICA);
        let cfg = portrait();
        let usable = Pt::from_mm(130.0);
        let size = Pt::from_f32(8.2);
        let plain = weighted_split(usable, &cfg.weights);
        let widths = allocate_column_widths(usable, &cfg, &m, size);
        assert!(widths[NAPPI_COLUMN] > plain[NAPPI_COLUMN]);
        assert!(widths[UNIT_PRICE_COLUMN] > plain[UNIT_PRICE_COLUMN]);
        assert!(widths[2] < plain[2]);
        // Column 1 is third in line and should not be touched while 2 and 3 have spare.
        assert_eq!(widths[1], plain[1]);
        for donor in &cfg.donors {
            if widths[*donor] < plain[*donor] {
                assert!(widths[*donor] >= cfg.donor_floor);
            }
        }
        let sum: Pt = widths.iter().copied().sum();
        assert_eq!(sum, usable);
    }

    #[test]
    fn protected_wins_when_donors_are_exhausted() {
        let registry = FontRegistry::new();
        let m = TextMeasure::new(&registry, HELVETICA);
        let cfg = portrait();
        let size = Pt::from_f32(8.2);
        let widths = allocate_column_widths(Pt::from_mm(40.0), &cfg, &m, size);
        let need = protected_minimum(&cfg.protected[0], &m, size, cfg.protect_padding);
        assert_eq!(widths[NAPPI_COLUMN], need);
    }

    #[test]
    fn allocation_is_idempotent() {
        let registry = FontRegistry::new();
        let m = TextMeasure::new(&registry, HELVETICA);
        let cfg = portrait();
        let a = allocate_column_widths(Pt::from_mm(130.0), &cfg, &m, Pt::from_f32(7.4));
        let b = allocate_column_widths(Pt::from_mm(130.0), &cfg, &m, Pt::from_f32(7.4));
        assert_eq!(a, b);
    }

    #[test]
    fn offsets_accumulate() {
        let widths = [Pt::from_i32(10), Pt::from_i32(20), Pt::from_i32(5)];
        let offsets = column_offsets(Pt::from_i32(3), &widths);
        assert_eq!(offsets, vec![Pt::from_i32(3), Pt::from_i32(13), Pt::from_i32(33)]);
    }
}
