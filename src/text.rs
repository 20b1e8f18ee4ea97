//! Word wrapping and single-line font fitting on top of [`FontRegistry`].

use crate::font::FontRegistry;
use crate::types::Pt;

/// Horizontal inset on each side of a cell, in mm.
pub const CELL_PADDING_MM: f32 = 0.8;
/// Extra height added once per wrapped block, in mm.
pub const WRAP_PADDING_MM: f32 = 0.8;
const MIN_TEXT_WIDTH_MM: f32 = 0.1;

pub fn cell_padding() -> Pt {
    Pt::from_mm(CELL_PADDING_MM)
}

/// Measurement bound to one font.
#[derive(Clone, Copy)]
pub struct TextMeasure<'a> {
    registry: &'a FontRegistry,
    font: &'a str,
}

impl<'a> TextMeasure<'a> {
    pub fn new(registry: &'a FontRegistry, font: &'a str) -> Self {
        Self { registry, font }
    }

    pub fn font(&self) -> &'a str {
        self.font
    }

    pub fn measure_width(&self, text: &str, font_size: Pt) -> Pt {
        self.registry.measure_text_width(self.font, font_size, text)
    }

    /// Greedy word wrap into `column_width` minus cell padding.
    ///
    /// A word wider than the line starts a fresh line and is packed character
    /// by character; the last fragment stays open for the following words.
    /// Empty text yields no lines.
    pub fn wrap_lines(&self, text: &str, column_width: Pt, font_size: Pt) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let max_width = text_width_for(column_width);
        let fits = |candidate: &str| self.measure_width(candidate, font_size) <= max_width;

        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if !fits(word) {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                for ch in word.chars() {
                    let mut candidate = current.clone();
                    candidate.push(ch);
                    if current.is_empty() || fits(&candidate) {
                        current = candidate;
                    } else {
                        lines.push(std::mem::replace(&mut current, ch.to_string()));
                    }
                }
                continue;
            }
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fits(&candidate) {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// `line_count × line_height + padding`; empty text is a single bare line.
    pub fn wrapped_height(
        &self,
        text: &str,
        column_width: Pt,
        line_height: Pt,
        font_size: Pt,
    ) -> Pt {
        if text.is_empty() {
            return line_height;
        }
        let count = self.wrap_lines(text, column_width, font_size).len();
        line_height * (count as i32) + Pt::from_mm(WRAP_PADDING_MM)
    }

    /// Shrinks `base` proportionally until `text` fits on one line, never
    /// below `min_font`.
    pub fn fitted_font_size(
        &self,
        text: &str,
        base: Pt,
        available_width: Pt,
        min_font: Pt,
    ) -> Pt {
        if text.is_empty() {
            return base;
        }
        let avail = text_width_for(available_width);
        let width = self.measure_width(text, base);
        if width <= avail {
            return base;
        }
        base.scale_by(avail, width).max(min_font)
    }
}

fn text_width_for(column_width: Pt) -> Pt {
    (column_width - cell_padding() * 2).max(Pt::from_mm(MIN_TEXT_WIDTH_MM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::HELVETICA;

    fn measure(registry: &FontRegistry) -> TextMeasure<'_> {
        TextMeasure::new(registry, HELVETICA)
    }

    const DESCRIPTION: &str = "M54.5 - Low back pain, unspecified, with radiating symptoms to the lower limb";

    #[test]
    fn short_text_is_one_line() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let lines = m.wrap_lines("Consult", Pt::from_mm(30.0), Pt::from_f32(8.2));
        assert_eq!(lines, vec!["Consult".to_string()]);
        let h = m.wrapped_height("Consult", Pt::from_mm(30.0), Pt::from_mm(4.4), Pt::from_f32(8.2));
        assert_eq!(h, Pt::from_mm(4.4) + Pt::from_mm(WRAP_PADDING_MM));
    }

    #[test]
    fn empty_text_is_bare_line_height() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let lh = Pt::from_mm(4.4);
        assert_eq!(m.wrapped_height("", Pt::from_mm(30.0), lh, Pt::from_f32(8.2)), lh);
        assert!(m.wrap_lines("", Pt::from_mm(30.0), Pt::from_f32(8.2)).is_empty());
    }

    #[test]
    fn words_wrap_within_padded_width() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let width = Pt::from_mm(30.0);
        let size = Pt::from_f32(8.2);
        let lines = m.wrap_lines(DESCRIPTION, width, size);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(m.measure_width(line, size) <= width - cell_padding() * 2, "{line}");
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, DESCRIPTION.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn long_token_is_packed_by_character() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let token = "X".repeat(120);
        let width = Pt::from_mm(20.0);
        let size = Pt::from_f32(8.0);
        let lines = m.wrap_lines(&token, width, size);
        assert!(lines.len() > 3);
        for line in &lines {
            assert!(m.measure_width(line, size) <= width - cell_padding() * 2);
        }
        assert_eq!(lines.concat(), token);
    }

    #[test]
    fn token_following_words_starts_fresh_line() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let text = format!("ab {}", "9".repeat(60));
        let lines = m.wrap_lines(&text, Pt::from_mm(20.0), Pt::from_f32(8.0));
        assert_eq!(lines[0], "ab");
    }

    #[test]
    fn single_glyph_wider_than_column_still_advances() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let lines = m.wrap_lines("WWW", Pt::from_mm(1.0), Pt::from_f32(12.0));
        assert_eq!(lines, vec!["W", "W", "W"]);
    }

    #[test]
    fn height_never_decreases_as_width_shrinks() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let texts = [
            DESCRIPTION,
            "Follow-up consultation",
            "J06.9 - Acute upper respiratory infection, unspecified",
            "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789ABCDEFGHIJ short words after",
            "a b c d e f g h i j k l m n o p",
        ];
        let size = Pt::from_f32(8.2);
        let lh = Pt::from_mm(4.4);
        for text in texts {
            let mut previous = Pt::ZERO;
            for tenth_mm in (20..=800).rev() {
                let width = Pt::from_mm(tenth_mm as f32 / 10.0);
                let height = m.wrapped_height(text, width, lh, size);
                assert!(height >= previous, "{text} at {tenth_mm}");
                previous = height;
            }
        }
    }

    #[test]
    fn fitted_font_shrinks_proportionally_with_floor() {
        let registry = FontRegistry::new();
        let m = measure(&registry);
        let base = Pt::from_f32(8.2);
        let min = Pt::from_f32(6.0);
        assert_eq!(m.fitted_font_size("12", base, Pt::from_mm(20.0), min), base);
        assert_eq!(m.fitted_font_size("", base, Pt::from_mm(1.0), min), base);

        let text = "R12345.00";
        let width = m.measure_width(text, base);
        let column = width * 9 / 10 + cell_padding() * 2;
        let fitted = m.fitted_font_size(text, base, column, min);
        assert!(fitted < base && fitted > min);
        assert!(m.measure_width(text, fitted) <= column - cell_padding() * 2 + Pt::from_f32(0.01));

        assert_eq!(m.fitted_font_size(text, base, Pt::from_mm(3.0), min), min);
    }
}
