use crate::canvas::Canvas;
use crate::font::{FontFamily, FontRegistry, FontStyle};
use crate::frame::Frame;
use crate::layout::CellAlign;
use crate::model::Density;
use crate::text::TextMeasure;
use crate::types::{Margins, Pt, Rect, Size};

/// Centered practice lines at the top of every page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Letterhead {
    pub title_lines: Vec<String>,
    pub detail_lines: Vec<String>,
}

impl Letterhead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Practitioner name, qualifications.
    pub fn title_line(mut self, text: impl Into<String>) -> Self {
        self.title_lines.push(text.into());
        self
    }

    /// Address, phone, email. Long lines wrap.
    pub fn detail_line(mut self, text: impl Into<String>) -> Self {
        self.detail_lines.push(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title_lines.is_empty() && self.detail_lines.is_empty()
    }
}

/// Italic payment terms followed by `Page N`.
#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    pub lines: Vec<String>,
    pub page_numbers: bool,
}

impl Default for Footer {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            page_numbers: true,
        }
    }
}

impl Footer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn without_page_numbers(mut self) -> Self {
        self.page_numbers = false;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct LineStyle {
    style: FontStyle,
    size: Pt,
    line_height: Pt,
}

#[derive(Debug, Clone, Copy)]
struct TemplateStyle {
    spacer: Pt,
    title: LineStyle,
    detail: LineStyle,
    gap_after: Pt,
    terms: LineStyle,
    page_label: LineStyle,
}

impl TemplateStyle {
    fn for_density(density: Density) -> Self {
        let compact = density.is_compact();
        let pick = |normal: f32, compact_value: f32| if compact { compact_value } else { normal };
        let line = |style, size: f32, height_mm: f32| LineStyle {
            style,
            size: Pt::from_f32(size),
            line_height: Pt::from_mm(height_mm),
        };
        Self {
            spacer: Pt::from_mm(pick(4.0, 3.0)),
            title: line(FontStyle::Regular, pick(9.4, 8.2), pick(5.0, 4.2)),
            detail: line(FontStyle::Regular, pick(8.8, 7.8), pick(4.6, 3.8)),
            gap_after: Pt::from_mm(pick(1.0, 0.5)),
            terms: line(FontStyle::Italic, pick(7.8, 7.3), pick(4.2, 3.8)),
            page_label: line(FontStyle::Italic, pick(7.8, 7.3), pick(6.0, 5.0)),
        }
    }
}

/// A resolved, already wrapped line of template text.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLine {
    pub text: String,
    pub font: String,
    pub size: Pt,
    pub height: Pt,
}

#[derive(Clone)]
pub struct PageTemplate {
    pub name: String,
    pub page_size: Size,
    pub density: Density,
    letterhead: Option<Letterhead>,
    footer: Option<Footer>,
}

impl PageTemplate {
    pub fn new(name: impl Into<String>, page_size: Size, density: Density) -> Self {
        Self {
            name: name.into(),
            page_size,
            density,
            letterhead: None,
            footer: None,
        }
    }

    pub fn with_letterhead(mut self, letterhead: Letterhead) -> Self {
        self.letterhead = (!letterhead.is_empty()).then_some(letterhead);
        self
    }

    pub fn with_footer(mut self, footer: Footer) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn letterhead(&self) -> Option<&Letterhead> {
        self.letterhead.as_ref()
    }

    pub fn footer(&self) -> Option<&Footer> {
        self.footer.as_ref()
    }

    /// Wraps template text at `width`. Wider pages only ever need fewer lines.
    pub fn layout(&self, registry: &FontRegistry, family: &FontFamily, width: Pt) -> TemplateLayout {
        let style = TemplateStyle::for_density(self.density);
        let mut header = Vec::new();
        let mut header_height = Pt::ZERO;
        let mut spacer = Pt::ZERO;
        if let Some(letterhead) = &self.letterhead {
            spacer = style.spacer;
            for text in &letterhead.title_lines {
                push_wrapped(&mut header, registry, family, style.title, text, width);
            }
            for text in &letterhead.detail_lines {
                push_wrapped(&mut header, registry, family, style.detail, text, width);
            }
            header_height =
                spacer + header.iter().map(|line| line.height).sum::<Pt>() + style.gap_after;
        }

        let mut footer = Vec::new();
        let mut page_label = None;
        if let Some(config) = &self.footer {
            for text in &config.lines {
                push_wrapped(&mut footer, registry, family, style.terms, text, width);
            }
            if config.page_numbers {
                page_label = Some(TemplateLine {
                    text: String::new(),
                    font: family.name(style.page_label.style).to_string(),
                    size: style.page_label.size,
                    height: style.page_label.line_height,
                });
            }
        }
        TemplateLayout {
            header,
            header_height,
            spacer,
            footer,
            page_label,
        }
    }

    /// Content frame below the letterhead for the given margins.
    pub fn content_frame(&self, margins: &Margins, layout: &TemplateLayout) -> Frame {
        let top = margins.top + layout.header_height;
        let bottom = self.page_size.height - margins.bottom - layout.footer_height();
        Frame::new(Rect {
            x: margins.left,
            y: top,
            width: (self.page_size.width - margins.left - margins.right).max(Pt::ZERO),
            height: (bottom - top).max(Pt::ZERO),
        })
    }
}

fn push_wrapped(
    out: &mut Vec<TemplateLine>,
    registry: &FontRegistry,
    family: &FontFamily,
    style: LineStyle,
    text: &str,
    width: Pt,
) {
    let font = family.name(style.style);
    let measure = TextMeasure::new(registry, font);
    for line in measure.wrap_lines(text, width, style.size) {
        out.push(TemplateLine {
            text: line,
            font: font.to_string(),
            size: style.size,
            height: style.line_height,
        });
    }
}

/// Template text wrapped for one page width.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLayout {
    pub header: Vec<TemplateLine>,
    pub header_height: Pt,
    spacer: Pt,
    pub footer: Vec<TemplateLine>,
    page_label: Option<TemplateLine>,
}

impl TemplateLayout {
    /// Band kept free above the bottom margin.
    pub fn footer_height(&self) -> Pt {
        let terms: Pt = self.footer.iter().map(|line| line.height).sum();
        terms + self.page_label.as_ref().map_or(Pt::ZERO, |line| line.height)
    }

    pub fn draw_header(&self, canvas: &mut Canvas, margins: &Margins) {
        let width = canvas.page_size().width - margins.left - margins.right;
        let mut y = margins.top + self.spacer;
        for line in &self.header {
            draw_centered(canvas, line, &line.text, margins.left, y, width);
            y += line.height;
        }
    }

    pub fn draw_footer(&self, canvas: &mut Canvas, margins: &Margins, page_number: usize) {
        let size = canvas.page_size();
        let width = size.width - margins.left - margins.right;
        let mut y = size.height - margins.bottom - self.footer_height();
        for line in &self.footer {
            draw_centered(canvas, line, &line.text, margins.left, y, width);
            y += line.height;
        }
        if let Some(label) = &self.page_label {
            draw_centered(canvas, label, &format!("Page {page_number}"), margins.left, y, width);
        }
    }
}

fn draw_centered(canvas: &mut Canvas, line: &TemplateLine, text: &str, x: Pt, y: Pt, width: Pt) {
    canvas.set_font(&line.font, line.size);
    canvas.draw_text(x, y, width, line.height, text, CellAlign::Center);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;

    fn template(density: Density) -> PageTemplate {
        PageTemplate::new("invoice", Size::a4(), density)
            .with_letterhead(
                Letterhead::new()
                    .title_line("Dr A Practitioner - Sport & Lifestyle Medicine")
                    .title_line("MBChB, Practice No: 0000000")
                    .detail_line("Address: 1 Main Road, Worcester, 6850")
                    .detail_line("Phone: 000 000 0000 | Email: rooms@example.org"),
            )
            .with_footer(
                Footer::new()
                    .line("Payment Terms: Due on receipt.")
                    .line("Bank: Example | Acc: 000000 | Ref: Patient Name"),
            )
    }

    #[test]
    fn layout_heights_follow_density() {
        let registry = FontRegistry::new();
        let family = FontFamily::default();
        let width = Pt::from_mm(190.0);
        let normal = template(Density::Normal).layout(&registry, &family, width);
        let compact = template(Density::Compact).layout(&registry, &family, width);
        assert_eq!(normal.header.len(), 4);
        assert!(compact.header_height < normal.header_height);
        assert_eq!(
            normal.footer_height(),
            Pt::from_mm(4.2) * 2 + Pt::from_mm(6.0)
        );
        assert!(compact.footer_height() < normal.footer_height());
    }

    #[test]
    fn narrow_width_wraps_detail_lines() {
        let registry = FontRegistry::new();
        let family = FontFamily::default();
        let wide = template(Density::Normal).layout(&registry, &family, Pt::from_mm(190.0));
        let narrow = template(Density::Normal).layout(&registry, &family, Pt::from_mm(40.0));
        assert!(narrow.header.len() > wide.header.len());
        assert!(narrow.header_height > wide.header_height);
    }

    #[test]
    fn empty_template_reserves_nothing() {
        let registry = FontRegistry::new();
        let tpl = PageTemplate::new("plain", Size::a4(), Density::Normal)
            .with_letterhead(Letterhead::new());
        assert!(tpl.letterhead().is_none());
        let layout = tpl.layout(&registry, &FontFamily::default(), Pt::from_mm(190.0));
        assert_eq!(layout.header_height, Pt::ZERO);
        assert_eq!(layout.footer_height(), Pt::ZERO);
        let frame = tpl.content_frame(&Margins::all_mm(10.0), &layout);
        assert_eq!(frame.y(), Pt::from_mm(10.0));
    }

    #[test]
    fn footer_draws_terms_and_page_number() {
        let registry = FontRegistry::new();
        let family = FontFamily::default();
        let tpl = template(Density::Normal);
        let layout = tpl.layout(&registry, &family, Pt::from_mm(190.0));
        let margins = Margins::all_mm(10.0);
        let mut canvas = Canvas::new(Size::a4());
        layout.draw_header(&mut canvas, &margins);
        layout.draw_footer(&mut canvas, &margins, 3);
        let doc = canvas.finish();
        let texts: Vec<&str> = doc.pages[0].texts().collect();
        assert_eq!(texts.first(), Some(&"Dr A Practitioner - Sport & Lifestyle Medicine"));
        assert_eq!(texts.last(), Some(&"Page 3"));
        let italic = doc.pages[0]
            .commands
            .iter()
            .any(|c| matches!(c, Command::SetFontName(name) if name == "Helvetica-Oblique"));
        assert!(italic);
        let frame = tpl.content_frame(&margins, &layout);
        assert_eq!(
            frame.bottom(),
            Size::a4().height - Pt::from_mm(10.0) - layout.footer_height()
        );
    }
}
