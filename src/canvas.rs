use crate::layout::CellAlign;
use crate::types::{Color, Pt, Size};

/// Drawing commands in top-left page space. The PDF writer flips y.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Non-rendered metadata used for page-aware reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    /// Stroked rectangle.
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawLine {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
    },
    /// One line of text vertically centered in the box, aligned horizontally
    /// inside the cell padding.
    DrawText {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        text: String,
        align: CellAlign,
    },
    /// Pre-wrapped lines stacked from `y` at `line_height` intervals.
    DrawWrappedText {
        x: Pt,
        y: Pt,
        width: Pt,
        line_height: Pt,
        lines: Vec<String>,
        align: CellAlign,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.commands.iter().find_map(|command| match command {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().flat_map(|command| {
            let lines: Vec<&str> = match command {
                Command::DrawText { text, .. } => vec![text.as_str()],
                Command::DrawWrappedText { lines, .. } => {
                    lines.iter().map(String::as_str).collect()
                }
                _ => Vec::new(),
            };
            lines
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: crate::font::HELVETICA.to_string(),
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            current_state: GraphicsState::initial(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    /// 1-based number of the page being drawn.
    pub fn page_number(&self) -> usize {
        self.pages.len() + 1
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.current
            .commands
            .push(Command::SetFontName(self.current_state.font_name.clone()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn set_font(&mut self, name: &str, size: Pt) {
        self.set_font_name(name);
        self.set_font_size(size);
    }

    pub fn font_name(&self) -> &str {
        &self.current_state.font_name
    }

    pub fn font_size(&self) -> Pt {
        self.current_state.font_size
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.current
            .commands
            .push(Command::DrawLine { x1, y1, x2, y2 });
    }

    pub fn draw_text(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        text: impl Into<String>,
        align: CellAlign,
    ) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current.commands.push(Command::DrawText {
            x,
            y,
            width,
            height,
            text,
            align,
        });
    }

    pub fn draw_wrapped_text(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        line_height: Pt,
        lines: Vec<String>,
        align: CellAlign,
    ) {
        if lines.iter().all(String::is_empty) {
            return;
        }
        self.current.commands.push(Command::DrawWrappedText {
            x,
            y,
            width,
            line_height,
            lines,
            align,
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.current_state = GraphicsState::initial();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_dropped() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font("Helvetica", Pt::from_f32(12.0));
        assert!(canvas.is_current_empty());
        canvas.set_font("Helvetica-Bold", Pt::from_f32(8.2));
        canvas.set_font("Helvetica-Bold", Pt::from_f32(8.2));
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.set_line_width(Pt::from_f32(0.5));
        assert_eq!(canvas.current_command_count(), 3);
    }

    #[test]
    fn show_page_resets_state_and_counts_pages() {
        let mut canvas = Canvas::new(Size::a4());
        assert_eq!(canvas.page_number(), 1);
        canvas.set_font_size(Pt::from_f32(9.0));
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_i32(10), Pt::from_i32(10));
        canvas.show_page();
        assert_eq!(canvas.page_number(), 2);
        canvas.set_font_size(Pt::from_f32(9.0));
        assert_eq!(canvas.current_command_count(), 1);
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
    }

    #[test]
    fn empty_text_draws_nothing() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_text(Pt::ZERO, Pt::ZERO, Pt::from_i32(20), Pt::from_i32(10), "", CellAlign::Left);
        canvas.draw_wrapped_text(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_i32(20),
            Pt::from_i32(10),
            Vec::new(),
            CellAlign::Left,
        );
        assert!(canvas.is_current_empty());
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn page_texts_include_wrapped_lines() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.meta("section", "table");
        canvas.draw_text(Pt::ZERO, Pt::ZERO, Pt::from_i32(20), Pt::from_i32(10), "Qty", CellAlign::Center);
        canvas.draw_wrapped_text(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_i32(20),
            Pt::from_i32(10),
            vec!["low back".into(), "pain".into()],
            CellAlign::Left,
        );
        let doc = canvas.finish();
        let page = &doc.pages[0];
        assert_eq!(page.texts().collect::<Vec<_>>(), vec!["Qty", "low back", "pain"]);
        assert_eq!(page.meta("section"), Some("table"));
        assert_eq!(page.meta("missing"), None);
    }
}
