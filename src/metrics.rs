use crate::canvas::{Command, Document};
use crate::pdf::PdfOutput;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub text_count: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RenderMetrics {
    pub pages: Vec<PageMetrics>,
    /// Fit loop plus composition, in milliseconds.
    pub layout_ms: f64,
    /// Layout plus PDF serialization; zero until a PDF is written.
    pub total_render_ms: f64,
    pub total_bytes: usize,
    pub fit_iterations: u32,
}

impl RenderMetrics {
    pub(crate) fn from_document(document: &Document, fit_iterations: u32, layout_ms: f64) -> Self {
        let pages = document
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageMetrics {
                page_number: index + 1,
                command_count: page
                    .commands
                    .iter()
                    .filter(|command| !matches!(command, Command::Meta { .. }))
                    .count(),
                text_count: page.texts().count(),
                content_bytes: 0,
            })
            .collect();
        Self {
            pages,
            layout_ms,
            total_render_ms: layout_ms,
            total_bytes: 0,
            fit_iterations,
        }
    }

    pub(crate) fn record_pdf(&mut self, output: &PdfOutput, pdf_ms: f64) {
        for (page, bytes) in self.pages.iter_mut().zip(&output.page_content_bytes) {
            page.content_bytes = *bytes;
        }
        self.total_bytes = output.bytes.len();
        self.total_render_ms = self.layout_ms + pdf_ms;
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
