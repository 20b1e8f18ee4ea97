mod canvas;
mod columns;
mod debug;
mod error;
mod fit;
mod font;
mod frame;
mod invoice;
mod layout;
mod metrics;
mod model;
mod money;
mod page_template;
mod pdf;
mod table;
mod text;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use columns::{allocate_column_widths, column_offsets, protected_minimum};
use debug::DebugLogger;
pub use error::InvoiceError;
pub use fit::{
    FitAction, FitOutcome, FitRequest, FitResult, FitState, FitStep, FitWarning, Row,
    TableMetrics, fit_table, measure_table, row_height,
};
pub use font::{
    FontFamily, FontRegistry, FontStyle, HELVETICA, HELVETICA_BOLD, HELVETICA_OBLIQUE,
};
pub use frame::{AddResult, Frame};
use invoice::{ComposeSettings, Composition, compose_invoice};
pub use invoice::{META_PAGE_TEMPLATE_KEY, PatientBlock};
pub use layout::{
    CellAlign, DEFAULT_MIN_FONT, PageGeometry, ProtectedColumn, TableLayoutConfig,
};
pub use metrics::{PageMetrics, RenderMetrics};
pub use model::{
    COLUMN_COUNT, Density, HEADERS, Invoice, LineItem, Orientation, PatientDetails,
    format_invoice_no, join_fields, normalize_long_number, parse_invoice_no,
};
pub use money::{
    Currency, DEFAULT_CURRENCY_PREFIX, MoneyField, ParseError, ParseErrorKind, Totals,
    checked_line_total, compute_tax, format_money, format_plain, line_total, parse_money,
    parse_tax_percent, round_half_up,
};
pub use page_template::{Footer, Letterhead, PageTemplate, TemplateLayout, TemplateLine};
use pdf::PdfOptions;
pub use table::{OverflowPolicy, TablePhase, TablePlacement, TableRenderer, draw_table};
pub use text::TextMeasure;
pub use types::{Color, Margins, Pt, Rect, Size};

use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_TEMPLATE_NAME: &str = "invoice";

/// Result of laying out one invoice.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub document: Document,
    pub page_count: usize,
    pub totals: Totals,
    pub font_size: Pt,
    pub row_height: Pt,
    pub margins: Margins,
    pub column_widths: Vec<Pt>,
    pub fit_iterations: u32,
    /// Most iterations the fit loop could have taken for this configuration.
    pub iteration_bound: u32,
    pub warning: Option<FitWarning>,
    pub rows_per_page: Vec<usize>,
    pub overflowed: bool,
    pub metrics: RenderMetrics,
    pub file_name: String,
}

impl RenderReport {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

#[derive(Clone)]
pub struct InvoiceRenderer {
    config: TableLayoutConfig,
    geometry: PageGeometry,
    template: PageTemplate,
    font_registry: Arc<FontRegistry>,
    family: FontFamily,
    currency: Currency,
    tax_rate: Decimal,
    overflow: OverflowPolicy,
    strict_fit: bool,
    pdf_options: PdfOptions,
    debug: Option<Arc<DebugLogger>>,
}

impl InvoiceRenderer {
    pub fn builder() -> InvoiceRendererBuilder {
        InvoiceRendererBuilder::new()
    }

    pub fn config(&self) -> &TableLayoutConfig {
        &self.config
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    /// Lays out `invoice` into draw commands without serializing a PDF.
    pub fn render(&self, invoice: &Invoice) -> Result<RenderReport, InvoiceError> {
        let report = self.layout(invoice);
        self.emit_debug_summary("render");
        report
    }

    fn layout(&self, invoice: &Invoice) -> Result<RenderReport, InvoiceError> {
        let started = Instant::now();
        let settings = ComposeSettings {
            config: &self.config,
            geometry: self.geometry,
            template: &self.template,
            registry: self.font_registry.as_ref(),
            family: &self.family,
            currency: &self.currency,
            tax_rate: self.tax_rate,
            overflow: self.overflow,
        };
        let composition = compose_invoice(invoice, &settings, self.debug.as_deref())?;
        let layout_ms = started.elapsed().as_secs_f64() * 1000.0;

        let warning = composition.fit.warning().cloned();
        if let Some(warning) = &warning {
            tracing::warn!(
                invoice = %invoice.number,
                rows = invoice.items.len(),
                overflow_mm = warning.overflow().to_mm(),
                "table does not fit at the floor configuration: {warning}"
            );
            if self.strict_fit {
                return Err(InvoiceError::DegradedFit(warning.clone()));
            }
        }

        let measure = TextMeasure::new(self.font_registry.as_ref(), &self.family.regular);
        let iteration_bound =
            FitState::initial(&self.config, self.geometry.size, self.geometry.margins, &measure)
                .iteration_bound(&self.config);
        let Composition {
            document,
            totals,
            fit,
            placement,
        } = composition;
        let metrics = RenderMetrics::from_document(&document, fit.iterations(), layout_ms);
        tracing::debug!(
            invoice = %invoice.number,
            rows = invoice.items.len(),
            pages = document.pages.len(),
            iterations = fit.iterations(),
            font_pt = fit.state.font_size.to_f32(),
            row_mm = fit.state.row_height.to_mm(),
            degraded = warning.is_some(),
            "invoice laid out"
        );

        Ok(RenderReport {
            page_count: document.pages.len(),
            document,
            totals,
            font_size: fit.state.font_size,
            row_height: fit.state.row_height,
            margins: fit.state.margins,
            column_widths: fit.state.column_widths,
            fit_iterations: fit.steps.len() as u32,
            iteration_bound,
            warning,
            rows_per_page: placement.rows_per_page,
            overflowed: placement.overflowed,
            metrics,
            file_name: invoice.default_file_name(),
        })
    }

    /// Lays out and serializes `invoice`.
    pub fn render_pdf(&self, invoice: &Invoice) -> Result<(Vec<u8>, RenderReport), InvoiceError> {
        let result = self.layout_pdf(invoice);
        self.emit_debug_summary("render_pdf");
        result
    }

    fn layout_pdf(&self, invoice: &Invoice) -> Result<(Vec<u8>, RenderReport), InvoiceError> {
        let mut report = self.layout(invoice)?;
        let started = Instant::now();
        let mut options = self.pdf_options.clone();
        if options.title.is_none() {
            options.title = Some(format!("Invoice {}", invoice.number.trim()));
        }
        let output = pdf::document_to_pdf(&report.document, self.font_registry.as_ref(), &options)?;
        report
            .metrics
            .record_pdf(&output, started.elapsed().as_secs_f64() * 1000.0);
        if let Some(logger) = self.debug.as_deref() {
            logger.increment("pdf.bytes", output.bytes.len() as u64);
            if output.replaced_chars > 0 {
                logger.increment("pdf.winansi.replaced", output.replaced_chars as u64);
            }
        }
        if output.replaced_chars > 0 {
            tracing::warn!(
                invoice = %invoice.number,
                replaced = output.replaced_chars,
                "characters outside WinAnsi were drawn as '?'"
            );
        }
        Ok((output.bytes, report))
    }

    pub fn render_to_file(
        &self,
        invoice: &Invoice,
        path: impl AsRef<Path>,
    ) -> Result<RenderReport, InvoiceError> {
        let (bytes, report) = self.render_pdf(invoice)?;
        std::fs::write(path, bytes)?;
        Ok(report)
    }
}

pub struct InvoiceRendererBuilder {
    orientation: Orientation,
    density: Density,
    min_portrait_font: f32,
    tax_rate: Decimal,
    tax_percent: Option<String>,
    currency_prefix: String,
    letterhead: Letterhead,
    footer: Footer,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, Option<String>)>,
    font_name: Option<String>,
    overflow: OverflowPolicy,
    strict_fit: bool,
    debug_path: Option<PathBuf>,
    page_size: Option<Size>,
    template_name: String,
    pdf_options: PdfOptions,
}

impl Default for InvoiceRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceRendererBuilder {
    pub fn new() -> Self {
        Self {
            orientation: Orientation::Portrait,
            density: Density::Normal,
            min_portrait_font: DEFAULT_MIN_FONT,
            tax_rate: Decimal::new(15, 2),
            tax_percent: None,
            currency_prefix: DEFAULT_CURRENCY_PREFIX.to_string(),
            letterhead: Letterhead::default(),
            footer: Footer::default(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            font_name: None,
            overflow: OverflowPolicy::default(),
            strict_fit: false,
            debug_path: None,
            page_size: None,
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            pdf_options: PdfOptions::default(),
        }
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn density(mut self, density: Density) -> Self {
        self.density = density;
        self
    }

    /// Font floor for the portrait table, clamped to 5..10pt. Landscape keeps the default.
    pub fn min_portrait_font(mut self, size: f32) -> Self {
        self.min_portrait_font = size;
        self
    }

    /// Tax rate as a fraction (`0.15`), 0 <= rate < 1.
    pub fn tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = rate;
        self.tax_percent = None;
        self
    }

    /// Tax rate as typed by a user (`"15"`, `"15%"`). Parsed at build time.
    pub fn tax_percent(mut self, text: impl Into<String>) -> Self {
        self.tax_percent = Some(text.into());
        self
    }

    pub fn currency_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.currency_prefix = prefix.into();
        self
    }

    pub fn letterhead(mut self, letterhead: Letterhead) -> Self {
        self.letterhead = letterhead;
        self
    }

    pub fn footer(mut self, footer: Footer) -> Self {
        self.footer = footer;
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>, source_name: Option<&str>) -> Self {
        self.font_bytes.push((data, source_name.map(str::to_string)));
        self
    }

    /// Draw every style with this registered font instead of the Helvetica family.
    pub fn font_name(mut self, name: impl Into<String>) -> Self {
        self.font_name = Some(name.into());
        self
    }

    pub fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Turn a degraded fit into `InvoiceError::DegradedFit` instead of a report warning.
    pub fn strict_fit(mut self, strict: bool) -> Self {
        self.strict_fit = strict;
        self
    }

    /// JSONL log of every shrink step plus a counters summary per render.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    /// Page size before orientation is applied. Defaults to A4.
    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = name.into();
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.pdf_options.title = Some(title.into());
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.pdf_options.compress = enabled;
        self
    }

    pub fn build(self) -> Result<InvoiceRenderer, InvoiceError> {
        let tax_rate = match self.tax_percent.as_deref() {
            Some(text) => parse_tax_percent(text)?,
            None => self.tax_rate,
        };
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(InvoiceError::InvalidConfiguration(format!(
                "tax rate must be in [0, 1), got {tax_rate}"
            )));
        }

        let mut registry = FontRegistry::new();
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, source) in self.font_bytes {
            registry.register_bytes(data, source.as_deref())?;
        }
        let family = match self.font_name {
            Some(name) if !registry.contains(&name) => {
                return Err(InvoiceError::InvalidConfiguration(format!(
                    "font {name} is not registered"
                )));
            }
            Some(name) => FontFamily::single(name),
            None => FontFamily::default(),
        };

        let mut config = TableLayoutConfig::preset(self.orientation, self.density);
        if self.orientation == Orientation::Portrait {
            config = config.with_min_font(self.min_portrait_font);
        }
        config.validate()?;
        let mut geometry = PageGeometry::preset(self.orientation, self.density);
        if let Some(size) = self.page_size {
            geometry.size = match self.orientation {
                Orientation::Portrait => size.portrait(),
                Orientation::Landscape => size.landscape(),
            };
        }
        if geometry.usable_width() <= Pt::ZERO || geometry.usable_height() <= Pt::ZERO {
            return Err(InvoiceError::InvalidConfiguration(
                "page size leaves no room inside the margins".to_string(),
            ));
        }
        let template = PageTemplate::new(self.template_name, geometry.size, self.density)
            .with_letterhead(self.letterhead)
            .with_footer(self.footer);

        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        tracing::debug!(
            orientation = ?self.orientation,
            density = ?self.density,
            min_font_pt = config.min_font_size.to_f32(),
            %tax_rate,
            "invoice renderer configured"
        );
        Ok(InvoiceRenderer {
            config,
            geometry,
            template,
            font_registry: Arc::new(registry),
            family,
            currency: Currency::new(self.currency_prefix),
            tax_rate,
            overflow: self.overflow,
            strict_fit: self.strict_fit,
            pdf_options: self.pdf_options,
            debug,
        })
    }
}
