//! Page composition for one invoice: letterhead, patient block, auto-fitted
//! line-item table and footer.

use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::error::InvoiceError;
use crate::fit::{FitRequest, FitResult, Row, fit_table};
use crate::font::{FontFamily, FontRegistry, FontStyle};
use crate::frame::Frame;
use crate::layout::{CellAlign, PageGeometry, TableLayoutConfig};
use crate::model::{Density, Invoice, join_fields, normalize_long_number};
use crate::money::{Currency, Totals};
use crate::page_template::{PageTemplate, TemplateLayout, TemplateLine};
use crate::table::{OverflowPolicy, TablePlacement, TableRenderer, draw_table};
use crate::text::TextMeasure;
use crate::types::{Margins, Pt, Rect};
use rust_decimal::Decimal;

/// Meta key naming the page template a page was drawn with.
pub const META_PAGE_TEMPLATE_KEY: &str = "page_template";

const DIVIDER_WIDTH_MM: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
struct PatientStyle {
    name_size: Pt,
    body_size: Pt,
    line_height: Pt,
    gap_before: Pt,
    gap_after: Pt,
    gap_below: Pt,
}

impl PatientStyle {
    fn for_density(density: Density) -> Self {
        let compact = density.is_compact();
        let pick = |normal: f32, compact_value: f32| if compact { compact_value } else { normal };
        Self {
            name_size: Pt::from_f32(pick(10.0, 9.0)),
            body_size: Pt::from_f32(pick(9.0, 8.2)),
            line_height: Pt::from_mm(pick(5.6, 5.0)),
            gap_before: Pt::from_mm(pick(1.2, 1.0)),
            gap_after: Pt::from_mm(pick(1.0, 0.8)),
            gap_below: Pt::from_mm(pick(1.2, 1.0)),
        }
    }
}

/// Centered patient and invoice details between two divider lines.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientBlock {
    lines: Vec<TemplateLine>,
    gap_before: Pt,
    gap_after: Pt,
    gap_below: Pt,
}

impl PatientBlock {
    pub fn layout(
        invoice: &Invoice,
        registry: &FontRegistry,
        family: &FontFamily,
        density: Density,
        width: Pt,
    ) -> Self {
        let style = PatientStyle::for_density(density);
        let patient = &invoice.patient;
        let mut lines = Vec::new();
        let mut push = |text: String, font_style: FontStyle, size: Pt, wrap: bool| {
            if text.is_empty() {
                return;
            }
            let font = family.name(font_style);
            let wrapped = if wrap {
                TextMeasure::new(registry, font).wrap_lines(&text, width, size)
            } else {
                vec![text]
            };
            for text in wrapped {
                lines.push(TemplateLine {
                    text,
                    font: font.to_string(),
                    size,
                    height: style.line_height,
                });
            }
        };

        push(patient.name_line(), FontStyle::Bold, style.name_size, false);
        push(
            join_fields(&[
                ("Invoice No", invoice.number.as_str()),
                ("Invoice Date", invoice.date.as_str()),
            ]),
            FontStyle::Regular,
            style.body_size,
            false,
        );
        let id_number = if patient.id_number.trim().is_empty() {
            String::new()
        } else {
            normalize_long_number(&patient.id_number)
        };
        push(
            join_fields(&[
                ("ID", id_number.as_str()),
                ("Phone", patient.phone.as_str()),
                ("Email", patient.email.as_str()),
            ]),
            FontStyle::Regular,
            style.body_size,
            false,
        );
        push(
            join_fields(&[("Address", patient.address.as_str())]),
            FontStyle::Regular,
            style.body_size,
            true,
        );
        push(
            join_fields(&[
                ("Medical Aid", patient.medical_aid.as_str()),
                ("Plan", patient.medical_aid_plan.as_str()),
                ("Membership No", patient.membership_no.as_str()),
            ]),
            FontStyle::Regular,
            style.body_size,
            false,
        );

        Self {
            lines,
            gap_before: style.gap_before,
            gap_after: style.gap_after,
            gap_below: style.gap_below,
        }
    }

    pub fn lines(&self) -> &[TemplateLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn height(&self) -> Pt {
        if self.is_empty() {
            return Pt::ZERO;
        }
        let lines: Pt = self.lines.iter().map(|line| line.height).sum();
        self.gap_before + lines + self.gap_after + self.gap_below
    }

    pub fn draw(&self, canvas: &mut Canvas, left: Pt, top: Pt, width: Pt) {
        if self.is_empty() {
            return;
        }
        canvas.set_line_width(Pt::from_mm(DIVIDER_WIDTH_MM));
        canvas.draw_line(left, top, left + width, top);
        let mut y = top + self.gap_before;
        for line in &self.lines {
            canvas.set_font(&line.font, line.size);
            canvas.draw_text(left, y, width, line.height, line.text.as_str(), CellAlign::Center);
            y += line.height;
        }
        y += self.gap_after;
        canvas.draw_line(left, y, left + width, y);
    }
}

/// Everything one composition needs besides the invoice itself.
pub struct ComposeSettings<'a> {
    pub config: &'a TableLayoutConfig,
    pub geometry: PageGeometry,
    pub template: &'a PageTemplate,
    pub registry: &'a FontRegistry,
    pub family: &'a FontFamily,
    pub currency: &'a Currency,
    pub tax_rate: Decimal,
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub document: Document,
    pub totals: Totals,
    pub fit: FitResult,
    pub placement: TablePlacement,
}

pub(crate) fn compose_invoice(
    invoice: &Invoice,
    settings: &ComposeSettings<'_>,
    debug: Option<&DebugLogger>,
) -> Result<Composition, InvoiceError> {
    let ComposeSettings {
        config,
        geometry,
        template,
        registry,
        family,
        currency,
        tax_rate,
        overflow,
    } = *settings;

    let items: Vec<_> = invoice
        .items
        .iter()
        .map(|item| item.clone().with_currency(currency))
        .collect();
    let rows: Vec<Row> = items.iter().map(|item| item.cells()).collect();
    let totals = Totals::from_line_totals(items.iter().map(|item| item.line_total()), tax_rate);
    let summary = totals.summary_line(currency);

    // Wrapped once at the starting width; the fit loop only ever widens it.
    let initial_width = geometry.usable_width();
    let template_layout = template.layout(registry, family, initial_width);
    let patient = PatientBlock::layout(invoice, registry, family, template.density, initial_width);
    let content_top = geometry.margins.top + template_layout.header_height + patient.height();

    let measure = TextMeasure::new(registry, &family.regular);
    let request = FitRequest {
        rows: &rows,
        page: geometry.size,
        margins: geometry.margins,
        content_top,
        reserved_bottom: template_layout.footer_height(),
    };
    let fit = fit_table(&request, config, &measure);
    if let Some(logger) = debug {
        for step in &fit.steps {
            logger.log_fit_step(&invoice.number, step);
        }
        logger.log_fit_result(&invoice.number, rows.len(), &fit);
    }

    let margins = fit.state.margins;
    let width = fit.state.usable_width(geometry.size);
    let mut canvas = Canvas::new(geometry.size);
    canvas.meta(META_PAGE_TEMPLATE_KEY, template.name.as_str());
    template_layout.draw_header(&mut canvas, &margins);
    patient.draw(
        &mut canvas,
        margins.left,
        margins.top + template_layout.header_height,
        width,
    );
    let mut frame = Frame::new(Rect {
        x: margins.left,
        y: content_top,
        width,
        height: (geometry.size.height
            - margins.bottom
            - template_layout.footer_height()
            - content_top)
            .max(Pt::ZERO),
    });

    let mut renderer = TableRenderer::new(config, &fit.state, registry, family, margins.left);
    let mut next_page = |canvas: &mut Canvas| {
        start_continuation_page(canvas, template, &template_layout, &margins)
    };
    let placement = draw_table(
        &mut renderer,
        &mut canvas,
        &mut frame,
        &rows,
        &fit.metrics,
        &summary,
        overflow,
        &mut next_page,
    )?;
    let last_page = canvas.page_number();
    template_layout.draw_footer(&mut canvas, &margins, last_page);

    if let Some(logger) = debug {
        logger.increment("compose.pages", placement.rows_per_page.len() as u64);
        logger.increment("compose.rows", placement.rows_drawn() as u64);
    }

    Ok(Composition {
        document: canvas.finish(),
        totals,
        fit,
        placement,
    })
}

fn start_continuation_page(
    canvas: &mut Canvas,
    template: &PageTemplate,
    layout: &TemplateLayout,
    margins: &Margins,
) -> Frame {
    let page_number = canvas.page_number();
    layout.draw_footer(canvas, margins, page_number);
    canvas.show_page();
    canvas.meta(META_PAGE_TEMPLATE_KEY, template.name.as_str());
    layout.draw_header(canvas, margins);
    template.content_frame(margins, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::model::{LineItem, Orientation, PatientDetails};
    use crate::page_template::{Footer, Letterhead};
    use std::str::FromStr;

    fn patient() -> PatientDetails {
        PatientDetails {
            file_no: "42".into(),
            name: "Jo Anne".into(),
            surname: "Smith".into(),
            id_number: "9.40215E+13".into(),
            address: "12 Long Street, Worcester, 6850".into(),
            phone: "082 000 0000".into(),
            email: String::new(),
            medical_aid: "Discovery".into(),
            medical_aid_plan: String::new(),
            membership_no: "12345".into(),
        }
    }

    fn template() -> PageTemplate {
        PageTemplate::new("invoice", crate::types::Size::a4(), Density::Normal)
            .with_letterhead(Letterhead::new().title_line("Dr A Practitioner"))
            .with_footer(Footer::new().line("Payment Terms: Due on receipt."))
    }

    struct Env {
        registry: FontRegistry,
        family: FontFamily,
        config: TableLayoutConfig,
        template: PageTemplate,
        currency: Currency,
    }

    impl Env {
        fn new() -> Self {
            Self {
                registry: FontRegistry::new(),
                family: FontFamily::default(),
                config: TableLayoutConfig::preset(Orientation::Portrait, Density::Normal),
                template: template(),
                currency: Currency::default(),
            }
        }

        fn settings(&self, overflow: OverflowPolicy) -> ComposeSettings<'_> {
            ComposeSettings {
                config: &self.config,
                geometry: PageGeometry::preset(Orientation::Portrait, Density::Normal),
                template: &self.template,
                registry: &self.registry,
                family: &self.family,
                currency: &self.currency,
                tax_rate: Decimal::from_str("0.15").unwrap(),
                overflow,
            }
        }
    }

    fn invoice(rows: usize) -> Invoice {
        let items = (0..rows)
            .map(|i| {
                LineItem::new("2025-08-01", format!("Consult {i}"), "1", "R150.00")
                    .with_diagnoses("M54.5 Low back pain", "")
                    .with_codes("0190", "")
            })
            .collect();
        Invoice::new("INV-1001", "2025-08-01")
            .with_patient(patient())
            .with_items(items)
    }

    #[test]
    fn patient_block_skips_empty_fields() {
        let registry = FontRegistry::new();
        let block = PatientBlock::layout(
            &invoice(0),
            &registry,
            &FontFamily::default(),
            Density::Normal,
            Pt::from_mm(190.0),
        );
        let texts: Vec<&str> = block.lines().iter().map(|line| line.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Smith, Jo Anne  (File: 42)",
                "Invoice No: INV-1001  |  Invoice Date: 2025-08-01",
                "ID: 94021500000000  |  Phone: 082 000 0000",
                "Address: 12 Long Street, Worcester, 6850",
                "Medical Aid: Discovery  |  Membership No: 12345",
            ]
        );
        assert_eq!(block.lines()[0].font, "Helvetica-Bold");
        assert_eq!(
            block.height(),
            Pt::from_mm(1.2) + Pt::from_mm(5.6) * 5 + Pt::from_mm(1.0) + Pt::from_mm(1.2)
        );
    }

    #[test]
    fn empty_patient_block_has_no_height() {
        let registry = FontRegistry::new();
        let invoice = Invoice::new("", "");
        let block = PatientBlock::layout(
            &invoice,
            &registry,
            &FontFamily::default(),
            Density::Compact,
            Pt::from_mm(190.0),
        );
        assert!(block.is_empty());
        assert_eq!(block.height(), Pt::ZERO);
    }

    #[test]
    fn patient_address_wraps_on_narrow_width() {
        let registry = FontRegistry::new();
        let mut invoice = invoice(0);
        invoice.patient.address = "Unit 4, The Old Mill, 100 Long Street, Worcester Central, Western Cape, 6850".into();
        let block = PatientBlock::layout(
            &invoice,
            &registry,
            &FontFamily::default(),
            Density::Normal,
            Pt::from_mm(60.0),
        );
        let address_lines = block
            .lines()
            .iter()
            .skip_while(|line| !line.text.starts_with("Address:"))
            .take_while(|line| !line.text.starts_with("Medical Aid"))
            .count();
        assert!(address_lines > 1);
    }

    #[test]
    fn single_page_invoice_has_template_table_and_footer() {
        let env = Env::new();
        let composition =
            compose_invoice(&invoice(3), &env.settings(OverflowPolicy::Paginate), None).unwrap();
        assert_eq!(composition.document.pages.len(), 1);
        assert_eq!(composition.placement.rows_per_page, vec![3]);
        assert!(!composition.fit.is_degraded());
        assert_eq!(composition.totals.gross, Decimal::from_str("450.00").unwrap());

        let page = &composition.document.pages[0];
        assert_eq!(page.meta(META_PAGE_TEMPLATE_KEY), Some("invoice"));
        let texts: Vec<&str> = page.texts().collect();
        assert_eq!(texts.first(), Some(&"Dr A Practitioner"));
        assert!(texts.contains(&"Smith, Jo Anne  (File: 42)"));
        assert!(texts.contains(&"Unit Price"));
        assert!(texts.contains(&"150.00"));
        assert!(texts.contains(
            &"Excl. VAT: R391.30   |   VAT @15%: R58.70   |   Total (Incl. VAT): R450.00"
        ));
        assert_eq!(texts.last(), Some(&"Page 1"));
        let dividers = page
            .commands
            .iter()
            .filter(|command| matches!(command, Command::DrawLine { .. }))
            .count();
        assert_eq!(dividers, 2);
    }

    #[test]
    fn long_invoice_paginates_with_repeated_template() {
        let env = Env::new();
        let composition =
            compose_invoice(&invoice(150), &env.settings(OverflowPolicy::Paginate), None).unwrap();
        let pages = &composition.document.pages;
        assert!(pages.len() > 1);
        assert!(composition.fit.is_degraded());
        assert!(!composition.placement.overflowed);
        assert_eq!(composition.placement.rows_drawn(), 150);
        for (index, page) in pages.iter().enumerate() {
            let texts: Vec<&str> = page.texts().collect();
            assert_eq!(page.meta(META_PAGE_TEMPLATE_KEY), Some("invoice"));
            assert_eq!(texts.first(), Some(&"Dr A Practitioner"));
            let label = format!("Page {}", index + 1);
            assert_eq!(texts.last(), Some(&label.as_str()));
        }
        let consults: usize = pages
            .iter()
            .map(|page| page.texts().filter(|t| t.starts_with("Consult ")).count())
            .sum();
        assert_eq!(consults, 150);
    }

    #[test]
    fn overflow_policy_keeps_one_page() {
        let env = Env::new();
        let composition =
            compose_invoice(&invoice(150), &env.settings(OverflowPolicy::Overflow), None).unwrap();
        assert_eq!(composition.document.pages.len(), 1);
        assert!(composition.placement.overflowed);
        assert_eq!(composition.placement.rows_per_page, vec![150]);
    }

    #[test]
    fn custom_currency_prefix_parses_prices() {
        let mut env = Env::new();
        env.currency = Currency::new("$");
        let invoice = Invoice::new("INV-2", "2025-08-01")
            .with_items(vec![LineItem::new("2025-08-01", "Consult", "2", "$1,000.00")]);
        let composition =
            compose_invoice(&invoice, &env.settings(OverflowPolicy::Paginate), None).unwrap();
        assert_eq!(composition.totals.gross, Decimal::from_str("2000.00").unwrap());
        let texts: Vec<&str> = composition.document.pages[0].texts().collect();
        assert!(texts.iter().any(|t| t.contains("Total (Incl. VAT): $2000.00")));
    }
}
