use crate::canvas::{Command, Document, Page};
use crate::error::InvoiceError;
use crate::font::{FontRegistry, HELVETICA, RegisteredFont};
use crate::layout::CellAlign;
use crate::text::cell_padding;
use crate::types::{Color, Pt, Size};
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream, dictionary};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub title: Option<String>,
    pub compress: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: None,
            compress: true,
        }
    }
}

/// Serialized PDF with a few counters for the render report.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    /// Uncompressed content stream size per page.
    pub page_content_bytes: Vec<usize>,
    /// Characters that had no WinAnsi code and were drawn as `?`.
    pub replaced_chars: usize,
}

pub fn document_to_pdf(
    document: &Document,
    registry: &FontRegistry,
    options: &PdfOptions,
) -> Result<PdfOutput, InvoiceError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    // Canvas font name -> resource name; aliases share one embedded object.
    let mut font_map = BTreeMap::new();
    let mut resources_by_font: BTreeMap<String, String> = BTreeMap::new();
    let mut font_dict = Dictionary::new();
    for name in collect_used_font_names(document) {
        let Some(font) = registry.resolve(&name) else {
            return Err(InvoiceError::Pdf(format!("font {name} is not registered")));
        };
        if let Some(resource) = resources_by_font.get(&font.name) {
            font_map.insert(name, resource.clone());
            continue;
        }
        let object_id = if font.is_builtin() {
            doc.add_object(base14_font_object(&font.name))
        } else {
            embed_font(&mut doc, font)?
        };
        let resource = format!("F{}", resources_by_font.len() + 1);
        font_dict.set(resource.as_bytes().to_vec(), LoObject::Reference(object_id));
        resources_by_font.insert(font.name.clone(), resource.clone());
        font_map.insert(name, resource);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => LoObject::Dictionary(font_dict),
    });

    let page_height = document.page_size.height;
    let mut kids = Vec::with_capacity(document.pages.len());
    let mut page_content_bytes = Vec::with_capacity(document.pages.len());
    let mut replaced_chars = 0usize;
    for page in &document.pages {
        let rendered = render_page(page, page_height, &font_map, registry)?;
        replaced_chars += rendered.replaced;
        page_content_bytes.push(rendered.content.len());
        let content_id = doc.add_object(Stream::new(Dictionary::new(), rendered.content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(document.page_size),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(LoObject::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => LoObject::Integer(kids.len() as i64),
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, LoObject::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => LoObject::string_literal("invoicefit"),
    };
    if let Some(title) = options.title.as_deref() {
        info.set("Title", LoObject::string_literal(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    if options.compress {
        doc.compress();
    }
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(PdfOutput {
        bytes,
        page_content_bytes,
        replaced_chars,
    })
}

fn media_box(size: Size) -> Vec<LoObject> {
    vec![
        LoObject::Integer(0),
        LoObject::Integer(0),
        LoObject::Real(size.width.to_f32()),
        LoObject::Real(size.height.to_f32()),
    ]
}

fn collect_used_font_names(document: &Document) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        let mut current = HELVETICA.to_string();
        for command in &page.commands {
            match command {
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawText { .. } | Command::DrawWrappedText { .. } => {
                    names.insert(current.clone());
                }
                _ => {}
            }
        }
    }
    names
}

fn base14_font_object(name: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => sanitize_font_name(name),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn embed_font(doc: &mut LoDocument, font: &RegisteredFont) -> Result<ObjectId, InvoiceError> {
    let Some(data) = font.data.as_deref() else {
        return Err(InvoiceError::Pdf(format!("font {} has no program data", font.name)));
    };
    let is_cff = ttf_parser::Face::parse(data, 0)
        .map(|face| face.tables().cff.is_some())
        .unwrap_or(false);
    let base = sanitize_font_name(&font.name);
    let metrics = &font.metrics;

    let (file_key, subtype, file_dict) = if is_cff {
        ("FontFile3", "Type1", dictionary! { "Subtype" => "OpenType" })
    } else {
        (
            "FontFile2",
            "TrueType",
            dictionary! { "Length1" => LoObject::Integer(data.len() as i64) },
        )
    };
    let file_id = doc.add_object(Stream::new(file_dict, data.to_vec()));

    let mut flags = 32i64;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let (llx, lly, urx, ury) = metrics.bbox;
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base.clone(),
        "Flags" => LoObject::Integer(flags),
        "FontBBox" => vec![
            LoObject::Integer(llx as i64),
            LoObject::Integer(lly as i64),
            LoObject::Integer(urx as i64),
            LoObject::Integer(ury as i64),
        ],
        "ItalicAngle" => LoObject::Integer(metrics.italic_angle as i64),
        "Ascent" => LoObject::Integer(metrics.ascent as i64),
        "Descent" => LoObject::Integer(metrics.descent as i64),
        "CapHeight" => LoObject::Integer(metrics.cap_height as i64),
        "StemV" => LoObject::Integer(metrics.stem_v as i64),
        "MissingWidth" => LoObject::Integer(metrics.missing_width as i64),
    };
    descriptor.set(file_key, LoObject::Reference(file_id));
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<LoObject> = metrics
        .widths
        .iter()
        .map(|width| LoObject::Integer(*width as i64))
        .collect();
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => subtype,
        "BaseFont" => base,
        "FirstChar" => LoObject::Integer(metrics.first_char as i64),
        "LastChar" => LoObject::Integer(metrics.last_char as i64),
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    }))
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        HELVETICA.to_string()
    } else {
        out
    }
}

struct RenderedPage {
    content: String,
    replaced: usize,
}

// Canvas coordinates have a top-left origin; PDF space is bottom-left.
fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, String>,
    registry: &FontRegistry,
) -> Result<RenderedPage, InvoiceError> {
    let mut out = String::new();
    let mut replaced = 0usize;
    let mut font_name = HELVETICA.to_string();
    let mut font_size = Pt::from_f32(12.0);

    for command in &page.commands {
        match command {
            Command::Meta { .. } => {}
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nS\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawLine { x1, y1, x2, y2 } => {
                out.push_str(&format!(
                    "{} {} m\n{} {} l\nS\n",
                    fmt_pt(*x1),
                    fmt_pt(page_height - *y1),
                    fmt_pt(*x2),
                    fmt_pt(page_height - *y2)
                ));
            }
            Command::DrawText {
                x,
                y,
                width,
                height,
                text,
                align,
            } => {
                let resource = resource_for(font_map, &font_name)?;
                let line = TextLine {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                    text,
                    align: *align,
                };
                replaced += line.write(&mut out, resource, &font_name, font_size, page_height, registry);
            }
            Command::DrawWrappedText {
                x,
                y,
                width,
                line_height,
                lines,
                align,
            } => {
                let resource = resource_for(font_map, &font_name)?;
                let mut line_y = *y;
                for text in lines {
                    let line = TextLine {
                        x: *x,
                        y: line_y,
                        width: *width,
                        height: *line_height,
                        text,
                        align: *align,
                    };
                    replaced +=
                        line.write(&mut out, resource, &font_name, font_size, page_height, registry);
                    line_y += *line_height;
                }
            }
        }
    }
    Ok(RenderedPage {
        content: out,
        replaced,
    })
}

fn resource_for<'a>(
    font_map: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, InvoiceError> {
    font_map
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| InvoiceError::Pdf(format!("font {name} has no resource")))
}

struct TextLine<'a> {
    x: Pt,
    y: Pt,
    width: Pt,
    height: Pt,
    text: &'a str,
    align: CellAlign,
}

impl TextLine<'_> {
    /// Writes one `Tj` and returns the number of replaced characters.
    fn write(
        &self,
        out: &mut String,
        resource: &str,
        font_name: &str,
        font_size: Pt,
        page_height: Pt,
        registry: &FontRegistry,
    ) -> usize {
        if self.text.is_empty() {
            return 0;
        }
        let text_width = registry.measure_text_width(font_name, font_size, self.text);
        let x = match self.align {
            CellAlign::Left => self.x + cell_padding(),
            CellAlign::Right => self.x + self.width - cell_padding() - text_width,
            CellAlign::Center => self.x + (self.width - text_width) / 2,
        };
        // Vertically centered: half the box plus 0.3 em down to the baseline.
        let baseline = self.y + self.height / 2 + font_size.mul_ratio(3, 10);
        let encoded = encode_winansi_pdf_string(self.text);
        out.push_str("BT\n");
        out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(font_size)));
        out.push_str(&format!(
            "{} {} Td\n",
            fmt_pt(x),
            fmt_pt(page_height - baseline)
        ));
        out.push_str(&format!("({}) Tj\nET\n", encoded.text));
        encoded.replaced
    }
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        // ASCII fallbacks for symbols that are not WinAnsi.
        match ch {
            '\u{2265}' => {
                out.push_str(">=");
                continue;
            }
            '\u{2264}' => {
                out.push_str("<=");
                continue;
            }
            _ => {}
        }

        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            // cp1252 extensions
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded { text: out, replaced }
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn fmt_unit(value: f32) -> String {
    let clamped = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    format_milli((clamped * 1000.0).round() as i64)
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt_unit(color.r),
        fmt_unit(color.g),
        fmt_unit(color.b)
    )
}
