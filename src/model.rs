use crate::money::{Currency, MoneyField, checked_line_total, format_plain};
use rust_decimal::Decimal;

pub const COLUMN_COUNT: usize = 9;

pub const HEADERS: [&str; COLUMN_COUNT] = [
    "Date",
    "Service",
    "ICD-10 Code",
    "ICD-10 Secondary",
    "Tariff",
    "NAPPI",
    "Qty",
    "Unit Price",
    "Total",
];

/// One billing line. Quantity and price keep the caller's literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub date: String,
    pub service: String,
    pub primary_diagnosis: String,
    pub secondary_diagnosis: String,
    pub tariff_code: String,
    pub product_code: String,
    quantity: MoneyField,
    unit_price: MoneyField,
}

impl LineItem {
    pub fn new(
        date: impl Into<String>,
        service: impl Into<String>,
        quantity: impl Into<String>,
        unit_price: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            service: service.into(),
            primary_diagnosis: String::new(),
            secondary_diagnosis: String::new(),
            tariff_code: String::new(),
            product_code: String::new(),
            quantity: MoneyField::parse(quantity),
            unit_price: MoneyField::parse(unit_price),
        }
    }

    pub fn with_diagnoses(
        mut self,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        self.primary_diagnosis = primary.into();
        self.secondary_diagnosis = secondary.into();
        self
    }

    pub fn with_codes(mut self, tariff: impl Into<String>, product: impl Into<String>) -> Self {
        self.tariff_code = tariff.into();
        self.product_code = product.into();
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = MoneyField::parse(quantity);
        self
    }

    pub fn with_unit_price(mut self, unit_price: impl Into<String>) -> Self {
        self.unit_price = MoneyField::parse(unit_price);
        self
    }

    /// Re-parses quantity and price with a non-default currency prefix.
    pub fn with_currency(mut self, currency: &Currency) -> Self {
        self.quantity = MoneyField::parse_with(self.quantity.literal().to_string(), currency);
        self.unit_price = MoneyField::parse_with(self.unit_price.literal().to_string(), currency);
        self
    }

    pub fn quantity(&self) -> &MoneyField {
        &self.quantity
    }

    pub fn unit_price(&self) -> &MoneyField {
        &self.unit_price
    }

    /// `None` when quantity or price does not parse, or their product overflows.
    pub fn checked_line_total(&self) -> Option<Decimal> {
        checked_line_total(self.quantity.value()?, self.unit_price.value()?)
    }

    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::ZERO)
    }

    /// Cell texts in column order.
    pub fn cells(&self) -> [String; COLUMN_COUNT] {
        [
            self.date.clone(),
            self.service.clone(),
            self.primary_diagnosis.clone(),
            self.secondary_diagnosis.clone(),
            self.tariff_code.clone(),
            self.product_code.clone(),
            self.quantity.literal().to_string(),
            self.unit_price.literal().to_string(),
            format_plain(self.line_total()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    Normal,
    Compact,
}

impl Density {
    pub fn is_compact(self) -> bool {
        matches!(self, Density::Compact)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientDetails {
    pub file_no: String,
    pub name: String,
    pub surname: String,
    pub id_number: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub medical_aid: String,
    pub medical_aid_plan: String,
    pub membership_no: String,
}

impl PatientDetails {
    /// `Surname, Name  (File: 12)` with whichever parts are present.
    pub fn name_line(&self) -> String {
        let name = self.name.trim();
        let surname = self.surname.trim();
        let mut line = match (surname.is_empty(), name.is_empty()) {
            (false, false) => format!("{surname}, {name}"),
            (false, true) => surname.to_string(),
            (true, false) => name.to_string(),
            (true, true) => String::new(),
        };
        let file_no = self.file_no.trim();
        if !file_no.is_empty() {
            line = if line.is_empty() {
                format!("(File: {file_no})")
            } else {
                format!("{line}  (File: {file_no})")
            };
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub number: String,
    pub date: String,
    pub patient: PatientDetails,
    pub items: Vec<LineItem>,
}

impl Invoice {
    pub fn new(number: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            date: date.into(),
            patient: PatientDetails::default(),
            items: Vec::new(),
        }
    }

    pub fn with_patient(mut self, patient: PatientDetails) -> Self {
        self.patient = patient;
        self
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    pub fn push_item(&mut self, item: LineItem) {
        self.items.push(item);
    }

    /// `INV-1001_Smith_Jo_Anne_2025-08-01.pdf`
    pub fn default_file_name(&self) -> String {
        let clean = |s: &str| s.trim().replace(' ', "_");
        format!(
            "{}_{}_{}_{}.pdf",
            self.number.trim(),
            clean(&self.patient.surname),
            clean(&self.patient.name),
            self.date.trim()
        )
    }
}

pub fn format_invoice_no(n: u64) -> String {
    format!("INV-{n}")
}

pub fn parse_invoice_no(text: &str) -> Option<u64> {
    text.replace("INV-", "").trim().parse().ok()
}

/// Joins `label: value` pairs with `  |  `, skipping empty values.
pub fn join_fields(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .filter_map(|(label, value)| {
            let value = value.trim();
            (!value.is_empty()).then(|| format!("{label}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("  |  ")
}

/// Turns spreadsheet-mangled identifiers (`9.40215E+13`) back into digits.
pub fn normalize_long_number(raw: &str) -> String {
    let raw = raw.trim();
    let mut text = raw.to_string();
    if raw.to_ascii_lowercase().contains('e') || raw.contains('.') {
        let parsed = Decimal::from_scientific(raw).or_else(|_| raw.parse::<Decimal>());
        if let Ok(value) = parsed {
            text = value.round().normalize().to_string();
        }
    }
    let digits: String = text.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() { raw.to_string() } else { digits }
}
