//! Exact money arithmetic for tax-inclusive invoices.
//!
//! Everything here works on `rust_decimal::Decimal`; binary floating point never
//! touches an amount.

use rust_decimal::prelude::*;
use std::fmt;

pub const DEFAULT_CURRENCY_PREFIX: &str = "R";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Empty,
    NotANumber,
}

/// A money, quantity or percentage field that is not a valid decimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} in {input:?}")]
pub struct ParseError {
    pub input: String,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Empty => write!(f, "empty value"),
            ParseErrorKind::NotANumber => write!(f, "not a decimal number"),
        }
    }
}

impl ParseError {
    fn new(input: &str, kind: ParseErrorKind) -> Self {
        Self {
            input: input.to_string(),
            kind,
        }
    }
}

/// Currency prefix used for parsing and formatting amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    prefix: String,
}

impl Default for Currency {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY_PREFIX)
    }
}

impl Currency {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn parse(&self, text: &str) -> Result<Decimal, ParseError> {
        let mut clean = text.trim();
        if !self.prefix.is_empty() {
            clean = clean.strip_prefix(self.prefix.as_str()).unwrap_or(clean);
        }
        let clean: String = clean
            .chars()
            .filter(|ch| *ch != ',' && !ch.is_whitespace())
            .collect();
        if clean.is_empty() {
            return Err(ParseError::new(text, ParseErrorKind::Empty));
        }
        Decimal::from_str(&clean).map_err(|_| ParseError::new(text, ParseErrorKind::NotANumber))
    }

    pub fn format(&self, value: Decimal) -> String {
        format!("{}{}", self.prefix, format_plain(value))
    }
}

/// Parses an amount with the default `R` prefix, ignoring `,` separators.
pub fn parse_money(text: &str) -> Result<Decimal, ParseError> {
    Currency::default().parse(text)
}

pub fn format_money(value: Decimal) -> String {
    Currency::default().format(value)
}

pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Two decimal places, half-up, no prefix (`100` -> `100.00`).
pub fn format_plain(value: Decimal) -> String {
    let mut rounded = round_half_up(value, 2);
    rounded.rescale(2);
    rounded.to_string()
}

/// `None` when the product does not fit in a `Decimal`.
pub fn checked_line_total(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity
        .checked_mul(unit_price)
        .map(|product| round_half_up(product, 2))
}

/// Overflowing products contribute zero, like unparseable fields.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    checked_line_total(quantity, unit_price).unwrap_or(Decimal::ZERO)
}

/// Splits a tax-inclusive gross amount into `(exclusive, tax)`.
///
/// The exclusive part is rounded first and the tax is the remainder, so the two
/// always add back up to `gross`.
pub fn compute_tax(gross: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    if rate.is_zero() {
        return (gross, Decimal::ZERO);
    }
    let Some(exclusive) = gross.checked_div(Decimal::ONE + rate) else {
        return (gross, Decimal::ZERO);
    };
    let exclusive = round_half_up(exclusive, 2);
    (exclusive, gross - exclusive)
}

/// Parses a percentage entry such as `15` or `15%` into a rate (`0.15`).
pub fn parse_tax_percent(text: &str) -> Result<Decimal, ParseError> {
    let raw = text.trim().trim_end_matches('%').trim();
    if raw.is_empty() {
        return Err(ParseError::new(text, ParseErrorKind::Empty));
    }
    let pct =
        Decimal::from_str(raw).map_err(|_| ParseError::new(text, ParseErrorKind::NotANumber))?;
    Ok((pct / Decimal::ONE_HUNDRED).round_dp(4))
}

/// Whole-number percentage label for a rate (`0.15` -> `15`).
pub fn format_rate_percent(rate: Decimal) -> String {
    (rate * Decimal::ONE_HUNDRED).trunc().normalize().to_string()
}

/// Literal field text alongside its parsed value.
///
/// The literal is what gets drawn; the parsed value is what gets summed.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyField {
    literal: String,
    parsed: Result<Decimal, ParseError>,
}

impl MoneyField {
    pub fn parse(text: impl Into<String>) -> Self {
        Self::parse_with(text, &Currency::default())
    }

    pub fn parse_with(text: impl Into<String>, currency: &Currency) -> Self {
        let literal = text.into();
        let parsed = currency.parse(&literal);
        Self { literal, parsed }
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self {
            literal: value.to_string(),
            parsed: Ok(value),
        }
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn parsed(&self) -> Result<Decimal, &ParseError> {
        self.parsed.as_ref().copied()
    }

    pub fn value(&self) -> Option<Decimal> {
        self.parsed.as_ref().ok().copied()
    }
}

/// Invoice totals derived from line totals and a tax rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub gross: Decimal,
    pub rate: Decimal,
    pub exclusive: Decimal,
    pub tax: Decimal,
}

impl Totals {
    pub fn from_line_totals<I>(line_totals: I, rate: Decimal) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let gross = line_totals
            .into_iter()
            .fold(Decimal::ZERO, |acc, value| acc.checked_add(value).unwrap_or(acc));
        let gross = round_half_up(gross, 2);
        let (exclusive, tax) = compute_tax(gross, rate);
        Self {
            gross,
            rate,
            exclusive,
            tax,
        }
    }

    /// `Excl. VAT: R391.30   |   VAT @15%: R58.70   |   Total (Incl. VAT): R450.00`
    pub fn summary_line(&self, currency: &Currency) -> String {
        format!(
            "Excl. VAT: {}   |   VAT @{}%: {}   |   Total (Incl. VAT): {}",
            currency.format(self.exclusive),
            format_rate_percent(self.rate),
            currency.format(self.tax),
            currency.format(self.gross)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn parse_strips_prefix_and_separators() {
        assert_eq!(parse_money("R1,250.50").unwrap(), dec("1250.50"));
        assert_eq!(parse_money("  R 99 ").unwrap(), dec("99"));
        assert_eq!(parse_money("0.5").unwrap(), dec("0.5"));
    }

    #[test]
    fn parse_rejects_empty_and_garbage() {
        assert_eq!(parse_money("").unwrap_err().kind, ParseErrorKind::Empty);
        assert_eq!(parse_money("R").unwrap_err().kind, ParseErrorKind::Empty);
        let err = parse_money("abc").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NotANumber);
        assert_eq!(err.input, "abc");
    }

    #[test]
    fn format_rounds_half_up_to_cents() {
        assert_eq!(format_money(dec("391.304")), "R391.30");
        assert_eq!(format_money(dec("0.005")), "R0.01");
        assert_eq!(format_money(dec("12")), "R12.00");
        assert_eq!(Currency::new("$").format(dec("2.345")), "$2.35");
    }

    #[test]
    fn line_total_rounds_product() {
        assert_eq!(line_total(dec("3"), dec("33.335")), dec("100.01"));
        assert_eq!(line_total(dec("2"), dec("50.00")), dec("100.00"));
    }

    #[test]
    fn overflowing_product_is_not_a_total() {
        let huge = Decimal::MAX;
        assert_eq!(checked_line_total(huge, dec("2")), None);
        assert!(line_total(huge, dec("2")).is_zero());
        assert_eq!(checked_line_total(huge, Decimal::ONE), Some(huge));
    }

    #[test]
    fn overflowing_sum_skips_the_line() {
        let totals =
            Totals::from_line_totals([dec("100.00"), Decimal::MAX, Decimal::MAX], Decimal::ZERO);
        assert_eq!(totals.gross, dec("100.00"));
        let totals = Totals::from_line_totals([Decimal::MAX, dec("5.00")], dec("0.15"));
        assert_eq!(totals.exclusive + totals.tax, totals.gross);
    }

    #[test]
    fn tax_reconstructs_gross_exactly() {
        let rates = ["0.15", "0.14", "0.075", "0.2", "0.999"];
        let grosses = ["0.00", "0.01", "1.00", "450.00", "999999.99", "123.45"];
        for rate in rates {
            for gross in grosses {
                let (g, r) = (dec(gross), dec(rate));
                let (exclusive, tax) = compute_tax(g, r);
                assert_eq!(exclusive + tax, g, "gross {gross} rate {rate}");
                assert_eq!(tax, g - exclusive);
                assert!(exclusive.scale() <= 2);
            }
        }
    }

    #[test]
    fn zero_rate_is_identity() {
        for gross in ["0", "17.99", "450.00"] {
            assert_eq!(compute_tax(dec(gross), Decimal::ZERO), (dec(gross), Decimal::ZERO));
        }
    }

    #[test]
    fn three_line_scenario_matches_reference_totals() {
        let lines = [
            line_total(dec("1"), parse_money("R100.00").unwrap()),
            line_total(dec("2"), parse_money("R50.00").unwrap()),
            line_total(dec("1"), parse_money("R250.00").unwrap()),
        ];
        assert_eq!(lines, [dec("100.00"), dec("100.00"), dec("250.00")]);
        let totals = Totals::from_line_totals(lines, dec("0.15"));
        assert_eq!(totals.gross, dec("450.00"));
        assert_eq!(totals.exclusive, dec("391.30"));
        assert_eq!(totals.tax, dec("58.70"));
        assert_eq!(
            totals.summary_line(&Currency::default()),
            "Excl. VAT: R391.30   |   VAT @15%: R58.70   |   Total (Incl. VAT): R450.00"
        );
    }

    #[test]
    fn empty_totals_are_zero() {
        let totals = Totals::from_line_totals(Vec::new(), dec("0.15"));
        assert!(totals.gross.is_zero());
        assert!(totals.exclusive.is_zero());
        assert!(totals.tax.is_zero());
    }

    #[test]
    fn tax_percent_entry() {
        assert_eq!(parse_tax_percent("15").unwrap(), dec("0.15"));
        assert_eq!(parse_tax_percent(" 14% ").unwrap(), dec("0.14"));
        assert_eq!(parse_tax_percent("7.125").unwrap(), dec("0.0712"));
        assert!(parse_tax_percent("fifteen").is_err());
        assert_eq!(format_rate_percent(dec("0.15")), "15");
        assert_eq!(format_rate_percent(dec("0.155")), "15");
        assert_eq!(format_rate_percent(Decimal::ZERO), "0");
    }

    #[test]
    fn money_field_keeps_literal_on_failure() {
        let field = MoneyField::parse("abc");
        assert_eq!(field.literal(), "abc");
        assert!(field.value().is_none());
        assert!(field.parsed().is_err());
        let ok = MoneyField::parse("R250.00");
        assert_eq!(ok.value(), Some(dec("250.00")));
    }
}
