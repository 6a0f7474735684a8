//! Locale-aware quote formatting.
//!
//! Prices render with two decimals and digit grouping. Percent changes
//! render with one decimal and an explicit sign. An unknown change renders
//! as [`UNKNOWN_CHANGE`] so it never reads as zero.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::quote::Quote;

/// Placeholder for a change that the feed did not report.
pub const UNKNOWN_CHANGE: &str = "--";

/// Locale used when none is supplied.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Digit shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digits {
    /// `0123456789`
    Latin,
    /// `٠١٢٣٤٥٦٧٨٩`
    ArabicIndic,
}

impl Digits {
    fn map(self, c: char) -> char {
        match (self, c.to_digit(10)) {
            (Self::ArabicIndic, Some(d)) => char::from_u32(0x0660 + d).unwrap_or(c),
            _ => c,
        }
    }
}

/// Separators and symbols of one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberStyle {
    /// Thousands separator.
    pub group: &'static str,
    /// Decimal separator.
    pub decimal: &'static str,
    /// Digit shapes.
    pub digits: Digits,
    /// Percent sign.
    pub percent: &'static str,
}

impl NumberStyle {
    const EN: Self = Self {
        group: ",",
        decimal: ".",
        digits: Digits::Latin,
        percent: "%",
    };
    const AR: Self = Self {
        group: "\u{066C}",
        decimal: "\u{066B}",
        digits: Digits::ArabicIndic,
        percent: "\u{066A}",
    };
    const DE: Self = Self {
        group: ".",
        decimal: ",",
        digits: Digits::Latin,
        percent: "\u{00A0}%",
    };
    const FR: Self = Self {
        group: "\u{202F}",
        decimal: ",",
        digits: Digits::Latin,
        percent: "\u{202F}%",
    };

    /// Resolve a BCP 47 tag (`en-US`, `ar-SA`, `ar-SA-u-nu-latn`, `de_DE`).
    ///
    /// Unknown languages fall back to `en`.
    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        let normalized = locale.trim().replace('_', "-").to_ascii_lowercase();
        let language = normalized.split('-').next().unwrap_or_default();

        let mut style = match language {
            "ar" => Self::AR,
            "de" | "id" | "tr" => Self::DE,
            "fr" => Self::FR,
            _ => Self::EN,
        };
        if normalized.contains("-u-nu-latn") {
            style.digits = Digits::Latin;
        }
        style
    }
}

/// Formatter bound to one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFormatter {
    locale: String,
    style: NumberStyle,
}

impl QuoteFormatter {
    /// Build a formatter for `locale`.
    #[must_use]
    pub fn new(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            style: NumberStyle::for_locale(locale),
        }
    }

    /// Locale tag this formatter was built for.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Resolved number style.
    #[must_use]
    pub const fn style(&self) -> NumberStyle {
        self.style
    }

    /// Price with two decimals and grouping, e.g. `60,500.00`.
    #[must_use]
    pub fn format_price(&self, quote: &Quote) -> String {
        self.format_decimal(quote.price, 2)
    }

    /// Signed percent change with one decimal, e.g. `+0.3%`, or `--`.
    #[must_use]
    pub fn format_change_percent(&self, quote: &Quote) -> String {
        let Some(change) = quote.change_percent else {
            return UNKNOWN_CHANGE.to_string();
        };

        let rounded = change.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            '-'
        } else {
            '+'
        };
        format!(
            "{sign}{}{}",
            self.format_decimal(rounded.abs(), 1),
            self.style.percent
        )
    }

    /// Fixed-point rendering with grouping.
    fn format_decimal(&self, value: Decimal, dp: u32) -> String {
        let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let plain = format!("{:.*}", dp as usize, rounded.abs());

        let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

        let mut out = String::with_capacity(plain.len() + integer.len() / 3 + 1);
        if negative {
            out.push('-');
        }
        let len = integer.len();
        for (i, c) in integer.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push_str(self.style.group);
            }
            out.push(self.style.digits.map(c));
        }
        if !fraction.is_empty() {
            out.push_str(self.style.decimal);
            out.extend(fraction.chars().map(|c| self.style.digits.map(c)));
        }
        out
    }
}

impl Default for QuoteFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}
