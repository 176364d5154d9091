//! Display helpers for listings: BRL prices, Brazilian phone numbers, contact
//! links and dates.

use crate::model::PostFields;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static pattern"));

pub const PRICE_ON_REQUEST: &str = "A combinar";

fn digits(raw: &str) -> String {
    NON_DIGIT.replace_all(raw, "").into_owned()
}

/// `R$ 1.500`; whole reais with `.` as thousands separator. Missing or zero
/// prices read "A combinar".
pub fn format_price(price: Option<f64>) -> String {
    let value = match price {
        Some(p) if p.is_finite() && p != 0.0 => p.round() as i64,
        _ => return PRICE_ON_REQUEST.to_string(),
    };
    let sign = if value < 0 { "-" } else { "" };
    let raw = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{}R$ {}", sign, grouped)
}

pub fn format_price_range(min: Option<f64>, max: Option<f64>) -> String {
    let set = |p: Option<f64>| p.filter(|v| *v != 0.0);
    match (set(min), set(max)) {
        (None, None) => PRICE_ON_REQUEST.to_string(),
        (None, Some(max)) => format!("Até {}", format_price(Some(max))),
        (Some(min), None) => format!("A partir de {}", format_price(Some(min))),
        (Some(min), Some(max)) if min == max => format_price(Some(min)),
        (Some(min), Some(max)) => format!("{} - {}", format_price(Some(min)), format_price(Some(max))),
    }
}

/// `(11) 98765-4321` for 11 digits, `(11) 3456-7890` for 10; anything else
/// is returned as typed.
pub fn format_phone(phone: &str) -> String {
    let d = digits(phone);
    match d.len() {
        11 => format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..]),
        10 => format!("({}) {}-{}", &d[..2], &d[2..6], &d[6..]),
        _ => phone.to_string(),
    }
}

pub fn whatsapp_link(phone: &str) -> String {
    format!("https://wa.me/{}", digits(phone))
}

pub fn email_link(email: &str) -> String {
    format!("mailto:{}", email.trim())
}

pub fn telegram_link(username: &str) -> String {
    format!("https://t.me/{}", username.trim().trim_start_matches('@'))
}

pub fn has_contact_info(fields: &PostFields) -> bool {
    fields.has_contact_info()
}

/// Cut `text` to at most `max_chars` characters and mark the cut with `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte, _)) => format!("{}...", text[..byte].trim_end()),
    }
}

/// `dd/mm/yyyy`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
