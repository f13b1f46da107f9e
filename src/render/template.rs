use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::domain::{PeriodTerm, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub label: String,
    pub value: String,
}

impl ReceiptLine {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// Everything a backend needs to produce a receipt, independent of which
/// backend ends up consuming it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPayload {
    pub reference: String,
    pub title: String,
    pub buyer: String,
    pub description: String,
    pub amount: i64,
    pub sections: Vec<Vec<ReceiptLine>>,
    pub html: String,
}

impl RenderPayload {
    /// Dates printed in UTC.
    pub fn from_transaction(tx: &Transaction, shop_name: &str) -> Self {
        Self::from_transaction_in(tx, shop_name, Utc.fix())
    }

    /// Dates printed as calendar days at the shop's UTC offset.
    pub fn from_transaction_in(tx: &Transaction, shop_name: &str, offset: FixedOffset) -> Self {
        let mut header = vec![
            ReceiptLine::new("Transaction Code", &tx.transaction_code),
            ReceiptLine::new("Admin", &tx.admin_name),
            ReceiptLine::new("Buyer Number", &tx.buyer_number),
        ];
        if let Some(purchase_date) = tx.purchase_date {
            header.push(ReceiptLine::new("Purchase Date", format_date(purchase_date, offset)));
        }

        let mut product = vec![
            ReceiptLine::new("Product", &tx.product_name),
            ReceiptLine::new("Price", format_price(tx.product_price)),
        ];
        if let Some(serial) = &tx.serial_number {
            product.push(ReceiptLine::new("Serial Number", serial));
        }

        let mut sections = vec![header, product];
        if let Some(term) = &tx.active_period {
            sections.push(period_lines("Active Period", "Active Until", term, offset));
        }
        if let Some(term) = &tx.warranty {
            sections.push(period_lines("Warranty Period", "Warranty Until", term, offset));
        }

        let html = render_html(shop_name, &sections);

        Self {
            reference: tx.transaction_code.clone(),
            title: shop_name.to_string(),
            buyer: tx.buyer_number.clone(),
            description: tx.product_name.clone(),
            amount: tx.product_price,
            sections,
            html,
        }
    }
}

fn period_lines(
    duration_label: &str,
    until_label: &str,
    term: &PeriodTerm,
    offset: FixedOffset,
) -> Vec<ReceiptLine> {
    vec![
        ReceiptLine::new(duration_label, format!("{} {}", term.duration, term.unit)),
        ReceiptLine::new(until_label, format_date(term.expires_at, offset)),
    ]
}

const STYLE: &str = "body { font-family: sans-serif; background-color: #1a1a1a; color: #e0e0e0; padding: 20px; }\
 .receipt { width: 350px; background-color: #1c1c1c; border: 2px solid #00BFFF; border-radius: 10px; padding: 20px; box-shadow: 0 0 15px rgba(0, 191, 255, 0.4); }\
 .header { text-align: center; margin-bottom: 20px; }\
 .header h1 { color: #00BFFF; font-size: 1.8rem; margin: 0; }\
 p { margin: 5px 0; font-size: 1rem; }\
 strong { color: #00FFFF; font-weight: 600; }\
 .divider { height: 1px; background-color: #555; margin: 15px 0; }";

fn render_html(shop_name: &str, sections: &[Vec<ReceiptLine>]) -> String {
    let body = sections
        .iter()
        .map(|lines| {
            lines
                .iter()
                .map(|line| {
                    format!(
                        "<p><strong>{}:</strong> {}</p>",
                        escape_html(&line.label),
                        escape_html(&line.value)
                    )
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("<div class=\"divider\"></div>");

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{}</style></head>\
         <body><div class=\"receipt\"><div class=\"header\"><h1>{}</h1></div>{}</div></body></html>",
        STYLE,
        escape_html(shop_name),
        body
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `Rp` prefix with `.` thousands grouping, e.g. `Rp1.250.000`.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp{}", grouped)
    } else {
        format!("Rp{}", grouped)
    }
}

pub fn format_date(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%d/%m/%Y").to_string()
}
