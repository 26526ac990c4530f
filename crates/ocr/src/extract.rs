use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use billscan_core::schema::{
    COLLEGE_NAME, DATE, GRANT_HEAD, PAYMENT_MADE_TO, PURPOSE, TOTAL_AMOUNT,
};
use billscan_core::{FieldSchema, FieldValue, Record, RecordBuilder};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rules::CompiledRules;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date,
    r"\b\d{1,2}[-/]\d{1,2}(?:[-/]\d{2,4})?\b");
re!(re_total,
    r"(?i)(?:grand\s+)?total\s*rs\.?[\s•·*:\-]*(\d[\d,]*(?:\.\d+)?)");
re!(re_shri_line,
    r"(?im)^[^\n]*\bshri\b[^\n]*$");

/// Which family of matchers runs over the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Whole-text heuristics over the payment voucher schema.
    #[default]
    PaymentVoucher,
    /// `Label: value` lines over the bill register schema.
    BillRegister,
}

impl Layout {
    pub fn schema(self) -> FieldSchema {
        match self {
            Layout::PaymentVoucher => FieldSchema::payment_voucher(),
            Layout::BillRegister => FieldSchema::bill_register(),
        }
    }
}

/// Turns a transcript into a [`Record`]. Never fails: anything not found is
/// left absent.
pub struct FieldEngine {
    layout: Layout,
    schema: Arc<FieldSchema>,
    rules: CompiledRules,
}

impl FieldEngine {
    pub fn new(layout: Layout, rules: CompiledRules) -> Self {
        Self { layout, schema: Arc::new(layout.schema()), rules }
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn parse(&self, transcript: &str) -> Record {
        tracing::debug!(layout = ?self.layout, %transcript, "parsing transcript");
        let record = if transcript.trim().is_empty() {
            Record::empty(self.schema.clone())
        } else {
            match self.layout {
                Layout::PaymentVoucher => self.parse_voucher(transcript),
                Layout::BillRegister => self.parse_lines(transcript),
            }
        };
        tracing::debug!(?record, "parsed record");
        record
    }

    // ── Line-anchored ────────────────────────────────────────────────────────

    /// First matching line with a non-empty value wins; a bare `Label:` line
    /// does not claim the field.
    fn parse_lines(&self, text: &str) -> Record {
        let mut builder = RecordBuilder::new(self.schema.clone());
        for line in text.lines() {
            let Some((field, strip)) = self.rules.line_label(line) else {
                continue;
            };
            let value: String = value_after_last_colon(line)
                .chars()
                .filter(|c| !strip.contains(c))
                .collect();
            let value = value.trim();
            if !value.is_empty() {
                builder.set_if_absent(field, FieldValue::text(value));
            }
        }
        builder.build()
    }

    // ── Whole-text heuristics ────────────────────────────────────────────────

    fn parse_voucher(&self, text: &str) -> Record {
        let lower = text.to_lowercase();
        let mut builder = RecordBuilder::new(self.schema.clone());

        if let Some(name) = self.extract_payee(text) {
            builder.set_if_absent(PAYMENT_MADE_TO, FieldValue::Text(name));
        }
        if let Some(label) = self.rules.grant_head(&lower) {
            builder.set_if_absent(GRANT_HEAD, FieldValue::text(label));
        }
        if let Some(date) = extract_date(text) {
            builder.set_if_absent(DATE, FieldValue::text(date));
        }
        if let Some(total) = extract_total(text) {
            builder.set_if_absent(TOTAL_AMOUNT, FieldValue::Amount(total));
        }
        if let Some(label) = self.rules.purpose(&lower) {
            builder.set_if_absent(PURPOSE, FieldValue::text(label));
        }
        if let Some(line) = extract_college(text) {
            builder.set_if_absent(COLLEGE_NAME, FieldValue::text(line));
        }

        // "Not mentioned" only makes sense on a bill we recognized at all.
        if !builder.is_empty() {
            builder.set_if_absent(GRANT_HEAD, FieldValue::text(self.rules.grant_head_fallback()));
        }
        builder.build()
    }

    /// Longest capture across the payee patterns, cut at the first backslash
    /// or line break, then cleaned.
    fn extract_payee(&self, text: &str) -> Option<String> {
        let best = self
            .rules
            .payee_patterns()
            .iter()
            .filter_map(|re| re.captures(text)?.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .fold(None::<&str>, |best, s| match best {
                Some(b) if b.chars().count() >= s.chars().count() => Some(b),
                _ => Some(s),
            })?;

        let cut = best
            .find(['\\', '\n', '\r'])
            .map_or(best, |i| &best[..i]);
        let cleaned = self.rules.clean_payee(cut);
        (!cleaned.is_empty()).then_some(cleaned)
    }
}

fn value_after_last_colon(line: &str) -> &str {
    line.rsplit(':').next().unwrap_or(line)
}

/// First `D-M`, `D/M`, `D-M-YYYY` or `D/M/YY` token, verbatim.
fn extract_date(text: &str) -> Option<&str> {
    re_date().find(text).map(|m| m.as_str())
}

/// Last labelled total in the text, thousands separators dropped, truncated
/// to whole units. An unparseable last total leaves the field absent.
fn extract_total(text: &str) -> Option<i64> {
    let last = re_total().captures_iter(text).last()?;
    parse_amount_str(last.get(1)?.as_str())
}

/// First full line containing the word `SHRI`, trimmed.
fn extract_college(text: &str) -> Option<&str> {
    re_shri_line()
        .find(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

// ── Amount parsing ────────────────────────────────────────────────────────────

fn parse_amount_str(s: &str) -> Option<i64> {
    let clean = s.replace(',', "");
    Decimal::from_str(&clean).ok()?.trunc().to_i64()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use billscan_core::schema::{BILL_NO, DEPARTMENT_NAME, PURCHASE_ORDER_NO};

    fn voucher() -> FieldEngine {
        FieldEngine::new(Layout::PaymentVoucher, RuleSet::default().compile().unwrap())
    }

    fn register() -> FieldEngine {
        FieldEngine::new(Layout::BillRegister, RuleSet::default().compile().unwrap())
    }

    fn text(r: &Record, field: &str) -> Option<String> {
        r.get(field).map(|v| v.to_string())
    }

    // ── Absence ──────────────────────────────────────────────────────────────

    #[test]
    fn empty_transcript_is_all_absent() {
        assert!(voucher().parse("").is_empty());
        assert!(register().parse("   \n  ").is_empty());
    }

    #[test]
    fn unrecognizable_text_is_all_absent() {
        let r = voucher().parse("lorem ipsum\ndolor sit amet");
        assert!(r.is_empty());
        assert_eq!(r.iter().count(), 6);
        assert!(register().parse("!@#$%^&*()\n\0\x01\x02").is_empty());
    }

    // ── Line-anchored ────────────────────────────────────────────────────────

    #[test]
    fn bill_no_after_colon() {
        let r = register().parse("Bill No: INV-2024-007");
        assert_eq!(text(&r, BILL_NO).as_deref(), Some("INV-2024-007"));
    }

    #[test]
    fn register_fields_with_spacing_and_case() {
        let t = "DEPARTMENT  NAME : Computer Science\n\
                 purchase order no: PO/77\n\
                 Date: 12-08-2024\n\
                 Total Amount: 4,500%";
        let r = register().parse(t);
        assert_eq!(text(&r, DEPARTMENT_NAME).as_deref(), Some("Computer Science"));
        assert_eq!(text(&r, PURCHASE_ORDER_NO).as_deref(), Some("PO/77"));
        assert_eq!(text(&r, DATE).as_deref(), Some("12-08-2024"));
        assert_eq!(text(&r, TOTAL_AMOUNT).as_deref(), Some("4,500"));
    }

    #[test]
    fn value_is_after_last_colon() {
        let r = register().parse("Date: 10:30: 01/02/2024");
        assert_eq!(text(&r, DATE).as_deref(), Some("01/02/2024"));
    }

    #[test]
    fn first_matching_line_wins() {
        let r = register().parse("Bill No: A-1\nBill No: B-2");
        assert_eq!(text(&r, BILL_NO).as_deref(), Some("A-1"));
    }

    #[test]
    fn empty_value_does_not_block_later_line() {
        let r = register().parse("Bill No:\nBill No: B-2");
        assert_eq!(text(&r, BILL_NO).as_deref(), Some("B-2"));
    }

    // ── Total amount ─────────────────────────────────────────────────────────

    #[test]
    fn last_total_wins() {
        let r = voucher().parse("Item 1\nTotal Rs. 1,200\nTax\nGrand Total Rs. 3,450");
        assert_eq!(r.get(TOTAL_AMOUNT), Some(&FieldValue::Amount(3450)));
    }

    #[test]
    fn unparseable_last_total_does_not_fall_back_to_subtotal() {
        let huge = "9".repeat(33);
        let r = voucher().parse(&format!("Total Rs. 1,200\nGrand Total Rs. {huge}"));
        assert_eq!(r.get(TOTAL_AMOUNT), None);
    }

    #[test]
    fn total_tolerates_bullets_and_newlines() {
        let r = voucher().parse("Grand Total Rs.\n • 12,345.99\n");
        assert_eq!(r.get(TOTAL_AMOUNT), Some(&FieldValue::Amount(12345)));
    }

    #[test]
    fn unlabelled_numbers_are_not_totals() {
        let r = voucher().parse("Amount 500\nRs. 700");
        assert_eq!(r.get(TOTAL_AMOUNT), None);
    }

    #[test]
    fn parse_amount_str_truncates() {
        assert_eq!(parse_amount_str("1,234.99"), Some(1234));
        assert_eq!(parse_amount_str("50"), Some(50));
        assert_eq!(parse_amount_str(","), None);
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_first_match_verbatim() {
        let r = voucher().parse("Voucher dated 5/9/2024, paid 07-09-24");
        assert_eq!(text(&r, DATE).as_deref(), Some("5/9/2024"));
    }

    #[test]
    fn date_without_year() {
        let r = voucher().parse("Received on 15-8 at office");
        assert_eq!(text(&r, DATE).as_deref(), Some("15-8"));
    }

    // ── College name ─────────────────────────────────────────────────────────

    #[test]
    fn college_is_shri_line_trimmed() {
        let r = voucher().parse("Receipt\n   M/S SHRI RAM TRADERS  \nTotal Rs. 10");
        assert_eq!(text(&r, COLLEGE_NAME).as_deref(), Some("M/S SHRI RAM TRADERS"));
    }

    #[test]
    fn no_shri_line_means_no_college() {
        let r = voucher().parse("Shrinivas Stores\nTotal Rs. 10");
        assert_eq!(r.get(COLLEGE_NAME), None);
    }

    // ── Grant head / purpose ─────────────────────────────────────────────────

    #[test]
    fn grant_head_label_or_not_mentioned() {
        let r = voucher().parse("Charged to TEQUIP-III\nTotal Rs. 100");
        assert_eq!(text(&r, GRANT_HEAD).as_deref(), Some("TEQIP"));

        let r = voucher().parse("Charged to college fund\nTotal Rs. 100");
        assert_eq!(text(&r, GRANT_HEAD).as_deref(), Some("Not Mentioned"));
    }

    #[test]
    fn purpose_specific_before_generic() {
        let r = voucher().parse("NPTEL course on Python programming");
        assert_eq!(text(&r, PURPOSE).as_deref(), Some("NPTEL Python Course Fee"));
        let r = voucher().parse("NPTEL exam fee");
        assert_eq!(text(&r, PURPOSE).as_deref(), Some("NPTEL Course Fee"));
    }

    // ── Payee ────────────────────────────────────────────────────────────────

    #[test]
    fn payee_longest_capture_wins_and_is_cleaned() {
        let t = "Please make party payment TO SHRI Ramesh Kumar Verma towards payment of bill\n\
                 A/s Ramesh";
        let r = voucher().parse(t);
        assert_eq!(text(&r, PAYMENT_MADE_TO).as_deref(), Some("Ramesh Kumar Verma"));
    }

    #[test]
    fn payee_cut_at_backslash() {
        let r = voucher().parse(r"Payment to M/s Sai Stationers\ Hyderabad");
        assert_eq!(text(&r, PAYMENT_MADE_TO).as_deref(), Some("Sai Stationers"));
    }

    #[test]
    fn payee_absent_without_phrase() {
        let r = voucher().parse("Sai Stationers\nTotal Rs. 40");
        assert_eq!(r.get(PAYMENT_MADE_TO), None);
    }

    #[test]
    fn payee_of_only_titles_is_absent() {
        let r = voucher().parse("Payment to Shri\nTotal Rs. 40");
        assert_eq!(r.get(PAYMENT_MADE_TO), None);
    }

    // ── Full voucher ─────────────────────────────────────────────────────────

    #[test]
    fn full_voucher() {
        let t = "SHRI VENKATESWARA COLLEGE OF ENGINEERING\n\
                 PAYMENT VOUCHER          Date: 21/03/2024\n\
                 Payment made to: Smt. K. Lakshmi\n\
                 Being the amount for industry visit under TEQIP\n\
                 Total Rs. 2,000\n\
                 Grand Total Rs. 2,360.50";
        let r = voucher().parse(t);
        assert_eq!(text(&r, PAYMENT_MADE_TO).as_deref(), Some("K. Lakshmi"));
        assert_eq!(text(&r, GRANT_HEAD).as_deref(), Some("TEQIP"));
        assert_eq!(text(&r, DATE).as_deref(), Some("21/03/2024"));
        assert_eq!(r.get(TOTAL_AMOUNT), Some(&FieldValue::Amount(2360)));
        assert_eq!(text(&r, PURPOSE).as_deref(), Some("Industrial Visit"));
        assert_eq!(
            text(&r, COLLEGE_NAME).as_deref(),
            Some("SHRI VENKATESWARA COLLEGE OF ENGINEERING")
        );
    }
}
