use serde::{Deserialize, Serialize};
use std::fmt;

pub const PAYMENT_MADE_TO: &str = "Payment Made To";
pub const GRANT_HEAD: &str = "Grant Head";
pub const DATE: &str = "Date";
pub const TOTAL_AMOUNT: &str = "Total Amount";
pub const PURPOSE: &str = "Purpose";
pub const COLLEGE_NAME: &str = "College Name";

pub const DEPARTMENT_NAME: &str = "Department Name";
pub const BILL_NO: &str = "Bill No";
pub const PURCHASE_ORDER_NO: &str = "Purchase Order No";

/// Declared value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Date string, kept as it appeared on the bill.
    Date,
    /// Whole currency units.
    Amount,
}

impl FieldKind {
    /// Whether `value` has the representation this kind is stored in.
    pub fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Text | FieldKind::Date, FieldValue::Text(_))
                | (FieldKind::Amount, FieldValue::Amount(_))
        )
    }
}

/// A value extracted for one field. Absence is modelled as `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Amount(i64),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Amount(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind }
    }
}

/// Ordered set of output fields for one deployment. Column order in every
/// spreadsheet written for this deployment follows `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Payment vouchers: payee, grant head, date, total, purpose and college.
    pub fn payment_voucher() -> Self {
        Self {
            name: "payment_voucher".to_string(),
            fields: vec![
                FieldSpec::new(PAYMENT_MADE_TO, FieldKind::Text),
                FieldSpec::new(GRANT_HEAD, FieldKind::Text),
                FieldSpec::new(DATE, FieldKind::Date),
                FieldSpec::new(TOTAL_AMOUNT, FieldKind::Amount),
                FieldSpec::new(PURPOSE, FieldKind::Text),
                FieldSpec::new(COLLEGE_NAME, FieldKind::Text),
            ],
        }
    }

    /// Department bill register, parsed from `Label: value` lines.
    pub fn bill_register() -> Self {
        Self {
            name: "bill_register".to_string(),
            fields: vec![
                FieldSpec::new(DEPARTMENT_NAME, FieldKind::Text),
                FieldSpec::new(BILL_NO, FieldKind::Text),
                FieldSpec::new(PURCHASE_ORDER_NO, FieldKind::Text),
                FieldSpec::new(DATE, FieldKind::Date),
                // Taken verbatim from the line, so it stays text here.
                FieldSpec::new(TOTAL_AMOUNT, FieldKind::Text),
            ],
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
