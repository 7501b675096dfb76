//! The review-table schema the model is asked to fill in.
//!
//! Every row has eight text fields and none of them is optional: the
//! generation API is told all eight are required, and deserialisation
//! rejects a row that lacks one. Empty strings are fine.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One requirement-evaluation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRow {
    /// Requirement identifier, e.g. `REQ-001`.
    pub requirement_no: String,
    /// Requirement text (persona: instruction).
    pub requirement_content: String,
    /// Verdict symbol: `〇`, `△` or `×`.
    pub evaluation: String,
    /// Where in the design the (non-)compliance was found.
    pub compliance_location: String,
    /// Why the item was judged (non-)compliant.
    pub compliance_reason: String,
    /// Proposed correction, including golden cases.
    pub correction_plan: String,
    /// Whether the item was addressed.
    pub response_status: String,
    /// How it was addressed, or why it was not.
    pub response_method: String,
}

impl ReviewRow {
    /// The verdict, when `evaluation` holds one of the recognised symbols.
    pub fn verdict(&self) -> Option<Verdict> {
        Verdict::from_symbol(&self.evaluation)
    }

    /// Field values in column order.
    pub fn cells(&self) -> [&str; 8] {
        [
            &self.requirement_no,
            &self.requirement_content,
            &self.evaluation,
            &self.compliance_location,
            &self.compliance_reason,
            &self.correction_plan,
            &self.response_status,
            &self.response_method,
        ]
    }
}

/// The full ordered table. Row order is the order requirements appear in
/// the source documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTable {
    pub rows: Vec<ReviewRow>,
}

impl ReviewTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Evaluation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// `〇` — requirement met.
    Pass,
    /// `△` — partially met.
    Partial,
    /// `×` — not met.
    Fail,
}

impl Verdict {
    pub fn symbol(self) -> &'static str {
        match self {
            Verdict::Pass => "〇",
            Verdict::Partial => "△",
            Verdict::Fail => "×",
        }
    }

    /// Parse a verdict symbol. Common look-alikes are accepted since models
    /// do not always reproduce the exact code point.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim() {
            "〇" | "○" | "◯" => Some(Verdict::Pass),
            "△" => Some(Verdict::Partial),
            "×" | "✕" | "x" | "X" => Some(Verdict::Fail),
            _ => None,
        }
    }
}

const ROW_FIELDS: [(&str, &str); 8] = [
    ("requirement_no", "Requirement number (e.g. REQ-001)"),
    (
        "requirement_content",
        "Full requirement content (persona: instruction)",
    ),
    (
        "evaluation",
        "Evaluation result (〇: compliant / △: partially compliant / ×: non-compliant)",
    ),
    (
        "compliance_location",
        "Reference to where the design complies or fails to comply",
    ),
    (
        "compliance_reason",
        "Reason the item was judged compliant or non-compliant",
    ),
    (
        "correction_plan",
        "Proposed correction, including golden cases",
    ),
    ("response_status", "Whether the item has been addressed"),
    (
        "response_method",
        "How it was addressed, or why it was not addressed",
    ),
];

/// Response schema in the OpenAPI subset accepted by `generateContent`.
pub fn review_table_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for (name, description) in ROW_FIELDS {
        properties.insert(
            name.to_string(),
            json!({ "type": "STRING", "description": description }),
        );
    }
    let names: Vec<&str> = ROW_FIELDS.iter().map(|(n, _)| *n).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "rows": {
                "type": "ARRAY",
                "description": "Every review row. Never omit a single row: extract every \
requirement item in the documents, through to the last one, without truncating.",
                "items": {
                    "type": "OBJECT",
                    "properties": properties,
                    "required": names,
                    "propertyOrdering": names,
                }
            }
        },
        "required": ["rows"],
    })
}
