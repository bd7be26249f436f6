//! Shared cell formats queued next to generated formulas.

use serde_json::{json, Value};

/// A reusable format payload together with the field mask that scopes the
/// update to exactly the properties it sets.
pub struct CellFormat {
    pub format: Value,
    pub fields: &'static str,
}

pub fn bold_center_wrap_header() -> CellFormat {
    CellFormat {
        format: json!({
            "textFormat": { "bold": true },
            "wrapStrategy": "WRAP",
            "horizontalAlignment": "CENTER",
        }),
        fields: "userEnteredFormat.textFormat.bold,userEnteredFormat.wrapStrategy,userEnteredFormat.horizontalAlignment",
    }
}

pub fn currency_pln() -> CellFormat {
    CellFormat {
        format: json!({
            "numberFormat": { "type": "CURRENCY", "pattern": "#,##0 \"zł\"" },
        }),
        fields: "userEnteredFormat.numberFormat",
    }
}

pub fn solid_black_border() -> Value {
    json!({
        "style": "SOLID",
        "width": 1,
        "color": { "red": 0, "green": 0, "blue": 0 },
    })
}

/// Width of the squeezed count columns in the group balance tab.
pub const NARROW_COLUMN_PX: i64 = 55;
/// Width of the per-course status columns in the summary tab.
pub const COURSE_COLUMN_PX: i64 = 21;
/// Width of the weekly payment columns in the per-course tabs.
pub const PAYMENT_COLUMN_PX: i64 = 40;
