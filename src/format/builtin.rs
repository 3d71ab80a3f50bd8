//! Built-in number format ids
//!
//! Cells may refer to a format by id alone. Ids below 164 are reserved for
//! built-in formats that never appear in the styles part.

/// Standard codes for the built-in ids, keyed by id
const STANDARD: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "m/d/yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

/// Codes a spreadsheet application shows for the ids where it differs
/// from the standard table (four-digit years, accounting parentheses)
const SPREADSHEET_APP: &[(u32, &str)] = &[
    (14, "m/d/yyyy"),
    (22, "m/d/yyyy h:mm"),
    (37, "#,##0_);(#,##0)"),
    (38, "#,##0_);[Red](#,##0)"),
    (39, "#,##0.00_);(#,##0.00)"),
    (40, "#,##0.00_);[Red](#,##0.00)"),
    (47, "mm:ss.0"),
];

fn lookup(table: &[(u32, &'static str)], id: u32) -> Option<&'static str> {
    table
        .binary_search_by_key(&id, |(k, _)| *k)
        .ok()
        .map(|i| table[i].1)
}

/// Standard code for a built-in id, `None` for ids without one
pub fn standard_code(id: u32) -> Option<&'static str> {
    lookup(STANDARD, id)
}

/// Code from the spreadsheet-application table, `None` when it has no entry
pub fn spreadsheet_app_code(id: u32) -> Option<&'static str> {
    lookup(SPREADSHEET_APP, id)
}
