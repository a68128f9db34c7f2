//! Catalog CSV parser.
//!
//! Parses Microsoft's "Product names and service plan identifiers for
//! licensing" export:
//! - Header row naming the six columns below (order does not matter)
//! - One row per product × service plan
//! - Optional UTF-8 byte-order mark (the published file carries one)
//! - Extra columns are ignored

use csv::{ReaderBuilder, StringRecord, Trim};
use licensegraph_shared::{CatalogRow, LicenseGraphError, Result};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

const COL_DISPLAY_NAME: &str = "Product_Display_Name";
const COL_STRING_ID: &str = "String_Id";
const COL_GUID: &str = "GUID";
const COL_PLAN_NAME: &str = "Service_Plan_Name";
const COL_PLAN_ID: &str = "Service_Plan_Id";
const COL_PLAN_FRIENDLY_NAME: &str = "Service_Plans_Included_Friendly_Names";

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    display_name: usize,
    string_id: usize,
    guid: usize,
    plan_name: usize,
    plan_id: usize,
    plan_friendly_name: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| LicenseGraphError::malformed_row(0, name))
        };

        Ok(Self {
            display_name: find(COL_DISPLAY_NAME)?,
            string_id: find(COL_STRING_ID)?,
            guid: find(COL_GUID)?,
            plan_name: find(COL_PLAN_NAME)?,
            plan_id: find(COL_PLAN_ID)?,
            plan_friendly_name: find(COL_PLAN_FRIENDLY_NAME)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse catalog CSV text into rows.
///
/// A header without one of the required columns fails with
/// `MalformedRow { row: 0, .. }`; a data row too short to hold a column
/// fails with that row's 1-based index.
pub fn parse_catalog_csv(content: &str) -> Result<Vec<CatalogRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LicenseGraphError::Csv(e.to_string()))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| LicenseGraphError::Csv(e.to_string()))?;
        let row = i + 1;

        // Trailing blank lines in hand-edited exports.
        if record.iter().all(str::is_empty) {
            continue;
        }

        let field = |idx: usize, name: &'static str| {
            record
                .get(idx)
                .map(str::to_string)
                .ok_or_else(|| LicenseGraphError::malformed_row(row, name))
        };

        rows.push(CatalogRow {
            product_display_name: field(columns.display_name, COL_DISPLAY_NAME)?,
            string_id: field(columns.string_id, COL_STRING_ID)?,
            guid: field(columns.guid, COL_GUID)?,
            service_plan_name: field(columns.plan_name, COL_PLAN_NAME)?,
            service_plan_id: field(columns.plan_id, COL_PLAN_ID)?,
            service_plan_friendly_name: field(
                columns.plan_friendly_name,
                COL_PLAN_FRIENDLY_NAME,
            )?,
        });
    }

    Ok(rows)
}
