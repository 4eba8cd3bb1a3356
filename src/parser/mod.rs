pub mod cells;
pub mod document;
pub mod select;
pub mod table;

use crate::error::Result;
use crate::records::RecordSet;
use document::Document;
use table::TableSpec;

/// Two-step extraction: html → document → record set.
pub fn extract_page(html: &str, spec: &TableSpec) -> Result<RecordSet> {
    let document = Document::parse_html(html);
    table::extract(&document, spec)
}
