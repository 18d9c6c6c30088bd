//! Terminal rendering of the structural coverage matrix via `tabled`: one
//! row per source element, its mapped target (or "unmapped"), and a ✓/✗
//! status glyph.

use tabled::{Table, Tabled};

use crate::validator::CoverageTarget;

#[derive(Tabled)]
struct CoverageRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Render `coverage` as a terminal table.
pub fn render(coverage: &std::collections::BTreeMap<String, CoverageTarget>) -> String {
    let rows: Vec<CoverageRow> = coverage
        .iter()
        .map(|(source, target)| match target {
            CoverageTarget::Mapped(name) => CoverageRow {
                source: source.clone(),
                target: name.clone(),
                status: "\u{2713}".to_string(),
            },
            CoverageTarget::Unmapped => CoverageRow {
                source: source.clone(),
                target: "-".to_string(),
                status: "\u{2717}".to_string(),
            },
        })
        .collect();
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mapped_and_unmapped_rows() {
        let mut coverage = std::collections::BTreeMap::new();
        coverage.insert("Person".to_string(), CoverageTarget::Mapped("Individual".to_string()));
        coverage.insert("Organization".to_string(), CoverageTarget::Unmapped);
        let table = render(&coverage);
        assert!(table.contains("Individual"));
        assert!(table.contains("Organization"));
    }
}
