//! CSV output format for comparison tables
//!
//! One row per fixed-dimension tuple. Header: the fixed dimension names,
//! then `<value>/<stat>` per pivot column. NaN cells are left empty.

use crate::compare::PivotTable;

/// CSV output formatter
#[derive(Debug)]
pub struct CsvOutput<'t> {
    table: &'t PivotTable,
}

impl<'t> CsvOutput<'t> {
    pub fn new(table: &'t PivotTable) -> Self {
        Self { table }
    }

    /// Generate CSV header row
    fn header(&self) -> String {
        let mut headers: Vec<String> = self
            .table
            .fixed
            .iter()
            .map(|dim| dim.name().to_string())
            .collect();
        headers.extend(
            self.table
                .columns
                .iter()
                .map(|c| format!("{}/{}", c.value, c.stat)),
        );
        headers
            .iter()
            .map(|h| Self::escape_field(h))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_cell(value: f64) -> String {
        if value.is_nan() {
            String::new()
        } else {
            value.to_string()
        }
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = self.header();
        output.push('\n');

        for row in &self.table.rows {
            let mut fields: Vec<String> = row
                .key
                .iter()
                .map(|v| Self::escape_field(&v.to_string()))
                .collect();
            fields.extend(row.cells.iter().map(|&c| Self::format_cell(c)));
            output.push_str(&fields.join(","));
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DeficitStats;
    use crate::results::{DimValue, Dimension};
    use std::collections::BTreeMap;

    fn table() -> PivotTable {
        let mut attention = BTreeMap::new();
        attention.insert(DimValue::from("ctranspath"), DeficitStats { mean: 0.0, std: 0.0 });
        attention.insert(DimValue::from("vit"), DeficitStats { mean: 0.25, std: 0.5 });
        let mut transformer = BTreeMap::new();
        transformer.insert(DimValue::from("vit"), DeficitStats { mean: 0.125, std: 0.0 });

        PivotTable::from_groups(
            vec![Dimension::Model, Dimension::Target],
            Dimension::FeatureExtractor,
            vec![
                (vec!["AttentionMIL".into(), "MSI".into()], attention),
                (vec!["Transformer".into(), "KRAS, BRAF".into()], transformer),
            ],
        )
    }

    #[test]
    fn test_csv_header() {
        let table = table();
        let output = CsvOutput::new(&table);
        assert_eq!(
            output.header(),
            "model,target,ctranspath/mean,ctranspath/std,vit/mean,vit/std"
        );
    }

    #[test]
    fn test_csv_escape_field_simple() {
        assert_eq!(CsvOutput::escape_field("MSI"), "MSI");
    }

    #[test]
    fn test_csv_escape_field_with_quote() {
        assert_eq!(CsvOutput::escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_rows_with_missing_cells() {
        let table = table();
        let csv = CsvOutput::new(&table).to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "AttentionMIL,MSI,0,0,0.25,0.5");
        assert_eq!(lines[2], "Transformer,\"KRAS, BRAF\",,,0.125,0");
    }

    #[test]
    fn test_csv_empty_table() {
        let table = PivotTable::from_groups(
            vec![Dimension::Model],
            Dimension::FeatureExtractor,
            Vec::new(),
        );
        assert_eq!(CsvOutput::new(&table).to_csv(), "model\n");
    }
}
