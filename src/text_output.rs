// Plain-text rendering of comparison tables for the terminal
//
// Each varying value gets one `mean ± std` column; the fixed tuple is
// printed first. Widths are computed over header and cells.

use crate::compare::PivotTable;
use crate::results::DimValue;

const MISSING: &str = "-";

fn cell(table: &PivotTable, key: &[DimValue], value: &DimValue) -> String {
    match table.stats(key, value) {
        Some(stats) if !stats.is_missing() => format!("{:.4} ± {:.4}", stats.mean, stats.std),
        _ => MISSING.to_string(),
    }
}

/// Render `table` as an aligned text table.
pub fn render(table: &PivotTable) -> String {
    let values = table.values();

    let mut header: Vec<String> = table.fixed.iter().map(|d| d.name().to_string()).collect();
    header.extend(values.iter().map(|v| v.to_string()));

    let body: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut line: Vec<String> = row.key.iter().map(|v| v.to_string()).collect();
            line.extend(values.iter().map(|v| cell(table, &row.key, v)));
            line
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for line in &body {
        for (width, field) in widths.iter_mut().zip(line) {
            *width = (*width).max(field.chars().count());
        }
    }

    let format_line = |fields: &[String]| -> String {
        fields
            .iter()
            .zip(&widths)
            .map(|(field, &width)| {
                let pad = width - field.chars().count();
                format!("{}{}", field, " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format!(
        "Expected deficit from best {} ({} groups)\n",
        table.vary,
        table.rows.len()
    );
    out.push_str(&format_line(&header));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for line in &body {
        out.push_str(&format_line(line));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DeficitStats;
    use crate::results::Dimension;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_aligns_columns_and_marks_missing() {
        let mut first = BTreeMap::new();
        first.insert(DimValue::from("ctranspath"), DeficitStats { mean: 0.0375, std: 0.0415 });
        first.insert(DimValue::from("vit"), DeficitStats { mean: 0.0375, std: 0.0415 });
        let mut second = BTreeMap::new();
        second.insert(DimValue::from("vit"), DeficitStats { mean: 0.0, std: 0.0 });

        let table = PivotTable::from_groups(
            vec![Dimension::Model],
            Dimension::FeatureExtractor,
            vec![
                (vec!["AttentionMIL".into()], first),
                (vec!["MLP".into()], second),
            ],
        );

        let text = render(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Expected deficit from best feature_extractor (2 groups)");
        assert_eq!(lines[1], "model         ctranspath       vit");
        assert_eq!(lines[3], "AttentionMIL  0.0375 ± 0.0415  0.0375 ± 0.0415");
        assert_eq!(lines[4], "MLP           -                0.0000 ± 0.0000");
    }

    #[test]
    fn test_render_empty_table() {
        let table = PivotTable::from_groups(vec![Dimension::Model], Dimension::Model, Vec::new());
        let text = render(&table);
        assert!(text.contains("(0 groups)"));
        assert_eq!(text.lines().count(), 3);
    }
}
