use crate::convert::apply_template;
use crate::error::{Result, ToolError};
use crate::format::{Format, FormatArg};
use crate::table::Table;
use crate::tableio::{self, WriteMode};
use std::path::Path;

/// Concatenate tables side by side. `modifiers` holds one column-name
/// template per table.
pub fn merge_tables(tables: Vec<Table>, modifiers: Option<&[String]>) -> Result<Table> {
    if let Some(modifiers) = modifiers {
        if modifiers.len() != tables.len() {
            return Err(ToolError::config(format!(
                "Please, provide the modifiers for all input tables: {} modifiers for {} tables",
                modifiers.len(),
                tables.len()
            )));
        }
    }
    let mut merged = Table::default();
    for (i, table) in tables.into_iter().enumerate() {
        if merged.width() > 0 && table.width() > 0 && table.height() != merged.height() {
            return Err(ToolError::schema(format!(
                "table #{} has {} rows, expected {}",
                i,
                table.height(),
                merged.height()
            )));
        }
        for mut column in table.into_columns() {
            if let Some(modifiers) = modifiers {
                column.name = apply_template(&modifiers[i], &column.name);
            }
            merged.push_column(column)?;
        }
    }
    Ok(merged)
}

/// Concatenate tables with the same column names one under another.
pub fn stack_tables(tables: Vec<Table>) -> Result<Table> {
    let mut stacked = Table::default();
    for (i, table) in tables.iter().enumerate() {
        if i > 0 && table.column_names() != stacked.column_names() {
            return Err(ToolError::schema(format!(
                "table #{} has columns [{}], expected [{}]",
                i,
                table.column_names().join(", "),
                stacked.column_names().join(", ")
            )));
        }
        stacked.vstack(table)?;
    }
    Ok(stacked)
}

fn output_format<P: AsRef<Path>>(
    inputs: &[P],
    in_format: FormatArg,
    out_format: FormatArg,
) -> Result<Format> {
    match inputs.first() {
        Some(first) => Ok(out_format.or_same_as(in_format.resolve(first)?)),
        None => Err(ToolError::config("no input tables given")),
    }
}

/// Run `table merge`. Returns the number of output columns.
pub fn merge<P: AsRef<Path>>(
    output: &Path,
    inputs: &[P],
    in_format: FormatArg,
    out_format: FormatArg,
    modifiers: Option<&[String]>,
) -> Result<usize> {
    let out_format = output_format(inputs, in_format, out_format)?;
    let tables = tableio::load_tables(inputs, in_format)?;
    let merged = merge_tables(tables, modifiers)?;
    tableio::write_table(&merged, output, out_format, WriteMode::Create)?;
    log::info!(
        "Merged {} tables into {} columns and {} rows",
        inputs.len(),
        merged.width(),
        merged.height()
    );
    Ok(merged.width())
}

/// Run `table stack`. Returns the number of output rows.
pub fn stack<P: AsRef<Path>>(
    output: &Path,
    inputs: &[P],
    in_format: FormatArg,
    out_format: FormatArg,
) -> Result<usize> {
    let out_format = output_format(inputs, in_format, out_format)?;
    let tables = tableio::load_tables(inputs, in_format)?;
    let stacked = stack_tables(tables)?;
    tableio::write_table(&stacked, output, out_format, WriteMode::Create)?;
    log::info!("Stacked {} tables into {} rows", inputs.len(), stacked.height());
    Ok(stacked.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData};

    fn t(name: &str, data: ColumnData) -> Table {
        Table::new(vec![Column::new(name, data)]).unwrap()
    }

    #[test]
    fn test_merge_with_modifiers() {
        let merged = merge_tables(
            vec![
                t("start", ColumnData::Int(vec![1, 2])),
                t("start", ColumnData::Int(vec![3, 4])),
            ],
            Some(&["{colname}_rna".to_string(), "{col_name}_dna".to_string()]),
        )
        .unwrap();
        assert_eq!(merged.column_names(), vec!["start_rna", "start_dna"]);
    }

    #[test]
    fn test_merge_conflicts() {
        let dup = merge_tables(
            vec![t("a", ColumnData::Int(vec![1])), t("a", ColumnData::Int(vec![2]))],
            None,
        );
        assert!(matches!(dup, Err(ToolError::SchemaMismatch(_))));
        let rows = merge_tables(
            vec![t("a", ColumnData::Int(vec![1])), t("b", ColumnData::Int(vec![1, 2]))],
            None,
        );
        assert!(matches!(rows, Err(ToolError::SchemaMismatch(_))));
    }

    #[test]
    fn test_stack_promotes() {
        let stacked = stack_tables(vec![
            t("x", ColumnData::Int(vec![1])),
            t("x", ColumnData::Float(vec![0.5])),
        ])
        .unwrap();
        assert_eq!(stacked.column("x").unwrap().data, ColumnData::Float(vec![1.0, 0.5]));
        assert!(stack_tables(vec![
            t("x", ColumnData::Int(vec![1])),
            t("y", ColumnData::Int(vec![1])),
        ])
        .is_err());
    }

    #[test]
    fn test_stack_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let out = dir.path().join("out.csv");
        std::fs::write(&a, "id,n\nr1,1\n").unwrap();
        std::fs::write(&b, "id,n\nr2,2\nr3,3\n").unwrap();
        let rows = stack(&out, &[&a, &b], FormatArg::Auto, FormatArg::Auto).unwrap();
        assert_eq!(rows, 3);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "id,n\nr1,1\nr2,2\nr3,3\n"
        );
    }
}
