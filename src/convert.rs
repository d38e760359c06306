use crate::error::{Result, ToolError};
use crate::format::FormatArg;
use crate::table::{ColumnData, ColumnSelector, DType, Table};
use crate::tableio::{self, TableWriter};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref COLNAME: Regex = Regex::new(r"\{col_?name\}").expect("valid column template regex");
}

/// Fill a column-name template such as `{colname}__R1`.
/// # Example
/// ```
/// use rnadnatools::convert::apply_template;
/// assert_eq!(apply_template("{colname}__R1", "start"), "start__R1");
/// assert_eq!(apply_template("pre_{col_name}", "end"), "pre_end");
/// ```
pub fn apply_template(template: &str, colname: &str) -> String {
    COLNAME
        .replace_all(template, regex::NoExpand(colname))
        .into_owned()
}

/// New column names: leading `#` stripped, then the optional template applied.
pub fn converted_names(names: &[String], modifier: Option<&str>) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let name = name.trim_start_matches('#');
            match modifier {
                Some(template) => apply_template(template, name),
                None => name.to_string(),
            }
        })
        .collect()
}

/// Convert `input` to another format, chunk by chunk. Returns the rows written.
pub fn convert(
    input: &Path,
    output: &Path,
    in_format: FormatArg,
    out_format: FormatArg,
    chunksize: usize,
    col_modifier: Option<&str>,
) -> Result<usize> {
    let in_format = in_format.resolve(input)?;
    let out_format = out_format.or_same_as(in_format);
    if in_format == out_format {
        log::info!(
            "in_format is same as out_format ({}). Nothing to be done. Consider using cp instead.",
            in_format
        );
        return Ok(0);
    }

    let reader = tableio::load(input, in_format, None, Some(chunksize), true)?;
    let names = converted_names(reader.column_names(), col_modifier);
    let mut writer = TableWriter::create(output, out_format)?;
    let mut rows = 0;
    for chunk in reader {
        let mut chunk = chunk?;
        chunk.rename(&names)?;
        writer.write(&chunk)?;
        rows += chunk.height();
    }
    if rows == 0 {
        writer.write(&Table::empty(&names)?)?;
    }
    writer.finish()?;
    log::info!("Converted {} rows from {} to {}", rows, in_format, out_format);
    Ok(rows)
}

/// Keep the rows where `filter` is true, then the selected columns.
pub fn dump_chunk(
    chunk: &Table,
    filter: Option<&ColumnSelector>,
    columns: Option<&[ColumnSelector]>,
) -> Result<Table> {
    let filtered = match filter {
        Some(sel) => {
            let column = chunk.column_at(chunk.resolve(sel)?);
            let mask = match column.data.cast(DType::Bool) {
                Ok(ColumnData::Bool(mask)) => mask,
                _ => {
                    return Err(ToolError::schema(format!(
                        "filter column '{}' of type {} is not boolean",
                        column.name,
                        column.dtype()
                    )))
                }
            };
            chunk.filter(&mask)
        }
        None => chunk.clone(),
    };
    match columns {
        Some(sels) => filtered.select(sels),
        None => Ok(filtered),
    }
}

/// Dump the filtered, selected columns of `input`. Returns the rows written.
pub fn dump(
    input: &Path,
    output: &Path,
    in_format: FormatArg,
    out_format: FormatArg,
    filter: Option<&ColumnSelector>,
    columns: Option<&[ColumnSelector]>,
    chunksize: usize,
) -> Result<usize> {
    if let Some(sels) = columns {
        if sels.is_empty() {
            log::warn!("No columns selected. Nothing to be written. Exit.");
            return Ok(0);
        }
    }
    let in_format = in_format.resolve(input)?;
    let out_format = out_format.or_same_as(in_format);
    let reader = tableio::load(input, in_format, None, Some(chunksize), true)?;
    let header = dump_chunk(&Table::empty(reader.column_names())?, None, columns)?;

    let mut writer = TableWriter::create(output, out_format)?;
    let mut rows = 0;
    for chunk in reader {
        let out = dump_chunk(&chunk?, filter, columns)?;
        rows += out.height();
        writer.write(&out)?;
    }
    if rows == 0 {
        writer.write(&header)?;
    }
    writer.finish()?;
    log::info!("Dumped {} rows into {}", rows, output.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_converted_names() {
        let names = vec!["#chrom".to_string(), "start".to_string()];
        assert_eq!(converted_names(&names, None), vec!["chrom", "start"]);
        assert_eq!(
            converted_names(&names, Some("{colname}_dna")),
            vec!["chrom_dna", "start_dna"]
        );
    }

    #[test]
    fn test_dump_chunk() {
        let t = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["a".into(), "b".into(), "c".into()])),
            Column::new("ok", ColumnData::Bool(vec![true, false, true])),
        ])
        .unwrap();
        let out = dump_chunk(
            &t,
            Some(&ColumnSelector::Name("ok".into())),
            Some(&[ColumnSelector::Index(0)]),
        )
        .unwrap();
        assert_eq!(out.column_names(), vec!["id"]);
        assert_eq!(
            out.column("id").unwrap().data,
            ColumnData::Str(vec!["a".into(), "c".into()])
        );
        assert!(matches!(
            dump_chunk(&t, Some(&ColumnSelector::Name("id".into())), None),
            Err(ToolError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_convert_tsv_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "#readID\tR1\nr1\tGATC\nr2\tAAAA\nr3\tCC\n").unwrap();
        let rows = convert(
            &input,
            &output,
            FormatArg::Auto,
            "csv".parse().unwrap(),
            2,
            Some("{colname}__x"),
        )
        .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "readID__x,R1__x\nr1,GATC\nr2,AAAA\nr3,CC\n"
        );
        // same format is a no-op
        let same = dir.path().join("same.tsv");
        assert_eq!(
            convert(&input, &same, FormatArg::Auto, FormatArg::Auto, 2, None).unwrap(),
            0
        );
        assert!(!same.exists());
    }

    #[test]
    fn test_dump_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        let output = dir.path().join("out.tsv");
        std::fs::write(&input, "id\tkeep\tx\na\tTrue\t1\nb\tFalse\t2\n").unwrap();
        let rows = dump(
            &input,
            &output,
            FormatArg::Auto,
            FormatArg::Auto,
            Some(&ColumnSelector::Name("keep".into())),
            Some(&ColumnSelector::parse_list("id,x")),
            1,
        )
        .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "id\tx\na\t1\n");
    }
}
