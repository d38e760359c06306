use crate::error::Result;
use crate::format::{Format, FormatArg};
use crate::myio;
use crate::table::{ColumnSelector, Table};
use crate::tableio::{self, TableWriter};
use num_format::{Locale, ToFormattedString};
use std::io::Write;
use std::path::Path;

/// Number of values per column that are not `False`/`0`, accumulated over chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TruthyCounts {
    pub names: Vec<String>,
    pub counts: Vec<usize>,
}

impl TruthyCounts {
    pub fn add(&mut self, chunk: &Table) {
        if self.names.is_empty() {
            self.names = chunk.column_names();
            self.counts = vec![0; chunk.width()];
        }
        for (count, column) in self.counts.iter_mut().zip(chunk.columns()) {
            *count += column.data.truthy_count();
        }
    }

    /// `name<TAB>count` lines, no header.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for (name, count) in self.names.iter().zip(&self.counts) {
            writeln!(out, "{}\t{}", name, count)?;
        }
        Ok(())
    }
}

/// Run `table stats`.
pub fn stats(
    input: &Path,
    output: &Path,
    in_format: FormatArg,
    columns: Option<&[ColumnSelector]>,
    chunksize: usize,
) -> Result<TruthyCounts> {
    let mut counts = TruthyCounts::default();
    if let Some(sels) = columns {
        if sels.is_empty() {
            log::warn!("No columns selected. Nothing to be written. Exit.");
            return Ok(counts);
        }
    }
    let format = in_format.resolve(input)?;
    let reader = tableio::load(input, format, columns, Some(chunksize), true)?;
    let names = reader.column_names().to_vec();
    for chunk in reader {
        counts.add(&chunk?);
    }
    if counts.names.is_empty() {
        counts.counts = vec![0; names.len()];
        counts.names = names;
    }
    let mut out = myio::writer(output)?;
    counts.write(&mut out)?;
    out.finish()?;
    log::info!(
        "Counted true values in {} columns of {}",
        counts.names.len(),
        input.display()
    );
    Ok(counts)
}

/// Run `table wc`: the number of rows in the table.
pub fn count_rows(input: &Path, in_format: FormatArg) -> Result<usize> {
    let format = in_format.resolve(input)?;
    let mut rows = 0;
    for chunk in tableio::load(input, format, None, Some(tableio::DEFAULT_CHUNKSIZE), true)? {
        rows += chunk?.height();
    }
    log::debug!(
        "{} has {} rows",
        input.display(),
        rows.to_formatted_string(&Locale::en)
    );
    Ok(rows)
}

/// The first `nrows` rows of a table.
pub fn head(input: &Path, in_format: FormatArg, nrows: usize) -> Result<Table> {
    let format = in_format.resolve(input)?;
    let mut reader = tableio::load(input, format, None, Some(nrows.max(1)), true)?;
    let first = match reader.next() {
        Some(chunk) => chunk?,
        None => Table::empty(reader.column_names())?,
    };
    Ok(first.slice(0, nrows))
}

/// Run `table head`, printing the rows as TSV to stdout.
pub fn print_head(input: &Path, in_format: FormatArg, nrows: usize) -> Result<()> {
    let table = head(input, in_format, nrows)?;
    let mut writer = TableWriter::create("-", Format::Tsv)?;
    writer.write(&table)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_input(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("filters.tsv");
        std::fs::write(
            &path,
            "readID\tis_dna\tis_rna\tscore\nr1\tTrue\tFalse\t0\nr2\tTrue\tTrue\t2\nr3\tFalse\tFalse\t0\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_stats() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let output = dir.path().join("stats.tsv");
        let counts = stats(&input, &output, FormatArg::Auto, None, 2).unwrap();
        assert_eq!(counts.counts, vec![3, 2, 1, 1]);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "readID\t3\nis_dna\t2\nis_rna\t1\nscore\t1\n"
        );
        let some = stats(
            &input,
            &output,
            FormatArg::Auto,
            Some(&ColumnSelector::parse_list("is_rna")),
            2,
        )
        .unwrap();
        assert_eq!(some.names, vec!["is_rna"]);
        assert_eq!(some.counts, vec![1]);
    }

    #[test]
    fn test_wc_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        assert_eq!(count_rows(&input, FormatArg::Auto).unwrap(), 3);
        let top = head(&input, FormatArg::Auto, 2).unwrap();
        assert_eq!(top.height(), 2);
        assert_eq!(top.width(), 4);
        let all = head(&input, FormatArg::Auto, 10).unwrap();
        assert_eq!(all.height(), 3);
    }
}
