use crate::error::{Result, ToolError};
use crate::evaluate::Evaluator;
use crate::expr;
use crate::format::FormatArg;
use crate::myio;
use crate::table::{ColumnData, DType, Table};
use crate::tableio;
use needletail::parser::{write_fastq, LineEnding};
use std::io::Write;
use std::path::Path;

/// Column names holding the parts of a FASTQ record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqKeys {
    pub readid: String,
    pub seq: String,
    pub qual: String,
    pub start: String,
    pub end: String,
}

impl Default for FastqKeys {
    fn default() -> Self {
        FastqKeys {
            readid: "readID".to_string(),
            seq: "R1".to_string(),
            qual: "Q1".to_string(),
            start: "dna_start".to_string(),
            end: "dna_end".to_string(),
        }
    }
}

/// Byte range of `seq[start:end]` for a sequence of length `len`.
/// Negative bounds count from the end, out of range bounds are clamped.
/// # Example
/// ```
/// use rnadnatools::fastq::slice_bounds;
/// assert_eq!(slice_bounds(10, 2, 5), (2, 5));
/// assert_eq!(slice_bounds(10, 4, 100), (4, 10));
/// assert_eq!(slice_bounds(10, -3, 10), (7, 10));
/// assert_eq!(slice_bounds(10, 6, 2), (6, 6));
/// ```
pub fn slice_bounds(len: usize, start: i64, end: i64) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { i + len as i64 } else { i };
        i.clamp(0, len as i64) as usize
    };
    let (s, e) = (clamp(start), clamp(end));
    (s, e.max(s))
}

fn positions(name: &str, data: &ColumnData) -> Result<Vec<i64>> {
    match data.cast(DType::Int) {
        Ok(ColumnData::Int(v)) => Ok(v),
        _ => Err(ToolError::schema(format!(
            "column {} of type {} cannot be used as a slice position",
            name,
            data.dtype()
        ))),
    }
}

/// Write the selected rows of `tables` as FASTQ records. Returns the number of records.
pub fn write_records<W: Write>(
    tables: &[Table],
    keys: &FastqKeys,
    selection: Option<&str>,
    out: &mut W,
) -> Result<usize> {
    let evaluator = Evaluator::new(tables);
    let ids = evaluator.lookup(&keys.readid)?.text_values();
    let seqs = evaluator.lookup(&keys.seq)?.text_values();
    let quals = evaluator.lookup(&keys.qual)?.text_values();
    let starts = positions(&keys.start, evaluator.lookup(&keys.start)?)?;
    let ends = positions(&keys.end, evaluator.lookup(&keys.end)?)?;
    let lengths = [
        (&keys.seq, seqs.len()),
        (&keys.qual, quals.len()),
        (&keys.start, starts.len()),
        (&keys.end, ends.len()),
    ];
    for (name, len) in lengths {
        if len != ids.len() {
            return Err(ToolError::schema(format!(
                "column {} has {} rows but {} has {}",
                name,
                len,
                keys.readid,
                ids.len()
            )));
        }
    }

    let mask: Vec<bool> = match selection {
        Some(src) => {
            let data = evaluator.evaluate(&expr::parse(src)?)?;
            if data.len() != ids.len() {
                return Err(ToolError::schema(format!(
                    "selection has {} values for {} reads",
                    data.len(),
                    ids.len()
                )));
            }
            (0..data.len()).map(|i| data.get(i).is_truthy()).collect()
        }
        None => vec![true; ids.len()],
    };

    let mut written = 0;
    for (i, keep) in mask.into_iter().enumerate() {
        if !keep {
            continue;
        }
        let seq = seqs[i].as_bytes();
        let qual = quals[i].as_bytes();
        let (s, e) = slice_bounds(seq.len(), starts[i], ends[i]);
        let (qs, qe) = slice_bounds(qual.len(), starts[i], ends[i]);
        let id = ids[i].strip_prefix('@').unwrap_or(&ids[i]);
        write_fastq(
            id.as_bytes(),
            &seq[s..e],
            Some(&qual[qs..qe]),
            out,
            LineEnding::Unix,
        )?;
        written += 1;
    }
    Ok(written)
}

/// Run `segment extract-fastq`.
pub fn extract_fastq<P: AsRef<Path>>(
    output: &Path,
    inputs: &[P],
    in_format: FormatArg,
    selection: Option<&str>,
    keys: &FastqKeys,
) -> Result<usize> {
    let tables = tableio::load_tables(inputs, in_format)?;
    let mut out = myio::writer(output)?;
    let written = write_records(&tables, keys, selection, &mut out)?;
    out.finish()?;
    log::info!(
        "Done writing {} sequences into {}",
        written,
        output.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn tables() -> Vec<Table> {
        vec![
            Table::new(vec![
                Column::new(
                    "readID",
                    ColumnData::Str(vec!["@r1".into(), "@r2".into(), "r3".into()]),
                ),
                Column::new(
                    "R1",
                    ColumnData::Str(vec!["GATCAAGG".into(), "TTGA".into(), "CCCC".into()]),
                ),
                Column::new(
                    "Q1",
                    ColumnData::Str(vec!["ABCDEFGH".into(), "IIII".into(), "JJJJ".into()]),
                ),
            ])
            .unwrap(),
            Table::new(vec![
                Column::new("dna_start", ColumnData::Int(vec![2, 0, 1])),
                Column::new("dna_end", ColumnData::Float(vec![6.0, 100.0, 3.0])),
            ])
            .unwrap(),
        ]
    }

    #[test]
    fn test_write_all() {
        let mut out = Vec::new();
        let n = write_records(&tables(), &FastqKeys::default(), None, &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "@r1\nTCAA\n+\nCDEF\n@r2\nTTGA\n+\nIIII\n@r3\nCC\n+\nJJ\n"
        );
    }

    #[test]
    fn test_selection() {
        let mut out = Vec::new();
        let n = write_records(
            &tables(),
            &FastqKeys::default(),
            Some("dna_end - dna_start > 3"),
            &mut out,
        )
        .unwrap();
        assert_eq!(n, 2);
        assert!(String::from_utf8(out).unwrap().starts_with("@r1\nTCAA\n"));
    }

    #[test]
    fn test_missing_key() {
        let keys = FastqKeys {
            qual: "Q2".to_string(),
            ..FastqKeys::default()
        };
        let mut out = Vec::new();
        assert!(matches!(
            write_records(&tables(), &keys, None, &mut out),
            Err(ToolError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_columns_of_different_lengths() {
        let tables = vec![
            Table::new(vec![
                Column::new("readID", ColumnData::Str(vec!["r1".into(), "r2".into()])),
                Column::new("dna_start", ColumnData::Int(vec![0, 0])),
                Column::new("dna_end", ColumnData::Int(vec![2, 2])),
            ])
            .unwrap(),
            Table::new(vec![
                Column::new("R1", ColumnData::Str(vec!["ACGT".into()])),
                Column::new("Q1", ColumnData::Str(vec!["IIII".into()])),
            ])
            .unwrap(),
        ];
        let mut out = Vec::new();
        assert!(matches!(
            write_records(&tables, &FastqKeys::default(), None, &mut out),
            Err(ToolError::SchemaMismatch(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.tsv");
        let output = dir.path().join("reads.fq");
        std::fs::write(
            &input,
            "readID\tR1\tQ1\tdna_start\tdna_end\n@a\tACGTACGT\tIIIIIIII\t4\t8\n",
        )
        .unwrap();
        let n = extract_fastq(
            &output,
            &[&input],
            FormatArg::Auto,
            None,
            &FastqKeys::default(),
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "@a\nACGT\n+\nIIII\n"
        );
    }
}
