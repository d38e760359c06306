use crate::error::{Result, ToolError};
use crate::myio;
use crate::table::{ColumnSelector, DType, Value};
use std::io::{BufRead, Write};
use std::path::Path;

/// The oligo to look for and where to look for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OligoCheck {
    pub oligo: String,
    pub name: String,
    pub shift: i64,
}

impl OligoCheck {
    pub fn new(oligo: &str, name: Option<&str>, shift: i64) -> OligoCheck {
        OligoCheck {
            oligo: oligo.to_string(),
            name: name.unwrap_or(oligo).to_string(),
            shift,
        }
    }

    pub fn header(&self) -> String {
        format!(
            "#entry_index_{}\toligo_{}_at_{}",
            self.name, self.name, self.shift
        )
    }

    /// True when the oligo is found exactly at `position + shift` of `read`.
    /// # Example
    /// ```
    /// use rnadnatools::nucleotides::OligoCheck;
    /// let check = OligoCheck::new("GA", None, 2);
    /// assert!(check.matches("TTTGAC", 1));
    /// assert!(!check.matches("TTTGAC", 0));
    /// assert!(!check.matches("TTTGAC", 4));
    /// ```
    pub fn matches(&self, read: &str, position: i64) -> bool {
        let start = position + self.shift;
        let end = start + self.oligo.len() as i64;
        if start < 0 || end > read.len() as i64 {
            return false;
        }
        read.as_bytes()[start as usize..end as usize] == *self.oligo.as_bytes()
    }
}

/// Where to find the read id and sequence in the read table, and the
/// oligo position in the hit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadColumns {
    pub readid: ColumnSelector,
    pub seq: ColumnSelector,
    pub reference: ColumnSelector,
}

/// Whitespace separated names of the first line, without the leading `#`.
fn header_names(path: &Path) -> Result<Vec<String>> {
    let mut line = String::new();
    myio::reader(path)?.read_line(&mut line)?;
    let line = line.trim();
    let fields = match line.strip_prefix('#') {
        Some(rest) => rest,
        None => {
            log::warn!(
                "Are you sure {} has a header? Header line does not start with '#'.",
                path.display()
            );
            line
        }
    };
    Ok(fields.split_whitespace().map(str::to_string).collect())
}

fn resolve_index(selector: &ColumnSelector, header: &[String], path: &Path) -> Result<usize> {
    match selector {
        ColumnSelector::Index(i) => Ok(*i),
        ColumnSelector::Name(name) => {
            let mut hits = header.iter().enumerate().filter(|(_, h)| *h == name);
            let first = hits.next().map(|(i, _)| i).ok_or_else(|| {
                ToolError::not_found(format!(
                    "column '{}' not found in {}, available: [{}]",
                    name,
                    path.display(),
                    header.join(", ")
                ))
            })?;
            if hits.next().is_some() {
                log::warn!("Multiple {} columns in {}", name, path.display());
            }
            Ok(first)
        }
    }
}

fn field<'a>(fields: &[&'a str], idx: usize, lineno: usize, path: &Path) -> Result<&'a str> {
    fields.get(idx).copied().ok_or_else(|| {
        ToolError::schema(format!(
            "line {} of {} has {} fields, column #{} requested",
            lineno,
            path.display(),
            fields.len(),
            idx
        ))
    })
}

/// Oligo start; `None` for a missing (NaN) position.
fn position(raw: &str) -> Result<Option<i64>> {
    match Value::parse(raw, DType::Int) {
        Ok(Value::Int(p)) => Ok(Some(p)),
        _ if raw.trim().parse::<f64>().map_or(false, f64::is_nan) => Ok(None),
        _ => Err(ToolError::schema(format!(
            "oligo position '{}' is not an integer",
            raw
        ))),
    }
}

/// Lines of `path` after the header. The first line is skipped when it
/// starts with `#` or when column names were read from it.
fn data_lines(path: &Path, named: bool) -> Result<impl Iterator<Item = std::io::Result<String>>> {
    let mut lines = myio::reader(path)?.lines().peekable();
    if let Some(Ok(first)) = lines.peek() {
        if first.starts_with('#') || named {
            lines.next();
        }
    }
    Ok(lines)
}

/// Run `read check-nucleotides`. Returns the number of checked reads.
/// # Example
/// ```
/// use rnadnatools::nucleotides::*;
/// use rnadnatools::table::ColumnSelector;
/// use std::path::Path;
/// let columns = ReadColumns {
///     readid: ColumnSelector::Name("readID".into()),
///     seq: ColumnSelector::Name("R1".into()),
///     reference: ColumnSelector::Index(1),
/// };
/// let n = check_nucleotides(
///     Path::new(".test/reads.tsv"),
///     Path::new(".test/hits.tsv"),
///     Path::new("-"),
///     &columns,
///     &OligoCheck::new("GA", Some("bridge"), 2),
/// )
/// .unwrap();
/// assert_eq!(n, 3);
/// ```
pub fn check_nucleotides(
    reads: &Path,
    hits: &Path,
    output: &Path,
    columns: &ReadColumns,
    check: &OligoCheck,
) -> Result<usize> {
    let reads_named = matches!(columns.readid, ColumnSelector::Name(_))
        || matches!(columns.seq, ColumnSelector::Name(_));
    let hits_named = matches!(columns.reference, ColumnSelector::Name(_));
    let reads_header = if reads_named {
        header_names(reads)?
    } else {
        Vec::new()
    };
    let hits_header = if hits_named {
        header_names(hits)?
    } else {
        Vec::new()
    };
    let readid_col = resolve_index(&columns.readid, &reads_header, reads)?;
    let seq_col = resolve_index(&columns.seq, &reads_header, reads)?;
    let ref_col = resolve_index(&columns.reference, &hits_header, hits)?;
    log::debug!(
        "read id column #{}, sequence column #{}, position column #{}",
        readid_col,
        seq_col,
        ref_col
    );

    let mut out = myio::writer(output)?;
    writeln!(out, "{}", check.header())?;

    let mut hit_lines = data_lines(hits, hits_named)?;
    let mut checked = 0;
    let mut found = 0;
    for (lineno, read_line) in data_lines(reads, reads_named)?.enumerate() {
        let read_line = read_line?;
        let hit_line = hit_lines.next().transpose()?.ok_or_else(|| {
            ToolError::schema(format!(
                "{} has fewer rows than {}",
                hits.display(),
                reads.display()
            ))
        })?;
        let read_fields: Vec<&str> = read_line.split_whitespace().collect();
        let hit_fields: Vec<&str> = hit_line.split_whitespace().collect();

        let idx = field(&read_fields, readid_col, lineno + 1, reads)?;
        let seq = field(&read_fields, seq_col, lineno + 1, reads)?;
        let hit = match position(field(&hit_fields, ref_col, lineno + 1, hits)?)? {
            Some(pos) => check.matches(seq, pos),
            None => false,
        };
        writeln!(out, "{}\t{}", idx, hit as u8)?;
        checked += 1;
        found += hit as usize;
    }
    out.finish()?;
    log::info!(
        "Found {} at shift {} in {} of {} reads",
        check.oligo,
        check.shift,
        found,
        checked
    );
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_bounds() {
        let check = OligoCheck::new("GA", Some("bridge"), -1);
        assert_eq!(check.header(), "#entry_index_bridge\toligo_bridge_at_-1");
        assert!(check.matches("GAT", 1));
        assert!(!check.matches("GAT", 0));
        assert!(!check.matches("TTG", 3));
    }

    #[test]
    fn test_check_files() {
        let dir = tempfile::tempdir().unwrap();
        let reads = dir.path().join("reads.tsv");
        let hits = dir.path().join("hits.tsv");
        let output = dir.path().join("out.tsv");
        std::fs::write(
            &reads,
            "#readID\tR1\nr1\tAAAAGACC\nr2\tAAAAGTCC\nr3\tGA\n",
        )
        .unwrap();
        std::fs::write(&hits, "#readID\tstart_hit\nr1\t2\nr2\t2\nr3\tnan\n").unwrap();
        let columns = ReadColumns {
            readid: ColumnSelector::Name("readID".into()),
            seq: ColumnSelector::Name("R1".into()),
            reference: ColumnSelector::Name("start_hit".into()),
        };
        let n = check_nucleotides(
            &reads,
            &hits,
            &output,
            &columns,
            &OligoCheck::new("GA", None, 2),
        )
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "#entry_index_GA\toligo_GA_at_2\nr1\t1\nr2\t0\nr3\t0\n"
        );
    }

    #[test]
    fn test_by_index_and_short_hits() {
        let dir = tempfile::tempdir().unwrap();
        let reads = dir.path().join("reads.tsv");
        let hits = dir.path().join("hits.tsv");
        let output = dir.path().join("out.tsv");
        std::fs::write(&reads, "r1 GATC\nr2 GATC\n").unwrap();
        std::fs::write(&hits, "0\n").unwrap();
        let columns = ReadColumns {
            readid: ColumnSelector::Index(0),
            seq: ColumnSelector::Index(1),
            reference: ColumnSelector::Index(0),
        };
        let result = check_nucleotides(
            &reads,
            &hits,
            &output,
            &columns,
            &OligoCheck::new("GA", None, 0),
        );
        assert!(matches!(result, Err(ToolError::SchemaMismatch(_))));

        let missing = ReadColumns {
            readid: ColumnSelector::Name("nope".into()),
            ..columns
        };
        assert!(matches!(
            check_nucleotides(&reads, &hits, &output, &missing, &OligoCheck::new("GA", None, 0)),
            Err(ToolError::KeyNotFound(_))
        ));
    }
}
