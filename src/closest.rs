use crate::error::{Result, ToolError};
use crate::format::FormatArg;
use crate::table::{Column, ColumnData, ColumnSelector, Table};
use crate::tableio::{self, TableWriter};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Distance placeholder when there is no site on one side.
pub const SENTINEL: i64 = 10_000_000_000;
/// Distances reported on chromosomes without any site.
pub const NO_SITES: i64 = -1;

pub const DEFAULT_OUTPUT_COLUMNS: [&str; 4] = ["start_left", "start_right", "end_left", "end_right"];

/// Which annotation strands to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrandFilter {
    Plus,
    Minus,
    Both,
}

impl StrandFilter {
    pub fn keeps(&self, strand: &str) -> bool {
        match self {
            StrandFilter::Plus => strand == "+",
            StrandFilter::Minus => strand == "-",
            StrandFilter::Both => true,
        }
    }
}

impl FromStr for StrandFilter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "+" => Ok(StrandFilter::Plus),
            "-" => Ok(StrandFilter::Minus),
            "b" | "both" => Ok(StrandFilter::Both),
            _ => Err(format!("unknown strand '{}', use one of: +, -, b", s)),
        }
    }
}

impl fmt::Display for StrandFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            StrandFilter::Plus => "+",
            StrandFilter::Minus => "-",
            StrandFilter::Both => "b",
        };
        write!(f, "{}", s)
    }
}

/// Index of the first element of `sorted` strictly greater than `x`.
/// # Example
/// ```
/// use rnadnatools::closest::digitize;
/// let sites = [-10, 5, 25, 40];
/// assert_eq!(digitize(10, &sites), 2);
/// assert_eq!(digitize(5, &sites), 2);
/// assert_eq!(digitize(-20, &sites), 0);
/// assert_eq!(digitize(50, &sites), 4);
/// ```
pub fn digitize(x: i64, sorted: &[i64]) -> usize {
    sorted.partition_point(|&p| p <= x)
}

/// Sorted site positions per chromosome, padded with `-SENTINEL` and `SENTINEL`.
#[derive(Debug, Clone, Default)]
pub struct SiteIndex {
    groups: HashMap<String, Vec<i64>>,
}

impl SiteIndex {
    pub fn new<I, S>(sites: I, strand: StrandFilter) -> SiteIndex
    where
        I: IntoIterator<Item = (S, i64, S)>,
        S: AsRef<str>,
    {
        let mut groups: HashMap<String, Vec<i64>> = HashMap::new();
        for (chrom, pos, site_strand) in sites {
            if strand.keeps(site_strand.as_ref()) {
                groups
                    .entry(chrom.as_ref().to_string())
                    .or_insert_with(|| vec![-SENTINEL])
                    .push(pos);
            }
        }
        for positions in groups.values_mut() {
            positions.sort_unstable();
            positions.push(SENTINEL);
        }
        SiteIndex { groups }
    }

    /// Build from a `chrom, position, strand` table.
    pub fn from_table(sites: &Table, strand: StrandFilter) -> Result<SiteIndex> {
        if sites.width() != 3 {
            return Err(ToolError::config(format!(
                "site table needs chrom, position and strand columns, got [{}]",
                sites.column_names().join(", ")
            )));
        }
        let chroms = sites.column_at(0).data.text_values();
        let positions = int_values(sites.column_at(1))?;
        let strands = sites.column_at(2).data.text_values();
        let index = SiteIndex::new(
            chroms
                .iter()
                .zip(positions)
                .zip(strands.iter())
                .map(|((c, p), s)| (c.as_str(), p, s.as_str())),
            strand,
        );
        log::info!(
            "Indexed {} sites on {} chromosomes (strand {})",
            index.n_sites(),
            index.groups.len(),
            strand
        );
        Ok(index)
    }

    pub fn n_sites(&self) -> usize {
        self.groups.values().map(|g| g.len() - 2).sum()
    }

    /// `(left, right)` signed distances from `pos` to the nearest sites at or
    /// before and strictly after it. `None` when the chromosome has no sites.
    /// # Example
    /// ```
    /// use rnadnatools::closest::{SiteIndex, StrandFilter};
    /// let index = SiteIndex::new(vec![("chr1", 25, "+"), ("chr1", 5, "+")], StrandFilter::Plus);
    /// assert_eq!(index.distances("chr1", 10), Some((-5, 15)));
    /// assert_eq!(index.distances("chr2", 10), None);
    /// ```
    pub fn distances(&self, chrom: &str, pos: i64) -> Option<(i64, i64)> {
        let sites = self.groups.get(chrom)?;
        let idx = digitize(pos, sites);
        // the sentinels keep idx within 1..len for every real position
        let left = sites[idx.saturating_sub(1)];
        let right = sites[idx.min(sites.len() - 1)];
        Some((left - pos, right - pos))
    }
}

/// Integer view of a column; text and integral floats are accepted.
fn int_values(column: &Column) -> Result<Vec<i64>> {
    let bad = |raw: String| {
        ToolError::schema(format!(
            "column '{}' holds '{}', expected integer positions",
            column.name, raw
        ))
    };
    match &column.data {
        ColumnData::Int(v) => Ok(v.clone()),
        ColumnData::Float(v) => v
            .iter()
            .map(|&x| {
                if x.is_finite() && x.fract() == 0.0 {
                    Ok(x as i64)
                } else {
                    Err(bad(x.to_string()))
                }
            })
            .collect(),
        ColumnData::Str(v) => v
            .iter()
            .map(|s| s.trim().parse::<i64>().map_err(|_| bad(s.clone())))
            .collect(),
        ColumnData::Bool(_) => Err(bad(column.data.format(0))),
    }
}

/// Four distance columns for a `chrom, start, end` table.
pub fn closest_distances(intervals: &Table, index: &SiteIndex, names: &[String]) -> Result<Table> {
    if intervals.width() != 3 || names.len() != 4 {
        return Err(ToolError::config(format!(
            "expected 3 interval columns and 4 output names, got [{}] and [{}]",
            intervals.column_names().join(", "),
            names.join(", ")
        )));
    }
    let chroms = intervals.column_at(0).data.text_values();
    let starts = int_values(intervals.column_at(1))?;
    let ends = int_values(intervals.column_at(2))?;

    let n = intervals.height();
    let mut out: [Vec<i64>; 4] = Default::default();
    for v in out.iter_mut() {
        v.reserve(n);
    }
    for i in 0..n {
        let (sl, sr, el, er) = match (
            index.distances(&chroms[i], starts[i]),
            index.distances(&chroms[i], ends[i]),
        ) {
            (Some((sl, sr)), Some((el, er))) => (sl, sr, el, er),
            _ => (NO_SITES, NO_SITES, NO_SITES, NO_SITES),
        };
        out[0].push(sl);
        out[1].push(sr);
        out[2].push(el);
        out[3].push(er);
    }
    Table::new(
        names
            .iter()
            .zip(out)
            .map(|(name, v)| Column::new(name.clone(), ColumnData::Int(v)))
            .collect(),
    )
}

/// Where the tables of `segment find-closest` live.
#[derive(Debug, Clone)]
pub struct ClosestFiles<'a> {
    pub input: &'a Path,
    pub reference: &'a Path,
    pub output: &'a Path,
    pub in_format: FormatArg,
    pub ref_format: FormatArg,
    pub out_format: FormatArg,
    pub input_header: bool,
    pub ref_header: bool,
}

/// Run `segment find-closest`, streaming the interval table in chunks.
/// Returns the number of intervals written.
/// # Example
/// ```
/// use rnadnatools::closest::*;
/// use rnadnatools::format::FormatArg;
/// use rnadnatools::table::ColumnSelector;
/// use std::path::Path;
/// let files = ClosestFiles {
///     input: Path::new(".test/fragments.tsv"),
///     reference: Path::new(".test/sites.tsv"),
///     output: Path::new("-"),
///     in_format: FormatArg::Auto,
///     ref_format: FormatArg::Auto,
///     out_format: FormatArg::Auto,
///     input_header: true,
///     ref_header: true,
/// };
/// let names: Vec<String> = DEFAULT_OUTPUT_COLUMNS.iter().map(|s| s.to_string()).collect();
/// let n = run_find_closest(
///     &files,
///     &ColumnSelector::parse_list("chrom,start,end"),
///     &ColumnSelector::parse_list("chrom,start,strand"),
///     StrandFilter::Both,
///     &names,
///     2,
/// )
/// .unwrap();
/// assert_eq!(n, 3);
/// ```
pub fn run_find_closest(
    files: &ClosestFiles,
    key_columns: &[ColumnSelector],
    ref_columns: &[ColumnSelector],
    strand: StrandFilter,
    output_columns: &[String],
    chunksize: usize,
) -> Result<usize> {
    if key_columns.len() != 3 {
        return Err(ToolError::config(
            "Please, provide 3 input columns for chrom, start, end.",
        ));
    }
    if ref_columns.len() != 3 {
        return Err(ToolError::config(
            "Please, provide 3 reference columns for chrom, start, strand.",
        ));
    }
    if output_columns.len() != 4 {
        return Err(ToolError::config(format!(
            "Provide 4 output colnames, not: [{}].",
            output_columns.join(", ")
        )));
    }
    let in_format = files.in_format.resolve(files.input)?;
    let ref_format = files.ref_format.resolve(files.reference)?;
    let out_format = files.out_format.or_same_as(in_format);

    let sites = tableio::load_table(
        files.reference,
        ref_format,
        Some(ref_columns),
        files.ref_header,
    )?;
    let index = SiteIndex::from_table(&sites, strand)?;
    drop(sites);

    let reader = tableio::load(
        files.input,
        in_format,
        Some(key_columns),
        Some(chunksize),
        files.input_header,
    )?;
    let mut writer = TableWriter::create(files.output, out_format)?;
    let mut written = 0;
    for chunk in reader {
        let distances = closest_distances(&chunk?, &index, output_columns)?;
        writer.write(&distances)?;
        written += distances.height();
    }
    if written == 0 {
        writer.write(&closest_distances(
            &Table::new(vec![
                Column::new("chrom", ColumnData::Str(vec![])),
                Column::new("start", ColumnData::Int(vec![])),
                Column::new("end", ColumnData::Int(vec![])),
            ])?,
            &index,
            output_columns,
        )?)?;
    }
    writer.finish()?;
    log::info!("Wrote distances for {} intervals", written);
    Ok(written)
}
