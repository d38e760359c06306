use crate::error::{Result, ToolError};
use crate::format::FormatArg;
use crate::tableio::{self, TableWriter};
use crate::table::{Column, ColumnData, ColumnSelector, DType, Table, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

/// Default number of output rows handed to the writer at once.
pub const DEFAULT_WRITE_BATCH: usize = 1_000_000;

/// Reference key -> output slots, in reference order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    keys: Vec<String>,
    slots: HashMap<String, Vec<usize>>,
}

impl ReferenceIndex {
    /// # Example
    /// ```
    /// use rnadnatools::align::ReferenceIndex;
    /// let index = ReferenceIndex::new(vec!["B".into(), "C".into(), "B".into()]);
    /// assert_eq!(index.slots("B"), Some(&[0, 2][..]));
    /// assert_eq!(index.slots("A"), None);
    /// ```
    pub fn new(keys: Vec<String>) -> ReferenceIndex {
        let mut slots: HashMap<String, Vec<usize>> = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            slots.entry(key.clone()).or_default().push(i);
        }
        ReferenceIndex { keys, slots }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn slots(&self, key: &str) -> Option<&[usize]> {
        self.slots.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

/// How to shape the aligned output.
#[derive(Debug, Clone)]
pub struct AlignOptions {
    pub key: ColumnSelector,
    pub fill_values: Vec<String>,
    pub new_colnames: Option<Vec<String>>,
    pub drop_key: bool,
    pub allow_missing: bool,
}

/// Counters reported after an alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignSummary {
    pub rows: usize,
    pub matched: usize,
    pub filled: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

impl AlignSummary {
    fn log(&self) {
        if self.duplicates > 0 {
            log::warn!(
                "{} duplicated keys in the input table, the last occurrence was kept.",
                self.duplicates
            );
        }
        log::info!(
            "Aligned {} rows: {} matched, {} filled, {} input rows not in the reference.",
            self.rows,
            self.matched,
            self.filled,
            self.dropped
        );
    }
}

/// One fill value per input column: a single value is broadcast and a
/// shorter list is cycled when it divides the column count.
/// # Example
/// ```
/// use rnadnatools::align::expand_fill_values;
/// let fill = vec!["0".to_string(), "NA".to_string()];
/// assert_eq!(expand_fill_values(&fill, 4).unwrap(), vec!["0", "NA", "0", "NA"]);
/// assert!(expand_fill_values(&fill, 3).is_err());
/// ```
pub fn expand_fill_values(fill: &[String], ncols: usize) -> Result<Vec<String>> {
    if fill.is_empty() || ncols % fill.len() != 0 {
        return Err(ToolError::schema(format!(
            "{} fill values cannot be spread over {} input columns",
            fill.len(),
            ncols
        )));
    }
    Ok(fill.iter().cycle().take(ncols).cloned().collect())
}

/// Output column names and the fill value of every input column.
struct Layout {
    key_idx: usize,
    names: Vec<String>,
    fills: Vec<Value>,
}

impl Layout {
    fn new(input_names: &[String], input_key: usize, opts: &AlignOptions) -> Result<Layout> {
        let fills = expand_fill_values(&opts.fill_values, input_names.len())?
            .into_iter()
            .map(Value::Str)
            .collect();
        let names = match &opts.new_colnames {
            Some(new) if new.len() != input_names.len() => {
                return Err(ToolError::schema(format!(
                    "{} new column names given for {} input columns [{}]",
                    new.len(),
                    input_names.len(),
                    input_names.join(", ")
                )))
            }
            Some(new) => new.clone(),
            None => input_names.to_vec(),
        };
        Ok(Layout {
            key_idx: input_key,
            names,
            fills,
        })
    }

    fn keeps(&self, j: usize, opts: &AlignOptions) -> bool {
        j != self.key_idx || !opts.drop_key
    }

    fn fill_error(&self, j: usize, dtype: DType) -> ToolError {
        ToolError::schema(format!(
            "fill value '{}' cannot be stored in column '{}' of type {}",
            self.fills[j], self.names[j], dtype
        ))
    }
}

/// Align a whole `input` table to `reference` keys.
///
/// The output has one row per reference key, in reference order. Rows of
/// `input` with a matching key fill every slot of that key, later rows
/// overwrite earlier ones. Untouched slots get the fill value cast to the
/// column type.
pub fn align_table(
    input: &Table,
    reference: &ReferenceIndex,
    opts: &AlignOptions,
) -> Result<(Table, AlignSummary)> {
    let key_idx = input.resolve(&opts.key)?;
    let layout = Layout::new(&input.column_names(), key_idx, opts)?;
    let keys = input.column_at(key_idx).data.text_values();

    let mut summary = AlignSummary {
        rows: reference.len(),
        ..Default::default()
    };
    let mut source: Vec<Option<usize>> = vec![None; reference.len()];
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        match reference.slots(key) {
            Some(slots) => {
                if seen.insert(key.as_str(), i).is_some() {
                    summary.duplicates += 1;
                }
                for &slot in slots {
                    source[slot] = Some(i);
                }
            }
            None => summary.dropped += 1,
        }
    }
    summary.matched = source.iter().filter(|s| s.is_some()).count();
    summary.filled = reference.len() - summary.matched;

    let mut columns = Vec::with_capacity(input.width());
    for (j, column) in input.columns().iter().enumerate() {
        if !layout.keeps(j, opts) {
            continue;
        }
        let data = if j == key_idx {
            ColumnData::Str(reference.keys().to_vec())
        } else {
            column
                .data
                .take_or_fill(&source, &layout.fills[j])
                .map_err(|_| layout.fill_error(j, column.dtype()))?
        };
        columns.push(Column::new(layout.names[j].clone(), data));
    }
    summary.log();
    Ok((Table::new(columns)?, summary))
}

/// Rows of the output under construction.
struct Batch {
    columns: Vec<ColumnData>,
    rows: usize,
}

impl Batch {
    fn new(dtypes: &[DType], capacity: usize) -> Batch {
        Batch {
            columns: dtypes
                .iter()
                .map(|&t| ColumnData::with_capacity(t, capacity))
                .collect(),
            rows: 0,
        }
    }

    /// Columns are promoted when a later chunk brings a wider type.
    fn push(&mut self, row: &[Value]) -> Result<()> {
        for (column, value) in self.columns.iter_mut().zip(row) {
            let dtype = column.dtype().unify(value.dtype());
            if dtype != column.dtype() {
                *column = column.cast(dtype)?;
            }
            column.push(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    fn dtypes(&self) -> Vec<DType> {
        self.columns.iter().map(|c| c.dtype()).collect()
    }

    fn into_table(self, names: &[String]) -> Result<Table> {
        Table::new(
            names
                .iter()
                .zip(self.columns)
                .map(|(n, d)| Column::new(n.clone(), d))
                .collect(),
        )
    }
}

/// Align a chunked input to `reference` keys without holding the whole input.
///
/// Input rows are only buffered when their key is still expected by the
/// reference, and are evicted once every reference occurrence of the key has
/// been written. A reference key that never shows up in the input is an
/// error unless `opts.allow_missing` is set. Output is written to `writer`
/// every `write_batch` rows.
pub fn align_chunks<I>(
    mut chunks: I,
    input_names: &[String],
    reference: &ReferenceIndex,
    opts: &AlignOptions,
    write_batch: usize,
    writer: &mut TableWriter,
) -> Result<AlignSummary>
where
    I: Iterator<Item = Result<Table>>,
{
    // column types come from the first chunk, or text for an empty input
    let first = chunks.next().transpose()?;
    let input_dtypes = first
        .as_ref()
        .map_or_else(|| vec![DType::Str; input_names.len()], |t| t.dtypes());
    let mut chunks = first.map(Ok::<Table, ToolError>).into_iter().chain(chunks);
    let key_idx = Table::empty(input_names)?.resolve(&opts.key)?;
    let layout = Layout::new(input_names, key_idx, opts)?;

    let kept: Vec<usize> = (0..input_names.len())
        .filter(|&j| layout.keeps(j, opts))
        .collect();
    let out_names: Vec<String> = kept.iter().map(|&j| layout.names[j].clone()).collect();
    let out_dtypes: Vec<DType> = kept
        .iter()
        .map(|&j| if j == key_idx { DType::Str } else { input_dtypes[j] })
        .collect();
    let fill_row: Vec<Value> = kept
        .iter()
        .map(|&j| {
            if j == key_idx {
                return Ok(Value::Str(String::new()));
            }
            layout.fills[j]
                .cast(input_dtypes[j])
                .map_err(|_| layout.fill_error(j, input_dtypes[j]))
        })
        .collect::<Result<_>>()?;

    // occurrences of each key still to be written
    let mut pending: HashMap<&str, usize> = HashMap::new();
    for key in reference.keys() {
        *pending.entry(key.as_str()).or_insert(0) += 1;
    }

    let batch_size = write_batch.max(1);
    let mut summary = AlignSummary::default();
    let mut buffer: HashMap<String, Vec<Value>> = HashMap::new();
    let mut batch = Batch::new(&out_dtypes, batch_size.min(reference.len()));
    let mut exhausted = false;

    for key in reference.keys() {
        while !buffer.contains_key(key) && !exhausted {
            match chunks.next() {
                Some(chunk) => {
                    let chunk = chunk?;
                    let chunk_keys = chunk.column_at(key_idx).data.text_values();
                    for (i, k) in chunk_keys.into_iter().enumerate() {
                        if pending.get(k.as_str()).map_or(true, |&n| n == 0) {
                            summary.dropped += 1;
                            continue;
                        }
                        let row: Vec<Value> =
                            kept.iter().map(|&j| chunk.column_at(j).data.get(i)).collect();
                        if buffer.insert(k, row).is_some() {
                            summary.duplicates += 1;
                        }
                    }
                    log::debug!("Buffered {} input rows waiting for their keys.", buffer.len());
                }
                None => exhausted = true,
            }
        }

        let remaining = match pending.get_mut(key.as_str()) {
            Some(n) => {
                *n -= 1;
                *n
            }
            None => 0,
        };
        let found = match buffer.entry(key.clone()) {
            Entry::Occupied(e) if remaining == 0 => Some(e.remove()),
            Entry::Occupied(e) => Some(e.get().clone()),
            Entry::Vacant(_) => None,
        };
        let mut row = match found {
            Some(row) => {
                summary.matched += 1;
                row
            }
            None if opts.allow_missing => {
                summary.filled += 1;
                fill_row.clone()
            }
            None => {
                return Err(ToolError::not_found(format!(
                    "reference key '{}' is not in the input table (use --allow-missing to fill it)",
                    key
                )))
            }
        };
        if let Some(pos) = kept.iter().position(|&j| j == key_idx) {
            row[pos] = Value::Str(key.clone());
        }
        batch.push(&row)?;
        summary.rows += 1;

        if batch.rows >= batch_size {
            let next = Batch::new(&batch.dtypes(), batch_size);
            let full = std::mem::replace(&mut batch, next);
            writer.write(&full.into_table(&out_names)?)?;
        }
    }
    // count what is left unread as dropped
    for chunk in chunks {
        summary.dropped += chunk?.height();
    }
    summary.dropped += buffer.len();

    if batch.rows > 0 || summary.rows == 0 {
        writer.write(&batch.into_table(&out_names)?)?;
    }
    summary.log();
    Ok(summary)
}

/// Where the tables of `table align` live.
#[derive(Debug, Clone)]
pub struct AlignFiles<'a> {
    pub input: &'a Path,
    pub reference: &'a Path,
    pub output: &'a Path,
    pub in_format: FormatArg,
    pub ref_format: FormatArg,
    pub out_format: FormatArg,
    pub input_header: bool,
    pub ref_header: bool,
}

/// Run `table align`: whole-table when `chunksize` is `None`, streaming otherwise.
pub fn run_align(
    files: &AlignFiles,
    ref_key: &ColumnSelector,
    opts: &AlignOptions,
    chunksize: Option<usize>,
    write_batch: usize,
) -> Result<AlignSummary> {
    let in_format = files.in_format.resolve(files.input)?;
    let ref_format = files.ref_format.resolve(files.reference)?;
    let out_format = files.out_format.or_same_as(in_format);

    let reference = tableio::load_table(
        files.reference,
        ref_format,
        Some(std::slice::from_ref(ref_key)),
        files.ref_header,
    )?;
    let index = ReferenceIndex::new(reference.column_at(0).data.text_values());
    log::info!(
        "Loaded {} reference keys from {}",
        index.len(),
        files.reference.display()
    );

    let mut writer = TableWriter::create(files.output, out_format)?;
    let summary = match chunksize {
        None => {
            let input = tableio::load_table(files.input, in_format, None, files.input_header)?;
            let (table, summary) = align_table(&input, &index, opts)?;
            for batch in table.chunks(write_batch) {
                writer.write(&batch)?;
            }
            if table.height() == 0 {
                writer.write(&table)?;
            }
            summary
        }
        Some(size) => {
            let reader = tableio::load(
                files.input,
                in_format,
                None,
                Some(size),
                files.input_header,
            )?;
            let names = reader.column_names().to_vec();
            align_chunks(reader, &names, &index, opts, write_batch, &mut writer)?
        }
    };
    writer.finish()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn input() -> Table {
        Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["A".into(), "B".into(), "Z".into()])),
            Column::new("n", ColumnData::Int(vec![1, 2, 9])),
        ])
        .unwrap()
    }

    fn reference() -> ReferenceIndex {
        ReferenceIndex::new(vec!["B".into(), "C".into(), "A".into()])
    }

    fn opts(drop_key: bool) -> AlignOptions {
        AlignOptions {
            key: ColumnSelector::Name("id".into()),
            fill_values: vec!["0".into()],
            new_colnames: None,
            drop_key,
            allow_missing: true,
        }
    }

    #[test]
    fn test_align_reference_order() {
        let (out, summary) = align_table(&input(), &reference(), &opts(true)).unwrap();
        assert_eq!(out.column_names(), vec!["n"]);
        assert_eq!(out.column("n").unwrap().data, ColumnData::Int(vec![2, 0, 1]));
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.filled, 1);
        assert_eq!(summary.dropped, 1);
    }

    #[test]
    fn test_align_keeps_reference_keys() {
        let (out, _) = align_table(&input(), &reference(), &opts(false)).unwrap();
        assert_eq!(
            out.column("id").unwrap().data,
            ColumnData::Str(vec!["B".into(), "C".into(), "A".into()])
        );
    }

    #[test]
    fn test_duplicate_keys() {
        let input = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["A".into(), "A".into()])),
            Column::new("x", ColumnData::Float(vec![0.5, 1.5])),
        ])
        .unwrap();
        let index = ReferenceIndex::new(vec!["A".into(), "B".into(), "A".into()]);
        let (out, summary) = align_table(&input, &index, &opts(true)).unwrap();
        assert_eq!(
            out.column("x").unwrap().data,
            ColumnData::Float(vec![1.5, 0.0, 1.5])
        );
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn test_bad_fill_and_names() {
        let mut o = opts(true);
        o.fill_values = vec!["x".into()];
        assert!(matches!(
            align_table(&input(), &reference(), &o),
            Err(ToolError::SchemaMismatch(_))
        ));
        let mut o = opts(true);
        o.new_colnames = Some(vec!["only_one".into()]);
        assert!(matches!(
            align_table(&input(), &reference(), &o),
            Err(ToolError::SchemaMismatch(_))
        ));
        let mut o = opts(true);
        o.key = ColumnSelector::Name("nope".into());
        assert!(matches!(
            align_table(&input(), &reference(), &o),
            Err(ToolError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_streaming_matches_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let table = input();
        let names = table.column_names();
        let chunks = table.chunks(1).into_iter().map(Ok);
        let mut writer = TableWriter::create(&path, Format::Tsv).unwrap();
        let summary =
            align_chunks(chunks, &names, &reference(), &opts(false), 2, &mut writer).unwrap();
        writer.finish().unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.filled, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id\tn\nB\t2\nC\t0\nA\t1\n");
    }

    #[test]
    fn test_streaming_repeated_reference_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let table = Table::new(vec![
            Column::new(
                "id",
                ColumnData::Str(vec![
                    "A".into(),
                    "X".into(),
                    "A".into(),
                    "B".into(),
                    "Y".into(),
                ]),
            ),
            Column::new("n", ColumnData::Int(vec![1, 5, 3, 2, 7])),
        ])
        .unwrap();
        let names = table.column_names();
        let index = ReferenceIndex::new(vec!["A".into(), "B".into(), "A".into()]);
        for size in [1, 2] {
            let mut writer = TableWriter::create(&path, Format::Tsv).unwrap();
            let summary = align_chunks(
                table.chunks(size).into_iter().map(Ok),
                &names,
                &index,
                &opts(false),
                2,
                &mut writer,
            )
            .unwrap();
            writer.finish().unwrap();
            // the first A slot is written before the second A row is read
            assert_eq!(
                std::fs::read_to_string(&path).unwrap(),
                "id\tn\nA\t1\nB\t2\nA\t3\n"
            );
            assert_eq!(
                summary,
                AlignSummary {
                    rows: 3,
                    matched: 3,
                    filled: 0,
                    dropped: 2,
                    duplicates: 1,
                }
            );
        }
    }

    #[test]
    fn test_streaming_promotes_types_like_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        let reference = dir.path().join("ref.tsv");
        std::fs::write(&input, "id\tn\tx\nA\t1\t1\nB\t2.5\tNA\n").unwrap();
        std::fs::write(&reference, "A\nB\n").unwrap();
        let mut outputs = Vec::new();
        for (name, chunksize) in [("whole.tsv", None), ("streamed.tsv", Some(1))] {
            let output = dir.path().join(name);
            let files = AlignFiles {
                input: &input,
                reference: &reference,
                output: &output,
                in_format: FormatArg::Auto,
                ref_format: FormatArg::Auto,
                out_format: FormatArg::Auto,
                input_header: true,
                ref_header: false,
            };
            run_align(&files, &ColumnSelector::Index(0), &opts(true), chunksize, 10).unwrap();
            outputs.push(std::fs::read_to_string(&output).unwrap());
        }
        assert_eq!(outputs[0], "n\tx\n1.0\t1\n2.5\tNA\n");
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn test_streaming_missing_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let table = input();
        let names = table.column_names();
        let mut o = opts(true);
        o.allow_missing = false;
        let mut writer = TableWriter::create(&path, Format::Tsv).unwrap();
        let res = align_chunks(
            table.chunks(2).into_iter().map(Ok),
            &names,
            &reference(),
            &o,
            10,
            &mut writer,
        );
        assert!(matches!(res, Err(ToolError::KeyNotFound(_))));
    }

    #[test]
    fn test_run_align_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        let reference = dir.path().join("ref.tsv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "id\tn\nA\t1\nB\t2\n").unwrap();
        std::fs::write(&reference, "B\nC\nA\n").unwrap();
        let files = AlignFiles {
            input: &input,
            reference: &reference,
            output: &output,
            in_format: FormatArg::Auto,
            ref_format: FormatArg::Auto,
            out_format: FormatArg::Fixed(Format::Csv),
            input_header: true,
            ref_header: false,
        };
        run_align(&files, &ColumnSelector::Index(0), &opts(true), None, 10).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "n\n2\n0\n1\n");
    }
}
