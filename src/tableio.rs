use crate::error::{Result, ToolError};
use crate::format::{Format, FormatArg};
#[cfg(feature = "hdf5")]
use crate::h5;
use crate::myio;
use crate::parquet::{self, ParquetSink};
use crate::table::{Column, ColumnData, ColumnSelector, DType, Table};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Default number of rows per chunk when streaming a table.
pub const DEFAULT_CHUNKSIZE: usize = 1_000_000;

#[cfg(not(feature = "hdf5"))]
fn hdf5_unsupported(path: &Path) -> ToolError {
    ToolError::UnsupportedFormat(format!(
        "cannot read or write the HDF5 table {}, rebuild with --features hdf5",
        path.display()
    ))
}

/// Make header names unique the way pandas does: `a, a.1, a.2`.
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}.{}", name, *count - 1)
            }
        })
        .collect()
}

enum Source {
    Text(csv::StringRecordsIntoIter<Box<dyn BufRead>>),
    Chunks(std::vec::IntoIter<Table>),
}

/// Stream of tables read from one file, at most `chunksize` rows each.
pub struct TableReader {
    source: Source,
    path: PathBuf,
    chunksize: usize,
    /// positions of the selected columns in the file
    selected: Vec<usize>,
    names: Vec<String>,
    /// types fixed by the first text chunk
    dtypes: Option<Vec<DType>>,
    line: usize,
}

/// Open `path` as a stream of tables.
///
/// `columns` restricts (and orders) the returned columns, `chunksize` bounds
/// the rows per table (`None` reads everything at once), and `header` tells
/// whether a TSV/CSV file starts with a header line. Headerless files name
/// their columns `0, 1, 2, ...`.
pub fn load<P: AsRef<Path>>(
    path: P,
    format: Format,
    columns: Option<&[ColumnSelector]>,
    chunksize: Option<usize>,
    header: bool,
) -> Result<TableReader> {
    let path = path.as_ref();
    let chunksize = chunksize.unwrap_or(usize::MAX).max(1);
    match format {
        Format::Tsv | Format::Csv => {
            let delimiter = format.delimiter().unwrap_or(b'\t');
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .has_headers(header)
                .from_reader(myio::reader(path)?);
            let first = rdr.headers()?.clone();
            let all_names: Vec<String> = if header {
                dedup_names(first.iter().map(|s| s.to_string()).collect())
            } else {
                (0..first.len()).map(|i| i.to_string()).collect()
            };
            let (selected, names) = select_names(&all_names, columns)?;
            log::debug!(
                "Reading {} columns [{}] from {} as {}",
                names.len(),
                names.join(", "),
                path.display(),
                format
            );
            Ok(TableReader {
                source: Source::Text(rdr.into_records()),
                path: path.to_path_buf(),
                chunksize,
                selected,
                names,
                dtypes: None,
                line: if header { 1 } else { 0 },
            })
        }
        Format::Parquet => in_memory(parquet::read_parquet(path)?, path, columns, chunksize),
        #[cfg(feature = "hdf5")]
        Format::Hdf5 => in_memory(h5::read_hdf5(path)?, path, columns, chunksize),
        #[cfg(not(feature = "hdf5"))]
        Format::Hdf5 => Err(hdf5_unsupported(path)),
    }
}

/// Serve a table already read whole as chunks.
fn in_memory(
    mut table: Table,
    path: &Path,
    columns: Option<&[ColumnSelector]>,
    chunksize: usize,
) -> Result<TableReader> {
    if let Some(columns) = columns {
        table = table.select(columns)?;
    }
    let names = table.column_names();
    let chunks = if table.height() == 0 {
        vec![]
    } else {
        table.chunks(chunksize)
    };
    Ok(TableReader {
        source: Source::Chunks(chunks.into_iter()),
        path: path.to_path_buf(),
        chunksize,
        selected: (0..names.len()).collect(),
        names,
        dtypes: None,
        line: 0,
    })
}

fn select_names(
    all_names: &[String],
    columns: Option<&[ColumnSelector]>,
) -> Result<(Vec<usize>, Vec<String>)> {
    let selectors = match columns {
        None => return Ok(((0..all_names.len()).collect(), all_names.to_vec())),
        Some(s) => s,
    };
    // zero-row table only used to resolve the selectors
    let header = Table::empty(all_names)?;
    let selected = selectors
        .iter()
        .map(|s| header.resolve(s))
        .collect::<Result<Vec<_>>>()?;
    let names = selected.iter().map(|&i| all_names[i].clone()).collect();
    Ok((selected, names))
}

impl TableReader {
    /// Names of the columns every chunk will have.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    fn next_text_chunk(&mut self) -> Result<Option<Table>> {
        let records = match &mut self.source {
            Source::Text(records) => records,
            Source::Chunks(_) => return Ok(None),
        };
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); self.selected.len()];
        let mut n = 0;
        while n < self.chunksize {
            let record = match records.next() {
                Some(r) => r?,
                None => break,
            };
            self.line += 1;
            for (cells, &i) in raw.iter_mut().zip(&self.selected) {
                let cell = record.get(i).ok_or_else(|| {
                    ToolError::schema(format!(
                        "line {} of {} has {} fields, expected at least {}",
                        self.line,
                        self.path.display(),
                        record.len(),
                        i + 1
                    ))
                })?;
                cells.push(cell.to_string());
            }
            n += 1;
        }
        if n == 0 {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(raw.len());
        for (j, cells) in raw.into_iter().enumerate() {
            let data = match &self.dtypes {
                Some(dtypes) => ColumnData::parse_as(&cells, dtypes[j]).unwrap_or_else(|_| {
                    log::warn!(
                        "Column '{}' of {} no longer parses as {} near line {}, inferring its type again.",
                        self.names[j],
                        self.path.display(),
                        dtypes[j],
                        self.line
                    );
                    ColumnData::infer(&cells)
                }),
                None => ColumnData::infer(&cells),
            };
            columns.push(Column::new(self.names[j].clone(), data));
        }
        let table = Table::new(columns)?;
        if self.dtypes.is_none() {
            self.dtypes = Some(table.dtypes());
        }
        log::trace!("Read chunk of {} rows from {}", n, self.path.display());
        Ok(Some(table))
    }

    /// Concatenate every remaining chunk into one table.
    pub fn read_all(self) -> Result<Table> {
        let names = self.names.clone();
        let mut all = Table::default();
        for chunk in self {
            all.vstack(&chunk?)?;
        }
        if all.width() == 0 {
            // no rows at all, keep the header
            all = Table::empty(&names)?;
        }
        Ok(all)
    }
}

impl Iterator for TableReader {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Source::Chunks(chunks) = &mut self.source {
            return chunks.next().map(Ok);
        }
        self.next_text_chunk().transpose()
    }
}

/// Read a whole table into memory.
pub fn load_table<P: AsRef<Path>>(
    path: P,
    format: Format,
    columns: Option<&[ColumnSelector]>,
    header: bool,
) -> Result<Table> {
    load(path, format, columns, None, header)?.read_all()
}

/// Load several tables (with headers) fully into memory, guessing each
/// format separately when `format` is `AUTO`.
pub fn load_tables<P: AsRef<Path>>(paths: &[P], format: FormatArg) -> Result<Vec<Table>> {
    if paths.len() > 1 {
        log::info!(
            "Loading {} tables into memory, might result in RAM overload!",
            paths.len()
        );
    }
    paths
        .iter()
        .map(|p| load_table(p, format.resolve(p)?, None, true))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Append,
}

enum Sink {
    Text {
        writer: csv::Writer<myio::Writer>,
        header_written: bool,
    },
    Parquet {
        sink: ParquetSink,
        dtypes: Option<Vec<DType>>,
        names: Vec<String>,
    },
    /// HDF5 datasets cannot grow here, batches are gathered and written on finish
    #[cfg(feature = "hdf5")]
    Hdf5 { table: Table },
}

/// Writes a sequence of tables with the same columns into one file.
pub struct TableWriter {
    sink: Sink,
    path: PathBuf,
    rows: usize,
}

impl TableWriter {
    pub fn create<P: AsRef<Path>>(path: P, format: Format) -> Result<Self> {
        TableWriter::open(path, format, WriteMode::Create)
    }

    /// In `Append` mode TSV/CSV files get rows without a new header.
    pub fn open<P: AsRef<Path>>(path: P, format: Format, mode: WriteMode) -> Result<Self> {
        let path = path.as_ref();
        let sink = match (format, mode) {
            (Format::Tsv | Format::Csv, _) => {
                let out = match mode {
                    WriteMode::Create => myio::writer(path)?,
                    WriteMode::Append => myio::append_writer(path)?,
                };
                let writer = csv::WriterBuilder::new()
                    .delimiter(format.delimiter().unwrap_or(b'\t'))
                    .from_writer(out);
                Sink::Text {
                    writer,
                    header_written: mode == WriteMode::Append,
                }
            }
            (Format::Parquet, WriteMode::Create) => Sink::Parquet {
                sink: ParquetSink::create(path)?,
                dtypes: None,
                names: vec![],
            },
            (Format::Parquet, WriteMode::Append) => {
                return Err(ToolError::UnsupportedFormat(format!(
                    "cannot append to the PARQUET file {}",
                    path.display()
                )))
            }
            #[cfg(feature = "hdf5")]
            (Format::Hdf5, WriteMode::Create) => Sink::Hdf5 {
                table: Table::default(),
            },
            #[cfg(feature = "hdf5")]
            (Format::Hdf5, WriteMode::Append) => {
                return Err(ToolError::UnsupportedFormat(format!(
                    "cannot append to the HDF5 file {}",
                    path.display()
                )))
            }
            #[cfg(not(feature = "hdf5"))]
            (Format::Hdf5, _) => return Err(hdf5_unsupported(path)),
        };
        Ok(TableWriter {
            sink,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, table: &Table) -> Result<()> {
        match &mut self.sink {
            Sink::Text {
                writer,
                header_written,
            } => {
                if !*header_written {
                    writer.write_record(table.column_names())?;
                    *header_written = true;
                }
                for i in 0..table.height() {
                    writer.write_record(table.columns().iter().map(|c| c.data.format(i)))?;
                }
            }
            Sink::Parquet {
                sink,
                dtypes,
                names,
            } => match dtypes {
                None => {
                    *dtypes = Some(table.dtypes());
                    *names = table.column_names();
                    sink.write(table)?;
                }
                Some(dtypes) => {
                    if &table.column_names() != names {
                        return Err(ToolError::schema(format!(
                            "columns [{}] differ from the first batch [{}] of {}",
                            table.column_names().join(", "),
                            names.join(", "),
                            self.path.display()
                        )));
                    }
                    sink.write(&table.cast_to(dtypes)?)?;
                }
            },
            #[cfg(feature = "hdf5")]
            Sink::Hdf5 { table: all } => all.vstack(table)?,
        }
        self.rows += table.height();
        Ok(())
    }

    /// Flush and close, returning the number of rows written.
    pub fn finish(self) -> Result<usize> {
        match self.sink {
            Sink::Text { writer, .. } => writer
                .into_inner()
                .map_err(|e| e.into_error())?
                .finish()?,
            Sink::Parquet { sink, .. } => sink.finish()?,
            #[cfg(feature = "hdf5")]
            Sink::Hdf5 { table } => h5::write_hdf5(&table, &self.path)?,
        }
        log::debug!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(self.rows)
    }
}

/// Write one table in a single call.
pub fn write_table<P: AsRef<Path>>(
    table: &Table,
    path: P,
    format: Format,
    mode: WriteMode,
) -> Result<usize> {
    let mut writer = TableWriter::open(path, format, mode)?;
    writer.write(table)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_chunked_read_keeps_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_text(
            dir.path(),
            "t.tsv",
            "chrom\tstart\tend\nchr1\t1\t5\nchr1\t7\t9\nchr2\t3\t4\n",
        );
        let chunks: Vec<Table> = load(&path, Format::Tsv, None, Some(2), true)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].height(), 2);
        assert_eq!(chunks[1].height(), 1);
        assert_eq!(chunks[1].dtypes(), vec![DType::Str, DType::Int, DType::Int]);
    }

    #[test]
    fn test_headerless_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_text(dir.path(), "s.tsv", "chr1\t10\t10\tx\t.\t+\n");
        let sels = ColumnSelector::parse_list("0,1,5");
        let table = load_table(&path, Format::Tsv, Some(&sels), false).unwrap();
        assert_eq!(table.column_names(), vec!["0", "1", "5"]);
        assert_eq!(
            table.column("5").unwrap().data,
            ColumnData::Str(vec!["+".into()])
        );
    }

    #[test]
    fn test_missing_column_is_key_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_text(dir.path(), "t.csv", "a,b\n1,2\n");
        let sels = vec![ColumnSelector::Name("c".into())];
        assert!(matches!(
            load(&path, Format::Csv, Some(&sels), None, true),
            Err(ToolError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_text_write_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["a,b".into()])),
            Column::new("x", ColumnData::Float(vec![2.0])),
        ])
        .unwrap();
        write_table(&table, &path, Format::Csv, WriteMode::Create).unwrap();
        write_table(&table, &path, Format::Csv, WriteMode::Append).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,x\n\"a,b\",2.0\n\"a,b\",2.0\n");
    }

    #[test]
    fn test_round_trip_preserves_shape() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = write_text(dir.path(), "t.tsv", "id\tn\tflag\nA\t1\tTrue\nB\t2\tFalse\n");
        let table = load_table(&tsv, Format::Tsv, None, true).unwrap();
        let pq = dir.path().join("t.parquet");
        write_table(&table, &pq, Format::Parquet, WriteMode::Create).unwrap();
        let back = load_table(&pq, Format::Parquet, None, true).unwrap();
        assert_eq!(back.height(), 2);
        assert_eq!(back.column_names(), table.column_names());
        assert_eq!(back, table);
    }

    #[test]
    fn test_gz_text_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv.gz");
        let table = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["A".into(), "B".into()])),
            Column::new("n", ColumnData::Int(vec![1, 2])),
        ])
        .unwrap();
        let mut writer = TableWriter::create(&path, Format::Tsv).unwrap();
        writer.write(&table).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        // gzip trailer is in place once finish returns
        let mut text = String::new();
        flate2::read::GzDecoder::new(std::fs::File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "id\tn\nA\t1\nB\t2\n");
        assert_eq!(load_table(&path, Format::Tsv, None, true).unwrap(), table);
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.h5");
        assert!(matches!(
            TableWriter::create(&path, Format::Hdf5),
            Err(ToolError::UnsupportedFormat(_))
        ));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_hdf5_chunked_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = write_text(
            dir.path(),
            "t.tsv",
            "readID\tdna_start\tdna_end\nr1\t0\t4\nr2\t2\t6\nr3\t1\t3\n",
        );
        let h5 = dir.path().join("t.h5");
        let mut writer = TableWriter::create(&h5, Format::Hdf5).unwrap();
        for chunk in load(&tsv, Format::Tsv, None, Some(2), true).unwrap() {
            writer.write(&chunk.unwrap()).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 3);

        let sels = ColumnSelector::parse_list("readID,dna_end");
        let chunks: Vec<Table> = load(&h5, Format::Hdf5, Some(&sels), Some(2), true)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].column_names(), vec!["readID", "dna_end"]);
        assert_eq!(
            chunks[1].column("dna_end").unwrap().data,
            ColumnData::Int(vec![3])
        );
        assert!(matches!(
            TableWriter::open(&h5, Format::Hdf5, WriteMode::Append),
            Err(ToolError::UnsupportedFormat(_))
        ));
    }
}
