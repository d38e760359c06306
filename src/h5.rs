use crate::error::{Result, ToolError};
use crate::table::{Column, ColumnData, Table};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File};
use std::path::Path;

/// Width of the fixed-length byte strings text columns are stored as.
pub const STR_WIDTH: usize = 100;
/// Fixed-length strings in input files are read through this width.
const READ_WIDTH: usize = 1024;

fn read_column(dataset: &Dataset) -> Result<ColumnData> {
    let data = match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Boolean => ColumnData::Bool(dataset.read_raw::<bool>()?),
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            ColumnData::Int(dataset.read_raw::<i64>()?)
        }
        TypeDescriptor::Float(_) => ColumnData::Float(dataset.read_raw::<f64>()?),
        TypeDescriptor::FixedAscii(_) => ColumnData::Str(
            dataset
                .read_raw::<FixedAscii<READ_WIDTH>>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::FixedUnicode(_) => ColumnData::Str(
            dataset
                .read_raw::<FixedUnicode<READ_WIDTH>>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenAscii => ColumnData::Str(
            dataset
                .read_raw::<VarLenAscii>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenUnicode => ColumnData::Str(
            dataset
                .read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        other => {
            return Err(ToolError::UnsupportedFormat(format!(
                "dataset {} has type {:?}, expected numbers, booleans or strings",
                dataset.name(),
                other
            )))
        }
    };
    Ok(data)
}

/// Read every dataset at the root of an HDF5 file as one column, in name order.
pub fn read_hdf5<P: AsRef<Path>>(path: P) -> Result<Table> {
    let file = File::open(path.as_ref())?;
    let mut columns = Vec::new();
    for name in file.member_names()? {
        let dataset = match file.dataset(&name) {
            Ok(ds) => ds,
            Err(_) => {
                log::debug!("Skipping {} in {}, not a dataset", name, path.as_ref().display());
                continue;
            }
        };
        columns.push(Column::new(name, read_column(&dataset)?));
    }
    log::debug!(
        "Read {} columns from {}",
        columns.len(),
        path.as_ref().display()
    );
    Table::new(columns)
}

fn fixed_text(name: &str, values: &[String]) -> Result<Vec<FixedAscii<STR_WIDTH>>> {
    values
        .iter()
        .map(|s| {
            let bytes = s.as_bytes();
            FixedAscii::<STR_WIDTH>::from_ascii(&bytes[..bytes.len().min(STR_WIDTH)]).map_err(
                |e| {
                    ToolError::schema(format!(
                        "column '{}' holds '{}' which cannot be stored as HDF5 text: {}",
                        name, s, e
                    ))
                },
            )
        })
        .collect()
}

/// Write `table` as one dataset per column. Text is cut to [`STR_WIDTH`] bytes.
pub fn write_hdf5<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    for column in table.columns() {
        let builder = file.new_dataset_builder();
        let name = column.name.as_str();
        match &column.data {
            ColumnData::Str(v) => {
                let text = fixed_text(name, v)?;
                builder.with_data(text.as_slice()).create(name)?;
            }
            ColumnData::Int(v) => {
                builder.with_data(v.as_slice()).create(name)?;
            }
            ColumnData::Float(v) => {
                builder.with_data(v.as_slice()).create(name)?;
            }
            ColumnData::Bool(v) => {
                builder.with_data(v.as_slice()).create(name)?;
            }
        }
    }
    file.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hdf5_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.h5");
        let table = Table::new(vec![
            Column::new("dna_end", ColumnData::Int(vec![12, 6])),
            Column::new("is_long", ColumnData::Bool(vec![true, false])),
            Column::new("readID", ColumnData::Str(vec!["r1".into(), "r2".into()])),
            Column::new("score", ColumnData::Float(vec![0.5, 1.0])),
        ])
        .unwrap();
        write_hdf5(&table, &path).unwrap();
        assert_eq!(read_hdf5(&path).unwrap(), table);
    }

    #[test]
    fn test_long_text_is_cut() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.h5");
        let long = "A".repeat(STR_WIDTH + 20);
        let table = Table::new(vec![Column::new("R1", ColumnData::Str(vec![long]))]).unwrap();
        write_hdf5(&table, &path).unwrap();
        let back = read_hdf5(&path).unwrap();
        assert_eq!(
            back.column("R1").unwrap().data,
            ColumnData::Str(vec!["A".repeat(STR_WIDTH)])
        );
    }
}
