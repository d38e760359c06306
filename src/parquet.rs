use crate::error::Result;
use crate::table::{Column, ColumnData, Table};
use polars::io::parquet::write::BatchedWriter;
use polars::prelude::{
    DataFrame, DataType, ParquetCompression, ParquetReader, ParquetWriter, PlSmallStr, SerReader,
    Series,
};
use std::fs::File;
use std::path::Path;

fn to_column_data(series: &Series) -> Result<ColumnData> {
    let dtype = series.dtype();
    let data = if dtype == &DataType::Boolean {
        let values = series.bool()?;
        ColumnData::Bool(values.into_iter().map(|v| v.unwrap_or(false)).collect())
    } else if dtype.is_integer() && series.null_count() == 0 {
        let cast = series.cast(&DataType::Int64)?;
        let values = cast.i64()?;
        ColumnData::Int(values.into_iter().map(|v| v.unwrap_or(0)).collect())
    } else if dtype.is_integer() || dtype.is_float() {
        // nullable integers become NaN-padded floats
        let cast = series.cast(&DataType::Float64)?;
        let values = cast.f64()?;
        ColumnData::Float(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else {
        let cast = series.cast(&DataType::String)?;
        let values = cast.str()?;
        ColumnData::Str(
            values
                .into_iter()
                .map(|v| v.unwrap_or("").to_string())
                .collect(),
        )
    };
    Ok(data)
}

/// Convert to a polars frame for writing.
pub fn to_dataframe(table: &Table) -> Result<DataFrame> {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            let name = PlSmallStr::from(c.name.as_str());
            match &c.data {
                ColumnData::Str(v) => polars::prelude::Column::new(name, v),
                ColumnData::Int(v) => polars::prelude::Column::new(name, v),
                ColumnData::Float(v) => polars::prelude::Column::new(name, v),
                ColumnData::Bool(v) => polars::prelude::Column::new(name, v),
            }
        })
        .collect::<Vec<_>>();
    Ok(DataFrame::new(columns)?)
}

pub fn from_dataframe(df: &DataFrame) -> Result<Table> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| {
            Ok(Column::new(
                c.name().as_str(),
                to_column_data(c.as_materialized_series())?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Table::new(columns)
}

/// Read a whole parquet file.
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Table> {
    let file = File::open(path.as_ref())?;
    let df = ParquetReader::new(file).finish()?;
    log::debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.as_ref().display()
    );
    from_dataframe(&df)
}

/// Row groups appended one table at a time, snappy compressed.
pub struct ParquetSink {
    file: Option<File>,
    writer: Option<BatchedWriter<File>>,
}

impl ParquetSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(ParquetSink {
            file: Some(file),
            writer: None,
        })
    }

    pub fn write(&mut self, table: &Table) -> Result<()> {
        let df = to_dataframe(table)?;
        if self.writer.is_none() {
            if let Some(file) = self.file.take() {
                let writer = ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .batched(&df.schema())?;
                self.writer = Some(writer);
            }
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_batch(&df)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match (self.writer.as_mut(), self.file.take()) {
            (Some(writer), _) => {
                writer.finish()?;
            }
            (None, Some(file)) => {
                let mut empty = DataFrame::empty();
                ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut empty)?;
            }
            (None, None) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        let table = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["a".into(), "b".into()])),
            Column::new("n", ColumnData::Int(vec![3, 4])),
            Column::new("x", ColumnData::Float(vec![0.5, 1.0])),
            Column::new("ok", ColumnData::Bool(vec![true, false])),
        ])
        .unwrap();
        let mut sink = ParquetSink::create(&path).unwrap();
        sink.write(&table.slice(0, 1)).unwrap();
        sink.write(&table.slice(1, 1)).unwrap();
        sink.finish().unwrap();

        let back = read_parquet(&path).unwrap();
        assert_eq!(back, table);
    }
}
