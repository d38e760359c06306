use crate::error::{Result, ToolError};
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Column types. Ordered by numeric promotion: `Bool < Int < Float`, and any
/// other mix ends up as `Str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int,
    Float,
    Str,
}

impl DType {
    /// Smallest type both `self` and `other` can be stored as.
    /// # Example
    /// ```
    /// use rnadnatools::table::DType;
    /// assert_eq!(DType::Int.unify(DType::Float), DType::Float);
    /// assert_eq!(DType::Bool.unify(DType::Int), DType::Int);
    /// assert_eq!(DType::Float.unify(DType::Str), DType::Str);
    /// ```
    pub fn unify(self, other: DType) -> DType {
        use DType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Str, _) | (_, Str) => Str,
            (Float, _) | (_, Float) => Float,
            _ => Int,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::Str)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DType::Bool => "bool",
            DType::Int => "int",
            DType::Float => "float",
            DType::Str => "str",
        };
        write!(f, "{}", s)
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Floats are written the way pandas writes them.
/// # Example
/// ```
/// use rnadnatools::table::format_float;
/// assert_eq!(format_float(1.0), "1.0");
/// assert_eq!(format_float(0.25), "0.25");
/// assert_eq!(format_float(f64::NAN), "");
/// ```
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_infinite() {
        String::from(if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(f64::NAN);
    }
    raw.parse::<f64>().ok()
}

fn cast_error(raw: &str, dtype: DType) -> ToolError {
    ToolError::schema(format!("cannot cast '{}' to {}", raw, dtype))
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Str(_) => DType::Str,
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Bool(_) => DType::Bool,
        }
    }

    /// Parse a raw text cell as `dtype`.
    /// # Example
    /// ```
    /// use rnadnatools::table::{DType, Value};
    /// assert_eq!(Value::parse("0", DType::Int).unwrap(), Value::Int(0));
    /// assert_eq!(Value::parse("True", DType::Bool).unwrap(), Value::Bool(true));
    /// assert!(Value::parse("NA", DType::Int).is_err());
    /// ```
    pub fn parse(raw: &str, dtype: DType) -> Result<Value> {
        Value::Str(raw.to_string()).cast(dtype)
    }

    pub fn cast(&self, dtype: DType) -> Result<Value> {
        let value = match (self, dtype) {
            (v, t) if v.dtype() == t => v.clone(),
            (v, DType::Str) => Value::Str(v.to_string()),

            (Value::Float(f), DType::Int) => {
                if !f.is_finite() {
                    return Err(cast_error(&format_float(*f), dtype));
                }
                Value::Int(f.trunc() as i64)
            }
            (Value::Bool(b), DType::Int) => Value::Int(*b as i64),
            (Value::Str(s), DType::Int) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => match parse_float(s) {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => Value::Int(f as i64),
                    _ => return Err(cast_error(s, dtype)),
                },
            },

            (Value::Int(i), DType::Float) => Value::Float(*i as f64),
            (Value::Bool(b), DType::Float) => Value::Float(*b as i64 as f64),
            (Value::Str(s), DType::Float) => {
                Value::Float(parse_float(s).ok_or_else(|| cast_error(s, dtype))?)
            }

            (Value::Int(i), DType::Bool) => Value::Bool(*i != 0),
            (Value::Float(f), DType::Bool) => Value::Bool(*f != 0.0),
            (Value::Str(s), DType::Bool) => match parse_bool(s) {
                Some(b) => Value::Bool(b),
                None => match s.trim() {
                    "1" => Value::Bool(true),
                    "0" => Value::Bool(false),
                    _ => return Err(cast_error(s, dtype)),
                },
            },
            (v, t) => return Err(cast_error(&v.to_string(), t)),
        };
        Ok(value)
    }

    /// Anything that does not compare equal to `False`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(_) => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
        }
    }
}

/// A homogeneously typed array.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Str(Vec<String>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

impl ColumnData {
    pub fn with_capacity(dtype: DType, n: usize) -> ColumnData {
        match dtype {
            DType::Str => ColumnData::Str(Vec::with_capacity(n)),
            DType::Int => ColumnData::Int(Vec::with_capacity(n)),
            DType::Float => ColumnData::Float(Vec::with_capacity(n)),
            DType::Bool => ColumnData::Bool(Vec::with_capacity(n)),
        }
    }

    /// `n` copies of `value` cast to `dtype`.
    pub fn full(dtype: DType, value: &Value, n: usize) -> Result<ColumnData> {
        let data = match value.cast(dtype)? {
            Value::Str(s) => ColumnData::Str(vec![s; n]),
            Value::Int(i) => ColumnData::Int(vec![i; n]),
            Value::Float(f) => ColumnData::Float(vec![f; n]),
            Value::Bool(b) => ColumnData::Bool(vec![b; n]),
        };
        Ok(data)
    }

    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Str(_) => DType::Str,
            ColumnData::Int(_) => DType::Int,
            ColumnData::Float(_) => DType::Float,
            ColumnData::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Str(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Value {
        match self {
            ColumnData::Str(v) => Value::Str(v[i].clone()),
            ColumnData::Int(v) => Value::Int(v[i]),
            ColumnData::Float(v) => Value::Float(v[i]),
            ColumnData::Bool(v) => Value::Bool(v[i]),
        }
    }

    /// Overwrite row `i`, casting `value` to this column's type.
    pub fn set(&mut self, i: usize, value: &Value) -> Result<()> {
        match self {
            ColumnData::Str(v) => v[i] = value.to_string(),
            ColumnData::Int(v) => {
                if let Value::Int(x) = value.cast(DType::Int)? {
                    v[i] = x
                }
            }
            ColumnData::Float(v) => {
                if let Value::Float(x) = value.cast(DType::Float)? {
                    v[i] = x
                }
            }
            ColumnData::Bool(v) => {
                if let Value::Bool(x) = value.cast(DType::Bool)? {
                    v[i] = x
                }
            }
        }
        Ok(())
    }

    pub fn push(&mut self, value: &Value) -> Result<()> {
        match self {
            ColumnData::Str(v) => v.push(value.to_string()),
            ColumnData::Int(v) => {
                if let Value::Int(x) = value.cast(DType::Int)? {
                    v.push(x)
                }
            }
            ColumnData::Float(v) => {
                if let Value::Float(x) = value.cast(DType::Float)? {
                    v.push(x)
                }
            }
            ColumnData::Bool(v) => {
                if let Value::Bool(x) = value.cast(DType::Bool)? {
                    v.push(x)
                }
            }
        }
        Ok(())
    }

    /// Append `other`, casting it to this column's type.
    pub fn extend(&mut self, other: &ColumnData) -> Result<()> {
        match self {
            ColumnData::Str(v) => v.extend(other.text_values()),
            ColumnData::Int(v) => {
                if let ColumnData::Int(o) = other.cast(DType::Int)? {
                    v.extend(o)
                }
            }
            ColumnData::Float(v) => {
                if let ColumnData::Float(o) = other.cast(DType::Float)? {
                    v.extend(o)
                }
            }
            ColumnData::Bool(v) => {
                if let ColumnData::Bool(o) = other.cast(DType::Bool)? {
                    v.extend(o)
                }
            }
        }
        Ok(())
    }

    pub fn slice(&self, offset: usize, len: usize) -> ColumnData {
        let start = offset.min(self.len());
        let end = (offset + len).min(self.len());
        match self {
            ColumnData::Str(v) => ColumnData::Str(v[start..end].to_vec()),
            ColumnData::Int(v) => ColumnData::Int(v[start..end].to_vec()),
            ColumnData::Float(v) => ColumnData::Float(v[start..end].to_vec()),
            ColumnData::Bool(v) => ColumnData::Bool(v[start..end].to_vec()),
        }
    }

    pub fn filter(&self, mask: &[bool]) -> ColumnData {
        fn keep<T: Clone>(v: &[T], mask: &[bool]) -> Vec<T> {
            v.iter()
                .zip(mask)
                .filter(|(_, &m)| m)
                .map(|(x, _)| x.clone())
                .collect()
        }
        match self {
            ColumnData::Str(v) => ColumnData::Str(keep(v, mask)),
            ColumnData::Int(v) => ColumnData::Int(keep(v, mask)),
            ColumnData::Float(v) => ColumnData::Float(keep(v, mask)),
            ColumnData::Bool(v) => ColumnData::Bool(keep(v, mask)),
        }
    }

    /// Gather rows by position; `None` positions get `fill` cast to this column's type.
    /// # Example
    /// ```
    /// use rnadnatools::table::{ColumnData, Value};
    /// let data = ColumnData::Int(vec![1, 2]);
    /// let out = data.take_or_fill(&[Some(1), None, Some(0)], &Value::Str("0".into())).unwrap();
    /// assert_eq!(out, ColumnData::Int(vec![2, 0, 1]));
    /// ```
    pub fn take_or_fill(&self, rows: &[Option<usize>], fill: &Value) -> Result<ColumnData> {
        fn gather<T: Clone>(v: &[T], rows: &[Option<usize>], fill: T) -> Vec<T> {
            rows.iter()
                .map(|r| r.map_or_else(|| fill.clone(), |i| v[i].clone()))
                .collect()
        }
        let data = match (self, fill.cast(self.dtype())?) {
            (ColumnData::Str(v), Value::Str(f)) => ColumnData::Str(gather(v, rows, f)),
            (ColumnData::Int(v), Value::Int(f)) => ColumnData::Int(gather(v, rows, f)),
            (ColumnData::Float(v), Value::Float(f)) => ColumnData::Float(gather(v, rows, f)),
            (ColumnData::Bool(v), Value::Bool(f)) => ColumnData::Bool(gather(v, rows, f)),
            (_, f) => return Err(cast_error(&f.to_string(), self.dtype())),
        };
        Ok(data)
    }

    pub fn cast(&self, dtype: DType) -> Result<ColumnData> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        let mut out = ColumnData::with_capacity(dtype, self.len());
        for i in 0..self.len() {
            out.push(&self.get(i))?;
        }
        Ok(out)
    }

    /// Text rendering of row `i`, as written to TSV/CSV.
    pub fn format(&self, i: usize) -> String {
        match self {
            ColumnData::Str(v) => v[i].clone(),
            _ => self.get(i).to_string(),
        }
    }

    /// All rows rendered as text. Keys are matched on this representation.
    pub fn text_values(&self) -> Vec<String> {
        match self {
            ColumnData::Str(v) => v.clone(),
            _ => (0..self.len()).map(|i| self.format(i)).collect(),
        }
    }

    /// Parse raw text cells as `dtype`.
    pub fn parse_as(raw: &[String], dtype: DType) -> Result<ColumnData> {
        if dtype == DType::Str {
            return Ok(ColumnData::Str(raw.to_vec()));
        }
        let mut out = ColumnData::with_capacity(dtype, raw.len());
        for cell in raw {
            out.push(&Value::parse(cell, dtype)?)?;
        }
        Ok(out)
    }

    /// Guess the narrowest type for a set of raw text cells.
    /// Empty cells make integer columns float (NaN), and boolean columns text.
    /// # Example
    /// ```
    /// use rnadnatools::table::{ColumnData, DType};
    /// let raw = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    /// assert_eq!(ColumnData::infer_dtype(&raw(&["1", "-2"])), DType::Int);
    /// assert_eq!(ColumnData::infer_dtype(&raw(&["1", ""])), DType::Float);
    /// assert_eq!(ColumnData::infer_dtype(&raw(&["True", "False"])), DType::Bool);
    /// assert_eq!(ColumnData::infer_dtype(&raw(&["chr1", "2"])), DType::Str);
    /// ```
    pub fn infer_dtype(raw: &[String]) -> DType {
        let non_empty: Vec<&str> = raw
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if non_empty.is_empty() {
            return DType::Str;
        }
        let has_empty = non_empty.len() < raw.len();
        if non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
            return if has_empty { DType::Float } else { DType::Int };
        }
        if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
            return DType::Float;
        }
        if !has_empty && non_empty.iter().all(|s| parse_bool(s).is_some()) {
            return DType::Bool;
        }
        DType::Str
    }

    pub fn infer(raw: &[String]) -> ColumnData {
        let dtype = ColumnData::infer_dtype(raw);
        ColumnData::parse_as(raw, dtype).unwrap_or_else(|_| ColumnData::Str(raw.to_vec()))
    }

    pub fn truthy_count(&self) -> usize {
        match self {
            ColumnData::Str(v) => v.len(),
            ColumnData::Int(v) => v.iter().filter(|&&x| x != 0).count(),
            ColumnData::Float(v) => v.iter().filter(|&&x| x != 0.0).count(),
            ColumnData::Bool(v) => v.iter().filter(|&&x| x).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, data: ColumnData) -> Column {
        Column {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }
}

/// Pick a column either by header name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnSelector {
    Name(String),
    Index(usize),
}

impl ColumnSelector {
    /// Build a selector from a `--x-colname`/`--x-column` option pair,
    /// exactly one of which has to be set.
    /// # Example
    /// ```
    /// use rnadnatools::table::ColumnSelector;
    /// let sel = ColumnSelector::from_options(None, Some(2), "key").unwrap();
    /// assert_eq!(sel, ColumnSelector::Index(2));
    /// assert!(ColumnSelector::from_options(Some("id"), Some(2), "key").is_err());
    /// assert!(ColumnSelector::from_options(None, None, "key").is_err());
    /// ```
    pub fn from_options(name: Option<&str>, index: Option<usize>, flag: &str) -> Result<Self> {
        match (name, index) {
            (Some(name), None) => Ok(ColumnSelector::Name(name.to_string())),
            (None, Some(index)) => Ok(ColumnSelector::Index(index)),
            (Some(_), Some(_)) => Err(ToolError::config(format!(
                "--{flag}-colname and --{flag}-column cannot work together."
            ))),
            (None, None) => Err(ToolError::config(format!(
                "Please, provide either --{flag}-colname or --{flag}-column."
            ))),
        }
    }

    /// Comma separated list; all-digit tokens are positions.
    /// # Example
    /// ```
    /// use rnadnatools::table::ColumnSelector;
    /// let sels = ColumnSelector::parse_list("chrom,1,end");
    /// assert_eq!(sels[0], ColumnSelector::Name("chrom".to_string()));
    /// assert_eq!(sels[1], ColumnSelector::Index(1));
    /// ```
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ColumnSelector::from)
            .collect()
    }
}

impl From<&str> for ColumnSelector {
    fn from(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            match token.parse() {
                Ok(i) => ColumnSelector::Index(i),
                Err(_) => ColumnSelector::Name(token.to_string()),
            }
        } else {
            ColumnSelector::Name(token.to_string())
        }
    }
}

impl FromStr for ColumnSelector {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ColumnSelector::from(s))
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnSelector::Name(n) => write!(f, "'{}'", n),
            ColumnSelector::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// Ordered named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Table> {
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(ToolError::schema(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(ToolError::schema(format!(
                "duplicate column name '{}'",
                dup.name
            )));
        }
        Ok(Table { columns })
    }

    /// Zero-row text columns, used to keep the header of an empty output.
    pub fn empty(names: &[String]) -> Result<Table> {
        Table::new(
            names
                .iter()
                .map(|n| Column::new(n.clone(), ColumnData::Str(vec![])))
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.columns.iter().map(|c| c.dtype()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_at(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    /// Position of the selected column.
    pub fn resolve(&self, selector: &ColumnSelector) -> Result<usize> {
        match selector {
            ColumnSelector::Name(name) => {
                self.columns.iter().position(|c| &c.name == name).ok_or_else(|| {
                    ToolError::not_found(format!(
                        "column '{}' not in [{}]",
                        name,
                        self.column_names().join(", ")
                    ))
                })
            }
            ColumnSelector::Index(i) if *i < self.width() => Ok(*i),
            ColumnSelector::Index(i) => Err(ToolError::not_found(format!(
                "column #{} out of range for a table with {} columns",
                i,
                self.width()
            ))),
        }
    }

    /// New table with the selected columns, in selector order.
    pub fn select(&self, selectors: &[ColumnSelector]) -> Result<Table> {
        let columns = selectors
            .iter()
            .map(|s| self.resolve(s).map(|i| self.columns[i].clone()))
            .collect::<Result<Vec<_>>>()?;
        Table::new(columns)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.width() > 0 && column.len() != self.height() {
            return Err(ToolError::schema(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.height()
            )));
        }
        if self.column(&column.name).is_some() {
            return Err(ToolError::schema(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rename(&mut self, names: &[String]) -> Result<()> {
        if names.len() != self.width() {
            return Err(ToolError::schema(format!(
                "{} column names given for a table with {} columns",
                names.len(),
                self.width()
            )));
        }
        if !names.iter().all_unique() {
            return Err(ToolError::schema(format!(
                "duplicate column names in [{}]",
                names.join(", ")
            )));
        }
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name.clone();
        }
        Ok(())
    }

    pub fn slice(&self, offset: usize, len: usize) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.slice(offset, len)))
                .collect(),
        }
    }

    pub fn filter(&self, mask: &[bool]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.filter(mask)))
                .collect(),
        }
    }

    /// Split into tables of at most `size` rows.
    pub fn chunks(&self, size: usize) -> Vec<Table> {
        let size = size.max(1);
        (0..self.height())
            .step_by(size)
            .map(|offset| self.slice(offset, size))
            .collect()
    }

    pub fn row(&self, i: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.get(i)).collect()
    }

    /// Append the rows of `other`; column names must match and types are promoted.
    pub fn vstack(&mut self, other: &Table) -> Result<()> {
        if self.width() == 0 {
            *self = other.clone();
            return Ok(());
        }
        if self.column_names() != other.column_names() {
            return Err(ToolError::schema(format!(
                "cannot stack [{}] onto [{}]",
                other.column_names().join(", "),
                self.column_names().join(", ")
            )));
        }
        for (mine, theirs) in self.columns.iter_mut().zip(other.columns()) {
            let dtype = mine.dtype().unify(theirs.dtype());
            if dtype != mine.dtype() {
                mine.data = mine.data.cast(dtype)?;
            }
            mine.data.extend(&theirs.data)?;
        }
        Ok(())
    }

    pub fn cast_to(&self, dtypes: &[DType]) -> Result<Table> {
        let columns = self
            .columns
            .iter()
            .zip(dtypes)
            .map(|(c, &t)| Ok(Column::new(c.name.clone(), c.data.cast(t)?)))
            .collect::<Result<Vec<_>>>()?;
        Table::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Table {
        Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["A".into(), "B".into()])),
            Column::new("n", ColumnData::Int(vec![1, 2])),
        ])
        .unwrap()
    }

    #[test]
    fn test_unequal_columns_rejected() {
        let res = Table::new(vec![
            Column::new("a", ColumnData::Int(vec![1])),
            Column::new("b", ColumnData::Int(vec![1, 2])),
        ]);
        assert!(matches!(res, Err(ToolError::SchemaMismatch(_))));
    }

    #[test]
    fn test_resolve() {
        let t = toy();
        assert_eq!(t.resolve(&ColumnSelector::Name("n".into())).unwrap(), 1);
        assert_eq!(t.resolve(&ColumnSelector::Index(0)).unwrap(), 0);
        assert!(matches!(
            t.resolve(&ColumnSelector::Index(5)),
            Err(ToolError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_vstack_promotes() {
        let mut t = toy();
        let other = Table::new(vec![
            Column::new("id", ColumnData::Str(vec!["C".into()])),
            Column::new("n", ColumnData::Float(vec![0.5])),
        ])
        .unwrap();
        t.vstack(&other).unwrap();
        assert_eq!(t.height(), 3);
        assert_eq!(
            t.column("n").unwrap().data,
            ColumnData::Float(vec![1.0, 2.0, 0.5])
        );
    }

    #[test]
    fn test_set_casts_value() {
        let mut data = ColumnData::Float(vec![0.0; 2]);
        data.set(1, &Value::Int(3)).unwrap();
        assert_eq!(data, ColumnData::Float(vec![0.0, 3.0]));
        let mut ints = ColumnData::Int(vec![0]);
        assert!(ints.set(0, &Value::Str("x".into())).is_err());
    }

    #[test]
    fn test_text_values() {
        let data = ColumnData::Bool(vec![true, false]);
        assert_eq!(data.text_values(), vec!["True", "False"]);
        let data = ColumnData::Float(vec![1.0, 2.5]);
        assert_eq!(data.text_values(), vec!["1.0", "2.5"]);
    }

    #[test]
    fn test_chunks_and_filter() {
        let t = toy();
        let chunks = t.chunks(1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].row(0), vec![Value::Str("B".into()), Value::Int(2)]);
        let f = t.filter(&[false, true]);
        assert_eq!(f.height(), 1);
        assert_eq!(f.column("n").unwrap().data, ColumnData::Int(vec![2]));
    }
}
