use crate::error::{Result, ToolError};
use crate::expr::{self, BinaryOp, Expr, Func, UnaryOp};
use crate::format::FormatArg;
use crate::myio;
use crate::table::{Column, ColumnData, DType, Table, Value};
use crate::tableio::{self, WriteMode};
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

/// Characters that may not appear in an evaluated column name.
pub const PROHIBITED_SYMBOLS: [char; 11] = [':', '.', '-', '/', '!', '?', '&', '|', '\'', '%', '@'];

/// Storage format of an evaluated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    Str,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Bool,
}

impl ColumnFormat {
    pub fn dtype(&self) -> DType {
        match self {
            ColumnFormat::Str => DType::Str,
            ColumnFormat::Float => DType::Float,
            ColumnFormat::Bool => DType::Bool,
            _ => DType::Int,
        }
    }

    fn range(&self) -> Option<(i64, i64)> {
        match self {
            ColumnFormat::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            ColumnFormat::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ColumnFormat::Int | ColumnFormat::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            _ => None,
        }
    }

    /// Cast `data` to this format, checking the range of narrow integers.
    pub fn apply(&self, name: &str, data: &ColumnData) -> Result<ColumnData> {
        let out = data.cast(self.dtype()).map_err(|e| {
            ToolError::schema(format!("column '{}' cannot be stored as {}: {}", name, self, e))
        })?;
        if let (Some((lo, hi)), ColumnData::Int(values)) = (self.range(), &out) {
            if let Some(bad) = values.iter().find(|&&v| v < lo || v > hi) {
                return Err(ToolError::schema(format!(
                    "value {} of column '{}' does not fit into {}",
                    bad, name, self
                )));
            }
        }
        Ok(out)
    }
}

impl FromStr for ColumnFormat {
    type Err = ToolError;
    fn from_str(s: &str) -> Result<Self> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "str" => ColumnFormat::Str,
            "int" => ColumnFormat::Int,
            "int8" => ColumnFormat::Int8,
            "int16" => ColumnFormat::Int16,
            "int32" => ColumnFormat::Int32,
            "int64" => ColumnFormat::Int64,
            "float" => ColumnFormat::Float,
            "bool" => ColumnFormat::Bool,
            other => {
                return Err(ToolError::config(format!(
                    "unsupported column format '{}', use one of: str, int, int8, int16, int32, int64, float, bool",
                    other
                )))
            }
        };
        Ok(format)
    }
}

impl fmt::Display for ColumnFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ColumnFormat::Str => "str",
            ColumnFormat::Int => "int",
            ColumnFormat::Int8 => "int8",
            ColumnFormat::Int16 => "int16",
            ColumnFormat::Int32 => "int32",
            ColumnFormat::Int64 => "int64",
            ColumnFormat::Float => "float",
            ColumnFormat::Bool => "bool",
        };
        write!(f, "{}", s)
    }
}

/// One line of a column schema: `name<TAB>format<TAB>expression`.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub format: ColumnFormat,
    pub source: String,
    pub expr: Expr,
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(&PROHIBITED_SYMBOLS[..]) {
        return Err(ToolError::config(format!(
            "Check the column name '{}'. It cannot be empty or contain {}",
            name,
            PROHIBITED_SYMBOLS.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
        )));
    }
    Ok(())
}

/// Parse a column schema. Blank lines and `#` comments are skipped.
/// # Example
/// ```
/// use rnadnatools::evaluate::{parse_schema, ColumnFormat};
/// let specs = parse_schema("# name\tformat\texpression\nlen_dna\tint\tdna_end - dna_start\n").unwrap();
/// assert_eq!(specs.len(), 1);
/// assert_eq!(specs[0].format, ColumnFormat::Int);
/// assert!(parse_schema("bad-name\tint\t1\n").is_err());
/// ```
pub fn parse_schema(text: &str) -> Result<Vec<ColumnSpec>> {
    let mut specs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.splitn(3, '\t').collect();
        if fields.len() != 3 {
            return Err(ToolError::config(format!(
                "line {} of the column schema needs 3 tab separated fields: {}",
                lineno + 1,
                line
            )));
        }
        let name = fields[0].trim();
        validate_name(name)?;
        specs.push(ColumnSpec {
            name: name.to_string(),
            format: fields[1].parse()?,
            source: fields[2].trim().to_string(),
            expr: expr::parse(fields[2].trim())?,
        });
    }
    Ok(specs)
}

pub fn read_schema<P: AsRef<Path>>(path: P) -> Result<Vec<ColumnSpec>> {
    let mut text = String::new();
    for line in myio::reader(path)?.lines() {
        text.push_str(&line?);
        text.push('\n');
    }
    parse_schema(&text)
}

/// Either one value for every row, or one per row.
#[derive(Debug, Clone)]
enum Operand<'a> {
    Scalar(Value),
    Array(Cow<'a, ColumnData>),
}

impl<'a> Operand<'a> {
    fn get(&self, i: usize) -> Value {
        match self {
            Operand::Scalar(v) => v.clone(),
            Operand::Array(a) => a.get(i),
        }
    }
}

/// Common length of the array operands, `None` when all are scalars.
fn broadcast_len(args: &[Operand]) -> Result<Option<usize>> {
    let mut len = None;
    for arg in args {
        if let Operand::Array(a) = arg {
            match len {
                None => len = Some(a.len()),
                Some(n) if n != a.len() => {
                    return Err(ToolError::schema(format!(
                        "operands of different lengths: {} and {}",
                        n,
                        a.len()
                    )))
                }
                Some(_) => {}
            }
        }
    }
    Ok(len)
}

/// Narrowest column holding all `values`.
fn column_from_values(values: Vec<Value>) -> Result<ColumnData> {
    let dtype = values
        .iter()
        .map(|v| v.dtype())
        .reduce(|a, b| a.unify(b))
        .unwrap_or(DType::Float);
    let mut out = ColumnData::with_capacity(dtype, values.len());
    for v in &values {
        out.push(v)?;
    }
    Ok(out)
}

fn map_n<'a, F>(args: &[Operand], f: F) -> Result<Operand<'a>>
where
    F: Fn(&[Value]) -> Result<Value>,
{
    match broadcast_len(args)? {
        None => {
            let row: Vec<Value> = args.iter().map(|a| a.get(0)).collect();
            Ok(Operand::Scalar(f(&row)?))
        }
        Some(n) => {
            let mut values = Vec::with_capacity(n);
            let mut row = Vec::with_capacity(args.len());
            for i in 0..n {
                row.clear();
                row.extend(args.iter().map(|a| a.get(i)));
                values.push(f(&row)?);
            }
            Ok(Operand::Array(Cow::Owned(column_from_values(values)?)))
        }
    }
}

fn type_error(what: &str, values: &[&Value]) -> ToolError {
    ToolError::InvalidExpression(format!(
        "unsupported operand types for {}: {}",
        what,
        values
            .iter()
            .map(|v| v.dtype().to_string())
            .collect::<Vec<_>>()
            .join(" and ")
    ))
}

enum Num {
    I(i64),
    F(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::I(*i)),
        Value::Bool(b) => Some(Num::I(*b as i64)),
        Value::Float(x) => Some(Num::F(*x)),
        Value::Str(_) => None,
    }
}

fn as_f64(n: &Num) -> f64 {
    match n {
        Num::I(i) => *i as f64,
        Num::F(x) => *x,
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if (a.wrapping_rem(b) != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn py_mod_f(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if let (BinaryOp::Add, Value::Str(a), Value::Str(b)) = (op, l, r) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }
    let (a, b) = match (as_num(l), as_num(r)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(type_error(&format!("{:?}", op), &[l, r])),
    };
    if let (Num::I(a), Num::I(b)) = (&a, &b) {
        let (a, b) = (*a, *b);
        let int = match op {
            BinaryOp::Add => Some(a.wrapping_add(b)),
            BinaryOp::Sub => Some(a.wrapping_sub(b)),
            BinaryOp::Mul => Some(a.wrapping_mul(b)),
            BinaryOp::FloorDiv | BinaryOp::Mod if b == 0 => {
                return Err(ToolError::InvalidExpression(
                    "integer division by zero".to_string(),
                ))
            }
            BinaryOp::FloorDiv => Some(floor_div(a, b)),
            BinaryOp::Mod => Some(a.wrapping_sub(floor_div(a, b).wrapping_mul(b))),
            _ => None,
        };
        if let Some(i) = int {
            return Ok(Value::Int(i));
        }
    }
    let (a, b) = (as_f64(&a), as_f64(&b));
    let x = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => py_mod_f(a, b),
        _ => return Err(type_error(&format!("{:?}", op), &[l, r])),
    };
    Ok(Value::Float(x))
}

fn ordering(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (as_num(l)?, as_num(r)?) {
            (Num::I(a), Num::I(b)) => Some(a.cmp(&b)),
            (a, b) => as_f64(&a).partial_cmp(&as_f64(&b)),
        },
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let mixed = matches!(l, Value::Str(_)) != matches!(r, Value::Str(_));
    let ord = ordering(l, r);
    let result = match op {
        BinaryOp::Eq => ord == Some(Ordering::Equal),
        BinaryOp::Ne => ord != Some(Ordering::Equal),
        _ if mixed => return Err(type_error(&format!("{:?}", op), &[l, r])),
        BinaryOp::Lt => ord == Some(Ordering::Less),
        BinaryOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => ord == Some(Ordering::Greater),
        BinaryOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        _ => return Err(type_error(&format!("{:?}", op), &[l, r])),
    };
    Ok(Value::Bool(result))
}

fn logical(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let value = match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(match op {
            BinaryOp::And => *a && *b,
            _ => *a || *b,
        }),
        // bitwise on integers, as numpy does
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            let (a, b) = match (as_num(l), as_num(r)) {
                (Some(Num::I(a)), Some(Num::I(b))) => (a, b),
                _ => return Err(type_error(&format!("{:?}", op), &[l, r])),
            };
            Value::Int(match op {
                BinaryOp::And => a & b,
                _ => a | b,
            })
        }
        _ => Value::Bool(match op {
            BinaryOp::And => l.is_truthy() && r.is_truthy(),
            _ => l.is_truthy() || r.is_truthy(),
        }),
    };
    Ok(value)
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => logical(op, l, r),
        _ if op.is_comparison() => compare(op, l, r),
        _ => arithmetic(op, l, r),
    }
}

fn unary(op: UnaryOp, v: &Value) -> Result<Value> {
    let value = match (op, v) {
        (UnaryOp::Not, v) => Value::Bool(!v.is_truthy()),
        (UnaryOp::Neg, Value::Int(i)) => Value::Int(i.wrapping_neg()),
        (UnaryOp::Neg, Value::Bool(b)) => Value::Int(-(*b as i64)),
        (UnaryOp::Neg, Value::Float(x)) => Value::Float(-x),
        (UnaryOp::Invert, Value::Bool(b)) => Value::Bool(!b),
        (UnaryOp::Invert, Value::Int(i)) => Value::Int(!i),
        (op, v) => return Err(type_error(&format!("{:?}", op), &[v])),
    };
    Ok(value)
}

fn text(v: &Value) -> Cow<str> {
    match v {
        Value::Str(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Evaluates expressions against the columns of input tables and of
/// previously evaluated columns.
pub struct Evaluator<'a> {
    tables: &'a [Table],
    evaluated: Vec<Column>,
}

impl<'a> Evaluator<'a> {
    pub fn new(tables: &'a [Table]) -> Evaluator<'a> {
        Evaluator {
            tables,
            evaluated: Vec::new(),
        }
    }

    /// Row count scalar results are broadcast to.
    pub fn nrows(&self) -> usize {
        self.tables
            .first()
            .map(|t| t.height())
            .or_else(|| self.evaluated.first().map(|c| c.len()))
            .unwrap_or(0)
    }

    fn available(&self) -> String {
        let mut groups: Vec<String> = self
            .tables
            .iter()
            .map(|t| format!("[{}]", t.column_names().join(", ")))
            .collect();
        groups.push(format!(
            "[{}]",
            self.evaluated
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        groups.join(" ")
    }

    /// Evaluated columns shadow input columns; input tables are searched in order.
    pub fn lookup(&self, name: &str) -> Result<&ColumnData> {
        if let Some(c) = self.evaluated.iter().find(|c| c.name == name) {
            return Ok(&c.data);
        }
        for table in self.tables {
            if let Some(c) = table.column(name) {
                return Ok(&c.data);
            }
        }
        Err(ToolError::not_found(format!(
            "Variable {} is not available from the input or evaluated columns. Columns that can be used: {}",
            name,
            self.available()
        )))
    }

    fn operand(&self, expr: &Expr) -> Result<Operand<'_>> {
        match expr {
            Expr::Literal(v) => Ok(Operand::Scalar(v.clone())),
            Expr::Column(name) => Ok(Operand::Array(Cow::Borrowed(self.lookup(name)?))),
            Expr::Unary(op, inner) => {
                let inner = self.operand(inner)?;
                map_n(&[inner], |v| unary(*op, &v[0]))
            }
            Expr::Binary(op, l, r) => {
                let args = [self.operand(l)?, self.operand(r)?];
                map_n(&args, |v| binary(*op, &v[0], &v[1]))
            }
            Expr::Call(func, args) => {
                let args = args
                    .iter()
                    .map(|a| self.operand(a))
                    .collect::<Result<Vec<_>>>()?;
                self.call(*func, args)
            }
        }
    }

    fn call(&self, func: Func, args: Vec<Operand>) -> Result<Operand<'_>> {
        match func {
            Func::Abs => map_n(&args, |v| match &v[0] {
                Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                Value::Float(x) => Ok(Value::Float(x.abs())),
                other => Err(type_error("abs", &[other])),
            }),
            Func::Min | Func::Max => {
                let wanted = if func == Func::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let pick = |a: Value, b: &Value| -> Result<Value> {
                    match ordering(b, &a) {
                        Some(o) if o == wanted => Ok(b.clone()),
                        Some(_) => Ok(a),
                        None if matches!(a, Value::Float(x) if x.is_nan()) => Ok(a),
                        None if matches!(b, Value::Float(x) if x.is_nan()) => Ok(b.clone()),
                        None => Err(type_error("min/max", &[&a, b])),
                    }
                };
                if args.len() == 1 {
                    // reduce a single array to one value
                    return match &args[0] {
                        Operand::Scalar(v) => Ok(Operand::Scalar(v.clone())),
                        Operand::Array(a) => {
                            let mut values = (0..a.len()).map(|i| a.get(i));
                            let first = values.next().ok_or_else(|| {
                                ToolError::InvalidExpression(
                                    "min()/max() of an empty column".to_string(),
                                )
                            })?;
                            Ok(Operand::Scalar(values.try_fold(first, |acc, v| pick(acc, &v))?))
                        }
                    };
                }
                map_n(&args, |v| {
                    v[1..].iter().try_fold(v[0].clone(), |acc, x| pick(acc, x))
                })
            }
            Func::Len => map_n(&args, |v| Ok(Value::Int(text(&v[0]).chars().count() as i64))),
            Func::Where => map_n(&args, |v| {
                Ok(if v[0].is_truthy() {
                    v[1].clone()
                } else {
                    v[2].clone()
                })
            }),
            Func::Int | Func::Float | Func::Str | Func::Bool => {
                let dtype = match func {
                    Func::Int => DType::Int,
                    Func::Float => DType::Float,
                    Func::Bool => DType::Bool,
                    _ => DType::Str,
                };
                match &args[0] {
                    Operand::Scalar(v) => Ok(Operand::Scalar(v.cast(dtype)?)),
                    Operand::Array(a) => Ok(Operand::Array(Cow::Owned(a.cast(dtype)?))),
                }
            }
            Func::Match => {
                let pattern = match &args[1] {
                    Operand::Scalar(Value::Str(p)) => p,
                    _ => {
                        return Err(ToolError::InvalidExpression(
                            "match() needs a string literal as its pattern".to_string(),
                        ))
                    }
                };
                let re = Regex::new(pattern).map_err(|e| {
                    ToolError::InvalidExpression(format!("bad pattern '{}': {}", pattern, e))
                })?;
                map_n(&args[..1], |v| Ok(Value::Bool(re.is_match(&text(&v[0])))))
            }
            Func::StartsWith | Func::EndsWith | Func::Contains => map_n(&args, |v| {
                let (s, p) = (text(&v[0]), text(&v[1]));
                Ok(Value::Bool(match func {
                    Func::StartsWith => s.starts_with(&*p),
                    Func::EndsWith => s.ends_with(&*p),
                    _ => s.contains(&*p),
                }))
            }),
        }
    }

    /// Evaluate to a full column, broadcasting scalar results.
    pub fn evaluate(&self, expr: &Expr) -> Result<ColumnData> {
        match self.operand(expr)? {
            Operand::Scalar(v) => ColumnData::full(v.dtype(), &v, self.nrows()),
            Operand::Array(a) => Ok(a.into_owned()),
        }
    }

    /// Make `column` visible to later expressions, replacing one of the same name.
    pub fn define(&mut self, column: Column) {
        match self.evaluated.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.evaluated.push(column),
        }
    }

    pub fn into_table(self) -> Result<Table> {
        Table::new(self.evaluated)
    }
}

/// Evaluate every column of the schema in order; the result holds only the evaluated columns.
pub fn evaluate_columns(specs: &[ColumnSpec], tables: &[Table]) -> Result<Table> {
    let mut evaluator = Evaluator::new(tables);
    for spec in specs {
        log::debug!(
            "Evaluating column: {}, expression: {}",
            spec.name,
            spec.source
        );
        let data = evaluator.evaluate(&spec.expr)?;
        let data = spec.format.apply(&spec.name, &data)?;
        evaluator.define(Column::new(spec.name.clone(), data));
    }
    evaluator.into_table()
}

/// Run `table evaluate`. Returns the number of evaluated columns.
/// # Example
/// ```
/// use rnadnatools::evaluate::run_evaluate;
/// use std::path::Path;
/// let n = run_evaluate(
///     Path::new(".test/schema.tsv"),
///     Path::new("-"),
///     &[".test/dna.tsv"],
///     "auto".parse().unwrap(),
///     "tsv".parse().unwrap(),
/// )
/// .unwrap();
/// assert_eq!(n, 2);
/// ```
pub fn run_evaluate<P: AsRef<Path>>(
    schema: &Path,
    output: &Path,
    inputs: &[P],
    in_format: FormatArg,
    out_format: FormatArg,
) -> Result<usize> {
    let specs = read_schema(schema)?;
    if specs.is_empty() {
        log::info!("No evaluated expression. Is the input table with expressions empty?");
        return Ok(0);
    }
    let tables = tableio::load_tables(inputs, in_format)?;
    let out_format = match inputs.first() {
        Some(first) => out_format.or_same_as(in_format.resolve(first)?),
        None => out_format.or_same_as(crate::format::Format::Parquet),
    };
    let result = evaluate_columns(&specs, &tables)?;
    tableio::write_table(&result, output, out_format, WriteMode::Create)?;
    log::info!(
        "Evaluated {} expressions, including columns: {}",
        specs.len(),
        result.column_names().join(", ")
    );
    Ok(specs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> Vec<Table> {
        vec![
            Table::new(vec![
                Column::new("readID", ColumnData::Str(vec!["r1".into(), "r2".into(), "r3".into()])),
                Column::new("R1", ColumnData::Str(vec!["GATCAA".into(), "TTGA".into(), "CC".into()])),
            ])
            .unwrap(),
            Table::new(vec![
                Column::new("dna_start", ColumnData::Int(vec![2, 0, 1])),
                Column::new("dna_end", ColumnData::Int(vec![20, 10, 30])),
                Column::new("score", ColumnData::Float(vec![0.5, f64::NAN, 2.0])),
            ])
            .unwrap(),
        ]
    }

    fn eval(src: &str) -> Result<ColumnData> {
        let tables = tables();
        Evaluator::new(&tables).evaluate(&expr::parse(src)?)
    }

    #[test]
    fn test_arithmetic_and_broadcast() {
        assert_eq!(eval("dna_end - dna_start").unwrap(), ColumnData::Int(vec![18, 10, 29]));
        assert_eq!(eval("dna_end // 3").unwrap(), ColumnData::Int(vec![6, 3, 10]));
        assert_eq!(eval("-7 // 2").unwrap(), ColumnData::Int(vec![-4, -4, -4]));
        assert_eq!(eval("-7 % 3").unwrap(), ColumnData::Int(vec![2, 2, 2]));
        assert_eq!(eval("dna_start / 2").unwrap(), ColumnData::Float(vec![1.0, 0.0, 0.5]));
    }

    #[test]
    fn test_int_division_wraps_at_min() {
        assert_eq!(floor_div(i64::MIN, -1), i64::MIN);
        assert_eq!(
            arithmetic(BinaryOp::FloorDiv, &Value::Int(i64::MIN), &Value::Int(-1)).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            arithmetic(BinaryOp::Mod, &Value::Int(i64::MIN), &Value::Int(-1)).unwrap(),
            Value::Int(0)
        );
        assert_eq!(floor_div(-7, 2), -4);
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(
            eval("(dna_end - dna_start > 14) & startswith(R1, 'GA')").unwrap(),
            ColumnData::Bool(vec![true, false, false])
        );
        assert_eq!(
            eval("not (score > 1) or readID == 'r2'").unwrap(),
            ColumnData::Bool(vec![true, true, false])
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("len(R1)").unwrap(), ColumnData::Int(vec![6, 4, 2]));
        assert_eq!(
            eval("where(dna_start > 0, readID, 'none')").unwrap(),
            ColumnData::Str(vec!["r1".into(), "none".into(), "r3".into()])
        );
        assert_eq!(
            eval("match(R1, '^[ACGT]*GA')").unwrap(),
            ColumnData::Bool(vec![true, true, false])
        );
        assert_eq!(eval("max(dna_start, 1)").unwrap(), ColumnData::Int(vec![2, 1, 1]));
        assert_eq!(eval("min(dna_end)").unwrap(), ColumnData::Int(vec![10, 10, 10]));
        assert_eq!(
            eval("str(dna_start) + '_' + readID").unwrap(),
            ColumnData::Str(vec!["2_r1".into(), "0_r2".into(), "1_r3".into()])
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(eval("missing + 1"), Err(ToolError::KeyNotFound(_))));
        assert!(matches!(eval("R1 - 1"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(eval("dna_start // 0"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(eval("match(R1, '(')"), Err(ToolError::InvalidExpression(_))));
    }

    #[test]
    fn test_schema_chain_and_format() {
        let specs = parse_schema(
            "dna_len\tint8\tdna_end - dna_start\nlong\tbool\tdna_len > 15\n\ncode\tstr\tdna_len * 2\n",
        )
        .unwrap();
        let out = evaluate_columns(&specs, &tables()).unwrap();
        assert_eq!(out.column_names(), vec!["dna_len", "long", "code"]);
        assert_eq!(
            out.column("long").unwrap().data,
            ColumnData::Bool(vec![true, false, true])
        );
        assert_eq!(
            out.column("code").unwrap().data,
            ColumnData::Str(vec!["36".into(), "20".into(), "58".into()])
        );

        let too_big = parse_schema("x\tint8\tdna_end * 100\n").unwrap();
        assert!(matches!(
            evaluate_columns(&too_big, &tables()),
            Err(ToolError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_prohibited_names() {
        for name in ["a.b", "a-b", "x%", "e@mail"] {
            assert!(matches!(validate_name(name), Err(ToolError::Configuration(_))));
        }
        assert!(validate_name("dna_len2").is_ok());
    }
}
