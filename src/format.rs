use crate::error::{Result, ToolError};
use crate::myio;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const HDF5_MAGIC: &[u8] = b"\x89HDF\r\n\x1a\n";
const PARQUET_MAGIC: &[u8] = b"PAR1";
const SNIFF_BYTES: usize = 1024;

/// On-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Tsv,
    Csv,
    Parquet,
    Hdf5,
}

impl Format {
    /// Field delimiter of the text formats.
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            Format::Tsv => Some(b'\t'),
            Format::Csv => Some(b','),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.delimiter().is_some()
    }

    fn from_extension(path: &Path) -> Option<Format> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let ext = name.rsplit_once('.')?.1;
        match ext {
            "csv" => Some(Format::Csv),
            "tsv" | "txt" | "bed" | "tab" => Some(Format::Tsv),
            "parquet" | "pq" => Some(Format::Parquet),
            "h5" | "hdf5" | "hdf" => Some(Format::Hdf5),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Format::Tsv => "TSV",
            Format::Csv => "CSV",
            Format::Parquet => "PARQUET",
            Format::Hdf5 => "HDF5",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Format {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TSV" => Ok(Format::Tsv),
            "CSV" => Ok(Format::Csv),
            "PARQUET" => Ok(Format::Parquet),
            "HDF5" => Ok(Format::Hdf5),
            _ => Err(format!(
                "unknown format '{}', use one of: TSV, CSV, PARQUET, HDF5",
                s
            )),
        }
    }
}

/// A format as given on the command line, where `AUTO` defers to [`guess_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Auto,
    Fixed(Format),
}

impl FormatArg {
    /// Concrete format for `path`.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Result<Format> {
        match self {
            FormatArg::Fixed(f) => Ok(*f),
            FormatArg::Auto => {
                let format = guess_format(&path)?;
                log::debug!(
                    "Guessed format {} for {}",
                    format,
                    path.as_ref().display()
                );
                Ok(format)
            }
        }
    }

    /// Output format: `AUTO` means "same as the input".
    pub fn or_same_as(&self, input: Format) -> Format {
        match self {
            FormatArg::Fixed(f) => *f,
            FormatArg::Auto => input,
        }
    }
}

impl Default for FormatArg {
    fn default() -> Self {
        FormatArg::Auto
    }
}

impl FromStr for FormatArg {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(FormatArg::Auto)
        } else {
            s.parse::<Format>().map(FormatArg::Fixed)
        }
    }
}

impl fmt::Display for FormatArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatArg::Auto => write!(f, "AUTO"),
            FormatArg::Fixed(format) => write!(f, "{}", format),
        }
    }
}

/// Delimiter that occurs the same non-zero number of times on every sampled line.
fn consistent_delimiter(lines: &[&str], delim: char) -> bool {
    let counts: Vec<usize> = lines.iter().map(|l| l.matches(delim).count()).collect();
    match counts.first() {
        Some(&first) if first > 0 => counts.iter().all(|&c| c == first),
        _ => false,
    }
}

/// Sniff a text sample: commas win over tabs, tabs over runs of spaces.
/// # Example
/// ```
/// use rnadnatools::format::{sniff_text, Format};
/// assert_eq!(sniff_text(b"a,b\n1,2\n"), Some(Format::Csv));
/// assert_eq!(sniff_text(b"a\tb\n1\t2\n"), Some(Format::Tsv));
/// assert_eq!(sniff_text(b"\x00\x01"), None);
/// ```
pub fn sniff_text(sample: &[u8]) -> Option<Format> {
    let text = std::str::from_utf8(sample).ok().or_else(|| {
        // the sample may cut a multi-byte character in half
        let valid = std::str::from_utf8(sample).err()?.valid_up_to();
        std::str::from_utf8(&sample[..valid]).ok()
    })?;
    if text.contains('\0') {
        return None;
    }
    let mut lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    // the last line is likely truncated
    if sample.len() >= SNIFF_BYTES && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return None;
    }
    if consistent_delimiter(&lines, ',') {
        Some(Format::Csv)
    } else if consistent_delimiter(&lines, '\t') || consistent_delimiter(&lines, ' ') {
        Some(Format::Tsv)
    } else {
        None
    }
}

/// Guess the file format of `path` from magic bytes, then content, then extension.
pub fn guess_format<P: AsRef<Path>>(path: P) -> Result<Format> {
    let path = path.as_ref();
    if path == Path::new("-") {
        return Err(ToolError::UnsupportedFormat(
            "cannot guess the format of stdin, please set it explicitly".to_string(),
        ));
    }
    let magic = myio::magic_bytes(path, HDF5_MAGIC.len())?;
    if magic.starts_with(HDF5_MAGIC) {
        return Ok(Format::Hdf5);
    }
    if magic.starts_with(PARQUET_MAGIC) {
        return Ok(Format::Parquet);
    }
    let sample = myio::head_bytes(path, SNIFF_BYTES)?;
    if let Some(format) = sniff_text(&sample) {
        return Ok(format);
    }
    Format::from_extension(path).ok_or_else(|| {
        ToolError::UnsupportedFormat(format!(
            "could not guess the format of {}, please set it explicitly",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_format() {
        assert_eq!("tsv".parse::<Format>().unwrap(), Format::Tsv);
        assert_eq!("Parquet".parse::<Format>().unwrap(), Format::Parquet);
        assert_eq!("auto".parse::<FormatArg>().unwrap(), FormatArg::Auto);
        assert!("xlsx".parse::<FormatArg>().is_err());
    }

    #[test]
    fn test_guess_by_content_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("table.txt");
        std::fs::write(&txt, "a,b,c\n1,2,3\n").unwrap();
        assert_eq!(guess_format(&txt).unwrap(), Format::Csv);

        let tabs = dir.path().join("a.csv");
        std::fs::write(&tabs, "x\ty\n").unwrap();
        assert_eq!(guess_format(&tabs).unwrap(), Format::Tsv);

        // a single column has no delimiter to sniff
        let single = dir.path().join("ids.csv");
        std::fs::write(&single, "readID\nr1\nr2\n").unwrap();
        assert_eq!(guess_format(&single).unwrap(), Format::Csv);

        let unknown = dir.path().join("a.dat");
        std::fs::write(&unknown, "chrom\tstart\nchr1\t5\n").unwrap();
        assert_eq!(guess_format(&unknown).unwrap(), Format::Tsv);

        let h5 = dir.path().join("b.dat");
        let mut f = std::fs::File::create(&h5).unwrap();
        f.write_all(HDF5_MAGIC).unwrap();
        f.write_all(&[0; 16]).unwrap();
        assert_eq!(guess_format(&h5).unwrap(), Format::Hdf5);

        let junk = dir.path().join("c.dat");
        std::fs::write(&junk, "nodelimiters\n").unwrap();
        assert!(matches!(
            guess_format(&junk),
            Err(ToolError::UnsupportedFormat(_))
        ));
    }
}
