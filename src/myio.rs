use flate2::read;
use flate2::write;
use flate2::Compression;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const BUFFER_SIZE: usize = 128 * 1024;

/// True when the path ends with a `.gz` extension.
/// # Example
/// ```
/// assert!(rnadnatools::myio::is_gz("reads.tsv.gz"));
/// assert!(!rnadnatools::myio::is_gz("reads.tsv"));
/// ```
pub fn is_gz<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().extension() == Some(OsStr::new("gz"))
}

/// Buffered output that may be gzip compressed.
/// Call [`Writer::finish`] once done so gzip trailer and flush errors are reported.
pub enum Writer {
    Plain(BufWriter<Box<dyn Write>>),
    Gz(BufWriter<write::GzEncoder<File>>),
}

impl Writer {
    fn open(path: &Path, file: File) -> Writer {
        if is_gz(path) {
            Writer::Gz(BufWriter::with_capacity(
                BUFFER_SIZE,
                write::GzEncoder::new(file, Compression::default()),
            ))
        } else {
            Writer::Plain(BufWriter::with_capacity(BUFFER_SIZE, Box::new(file)))
        }
    }

    /// Flush buffers and write the gzip trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Writer::Plain(mut w) => w.flush(),
            Writer::Gz(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Writer::Plain(w) => w.write(buf),
            Writer::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Writer::Plain(w) => w.flush(),
            Writer::Gz(w) => w.flush(),
        }
    }
}

/// Write normal or compressed files seamlessly.
/// Uses the presence of a `.gz` extension to decide, `-` is stdout.
pub fn writer<P: AsRef<Path>>(filename: P) -> io::Result<Writer> {
    let path = filename.as_ref();
    if path == Path::new("-") {
        return Ok(Writer::Plain(BufWriter::with_capacity(
            BUFFER_SIZE,
            Box::new(io::stdout()),
        )));
    }
    let file = File::create(path).map_err(|why| {
        io::Error::new(why.kind(), format!("couldn't open {}: {}", path.display(), why))
    })?;
    Ok(Writer::open(path, file))
}

/// Same as [`writer`] but appends to an existing file.
/// A gzipped file gets a new gzip member, which readers concatenate.
pub fn append_writer<P: AsRef<Path>>(filename: P) -> io::Result<Writer> {
    let path = filename.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|why| {
            io::Error::new(why.kind(), format!("couldn't open {}: {}", path.display(), why))
        })?;
    Ok(Writer::open(path, file))
}

/// Read normal or compressed files seamlessly.
/// Uses the presence of a `.gz` extension to decide, `-` is stdin.
pub fn reader<P: AsRef<Path>>(filename: P) -> io::Result<Box<dyn BufRead>> {
    let path = filename.as_ref();
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, io::stdin())));
    }
    let file = File::open(path).map_err(|why| {
        io::Error::new(why.kind(), format!("couldn't open {}: {}", path.display(), why))
    })?;

    if is_gz(path) {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            read::MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// First `n` bytes of a file, decompressed when needed.
pub fn head_bytes<P: AsRef<Path>>(filename: P, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    reader(filename)?.take(n as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// First `n` raw bytes of a file, never decompressed.
pub fn magic_bytes<P: AsRef<Path>>(filename: P, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    File::open(filename)?.take(n as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gz_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.tsv.gz");
        let mut w = writer(&path).unwrap();
        writeln!(w, "a\tb").unwrap();
        w.finish().unwrap();
        let mut w = append_writer(&path).unwrap();
        writeln!(w, "1\t2").unwrap();
        w.finish().unwrap();
        let lines: Vec<String> = reader(&path).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a\tb", "1\t2"]);
        assert_eq!(magic_bytes(&path, 2).unwrap(), vec![0x1f, 0x8b]);
        assert_eq!(head_bytes(&path, 3).unwrap(), b"a\tb".to_vec());
    }
}
