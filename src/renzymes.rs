use crate::error::{Result, ToolError};
use crate::myio;
use bio::alphabets::dna::revcomp;
use bio::io::fasta;
use bio_types::strand::Strand;
use std::io::Write;
use std::path::Path;

/// A restriction enzyme and its recognition sequence (IUPAC codes allowed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enzyme {
    pub name: &'static str,
    pub site: &'static str,
}

pub static ENZYMES: &[Enzyme] = &[
    Enzyme { name: "DpnII", site: "GATC" },
    Enzyme { name: "MboI", site: "GATC" },
    Enzyme { name: "Sau3AI", site: "GATC" },
    Enzyme { name: "HindIII", site: "AAGCTT" },
    Enzyme { name: "NcoI", site: "CCATGG" },
    Enzyme { name: "NlaIII", site: "CATG" },
    Enzyme { name: "EcoRI", site: "GAATTC" },
    Enzyme { name: "BamHI", site: "GGATCC" },
    Enzyme { name: "CviQI", site: "GTAC" },
    Enzyme { name: "MseI", site: "TTAA" },
    Enzyme { name: "AluI", site: "AGCT" },
    Enzyme { name: "HinfI", site: "GANTC" },
    Enzyme { name: "DdeI", site: "CTNAG" },
    Enzyme { name: "BsaI", site: "GGTCTC" },
    Enzyme { name: "BsmBI", site: "CGTCTC" },
];

impl Enzyme {
    /// Case-insensitive lookup in the built-in table.
    /// # Example
    /// ```
    /// use rnadnatools::renzymes::Enzyme;
    /// assert_eq!(Enzyme::by_name("dpnii").unwrap().site, "GATC");
    /// assert!(Enzyme::by_name("NotAnEnzyme").is_err());
    /// ```
    pub fn by_name(name: &str) -> Result<&'static Enzyme> {
        ENZYMES
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ToolError::config(format!(
                    "unknown restriction enzyme {}, available: {}",
                    name,
                    ENZYMES
                        .iter()
                        .map(|e| e.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    pub fn is_palindromic(&self) -> bool {
        revcomp(self.site.as_bytes()) == self.site.as_bytes()
    }
}

/// Does IUPAC `code` match the (uppercase) base?
fn iupac_matches(code: u8, base: u8) -> bool {
    let bases: &[u8] = match code {
        b'A' | b'C' | b'G' | b'T' => return code == base,
        b'R' => b"AG",
        b'Y' => b"CT",
        b'S' => b"CG",
        b'W' => b"AT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        b'N' => b"ACGT",
        _ => return false,
    };
    bases.contains(&base)
}

/// All (overlapping) 0-based start positions of `pattern` in `seq`.
/// # Example
/// ```
/// use rnadnatools::renzymes::find_all;
/// assert_eq!(find_all(b"AAAA", b"AA"), vec![0, 1, 2]);
/// assert_eq!(find_all(b"GAATCGACTC", b"GANTC"), vec![0, 5]);
/// ```
pub fn find_all(seq: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || seq.len() < pattern.len() {
        return Vec::new();
    }
    seq.windows(pattern.len())
        .enumerate()
        .filter(|(_, w)| {
            w.iter()
                .zip(pattern)
                .all(|(b, p)| iupac_matches(*p, b.to_ascii_uppercase()))
        })
        .map(|(i, _)| i)
        .collect()
}

/// One recognition site, BED style `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecSite {
    pub chrom: String,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
}

/// Recognition sites of `enzyme` in one sequence. A palindromic site is
/// reported once on `+`; a minus strand hit that also matches on `+` is
/// reported on `-` only.
pub fn sites_in(chrom: &str, seq: &[u8], enzyme: &Enzyme) -> Vec<RecSite> {
    let site = enzyme.site.as_bytes();
    let site_at = |start: usize, strand: Strand| RecSite {
        chrom: chrom.to_string(),
        start,
        end: start + site.len(),
        strand,
    };
    let plus = find_all(seq, site);
    if enzyme.is_palindromic() {
        return plus.into_iter().map(|s| site_at(s, Strand::Forward)).collect();
    }
    let minus = find_all(seq, &revcomp(site));
    let mut sites: Vec<RecSite> = plus
        .into_iter()
        .filter(|s| minus.binary_search(s).is_err())
        .map(|s| site_at(s, Strand::Forward))
        .chain(minus.iter().map(|&s| site_at(s, Strand::Reverse)))
        .collect();
    sites.sort_by_key(|s| s.start);
    sites
}

/// Sort by chromosome (natural order) then start.
pub fn sort_sites(sites: &mut [RecSite]) {
    sites.sort_by(|a, b| natord::compare(&a.chrom, &b.chrom).then(a.start.cmp(&b.start)));
}

/// Write `chrom start end name . strand` lines, names numbered from 1.
pub fn write_sites<W: Write>(sites: &[RecSite], enzyme: &Enzyme, out: &mut W) -> Result<()> {
    for (i, site) in sites.iter().enumerate() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}_{}\t.\t{}",
            site.chrom,
            site.start,
            site.end,
            enzyme.name,
            i + 1,
            site.strand.strand_symbol()
        )?;
    }
    Ok(())
}

/// Run `genome renzymes-recsites`. Returns the number of sites.
/// # Example
/// ```
/// use std::path::Path;
/// let n = rnadnatools::renzymes::renzymes_recsites(
///     Path::new(".test/genome.fa"),
///     "DpnII",
///     Path::new("-"),
/// )
/// .unwrap();
/// assert_eq!(n, 3);
/// ```
pub fn renzymes_recsites(genome: &Path, enzyme: &str, output: &Path) -> Result<usize> {
    let enzyme = Enzyme::by_name(enzyme)?;
    let reader = fasta::Reader::new(myio::reader(genome)?);
    let mut sites = Vec::new();
    for record in reader.records() {
        let record = record?;
        let found = sites_in(record.id(), record.seq(), enzyme);
        log::debug!("{} sites of {} on {}", found.len(), enzyme.name, record.id());
        sites.extend(found);
    }
    sort_sites(&mut sites);

    let mut out = myio::writer(output)?;
    write_sites(&sites, enzyme, &mut out)?;
    out.finish()?;
    log::info!(
        "Found {} recognition sites of {} ({}) in {}",
        sites.len(),
        enzyme.name,
        enzyme.site,
        genome.display()
    );
    Ok(sites.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palindromic() {
        let dpn = Enzyme::by_name("DpnII").unwrap();
        assert!(dpn.is_palindromic());
        assert!(!Enzyme::by_name("BsaI").unwrap().is_palindromic());
        let sites = sites_in("chr1", b"ttGATCaaGATC", dpn);
        assert_eq!(sites.len(), 2);
        assert_eq!((sites[0].start, sites[0].end), (2, 6));
        assert!(sites.iter().all(|s| s.strand == Strand::Forward));
    }

    #[test]
    fn test_both_strands() {
        let bsai = Enzyme::by_name("BsaI").unwrap();
        // GAGACC is the reverse complement of GGTCTC
        let sites = sites_in("chr1", b"AGAGACCTTGGTCTCA", bsai);
        assert_eq!(
            sites,
            vec![
                RecSite { chrom: "chr1".into(), start: 1, end: 7, strand: Strand::Reverse },
                RecSite { chrom: "chr1".into(), start: 9, end: 15, strand: Strand::Forward },
            ]
        );
    }

    #[test]
    fn test_recsites_file() {
        let dir = tempfile::tempdir().unwrap();
        let genome = dir.path().join("genome.fa");
        let output = dir.path().join("sites.bed");
        std::fs::write(&genome, ">chr10\nGATCGATC\n>chr2\nAAGATCAA\n").unwrap();
        let n = renzymes_recsites(&genome, "MboI", &output).unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "chr2\t2\t6\tMboI_1\t.\t+\nchr10\t0\t4\tMboI_2\t.\t+\nchr10\t4\t8\tMboI_3\t.\t+\n"
        );
        assert!(renzymes_recsites(&genome, "Nope", &output).is_err());
    }
}
