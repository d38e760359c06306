use crate::closest::StrandFilter;
use crate::format::FormatArg;
use crate::table::ColumnSelector;
use clap::IntoApp;
use clap::{AppSettings, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    propagate_version = true,
    subcommand_required = true,
    infer_subcommands = true,
    arg_required_else_help = true,
    help_expected = true
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
pub struct Cli {
    /// Logging level [-v: Info, -vv: Debug, -vvv: Trace].
    #[clap(short, long, parse(from_occurrences), help_heading = "DEBUG")]
    pub verbose: usize,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

///
/// Command groups of rnadnatools.
///
/// Each group holds its own subcommands, e.g. `rnadnatools table align`
/// or `rnadnatools segment find-closest`.
///
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Table utils: align, convert, dump, evaluate, merge, stack, stats, wc, head.
    Table {
        #[clap(subcommand)]
        command: TableCommands,
    },
    /// Segment utils for RNA-DNA interactions.
    Segment {
        #[clap(subcommand)]
        command: SegmentCommands,
    },
    /// Read utils for RNA-DNA interactions.
    Read {
        #[clap(subcommand)]
        command: ReadCommands,
    },
    /// Genome utils.
    Genome {
        #[clap(subcommand)]
        command: GenomeCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TableCommands {
    /// Align INPUT_TABLE to the order of keys in REFERENCE_TABLE.
    ///
    /// The output has one row per reference key, in reference order. Rows of the
    /// input with keys absent from the reference are dropped, reference keys absent
    /// from the input get the fill values.
    Align {
        /// Input table.
        input: PathBuf,
        /// Reference table with the key order.
        reference: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Key column name in the input table.
        #[clap(long)]
        key_colname: Option<String>,
        /// Key column index in the input table. Cannot be used with --key-colname.
        #[clap(long)]
        key_column: Option<usize>,
        /// Key column name in the reference table.
        #[clap(long)]
        ref_colname: Option<String>,
        /// Key column index in the reference table. Cannot be used with --ref-colname.
        #[clap(long)]
        ref_column: Option<usize>,
        /// Fill values for unmatched rows, comma separated: one value for all
        /// columns, or a list cycled over the input columns.
        #[clap(long, default_value = "0")]
        fill_values: String,
        /// New names for the input columns, comma separated.
        #[clap(long)]
        new_colnames: Option<String>,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Reference format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        ref_format: FormatArg,
        /// Output format, auto is the input format.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
        /// Keep the key column in the output.
        #[clap(long)]
        keep_key: bool,
        /// Drop the key column from the output (default).
        #[clap(long, overrides_with = "keep-key")]
        drop_key: bool,
        /// The input table starts with a header line (default).
        #[clap(long, overrides_with = "no-input-header")]
        input_header: bool,
        /// The input table has no header line.
        #[clap(long, overrides_with = "input-header")]
        no_input_header: bool,
        /// The reference table starts with a header line (default).
        #[clap(long, overrides_with = "no-ref-header")]
        ref_header: bool,
        /// The reference table has no header line.
        #[clap(long, overrides_with = "ref-header")]
        no_ref_header: bool,
        /// Stream the input table in chunks of this many rows.
        #[clap(long)]
        chunksize: Option<usize>,
        /// Rows per output write when streaming.
        #[clap(long, default_value_t = crate::align::DEFAULT_WRITE_BATCH)]
        write_batch: usize,
        /// Fill reference keys that never show up in a streamed input instead of failing.
        #[clap(long)]
        allow_missing: bool,
    },
    /// Convert a table into another format.
    Convert {
        /// Input table.
        input: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Output format, auto is the input format.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
        /// Rows per chunk.
        #[clap(long, default_value_t = crate::tableio::DEFAULT_CHUNKSIZE)]
        chunksize: usize,
        /// Template for the new column names, e.g. "{colname}__R1".
        #[clap(short, long)]
        col_modifier: Option<String>,
    },
    /// Dump selected columns of the rows passing a boolean filter column.
    Dump {
        /// Input table.
        input: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Output format, auto is the input format.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
        /// Boolean column (name or index) used as a row filter.
        #[clap(short, long)]
        filter: Option<ColumnSelector>,
        /// Comma separated column names or indexes to dump.
        #[clap(short, long)]
        columns: Option<String>,
        /// Rows per chunk.
        #[clap(long, default_value_t = crate::tableio::DEFAULT_CHUNKSIZE)]
        chunksize: usize,
    },
    /// Evaluate new columns from expressions over the input tables.
    ///
    /// COLUMN_SCHEMA has tab separated lines: name, format, expression.
    Evaluate {
        /// Column schema file.
        schema: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Input tables.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Output format, auto is the format of the first input.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
    },
    /// Merge tables with the same number of rows side by side.
    Merge {
        /// Output table.
        output: PathBuf,
        /// Input tables.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Output format, auto is the format of the first input.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
        /// One column name template per input, comma separated, e.g. "{colname}_rna,{colname}_dna".
        #[clap(short, long)]
        col_modifiers: Option<String>,
    },
    /// Stack tables with the same columns one under another.
    Stack {
        /// Output table.
        output: PathBuf,
        /// Input tables.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Output format, auto is the format of the first input.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
    },
    /// Count the values that are not False/0 in each column.
    Stats {
        /// Input table.
        input: PathBuf,
        /// Output file with name and count per line.
        #[clap(default_value = "-")]
        output: PathBuf,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Comma separated column names or indexes to count.
        #[clap(short, long)]
        columns: Option<String>,
        /// Rows per chunk.
        #[clap(long, default_value_t = crate::tableio::DEFAULT_CHUNKSIZE)]
        chunksize: usize,
    },
    /// Print the number of rows.
    Wc {
        /// Input table.
        input: PathBuf,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
    },
    /// Print the first rows as TSV.
    Head {
        /// Input table.
        input: PathBuf,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Number of rows to print.
        #[clap(short, long, default_value_t = 10)]
        nrows: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum SegmentCommands {
    /// Distances from interval starts and ends to the closest annotation sites.
    ///
    /// Writes start_left, start_right, end_left and end_right per interval; -1
    /// for chromosomes without sites.
    FindClosest {
        /// Intervals (chrom, start, end).
        input: PathBuf,
        /// Annotation sites (chrom, position, strand).
        reference: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Strand of the sites to use [+, -, b].
        #[clap(short, long, default_value = "b")]
        strand: StrandFilter,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Reference format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        ref_format: FormatArg,
        /// Output format, auto is the input format.
        #[clap(short, long, default_value = "auto")]
        out_format: FormatArg,
        /// Interval columns (chrom, start, end), names or indexes.
        #[clap(long, alias = "key-colnames", default_value = "chrom,start,end")]
        key_columns: String,
        /// Site columns (chrom, position, strand), names or indexes.
        #[clap(long, alias = "ref-colnames", default_value = "chrom,start,strand")]
        ref_columns: String,
        /// Names of the four output columns.
        #[clap(
            short = 'c',
            long,
            default_value = "start_left,start_right,end_left,end_right"
        )]
        output_columns: String,
        /// Rows per input chunk.
        #[clap(long, default_value_t = crate::tableio::DEFAULT_CHUNKSIZE)]
        chunksize: usize,
        /// The interval table starts with a header line (default).
        #[clap(long, overrides_with = "no-input-header")]
        input_header: bool,
        /// The interval table has no header line.
        #[clap(long, overrides_with = "input-header")]
        no_input_header: bool,
        /// The site table starts with a header line (default).
        #[clap(long, overrides_with = "no-ref-header")]
        ref_header: bool,
        /// The site table has no header line.
        #[clap(long, overrides_with = "ref-header")]
        no_ref_header: bool,
    },
    /// Write FASTQ records from read tables, sliced to [start, end).
    ExtractFastq {
        /// Output FASTQ file.
        output: PathBuf,
        /// Input tables holding the keys below.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Input format [auto, tsv, csv, parquet, hdf5].
        #[clap(short, long, default_value = "auto")]
        in_format: FormatArg,
        /// Expression selecting the reads to write, e.g. "dna_end-dna_start>14".
        #[clap(short, long)]
        selection_expression: Option<String>,
        /// Column with the slice start.
        #[clap(long, default_value = "dna_start")]
        key_start: String,
        /// Column with the slice end.
        #[clap(long, default_value = "dna_end")]
        key_end: String,
        /// Column with the read id.
        #[clap(long, default_value = "readID")]
        key_readid: String,
        /// Column with the read sequence.
        #[clap(long, default_value = "R1")]
        key_seq: String,
        /// Column with the read qualities.
        #[clap(long, default_value = "Q1")]
        key_qual: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReadCommands {
    /// Check that the reads carry an oligo at a shift from the hit position.
    ///
    /// Reads FASTQ_TABLE and REFERENCE_TABLE line by line in lockstep.
    CheckNucleotides {
        /// Read table.
        reads: PathBuf,
        /// Table with the oligo hit positions.
        hits: PathBuf,
        /// Output table.
        output: PathBuf,
        /// Sequence of the oligo.
        #[clap(long)]
        oligo: String,
        /// Name of the oligo for the output header, defaults to --oligo.
        #[clap(long)]
        oligo_name: Option<String>,
        /// Read id column name in the read table.
        #[clap(long)]
        readid_colname: Option<String>,
        /// Read id column index. Cannot be used with --readid-colname.
        #[clap(long)]
        readid_column: Option<usize>,
        /// Sequence column name in the read table.
        #[clap(long)]
        seq_colname: Option<String>,
        /// Sequence column index. Cannot be used with --seq-colname.
        #[clap(long)]
        seq_column: Option<usize>,
        /// Oligo position column name in the hit table.
        #[clap(long)]
        ref_colname: Option<String>,
        /// Oligo position column index. Cannot be used with --ref-colname.
        #[clap(long)]
        ref_column: Option<usize>,
        /// Shift relative to the oligo position, 35 is the bridge end in RedC.
        #[clap(long, default_value_t = 35, allow_hyphen_values = true)]
        shift: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum GenomeCommands {
    /// Recognition sites of a restriction enzyme as BED6 (start, end, strand).
    RenzymesRecsites {
        /// Genome FASTA.
        genome: PathBuf,
        /// Restriction enzyme name, e.g. DpnII.
        enzyme: String,
        /// Output BED file.
        output: PathBuf,
    },
}

pub fn make_cli_parse() -> Cli {
    Cli::parse()
}

pub fn make_cli_app() -> clap::Command<'static> {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_valid() {
        make_cli_app().debug_assert();
    }

    #[test]
    fn test_parse_align() {
        let cli = Cli::try_parse_from([
            "rnadnatools",
            "-vv",
            "table",
            "align",
            "in.tsv",
            "ref.tsv",
            "out.tsv",
            "--key-colname",
            "id",
            "--ref-column",
            "0",
            "--keep-key",
            "-o",
            "parquet",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Table {
                command:
                    TableCommands::Align {
                        key_colname,
                        ref_column,
                        keep_key,
                        drop_key,
                        out_format,
                        chunksize,
                        ..
                    },
            }) => {
                assert_eq!(key_colname.as_deref(), Some("id"));
                assert_eq!(ref_column, Some(0));
                assert!(keep_key && !drop_key);
                assert_eq!(out_format, "parquet".parse().unwrap());
                assert_eq!(chunksize, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_header_flags_last_one_wins() {
        let cli = Cli::try_parse_from([
            "rnadnatools",
            "table",
            "align",
            "in.tsv",
            "ref.tsv",
            "out.tsv",
            "--no-input-header",
            "--input-header",
            "--ref-header",
            "--no-ref-header",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Table {
                command:
                    TableCommands::Align {
                        input_header,
                        no_input_header,
                        ref_header,
                        no_ref_header,
                        ..
                    },
            }) => {
                assert!(input_header && !no_input_header);
                assert!(!ref_header && no_ref_header);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "rnadnatools",
            "segment",
            "find-closest",
            "a.bed",
            "sites.tsv",
            "out.tsv",
            "--input-header",
            "--no-ref-header",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Segment {
                command:
                    SegmentCommands::FindClosest {
                        input_header,
                        no_input_header,
                        no_ref_header,
                        ..
                    },
            }) => {
                assert!(input_header && !no_input_header);
                assert!(no_ref_header);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_find_closest_defaults() {
        let cli = Cli::try_parse_from([
            "rnadnatools",
            "segment",
            "find-closest",
            "a.bed",
            "sites.tsv",
            "out.tsv",
            "-s",
            "+",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Segment {
                command:
                    SegmentCommands::FindClosest {
                        strand,
                        key_columns,
                        chunksize,
                        ..
                    },
            }) => {
                assert_eq!(strand, StrandFilter::Plus);
                assert_eq!(key_columns, "chrom,start,end");
                assert_eq!(chunksize, 1_000_000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
