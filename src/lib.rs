//! # Command line interface for rnadnatools
//! [rnadnatools command line interface, subcommands, and options.](cli::Commands)
//! # README for rnadnatools
#![doc = include_str!("../README.md")]
/// Align a table to the key order of a reference table.
pub mod align;
/// Command line interface for rnadnatools.
pub mod cli;
/// Distances from intervals to the closest annotation sites.
pub mod closest;
/// Merge tables side by side or stack them.
pub mod combine;
/// Format conversion and filtered dumps of tables.
pub mod convert;
/// Error type shared by all commands.
pub mod error;
/// Column evaluation over input tables.
pub mod evaluate;
/// Parser for the restricted column expression language.
pub mod expr;
/// FASTQ output from read tables.
pub mod fastq;
/// Table formats and format detection.
pub mod format;
/// HDF5 tables stored as one dataset per column.
#[cfg(feature = "hdf5")]
pub mod h5;
/// Module for automatically reading a writing compressed or uncompressed files.
pub mod myio;
/// Check oligo nucleotides at shifted positions in reads.
pub mod nucleotides;
/// Conversion between tables and polars data frames for parquet IO.
pub mod parquet;
/// Restriction enzyme recognition sites in a genome.
pub mod renzymes;
/// Stats, row counts and heads of tables.
pub mod summary;
/// In-memory columnar tables.
pub mod table;
/// Chunked reading and writing of tables.
pub mod tableio;
