use anyhow::Context;
use colored::Colorize;
use env_logger::{Builder, Target};
use log::LevelFilter;
use rnadnatools::align::{AlignFiles, AlignOptions};
use rnadnatools::cli::{Commands, GenomeCommands, ReadCommands, SegmentCommands, TableCommands};
use rnadnatools::closest::ClosestFiles;
use rnadnatools::fastq::FastqKeys;
use rnadnatools::nucleotides::{OligoCheck, ReadColumns};
use rnadnatools::table::ColumnSelector;
use rnadnatools::*;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    parse_cli()
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_cli() -> anyhow::Result<()> {
    let pg_start = Instant::now();
    let args = cli::make_cli_parse();
    let matches = cli::make_cli_app().get_matches();
    let subcommand = match matches.subcommand() {
        Some((group, sub)) => format!("{} {}", group, sub.subcommand_name().unwrap_or_default()),
        None => String::new(),
    };

    // set the logging level
    let min_log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .target(Target::Stderr)
        .filter(None, min_log_level)
        .init();

    log::debug!("DEBUG logging enabled");
    log::trace!("TRACE logging enabled");

    match args.command {
        //
        // table commands
        //
        Some(Commands::Table { command }) => match command {
            TableCommands::Align {
                input,
                reference,
                output,
                key_colname,
                key_column,
                ref_colname,
                ref_column,
                fill_values,
                new_colnames,
                in_format,
                ref_format,
                out_format,
                keep_key,
                drop_key,
                input_header,
                no_input_header,
                ref_header,
                no_ref_header,
                chunksize,
                write_batch,
                allow_missing,
            } => {
                let opts = AlignOptions {
                    key: ColumnSelector::from_options(key_colname.as_deref(), key_column, "key")?,
                    fill_values: split_list(&fill_values),
                    new_colnames: new_colnames.as_deref().map(split_list),
                    drop_key: drop_key || !keep_key,
                    allow_missing,
                };
                let ref_key =
                    ColumnSelector::from_options(ref_colname.as_deref(), ref_column, "ref")?;
                let files = AlignFiles {
                    input: &input,
                    reference: &reference,
                    output: &output,
                    in_format,
                    ref_format,
                    out_format,
                    input_header: input_header || !no_input_header,
                    ref_header: ref_header || !no_ref_header,
                };
                align::run_align(&files, &ref_key, &opts, chunksize, write_batch)
                    .with_context(|| format!("aligning {}", input.display()))?;
            }
            TableCommands::Convert {
                input,
                output,
                in_format,
                out_format,
                chunksize,
                col_modifier,
            } => {
                convert::convert(
                    &input,
                    &output,
                    in_format,
                    out_format,
                    chunksize,
                    col_modifier.as_deref(),
                )
                .with_context(|| format!("converting {}", input.display()))?;
            }
            TableCommands::Dump {
                input,
                output,
                in_format,
                out_format,
                filter,
                columns,
                chunksize,
            } => {
                let columns = columns.as_deref().map(ColumnSelector::parse_list);
                convert::dump(
                    &input,
                    &output,
                    in_format,
                    out_format,
                    filter.as_ref(),
                    columns.as_deref(),
                    chunksize,
                )
                .with_context(|| format!("dumping {}", input.display()))?;
            }
            TableCommands::Evaluate {
                schema,
                output,
                inputs,
                in_format,
                out_format,
            } => {
                evaluate::run_evaluate(&schema, &output, &inputs, in_format, out_format)
                    .with_context(|| format!("evaluating {}", schema.display()))?;
            }
            TableCommands::Merge {
                output,
                inputs,
                in_format,
                out_format,
                col_modifiers,
            } => {
                let modifiers = col_modifiers.as_deref().map(split_list);
                combine::merge(&output, &inputs, in_format, out_format, modifiers.as_deref())?;
            }
            TableCommands::Stack {
                output,
                inputs,
                in_format,
                out_format,
            } => {
                combine::stack(&output, &inputs, in_format, out_format)?;
            }
            TableCommands::Stats {
                input,
                output,
                in_format,
                columns,
                chunksize,
            } => {
                let columns = columns.as_deref().map(ColumnSelector::parse_list);
                summary::stats(&input, &output, in_format, columns.as_deref(), chunksize)
                    .with_context(|| format!("counting values in {}", input.display()))?;
            }
            TableCommands::Wc { input, in_format } => {
                let rows = summary::count_rows(&input, in_format)
                    .with_context(|| format!("counting rows in {}", input.display()))?;
                println!("{}", rows);
            }
            TableCommands::Head {
                input,
                in_format,
                nrows,
            } => {
                summary::print_head(&input, in_format, nrows)?;
            }
        },
        //
        // segment commands
        //
        Some(Commands::Segment { command }) => match command {
            SegmentCommands::FindClosest {
                input,
                reference,
                output,
                strand,
                in_format,
                ref_format,
                out_format,
                key_columns,
                ref_columns,
                output_columns,
                chunksize,
                input_header,
                no_input_header,
                ref_header,
                no_ref_header,
            } => {
                let files = ClosestFiles {
                    input: &input,
                    reference: &reference,
                    output: &output,
                    in_format,
                    ref_format,
                    out_format,
                    input_header: input_header || !no_input_header,
                    ref_header: ref_header || !no_ref_header,
                };
                closest::run_find_closest(
                    &files,
                    &ColumnSelector::parse_list(&key_columns),
                    &ColumnSelector::parse_list(&ref_columns),
                    strand,
                    &split_list(&output_columns),
                    chunksize,
                )
                .with_context(|| format!("finding closest sites for {}", input.display()))?;
            }
            SegmentCommands::ExtractFastq {
                output,
                inputs,
                in_format,
                selection_expression,
                key_start,
                key_end,
                key_readid,
                key_seq,
                key_qual,
            } => {
                let keys = FastqKeys {
                    readid: key_readid,
                    seq: key_seq,
                    qual: key_qual,
                    start: key_start,
                    end: key_end,
                };
                fastq::extract_fastq(
                    &output,
                    &inputs,
                    in_format,
                    selection_expression.as_deref(),
                    &keys,
                )?;
            }
        },
        //
        // read commands
        //
        Some(Commands::Read { command }) => match command {
            ReadCommands::CheckNucleotides {
                reads,
                hits,
                output,
                oligo,
                oligo_name,
                readid_colname,
                readid_column,
                seq_colname,
                seq_column,
                ref_colname,
                ref_column,
                shift,
            } => {
                let columns = ReadColumns {
                    readid: ColumnSelector::from_options(
                        readid_colname.as_deref(),
                        readid_column,
                        "readid",
                    )?,
                    seq: ColumnSelector::from_options(seq_colname.as_deref(), seq_column, "seq")?,
                    reference: ColumnSelector::from_options(
                        ref_colname.as_deref(),
                        ref_column,
                        "ref",
                    )?,
                };
                let check = OligoCheck::new(&oligo, oligo_name.as_deref(), shift);
                nucleotides::check_nucleotides(&reads, &hits, &output, &columns, &check)
                    .with_context(|| format!("checking {} in {}", oligo, reads.display()))?;
            }
        },
        //
        // genome commands
        //
        Some(Commands::Genome { command }) => match command {
            GenomeCommands::RenzymesRecsites {
                genome,
                enzyme,
                output,
            } => {
                renzymes::renzymes_recsites(&genome, &enzyme, &output)
                    .with_context(|| format!("searching {} sites in {}", enzyme, genome.display()))?;
            }
        },
        //
        // no command opt
        //
        None => {}
    };

    let duration = pg_start.elapsed();
    log::info!(
        "{} done! Time elapsed: {}",
        subcommand.bright_green().bold(),
        format!("{:.2?}", duration).bright_yellow().bold()
    );
    Ok(())
}
