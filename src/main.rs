//! vanno: streaming annotation of VCF and BED intervals
//!
//! Usage: vanno [OPTIONS] <CONFIG> <QUERY>

use clap::{Parser, ValueEnum};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use vanno::bed::BedReader;
use vanno::commands::{AnnotateOptions, Annotator};
use vanno::config::Config;
use vanno::error::Result;
use vanno::genome::{ChromOrder, Genome};
use vanno::input::{is_vcf_path, open_input, InputReader};
use vanno::reducers::ReducerRegistry;
use vanno::script::ScriptEngine;
use vanno::streaming::buffers::{DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY};
use vanno::streaming::output::{AnnotatedWriter, OutputFormat};
use vanno::streaming::producer::spawn_producer;
use vanno::vcf::VcfReader;

#[derive(Parser)]
#[command(name = "vanno")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "Annotate sorted VCF or BED intervals with values from sorted variant, region and depth sources", long_about = None)]
struct Cli {
    /// TOML file with one [[annotation]] table per source
    config: PathBuf,

    /// Query VCF or BED file, sorted (use - for stdin)
    query: PathBuf,

    /// Also annotate the first and last base of each query
    /// (fields are written as left_<name> and right_<name>)
    #[arg(long)]
    ends: bool,

    /// Match variants by position only, ignoring REF and ALT
    #[arg(long)]
    permissive_overlap: bool,

    /// Script file defining reducers used as ops named script:<function>
    #[arg(long)]
    script: Option<PathBuf>,

    /// Genome file giving the chromosome order of all inputs
    /// (default: ##contig order of a VCF query, else lexicographic)
    #[arg(short = 'g', long)]
    genome: Option<PathBuf>,

    /// Fail on out-of-order input instead of silently missing matches
    #[arg(long)]
    check_sorted: bool,

    /// Query format
    #[arg(long, value_enum, default_value = "auto")]
    format: QueryFormat,

    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Records buffered per input between reader threads and the merge
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    buffer: usize,

    /// Query records reduced together per parallel batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, hide = true)]
    batch_size: usize,

    /// Print annotation statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum QueryFormat {
    /// VCF for .vcf[.gz|.bgz] paths or input starting with a VCF header, else BED
    Auto,
    Vcf,
    Bed,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("vanno=debug")
        } else {
            EnvFilter::new("vanno=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
        {
            tracing::warn!("could not configure {} threads: {}", n, e);
        }
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// The opened query, header already consumed for VCF.
enum QueryReader {
    Vcf(VcfReader<InputReader>),
    Bed(BedReader<InputReader>),
}

fn run(cli: Cli) -> Result<()> {
    let registry = match &cli.script {
        Some(path) => ReducerRegistry::with_script(ScriptEngine::from_path(path)?),
        None => ReducerRegistry::new(),
    };
    let sources = Config::from_path(&cli.config)?.sources(&registry)?;

    let mut reader = open_input(&cli.query)?;
    let format = query_format(cli.format, &cli.query, &mut reader)?;
    let query_reader = match format {
        OutputFormat::Vcf => QueryReader::Vcf(VcfReader::new(reader)?),
        OutputFormat::Bed => QueryReader::Bed(BedReader::new(reader)),
    };

    let order = match (&cli.genome, &query_reader) {
        (Some(path), _) => ChromOrder::Genome(Genome::from_file(path)?),
        (None, QueryReader::Vcf(vcf)) => match vcf.header().genome() {
            Some(genome) => {
                tracing::debug!("chromosome order from {} ##contig lines", genome.len());
                ChromOrder::Genome(genome)
            }
            None => ChromOrder::Lexicographic,
        },
        (None, QueryReader::Bed(_)) => ChromOrder::Lexicographic,
    };
    let options = AnnotateOptions {
        strict: !cli.permissive_overlap,
        ends: cli.ends,
        batch_size: cli.batch_size.max(1),
        channel_capacity: cli.buffer.max(1),
        check_sorted: cli.check_sorted,
        chrom_order: Arc::new(order),
    };
    let annotator = Annotator::new(sources, registry).with_options(options);

    let stdout = io::stdout();
    let mut writer = AnnotatedWriter::new(stdout.lock(), format);
    let capacity = annotator.options.channel_capacity;
    let query_name = if cli.query.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        cli.query.display().to_string()
    };
    let (query, query_producer) = match query_reader {
        QueryReader::Vcf(vcf) => {
            writer.write_vcf_header(vcf.header(), &annotator.output_fields())?;
            spawn_producer(query_name, vcf.records(), capacity)?
        }
        QueryReader::Bed(bed) => spawn_producer(query_name, bed.records(), capacity)?,
    };

    let (inputs, mut producers) = annotator.open_sources()?;
    producers.push(query_producer);
    tracing::debug!(
        "annotating {} with {} source(s)",
        cli.query.display(),
        annotator.sources().len()
    );

    let stats = annotator.run(query, inputs, |record| writer.write(&record))?;
    writer.flush()?;

    for producer in producers {
        let name = producer.name().to_string();
        let sent = producer.join()?;
        tracing::debug!("{}: {} records streamed", name, sent);
    }

    if cli.stats {
        eprintln!("Annotate stats: {}", stats);
    }
    Ok(())
}

/// Resolve the query format, sniffing the first bytes for `auto`.
fn query_format(format: QueryFormat, path: &Path, reader: &mut InputReader) -> Result<OutputFormat> {
    Ok(match format {
        QueryFormat::Vcf => OutputFormat::Vcf,
        QueryFormat::Bed => OutputFormat::Bed,
        QueryFormat::Auto if is_vcf_path(path) => OutputFormat::Vcf,
        QueryFormat::Auto => {
            let head = reader.fill_buf()?;
            if head.starts_with(b"##fileformat=VCF") || head.starts_with(b"#CHROM") {
                OutputFormat::Vcf
            } else {
                OutputFormat::Bed
            }
        }
    })
}
