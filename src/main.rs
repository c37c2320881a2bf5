use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam::channel;
use tracing::{debug, info, warn};

use gtf_splice_graph::annotation::Locus;
use gtf_splice_graph::{
    AnnotationBuilder, AnnotationCatalog, EventEngine, EventSink, GenomeSequence, GraphConfig,
    IdNameKeys, InMemoryGenome, SinkConfig, SpliceGraph, SpliceGraphError, TsvWriter,
};

/// Build splicing graphs from a transcript annotation and report their events.
#[derive(Parser, Debug)]
#[command(name = "splice-graph")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a GTF/GFF annotation and write a binary catalog to disk
    Prepare(PrepareArgs),

    /// Print summary stats of an annotation or catalog
    Stats(StatsArgs),

    /// Enumerate alternative-splicing events of every gene locus
    Events(EventsArgs),

    /// Report the constitutive regions of every gene locus
    Constitutive(ConstitutiveArgs),
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Input annotation file (.gtf/.gff/.gff3, optionally .gz)
    #[arg(long, short)]
    annotation: PathBuf,

    /// Output catalog file
    #[arg(long, short)]
    catalog: PathBuf,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Annotation file or serialized catalog
    #[arg(long, short)]
    annotation: PathBuf,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct EventsArgs {
    /// Annotation file or serialized catalog
    #[arg(long, short)]
    annotation: PathBuf,

    /// Genome FASTA (optionally .gz); enables motif checks and frame prediction
    #[arg(long, short)]
    genome: Option<PathBuf>,

    /// Output TSV file (default: stdout)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Worker threads
    #[arg(long, short, default_value_t = 1)]
    threads: usize,

    /// Pause the workers once this many events wait for the writer
    #[arg(long, default_value_t = 4096)]
    high_water: usize,

    /// Resume the workers once the backlog drained to this size
    #[arg(long, default_value_t = 1024)]
    low_water: usize,

    #[command(flatten)]
    graph: GraphArgs,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct ConstitutiveArgs {
    /// Annotation file or serialized catalog
    #[arg(long, short)]
    annotation: PathBuf,

    /// Output TSV file (default: stdout)
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(flatten)]
    graph: GraphArgs,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct GraphArgs {
    /// Variants per event (2 = pairwise)
    #[arg(long = "arity", short = 'k', default_value_t = 2)]
    event_arity: usize,

    /// Drop transcripts with a non-canonical donor/acceptor (needs --genome)
    #[arg(long)]
    canonical_sites_only: bool,

    /// Extend transcript ends from sources above this confidence level
    #[arg(long, value_name = "LEVEL")]
    edge_confidence: Option<u8>,

    /// Check introns from sources above this confidence level
    #[arg(long, value_name = "LEVEL", default_value_t = u8::MAX)]
    intron_confidence: u8,

    /// Enable the canonical-motif and maximum-length intron check
    #[arg(long)]
    acceptable_intron_check: bool,

    /// Introns shorter than this are invalid
    #[arg(long, default_value_t = 0)]
    min_intron_length: u32,

    /// Longest acceptable intron (with --acceptable-intron-check)
    #[arg(long)]
    max_intron_length: Option<u32>,

    /// Annotate events with reading frames
    #[arg(long)]
    predict_cds: bool,

    /// Skip events anchored at a transcript start or end
    #[arg(long)]
    internal_events_only: bool,
}

impl GraphArgs {
    fn config(&self) -> GraphConfig {
        GraphConfig {
            canonical_sites_only: self.canonical_sites_only,
            edge_confidence: self.edge_confidence,
            intron_confidence: self.intron_confidence,
            acceptable_intron_check: self.acceptable_intron_check,
            min_intron_length: self.min_intron_length,
            max_intron_length: self.max_intron_length,
            event_arity: self.event_arity,
            predict_cds: self.predict_cds,
            internal_events_only: self.internal_events_only,
        }
    }
}

#[derive(Args, Debug)]
struct KeyArgs {
    // -------------------------
    // Attribute key options
    // -------------------------

    /// Attribute keys to use for gene ID (repeatable).
    #[arg(
        long = "gene-id-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["gene_id".to_string()]
    )]
    gene_id_keys: Vec<String>,

    /// Attribute keys to use for gene name (repeatable).
    #[arg(
        long = "gene-name-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["gene_name".to_string()]
    )]
    gene_name_keys: Vec<String>,

    /// Attribute keys to use for transcript ID (repeatable).
    #[arg(
        long = "transcript-id-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["transcript_id".to_string()]
    )]
    transcript_id_keys: Vec<String>,

    /// Attribute keys to use for transcript name (repeatable).
    #[arg(
        long = "transcript-name-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["transcript_name".to_string()]
    )]
    transcript_name_keys: Vec<String>,

    /// GFF3 exon->transcript linkage keys (repeatable).
    #[arg(
        long = "parent-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["Parent".to_string()]
    )]
    parent_keys: Vec<String>,

    /// Feature types that count as exon blocks (repeatable).
    #[arg(
        long = "exon-feature-type",
        value_name = "TYPE",
        num_args = 1..,
        default_values_t = vec!["exon".to_string()]
    )]
    exon_feature_types: Vec<String>,

    /// Feature types spanning the translated region (repeatable).
    #[arg(
        long = "cds-feature-type",
        value_name = "TYPE",
        num_args = 1..,
        default_values_t = vec!["CDS".to_string(), "start_codon".to_string(), "stop_codon".to_string()]
    )]
    cds_feature_types: Vec<String>,

    /// Numeric attribute holding the source confidence (repeatable).
    #[arg(
        long = "confidence-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["level".to_string()]
    )]
    confidence_keys: Vec<String>,
}

impl KeyArgs {
    fn keys(self) -> IdNameKeys {
        IdNameKeys {
            gene_id_keys: self.gene_id_keys,
            gene_name_keys: self.gene_name_keys,
            transcript_id_keys: self.transcript_id_keys,
            transcript_name_keys: self.transcript_name_keys,
            parent_keys: self.parent_keys,
            exon_feature_types: self.exon_feature_types,
            cds_feature_types: self.cds_feature_types,
            confidence_keys: self.confidence_keys,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Prepare(args) => {
            let catalog = AnnotationBuilder { keys: args.keys.keys() }
                .build_from_path(&args.annotation)
                .with_context(|| format!("building catalog from {}", args.annotation.display()))?;

            println!("{catalog}");

            catalog
                .save(&args.catalog)
                .with_context(|| format!("writing catalog to {}", args.catalog.display()))?;

            eprintln!("Catalog written to {}", args.catalog.display());
        }

        Command::Stats(args) => {
            let catalog = load_catalog(&args.annotation, args.keys.keys())?;
            println!("{catalog}");
        }

        Command::Events(args) => run_events(args)?,

        Command::Constitutive(args) => run_constitutive(args)?,
    }

    Ok(())
}

/// Serialized catalogs are recognised by their magic, anything else is parsed.
fn load_catalog(path: &Path, keys: IdNameKeys) -> Result<AnnotationCatalog> {
    if AnnotationCatalog::is_catalog_file(path) {
        return AnnotationCatalog::load(path)
            .with_context(|| format!("reading catalog {}", path.display()));
    }
    AnnotationBuilder { keys }
        .build_from_path(path)
        .with_context(|| format!("parsing annotation {}", path.display()))
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
    Ok(if is_gz {
        Box::new(BufReader::new(flate2::read::GzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    })
}

fn output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    Ok(match path {
        Some(p) => Box::new(File::create(p).with_context(|| format!("create {}", p.display()))?),
        None => Box::new(io::stdout()),
    })
}

fn run_events(args: EventsArgs) -> Result<()> {
    let config = args.graph.config();
    config.validate()?;
    let catalog = load_catalog(&args.annotation, args.keys.keys())?;

    let genome = match &args.genome {
        Some(path) => {
            let genome = InMemoryGenome::from_fasta(open_maybe_gz(path)?, catalog.chr_ids())
                .with_context(|| format!("loading genome {}", path.display()))?;
            info!(contigs = genome.len(), "loaded genome {}", path.display());
            Some(genome)
        }
        None => None,
    };

    let writer = TsvWriter::new(output(args.output.as_deref())?, catalog.chr_names.clone())?;
    let sink = EventSink::spawn(
        writer,
        SinkConfig {
            high_water: args.high_water,
            low_water: args.low_water,
        },
    )?;

    let loci = catalog.loci();
    info!(loci = loci.len(), threads = args.threads, "enumerating events");

    let (work_tx, work_rx) = channel::unbounded::<&Locus<'_>>();
    for locus in &loci {
        work_tx
            .send(locus)
            .map_err(|_| anyhow!("work queue closed"))?;
    }
    drop(work_tx);

    let emitted = crossbeam::scope(|s| -> Result<usize> {
        let mut workers = Vec::with_capacity(args.threads.max(1));
        for _ in 0..args.threads.max(1) {
            let work_rx = work_rx.clone();
            let producer = sink.producer();
            let config = &config;
            let genome = genome.as_ref();
            workers.push(s.spawn(move |_| -> Result<usize> {
                let genome = genome.map(|g| g as &dyn GenomeSequence);
                let mut emitted = 0usize;
                for locus in work_rx.iter() {
                    match locus_events(locus, config, genome, |e| producer.push(e)) {
                        Ok(n) => emitted += n,
                        Err(SpliceGraphError::SinkClosed) => return Err(SpliceGraphError::SinkClosed.into()),
                        Err(e) => warn!(gene = locus.gene.display_name(), error = %e, "skipping locus"),
                    }
                }
                Ok(emitted)
            }));
        }
        let mut total = 0;
        for w in workers {
            total += w.join().map_err(|_| anyhow!("event worker panicked"))??;
        }
        Ok(total)
    })
    .map_err(|_| anyhow!("event worker panicked"))?;

    // Writer errors surface here, ahead of a worker's SinkClosed.
    let writer = sink.finish().context("writing events")?;
    writer.into_inner()?.flush()?;
    let emitted = emitted?;
    info!(emitted, "done");
    Ok(())
}

fn locus_events(
    locus: &Locus<'_>,
    config: &GraphConfig,
    genome: Option<&dyn GenomeSequence>,
    emit: impl FnMut(gtf_splice_graph::SplicingEvent) -> gtf_splice_graph::Result<()>,
) -> gtf_splice_graph::Result<usize> {
    let mut graph = SpliceGraph::build(&locus.transcripts, config.clone(), genome)?;
    graph.collapse_fuzzy_flanks();
    graph.contract(config.event_arity);

    let mut engine = EventEngine::new(&graph)?;
    if let Some(genome) = genome {
        engine = engine.with_genome(genome);
    }
    let stats = engine.for_each_event(emit)?;
    debug!(
        gene = locus.gene.display_name(),
        targets = stats.targets,
        emitted = stats.emitted,
        subsumed = stats.subsumed,
        "locus done"
    );
    Ok(stats.emitted)
}

fn run_constitutive(args: ConstitutiveArgs) -> Result<()> {
    let config = args.graph.config();
    config.validate()?;
    let catalog = load_catalog(&args.annotation, args.keys.keys())?;
    let mut out = io::BufWriter::new(output(args.output.as_deref())?);

    writeln!(out, "#gene\tchr\tstrand\tregion\ttype\ttranscripts")?;
    for locus in catalog.loci() {
        let graph = match SpliceGraph::build(&locus.transcripts, config.clone(), None) {
            Ok(g) => g,
            Err(e) => {
                warn!(gene = locus.gene.display_name(), error = %e, "skipping locus");
                continue;
            }
        };
        let gene = locus.gene.display_name();
        let chr = catalog.chr_name(locus.chr_id).unwrap_or("?");
        for region in graph.constitutive_regions() {
            writeln!(out, "{gene}\t{chr}\t{}\t{region}", locus.strand.symbol())?;
        }
    }
    out.flush()?;
    Ok(())
}
