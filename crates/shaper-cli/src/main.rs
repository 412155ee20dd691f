use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shaper_core::{
    Shaper, StepObserver, StepTrace, export_json, import_json, lexicon_report, normalize_stream,
    primitives_from_stream,
};
use shaper_store::{ConfigFile, DB_FILE, Store, default_base_dir, load_config};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "shaper", about = "Percept shaper word segmentation model")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment an input stream
    Run {
        /// Input file, or - for stdin
        input: PathBuf,

        /// TOML model configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Primitive alphabet, comma separated (default: every frame-wide
        /// substring of the input)
        #[arg(long, value_delimiter = ',')]
        primitives: Vec<String>,

        /// Reading frame width in characters
        #[arg(long)]
        frame: Option<usize>,

        /// Percept sizes: a file, or a comma/space separated list
        #[arg(long)]
        sizes: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        /// Continue from a stored run's final store
        #[arg(long)]
        from: Option<String>,

        /// Save the finished run to the history database
        #[arg(long)]
        save: bool,

        #[arg(long, default_value = "run")]
        label: String,

        /// Print one JSON trace per step
        #[arg(long)]
        trace: bool,
    },

    /// List stored runs, newest first
    Runs,

    /// Show the units a stored run learned
    Show {
        /// Run id, or "latest"
        id: String,

        #[arg(long, default_value_t = 0.0)]
        min_weight: f64,
    },

    /// Export a stored run's final store as JSON
    Export {
        /// Run id, or "latest"
        id: String,
        /// Output file path
        path: PathBuf,
    },

    /// Import a JSON store snapshot as a new run
    Import {
        /// Input file path
        path: PathBuf,

        /// TOML model configuration to record with the snapshot
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "import")]
        label: String,
    },

    /// Score a stored run's units against a lexicon of known words
    Compare {
        /// Run id, or "latest"
        id: String,

        #[arg(required = true)]
        words: Vec<String>,
    },
}

fn open_store() -> Result<Store> {
    let path = default_base_dir().join(DB_FILE);
    Store::open(&path).with_context(|| format!("failed to open run store {}", path.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run {
            input,
            config,
            primitives,
            frame,
            sizes,
            seed,
            from,
            save,
            label,
            trace,
        } => cmd_run(&RunArgs {
            input: input.as_path(),
            config: config.as_deref(),
            primitives: primitives.as_slice(),
            frame: *frame,
            sizes: sizes.as_deref(),
            seed: *seed,
            from: from.as_deref(),
            save: *save,
            label: label.as_str(),
            trace: *trace,
        }),
        Commands::Runs => cmd_runs(),
        Commands::Show { id, min_weight } => cmd_show(id, *min_weight),
        Commands::Export { id, path } => cmd_export(id, path),
        Commands::Import {
            path,
            config,
            label,
        } => cmd_import(path, config.as_deref(), label),
        Commands::Compare { id, words } => cmd_compare(id, words),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Writes each step as one JSON line on stdout.
struct JsonLines;

impl StepObserver for JsonLines {
    fn observe(&mut self, trace: &StepTrace) {
        match serde_json::to_string(trace) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("failed to encode trace for step {}: {e}", trace.step),
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    Ok(normalize_stream(&raw))
}

/// `arg` names a file of sizes if one exists, otherwise it is the list itself.
fn parse_sizes(arg: &str) -> Result<Vec<usize>> {
    let text = if Path::new(arg).is_file() {
        std::fs::read_to_string(arg).with_context(|| format!("failed to read sizes file {arg}"))?
    } else {
        arg.to_string()
    };
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("invalid percept size {s:?}"))
        })
        .collect()
}

fn resolve_run(store: &Store, id: &str) -> Result<Uuid> {
    if id == "latest" {
        return match store.latest_run()? {
            Some(run) => Ok(run.id),
            None => bail!("no stored runs"),
        };
    }
    Uuid::parse_str(id).with_context(|| format!("invalid run id {id:?}"))
}

fn print_units(units: &[(&str, f64)]) {
    if units.is_empty() {
        println!("(no units)");
    }
    for (unit, weight) in units {
        println!("{weight:>12.6}  {unit}");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct RunArgs<'a> {
    input: &'a Path,
    config: Option<&'a Path>,
    primitives: &'a [String],
    frame: Option<usize>,
    sizes: Option<&'a str>,
    seed: Option<u64>,
    from: Option<&'a str>,
    save: bool,
    label: &'a str,
    trace: bool,
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let input = read_input(args.input)?;

    let store = if args.save || args.from.is_some() {
        Some(open_store()?)
    } else {
        None
    };

    // A resumed run keeps its stored model unless a config file replaces it.
    let resumed = match (args.from, &store) {
        (Some(id), Some(store)) => {
            let id = resolve_run(store, id)?;
            Some(
                store
                    .load_run(id)
                    .with_context(|| format!("failed to load run {id}"))?,
            )
        }
        _ => None,
    };

    let mut file = match (args.config, &resumed) {
        (Some(path), _) => {
            load_config(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        (None, Some(run)) => ConfigFile {
            model: run.config.clone(),
            ..ConfigFile::default()
        },
        (None, None) => ConfigFile::default(),
    };
    if let Some(frame) = args.frame {
        file.model.reading_frame = frame;
    }
    if !args.primitives.is_empty() {
        file.model.primitives = args.primitives.iter().cloned().collect();
    }
    if file.model.primitives.is_empty() {
        file.model.primitives = primitives_from_stream(&input, file.model.reading_frame.max(1));
        tracing::info!(
            "derived {} primitives from the input stream",
            file.model.primitives.len()
        );
    }
    if args.seed.is_some() {
        file.model.seed = args.seed;
    }
    let sizes = args.sizes.map(parse_sizes).transpose()?;

    let mut shaper = match resumed {
        Some(run) => {
            let mut snapshot = run.snapshot;
            snapshot.units.extend(file.units.clone());
            Shaper::from_snapshot(file.model.clone(), snapshot)
                .context("invalid model configuration")?
        }
        None => file.build().context("invalid model configuration")?,
    };

    let remainder = if args.trace {
        shaper.run_observed(&input, sizes.as_deref(), &mut JsonLines)
    } else {
        shaper.run(&input, sizes.as_deref())
    }
    .context("run failed")?;

    if !args.trace {
        println!("steps:      {}", shaper.step_number());
        println!("seed:       {}", shaper.effective_seed());
        println!("units:      {}", shaper.units().len());
        println!("forgotten:  {}", shaper.forgotten_primitives().len());
        print_units(&shaper.learned_units(f64::NEG_INFINITY));
    }

    if let Some(store) = &store
        && args.save
    {
        let id = store
            .save_run(args.label, &shaper, &remainder)
            .context("failed to save run")?;
        if args.trace {
            eprintln!("saved run {id}");
        } else {
            println!("saved run {id}");
        }
    }
    Ok(())
}

fn cmd_runs() -> Result<()> {
    let store = open_store()?;
    let runs = store.list_runs().context("failed to list runs")?;
    if runs.is_empty() {
        println!("(no runs)");
    }
    for run in runs {
        println!(
            "{}  {}  steps={}  units={}  {}",
            run.id, run.created_at, run.steps, run.units, run.label
        );
    }
    Ok(())
}

fn cmd_show(id: &str, min_weight: f64) -> Result<()> {
    let store = open_store()?;
    let id = resolve_run(&store, id)?;
    let run = store
        .load_run(id)
        .with_context(|| format!("failed to load run {id}"))?;
    let shaper = Shaper::from_snapshot(run.config.clone(), run.snapshot)
        .context("stored run has an invalid configuration")?;

    println!("run:        {}", run.id);
    println!("label:      {}", run.label);
    println!("created:    {}", run.created_at);
    match run.effective_seed {
        Some(seed) => println!("seed:       {seed}"),
        None => println!("seed:       -"),
    }
    println!("steps:      {}", run.steps);
    println!("remainder:  {:?}", run.remainder);
    println!("forgotten:  {}", join(shaper.forgotten_primitives()));
    println!(
        "config:     {}",
        serde_json::to_string(&run.config).context("failed to encode config")?
    );
    print_units(&shaper.learned_units(min_weight));
    Ok(())
}

fn cmd_export(id: &str, path: &Path) -> Result<()> {
    let store = open_store()?;
    let id = resolve_run(&store, id)?;
    let snapshot = store
        .load_snapshot(id)
        .with_context(|| format!("failed to load run {id}"))?;

    let json = export_json(&snapshot).context("failed to serialize store")?;
    std::fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;

    println!("exported {} units to {}", snapshot.units.len(), path.display());
    Ok(())
}

fn cmd_import(path: &Path, config: Option<&Path>, label: &str) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = import_json(&json).context("failed to parse store snapshot")?;

    let model = match config {
        Some(config) => {
            load_config(config)
                .with_context(|| format!("failed to load {}", config.display()))?
                .model
        }
        None => {
            let mut file = ConfigFile::default();
            file.model.reading_frame = snapshot.reading_frame;
            file.model.primitives = snapshot
                .primitives
                .union(&snapshot.forgotten_primitives)
                .cloned()
                .collect();
            file.model
        }
    };
    model.validate().context("invalid model configuration")?;

    let store = open_store()?;
    let id = store
        .import_snapshot(label, &model, &snapshot)
        .context("failed to import snapshot")?;
    println!(
        "imported {} as run {id} ({} units)",
        path.display(),
        snapshot.units.len()
    );
    Ok(())
}

fn cmd_compare(id: &str, words: &[String]) -> Result<()> {
    let store = open_store()?;
    let id = resolve_run(&store, id)?;
    let snapshot = store
        .load_snapshot(id)
        .with_context(|| format!("failed to load run {id}"))?;

    let report = lexicon_report(&snapshot.units, words, snapshot.reading_frame);
    let found = report.iter().filter(|r| r.in_lexicon).count();
    for r in &report {
        println!(
            "{:>12.6}  {:<24} {}  shared={} distance={} closest={}",
            r.weight,
            r.unit,
            if r.in_lexicon { "word" } else { "    " },
            r.longest_shared,
            r.min_distance,
            r.closest_word.as_deref().unwrap_or("-"),
        );
    }
    println!("words found: {found}/{}", words.len());
    Ok(())
}

fn join(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(" ")
    }
}
