use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use rimtrans_config::RimTransConfig;
use rimtrans_core::TransUnit;
use rimtrans_export_po::PotCatalog;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "rimtrans",
    version,
    about = "RimWorld mod translation extractor/injector (Defs/Keyed XML <-> gettext PO)"
)]
struct Cli {
    /// Console log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preview translatable strings found under a directory
    Scan {
        #[arg(short, long)]
        source_dir: PathBuf,
        /// Treat files as Keyed/LanguageData instead of Defs
        #[arg(long)]
        keyed: bool,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Extract Defs strings into one .pot file per source XML
    ExtractDefs {
        #[arg(short, long)]
        source_dir: Option<PathBuf>,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Extract Keyed strings into one .pot file per source XML
    ExtractKeyed {
        #[arg(short, long)]
        source_dir: Option<PathBuf>,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Merge all Keyed/DefInjected strings into one seeded .po compendium
    Compendium {
        #[arg(short, long)]
        source_dir: PathBuf,
        #[arg(long)]
        out_po: PathBuf,
    },

    /// Generate LanguageData XML from translated .po files
    Inject {
        #[arg(long, conflicts_with_all = ["po_dir", "out_dir"])]
        po: Option<PathBuf>,
        #[arg(long, requires = "po", conflicts_with_all = ["po_dir", "out_dir"])]
        out_xml: Option<PathBuf>,
        #[arg(long)]
        po_dir: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Copy an existing output file aside before overwriting it
        #[arg(long, default_value_t = false)]
        backup: bool,
    },
}

trait Runnable {
    fn run(self, config: Option<RimTransConfig>) -> Result<()>;
}

impl Runnable for Commands {
    fn run(self, config: Option<RimTransConfig>) -> Result<()> {
        let cmd_name = format!("{:?}", self);
        info!("starting command: {}", cmd_name);

        let result = match self {
            Commands::Scan {
                source_dir,
                keyed,
                format,
            } => run_scan(&source_dir, keyed, &format),

            Commands::ExtractDefs {
                source_dir,
                out_dir,
            } => {
                let (source_dir, out_dir) = resolve_extract_dirs(source_dir, out_dir, &config)?;
                run_extract(&source_dir, &out_dir, ExtractMode::Defs)
            }

            Commands::ExtractKeyed {
                source_dir,
                out_dir,
            } => {
                let (source_dir, out_dir) = resolve_extract_dirs(source_dir, out_dir, &config)?;
                run_extract(&source_dir, &out_dir, ExtractMode::Keyed)
            }

            Commands::Compendium { source_dir, out_po } => run_compendium(&source_dir, &out_po),

            Commands::Inject {
                po,
                out_xml,
                po_dir,
                out_dir,
                backup,
            } => {
                let inject_cfg = config.as_ref().and_then(|c| c.inject.as_ref());
                let backup =
                    backup || inject_cfg.and_then(|c| c.backup).unwrap_or(false);
                let po_dir = po_dir.or_else(|| {
                    inject_cfg.and_then(|c| c.po_dir.as_deref().map(PathBuf::from))
                });
                let out_dir = out_dir.or_else(|| {
                    inject_cfg.and_then(|c| c.out_dir.as_deref().map(PathBuf::from))
                });
                run_inject(po, out_xml, po_dir, out_dir, backup)
            }
        };

        match &result {
            Ok(_) => info!("finished command: {}", cmd_name),
            Err(e) => error!("command {} failed: {:?}", cmd_name, e),
        }

        result
    }
}

fn resolve_extract_dirs(
    source_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    config: &Option<RimTransConfig>,
) -> Result<(PathBuf, PathBuf)> {
    let extract_cfg = config.as_ref().and_then(|c| c.extract.as_ref());
    let source_dir = source_dir
        .or_else(|| extract_cfg.and_then(|c| c.source_dir.as_deref().map(PathBuf::from)))
        .ok_or_else(|| eyre!("missing source dir: pass --source-dir or set [extract] source_dir"))?;
    let out_dir = out_dir
        .or_else(|| extract_cfg.and_then(|c| c.out_dir.as_deref().map(PathBuf::from)))
        .ok_or_else(|| eyre!("missing output dir: pass --out-dir or set [extract] out_dir"))?;
    Ok((source_dir, out_dir))
}

fn run_scan(source_dir: &Path, keyed: bool, format: &str) -> Result<()> {
    debug!("scan args: source_dir={:?} keyed={} format={}", source_dir, keyed, format);
    let files = if keyed {
        rimtrans_parsers_xml::scan_keyed_xml(source_dir)?
    } else {
        rimtrans_parsers_xml::scan_defs_xml(source_dir)?
    };
    let units: Vec<TransUnit> = files.into_iter().flat_map(|(_, units)| units).collect();

    match format {
        "json" => {
            serde_json::to_writer_pretty(std::io::stdout().lock(), &units)?;
            println!();
        }
        "text" => {
            for u in &units {
                println!(
                    "{}\t{}\t{}:{}",
                    u.key,
                    u.source.as_deref().unwrap_or(""),
                    u.path.display(),
                    u.line.unwrap_or(0)
                );
            }
        }
        other => return Err(eyre!("unknown format: {other} (expected text or json)")),
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum ExtractMode {
    Defs,
    Keyed,
}

fn run_extract(source_dir: &Path, out_dir: &Path, mode: ExtractMode) -> Result<()> {
    debug!("extract args: source_dir={:?} out_dir={:?}", source_dir, out_dir);
    let files = match mode {
        ExtractMode::Defs => rimtrans_parsers_xml::scan_defs_xml(source_dir)?,
        ExtractMode::Keyed => rimtrans_parsers_xml::scan_keyed_xml(source_dir)?,
    };

    let mut written = 0usize;
    for (rel, units) in files {
        if units.is_empty() {
            debug!("no translatable strings in {}, skipped", rel.display());
            continue;
        }
        let catalog = match mode {
            ExtractMode::Defs => PotCatalog::from_def_units(units),
            ExtractMode::Keyed => PotCatalog::from_keyed_units(units),
        };
        let out_path = out_dir.join(&rel).with_extension("pot");
        rimtrans_export_po::write_pot(&out_path, &catalog, false)?;
        info!("{} entries -> {}", catalog.len(), out_path.display());
        written += 1;
    }

    println!("✔ {} POT file(s) written to {}", written, out_dir.display());
    Ok(())
}

fn run_compendium(source_dir: &Path, out_po: &Path) -> Result<()> {
    debug!("compendium args: source_dir={:?} out_po={:?}", source_dir, out_po);
    let files = rimtrans_parsers_xml::scan_keyed_xml(source_dir)?;

    let mut units: Vec<TransUnit> = Vec::new();
    for (_, mut file_units) in files {
        for u in &mut file_units {
            u.path = PathBuf::from("compendium");
        }
        units.append(&mut file_units);
    }

    let catalog = PotCatalog::from_keyed_units(units);
    rimtrans_export_po::write_pot(out_po, &catalog, true)?;
    println!(
        "✔ compendium with {} entries saved to {}",
        catalog.len(),
        out_po.display()
    );
    Ok(())
}

fn inject_one(po: &Path, out_xml: &Path, backup: bool) -> Result<()> {
    if backup && out_xml.exists() {
        let bak = out_xml.with_extension("xml.bak");
        std::fs::copy(out_xml, &bak)?;
        warn!("backup: {} -> {}", out_xml.display(), bak.display());
    }
    let entries = rimtrans_import_po::read_po_entries(po)?;
    debug!("loaded {} entries from {}", entries.len(), po.display());
    rimtrans_import_po::write_language_data_xml(out_xml, &entries)?;
    println!("✔ XML saved to {}", out_xml.display());
    Ok(())
}

fn run_inject(
    po: Option<PathBuf>,
    out_xml: Option<PathBuf>,
    po_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    backup: bool,
) -> Result<()> {
    match (po, out_xml, po_dir, out_dir) {
        (Some(po), Some(out_xml), None, None) => inject_one(&po, &out_xml, backup),
        (None, None, Some(po_dir), Some(out_dir)) => {
            let mut count = 0usize;
            for entry in WalkDir::new(&po_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_none_or(|ext| !ext.eq_ignore_ascii_case("po"))
                {
                    continue;
                }
                let rel = path.strip_prefix(&po_dir).unwrap_or(path);
                let out_xml = out_dir.join(rel).with_extension("xml");
                inject_one(path, &out_xml, backup)?;
                count += 1;
            }
            println!("✔ {} XML file(s) written to {}", count, out_dir.display());
            Ok(())
        }
        _ => {
            eprintln!("error: pass either --po with --out-xml, or --po-dir with --out-dir");
            std::process::exit(2);
        }
    }
}

fn init_tracing(level: Option<&str>) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = rolling::daily("logs", "rimtrans.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = rimtrans_config::load_config(Path::new("."))?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.log_level.clone()));
    let _guard = init_tracing(level.as_deref());

    cli.cmd.run(config)
}
