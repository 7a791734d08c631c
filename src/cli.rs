// Takeout Sync CLI binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use takeout_sync_lib::archive::open_inputs;
use takeout_sync_lib::config::DateRange;
use takeout_sync_lib::filenames::{take_time_from_name, NameAnalyzer, NameZone};
use takeout_sync_lib::media::SupportedMedia;
use takeout_sync_lib::{AssetGroup, CancelToken, ImportOptions, Recorder, TakeoutEngine};

#[derive(Parser)]
#[command(name = "takeout-sync")]
#[command(about = "Reconcile Google Photos Takeout archives into upload candidates", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile takeout archives and print the report
    Scan(ScanArgs),

    /// Show what the file name analyzer makes of names
    CheckNames {
        /// File names to analyze
        #[arg(required = true)]
        names: Vec<String>,
        /// Zone for times found in names: Local, UTC or +HH:MM
        #[arg(long, default_value = "Local")]
        zone: String,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Zip, tgz/tar.gz, directory or listing file; parts of one takeout may be given together
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON options file, overridden by the flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit files that have no JSON sidecar
    #[arg(long)]
    keep_json_less: bool,

    #[arg(long)]
    keep_trashed: bool,

    /// Discard assets shared by a partner
    #[arg(long)]
    no_partner: bool,

    /// Discard archived assets
    #[arg(long)]
    no_archived: bool,

    /// Keep albums without a title
    #[arg(long)]
    keep_untitled: bool,

    /// Only emit assets of this album
    #[arg(long, value_name = "ALBUM")]
    from_album: Option<String>,

    /// Put every emitted asset into this album
    #[arg(long, value_name = "ALBUM")]
    into_album: Option<String>,

    /// Put partner-shared assets into this album
    #[arg(long, value_name = "ALBUM")]
    partner_album: Option<String>,

    /// Capture date range, e.g. 2023 or 2023-01-15,2023-02
    #[arg(long, value_name = "RANGE")]
    date_range: Option<String>,

    /// Glob of files to ignore; repeatable
    #[arg(long = "ban-file", value_name = "PATTERN")]
    ban_files: Vec<String>,

    /// Tag added to every asset; repeatable
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Tag assets with the import session
    #[arg(long)]
    session_tag: bool,

    /// Do not group burst shots
    #[arg(long)]
    no_burst: bool,

    /// Group Epson FastFoto scans
    #[arg(long)]
    epson: bool,

    /// Print every group
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Scan(args) => cmd_scan(args),
        Commands::CheckNames { names, zone } => cmd_check_names(names, zone),
    }
}

fn scan_options(args: &ScanArgs) -> Result<ImportOptions> {
    let mut options = match &args.config {
        Some(path) => ImportOptions::load(path)?,
        None => ImportOptions::default(),
    };

    options.keep_json_less |= args.keep_json_less;
    options.keep_trashed |= args.keep_trashed;
    options.keep_untitled_albums |= args.keep_untitled;
    options.session_tag |= args.session_tag;
    options.manage_epson_fastfoto |= args.epson;
    if args.no_partner {
        options.keep_partner = false;
    }
    if args.no_archived {
        options.keep_archived = false;
    }
    if args.no_burst {
        options.manage_burst = false;
    }
    if args.from_album.is_some() {
        options.import_from_album = args.from_album.clone();
    }
    if args.into_album.is_some() {
        options.import_into_album = args.into_album.clone();
    }
    if args.partner_album.is_some() {
        options.partner_shared_album = args.partner_album.clone();
    }
    if let Some(range) = &args.date_range {
        options.date_range = DateRange::parse(range)?;
    }
    for pattern in &args.ban_files {
        options.banned_files.add(pattern)?;
    }
    options.tags.extend(args.tags.iter().cloned());

    options.validate()?;
    Ok(options)
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let options = scan_options(&args)?;

    let recorder = Arc::new(Recorder::new().with_json_less_accepted(options.keep_json_less));

    let archives = open_inputs(&args.inputs, &recorder)?;

    let engine = TakeoutEngine::new(archives, options, Arc::clone(&recorder));
    let cancel = CancelToken::new();

    let stream = engine.groups(&cancel)?;
    let mut groups = 0usize;
    let mut assets = 0usize;
    for mut group in stream.iter() {
        groups += 1;
        assets += group.len();
        if args.list {
            print_group(&group);
        }
        group.close();
    }
    stream.join()?;

    println!();
    print!("{}", recorder.snapshot().render());
    println!("{:<40}: {:>7}", "emitted assets", assets);
    println!("{:<40}: {:>7}", "emitted groups", groups);

    Ok(())
}

fn print_group(group: &AssetGroup) {
    if group.len() == 1 {
        if let Some(asset) = group.cover() {
            println!("{}  {}", format_date(asset), asset.display());
        }
        return;
    }

    println!("[{}] {} assets", group.grouping, group.len());
    for (i, asset) in group.members.iter().enumerate() {
        let marker = if i == group.cover_index { "*" } else { " " };
        println!("  {} {}  {}", marker, format_date(asset), asset.display());
    }
}

fn format_date(asset: &takeout_sync_lib::EmittedAsset) -> String {
    asset
        .capture_date
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".repeat(19))
}

fn cmd_check_names(names: Vec<String>, zone: String) -> Result<()> {
    let zone = NameZone::parse(&zone)?;
    let analyzer = NameAnalyzer::new(SupportedMedia::default(), zone);

    for name in names {
        let info = analyzer.analyze(&name);
        let taken = take_time_from_name(&name, zone)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        println!("{}", name);
        println!("  Radical:   {}", info.radical);
        println!("  Index:     {}", info.index);
        println!("  Extension: {}", info.ext);
        println!("  Kind:      {:?}", info.kind);
        println!("  Cover:     {}", info.is_cover);
        if let Some(id) = &info.burst_id {
            println!("  Burst id:  {}", id);
        }
        println!("  Media:     {:?}", info.media);
        println!("  Taken:     {}", taken);
    }

    Ok(())
}
