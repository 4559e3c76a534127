use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use playlist_match::export::{export_playlist, ExportOptions, MANIFEST_NAME};
use playlist_match::playlist::Playlist;
use playlist_match::progress::{
    create_progress_bar, create_spinner, format_duration, init_tracing, set_log_only,
};
use playlist_match::report::MatchReport;
use playlist_match::safety::{validate_export_target, validate_output_path};
use playlist_match::settings::{expand_path, Settings};
use playlist_match::{LibraryIndex, Resolver};

#[derive(Parser)]
#[command(name = "playlist-match")]
#[command(about = "Find playlist tracks in an Artist/Album/Track music library")]
struct Args {
    /// Settings file (default: $XDG_CONFIG_HOME/playlist-match/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for matching (0 = one per core)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Hide progress bars and print periodic progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every playlist track and write a JSON match report
    Match {
        playlist: PathBuf,

        /// Library root (overrides library.root)
        #[arg(long)]
        library: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Skip near-miss candidates for missing tracks
        #[arg(long)]
        no_candidates: bool,

        #[arg(long)]
        max_candidates: Option<usize>,
    },

    /// Copy matched tracks into a numbered playlist folder with a manifest
    Export {
        playlist: PathBuf,

        target: PathBuf,

        #[arg(long)]
        library: Option<PathBuf>,

        /// Replace files already present in the destination
        #[arg(long)]
        overwrite: bool,

        /// Copy straight into TARGET instead of a "date - title" subfolder
        #[arg(long)]
        no_subfolder: bool,
    },

    /// Index the library and print what was found
    Stats {
        #[arg(long)]
        library: Option<PathBuf>,
    },
}

fn library_root(cli: Option<&Path>, settings: &Settings) -> Result<PathBuf> {
    if let Some(p) = cli {
        return Ok(expand_path(&p.to_string_lossy()));
    }
    settings
        .library_root()
        .context("No library root: pass --library or set library.root in the config file")
}

fn build_index(root: &Path, settings: &Settings) -> Result<LibraryIndex> {
    let spinner = create_spinner(&format!("Indexing {}", root.display()));
    let index = LibraryIndex::build(root, &settings.index_options())
        .with_context(|| format!("Failed to index library {}", root.display()))?;
    spinner.finish_with_message(format!(
        "Indexed {} files ({} keys)",
        index.len(),
        index.stats().keys
    ));
    Ok(index)
}

fn run_match(
    settings: &Settings,
    playlist_path: &Path,
    library: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    if let Some(out) = output {
        validate_output_path(out, &[playlist_path], &settings.library.extensions)?;
    }

    let playlist = Playlist::load(playlist_path)?;
    let root = library_root(library, settings)?;
    let index = build_index(&root, settings)?;

    let resolver = Resolver::new(&index, settings.resolve_options());
    let pb = create_progress_bar(playlist.tracks.len() as u64, "Matching");
    let results = resolver.resolve_all(&playlist.tracks, &pb);
    pb.finish_with_message("Matching done");

    let report = MatchReport::build(
        playlist.meta.clone(),
        index.root(),
        &playlist.tracks,
        &results,
        settings.matching.include_candidates,
    );

    match output {
        Some(out) => report.write(out)?,
        None => println!("{}", report.to_json()?),
    }

    let summary = report.summary();
    eprintln!("\n{:=<60}", "");
    eprintln!("Matching complete!");
    eprintln!("  Library: {}", summary.library_root);
    eprintln!("  Tracks:  {}", summary.total_tracks);
    eprintln!("  Found:   {}", summary.found);
    for (strategy, n) in report.strategy_counts() {
        eprintln!("    {:>2}. {:<24} {}", strategy.step(), strategy, n);
    }
    eprintln!("  Missing: {}", summary.missing);
    if let Some(out) = output {
        eprintln!("  Report:  {}", out.display());
    }
    eprintln!("  Elapsed: {}", format_duration(start.elapsed()));
    eprintln!("{:=<60}", "");

    Ok(())
}

fn run_export(
    settings: &Settings,
    playlist_path: &Path,
    target: &Path,
    library: Option<&Path>,
    options: &ExportOptions,
) -> Result<()> {
    let start = Instant::now();
    let root = library_root(library, settings)?;
    validate_export_target(target, &root, playlist_path)?;

    let playlist = Playlist::load(playlist_path)?;
    let index = build_index(&root, settings)?;
    let resolver = Resolver::new(&index, settings.resolve_options());

    let pb = create_progress_bar(playlist.tracks.len() as u64, "Exporting");
    let manifest = export_playlist(&resolver, &playlist, target, options, &pb)?;
    pb.finish_with_message("Export done");

    eprintln!("\n{:=<60}", "");
    eprintln!("Export complete!");
    eprintln!("  Folder:  {}", manifest.destination_folder);
    eprintln!("  Tracks:  {}", manifest.summary.total_tracks);
    eprintln!("  Copied:  {}", manifest.summary.copied);
    eprintln!("  Missing: {}", manifest.summary.missing);
    eprintln!(
        "  Manifest: {}",
        Path::new(&manifest.destination_folder).join(MANIFEST_NAME).display()
    );
    eprintln!("  Elapsed: {}", format_duration(start.elapsed()));
    eprintln!("{:=<60}", "");

    Ok(())
}

fn run_stats(settings: &Settings, library: Option<&Path>) -> Result<()> {
    let root = library_root(library, settings)?;
    let index = build_index(&root, settings)?;
    let stats = index.stats();

    println!("Library: {}", root.display());
    println!("  Files seen:        {}", stats.files_seen);
    println!("  Files indexed:     {}", stats.files_indexed);
    println!("  Skipped extension: {}", stats.skipped_extension);
    println!("  Skipped shallow:   {}", stats.skipped_shallow);
    println!("  Skipped non-UTF-8: {}", stats.skipped_non_utf8);
    println!("  Walk errors:       {}", stats.walk_errors);
    println!("  Keys:              {}", stats.keys);
    println!("  Artists:           {}", stats.artists);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(workers) = args.workers {
        settings.runtime.workers = workers;
    }
    settings.runtime.log_only |= args.log_only;
    if let Command::Match {
        no_candidates,
        max_candidates,
        ..
    } = &args.command
    {
        if *no_candidates {
            settings.matching.include_candidates = false;
        }
        if let Some(n) = max_candidates {
            settings.matching.max_candidates = *n;
        }
    }
    settings.validate().map_err(|e| anyhow!("Invalid settings: {}", e))?;

    set_log_only(settings.runtime.log_only);

    if settings.runtime.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(settings.runtime.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    match &args.command {
        Command::Match {
            playlist,
            library,
            output,
            ..
        } => run_match(&settings, playlist, library.as_deref(), output.as_deref()),
        Command::Export {
            playlist,
            target,
            library,
            overwrite,
            no_subfolder,
        } => {
            let options = ExportOptions {
                make_subfolder: !no_subfolder,
                overwrite: *overwrite,
            };
            run_export(&settings, playlist, target, library.as_deref(), &options)
        }
        Command::Stats { library } => run_stats(&settings, library.as_deref()),
    }
}
