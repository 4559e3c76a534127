//! Show how one desired track is normalized and what each matching step finds.
//!
//! Usage: explain-track <library_root> <artist> <title> [album] [--max-candidates N]

use anyhow::Result;
use std::path::PathBuf;

use playlist_match::progress::init_tracing;
use playlist_match::resolve::TrackQuery;
use playlist_match::settings::{expand_path, Settings};
use playlist_match::{DesiredTrack, LibraryIndex, Resolver, Strategy};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: explain-track <library_root> <artist> <title> [album] [--max-candidates N]");
        std::process::exit(1);
    }
    init_tracing();

    let root: PathBuf = expand_path(&args[1]);
    let album = args.get(4).filter(|a| !a.starts_with("--")).cloned().unwrap_or_default();
    let track = DesiredTrack::new(&args[2], &args[3], &album);

    let settings = Settings::load(None)?;
    let mut options = settings.resolve_options();
    options.include_candidates = true;
    if let Some(n) = args
        .iter()
        .position(|a| a == "--max-candidates")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
    {
        options.max_candidates = n;
    }

    let index = LibraryIndex::build(&root, &settings.index_options())?;
    let resolver = Resolver::new(&index, options);
    let query = TrackQuery::new(&track);

    println!("Input");
    println!("  artist:          {:?}", track.artist);
    println!("  title:           {:?}", track.title);
    println!("  album:           {:?}", track.album);
    println!("Normalized");
    println!("  artist:          {:?}", query.artist);
    println!("  album:           {:?}", query.album);
    println!("  flexible album:  {:?}", query.flexible_album);
    println!("  title:           {:?}", query.title);
    println!("  extracted title: {:?}", query.extracted_title);
    println!(
        "  stripped title:  {:?}",
        query.stripped_title.as_deref().unwrap_or("-")
    );
    println!(
        "Library: {} files, {} keys, {} under this artist",
        index.len(),
        index.stats().keys,
        index.entries_for_artist(&query.artist).count()
    );

    // Every step, not just the winner, so a near miss shows where it nearly hit
    println!("\nStrategies");
    let mut winner: Option<Strategy> = None;
    for strategy in Strategy::ALL {
        let paths = resolver.try_strategy(strategy, &query);
        let marker = if winner.is_none() && !paths.is_empty() {
            winner = Some(strategy);
            "*"
        } else {
            " "
        };
        println!("{} {}. {:<24} {} hit(s)", marker, strategy.step(), strategy, paths.len());
        for p in paths.iter().take(5) {
            println!("       {}", p.display());
        }
    }

    let result = resolver.resolve(&track);
    println!();
    match result.strategy {
        Some(strategy) => {
            println!("FOUND via {} ({} path(s))", strategy, result.matched_paths.len());
            for p in &result.matched_paths {
                println!("  {}", p.display());
            }
        }
        None => {
            println!("MISSING");
            if result.candidate_paths.is_empty() {
                println!("  no candidates in {:?} / {:?}", query.artist, query.album);
            }
            for (i, p) in result.candidate_paths.iter().enumerate() {
                println!("  {}. {}", i + 1, p.display());
            }
        }
    }

    Ok(())
}
