// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Cache command - manage resolved plans

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};

use super::{base_dir, config_path, CacheAction};
use crate::cache::{Cache, FilesystemCache};
use crate::pipeline::{ProjectConfig, Settings};

/// Run the cache command
pub async fn run(action: CacheAction, _verbose: bool) -> Result<()> {
    match action {
        CacheAction::Stats { file } => {
            let cache = open(file)?;
            let stats = cache.stats().await?;

            println!("{}", "Cache Statistics".bold());
            println!("{}", "═".repeat(40));
            println!("  Location: {}", cache.cache_dir().display());
            println!("  Entries:  {}", stats.entries);
            println!("  Size:     {}", stats.formatted_size());

            if let Some(oldest) = stats.oldest_entry {
                if let Ok(duration) = oldest.elapsed() {
                    println!("  Oldest:   {} ago", format_duration(duration));
                }
            }

            if let Some(newest) = stats.newest_entry {
                if let Ok(duration) = newest.elapsed() {
                    println!("  Newest:   {} ago", format_duration(duration));
                }
            }

            Ok(())
        }

        CacheAction::Clear { yes, file } => {
            let cache = open(file)?;
            let stats = cache.stats().await?;

            if stats.entries == 0 {
                println!("{}", "Cache is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Clear {} cached plans ({})? [y/N] ",
                    stats.entries,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            cache.clear().await?;
            println!("{}", "Cache cleared.".green());

            Ok(())
        }
    }
}

/// The cache directory named by the config, or the default one when there is
/// no config to read
fn open(file: Option<std::path::PathBuf>) -> Result<FilesystemCache> {
    let path = config_path(file)?;
    let cache_dir = if path.exists() {
        ProjectConfig::from_file(&path)?.settings.cache_dir
    } else {
        Settings::default().cache_dir
    };

    Ok(FilesystemCache::new(base_dir(&path).join(cache_dir))?)
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
