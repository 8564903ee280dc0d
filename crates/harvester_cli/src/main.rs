mod cli;
mod config;
mod logging;
mod progress;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use harvester_core::CollectionResult;
use harvester_engine::{
    ensure_output_dir, export_collection, export_document, EngineHandle, HarvestRequest,
    EXPLORE_PAGE_SIZE,
};

use crate::cli::{Cli, Command, PageArgs};
use crate::config::CliConfig;
use crate::progress::LogSink;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(&cli.config)?;
    cli.apply(&mut config);

    let out = config.output_dir();
    ensure_output_dir(&out).with_context(|| format!("preparing {}", out.display()))?;
    let log_path = logging::initialize(cli.verbose, config.log_to_file.then_some(out.as_path()));
    if let Some(path) = &log_path {
        engine_info!("logging to {}", path.display());
    }

    let settings = config.to_settings();
    if !settings.has_session() {
        engine_warn!("no session cookie configured; most collections need one");
    }
    let default_page_size = settings.page_size;
    let engine = EngineHandle::new(settings)?.with_sink(Arc::new(LogSink));

    run(&engine, cli.command, &out, default_page_size)
}

fn request(page: &PageArgs, default_page_size: u32) -> HarvestRequest {
    HarvestRequest {
        total_wanted: page.count,
        page_size: page.page_size.unwrap_or(default_page_size),
        start_cursor: page.after.clone(),
    }
}

fn run(engine: &EngineHandle, command: Command, out: &Path, page_size: u32) -> Result<()> {
    match command {
        Command::Profile { username } => {
            let profile = engine.fetch_profile(&username)?;
            let path = export_document(out, "profile", &username, &profile)?;
            println!(
                "{}: {} posts, {} followers, {} following -> {}",
                profile.username,
                profile.media_count,
                profile.follower_count,
                profile.following_count,
                path.display()
            );
        }
        Command::Media { username, page } => {
            let profile = engine.fetch_profile(&username)?;
            let result = engine.harvest_media(&profile, &request(&page, page_size));
            report(out, "media", &username, &result)?;
        }
        Command::Following { username, page } => {
            let profile = engine.fetch_profile(&username)?;
            let result = engine.harvest_following(&profile, &request(&page, page_size));
            report(out, "following", &username, &result)?;
        }
        Command::Followers { username, page } => {
            let profile = engine.fetch_profile(&username)?;
            let result = engine.harvest_followers(&profile, &request(&page, page_size));
            report(out, "followers", &username, &result)?;
        }
        Command::Explore { page } => {
            let result = engine.harvest_explore(&request(&page, EXPLORE_PAGE_SIZE));
            report(out, "explore", "feed", &result)?;
        }
        Command::Hashtag { tag, page } => {
            let result = engine.harvest_hashtag(&tag, &request(&page, page_size));
            report(out, "hashtag", &tag, &result)?;
        }
        Command::Story { username } => {
            let profile = engine.fetch_profile(&username)?;
            let story = engine.fetch_story(&profile)?;
            let path = export_document(out, "story", &username, &story)?;
            println!("story: {} items -> {}", story.count(), path.display());
        }
        Command::Notifications => {
            let feed = engine.fetch_notifications()?;
            let path = export_document(out, "notifications", "inbox", &feed)?;
            println!(
                "notifications: {} entries, {} follow requests -> {}",
                feed.notifications.len(),
                feed.follow_requests.len(),
                path.display()
            );
        }
        Command::Search { query } => {
            let results = engine.search(&query)?;
            let path = export_document(out, "search", &query, &results)?;
            println!("search '{}' -> {}", query, path.display());
        }
    }
    Ok(())
}

fn report(out: &Path, label: &str, resource: &str, result: &CollectionResult) -> Result<()> {
    let summary = export_collection(out, label, resource, result)?;
    for entry in &result.errors {
        engine_warn!("{:?}: {}", entry.kind, entry.message);
    }
    println!(
        "{} {}: {} records, {} errors, status {:?} ({:.1}s) -> {}",
        label,
        resource,
        summary.record_count,
        summary.error_count,
        result.status,
        result.elapsed.as_secs_f64(),
        summary.path.display()
    );
    Ok(())
}
