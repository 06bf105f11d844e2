use crate::cli::CacheAction;
use crate::config::Settings;
use crate::context::build_cache;
use crate::error::CliResult;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use lazydynamo_core::CacheKey;

pub async fn run(action: CacheAction, settings: &Settings) -> CliResult<()> {
    let cache = build_cache(settings);

    match action {
        CacheAction::Path => {
            println!("{}", cache.dir().display());
            Ok(())
        }

        CacheAction::List => {
            let entries = cache.entries().await?;
            if entries.is_empty() {
                println!("Cache is empty.");
                return Ok(());
            }

            let now = Utc::now();
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["RESOURCE", "ITEMS", "UPDATED", "STATUS"]);
            for entry in &entries {
                let resource = match &entry.key {
                    CacheKey::Collections => "(tables)".to_string(),
                    CacheKey::Rows(table) => table.clone(),
                };
                let fresh = age(entry.updated, now) <= settings.cache_ttl;
                table.add_row(vec![
                    resource,
                    entry.len.to_string(),
                    entry.updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    if fresh { "fresh" } else { "stale" }.to_string(),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        CacheAction::Clear { table, collections } => {
            let key = match (table, collections) {
                (Some(table), _) => Some(CacheKey::rows(table)),
                (None, true) => Some(CacheKey::Collections),
                (None, false) => None,
            };
            let removed = cache.clear(key.as_ref()).await?;
            let noun = if removed == 1 { "entry" } else { "entries" };
            println!("{} {removed} cache {noun}", "Removed".green());
            Ok(())
        }
    }
}

fn age(updated: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (now - updated).to_std().unwrap_or_default()
}
