// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license
//
// Compares the freshly reconciled combined snapshot against the one
// already published and stamps a freshness timestamp per changed route.

use anyhow::Context;
use bauhinia::route_diff::{dirty_route_keys, write_route_timestamps};
use bauhinia::snapshot::{self, CombinedSnapshot};
use chrono::Utc;
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Previously published combined snapshot, an http(s) URL or a
    /// local path
    #[arg(long)]
    previous: String,

    /// Freshly reconciled combined snapshot
    #[arg(long, default_value = "routeFareList.min.json")]
    current: PathBuf,

    /// Directory receiving one timestamp file per changed route key
    #[arg(long, default_value = "route-ts")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let previous: CombinedSnapshot = match args.previous.starts_with("http") {
        true => {
            let body = reqwest::get(&args.previous)
                .await
                .and_then(|response| response.error_for_status())
                .with_context(|| format!("fetching {}", args.previous))?
                .text()
                .await?;
            serde_json::from_str(&body)
                .with_context(|| format!("decoding {}", args.previous))?
        }
        false => snapshot::load_combined(Path::new(&args.previous))?,
    };
    let current = snapshot::load_combined(&args.current)?;

    let dirty = dirty_route_keys(&previous.route_list, &current.route_list);
    info!(
        "{} of {} route keys changed since the published snapshot",
        dirty.len(),
        current.route_list.len()
    );

    write_route_timestamps(&args.out_dir, &dirty, Utc::now().timestamp())?;
    Ok(())
}
