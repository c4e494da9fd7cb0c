// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license
//
// Reconciles every operator's route list against the reference feed and
// writes the per-operator, annotated and combined snapshots.

use anyhow::Context;
use bauhinia::models::{OperatorCode, OperatorRoute, ReferenceRouteId};
use bauhinia::operators::{OperatorProfile, default_roster};
use bauhinia::reconcile::reconcile_operator;
use bauhinia::snapshot::{self, CombinedSnapshot};
use bauhinia::stop_align::MatchConfig;
use clap::Parser;
use itertools::Itertools;
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing routeList.<co>.json and stopList.<co>.json
    /// for every operator
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Reference feed snapshot
    #[arg(long, default_value = "gtfs.json")]
    gtfs: PathBuf,

    /// Subset of operator codes to reconcile, in roster order
    /// (defaults to the full roster)
    #[arg(long, value_delimiter = ',')]
    operators: Option<Vec<String>>,

    /// Where the reconciled snapshots are written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = MatchConfig::default();

    let reference = snapshot::load_reference(&args.gtfs)
        .with_context(|| format!("loading reference snapshot {}", args.gtfs.display()))?;
    info!(
        "reference snapshot: {} routes, {} stops",
        reference.route_list.len(),
        reference.stop_list.len()
    );

    let roster = default_roster();
    let selected: Vec<&OperatorProfile> = match &args.operators {
        Some(codes) => roster
            .iter()
            .filter(|profile| codes.iter().any(|code| profile.code == code.as_str()))
            .collect(),
        None => roster.iter().collect(),
    };
    info!(
        "reconciling operators: {}",
        selected.iter().map(|profile| profile.code.as_str()).join(", ")
    );

    let mut annotations: BTreeMap<ReferenceRouteId, BTreeMap<OperatorCode, OperatorRoute>> =
        BTreeMap::new();
    let mut combined = CombinedSnapshot::default();

    for profile in selected {
        let route_path = args.data_dir.join(format!("routeList.{}.json", profile.code));
        let stop_path = args.data_dir.join(format!("stopList.{}.json", profile.code));
        let route_list = snapshot::load_operator_routes(&route_path)?;
        let stop_list = snapshot::load_operator_stops(&stop_path)?;
        info!(
            "{}: {} routes, {} stops loaded",
            profile.code,
            route_list.len(),
            stop_list.len()
        );

        let outcome = reconcile_operator(
            profile,
            route_list,
            &stop_list,
            &reference.route_list,
            &reference.stop_list,
            &config,
        );

        snapshot::save_route_list(
            &args.out_dir.join(format!("routeFareList.{}.json", profile.code)),
            &outcome.routes,
        )?;

        for (reference_id, matched) in outcome.matched {
            annotations
                .entry(reference_id)
                .or_default()
                .insert(profile.code.clone(), matched);
        }
        for route in outcome.routes {
            combined.route_list.insert(route.key(), route);
        }
        for (stop_id, stop) in stop_list {
            combined.stop_list.insert(stop_id, stop);
        }
    }

    snapshot::save_reference_annotations(
        &args.out_dir.join("routeGtfs.all.json"),
        &reference.route_list,
        &annotations,
    )?;
    snapshot::save_combined(&args.out_dir.join("routeFareList.min.json"), &combined)?;
    info!(
        "combined snapshot: {} route keys, {} stops",
        combined.route_list.len(),
        combined.stop_list.len()
    );

    Ok(())
}
