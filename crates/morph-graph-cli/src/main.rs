//! Morph Graph command line front-end
//!
//! Generates a synthetic street grid with buildings, builds its morphological graph and
//! prints a summary of the node and edge tables.

mod logging;
mod settings;
mod summary;
mod synthetic;

use morph_graph_lib::{MorphError, NodeKind, morphological_graph};
use settings::Settings;
use std::collections::BTreeMap;
use std::process::ExitCode;
use summary::Summary;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Morph(#[from] MorphError),

    #[error("Failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    match run(&settings) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<String, CliError> {
    let config = settings.to_config()?;
    let (buildings, streets) = synthetic::grid_city(
        settings.blocks,
        settings.block_size,
        settings.buildings_per_side,
        settings.crs.clone(),
    )?;

    tracing::info!(
        "Building morphological graph for {} buildings and {} streets",
        buildings.len(),
        streets.len()
    );
    let graph = morphological_graph(&buildings, &streets, &config)?;

    let hetero = if settings.hetero {
        let id_columns = BTreeMap::from([
            (
                NodeKind::Private,
                config.private_id_col.clone().unwrap_or_else(|| "private_id".to_string()),
            ),
            (
                NodeKind::Public,
                config.public_id_col.clone().unwrap_or_else(|| "public_id".to_string()),
            ),
        ]);
        Some(graph.to_hetero_graph(&id_columns)?)
    } else {
        None
    };

    let summary = Summary::new(&graph, hetero.as_ref());
    if settings.json {
        Ok(serde_json::to_string_pretty(&summary)?)
    } else {
        Ok(summary.to_string())
    }
}
