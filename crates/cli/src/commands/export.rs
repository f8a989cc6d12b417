use std::fs;
use std::path::Path;
use std::process::ExitCode;

use geoimport_engine::{export_features, StoreConnector};

use crate::CliResult;

pub async fn run<C: StoreConnector>(
    connector: &C,
    name: Option<&str>,
    output: Option<&Path>,
) -> CliResult<ExitCode> {
    let collection = export_features(connector, name).await?;
    let text = serde_json::to_string_pretty(&collection)?;
    match output {
        Some(path) => {
            fs::write(path, text)?;
            tracing::info!(path = %path.display(), "wrote feature collection");
        }
        None => println!("{text}"),
    }
    Ok(ExitCode::SUCCESS)
}
