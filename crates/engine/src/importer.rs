use std::path::PathBuf;

use serde::Serialize;

use crate::feature::read_feature_collection;
use crate::store::{close_after, FeatureStore, StoreConnector};
use crate::{EngineResult, FeatureRow, ImportTarget};

/// Result of importing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { rows: usize },
    /// Rows already exist under the target's name; nothing was inserted.
    Skipped { existing: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    Imported { rows: usize },
    Skipped { existing: i64 },
    Missing,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub path: PathBuf,
    pub name: String,
    #[serde(flatten)]
    pub status: ImportStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub reports: Vec<ImportReport>,
}

impl ImportSummary {
    pub fn imported_rows(&self) -> usize {
        self.reports
            .iter()
            .map(|report| match report.status {
                ImportStatus::Imported { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| matches!(report.status, ImportStatus::Failed { .. }))
            .count()
    }

    /// Missing files and skips do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Opens a connection just to create the extension and table.
pub async fn ensure_schema<C: StoreConnector>(connector: &C) -> EngineResult<()> {
    let mut store = connector.connect().await?;
    let result = store.ensure_schema().await;
    match close_after(store, result).await {
        Ok(()) => {
            tracing::info!("feature table ready");
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to create feature table");
            Err(err)
        }
    }
}

/// Imports one file on its own connection, all rows or none.
pub async fn import_file<C: StoreConnector>(
    connector: &C,
    target: &ImportTarget,
) -> EngineResult<ImportOutcome> {
    let mut store = connector.connect().await?;
    let result = import_into(&mut store, target).await;
    close_after(store, result).await
}

async fn import_into<S: FeatureStore>(
    store: &mut S,
    target: &ImportTarget,
) -> EngineResult<ImportOutcome> {
    let existing = store.count_by_name(&target.name).await?;
    if existing > 0 {
        tracing::info!(name = %target.name, existing, "name already imported, skipping");
        return Ok(ImportOutcome::Skipped { existing });
    }

    let rows = read_feature_collection(&target.path)?;
    store.begin().await?;
    if let Err(err) = insert_rows(store, &target.name, &rows).await {
        tracing::error!(
            error = %err,
            name = %target.name,
            "feature insert failed, rolling back transaction"
        );
        if let Err(rollback_err) = store.rollback().await {
            tracing::error!(
                error = %rollback_err,
                "failed to roll back transaction after insert error"
            );
        }
        return Err(err);
    }
    store.commit().await?;

    tracing::info!(name = %target.name, rows = rows.len(), "imported feature collection");
    Ok(ImportOutcome::Imported { rows: rows.len() })
}

async fn insert_rows<S: FeatureStore>(
    store: &mut S,
    source_name: &str,
    rows: &[FeatureRow],
) -> EngineResult<()> {
    for row in rows {
        store.insert_feature(source_name, row).await?;
    }
    Ok(())
}

/// Imports every target in order. Per-file failures are reported, never raised.
pub async fn import_all<C: StoreConnector>(
    connector: &C,
    targets: &[ImportTarget],
) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for target in targets {
        let status = if !target.path.exists() {
            tracing::warn!(path = %target.path.display(), "input file does not exist");
            ImportStatus::Missing
        } else {
            match import_file(connector, target).await {
                Ok(ImportOutcome::Imported { rows }) => ImportStatus::Imported { rows },
                Ok(ImportOutcome::Skipped { existing }) => ImportStatus::Skipped { existing },
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        name = %target.name,
                        path = %target.path.display(),
                        "import failed"
                    );
                    ImportStatus::Failed {
                        error: err.to_string(),
                    }
                }
            }
        };
        summary.reports.push(ImportReport {
            path: target.path.clone(),
            name: target.name.clone(),
            status,
        });
    }
    summary
}

/// Ensures the schema, then imports `targets`. Only schema failure is an error.
pub async fn run_import<C: StoreConnector>(
    connector: &C,
    targets: &[ImportTarget],
) -> EngineResult<ImportSummary> {
    ensure_schema(connector).await?;
    Ok(import_all(connector, targets).await)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use serde_json::json;

    use super::*;
    use crate::memory_store::MemoryConnector;
    use crate::EngineError;

    fn write_collection(dir: &Path, file: &str, names: &[&str]) -> PathBuf {
        let features: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [118.0 + index as f64, 32.0]},
                    "properties": {"name": name, "describe": format!("feature {index}"), "rank": index}
                })
            })
            .collect();
        let collection = json!({"type": "FeatureCollection", "features": features});
        let path = dir.join(file);
        fs::write(&path, collection.to_string()).expect("write collection");
        path
    }

    #[tokio::test]
    async fn imports_one_row_per_feature_under_declared_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_collection(dir.path(), "nanjing.geojson", &["玄武区", "秦淮区", "鼓楼区"]);
        let connector = MemoryConnector::default();

        let outcome = import_file(&connector, &ImportTarget::new(&path, "南京市"))
            .await
            .expect("import");

        assert_eq!(outcome, ImportOutcome::Imported { rows: 3 });
        let state = connector.state();
        assert_eq!(state.rows.len(), 3);
        assert!(state
            .rows
            .iter()
            .all(|row| row.source_name.as_deref() == Some("南京市")));
    }

    #[tokio::test]
    async fn name_and_describe_fill_columns_and_bag_keeps_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_collection(dir.path(), "one.geojson", &["玄武区"]);
        let connector = MemoryConnector::default();

        import_file(&connector, &ImportTarget::new(&path, "南京市"))
            .await
            .expect("import");

        let state = connector.state();
        let row = &state.rows[0];
        assert_eq!(row.name.as_deref(), Some("玄武区"));
        assert_eq!(row.description.as_deref(), Some("feature 0"));
        assert_eq!(row.properties.get("rank"), Some(&json!(0)));
        assert_eq!(row.geometry.as_ref().unwrap()["type"], json!("Point"));
    }

    #[tokio::test]
    async fn reimporting_same_name_is_a_skip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_collection(dir.path(), "a.geojson", &["x", "y"]);
        let connector = MemoryConnector::default();
        let target = ImportTarget::new(&path, "A");

        import_file(&connector, &target).await.expect("first import");
        let second = import_file(&connector, &target).await.expect("second import");

        assert_eq!(second, ImportOutcome::Skipped { existing: 2 });
        assert_eq!(connector.state().rows.len(), 2);
    }

    #[tokio::test]
    async fn insert_failure_rolls_back_the_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_collection(dir.path(), "a.geojson", &["x", "y", "z"]);
        let connector = MemoryConnector::default();
        connector.state().fail_insert_at = Some(2);

        let err = import_file(&connector, &ImportTarget::new(&path, "A"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("injected insert failure"));
        let state = connector.state();
        assert!(state.rows.is_empty());
        assert_eq!(state.rollbacks, 1);
        assert_eq!(state.closed, state.connections);
    }

    #[tokio::test]
    async fn parse_failure_inserts_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{\"type\": \"FeatureCollection\", \"features\": [").unwrap();
        let connector = MemoryConnector::default();

        let err = import_file(&connector, &ImportTarget::new(&path, "broken"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Json(_)));
        let state = connector.state();
        assert!(state.rows.is_empty());
        assert_eq!(state.closed, 1);
    }

    #[tokio::test]
    async fn import_all_reports_each_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write_collection(dir.path(), "good.geojson", &["x", "y"]);
        let bad = dir.path().join("bad.geojson");
        fs::write(&bad, r#"{"type": "Feature"}"#).unwrap();
        let missing = dir.path().join("missing.geojson");
        let connector = MemoryConnector::default();

        let targets = vec![
            ImportTarget::new(&good, "good"),
            ImportTarget::new(&missing, "missing"),
            ImportTarget::new(&bad, "bad"),
            ImportTarget::new(&good, "good"),
        ];
        let summary = run_import(&connector, &targets).await.expect("run import");

        let statuses: Vec<_> = summary.reports.iter().map(|r| r.status.clone()).collect();
        assert_eq!(statuses[0], ImportStatus::Imported { rows: 2 });
        assert_eq!(statuses[1], ImportStatus::Missing);
        assert!(matches!(statuses[2], ImportStatus::Failed { .. }));
        assert_eq!(statuses[3], ImportStatus::Skipped { existing: 2 });
        assert_eq!(summary.imported_rows(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert!(!summary.is_success());
        assert!(connector.state().schema_ready);
    }

    #[tokio::test]
    async fn missing_file_only_summary_is_success() {
        let connector = MemoryConnector::default();
        let targets = vec![ImportTarget::new("no/such/file.geojson", "ghost")];

        let summary = import_all(&connector, &targets).await;

        assert_eq!(summary.reports[0].status, ImportStatus::Missing);
        assert!(summary.is_success());
        assert_eq!(connector.state().connections, 0);
    }

    #[tokio::test]
    async fn schema_failure_stops_before_any_import() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_collection(dir.path(), "a.geojson", &["x"]);
        let connector = MemoryConnector::default();
        connector.state().fail_schema = true;

        let result = run_import(&connector, &[ImportTarget::new(&path, "A")]).await;

        assert!(result.is_err());
        let state = connector.state();
        assert_eq!(state.connections, 1);
        assert_eq!(state.closed, 1);
        assert!(state.rows.is_empty());
    }

    #[test]
    fn summary_serializes_status_inline() {
        let summary = ImportSummary {
            reports: vec![ImportReport {
                path: PathBuf::from("data/a.geojson"),
                name: "A".to_string(),
                status: ImportStatus::Imported { rows: 4 },
            }],
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(
            value,
            json!({"reports": [{"path": "data/a.geojson", "name": "A", "status": "imported", "rows": 4}]})
        );
    }
}
