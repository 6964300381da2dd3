//! CSV-to-table import: one linear pass over the backend functions,
//! stopping at the first failure. Nothing is retried or rolled back.
//!
//! `POST /api/import` drives it when the app state is given a backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvAnalysis {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSchema {
    pub sql: String,
}

/// Remote procedures the import relies on. Implementations own transport
/// and authentication; errors come back as plain messages.
#[async_trait]
pub trait CsvBackend: Send + Sync {
    async fn upload_file(&self, file_name: &str, bytes: &[u8]) -> Result<UploadedFile, String>;
    async fn analyze_csv(&self, path: &str) -> Result<CsvAnalysis, String>;
    async fn generate_schema(
        &self,
        analysis_id: &str,
        table_name: &str,
    ) -> Result<GeneratedSchema, String>;
    async fn execute_sql(&self, sql: &str) -> Result<(), String>;
    async fn import_csv_data(&self, analysis_id: &str, table_name: &str) -> Result<(), String>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStage {
    Upload,
    Analyze,
    GenerateSchema,
    CreateTable,
    ImportRows,
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ImportStage::Upload => "upload",
            ImportStage::Analyze => "analyze",
            ImportStage::GenerateSchema => "generate-schema",
            ImportStage::CreateTable => "create-table",
            ImportStage::ImportRows => "import-rows",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("{0} is empty")]
    EmptyFile(String),
    #[error("cannot derive a table name from {0:?}")]
    InvalidTableName(String),
    #[error("analysis finished with status {status:?}")]
    AnalysisIncomplete { status: String },
    #[error("{stage} failed: {message}")]
    Backend { stage: ImportStage, message: String },
}

impl ImportError {
    pub fn stage(&self) -> Option<ImportStage> {
        match self {
            ImportError::Backend { stage, .. } => Some(*stage),
            ImportError::AnalysisIncomplete { .. } => Some(ImportStage::Analyze),
            ImportError::EmptyFile(_) | ImportError::InvalidTableName(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub path: String,
    pub analysis_id: String,
    pub table_name: String,
    pub sql: String,
}

/// Lowercased identifier built from a file name: extension dropped,
/// non-alphanumeric runs collapsed to `_`, `t_` prefix when it would start
/// with a digit.
pub fn table_name_from_file(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let mut name = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_');
    if name.is_empty() {
        return None;
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("t_{name}"))
    } else {
        Some(name.to_string())
    }
}

pub async fn run_import<B: CsvBackend + ?Sized>(
    backend: &B,
    file_name: &str,
    bytes: &[u8],
    table_override: Option<&str>,
) -> Result<ImportReport, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::EmptyFile(file_name.to_string()));
    }
    let table_name = match table_override {
        Some(name) => table_name_from_file(name),
        None => table_name_from_file(file_name),
    }
    .ok_or_else(|| ImportError::InvalidTableName(table_override.unwrap_or(file_name).to_string()))?;

    let uploaded = backend
        .upload_file(file_name, bytes)
        .await
        .map_err(stage_error(ImportStage::Upload))?;
    info!(path = %uploaded.path, size = bytes.len(), "csv uploaded");

    let analysis = backend
        .analyze_csv(&uploaded.path)
        .await
        .map_err(stage_error(ImportStage::Analyze))?;
    if analysis.status != "completed" {
        warn!(status = %analysis.status, "csv analysis did not complete");
        return Err(ImportError::AnalysisIncomplete {
            status: analysis.status,
        });
    }

    let schema = backend
        .generate_schema(&analysis.id, &table_name)
        .await
        .map_err(stage_error(ImportStage::GenerateSchema))?;
    backend
        .execute_sql(&schema.sql)
        .await
        .map_err(stage_error(ImportStage::CreateTable))?;
    backend
        .import_csv_data(&analysis.id, &table_name)
        .await
        .map_err(stage_error(ImportStage::ImportRows))?;
    info!(table = %table_name, "csv imported");

    Ok(ImportReport {
        path: uploaded.path,
        analysis_id: analysis.id,
        table_name,
        sql: schema.sql,
    })
}

fn stage_error(stage: ImportStage) -> impl Fn(String) -> ImportError {
    move |message| ImportError::Backend { stage, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<&'static str>>,
        analysis_status: Option<&'static str>,
        fail_at: Option<&'static str>,
    }

    impl FakeBackend {
        fn record(&self, call: &'static str) -> Result<(), String> {
            self.calls.lock().expect("calls lock").push(call);
            if self.fail_at == Some(call) {
                Err(format!("{call} exploded"))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl CsvBackend for FakeBackend {
        async fn upload_file(
            &self,
            file_name: &str,
            _bytes: &[u8],
        ) -> Result<UploadedFile, String> {
            self.record("upload")?;
            Ok(UploadedFile {
                path: format!("uploads/{file_name}"),
            })
        }

        async fn analyze_csv(&self, path: &str) -> Result<CsvAnalysis, String> {
            self.record("analyze")?;
            Ok(CsvAnalysis {
                id: format!("analysis:{path}"),
                status: self.analysis_status.unwrap_or("completed").to_string(),
                result: serde_json::json!({"columns": ["date", "amount"]}),
            })
        }

        async fn generate_schema(
            &self,
            _analysis_id: &str,
            table_name: &str,
        ) -> Result<GeneratedSchema, String> {
            self.record("schema")?;
            Ok(GeneratedSchema {
                sql: format!("CREATE TABLE {table_name} (date DATE, amount NUMERIC)"),
            })
        }

        async fn execute_sql(&self, _sql: &str) -> Result<(), String> {
            self.record("execute")
        }

        async fn import_csv_data(
            &self,
            _analysis_id: &str,
            _table_name: &str,
        ) -> Result<(), String> {
            self.record("import")
        }
    }

    #[test]
    fn table_names_are_sanitized() {
        assert_eq!(table_name_from_file("Q3 Holdings.csv").as_deref(), Some("q3_holdings"));
        assert_eq!(table_name_from_file("/tmp/2024-trades.CSV").as_deref(), Some("t_2024_trades"));
        assert_eq!(table_name_from_file("--weird__name--").as_deref(), Some("weird_name"));
        assert_eq!(table_name_from_file(".csv").as_deref(), Some("csv"));
        assert_eq!(table_name_from_file("***.csv"), None);
    }

    #[tokio::test]
    async fn import_runs_every_stage_in_order() {
        let backend = FakeBackend::default();
        let report = run_import(&backend, "Trades.csv", b"date,amount\n", None)
            .await
            .expect("import succeeds");

        assert_eq!(backend.calls(), ["upload", "analyze", "schema", "execute", "import"]);
        assert_eq!(report.table_name, "trades");
        assert_eq!(report.path, "uploads/Trades.csv");
        assert!(report.sql.starts_with("CREATE TABLE trades"));
    }

    #[tokio::test]
    async fn failure_aborts_remaining_stages() {
        let backend = FakeBackend {
            fail_at: Some("execute"),
            ..FakeBackend::default()
        };
        let err = run_import(&backend, "trades.csv", b"a\n1\n", Some("ledger"))
            .await
            .expect_err("execute fails");

        assert_eq!(err.stage(), Some(ImportStage::CreateTable));
        assert_eq!(backend.calls(), ["upload", "analyze", "schema", "execute"]);
    }

    #[tokio::test]
    async fn incomplete_analysis_stops_before_schema() {
        let backend = FakeBackend {
            analysis_status: Some("failed"),
            ..FakeBackend::default()
        };
        let err = run_import(&backend, "trades.csv", b"a\n1\n", None)
            .await
            .expect_err("analysis incomplete");

        assert_eq!(
            err,
            ImportError::AnalysisIncomplete {
                status: "failed".to_string()
            }
        );
        assert_eq!(backend.calls(), ["upload", "analyze"]);
    }

    #[tokio::test]
    async fn empty_file_never_reaches_backend() {
        let backend = FakeBackend::default();
        let err = run_import(&backend, "empty.csv", b"", None)
            .await
            .expect_err("empty file");
        assert_eq!(err, ImportError::EmptyFile("empty.csv".to_string()));
        assert!(backend.calls().is_empty());
    }
}
