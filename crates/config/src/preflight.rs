use crate::settings::Config;
use mysql::MySqlAdapter;

/// Outcome of the startup preflight gate (SPEC_FULL.md §4.0): a thin
/// pass/fail collaborator the orchestrator consults before doing anything
/// else, so a misconfigured source/target fails immediately with a clear
/// reason instead of surfacing as a confusing mid-run DB error.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub source_reachable: bool,
    pub target_reachable: bool,
    pub binlog_row_format: Option<bool>,
    pub failures: Vec<String>,
}

impl PreflightReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

pub async fn run(config: &Config, source: &MySqlAdapter, target: &MySqlAdapter) -> PreflightReport {
    let mut failures = Vec::new();

    let source_reachable = source.ping().await.is_ok();
    if !source_reachable {
        failures.push(format!("source `{}` is not reachable", config.src_dsn));
    }

    let target_reachable = target.ping().await.is_ok();
    if !target_reachable {
        failures.push(format!("target `{}` is not reachable", config.tgt_dsn));
    }

    let binlog_row_format = if source_reachable {
        match binlog_format_is_row(source).await {
            Ok(is_row) => {
                if !is_row {
                    failures.push("source binlog_format is not ROW".to_string());
                }
                Some(is_row)
            }
            Err(e) => {
                failures.push(format!("could not read source binlog_format: {e}"));
                None
            }
        }
    } else {
        None
    };

    PreflightReport {
        source_reachable,
        target_reachable,
        binlog_row_format,
        failures,
    }
}

async fn binlog_format_is_row(source: &MySqlAdapter) -> Result<bool, mysql::DbError> {
    let rows = source
        .query_rows("SHOW VARIABLES LIKE 'binlog_format'", "binlog_format")
        .await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(false);
    };
    match row.get("Value") {
        Some(model::Value::String(s)) => Ok(s.eq_ignore_ascii_case("ROW")),
        _ => Ok(false),
    }
}
