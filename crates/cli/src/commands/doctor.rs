use approvo_core::config::{AppConfig, LoadOptions};
use approvo_db::{connect_with_config, migrations::MIGRATOR, DbPool, DemoSeedDataset};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "schema_version", "approval_catalog"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let skipped = checks.iter().any(|check| check.status == CheckStatus::Skipped);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);

    let (overall_status, summary) = if failed || skipped {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to connect to database: {error}"),
                }];
            }
        };

        let checks = vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            schema_check(&pool).await,
            catalog_check(&pool).await,
        ];
        pool.close().await;
        checks
    })
}

async fn schema_check(pool: &DbPool) -> DoctorCheck {
    let latest = MIGRATOR.iter().map(|migration| migration.version).max().unwrap_or_default();
    let applied: Result<Option<i64>, sqlx::Error> =
        sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await;

    match applied {
        Ok(Some(version)) if version >= latest => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Pass,
            details: format!("schema at migration {version}"),
        },
        Ok(version) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: format!(
                "schema at migration {}, expected {latest}; run `approvo migrate`",
                version.unwrap_or_default()
            ),
        },
        Err(_) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: "no migrations applied; run `approvo migrate`".to_string(),
        },
    }
}

/// An empty rule catalog is legal but every proposal would stay pending forever.
async fn catalog_check(pool: &DbPool) -> DoctorCheck {
    let rules: Result<i64, sqlx::Error> =
        sqlx::query_scalar("SELECT COUNT(1) FROM approval_rule").fetch_one(pool).await;

    match rules {
        Ok(0) => DoctorCheck {
            name: "approval_catalog",
            status: CheckStatus::Warn,
            details: "no approval rules configured; run `approvo seed` for demo data".to_string(),
        },
        Ok(count) => {
            let demo = DemoSeedDataset::verify(pool)
                .await
                .map(|verification| verification.all_present)
                .unwrap_or(false);
            DoctorCheck {
                name: "approval_catalog",
                status: CheckStatus::Pass,
                details: format!(
                    "{count} approval rule(s) configured{}",
                    if demo { " (demo dataset)" } else { "" }
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "approval_catalog",
            status: CheckStatus::Skipped,
            details: format!("approval rules unreadable: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
