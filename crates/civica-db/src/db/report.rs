use chrono::{DateTime, Utc};
use civica_core::models::{IssueCategory, ReportSummary};
use civica_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Report lookup used by the attach and detach flows.
/// Reports are owned by another service; this side only reads them.
#[async_trait::async_trait]
pub trait ReportRepositoryTrait: Send + Sync {
    async fn find_report(&self, report_id: Uuid) -> Result<Option<ReportSummary>, AppError>;

    async fn report_exists(&self, report_id: Uuid) -> Result<bool, AppError> {
        Ok(self.find_report(report_id).await?.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    coordinate: String,
    reported_at: DateTime<Utc>,
    issue_name: String,
}

impl TryFrom<ReportRow> for ReportSummary {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let issue_category = row.issue_name.parse::<IssueCategory>().map_err(|e| {
            AppError::Internal(format!("Report {} has unknown issue type: {}", row.id, e))
        })?;
        Ok(ReportSummary {
            id: row.id,
            coordinate: row.coordinate,
            reported_at: row.reported_at,
            issue_category,
        })
    }
}

#[derive(Clone)]
pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportRepositoryTrait for PostgresReportRepository {
    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select", db.record_id = %report_id))]
    async fn find_report(&self, report_id: Uuid) -> Result<Option<ReportSummary>, AppError> {
        let row = sqlx::query_as::<Postgres, ReportRow>(
            r#"
            SELECT r.id, r.coordinate, r.reported_at, i.name AS issue_name
            FROM reports r
            JOIN issues i ON i.id = r.issue_id
            WHERE r.id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportSummary::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select", db.record_id = %report_id))]
    async fn report_exists(&self, report_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM reports WHERE id = $1)",
        )
        .bind(report_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
