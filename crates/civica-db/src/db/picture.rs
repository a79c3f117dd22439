use civica_core::models::{
    ContentHash, DetachPicture, NewPicture, PictureFilter, PictureRecord, VerifyPicture,
};
use civica_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const PICTURE_COLUMNS: &str = "id, key, url, preview_url, file_name, validated, \
     validated_by_users, report_id, uploaded_by, created_at, registered_at, updated_at";

/// Trait for picture metadata operations
/// This abstracts the database implementation (PostgreSQL)
#[async_trait::async_trait]
pub trait PictureRepositoryTrait: Send + Sync {
    /// Insert pictures keyed by content hash. A hash or `(report, key)` that
    /// already exists fails the whole batch with `AppError::Conflict`.
    async fn attach(&self, pictures: &[NewPicture]) -> Result<Vec<PictureRecord>, AppError>;

    /// Record promoted URLs and validation flags.
    async fn verify(&self, data: VerifyPicture) -> Result<PictureRecord, AppError>;

    async fn find(&self, filter: &PictureFilter) -> Result<Vec<PictureRecord>, AppError>;

    async fn find_by_id(&self, id: &ContentHash) -> Result<Option<PictureRecord>, AppError>;

    async fn find_by_hashes(&self, hashes: &[ContentHash]) -> Result<Vec<PictureRecord>, AppError>;

    async fn find_by_report_and_key(
        &self,
        report_id: Uuid,
        key: &str,
    ) -> Result<Option<PictureRecord>, AppError>;

    /// Delete a picture scoped to its report. Returns the affected row count;
    /// a mismatched report id affects zero rows.
    async fn detach(&self, data: &DetachPicture) -> Result<u64, AppError>;
}

/// Refuse a detach request for a picture carrying either validation flag.
pub fn ensure_detachable(data: &DetachPicture) -> Result<(), AppError> {
    if data.validated || data.validated_by_users {
        return Err(AppError::Policy(format!(
            "Picture {} is validated and cannot be deleted",
            data.picture_id
        )));
    }
    Ok(())
}

fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            tracing::debug!(
                constraint = ?db_err.constraint(),
                "Picture insert hit uniqueness constraint"
            );
            return AppError::Conflict("Picture already attached".to_string());
        }
        if db_err.is_foreign_key_violation() {
            tracing::warn!(
                constraint = ?db_err.constraint(),
                "Picture insert references a missing report or uploader"
            );
            return AppError::InvalidInput(
                "Picture references a report or uploader that does not exist".to_string(),
            );
        }
    }
    AppError::Database(err)
}

#[derive(Clone)]
pub struct PostgresPictureRepository {
    pool: PgPool,
}

impl PostgresPictureRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PictureRepositoryTrait for PostgresPictureRepository {
    #[tracing::instrument(skip(self, pictures), fields(
        db.table = "report_pictures",
        db.operation = "insert",
        count = pictures.len()
    ))]
    async fn attach(&self, pictures: &[NewPicture]) -> Result<Vec<PictureRecord>, AppError> {
        if pictures.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO report_pictures (id, key, file_name, registered_at, report_id, uploaded_by) ",
        );
        builder.push_values(pictures, |mut row, picture| {
            row.push_bind(picture.id.as_str())
                .push_bind(&picture.key)
                .push_bind(&picture.file_name)
                .push_bind(picture.registered_at)
                .push_bind(picture.report_id)
                .push_bind(picture.uploaded_by_id);
        });
        builder.push(" RETURNING ");
        builder.push(PICTURE_COLUMNS);

        let records = builder
            .build_query_as::<PictureRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_write_error)?;

        tracing::info!(count = records.len(), "Pictures attached");

        Ok(records)
    }

    #[tracing::instrument(skip(self, data), fields(db.table = "report_pictures", db.operation = "update"))]
    async fn verify(&self, data: VerifyPicture) -> Result<PictureRecord, AppError> {
        let data = data.into_complete()?;

        let record = sqlx::query_as::<Postgres, PictureRecord>(&format!(
            r#"
            UPDATE report_pictures
            SET url = $4, preview_url = $5, validated = $6, validated_by_users = $7, updated_at = NOW()
            WHERE id = $1 AND report_id = $2 AND key = $3
            RETURNING {}
            "#,
            PICTURE_COLUMNS
        ))
        .bind(data.id.as_str())
        .bind(data.report_id)
        .bind(&data.key)
        .bind(&data.url)
        .bind(&data.preview_url)
        .bind(data.validated)
        .bind(data.validated_by_users)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or_else(|| {
            AppError::NotFound(format!(
                "Picture {} not found in report {}",
                data.id, data.report_id
            ))
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "report_pictures", db.operation = "select"))]
    async fn find(&self, filter: &PictureFilter) -> Result<Vec<PictureRecord>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(PICTURE_COLUMNS);
        builder.push(" FROM report_pictures WHERE TRUE");

        if let Some(id) = &filter.id {
            builder.push(" AND id = ").push_bind(id.as_str());
        }
        if let Some(report_id) = filter.report_id {
            builder.push(" AND report_id = ").push_bind(report_id);
        }
        if let Some(key) = &filter.key {
            builder.push(" AND key = ").push_bind(key.as_str());
        }
        if let Some(uploaded_by) = filter.uploaded_by_id {
            builder.push(" AND uploaded_by = ").push_bind(uploaded_by);
        }
        if let Some(validated) = filter.validated {
            builder.push(" AND validated = ").push_bind(validated);
        }
        builder.push(" ORDER BY registered_at ASC, id ASC");

        let records = builder
            .build_query_as::<PictureRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "report_pictures", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: &ContentHash) -> Result<Option<PictureRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, PictureRecord>(&format!(
            "SELECT {} FROM report_pictures WHERE id = $1",
            PICTURE_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self, hashes), fields(db.table = "report_pictures", db.operation = "select", count = hashes.len()))]
    async fn find_by_hashes(&self, hashes: &[ContentHash]) -> Result<Vec<PictureRecord>, AppError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hashes.iter().map(|h| h.as_str().to_string()).collect();
        let records = sqlx::query_as::<Postgres, PictureRecord>(&format!(
            "SELECT {} FROM report_pictures WHERE id = ANY($1)",
            PICTURE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "report_pictures", db.operation = "select"))]
    async fn find_by_report_and_key(
        &self,
        report_id: Uuid,
        key: &str,
    ) -> Result<Option<PictureRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, PictureRecord>(&format!(
            "SELECT {} FROM report_pictures WHERE report_id = $1 AND key = $2",
            PICTURE_COLUMNS
        ))
        .bind(report_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "report_pictures", db.operation = "delete", db.record_id = %data.picture_id))]
    async fn detach(&self, data: &DetachPicture) -> Result<u64, AppError> {
        ensure_detachable(data)?;

        // The flag guard in SQL covers a curation update landing between the
        // caller's read and this delete.
        let result = sqlx::query(
            r#"
            DELETE FROM report_pictures
            WHERE id = $1 AND report_id = $2
              AND validated = FALSE AND validated_by_users = FALSE
            "#,
        )
        .bind(data.picture_id.as_str())
        .bind(data.report_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
