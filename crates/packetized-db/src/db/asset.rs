use chrono::{DateTime, Utc};
use packetized_core::{AppError, Asset, AssetId, AssetStatus, FailureReason, NewAsset};
use sqlx::PgPool;

/// Repository for assets
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: AssetId,
    original_file_name: String,
    extension: String,
    source_object_path: String,
    status: AssetStatus,
    failure_reason: Option<String>,
    duration_seconds: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = AppError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        let failure_reason = row
            .failure_reason
            .as_deref()
            .map(str::parse::<FailureReason>)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Corrupt failure_reason: {}", e)))?;

        Ok(Asset {
            id: row.id,
            original_file_name: row.original_file_name,
            extension: row.extension,
            source_object_path: row.source_object_path,
            status: row.status,
            failure_reason,
            duration_seconds: row.duration_seconds,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an asset in `ingested` state
    #[tracing::instrument(skip(self, asset), fields(asset_id = %asset.id))]
    pub async fn insert(&self, asset: &NewAsset) -> Result<Asset, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            INSERT INTO assets (id, original_file_name, extension, source_object_path, status)
            VALUES ($1, $2, $3, $4, 'ingested')
            RETURNING id, original_file_name, extension, source_object_path, status,
                      failure_reason, duration_seconds, created_at, updated_at
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.original_file_name)
        .bind(&asset.extension)
        .bind(&asset.source_object_path)
        .fetch_one(&self.pool)
        .await?;

        Asset::try_from(row)
    }

    /// Move an asset to `status`. `failure_reason` must be set exactly when the
    /// status is `Failed`; the table constraint rejects anything else.
    pub async fn update_status(
        &self,
        id: &AssetId,
        status: AssetStatus,
        failure_reason: Option<FailureReason>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET status = $2, failure_reason = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(failure_reason.map(|reason| reason.to_string()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset {} not found", id)));
        }

        Ok(())
    }

    pub async fn set_duration(&self, id: &AssetId, duration_seconds: f64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET duration_seconds = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset {} not found", id)));
        }

        Ok(())
    }

    /// Assets that have not reached `published` or `failed`, oldest first.
    ///
    /// After a restart these are the jobs that were queued or running when the
    /// previous process stopped.
    pub async fn list_unfinished(&self) -> Result<Vec<Asset>, AppError> {
        let rows = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, original_file_name, extension, source_object_path, status,
                   failure_reason, duration_seconds, created_at, updated_at
            FROM assets
            WHERE status NOT IN ('published', 'failed')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Asset::try_from).collect()
    }

    pub async fn get(&self, id: &AssetId) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, original_file_name, extension, source_object_path, status,
                   failure_reason, duration_seconds, created_at, updated_at
            FROM assets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Asset::try_from).transpose()
    }
}
