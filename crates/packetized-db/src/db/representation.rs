use chrono::{DateTime, Utc};
use packetized_core::{AppError, AssetId, NewRepresentation, Representation, StreamFormat};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for published representations, one row per manifest
#[derive(Clone)]
pub struct RepresentationRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RepresentationRow {
    id: Uuid,
    asset_id: AssetId,
    format: String,
    resolution_ladder_rung: Option<String>,
    manifest_object_path: String,
    segment_count: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RepresentationRow> for Representation {
    type Error = AppError;

    fn try_from(row: RepresentationRow) -> Result<Self, Self::Error> {
        let format: StreamFormat = row
            .format
            .parse()
            .map_err(|e| AppError::Internal(format!("Corrupt representation format: {}", e)))?;

        Ok(Representation {
            id: row.id,
            asset_id: row.asset_id,
            format,
            resolution_ladder_rung: row.resolution_ladder_rung,
            manifest_object_path: row.manifest_object_path,
            segment_count: row.segment_count,
            created_at: row.created_at,
        })
    }
}

impl RepresentationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a representation. Callers only insert after the manifest object is uploaded.
    ///
    /// Rows are never modified. Recording the same manifest again, as a resumed job
    /// does, keeps the first row and returns its id.
    #[tracing::instrument(skip(self, representation), fields(
        asset_id = %representation.asset_id,
        format = %representation.format,
    ))]
    pub async fn insert(&self, representation: &NewRepresentation) -> Result<Uuid, AppError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO representations (
                id, asset_id, format, resolution_ladder_rung, manifest_object_path, segment_count
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (asset_id, manifest_object_path) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&representation.asset_id)
        .bind(representation.format.as_str())
        .bind(&representation.resolution_ladder_rung)
        .bind(&representation.manifest_object_path)
        .bind(representation.segment_count)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = id {
            return Ok(id);
        }

        tracing::debug!(
            manifest_object_path = %representation.manifest_object_path,
            "Representation already recorded"
        );
        let existing = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM representations
            WHERE asset_id = $1 AND manifest_object_path = $2
            "#,
        )
        .bind(&representation.asset_id)
        .bind(&representation.manifest_object_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }

    pub async fn list_for_asset(&self, asset_id: &AssetId) -> Result<Vec<Representation>, AppError> {
        let rows = sqlx::query_as::<_, RepresentationRow>(
            r#"
            SELECT id, asset_id, format, resolution_ladder_rung, manifest_object_path,
                   segment_count, created_at
            FROM representations
            WHERE asset_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Representation::try_from).collect()
    }
}
