use crate::store::{
    AlbumPage, AlbumStore, AlbumStoreError, AlbumStoreResult, InvalidAlbum, ManifestUpdate,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use goldenhour_core::{Album, ContinuationToken, ImageEntry};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};

#[derive(Debug, FromRow)]
struct AlbumRow {
    album_id: String,
    title: String,
    s3_prefix: Option<String>,
    // Decoded per album, so one bad manifest cannot fail the whole page.
    images: Json<serde_json::Value>,
    cover_thumb_key: Option<String>,
    cover_blurhash: Option<String>,
    revision: i64,
}

impl TryFrom<AlbumRow> for Album {
    type Error = AlbumStoreError;

    fn try_from(row: AlbumRow) -> Result<Self, Self::Error> {
        let images: Vec<ImageEntry> = serde_json::from_value(row.images.0).map_err(|e| {
            AlbumStoreError::Serialization(format!("album {} images: {}", row.album_id, e))
        })?;

        Ok(Album {
            album_id: row.album_id,
            title: row.title,
            s3_prefix: row.s3_prefix,
            images,
            cover_thumb_key: row.cover_thumb_key,
            cover_blurhash: row.cover_blurhash,
            revision: row.revision,
        })
    }
}

/// Split fetched rows (up to `limit + 1`) into a page.
fn page_from_rows(mut rows: Vec<AlbumRow>, limit: u32) -> AlbumPage {
    let has_more = rows.len() > limit as usize;
    rows.truncate(limit as usize);

    // The token follows the last row read, decodable or not.
    let next_token = if has_more {
        rows.last().map(|row| encode_token(&row.album_id))
    } else {
        None
    };

    let mut page = AlbumPage {
        next_token,
        ..Default::default()
    };
    for row in rows {
        let album_id = row.album_id.clone();
        match Album::try_from(row) {
            Ok(album) => page.albums.push(album),
            Err(error) => {
                tracing::warn!(
                    album_id = %album_id,
                    error = %error,
                    "Skipping album with undecodable manifest"
                );
                page.invalid.push(InvalidAlbum { album_id, error });
            }
        }
    }
    page
}

/// Encode the last album id of a page as an opaque continuation token.
pub(crate) fn encode_token(album_id: &str) -> ContinuationToken {
    ContinuationToken::new(URL_SAFE_NO_PAD.encode(album_id.as_bytes()))
}

/// Recover the album id a continuation token resumes after.
pub(crate) fn decode_token(token: &ContinuationToken) -> AlbumStoreResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_str())
        .map_err(|e| AlbumStoreError::InvalidToken(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AlbumStoreError::InvalidToken(e.to_string()))
}

/// Repository for album records in PostgreSQL
#[derive(Clone)]
pub struct PgAlbumRepository {
    pool: PgPool,
}

impl PgAlbumRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumStore for PgAlbumRepository {
    #[tracing::instrument(skip(self, token), fields(db.table = "albums", db.operation = "select"))]
    async fn scan_page(
        &self,
        token: Option<&ContinuationToken>,
        limit: u32,
    ) -> AlbumStoreResult<AlbumPage> {
        let after = token.map(decode_token).transpose()?;
        let limit = limit.max(1);

        // One extra row tells us whether another page follows.
        let rows = sqlx::query_as::<Postgres, AlbumRow>(
            r#"
            SELECT album_id, title, s3_prefix, images, cover_thumb_key, cover_blurhash, revision
            FROM albums
            WHERE $1::TEXT IS NULL OR album_id > $1
            ORDER BY album_id ASC
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.pool)
        .await?;

        Ok(page_from_rows(rows, limit))
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "albums", db.operation = "update", db.record_id = %album_id, images = update.images.len()))]
    async fn update_images(
        &self,
        album_id: &str,
        update: ManifestUpdate,
    ) -> AlbumStoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE albums
            SET images = $2, cover_thumb_key = $3, cover_blurhash = $4
            WHERE album_id = $1 AND revision = $5
            "#,
        )
        .bind(album_id)
        .bind(Json(&update.images))
        .bind(&update.cover_thumb_key)
        .bind(&update.cover_blurhash)
        .bind(update.expected_revision)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<Postgres, bool>(
                "SELECT EXISTS(SELECT 1 FROM albums WHERE album_id = $1)",
            )
            .bind(album_id)
            .fetch_one(&self.pool)
            .await?;

            return Err(if exists {
                AlbumStoreError::Conflict(album_id.to_string())
            } else {
                AlbumStoreError::NotFound(album_id.to_string())
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_round_trips_album_id() {
        let token = encode_token("2024-06-01-wedding");
        assert_ne!(token.as_str(), "2024-06-01-wedding");
        assert_eq!(decode_token(&token).unwrap(), "2024-06-01-wedding");
    }

    fn row(album_id: &str, images: serde_json::Value) -> AlbumRow {
        AlbumRow {
            album_id: album_id.to_string(),
            title: format!("Album {}", album_id),
            s3_prefix: None,
            images: Json(images),
            cover_thumb_key: None,
            cover_blurhash: None,
            revision: 3,
        }
    }

    #[test]
    fn test_undecodable_manifest_is_isolated_to_its_album() {
        let rows = vec![
            row("a", json!([{"rawKey": "albums/a/1.jpg", "url": "https://cdn/a/1.jpg"}])),
            row("b", json!([{"rawKey": "albums/b/1.jpg"}, {"url": "https://cdn/b/2.jpg"}])),
            row("c", json!([])),
            row("d", json!([])),
        ];

        let page = page_from_rows(rows, 3);

        let ids: Vec<&str> = page.albums.iter().map(|a| a.album_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(page.albums[0].revision, 3);
        assert_eq!(page.albums[0].images[0].extra["url"], "https://cdn/a/1.jpg");

        assert_eq!(page.invalid.len(), 1);
        assert_eq!(page.invalid[0].album_id, "b");
        assert!(matches!(
            page.invalid[0].error,
            AlbumStoreError::Serialization(_)
        ));

        // Resumes after "c", the last row on the page.
        let token = page.next_token.expect("a fourth row was fetched");
        assert_eq!(decode_token(&token).unwrap(), "c");
    }

    #[test]
    fn test_last_page_has_no_token() {
        let page = page_from_rows(vec![row("x", json!("not a list"))], 5);
        assert!(page.albums.is_empty());
        assert_eq!(page.invalid.len(), 1);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        let result = decode_token(&ContinuationToken::new("not base64!"));
        assert!(matches!(result, Err(AlbumStoreError::InvalidToken(_))));
    }
}
