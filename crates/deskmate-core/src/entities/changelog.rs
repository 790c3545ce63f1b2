use std::future::Future;

use chrono::{NaiveDate, Utc};

use super::{
    ChangelogType, SqliteStore, dao::Changelog, from_db_time, parse_enum, parse_json_list,
    to_db_time,
};

/// Column values for creating or replacing a changelog entry.
#[derive(Debug, Clone)]
pub struct ChangelogWrite {
    pub version: String,
    pub release_date: NaiveDate,
    pub change_type: ChangelogType,
    pub title: String,
    pub description: String,
    pub changes: Vec<String>,
    pub technical_notes: Vec<String>,
    pub is_published: bool,
}

pub trait ChangelogStore: Send + Sync + 'static {
    fn insert_changelog(
        &self,
        entry: ChangelogWrite,
        created_by: i64,
    ) -> impl Future<Output = Result<Changelog, sqlx::Error>> + Send;
    fn get_changelog(&self, id: i64) -> impl Future<Output = Result<Option<Changelog>, sqlx::Error>> + Send;
    fn update_changelog(
        &self,
        id: i64,
        entry: ChangelogWrite,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn delete_changelog(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn set_changelog_published(
        &self,
        id: i64,
        published: bool,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn version_taken(
        &self,
        version: &str,
        except_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Newest release first; `published_only` hides drafts.
    fn list_changelogs(
        &self,
        published_only: bool,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<(Vec<Changelog>, i64), sqlx::Error>> + Send;
    /// Published entries `user_id` has no view record for.
    fn list_unread_changelogs(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<Changelog>, sqlx::Error>> + Send;
    fn count_unread_changelogs(&self, user_id: i64) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
    /// Idempotent; returns `true` when a new view row was written.
    fn mark_changelog_viewed(
        &self,
        user_id: i64,
        changelog_id: i64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Marks every published entry as viewed; returns rows inserted.
    fn mark_all_changelogs_viewed(&self, user_id: i64) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
    fn count_changelog_views(
        &self,
        user_id: i64,
        changelog_id: i64,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

#[derive(sqlx::FromRow)]
struct ChangelogRow {
    id: i64,
    version: String,
    release_date: String,
    #[sqlx(rename = "type")]
    change_type: String,
    title: String,
    description: String,
    changes: String,
    technical_notes: String,
    is_published: bool,
    created_by: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl From<ChangelogRow> for Changelog {
    fn from(row: ChangelogRow) -> Self {
        Changelog {
            id: row.id,
            release_date: NaiveDate::parse_from_str(&row.release_date, "%Y-%m-%d").unwrap_or_else(|e| {
                tracing::warn!(raw = %row.release_date, error = %e, "invalid release_date in changelog row");
                Utc::now().date_naive()
            }),
            version: row.version,
            change_type: parse_enum(&row.change_type, "changelogs.type", ChangelogType::Patch),
            title: row.title,
            description: row.description,
            changes: parse_json_list(&row.changes, "changelogs.changes"),
            technical_notes: parse_json_list(&row.technical_notes, "changelogs.technical_notes"),
            is_published: row.is_published,
            created_by: row.created_by,
            created_at: from_db_time(&row.created_at, "changelogs.created_at"),
            updated_at: from_db_time(&row.updated_at, "changelogs.updated_at"),
        }
    }
}

const CHANGELOG_COLUMNS: &str = "id, version, release_date, type, title, description, changes, \
     technical_notes, is_published, created_by, created_at, updated_at";

fn list_json(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_owned())
}

impl ChangelogStore for SqliteStore {
    async fn insert_changelog(&self, entry: ChangelogWrite, created_by: i64) -> Result<Changelog, sqlx::Error> {
        let now = Utc::now();
        let stamp = to_db_time(now);
        let result = sqlx::query(
            "INSERT INTO changelogs (version, release_date, type, title, description, changes, \
             technical_notes, is_published, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )
        .bind(&entry.version)
        .bind(entry.release_date.format("%Y-%m-%d").to_string())
        .bind(entry.change_type.as_ref())
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(list_json(&entry.changes))
        .bind(list_json(&entry.technical_notes))
        .bind(entry.is_published)
        .bind(created_by)
        .bind(&stamp)
        .execute(&self.pool)
        .await?;

        Ok(Changelog {
            id: result.last_insert_rowid(),
            version: entry.version,
            release_date: entry.release_date,
            change_type: entry.change_type,
            title: entry.title,
            description: entry.description,
            changes: entry.changes,
            technical_notes: entry.technical_notes,
            is_published: entry.is_published,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_changelog(&self, id: i64) -> Result<Option<Changelog>, sqlx::Error> {
        let row: Option<ChangelogRow> =
            sqlx::query_as(&format!("SELECT {CHANGELOG_COLUMNS} FROM changelogs WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Changelog::from))
    }

    async fn update_changelog(&self, id: i64, entry: ChangelogWrite) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE changelogs SET version = ?1, release_date = ?2, type = ?3, title = ?4, \
             description = ?5, changes = ?6, technical_notes = ?7, is_published = ?8, updated_at = ?9 \
             WHERE id = ?10",
        )
        .bind(&entry.version)
        .bind(entry.release_date.format("%Y-%m-%d").to_string())
        .bind(entry.change_type.as_ref())
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(list_json(&entry.changes))
        .bind(list_json(&entry.technical_notes))
        .bind(entry.is_published)
        .bind(to_db_time(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_changelog(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM changelogs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_changelog_published(&self, id: i64, published: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE changelogs SET is_published = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(published)
            .bind(to_db_time(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn version_taken(&self, version: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM changelogs WHERE version = ?1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(version)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_changelogs(
        &self,
        published_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Changelog>, i64), sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM changelogs WHERE ?1 = 0 OR is_published = 1")
                .bind(published_only)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<ChangelogRow> = sqlx::query_as(&format!(
            "SELECT {CHANGELOG_COLUMNS} FROM changelogs WHERE ?1 = 0 OR is_published = 1 \
             ORDER BY release_date DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(published_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Changelog::from).collect(), total))
    }

    async fn list_unread_changelogs(&self, user_id: i64) -> Result<Vec<Changelog>, sqlx::Error> {
        let rows: Vec<ChangelogRow> = sqlx::query_as(&format!(
            "SELECT {CHANGELOG_COLUMNS} FROM changelogs c WHERE c.is_published = 1 \
             AND NOT EXISTS (SELECT 1 FROM user_changelog_views v \
                             WHERE v.changelog_id = c.id AND v.user_id = ?1) \
             ORDER BY c.release_date DESC, c.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Changelog::from).collect())
    }

    async fn count_unread_changelogs(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM changelogs c WHERE c.is_published = 1 \
             AND NOT EXISTS (SELECT 1 FROM user_changelog_views v \
                             WHERE v.changelog_id = c.id AND v.user_id = ?1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_changelog_viewed(&self, user_id: i64, changelog_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_changelog_views (user_id, changelog_id, viewed_at) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(changelog_id)
        .bind(to_db_time(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_changelogs_viewed(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_changelog_views (user_id, changelog_id, viewed_at) \
             SELECT ?1, id, ?2 FROM changelogs WHERE is_published = 1",
        )
        .bind(user_id)
        .bind(to_db_time(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_changelog_views(&self, user_id: i64, changelog_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_changelog_views WHERE user_id = ?1 AND changelog_id = ?2",
        )
        .bind(user_id)
        .bind(changelog_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
