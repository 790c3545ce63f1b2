//! Changelog CMS and read-receipt notifications.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Changelog, ChangelogStore, ChangelogType, ChangelogWrite, SqliteStore, User};
use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::pagination::{Page, PageRequest};

const VERSION_TAKEN: &str = "Versi sudah digunakan.";

/// Create/update payload. `release_date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ChangelogInput {
    #[validate(length(min = 1, max = 50, message = "Versi wajib diisi (maksimal 50 karakter)."))]
    pub version: String,
    #[schema(value_type = String, format = Date)]
    pub release_date: NaiveDate,
    #[serde(rename = "type")]
    pub change_type: ChangelogType,
    #[validate(length(min = 1, max = 255, message = "Judul wajib diisi (maksimal 255 karakter)."))]
    pub title: String,
    #[validate(length(min = 1, message = "Deskripsi wajib diisi."))]
    pub description: String,
    #[validate(length(min = 1, message = "Minimal satu perubahan harus diisi."))]
    pub changes: Vec<String>,
    #[serde(default)]
    pub technical_notes: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
}

impl ChangelogInput {
    fn check(&self) -> CoreResult<ChangelogWrite> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        let changes: Vec<String> = clean_list(&self.changes);
        if changes.is_empty() && !errors.contains("changes") {
            errors.add("changes", "Minimal satu perubahan harus diisi.");
        }
        if self.description.trim().is_empty() && !errors.contains("description") {
            errors.add("description", "Deskripsi wajib diisi.");
        }
        errors.into_result()?;

        Ok(ChangelogWrite {
            version: self.version.trim().to_owned(),
            release_date: self.release_date,
            change_type: self.change_type,
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            changes,
            technical_notes: clean_list(&self.technical_notes),
            is_published: self.is_published,
        })
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Clone, Debug)]
pub struct ChangelogService {
    store: SqliteStore,
}

impl ChangelogService {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    // ── admin ──────────────────────────────────────────────────────────────────

    pub async fn list_all(&self, page: PageRequest) -> CoreResult<Page<Changelog>> {
        let (items, total) = self.store.list_changelogs(false, page.limit(), page.offset()).await?;
        Ok(Page::new(items, page, total))
    }

    pub async fn get(&self, id: i64) -> CoreResult<Changelog> {
        self.store
            .get_changelog(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("changelog {id}")))
    }

    pub async fn create(&self, author: &User, input: ChangelogInput) -> CoreResult<Changelog> {
        let entry = input.check()?;
        if self.store.version_taken(&entry.version, None).await? {
            return Err(CoreError::Validation(FieldErrors::single("version", VERSION_TAKEN)));
        }
        let created = self
            .store
            .insert_changelog(entry, author.id)
            .await
            .map_err(|e| CoreError::unique_field(e, "version", VERSION_TAKEN))?;
        info!(changelog_id = created.id, version = %created.version, author_id = author.id, "changelog created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: ChangelogInput) -> CoreResult<Changelog> {
        self.get(id).await?;
        let entry = input.check()?;
        if self.store.version_taken(&entry.version, Some(id)).await? {
            return Err(CoreError::Validation(FieldErrors::single("version", VERSION_TAKEN)));
        }
        self.store
            .update_changelog(id, entry)
            .await
            .map_err(|e| CoreError::unique_field(e, "version", VERSION_TAKEN))?;
        info!(changelog_id = id, "changelog updated");
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> CoreResult<()> {
        if !self.store.delete_changelog(id).await? {
            return Err(CoreError::NotFound(format!("changelog {id}")));
        }
        info!(changelog_id = id, "changelog deleted");
        Ok(())
    }

    pub async fn toggle_publish(&self, id: i64) -> CoreResult<Changelog> {
        let current = self.get(id).await?;
        self.store.set_changelog_published(id, !current.is_published).await?;
        info!(changelog_id = id, published = !current.is_published, "changelog publish toggled");
        self.get(id).await
    }

    // ── readers ────────────────────────────────────────────────────────────────

    pub async fn list_published(&self, page: PageRequest) -> CoreResult<Page<Changelog>> {
        let (items, total) = self.store.list_changelogs(true, page.limit(), page.offset()).await?;
        Ok(Page::new(items, page, total))
    }

    /// Drafts are visible to admins only.
    pub async fn show_for(&self, viewer: &User, id: i64) -> CoreResult<Changelog> {
        let entry = self.get(id).await?;
        if !entry.is_published && !viewer.role.is_admin() {
            return Err(CoreError::NotFound(format!("changelog {id}")));
        }
        Ok(entry)
    }

    // ── notifications ──────────────────────────────────────────────────────────

    pub async fn unread_count(&self, user: &User) -> CoreResult<UnreadCount> {
        Ok(UnreadCount { count: self.store.count_unread_changelogs(user.id).await? })
    }

    pub async fn unread(&self, user: &User) -> CoreResult<Vec<Changelog>> {
        Ok(self.store.list_unread_changelogs(user.id).await?)
    }

    /// Idempotent; unpublished or missing entries are reported as not found.
    pub async fn mark_read(&self, user: &User, id: i64) -> CoreResult<()> {
        match self.store.get_changelog(id).await? {
            Some(entry) if entry.is_published => {
                let inserted = self.store.mark_changelog_viewed(user.id, id).await?;
                tracing::debug!(user_id = user.id, changelog_id = id, inserted, "changelog marked read");
                Ok(())
            }
            _ => Err(CoreError::NotFound(format!("changelog {id}"))),
        }
    }

    pub async fn mark_all_read(&self, user: &User) -> CoreResult<u64> {
        let marked = self.store.mark_all_changelogs_viewed(user.id).await?;
        info!(user_id = user.id, marked, "all changelogs marked read");
        Ok(marked)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{NewUser, Role, UserStore};

    async fn setup() -> (ChangelogService, SqliteStore, User) {
        let store = SqliteStore::in_memory().await.unwrap();
        let admin = store
            .insert_user(NewUser {
                name: "Admin".into(),
                email: "admin@example.com".into(),
                password_hash: "x".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        (ChangelogService::new(store.clone()), store, admin)
    }

    fn input(version: &str, published: bool) -> ChangelogInput {
        ChangelogInput {
            version: version.into(),
            release_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            change_type: ChangelogType::Minor,
            title: "Rilis".into(),
            description: "Perbaikan umum".into(),
            changes: vec!["Fitur baru".into(), "  ".into()],
            technical_notes: vec![],
            is_published: published,
        }
    }

    #[tokio::test]
    async fn version_unique_on_create_and_update() {
        let (svc, _, admin) = setup().await;
        let a = svc.create(&admin, input("1.0.0", true)).await.unwrap();
        let b = svc.create(&admin, input("1.1.0", true)).await.unwrap();
        assert_eq!(a.changes, vec!["Fitur baru".to_owned()]);

        let dup = svc.create(&admin, input("1.0.0", false)).await;
        assert!(matches!(dup, Err(CoreError::Validation(ref e)) if e.contains("version")));

        // Updating to its own version is fine, to another entry's is not.
        svc.update(a.id, input("1.0.0", true)).await.unwrap();
        let clash = svc.update(b.id, input("1.0.0", true)).await;
        assert!(matches!(clash, Err(CoreError::Validation(ref e)) if e.contains("version")));
    }

    #[tokio::test]
    async fn version_constraint_race_is_a_field_error() {
        let (_, store, admin) = setup().await;
        // Both writers passed `version_taken`; the constraint decides.
        store.insert_changelog(input("3.0.0", true).check().unwrap(), admin.id).await.unwrap();
        let err = store
            .insert_changelog(input("3.0.0", false).check().unwrap(), admin.id)
            .await
            .map_err(|e| CoreError::unique_field(e, "version", VERSION_TAKEN))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref e) if e.0["version"] == [VERSION_TAKEN]));
    }

    #[tokio::test]
    async fn blank_changes_are_rejected() {
        let (svc, _, admin) = setup().await;
        let bad = ChangelogInput { changes: vec![" ".into()], ..input("2.0.0", false) };
        let res = svc.create(&admin, bad).await;
        assert!(matches!(res, Err(CoreError::Validation(ref e)) if e.contains("changes")));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let (svc, store, admin) = setup().await;
        let entry = svc.create(&admin, input("1.0.0", true)).await.unwrap();
        assert_eq!(svc.unread_count(&admin).await.unwrap().count, 1);

        svc.mark_read(&admin, entry.id).await.unwrap();
        svc.mark_read(&admin, entry.id).await.unwrap();
        assert_eq!(store.count_changelog_views(admin.id, entry.id).await.unwrap(), 1);
        assert_eq!(svc.unread_count(&admin).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn drafts_are_not_notifications() {
        let (svc, _, admin) = setup().await;
        let draft = svc.create(&admin, input("0.9.0", false)).await.unwrap();
        assert!(svc.unread(&admin).await.unwrap().is_empty());
        assert!(matches!(svc.mark_read(&admin, draft.id).await, Err(CoreError::NotFound(_))));

        let published = svc.toggle_publish(draft.id).await.unwrap();
        assert!(published.is_published);
        assert_eq!(svc.mark_all_read(&admin).await.unwrap(), 1);
        assert_eq!(svc.unread_count(&admin).await.unwrap().count, 0);
    }
}
