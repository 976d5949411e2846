//! Settings storage.

use std::future::Future;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::model::{Settings, join_list, split_list};
use super::policy::AccountNamePolicy;
use crate::Result;

/// Lookup and persistence of account settings.
///
/// Implementations are shared by every connection task and must allow
/// concurrent queries.
pub trait SettingsStore: Send + Sync {
    /// Returns the settings of `user`, or `None` when the account is not
    /// registered.
    fn get_settings(&self, user: &str) -> impl Future<Output = Result<Option<Settings>>> + Send;

    /// Inserts or updates the settings row of `settings.user`.
    fn save(&self, settings: &Settings) -> impl Future<Output = Result<()>> + Send;
}

/// [`SettingsStore`] backed by an `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
    policy: AccountNamePolicy,
}

impl SqliteSettingsStore {
    /// Opens (or creates) the database at `database_path`.
    ///
    /// `sqlite::memory:` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str, policy: AccountNamePolicy) -> Result<Self> {
        if database_path == "sqlite::memory:" || database_path == ":memory:" {
            return Self::in_memory(policy).await;
        }

        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool, policy };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(policy: AccountNamePolicy) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool, policy };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_settings (
                username TEXT PRIMARY KEY NOT NULL,
                workmail TEXT NOT NULL DEFAULT '',
                fromwhitelist TEXT NOT NULL DEFAULT '',
                towhitelist TEXT NOT NULL DEFAULT '',
                blacklist TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SettingsStore for SqliteSettingsStore {
    async fn get_settings(&self, user: &str) -> Result<Option<Settings>> {
        self.policy.check(user)?;

        let row = sqlx::query(
            r"
            SELECT username, workmail, fromwhitelist, towhitelist, blacklist
            FROM user_settings
            WHERE username = ?
            ",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        let settings = row.as_ref().map(row_to_settings).transpose()?;
        debug!(user, found = settings.is_some(), "settings lookup");
        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        self.policy.check(&settings.user)?;

        sqlx::query(
            r"
            INSERT INTO user_settings (username, workmail, fromwhitelist, towhitelist, blacklist)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                workmail = excluded.workmail,
                fromwhitelist = excluded.fromwhitelist,
                towhitelist = excluded.towhitelist,
                blacklist = excluded.blacklist,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(&settings.user)
        .bind(&settings.workmail)
        .bind(join_list(&settings.from_whitelist))
        .bind(join_list(&settings.to_whitelist))
        .bind(join_list(&settings.blacklist))
        .execute(&self.pool)
        .await?;

        debug!(user = %settings.user, "settings saved");
        Ok(())
    }
}

fn row_to_settings(row: &SqliteRow) -> Result<Settings> {
    let from: String = row.try_get("fromwhitelist")?;
    let to: String = row.try_get("towhitelist")?;
    let blacklist: String = row.try_get("blacklist")?;

    Ok(Settings {
        user: row.try_get("username")?,
        workmail: row.try_get("workmail")?,
        from_whitelist: split_list(&from),
        to_whitelist: split_list(&to),
        blacklist: split_list(&blacklist),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;

    fn sample() -> Settings {
        Settings {
            workmail: "bob@work.example".into(),
            from_whitelist: vec!["news@example.org".into()],
            to_whitelist: vec!["alice@example.org".into(), "bcd123@alumni.example".into()],
            blacklist: vec![],
            ..Settings::new("bcd123")
        }
    }

    #[tokio::test]
    async fn test_missing_account_is_none() {
        let store = SqliteSettingsStore::in_memory(AccountNamePolicy::any())
            .await
            .unwrap();
        assert!(store.get_settings("bcd123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = SqliteSettingsStore::in_memory(AccountNamePolicy::any())
            .await
            .unwrap();
        store.save(&sample()).await.unwrap();

        let loaded = store.get_settings("bcd123").await.unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_save_updates_existing_row() {
        let store = SqliteSettingsStore::in_memory(AccountNamePolicy::any())
            .await
            .unwrap();
        let mut settings = sample();
        store.save(&settings).await.unwrap();

        settings.blacklist = vec!["lists.example".into(), String::new()];
        settings.workmail.clear();
        store.save(&settings).await.unwrap();

        let loaded = store.get_settings("bcd123").await.unwrap().unwrap();
        assert_eq!(loaded.blacklist, vec!["lists.example".to_string()]);
        assert!(loaded.workmail.is_empty());
        assert_eq!(loaded.to_whitelist.len(), 2);
    }

    #[tokio::test]
    async fn test_policy_rejects_before_query() {
        let policy = AccountNamePolicy::with_pattern(r"[b-df-hj-np-tv-xz]{3}\d{3}").unwrap();
        let store = SqliteSettingsStore::in_memory(policy).await.unwrap();

        assert!(matches!(
            store.get_settings("alice").await,
            Err(Error::InvalidAccountName(_))
        ));
        assert!(matches!(
            store.save(&Settings::new("alice")).await,
            Err(Error::InvalidAccountName(_))
        ));
    }
}
