//! # SettingsService
//!
//! Blog-wide configuration plus the install bootstrap. Install touches
//! three collections and an external user store; each step that
//! succeeds registers a compensating undo, and any step failure runs
//! the registered undos in reverse order. Best effort only: there are
//! no real transactions behind this.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;

use bl_core::error::{AppError, InstallFailure, Result};
use bl_core::models::{BlogSettingsInput, NewUser, RawPostInput, Settings, SettingsPatch};
use bl_core::traits::{Collection, Filter, IndexSpec, SortOrder, UserStore};

use crate::post::PostRepository;
use crate::sanitize;

const SEED_DESCRIPTION: &str = "Lorem ipsum dolor sit amet, consectetur adipisicing elit, \
sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, \
quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute \
irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. \
Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit \
anim id est laborum.";

pub struct SettingsService {
    settings: Arc<dyn Collection>,
    users: Arc<dyn Collection>,
    posts: Arc<dyn Collection>,
    post_repo: PostRepository,
    user_store: Arc<dyn UserStore>,
    /// Cached outcome of the last `is_installed` probe, scoped to this
    /// service instance.
    installed: RwLock<Option<bool>>,
}

impl SettingsService {
    pub fn new(
        settings: Arc<dyn Collection>,
        users: Arc<dyn Collection>,
        posts: Arc<dyn Collection>,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            settings,
            users,
            post_repo: PostRepository::new(Arc::clone(&posts)),
            posts,
            user_store,
            installed: RwLock::new(None),
        }
    }

    /// Current configuration: defaults merged with whatever the stored
    /// singleton document carries.
    pub async fn get_config(&self) -> Result<Settings> {
        let mut config = Settings::default();
        let doc = self
            .settings
            .find_one(Filter::All)
            .await
            .map_err(|e| fault("get_config", e, || AppError::Internal("System error..".to_string())))?;

        if let Some(doc) = doc {
            if let Some(v) = doc.get("per_page").and_then(Value::as_u64) {
                config.per_page = v;
            }
            if let Some(v) = doc.get("use_search").and_then(Value::as_bool) {
                config.use_search = v;
            }
            if let Some(v) = doc.get("title").and_then(Value::as_str) {
                config.title = v.to_string();
            }
            if let Some(v) = doc.get("description").and_then(Value::as_str) {
                config.description = v.to_string();
            }
        }
        Ok(config)
    }

    /// Heuristic install probe: a non-empty users collection means the
    /// blog is installed. The outcome is cached on this instance.
    pub async fn is_installed(&self) -> Result<bool> {
        let installed = self
            .users
            .count(Filter::All)
            .await
            .map_err(|e| fault("is_installed", e, || AppError::Internal("System error..".to_string())))?
            > 0;
        *self.installed.write().await = Some(installed);
        Ok(installed)
    }

    /// Last cached probe outcome, if any probe ran on this instance.
    pub async fn installed_hint(&self) -> Option<bool> {
        *self.installed.read().await
    }

    /// Index bootstrap. Idempotent, safe to repeat.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let result: anyhow::Result<()> = async {
            self.posts
                .ensure_index(IndexSpec::new([("date", SortOrder::Desc)]))
                .await?;
            self.posts
                .ensure_index(IndexSpec::new([
                    ("tags", SortOrder::Asc),
                    ("date", SortOrder::Desc),
                ]))
                .await?;
            self.posts
                .ensure_index(IndexSpec::new([("permalink", SortOrder::Asc)]))
                .await?;
            self.posts
                .ensure_index(IndexSpec::new([
                    ("query", SortOrder::Asc),
                    ("orderby", SortOrder::Asc),
                ]))
                .await?;
            self.users
                .ensure_index(IndexSpec::new([("date", SortOrder::Asc)]))
                .await?;
            Ok(())
        }
        .await;
        result.map_err(|e| fault("ensure_indexes", e, || AppError::Internal("Installation error..".to_string())))
    }

    /// Bootstraps the blog: indexes, the admin user, a seed post, and
    /// the settings singleton. All three persisting steps are
    /// attempted, their error slots aggregated, and on any failure the
    /// undos registered by the successful steps run in reverse order.
    pub async fn install(&self, blog: BlogSettingsInput, user: NewUser) -> Result<()> {
        tracing::info!("installing blog");
        self.ensure_indexes().await?;

        let mut failure = InstallFailure::default();
        let mut undo = CompensationLog::default();

        // 1. Admin user.
        let author = match self.user_store.save(user).await {
            Ok(id) => {
                undo.register("users", &self.users);
                Some(id)
            }
            Err(e) => {
                tracing::debug!(error = %e, "install: user step failed");
                failure.user = Some("Adding user error..".to_string());
                None
            }
        };

        // 2. Seed post, authored by the user created above. Skipped
        //    without an author; the user slot already records why.
        if let Some(author) = author {
            match sanitize::sanitize(seed_post(author)) {
                Ok(post) => match self.post_repo.create(post).await {
                    Ok(_) => undo.register("posts", &self.posts),
                    Err(e) => failure.post = Some(e.to_string()),
                },
                Err(e) => failure.post = Some(e.to_string()),
            }
        }

        // 3. Settings singleton, guarded by the per-page validation.
        match blog.per_page.trim().parse::<u64>() {
            Ok(per_page) if per_page > 0 => {
                let doc = json!({
                    "per_page": per_page,
                    "use_search": blog.use_search,
                    "title": blog.title,
                    "description": blog.description,
                });
                // Shape checked right above; the object is guaranteed.
                let doc = doc.as_object().cloned().unwrap_or_default();
                match self.settings.insert(doc).await {
                    Ok(_) => undo.register("settings", &self.settings),
                    Err(e) => {
                        tracing::debug!(error = %e, "install: settings step failed");
                        failure.settings = Some("Adding settings error..".to_string());
                    }
                }
            }
            _ => {
                failure.settings =
                    Some("\"Per page\" field needs to be a positive integer..".to_string());
            }
        }

        if failure.is_failure() {
            undo.run().await;
            *self.installed.write().await = Some(false);
            return Err(AppError::Install(failure));
        }

        *self.installed.write().await = Some(true);
        tracing::info!("install complete");
        Ok(())
    }

    /// Merge-updates the settings singleton. Install must precede
    /// update: a missing settings document is an error.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<bool> {
        let existing = self
            .settings
            .find_one(Filter::All)
            .await
            .map_err(|e| fault("update_settings", e, || AppError::Update("Settings update error..".to_string())))?
            .ok_or_else(|| AppError::Update("Settings update error..".to_string()))?;

        let id = existing.get("_id").cloned().unwrap_or(Value::Null);
        let doc = match serde_json::to_value(&patch) {
            Ok(Value::Object(doc)) => doc,
            _ => return Err(AppError::Update("Settings update error..".to_string())),
        };

        self.settings
            .update(Filter::Eq("_id".to_string(), id), doc, false)
            .await
            .map_err(|e| fault("update_settings", e, || AppError::Update("Settings update error..".to_string())))?;
        Ok(true)
    }
}

/// Undo actions registered by successful install steps, executed in
/// reverse registration order. A failing undo is logged and skipped;
/// the remaining undos still run.
#[derive(Default)]
struct CompensationLog {
    undos: Vec<(&'static str, Arc<dyn Collection>)>,
}

impl CompensationLog {
    fn register(&mut self, label: &'static str, collection: &Arc<dyn Collection>) {
        self.undos.push((label, Arc::clone(collection)));
    }

    async fn run(self) {
        for (label, collection) in self.undos.into_iter().rev() {
            // Fully qualified: plain method syntax on the `Arc` would
            // resolve to `Drop::drop` and fail to compile.
            match Collection::drop(collection.as_ref()).await {
                Ok(()) => tracing::info!(collection = label, "install rolled back"),
                Err(e) => {
                    tracing::warn!(collection = label, error = %e, "install rollback step failed")
                }
            }
        }
    }
}

/// Placeholder content for the very first post.
fn seed_post(author: uuid::Uuid) -> RawPostInput {
    RawPostInput {
        title: Some("Hello World!".to_string()),
        description: Some(SEED_DESCRIPTION.to_string()),
        infrastructure: Some("Test Blockchain Platform".to_string()),
        categories: Some("Test attack vector".to_string()),
        vulnerability: Some("Test vulnerability".to_string()),
        targets: Some("Test source of attack".to_string()),
        geography: Some("Singapore".to_string()),
        references: Some("https://localhost".to_string()),
        loss_crypto: Some("100 BTC".to_string()),
        loss_fiat: Some("100 USD".to_string()),
        compromised_at: Some("01/01/2018".to_string()),
        reported_at: Some("01/01/2018".to_string()),
        tags: None,
        author: Some(author),
    }
}

/// Logs the real cause on the debug channel and returns the generic
/// user-facing error.
fn fault<E: std::fmt::Display>(op: &'static str, err: E, to: impl FnOnce() -> AppError) -> AppError {
    tracing::debug!(operation = op, error = %err, "settings service fault");
    to()
}
