//! # breachlog Binary
//!
//! The entry point that assembles the backend from the adapters
//! selected at compile time, bootstraps the blog when it is not
//! installed yet, and logs a listing as a smoke check.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bl_core::models::{BlogSettingsInput, NewUser};
use bl_core::traits::{Collection, UserStore};
use bl_repo::{post::DEFAULT_TAG_LIMIT, PostRepository, SettingsService};

// Feature-gated imports: the binary is compiled to order.
#[cfg(feature = "store-memory")]
use bl_store_memory::MemoryCollection;

#[cfg(feature = "users-simple")]
use bl_users_simple::SimpleUserStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Collections from the selected store implementation.
    #[cfg(feature = "store-memory")]
    let (posts, users, settings): (Arc<dyn Collection>, Arc<dyn Collection>, Arc<dyn Collection>) = (
        Arc::new(MemoryCollection::new()),
        Arc::new(MemoryCollection::new()),
        Arc::new(MemoryCollection::new()),
    );

    // 2. User store implementation.
    #[cfg(feature = "users-simple")]
    let user_store: Arc<dyn UserStore> = Arc::new(SimpleUserStore::new(Arc::clone(&users)));

    // 3. Service layer over the injected handles.
    let service = SettingsService::new(
        Arc::clone(&settings),
        Arc::clone(&users),
        Arc::clone(&posts),
        user_store,
    );

    // 4. Bootstrap on first run.
    if !service.is_installed().await? {
        tracing::info!("no users found, running install");
        let blog = BlogSettingsInput {
            per_page: env_or("BREACHLOG_PER_PAGE", "15"),
            use_search: env_or("BREACHLOG_USE_SEARCH", "false")
                .parse()
                .unwrap_or(false),
            title: env_or("BREACHLOG_TITLE", "Breachlog"),
            description: env_or("BREACHLOG_DESCRIPTION", ""),
        };
        let admin = NewUser {
            login: env_or("BREACHLOG_ADMIN_LOGIN", "admin"),
            email: std::env::var("BREACHLOG_ADMIN_EMAIL").ok(),
            password: env_or("BREACHLOG_ADMIN_PASSWORD", "tochange"),
        };
        service.install(blog, admin).await?;
    }

    let config = service.get_config().await?;
    tracing::info!(
        title = %config.title,
        per_page = config.per_page,
        use_search = config.use_search,
        "blog configured"
    );

    // 5. Smoke check: first page and top tags.
    let repo = PostRepository::new(Arc::clone(&posts));
    let page = repo.list(config.per_page, 0, None, None).await?;
    for post in &page {
        tracing::info!(permalink = %post.permalink, title = %post.title, "post");
    }
    for tag in repo.top_tags(DEFAULT_TAG_LIMIT).await? {
        tracing::info!(tag = %tag.tag, count = tag.count, "tag");
    }

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
