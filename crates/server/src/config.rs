use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use server_api::SiteSettings;
use tracing::warn;

use crate::session::SessionConfig;

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub news_count_on_home_page: u32,
    pub banned_words: Vec<String>,
    pub comment_warning: String,
    pub slug_warning: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        let site = SiteSettings::default();
        Self {
            server_bind: "127.0.0.1:8000".into(),
            database_url: "sqlite://./data/site.db".into(),
            news_count_on_home_page: site.news_count_on_home_page,
            banned_words: site.banned_words,
            comment_warning: site.comment_warning,
            slug_warning: site.slug_warning,
            session_secret: "dev-session-secret".into(),
            session_ttl_seconds: 14 * 24 * 3600,
        }
    }
}

impl Settings {
    pub fn site(&self) -> SiteSettings {
        SiteSettings {
            news_count_on_home_page: self.news_count_on_home_page,
            banned_words: self.banned_words.clone(),
            comment_warning: self.comment_warning.clone(),
            slug_warning: self.slug_warning.clone(),
        }
    }

    pub fn sessions(&self) -> SessionConfig {
        SessionConfig {
            secret: self.session_secret.clone(),
            ttl_seconds: self.session_ttl_seconds,
        }
    }
}

/// Keys accepted in `server.toml`; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    news_count_on_home_page: Option<u32>,
    banned_words: Option<Vec<String>>,
    comment_warning: Option<String>,
    slug_warning: Option<String>,
    session_secret: Option<String>,
    session_ttl_seconds: Option<i64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        let file_cfg: FileSettings =
            toml::from_str(&raw).context("failed to parse server.toml")?;
        apply_file_settings(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.news_count_on_home_page {
        settings.news_count_on_home_page = v;
    }
    if let Some(v) = file_cfg.banned_words {
        settings.banned_words = v;
    }
    if let Some(v) = file_cfg.comment_warning {
        settings.comment_warning = v;
    }
    if let Some(v) = file_cfg.slug_warning {
        settings.slug_warning = v;
    }
    if let Some(v) = file_cfg.session_secret {
        settings.session_secret = v;
    }
    if let Some(v) = file_cfg.session_ttl_seconds {
        match positive_ttl(v) {
            Some(ttl) => settings.session_ttl_seconds = ttl,
            None => warn!(value = v, "ignoring non-positive session_ttl_seconds"),
        }
    }
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__NEWS_COUNT_ON_HOME_PAGE") {
        match v.parse::<u32>() {
            Ok(parsed) => settings.news_count_on_home_page = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__NEWS_COUNT_ON_HOME_PAGE"),
        }
    }

    if let Some(v) = env("APP__BANNED_WORDS") {
        settings.banned_words = v
            .split(',')
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(v) = env("APP__SESSION_SECRET") {
        settings.session_secret = v;
    }
    if let Some(v) = env("APP__SESSION_TTL_SECONDS") {
        match v.parse::<i64>().ok().and_then(positive_ttl) {
            Some(ttl) => settings.session_ttl_seconds = ttl,
            None => warn!(value = %v, "ignoring invalid APP__SESSION_TTL_SECONDS"),
        }
    }
}

/// Sessions must outlive the request that opens them.
fn positive_ttl(seconds: i64) -> Option<i64> {
    (seconds > 0).then_some(seconds)
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
