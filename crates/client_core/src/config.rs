use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "planner.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            access_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        parse_base_url(&self.api_base_url)
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_with(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// File values first, then environment overrides; later keys win.
pub fn load_settings_with(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("api_url").and_then(toml::Value::as_str) {
                settings.api_base_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("access_token").and_then(toml::Value::as_str) {
                settings.access_token = Some(v.to_string());
            }
            if let Some(v) = file_cfg
                .get("request_timeout_secs")
                .and_then(toml::Value::as_integer)
                .and_then(|v| u64::try_from(v).ok())
            {
                settings.request_timeout_secs = v;
            }
        }
    }

    if let Some(v) = env("PLANNER_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("PLANNER_TOKEN") {
        settings.access_token = Some(v);
    }
    if let Some(v) = env("APP__ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    settings.access_token = settings
        .access_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    settings
}

pub fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("api base url is empty");
    }
    // A trailing slash keeps `Url::join` from dropping the last path segment.
    let url = Url::parse(&format!("{trimmed}/"))
        .with_context(|| format!("invalid api base url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api base url '{raw}' must use http or https");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = load_settings_with(Path::new("/nonexistent/planner.toml"), no_env);
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("planner_settings_{suffix}.toml"));
        fs::write(
            &path,
            concat!(
                "api_url = \"https://file.example/api\"\n",
                "access_token = \"from-file\"\n",
                "request_timeout_secs = 5\n",
            ),
        )
        .expect("write settings");

        let settings = load_settings_with(&path, |key| match key {
            "APP__API_URL" => Some("https://env.example/api".to_string()),
            _ => None,
        });
        fs::remove_file(&path).expect("cleanup");

        assert_eq!(settings.api_base_url, "https://env.example/api");
        assert_eq!(settings.access_token.as_deref(), Some("from-file"));
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let settings = load_settings_with(Path::new("/nonexistent"), |key| {
            (key == "PLANNER_TOKEN").then(|| "   ".to_string())
        });
        assert_eq!(settings.access_token, None);
    }

    #[test]
    fn base_url_keeps_path_prefix_for_joins() {
        let url = parse_base_url("http://localhost:8080/api///").expect("parse");
        assert_eq!(url.as_str(), "http://localhost:8080/api/");
        assert_eq!(
            url.join("boards/b1/tasks").expect("join").as_str(),
            "http://localhost:8080/api/boards/b1/tasks"
        );
        assert!(parse_base_url("ftp://example.org").is_err());
        assert!(parse_base_url("  ").is_err());
    }
}
