use crate::notify::{AutoDismiss, NoticePolicy};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the client/proxy configuration inside `config_dir()`.
pub const CONFIG_FILE: &str = "kore.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/kore/`
/// - Linux: `~/.config/kore/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/kore/`
///
/// `KORE_CONFIG_DIR` overrides the location. Falls back to `~/.kore/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KORE_CONFIG_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join("kore"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".kore")
        })
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// Unreadable or corrupt files are logged so they don't silently reset state.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read config");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "corrupt config, using defaults");
            T::default()
        }
    }
}

/// Replace `path` with `config` as pretty JSON.
///
/// The new content goes to a sibling `.<name>.new` file that is created
/// owner-only on Unix (it may hold an API token), flushed to disk and then
/// renamed over `path`, so readers never observe a half-written file.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T) -> Result<(), String> {
    use std::io::Write;

    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(format!("Not a config file path: {}", path.display()));
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Cannot create {}: {e}", dir.display()))?;

    let mut bytes = serde_json::to_vec_pretty(config).map_err(|e| format!("Cannot encode config: {e}"))?;
    bytes.push(b'\n');

    let staged = dir.join(format!(".{}.new", name.to_string_lossy()));
    // A leftover from an interrupted save would keep its old mode.
    let _ = std::fs::remove_file(&staged);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);

    let written = options.open(&staged).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| std::fs::rename(&staged, path)) {
        let _ = std::fs::remove_file(&staged);
        return Err(format!("Cannot save {}: {e}", path.display()));
    }
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Settings of the dispatcher's HTTP transport and notices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service prefix every route is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `Authorization: token <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Backend reasons meaning "nothing to act on"
    #[serde(default = "default_no_content_reasons")]
    pub no_content_reasons: Vec<String>,
    #[serde(default)]
    pub notices: NoticePolicy,
    /// Client-side request timeout. `None` leaves time-bounding to the backend.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8888/kore-extension/".to_string()
}

fn default_no_content_reasons() -> Vec<String> {
    vec!["NoContentFound".to_string(), "NoContentError".to_string()]
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            no_content_reasons: default_no_content_reasons(),
            notices: NoticePolicy::default(),
            request_timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProxyConfig
// ---------------------------------------------------------------------------

/// Settings of the forwarding proxy (`kore proxy`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_host")]
    pub host: String,
    /// 0 = OS-assigned
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    /// Course service URL. Derived from the hub prefix when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Acting user injected into every forwarded request
    #[serde(default)]
    pub user: String,
    /// Hub base URL prefix, e.g. `/hub/`
    #[serde(default = "default_hub_prefix")]
    pub hub_prefix: String,
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    8899
}

fn default_hub_prefix() -> String {
    "/".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_proxy_host(),
            port: default_proxy_port(),
            upstream: None,
            user: String::new(),
            hub_prefix: default_hub_prefix(),
        }
    }
}

impl ProxyConfig {
    /// Course service URL: the configured upstream, or
    /// `http://127.0.0.1:10001/<hub prefix without slashes>/services/kore`.
    pub fn upstream_url(&self) -> String {
        if let Some(upstream) = self.upstream.as_deref()
            && !upstream.is_empty()
        {
            return upstream.trim_end_matches('/').to_string();
        }
        let prefix = self.hub_prefix.replace('/', "");
        if prefix.is_empty() {
            "http://127.0.0.1:10001/services/kore".to_string()
        } else {
            format!("http://127.0.0.1:10001/{prefix}/services/kore")
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_auto_dismiss(key: &str, value: &str) -> Result<AutoDismiss, String> {
    match value {
        "never" => Ok(AutoDismiss::Never),
        ms => ms
            .parse()
            .map(AutoDismiss::AfterMs)
            .map_err(|_| format!("{key}: expected \"never\" or milliseconds, got \"{ms}\"")),
    }
}

// ---------------------------------------------------------------------------
// KoreConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KoreConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl KoreConfig {
    /// Load `kore.json` from `config_dir()` and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env();
        config
    }

    /// Load `kore.json` as stored, without environment overrides. Used when editing the file.
    pub fn load_file() -> Self {
        load_json_config(&config_dir().join(CONFIG_FILE))
    }

    pub fn save(&self) -> Result<(), String> {
        save_json_config(&config_dir().join(CONFIG_FILE), self)
    }

    /// Keys accepted by `set`.
    pub const KEYS: [&'static str; 12] = [
        "client.base_url",
        "client.token",
        "client.no_content_reasons",
        "client.request_timeout_secs",
        "client.notices.success",
        "client.notices.info",
        "client.notices.error",
        "proxy.host",
        "proxy.port",
        "proxy.upstream",
        "proxy.user",
        "proxy.hub_prefix",
    ];

    /// Set one value from its command-line form.
    ///
    /// Lists are comma-separated, auto-dismiss is `never` or milliseconds,
    /// and an empty value clears optional fields.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "client.base_url" => self.client.base_url = value.to_string(),
            "client.token" => self.client.token = optional(),
            "client.no_content_reasons" => {
                self.client.no_content_reasons = value
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "client.request_timeout_secs" => {
                self.client.request_timeout_secs = match value {
                    "" | "none" => None,
                    secs => Some(secs.parse().map_err(|_| format!("{key}: expected seconds, got \"{secs}\""))?),
                };
            }
            "client.notices.success" => self.client.notices.success = parse_auto_dismiss(key, value)?,
            "client.notices.info" => self.client.notices.info = parse_auto_dismiss(key, value)?,
            "client.notices.error" => self.client.notices.error = parse_auto_dismiss(key, value)?,
            "proxy.host" => self.proxy.host = value.to_string(),
            "proxy.port" => {
                self.proxy.port = value
                    .parse()
                    .map_err(|_| format!("{key}: expected a port number, got \"{value}\""))?;
            }
            "proxy.upstream" => self.proxy.upstream = optional(),
            "proxy.user" => self.proxy.user = value.to_string(),
            "proxy.hub_prefix" => self.proxy.hub_prefix = value.to_string(),
            _ => return Err(format!("Unknown key \"{key}\". Known keys: {}", Self::KEYS.join(", "))),
        }
        Ok(())
    }

    /// Copy safe to print: the API token is masked.
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if shown.client.token.is_some() {
            shown.client.token = Some("********".to_string());
        }
        shown
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Apply overrides from a variable lookup:
    /// `KORE_BASE_URL`, `JUPYTERHUB_API_TOKEN`, `JUPYTERHUB_BASE_URL`,
    /// `KORE_UPSTREAM`, `KORE_USER` then `JUPYTERHUB_USER`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("KORE_BASE_URL") {
            self.client.base_url = url;
        }
        if let Some(token) = lookup("JUPYTERHUB_API_TOKEN") {
            self.client.token = Some(token);
        }
        if let Some(prefix) = lookup("JUPYTERHUB_BASE_URL") {
            self.proxy.hub_prefix = prefix;
        }
        if let Some(upstream) = lookup("KORE_UPSTREAM") {
            self.proxy.upstream = Some(upstream);
        }
        if let Some(user) = lookup("KORE_USER").or_else(|| lookup("JUPYTERHUB_USER")) {
            self.proxy.user = user;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_backend_contract() {
        let cfg = KoreConfig::default();
        assert_eq!(cfg.client.no_content_reasons, vec!["NoContentFound", "NoContentError"]);
        assert_eq!(cfg.client.request_timeout_secs, None);
        assert_eq!(cfg.client.notices.error, AutoDismiss::Never);
        assert_eq!(cfg.proxy.hub_prefix, "/");
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut cfg = KoreConfig::default();
        cfg.client.base_url = "https://hub.example.org/user/ta/kore-extension/".into();
        cfg.client.token = Some("secret".into());
        cfg.client.notices.success = AutoDismiss::AfterMs(4000);
        cfg.proxy.user = "ta".into();

        save_json_config(&path, &cfg).unwrap();
        let loaded: KoreConfig = load_json_config(&path);
        assert_eq!(loaded, cfg);
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        save_json_config(&path, &KoreConfig::default()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_replaces_existing_file_and_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{\"client\": {\"base_url\": \"http://old/\"}}").unwrap();

        let mut cfg = KoreConfig::default();
        cfg.proxy.port = 9100;
        save_json_config(&path, &cfg).unwrap();

        let loaded: KoreConfig = load_json_config(&path);
        assert_eq!(loaded.proxy.port, 9100);
        assert_eq!(loaded.client.base_url, default_base_url());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![CONFIG_FILE.to_string()]);
    }

    #[test]
    fn set_edits_known_keys() {
        let mut cfg = KoreConfig::default();
        cfg.set("client.token", "abc").unwrap();
        cfg.set("client.no_content_reasons", "NoContentFound, Empty ,").unwrap();
        cfg.set("client.request_timeout_secs", "30").unwrap();
        cfg.set("client.notices.success", "4000").unwrap();
        cfg.set("proxy.port", "0").unwrap();
        cfg.set("proxy.upstream", "http://kore:9000/services/kore").unwrap();

        assert_eq!(cfg.client.token.as_deref(), Some("abc"));
        assert_eq!(cfg.client.no_content_reasons, vec!["NoContentFound", "Empty"]);
        assert_eq!(cfg.client.request_timeout_secs, Some(30));
        assert_eq!(cfg.client.notices.success, AutoDismiss::AfterMs(4000));
        assert_eq!(cfg.proxy.port, 0);

        cfg.set("client.token", "").unwrap();
        cfg.set("client.request_timeout_secs", "none").unwrap();
        cfg.set("client.notices.success", "never").unwrap();
        assert_eq!(cfg.client.token, None);
        assert_eq!(cfg.client.request_timeout_secs, None);
        assert_eq!(cfg.client.notices.success, AutoDismiss::Never);
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut cfg = KoreConfig::default();
        assert!(cfg.set("client.colour", "red").unwrap_err().contains("Unknown key"));
        assert!(cfg.set("proxy.port", "99999").is_err());
        assert!(cfg.set("client.notices.error", "soon").is_err());
        assert_eq!(cfg, KoreConfig::default());
    }

    #[test]
    fn redacted_masks_token_only() {
        let mut cfg = KoreConfig::default();
        assert_eq!(cfg.redacted(), cfg);
        cfg.client.token = Some("secret".into());
        let shown = cfg.redacted();
        assert_eq!(shown.client.token.as_deref(), Some("********"));
        assert_eq!(shown.client.base_url, cfg.client.base_url);
    }

    #[test]
    #[serial]
    fn edited_file_survives_reload_without_env() {
        let dir = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("KORE_CONFIG_DIR", dir.path());
            std::env::set_var("KORE_USER", "env-user");
        }

        let mut cfg = KoreConfig::load_file();
        cfg.set("proxy.user", "file-user").unwrap();
        cfg.save().unwrap();
        let stored = KoreConfig::load_file();
        let effective = KoreConfig::load();

        unsafe {
            std::env::remove_var("KORE_CONFIG_DIR");
            std::env::remove_var("KORE_USER");
        }
        assert_eq!(stored.proxy.user, "file-user");
        assert_eq!(effective.proxy.user, "env-user");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded: KoreConfig = load_json_config(&dir.path().join("absent.json"));
        assert_eq!(loaded, KoreConfig::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let loaded: KoreConfig = load_json_config(&path);
        assert_eq!(loaded, KoreConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"client": {"no_content_reasons": ["Nothing"]}}"#).unwrap();
        let loaded: KoreConfig = load_json_config(&path);
        assert_eq!(loaded.client.no_content_reasons, vec!["Nothing"]);
        assert_eq!(loaded.client.base_url, default_base_url());
        assert_eq!(loaded.proxy, ProxyConfig::default());
    }

    #[test]
    fn upstream_derived_from_hub_prefix() {
        let mut proxy = ProxyConfig::default();
        assert_eq!(proxy.upstream_url(), "http://127.0.0.1:10001/services/kore");
        proxy.hub_prefix = "/hub/".into();
        assert_eq!(proxy.upstream_url(), "http://127.0.0.1:10001/hub/services/kore");
        proxy.upstream = Some("http://kore.internal:9000/".into());
        assert_eq!(proxy.upstream_url(), "http://kore.internal:9000");
    }

    #[test]
    fn overrides_apply_in_priority_order() {
        let vars: HashMap<&str, &str> = [
            ("KORE_BASE_URL", "http://localhost:9999/kore-extension/"),
            ("JUPYTERHUB_API_TOKEN", "abc"),
            ("JUPYTERHUB_BASE_URL", "/jhub/"),
            ("JUPYTERHUB_USER", "hub-user"),
        ]
        .into_iter()
        .collect();
        let mut cfg = KoreConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.client.base_url, "http://localhost:9999/kore-extension/");
        assert_eq!(cfg.client.token.as_deref(), Some("abc"));
        assert_eq!(cfg.proxy.hub_prefix, "/jhub/");
        assert_eq!(cfg.proxy.user, "hub-user");

        let mut cfg = KoreConfig::default();
        cfg.apply_overrides(|k| match k {
            "KORE_USER" => Some("explicit".into()),
            "JUPYTERHUB_USER" => Some("hub-user".into()),
            _ => None,
        });
        assert_eq!(cfg.proxy.user, "explicit");
    }

    #[test]
    #[serial]
    fn load_reads_config_dir_and_env() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"client": {"base_url": "http://from-file/"}}"#,
        )
        .unwrap();
        unsafe {
            std::env::set_var("KORE_CONFIG_DIR", dir.path());
            std::env::set_var("KORE_USER", "env-user");
            std::env::remove_var("KORE_BASE_URL");
        }

        let cfg = KoreConfig::load();

        unsafe {
            std::env::remove_var("KORE_CONFIG_DIR");
            std::env::remove_var("KORE_USER");
        }
        assert_eq!(cfg.client.base_url, "http://from-file/");
        assert_eq!(cfg.proxy.user, "env-user");
    }
}
