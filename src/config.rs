// Configuration module: produces the connection settings from exactly one
// of two sources, a local `dmx.cfg` file or a remote DMX installation's
// `config.properties`. Whichever source is selected fully determines the
// result; nothing is merged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

const CONFIG_FILE_NAME: &str = "dmx.cfg";
const HTTP_PORT_KEY: &str = "org.osgi.service.http.port";
const ADMIN_PASSWORD_KEY: &str = "dmx.security.initial_admin_password";

/// Connection settings and credentials for one DMX server. Built once at
/// startup and handed to `ApiClient`; the only mutation after that is the
/// explicit `--login` credentials override, applied before any request.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub port: u16,
    pub authname: String,
    pub password: String,
    /// Default workspace name used for writes that don't name one.
    pub workspace: String,
}

impl Config {
    /// Loads `dmx.cfg` from the current directory, falling back to
    /// `~/.dmx.cfg`. A missing file is a fatal error.
    pub fn load_local() -> Result<Self> {
        let cwd_path = PathBuf::from(CONFIG_FILE_NAME);
        if cwd_path.is_file() {
            return Self::from_file(&cwd_path);
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let fallback = home.join(".dmx.cfg");
        if fallback.is_file() {
            return Self::from_file(&fallback);
        }
        bail!(
            "config file {CONFIG_FILE_NAME} not found (looked in the current directory and {})",
            fallback.display()
        );
    }

    /// Parses a two-section config file:
    ///
    /// ```text
    /// [Credentials]
    /// authname = admin
    /// password = secret
    ///
    /// [Connection]
    /// server = localhost
    /// port = 8080
    /// workspace = DMX
    /// ```
    ///
    /// All five keys are mandatory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let entries = parse_sections(&text);
        let get = |section: &str, key: &str| -> Result<String> {
            entries
                .get(&format!("{section}.{key}"))
                .cloned()
                .with_context(|| format!("missing '{key}' in [{section}] of {}", path.display()))
        };
        let port_raw = get("connection", "port")?;
        Ok(Config {
            authname: get("credentials", "authname")?,
            password: get("credentials", "password")?,
            server: get("connection", "server")?,
            port: port_raw
                .parse()
                .with_context(|| format!("invalid port '{port_raw}' in {}", path.display()))?,
            workspace: get("connection", "workspace")?,
        })
    }

    /// Reads a DMX installation's `config.properties` and synthesizes the
    /// admin configuration from it: authname `admin`, server `localhost`,
    /// workspace `DMX`, port and password from the properties. Either
    /// required key missing is a fatal error.
    pub fn from_properties(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config properties {}", path.display()))?;
        let mut params: HashMap<String, String> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            // Properties lines are `key = value`; spaces are not
            // significant on either side of the separator.
            let flat: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            match flat.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_lowercase(), value.to_string());
                }
                None => info!("no value found for '{line}' in {}", path.display()),
            }
        }
        let port_raw = params
            .get(HTTP_PORT_KEY)
            .with_context(|| format!("missing '{HTTP_PORT_KEY}' in {}", path.display()))?;
        let password = params
            .get(ADMIN_PASSWORD_KEY)
            .with_context(|| format!("missing '{ADMIN_PASSWORD_KEY}' in {}", path.display()))?;
        Ok(Config {
            server: "localhost".into(),
            port: port_raw
                .parse()
                .with_context(|| format!("invalid port '{port_raw}' in {}", path.display()))?,
            authname: "admin".into(),
            password: password.clone(),
            workspace: "DMX".into(),
        })
    }

    /// Replaces the login credentials (the `--login` override).
    pub fn set_credentials(&mut self, authname: String, password: String) {
        self.authname = authname;
        self.password = password;
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.server, self.port)
    }
}

/// Flattens an INI-style file into `section.key` entries. Section names
/// and keys are lowercased; blank lines and `#`/`;` comments are skipped.
fn parse_sections(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    let mut section = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_lowercase();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(
                format!("{section}.{}", key.trim().to_lowercase()),
                value.trim().to_string(),
            );
        }
    }
    entries
}
