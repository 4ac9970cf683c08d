use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

use vitacheck_core::categorize::CATEGORIZE_URL;
use vitacheck_core::gateway::Permission;
use vitacheck_core::scheduler::HostCapability;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub capability: HostCapability,
    pub notifications: Permission,
    pub categorize_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from `var`, which looks up `VITACHECK_*` overrides.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match var("VITACHECK_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "vitacheck")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let capability = match var("VITACHECK_CAPABILITY") {
            Some(raw) => raw.parse()?,
            None => HostCapability::default(),
        };

        let notifications = match var("VITACHECK_NOTIFICATIONS").as_deref().map(str::trim) {
            None | Some("granted") => Permission::Granted,
            Some("denied") => Permission::Denied,
            Some(other) => {
                bail!("Invalid VITACHECK_NOTIFICATIONS '{other}'. Use 'granted' or 'denied'")
            }
        };

        let categorize_url = var("VITACHECK_CATEGORIZE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| CATEGORIZE_URL.to_string());

        Ok(Config {
            db_path: data_dir.join("vitacheck.db"),
            data_dir,
            capability,
            notifications,
            categorize_url,
        })
    }
}
