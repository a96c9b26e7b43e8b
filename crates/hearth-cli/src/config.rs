//! Configuration file management for hearth.
//!
//! Provides a TOML-based config file at `~/.config/hearth/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::authz::CallerContext;
use hearth_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub operator: OperatorSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

/// Identity stamped on every operation issued from this machine.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperatorSection {
    pub user_id: Uuid,
    pub organization_id: Uuid,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the hearth config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/hearth` or `~/.config/hearth`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("hearth");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hearth")
}

/// Return the path to the hearth config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Set permissions to 0600 (owner read/write only) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HearthConfig {
    pub db_config: DbConfig,
    pub ctx: CallerContext,
}

impl HearthConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - DB URL: `cli_db_url` > `HEARTH_DATABASE_URL` env >
    ///   `config_file.database.url` > `DbConfig::DEFAULT_URL`
    /// - Operator identity: `HEARTH_USER_ID`/`HEARTH_ORG_ID` env >
    ///   `config_file.operator` > error
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        // DB URL resolution.
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("HEARTH_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        // Operator identity resolution.
        let env_user = std::env::var("HEARTH_USER_ID").ok();
        let env_org = std::env::var("HEARTH_ORG_ID").ok();
        let ctx = match (env_user, env_org) {
            (Some(user), Some(org)) => {
                let user_id =
                    Uuid::parse_str(&user).context("HEARTH_USER_ID is not a valid UUID")?;
                let organization_id =
                    Uuid::parse_str(&org).context("HEARTH_ORG_ID is not a valid UUID")?;
                CallerContext::new(user_id, organization_id)
            }
            _ => match file_config {
                Some(ref cfg) => {
                    CallerContext::new(cfg.operator.user_id, cfg.operator.organization_id)
                }
                None => bail!(
                    "operator identity not found; set HEARTH_USER_ID and HEARTH_ORG_ID \
                     or run `hearth init` to create a config file"
                ),
            },
        };

        Ok(Self { db_config, ctx })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("hearth");
        let path = dir.join("config.toml");

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            operator: OperatorSection {
                user_id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
            },
        };

        std::fs::create_dir_all(&dir).unwrap();
        let contents = toml::to_string_pretty(&original).unwrap();
        std::fs::write(&path, &contents).unwrap();

        let loaded_contents = std::fs::read_to_string(&path).unwrap();
        let loaded: ConfigFile = toml::from_str(&loaded_contents).unwrap();

        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.operator.user_id, original.operator.user_id);
        assert_eq!(
            loaded.operator.organization_id,
            original.operator.organization_id
        );
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();

        // Even if env var is set, CLI flag wins.
        unsafe { std::env::set_var("HEARTH_DATABASE_URL", "postgresql://env:5432/envdb") };
        unsafe {
            std::env::set_var("HEARTH_USER_ID", "550e8400-e29b-41d4-a716-446655440000")
        };
        unsafe { std::env::set_var("HEARTH_ORG_ID", "550e8400-e29b-41d4-a716-446655440001") };

        let config = HearthConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        unsafe { std::env::remove_var("HEARTH_DATABASE_URL") };
        unsafe { std::env::remove_var("HEARTH_USER_ID") };
        unsafe { std::env::remove_var("HEARTH_ORG_ID") };
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();

        unsafe { std::env::set_var("HEARTH_DATABASE_URL", "postgresql://env:5432/envdb") };
        unsafe {
            std::env::set_var("HEARTH_USER_ID", "550e8400-e29b-41d4-a716-446655440000")
        };
        unsafe { std::env::set_var("HEARTH_ORG_ID", "550e8400-e29b-41d4-a716-446655440001") };

        let config = HearthConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(
            config.ctx.user_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );

        unsafe { std::env::remove_var("HEARTH_DATABASE_URL") };
        unsafe { std::env::remove_var("HEARTH_USER_ID") };
        unsafe { std::env::remove_var("HEARTH_ORG_ID") };
    }

    #[test]
    fn resolve_rejects_invalid_identity_uuid() {
        let _lock = lock_env();

        unsafe { std::env::set_var("HEARTH_USER_ID", "not-a-uuid") };
        unsafe { std::env::set_var("HEARTH_ORG_ID", "550e8400-e29b-41d4-a716-446655440001") };

        let result = HearthConfig::resolve(Some("postgresql://localhost:5432/hearth"));

        unsafe { std::env::remove_var("HEARTH_USER_ID") };
        unsafe { std::env::remove_var("HEARTH_ORG_ID") };

        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("HEARTH_USER_ID"), "unexpected error: {msg}");
    }

    #[test]
    fn resolve_errors_when_no_identity() {
        let _lock = lock_env();

        unsafe { std::env::remove_var("HEARTH_USER_ID") };
        unsafe { std::env::remove_var("HEARTH_ORG_ID") };
        // Point HOME and XDG_CONFIG_HOME to a temp dir so load_config()
        // cannot find a real config file.
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_home = std::env::var("HOME").ok();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("HOME", tmp.path()) };
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };

        let result = HearthConfig::resolve(Some("postgresql://localhost:5432/hearth"));

        // Restore env before asserting, to avoid poisoning the mutex on failure.
        match orig_home {
            Some(h) => unsafe { std::env::set_var("HOME", h) },
            None => unsafe { std::env::remove_var("HOME") },
        }
        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert!(result.is_err(), "should error when no operator identity");
        let msg = result.unwrap_err().to_string();
        assert!(
            msg.contains("operator identity not found"),
            "unexpected error: {msg}"
        );
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("hearth/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
