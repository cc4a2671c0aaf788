//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set via the
//! `-f` flag or `STUDIOCTL_CONFIG`.
//!
//! Sources are merged in order (later wins):
//!
//! 1. YAML config file
//! 2. Environment variables prefixed with `STUDIOCTL_` (double underscore for
//!    nesting, e.g. `STUDIOCTL_BOOKING__CANCEL_CUTOFF_HOURS=24`)
//! 3. `DATABASE_URL` as a special case for `database.url`

use chrono_tz::Tz;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "STUDIOCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Convenience override for `database.url`, populated from DATABASE_URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// IANA timezone the studio operates in. Week boundaries, "today" and
    /// generated session instants are all computed in this zone.
    pub timezone: Tz,
    /// Email address for the initial admin user (created on first startup)
    pub admin_email: String,
    /// Display name for the initial admin user
    pub admin_name: String,
    /// Booking policy knobs
    pub booking: BookingConfig,
    /// Session generation defaults
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the main database
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/studioctl".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

/// Booking policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookingConfig {
    /// Hours before session start after which members can no longer cancel.
    /// Admins bypass the cutoff.
    pub cancel_cutoff_hours: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self { cancel_cutoff_hours: 48 }
    }
}

/// Defaults applied to sessions materialized from the weekly template.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Title given to generated sessions
    pub default_title: String,
    /// Capacity (number of beds) for generated sessions
    pub default_capacity: i32,
    /// Instructor name attached to generated sessions, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_instructor: Option<String>,
    /// Location name attached to generated sessions, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_title: "Reformer Pilates".to_string(),
            default_capacity: 8,
            default_instructor: None,
            default_location: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            timezone: chrono_tz::Europe::Athens,
            admin_email: "admin@studio.local".to_string(),
            admin_name: "Studio Admin".to_string(),
            booking: BookingConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("STUDIOCTL_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.booking.cancel_cutoff_hours < 0 {
            return Err(Error::Internal {
                operation: "Config validation: booking.cancel_cutoff_hours cannot be negative".to_string(),
            });
        }

        if self.generator.default_capacity < 1 {
            return Err(Error::Internal {
                operation: "Config validation: generator.default_capacity must be at least 1".to_string(),
            });
        }

        if self.admin_email.is_empty() || !self.admin_email.contains('@') {
            return Err(Error::Internal {
                operation: format!("Config validation: admin_email {:?} is not a valid email address", self.admin_email),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn default_args() -> Args {
        Args {
            config: "config.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&default_args()).expect("defaults should load");
            assert_eq!(config.port, 3001);
            assert_eq!(config.booking.cancel_cutoff_hours, 48);
            assert_eq!(config.timezone, chrono_tz::Europe::Athens);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 4000
                booking:
                  cancel_cutoff_hours: 24
                "#,
            )?;
            jail.set_env("STUDIOCTL_PORT", "5000");

            let config = Config::load(&default_args()).expect("config should load");
            assert_eq!(config.port, 5000);
            assert_eq!(config.booking.cancel_cutoff_hours, 24);
            Ok(())
        });
    }

    #[test]
    fn test_database_url_env_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://prod-db:5432/studio");

            let config = Config::load(&default_args()).expect("config should load");
            assert_eq!(config.database.url, "postgres://prod-db:5432/studio");
            Ok(())
        });
    }

    #[test]
    fn test_negative_cutoff_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                booking:
                  cancel_cutoff_hours: -1
                "#,
            )?;
            assert!(Config::load(&default_args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "timezone: Mars/Olympus_Mons\n")?;
            assert!(Config::load(&default_args()).is_err());
            Ok(())
        });
    }
}
