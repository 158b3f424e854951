//! Server configuration
//!
//! Read from environment variables:
//! - `OREBOOK_DATA_DIR`: directory holding the CSV tables (default: `data`)
//! - `OREBOOK_PORT` / `PORT`: listen port (default: 8080)
//! - `OREBOOK_BCRYPT_COST`: bcrypt cost factor for new passwords (default: 12, range: 4-31)
//! - `OREBOOK_AUDIT_TAIL_LIMIT`: audit entries shown on the admin overview (default: 200)
//! - `OREBOOK_INVESTOR_YEARS_WINDOW`: years in the investor overview (default: 3)

use orebook_core::analytics::DEFAULT_YEARS_WINDOW;
use orebook_core::{OrebookError, Result};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const DEFAULT_AUDIT_TAIL_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub bcrypt_cost: u32,
    pub audit_tail_limit: usize,
    pub investor_years_window: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            port: DEFAULT_PORT,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            audit_tail_limit: DEFAULT_AUDIT_TAIL_LIMIT,
            investor_years_window: DEFAULT_YEARS_WINDOW,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OrebookError::invalid(format!("{} must be a valid number, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

impl ApiConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = std::env::var("OREBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let port = match env_parse("OREBOOK_PORT")? {
            Some(port) => port,
            None => env_parse("PORT")?.unwrap_or(defaults.port),
        };

        Ok(Self {
            data_dir,
            port,
            bcrypt_cost: env_parse("OREBOOK_BCRYPT_COST")?.unwrap_or(defaults.bcrypt_cost),
            audit_tail_limit: env_parse("OREBOOK_AUDIT_TAIL_LIMIT")?
                .unwrap_or(defaults.audit_tail_limit),
            investor_years_window: env_parse("OREBOOK_INVESTOR_YEARS_WINDOW")?
                .unwrap_or(defaults.investor_years_window),
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(OrebookError::invalid(format!(
                "OREBOOK_BCRYPT_COST must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        if self.audit_tail_limit == 0 {
            return Err(OrebookError::invalid(
                "OREBOOK_AUDIT_TAIL_LIMIT must be at least 1",
            ));
        }
        if self.investor_years_window == 0 {
            return Err(OrebookError::invalid(
                "OREBOOK_INVESTOR_YEARS_WINDOW must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.audit_tail_limit, 200);
        assert_eq!(config.investor_years_window, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bcrypt_cost_range() {
        let config = ApiConfig {
            bcrypt_cost: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            bcrypt_cost: 32,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            bcrypt_cost: 4,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let config = ApiConfig {
            audit_tail_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            investor_years_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
