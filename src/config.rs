use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Stripe width: total number of block directories, parity included.
    pub num_disks: usize,
    /// Root directory the block directories are created under.
    pub upload_path: PathBuf,
    /// Block directory name prefix; block `i` lives at `<prefix>-<i>`.
    pub folder_prefix: String,
    /// Per-file size cap; accepts KB/MB/GB suffixes.
    pub max_size: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            num_disks: 3,
            upload_path: PathBuf::from("./uploads"),
            folder_prefix: "block".to_string(),
            max_size: "16MB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info,stripebox=debug".to_string(),
            directory: PathBuf::from("./logs"),
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// Reads `config.toml` from the working directory when present, falling
    /// back to defaults, then lets the environment override the individual
    /// storage and server settings (`NUM_DISKS`, `UPLOAD_PATH`,
    /// `FOLDER_PREFIX`, `MAX_SIZE`, `PORT`).
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Path::new("config.toml");
        let mut config: Config = if config_path.is_file() {
            let config_str = fs::read_to_string(config_path)?;
            toml::from_str(&config_str).map_err(|e| e.to_string())?
        } else {
            Config::default()
        };

        if let Ok(num_disks) = env::var("NUM_DISKS") {
            config.storage.num_disks = num_disks
                .parse()
                .map_err(|e: std::num::ParseIntError| e.to_string())?;
        }
        if let Ok(upload_path) = env::var("UPLOAD_PATH") {
            config.storage.upload_path = PathBuf::from(upload_path);
        }
        if let Ok(folder_prefix) = env::var("FOLDER_PREFIX") {
            config.storage.folder_prefix = folder_prefix;
        }
        if let Ok(max_size) = env::var("MAX_SIZE") {
            config.storage.max_size = max_size;
        }
        if let Ok(port) = env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|e: std::num::ParseIntError| e.to_string())?;
        }

        // A stripe needs at least two data blocks and one parity block.
        if config.storage.num_disks < 3 {
            return Err("NUM_DISKS must be at least 3".into());
        }
        config.storage.max_size_bytes()?;

        Ok(config)
    }
}

impl StorageConfig {
    /// Resolves the configured size cap to a byte count.
    pub fn max_size_bytes(&self) -> Result<usize, Box<dyn std::error::Error>> {
        parse_size(&self.max_size)
    }
}

/// Parses a data size string into a byte count.
/// Supports GB, MB and KB suffixes; a bare number is taken as bytes.
pub fn parse_size(size_str: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let size_str = size_str.trim().to_uppercase();
    if let Some(stripped) = size_str.strip_suffix("GB") {
        let num: f64 = stripped
            .trim()
            .parse()
            .map_err(|e: std::num::ParseFloatError| e.to_string())?;
        Ok((num * 1_000_000_000.0) as usize)
    } else if let Some(stripped) = size_str.strip_suffix("MB") {
        let num: f64 = stripped
            .trim()
            .parse()
            .map_err(|e: std::num::ParseFloatError| e.to_string())?;
        Ok((num * 1_000_000.0) as usize)
    } else if let Some(stripped) = size_str.strip_suffix("KB") {
        let num: f64 = stripped
            .trim()
            .parse()
            .map_err(|e: std::num::ParseFloatError| e.to_string())?;
        Ok((num * 1_000.0) as usize)
    } else {
        Ok(size_str
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// checking to see if size strings resolve to the byte values we expect
    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_size("500MB").unwrap(), 500_000_000);
        assert_eq!(parse_size("64kb").unwrap(), 64_000);
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_default_config_is_usable() {
        let config = Config::default();
        assert_eq!(config.storage.num_disks, 3);
        assert_eq!(config.storage.max_size_bytes().unwrap(), 16_000_000);
        assert_eq!(config.server.port, 8000);
    }
}
