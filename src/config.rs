//! Configuration for agrosystem
//!
//! CLI arguments and environment variable handling using clap. A `.env`
//! file is loaded before parsing, so every flag can also come from there.

use clap::Parser;
use std::net::SocketAddr;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// agrosystem - crop management REST service
#[derive(Parser, Debug, Clone)]
#[command(name = "agrosystem")]
#[command(about = "Crop, irrigation and supply management over MongoDB")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "AGRO_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "agrosystem")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Enable development mode (falls back to the in-memory store when
    /// MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Skip MongoDB entirely and keep everything in process memory
    #[arg(long, env = "AGRO_IN_MEMORY", default_value = "false")]
    pub in_memory: bool,
}

impl Args {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_db.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        let format = self.log_format.to_ascii_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(format!(
                "LOG_FORMAT must be one of {}, got '{}'",
                LOG_FORMATS.join(", "),
                self.log_format
            ));
        }

        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["agrosystem"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = parse(&[]);
        assert_eq!(args.listen.port(), 8080);
        assert_eq!(args.mongodb_db, "agrosystem");
        assert!(!args.json_logs());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(parse(&["--mongodb-db", " "]).validate().is_err());
        assert!(parse(&["--log-format", "xml"]).validate().is_err());
        assert!(parse(&["--log-level", "verbose"]).validate().is_err());
        assert!(parse(&["--log-format", "JSON"]).json_logs());
    }
}
