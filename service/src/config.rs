use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Local development API origin used when `BEASYBOX_API` is not set.
pub const DEFAULT_BEASYBOX_API: &str = "http://localhost:3000";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Origin of the beasybox API every request and the realtime channel are sent to
    #[arg(short = 'a', long, env = "BEASYBOX_API", default_value = DEFAULT_BEASYBOX_API)]
    beasybox_api: String,

    /// Timeout in milliseconds for a single HTTP request
    #[arg(long, env, default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// How many times a request failing with a transient network error is retried.
    /// Authorization failures are never retried this way.
    #[arg(long, env, default_value_t = 2)]
    pub http_max_retries: u32,

    /// Route the application is sent to when the session can no longer be renewed
    #[arg(long, env, default_value = "/login")]
    login_path: String,

    /// Email used to log in when no session can be restored
    #[arg(short, long, env = "BEASYBOX_EMAIL")]
    email: Option<String>,

    /// Password used together with `--email`
    #[arg(short, long, env = "BEASYBOX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn beasybox_api(&self) -> &str {
        &self.beasybox_api
    }


    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Email and password, when both were provided.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("beasybox").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--beasybox-api", DEFAULT_BEASYBOX_API]);

        assert_eq!(config.beasybox_api(), "http://localhost:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.http_max_retries, 2);
        assert_eq!(config.login_path(), "/login");
    }

    #[test]
    fn test_api_origin_flag() {
        let config = parse(&["-a", "https://api.beasybox.com.br"]);
        assert_eq!(config.beasybox_api(), "https://api.beasybox.com.br");
    }

    #[test]
    fn test_credentials_require_both_values() {
        let config = parse(&["--email", "a@b.com"]);
        assert!(config.credentials().is_none());

        let config = parse(&["--email", "a@b.com", "--password", "x"]);
        assert_eq!(config.credentials(), Some(("a@b.com", "x")));
    }

    #[test]
    fn test_runtime_env_parsing() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));

        let config = parse(&["--runtime-env", "production"]);
        assert!(config.is_production());
    }

    #[test]
    fn test_log_level_parsing() {
        let config = parse(&["--log-level-filter", "DEBUG"]);
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }
}
