//! Postgres connection configuration.
use std::{borrow::Cow, env::var, fmt, time::Duration};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "postgres";

/// Postgres connection config.
///
/// Parsed from a `;` delimited `key=value` connection string:
///
/// ```
/// use postwire::Config;
///
/// let config = Config::parse("Host=db;Port=6543;Username=app;Password=secret;ConnectionTimeout=5").unwrap();
/// assert_eq!(config.get_host(), "db");
/// assert_eq!(config.get_port(), 6543);
/// assert_eq!(config.get_database(), "app");
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) user: String,
    pub(crate) password: String,
    pub(crate) database: Option<String>,
    pub(crate) timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.into(),
            password: String::new(),
            database: None,
            timeout: None,
        }
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `PGHOST`
    /// - `PGPORT`
    /// - `PGUSER`
    /// - `PGPASSWORD`
    /// - `PGDATABASE`
    /// - `PGCONNECT_TIMEOUT`
    ///
    /// Additionally, it also read `POSTWIRE_URL` connection string to provide missing value from
    /// previous variables before fallback to default value.
    pub fn from_env() -> Config {
        let url = var("POSTWIRE_URL").ok().and_then(|e|Config::parse(&e).ok());
        let base = url.unwrap_or_default();

        macro_rules! env {
            ($name:literal,$or:ident) => {
                match var($name) {
                    Ok(ok) => ok,
                    Err(_) => base.$or.clone(),
                }
            };
        }

        let host = env!("PGHOST",host);
        let user = env!("PGUSER",user);
        let password = env!("PGPASSWORD",password);
        let database = var("PGDATABASE").ok().or_else(|| base.database.clone());

        let port = match var("PGPORT") {
            Ok(ok) => ok.trim().parse().unwrap_or(DEFAULT_PORT),
            Err(_) => base.port,
        };

        let timeout = match var("PGCONNECT_TIMEOUT") {
            Ok(ok) => parse_timeout(&ok),
            Err(_) => base.timeout,
        };

        Self { host, port, user, password, database, timeout }
    }

    /// Parse config from connection string.
    ///
    /// Keys are case-insensitive, unknown keys are ignored. Recognized keys are
    /// `host`, `port`, `username`, `password`, `database` and `connectiontimeout` in seconds.
    pub fn parse(url: &str) -> Result<Config, ParseError> {
        let mut config = Config::default();

        for part in url.split(';') {
            if part.trim().is_empty() {
                continue;
            }

            let Some((key, value)) = part.split_once('=') else {
                return Err(ParseError {
                    reason: format!("missing `=` in `{}`", part.trim()).into(),
                });
            };

            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "host" => config.host = value.into(),
                "port" => {
                    let Ok(port) = value.parse() else {
                        return Err(ParseError { reason: "invalid port".into() })
                    };
                    config.port = port;
                },
                "username" => config.user = value.into(),
                "password" => config.password = value.into(),
                "database" => config.database = Some(value.into()),
                "connectiontimeout" => config.timeout = parse_timeout(value),
                _ => {},
            }
        }

        Ok(config)
    }

    /// Server host name.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The database user name to connect as.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Authentication password, the default is empty string.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// The database to connect to. Defaults to the user name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Deadline for connect and the whole handshake, [`None`] to wait indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_user(&self) -> &str {
        &self.user
    }

    pub fn get_password(&self) -> &str {
        &self.password
    }

    /// The database name, defaults to the user name.
    pub fn get_database(&self) -> &str {
        self.database.as_deref().unwrap_or(&self.user)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Non numeric or non positive seconds means no deadline.
fn parse_timeout(value: &str) -> Option<Duration> {
    match value.trim().parse::<i64>() {
        Ok(secs @ 1..) => Some(Duration::from_secs(secs as u64)),
        _ => None,
    }
}

impl std::str::FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.get_database())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Error when parsing connection string.
pub struct ParseError {
    pub(crate) reason: Cow<'static,str>,
}

impl std::error::Error for ParseError { }

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason)
        }
        write!(f, "failed to parse connection string: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_full() {
        let config = Config::parse(
            " Host = db.local ;PORT=6543; username=app;Password=p=ss;Database=main;ConnectionTimeout=5;",
        ).unwrap();
        assert_eq!(config.get_host(), "db.local");
        assert_eq!(config.get_port(), 6543);
        assert_eq!(config.get_user(), "app");
        assert_eq!(config.get_password(), "p=ss");
        assert_eq!(config.get_database(), "main");
        assert_eq!(config.get_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.get_host(), "localhost");
        assert_eq!(config.get_port(), 5432);
        assert_eq!(config.get_user(), "postgres");
        assert_eq!(config.get_password(), "");
        assert_eq!(config.get_database(), "postgres");
        assert_eq!(config.get_timeout(), None);

        let config = Config::parse("username=bob;unknown=1").unwrap();
        assert_eq!(config.get_database(), "bob");
    }

    #[test]
    fn parse_timeout_values() {
        for input in ["connectiontimeout=0", "connectiontimeout=-3", "connectiontimeout=soon"] {
            assert_eq!(Config::parse(input).unwrap().get_timeout(), None, "{input}");
        }
    }

    #[test]
    fn parse_errors() {
        assert!(Config::parse("host").is_err());
        assert!(Config::parse("port=abc").is_err());
        assert!(Config::parse("port=70000").is_err());
        let err = Config::parse("host=a;oops").unwrap_err();
        assert_eq!(format!("{err:#}"), "missing `=` in `oops`");
    }

    #[test]
    fn builder_and_from_str() {
        let config: Config = "host=a".parse().unwrap();
        let config = config.port(1).user("u").password("p").database("d").timeout(Some(Duration::from_secs(1)));
        assert_eq!(config.get_host(), "a");
        assert_eq!(config.get_port(), 1);
        assert_eq!(config.get_database(), "d");
        assert!(!format!("{config:?}").contains("\"p\""));
    }
}
