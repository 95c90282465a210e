//! Connection settings for a bitcoind JSON-RPC endpoint.

use std::{
    env, fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use base64::{Engine, engine::general_purpose};

use crate::error::Error;

/// Default RPC host used by [`Config::from_env`].
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default mainnet RPC port used by [`Config::from_env`].
pub const DEFAULT_PORT: u16 = 8332;

/// client authentication methods
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Auth {
    None,
    UserPass(String, String),
    CookieFile(PathBuf),
}

// Passwords never show up in `{:?}` output, including through `Config`.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::UserPass(user, _) => f
                .debug_tuple("UserPass")
                .field(user)
                .field(&"***")
                .finish(),
            Auth::CookieFile(path) => f.debug_tuple("CookieFile").field(path).finish(),
        }
    }
}

impl Auth {
    /// Resolve into a `(user, password)` pair.
    pub fn get_user_pass(&self) -> Result<(Option<String>, Option<String>), Error> {
        match self {
            Auth::None => Ok((None, None)),
            Auth::UserPass(u, p) => Ok((Some(u.clone()), Some(p.clone()))),
            Auth::CookieFile(path) => {
                let line = BufReader::new(File::open(path)?)
                    .lines()
                    .next()
                    .ok_or(Error::InvalidCookieFile)??;
                let (user, pass) = parse_cookie(&line)?;
                Ok((Some(user), Some(pass)))
            }
        }
    }

    /// Value of the `Authorization` header sent with every request.
    pub(crate) fn basic_header(&self) -> Result<String, Error> {
        match self.get_user_pass()? {
            (Some(user), Some(pass)) => {
                let token = general_purpose::STANDARD.encode(format!("{user}:{pass}"));
                Ok(format!("Basic {token}"))
            }
            _ => Err(Error::MissingAuthentication),
        }
    }
}

fn parse_cookie(line: &str) -> Result<(String, String), Error> {
    let line = line.trim_end();
    let colon = line.find(':').ok_or(Error::InvalidCookieFile)?;
    Ok((line[..colon].into(), line[colon + 1..].into()))
}

/// Whether the `error` member of a JSON-RPC response is inspected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RpcErrorPolicy {
    /// Only `result` is read; a failed call shows up as an empty value.
    #[default]
    Ignore,
    /// A non-null `error` member fails the call with [`Error::Rpc`].
    Surface,
}

/// Where and how to reach the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// URL path below the host, without the leading slash. Empty targets the
    /// node's default context.
    pub path: String,
    pub auth: Auth,
    /// Per-request timeout. `None` leaves it to the HTTP client.
    pub timeout: Option<Duration>,
    pub rpc_errors: RpcErrorPolicy,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, auth: Auth) -> Self {
        Self {
            host: host.into(),
            port,
            path: String::new(),
            auth,
            timeout: None,
            rpc_errors: RpcErrorPolicy::default(),
        }
    }

    /// Builds a config from `BITCOIN_RPC_*` environment variables.
    ///
    /// `BITCOIN_RPC_COOKIE` takes precedence over `BITCOIN_RPC_USER` and
    /// `BITCOIN_RPC_PASS`. With neither, the resulting [`Auth::None`] is
    /// rejected once a client is built from it.
    pub fn from_env() -> Result<Self, Error> {
        let host = env::var("BITCOIN_RPC_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var("BITCOIN_RPC_PORT") {
            Ok(port) => port.parse().map_err(|e| {
                Error::InvalidArgument(format!("BITCOIN_RPC_PORT `{port}`: {e}"))
            })?,
            Err(_) => DEFAULT_PORT,
        };
        let auth = match (
            env::var_os("BITCOIN_RPC_COOKIE"),
            env::var("BITCOIN_RPC_USER"),
            env::var("BITCOIN_RPC_PASS"),
        ) {
            (Some(cookie), _, _) => Auth::CookieFile(cookie.into()),
            (None, Ok(user), Ok(pass)) => Auth::UserPass(user, pass),
            _ => Auth::None,
        };

        let mut config = Self::new(host, port, auth);
        if let Ok(path) = env::var("BITCOIN_RPC_PATH") {
            config = config.with_path(path);
        }
        Ok(config)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_rpc_errors(mut self, policy: RpcErrorPolicy) -> Self {
        self.rpc_errors = policy;
        self
    }

    /// Endpoint URL: `http://{host}:{port}/{path}`.
    pub fn url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.path)
    }

    /// Copy of this config targeting `wallet/{wallet}`. `self` is left untouched.
    pub fn wallet_scoped(&self, wallet: &str) -> Config {
        Config {
            path: format!("wallet/{wallet}"),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    const ENV_VARS: [&str; 6] = [
        "BITCOIN_RPC_HOST",
        "BITCOIN_RPC_PORT",
        "BITCOIN_RPC_PATH",
        "BITCOIN_RPC_COOKIE",
        "BITCOIN_RPC_USER",
        "BITCOIN_RPC_PASS",
    ];

    // Tests in this binary run on parallel threads; env mutation goes through here.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Runs `f` with exactly `vars` set among the `BITCOIN_RPC_*` variables.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: every reader and writer of these variables in this test
        // binary holds `ENV_LOCK`.
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
            for (name, value) in vars {
                env::set_var(name, value);
            }
        }
        let result = f();
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
        result
    }

    fn user_pass() -> Auth {
        Auth::UserPass("bitcoin".to_string(), "secret".to_string())
    }

    #[test]
    fn url_with_empty_path_ends_in_slash() {
        let config = Config::new("127.0.0.1", 18443, user_pass());
        assert_eq!(config.url(), "http://127.0.0.1:18443/");
    }

    #[test]
    fn wallet_scoped_leaves_original_untouched() {
        let config = Config::new("node", 8332, user_pass()).with_path("custom");
        let scoped = config.wallet_scoped("hot");

        assert_eq!(scoped.url(), "http://node:8332/wallet/hot");
        assert_eq!(config.url(), "http://node:8332/custom");
        assert_eq!(scoped.auth, config.auth);
    }

    #[test]
    fn basic_header_encodes_user_and_password() {
        // base64("bitcoin:secret")
        assert_eq!(
            user_pass().basic_header().unwrap(),
            "Basic Yml0Y29pbjpzZWNyZXQ="
        );
    }

    #[test]
    fn basic_header_requires_credentials() {
        assert!(matches!(
            Auth::None.basic_header(),
            Err(Error::MissingAuthentication)
        ));
    }

    #[test]
    fn cookie_file_is_split_at_first_colon() {
        let path =
            env::temp_dir().join(format!("bitcoind-rpc-light-{}.cookie", std::process::id()));
        let mut file = File::create(&path).unwrap();
        writeln!(file, "__cookie__:a:b").unwrap();

        let (user, pass) = Auth::CookieFile(path.clone()).get_user_pass().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(user.as_deref(), Some("__cookie__"));
        assert_eq!(pass.as_deref(), Some("a:b"));
    }

    #[test]
    fn cookie_without_colon_is_rejected() {
        assert!(matches!(parse_cookie("garbage"), Err(Error::InvalidCookieFile)));
    }

    #[test]
    fn from_env_defaults_without_credentials() {
        let config = with_env(&[], Config::from_env).unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.path, "");
        assert_eq!(config.auth, Auth::None);
    }

    #[test]
    fn from_env_prefers_cookie_over_user_pass() {
        let config = with_env(
            &[
                ("BITCOIN_RPC_COOKIE", "/var/lib/bitcoind/.cookie"),
                ("BITCOIN_RPC_USER", "bitcoin"),
                ("BITCOIN_RPC_PASS", "secret"),
            ],
            Config::from_env,
        )
        .unwrap();

        assert_eq!(
            config.auth,
            Auth::CookieFile(PathBuf::from("/var/lib/bitcoind/.cookie"))
        );
    }

    #[test]
    fn from_env_reads_user_pass_host_port_and_path() {
        let config = with_env(
            &[
                ("BITCOIN_RPC_HOST", "node.local"),
                ("BITCOIN_RPC_PORT", "18443"),
                ("BITCOIN_RPC_PATH", "wallet/test"),
                ("BITCOIN_RPC_USER", "bitcoin"),
                ("BITCOIN_RPC_PASS", "secret"),
            ],
            Config::from_env,
        )
        .unwrap();

        assert_eq!(config.url(), "http://node.local:18443/wallet/test");
        assert_eq!(config.auth, user_pass());
    }

    #[test]
    fn from_env_user_without_pass_is_no_auth() {
        let config = with_env(&[("BITCOIN_RPC_USER", "bitcoin")], Config::from_env).unwrap();
        assert_eq!(config.auth, Auth::None);
    }

    #[test]
    fn from_env_rejects_bad_port() {
        for port in ["not-a-port", "70000"] {
            let result = with_env(&[("BITCOIN_RPC_PORT", port)], Config::from_env);
            assert!(
                matches!(result, Err(Error::InvalidArgument(_))),
                "port={port}"
            );
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::new("127.0.0.1", 8332, user_pass());
        let printed = format!("{config:?}");

        assert!(printed.contains("bitcoin"));
        assert!(!printed.contains("secret"));
    }
}
