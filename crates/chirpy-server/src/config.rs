use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: Vec<u8>,
    pub polka_key: Vec<u8>,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub addr: SocketAddr,
    pub dev_mode: bool,
}

impl Config {
    /// Read configuration from the environment (after `.env` is loaded).
    /// Passing `--dev` on the command line is the same as `CHIRPY_DEV=1`.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = required_key("CHIRPY_JWT_SECRET")?;
        let polka_key = required_key("CHIRPY_POLKA_KEY")?;

        let db_path = std::env::var("CHIRPY_DB_PATH")
            .unwrap_or_else(|_| "database.json".into())
            .into();
        let static_dir = std::env::var("CHIRPY_STATIC_DIR")
            .unwrap_or_else(|_| ".".into())
            .into();

        let host = std::env::var("CHIRPY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("CHIRPY_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .context("CHIRPY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

        let dev_mode = std::env::args().any(|arg| arg == "--dev")
            || std::env::var("CHIRPY_DEV").is_ok_and(|v| v == "1" || v == "true");

        Ok(Self {
            jwt_secret,
            polka_key,
            db_path,
            static_dir,
            addr,
            dev_mode,
        })
    }
}

/// Keys are supplied base64-encoded.
fn required_key(name: &str) -> Result<Vec<u8>> {
    let value = std::env::var(name).unwrap_or_default();
    if value.is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        bail!("{} is unset or still a placeholder", name);
    }
    decode_key(&value).with_context(|| format!("{} is not valid base64", name))
}

fn decode_key(value: &str) -> Result<Vec<u8>> {
    let key = B64.decode(value.trim())?;
    if key.is_empty() {
        bail!("key decodes to zero bytes");
    }
    Ok(key)
}
