use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Placeholder replaced with the (validated) assistant id when building the endpoint URL.
pub const ASSISTANT_ID_PLACEHOLDER: &str = "{assistant_id}";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiCfg {
    /// Base URL of the platform API, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the streaming chat endpoint; must contain `{assistant_id}`.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    /// Name of the environment variable that contains a bearer token, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_stream_path() -> String {
    "/assistants/{assistant_id}/chat/stream".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Optional total request budget in milliseconds. Unset by default since it
    /// also bounds how long a response body may keep streaming.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamCfg {
    /// Longest line kept in the decode buffer; longer lines are dropped as malformed.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Fail the turn if no chunk arrives for this long. None disables the check.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

impl Default for StreamCfg {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            idle_timeout_ms: None,
        }
    }
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub api: ApiCfg,
    /// HTTP client configuration (timeouts, pooling). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    /// Stream decoding limits. Missing → defaults.
    #[serde(default)]
    pub stream: StreamCfg,
}

impl Config {
    /// Defaults for everything except the base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiCfg {
                base_url: base_url.into(),
                stream_path: default_stream_path(),
                api_key_env: None,
            },
            http: HttpCfg::default(),
            stream: StreamCfg::default(),
        }
    }

    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::ChatStreamError::from)?;
        let s = std::str::from_utf8(&bytes)
            .map_err(|e| crate::error::ChatStreamError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatStreamError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatStreamError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatStreamError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::ChatStreamError::Other(e.into()))
                })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn validate(&self) -> crate::error::CoreResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(crate::error::ChatStreamError::Validation(
                "api.base_url must not be empty".into(),
            ));
        }
        if !self.api.stream_path.contains(ASSISTANT_ID_PLACEHOLDER) {
            return Err(crate::error::ChatStreamError::Validation(format!(
                "api.stream_path must contain {ASSISTANT_ID_PLACEHOLDER}"
            )));
        }
        if self.stream.max_line_bytes == 0 {
            return Err(crate::error::ChatStreamError::Validation(
                "stream.max_line_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ragchat.json");
        let json = r#"{
          "api": {"base_url": "http://localhost:8000", "api_key_env": "RAGCHAT_API_KEY"},
          "stream": {"idle_timeout_ms": 30000}
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.api.base_url, "http://localhost:8000");
        assert_eq!(cfg.api.stream_path, "/assistants/{assistant_id}/chat/stream");
        assert_eq!(cfg.api.api_key_env.as_deref(), Some("RAGCHAT_API_KEY"));
        assert_eq!(cfg.http.connect_timeout_ms, 5_000);
        assert_eq!(cfg.http.request_timeout_ms, None);
        assert_eq!(cfg.stream.idle_timeout_ms, Some(30_000));
        assert_eq!(cfg.stream.max_line_bytes, 1024 * 1024);
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ragchat.toml");
        let toml = r#"
[api]
base_url = "https://rag.example.com/api"
stream_path = "/v2/assistant/{assistant_id}/invoke"

[http]
connect_timeout_ms = 1000
pool_max_idle_per_host = 4

[stream]
max_line_bytes = 4096
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.api.stream_path, "/v2/assistant/{assistant_id}/invoke");
        assert_eq!(cfg.api.api_key_env, None);
        assert_eq!(cfg.http.connect_timeout_ms, 1_000);
        assert_eq!(cfg.http.pool_max_idle_per_host, Some(4));
        assert_eq!(cfg.stream.max_line_bytes, 4096);
        assert_eq!(cfg.stream.idle_timeout_ms, None);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/ragchat-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        match err {
            crate::error::ChatStreamError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_utf8_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.bin");
        fs::write(&file, [0xff, 0xfe, 0xfd, 0x00, 0x80]).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            crate::error::ChatStreamError::Other(_) => {}
            other => panic!("expected Other(utf8) error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_json_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"{ "api": { "base_url": 123 }"#).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            crate::error::ChatStreamError::Other(_) => {}
            other => panic!("expected Other(json parse) error, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("ragchat.conf");
        fs::write(&json_path, r#"{"api":{"base_url":"http://a"}}"#).unwrap();
        let cfg = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg.api.base_url, "http://a");

        let toml_path = dir.path().join("ragchat2.conf");
        fs::write(&toml_path, "[api]\nbase_url = \"http://b\"\n").unwrap();
        let cfg = Config::from_path(&toml_path).unwrap();
        assert_eq!(cfg.api.base_url, "http://b");
        assert_eq!(cfg.stream, StreamCfg::default());
    }

    #[test]
    fn stream_path_without_placeholder_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nopl.toml");
        fs::write(&file, "[api]\nbase_url = \"http://b\"\nstream_path = \"/chat\"\n").unwrap();
        let err = Config::from_path(&file).unwrap_err();
        assert!(matches!(err, crate::error::ChatStreamError::Validation(_)));
    }

    #[test]
    fn with_base_url_uses_defaults() {
        let cfg = Config::with_base_url("http://localhost:1");
        assert_eq!(cfg.http, HttpCfg::default());
        assert_eq!(cfg.stream, StreamCfg::default());
        assert!(cfg.validate().is_ok());
    }
}
