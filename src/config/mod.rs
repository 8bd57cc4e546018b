// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 文件浏览配置
    pub explorer: ExplorerConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 是否对外公开（开启后监听 0.0.0.0）
    #[serde(default)]
    pub public: bool,
    /// CORS允许的源
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// 前端静态资源目录（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl ServerConfig {
    /// 实际监听地址
    pub fn bind_addr(&self) -> String {
        let host = if self.public { "0.0.0.0" } else { self.host.as_str() };
        format!("{}:{}", host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7861,
            public: false,
            cors_origins: default_cors_origins(),
            static_dir: None,
        }
    }
}

/// 文件浏览配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// 根目录（绝对路径），所有操作都不能越出该目录
    pub root_dir: PathBuf,
    /// 是否显示隐藏文件
    #[serde(default = "default_show_hidden")]
    pub show_hidden: bool,
    /// 单个压缩包最多包含的文件数
    #[serde(default = "default_max_archive_entries")]
    pub max_archive_entries: usize,
    /// 单个压缩包最大原始字节数（默认 4GB）
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    /// 单次上传请求体上限（默认 1GB）
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_show_hidden() -> bool {
    true
}

fn default_max_archive_entries() -> usize {
    100_000
}

fn default_max_archive_bytes() -> u64 {
    4 * 1024 * 1024 * 1024 // 4GB
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1GB
}

impl ExplorerConfig {
    /// 以指定根目录和默认限制创建配置
    pub fn for_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            show_hidden: default_show_hidden(),
            max_archive_entries: default_max_archive_entries(),
            max_archive_bytes: default_max_archive_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }

    /// 校验根目录与各项限制
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_absolute() {
            anyhow::bail!("根目录必须是绝对路径: {:?}", self.root_dir);
        }
        if !self.root_dir.is_dir() {
            anyhow::bail!("根目录不存在或不是目录: {:?}", self.root_dir);
        }
        if self.max_archive_entries == 0 || self.max_archive_bytes == 0 || self.max_upload_bytes == 0 {
            anyhow::bail!("归档与上传限制必须大于 0");
        }
        Ok(())
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        // 默认以用户主目录为根，取不到时退回当前工作目录
        let root_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));
        Self::for_root(root_dir)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            explorer: ExplorerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                // 首次启动：写出默认配置，便于用户修改
                if !Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {}", e);
                    }
                }

                default_config
            }
        }
    }

    /// 使用环境变量覆盖配置：ROOT_DIR、PORT、PUBLIC
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup("ROOT_DIR").filter(|v| !v.trim().is_empty()) {
            self.explorer.root_dir = PathBuf::from(root.trim());
        }

        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("环境变量 PORT 无效: {}", port))?;
        }

        if let Some(public) = lookup("PUBLIC") {
            self.server.public = parse_bool(&public)
                .with_context(|| format!("环境变量 PUBLIC 无效: {}", public))?;
        }

        Ok(())
    }

    /// 加载、覆盖并校验最终配置
    pub async fn resolve(path: &str) -> Result<Self> {
        let mut config = Self::load_or_default(path).await;
        config.apply_env_overrides()?;
        config
            .explorer
            .validate()
            .context("文件浏览配置校验失败")?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 7861);
        assert!(!config.server.public);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:7861");
        assert!(config.explorer.show_hidden);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut config = AppConfig::default();
        config.explorer.root_dir = PathBuf::from("/srv/files");
        config.explorer.max_archive_entries = 42;
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.explorer.root_dir, PathBuf::from("/srv/files"));
        assert_eq!(loaded.explorer.max_archive_entries, 42);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [explorer]
            root_dir = "/data"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.explorer.max_archive_bytes, 4 * 1024 * 1024 * 1024);
        assert!(config.log.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("ROOT_DIR", "/mnt/share"), ("PORT", "8080"), ("PUBLIC", "true")]
            .into_iter()
            .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.explorer.root_dir, PathBuf::from("/mnt/share"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()))
            .is_err());
        assert!(config
            .apply_overrides(|k| (k == "PUBLIC").then(|| "maybe".to_string()))
            .is_err());
    }

    #[test]
    fn test_explorer_config_validation() {
        let dir = TempDir::new().unwrap();
        assert!(ExplorerConfig::for_root(dir.path()).validate().is_ok());
        assert!(ExplorerConfig::for_root("relative").validate().is_err());
        assert!(ExplorerConfig::for_root(dir.path().join("missing")).validate().is_err());

        let mut zero = ExplorerConfig::for_root(dir.path());
        zero.max_archive_entries = 0;
        assert!(zero.validate().is_err());
    }
}
