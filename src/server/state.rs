// 应用状态

use crate::config::AppConfig;
use crate::explorer::DirectoryService;
use anyhow::Context;
use std::sync::Arc;

/// 应用全局状态
///
/// 启动后只读，克隆开销仅为引用计数
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 目录服务
    pub explorer: Arc<DirectoryService>,
}

impl AppState {
    /// 根据配置创建应用状态
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let explorer = DirectoryService::from_config(config.explorer.clone())
            .with_context(|| format!("无法使用根目录 {:?}", config.explorer.root_dir))?;

        tracing::info!("根目录: {:?}", explorer.boundary().path());

        Ok(Self {
            config: Arc::new(config),
            explorer: Arc::new(explorer),
        })
    }
}
