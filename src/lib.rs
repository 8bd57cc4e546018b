// Local File Explorer
// 本地目录浏览服务核心库

// 配置管理模块
pub mod config;

// 目录浏览、打包下载、上传与删除
pub mod explorer;

// 日志系统
pub mod logging;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use explorer::{DirectoryService, Entry, ExplorerError, ExplorerErrorCode, RootBoundary};
pub use server::{build_router, AppState};
