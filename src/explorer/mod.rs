// 本地文件浏览模块
//
// 在固定根目录内提供列目录、上传、打包下载与删除能力

mod archive;
mod guard;
mod service;
mod types;

pub use archive::{ArchiveLimits, ArchivePlan, PlannedFile, WrittenArchive};
pub use guard::RootBoundary;
pub use service::DirectoryService;
pub use types::*;
