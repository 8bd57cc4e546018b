// 目录服务
//
// 提供列目录、上传、打包下载、删除四个核心操作

use std::collections::HashSet;
use std::fs::{self, DirEntry, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::archive::{ArchiveLimits, ArchivePlan};
use super::guard::RootBoundary;
use super::types::*;

/// 目录服务
///
/// 每次调用都是无状态的：列表实时读取文件系统，不做缓存
#[derive(Debug, Clone)]
pub struct DirectoryService {
    boundary: RootBoundary,
    config: ExplorerConfig,
}

impl DirectoryService {
    /// 使用给定的根目录边界创建服务
    pub fn new(boundary: RootBoundary, config: ExplorerConfig) -> Self {
        Self { boundary, config }
    }

    /// 按配置中的根目录创建服务
    pub fn from_config(config: ExplorerConfig) -> Result<Self, ExplorerError> {
        let boundary = RootBoundary::new(&config.root_dir)?;
        Ok(Self::new(boundary, config))
    }

    pub fn boundary(&self) -> &RootBoundary {
        &self.boundary
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// 列出目录内容
    pub fn list(&self, req: &ListRequest) -> Result<Listing, ExplorerError> {
        let path = self.boundary.resolve_dir(&req.path)?;

        let read_dir = fs::read_dir(&path).map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", path, e);
            io_error(ExplorerErrorCode::ReadFailed, &path, &e)
        })?;

        // 读取元数据失败的条目（例如正被并发删除）直接忽略
        let mut entries: Vec<Entry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| !self.is_hidden(entry))
            .filter_map(|entry| self.to_entry(&entry))
            .collect();

        sort_entries(&mut entries);

        let total = entries.len();
        let page_size = req.page_size.max(1);
        let offset = req.page.saturating_mul(page_size);
        let paginated: Vec<Entry> = entries.into_iter().skip(offset).take(page_size).collect();

        Ok(Listing {
            entries: paginated,
            current_path: display_path(&path),
            parent_path: self.boundary.parent_of(&path).map(|p| display_path(&p)),
            total,
            page: req.page,
            page_size,
            has_more: offset.saturating_add(page_size) < total,
        })
    }

    /// 路径跳转（直达路径）
    pub fn goto(&self, req: &GotoRequest) -> GotoResponse {
        let resolved = match self.boundary.resolve(&req.path) {
            Ok(p) => p,
            Err(e) => {
                return GotoResponse {
                    valid: false,
                    resolved_path: req.path.clone(),
                    kind: None,
                    message: Some(e.to_string()),
                };
            }
        };

        if !resolved.exists() {
            return GotoResponse {
                valid: false,
                resolved_path: display_path(&resolved),
                kind: None,
                message: Some(ExplorerErrorCode::NotFound.message().to_string()),
            };
        }

        let kind = if resolved.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        GotoResponse {
            valid: true,
            resolved_path: display_path(&resolved),
            kind: Some(kind),
            message: None,
        }
    }

    /// 获取单个文件/文件夹信息
    pub fn entry_info(&self, path: &str) -> Result<Entry, ExplorerError> {
        let resolved = self.boundary.resolve_entry(path)?;
        self.entry_for(&resolved)
    }

    /// 上传文件到目标目录
    ///
    /// 同名文件直接覆盖：先写入同目录下的临时文件，再原子重命名到目标位置
    pub fn upload(&self, target_dir: &str, file_name: &str, data: &[u8]) -> Result<Entry, ExplorerError> {
        let mut entries = self.upload_batch(target_dir, &[(file_name, data)])?;
        entries.pop().ok_or_else(|| ExplorerError::new(ExplorerErrorCode::EmptySelection))
    }

    /// 批量上传到同一目录
    ///
    /// 目标目录与全部文件名都校验通过后才开始写入；任一校验失败则不写入任何文件
    pub fn upload_batch<N, D>(&self, target_dir: &str, files: &[(N, D)]) -> Result<Vec<Entry>, ExplorerError>
    where
        N: AsRef<str>,
        D: AsRef<[u8]>,
    {
        if files.is_empty() {
            return Err(ExplorerError::new(ExplorerErrorCode::EmptySelection).with_message("未选择要上传的文件"));
        }

        let dir = self.boundary.resolve_dir(target_dir)?;

        let mut targets = Vec::with_capacity(files.len());
        for (file_name, _) in files {
            let name = self.boundary.validate_file_name(file_name.as_ref())?;
            let target = dir.join(name);
            if let Ok(existing) = fs::symlink_metadata(&target) {
                if existing.is_dir() {
                    return Err(ExplorerError::new(ExplorerErrorCode::WriteError)
                        .with_path(display_path(&target))
                        .with_message("已存在同名文件夹，无法覆盖"));
                }
            }
            targets.push(target);
        }

        targets
            .iter()
            .zip(files)
            .map(|(target, (_, data))| self.write_file(&dir, target, data.as_ref()))
            .collect()
    }

    fn write_file(&self, dir: &Path, target: &Path, data: &[u8]) -> Result<Entry, ExplorerError> {
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| io_error(ExplorerErrorCode::WriteError, dir, &e))?;
        temp.write_all(data)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| io_error(ExplorerErrorCode::WriteError, target, &e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644))
                .map_err(|e| io_error(ExplorerErrorCode::WriteError, target, &e))?;
        }

        temp.persist(target)
            .map_err(|e| io_error(ExplorerErrorCode::WriteError, target, &e.error))?;

        info!("文件上传完成: {:?} ({} 字节)", target, data.len());
        self.entry_for(target)
    }

    /// 将选择集打包为 ZIP
    ///
    /// 任一路径越界则整个操作失败；写入过程中不可读的文件会被跳过并计数
    pub fn archive(&self, selection: &[String]) -> Result<ArchiveOutcome, ExplorerError> {
        let resolved = self.resolve_selection(selection)?;

        for (raw, path) in &resolved {
            if fs::symlink_metadata(path).is_err() {
                return Err(ExplorerError::new(ExplorerErrorCode::NotFound).with_path(raw.as_str()));
            }
        }

        let paths: Vec<PathBuf> = resolved.into_iter().map(|(_, p)| p).collect();
        let plan = ArchivePlan::build(&paths, self.archive_limits())?;
        let planned = plan.files.len();
        let written = plan.write()?;

        let file_name = match paths.as_slice() {
            [single] => format!(
                "{}.zip",
                single
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "download".to_string())
            ),
            _ => "download.zip".to_string(),
        };

        info!(
            "压缩包生成完成: {} (计划 {} 个文件，写入 {} 个，跳过 {} 个，共 {} 字节)",
            file_name,
            planned,
            written.entries_added,
            written.skipped.len(),
            written.bytes_added
        );

        Ok(ArchiveOutcome {
            file: written.file,
            file_name,
            entries_added: written.entries_added,
            bytes_added: written.bytes_added,
            skipped: written.skipped,
        })
    }

    /// 删除选择集中的所有路径（不可恢复）
    ///
    /// 任一路径越界则不删除任何内容；其余失败逐项记录，不中断批次
    pub fn delete(&self, selection: &[String]) -> Result<DeleteReport, ExplorerError> {
        let resolved = self.resolve_selection(selection)?;
        let mut report = DeleteReport::default();

        for (_, path) in resolved {
            let shown = display_path(&path);

            if self.boundary.is_root(&path) {
                let err = ExplorerError::new(ExplorerErrorCode::RootProtected).with_path(shown.clone());
                warn!("{}", err);
                report.push(DeleteOutcome::failed(shown, &err));
                continue;
            }

            match remove_path(&path) {
                Ok(()) => {
                    info!("已删除: {:?}", path);
                    report.push(DeleteOutcome::ok(shown));
                }
                Err(err) => {
                    warn!("删除失败: {:?}, 错误: {}", path, err);
                    report.push(DeleteOutcome::failed(shown, &err));
                }
            }
        }

        info!("删除完成: 成功 {} 项，失败 {} 项", report.deleted, report.failed);
        Ok(report)
    }

    /// 解析并去重选择集；任一路径越界立即返回错误
    fn resolve_selection(&self, selection: &[String]) -> Result<Vec<(String, PathBuf)>, ExplorerError> {
        if selection.is_empty() {
            return Err(ExplorerError::new(ExplorerErrorCode::EmptySelection));
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(selection.len());
        for raw in selection {
            let path = self.boundary.resolve_entry(raw)?;
            if seen.insert(path.clone()) {
                resolved.push((raw.clone(), path));
            }
        }
        Ok(resolved)
    }

    fn archive_limits(&self) -> ArchiveLimits {
        ArchiveLimits {
            max_entries: self.config.max_archive_entries,
            max_bytes: self.config.max_archive_bytes,
        }
    }

    fn is_hidden(&self, entry: &DirEntry) -> bool {
        if self.config.show_hidden {
            return false;
        }
        entry.file_name().to_string_lossy().starts_with('.')
    }

    /// 将 DirEntry 转换为 Entry，符号链接不出现在列表中
    fn to_entry(&self, entry: &DirEntry) -> Option<Entry> {
        let file_type = entry.file_type().ok()?;
        if file_type.is_symlink() {
            return None;
        }
        let metadata = entry.metadata().ok()?;
        let name = entry.file_name().to_string_lossy().to_string();
        Some(build_entry(name, &entry.path(), &metadata))
    }

    fn entry_for(&self, path: &Path) -> Result<Entry, ExplorerError> {
        let metadata = fs::symlink_metadata(path)
            .map_err(|e| io_error(ExplorerErrorCode::NotFound, path, &e))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| display_path(path));

        Ok(build_entry(name, path, &metadata))
    }
}

fn build_entry(name: String, path: &Path, metadata: &Metadata) -> Entry {
    let (kind, size) = if metadata.is_dir() {
        (EntryKind::Directory, None)
    } else {
        (EntryKind::File, Some(metadata.len()))
    };

    Entry {
        name,
        kind,
        size,
        size_label: size.map(format_size).unwrap_or_else(|| "-".to_string()),
        modified_at: metadata
            .modified()
            .ok()
            .map(system_time_to_iso8601)
            .unwrap_or_default(),
        path: display_path(path),
    }
}

/// 文件夹在前；同组内按名称不区分大小写升序，相同时按原名排序
pub(crate) fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// 删除单个路径：目录递归删除，文件与符号链接直接删除
fn remove_path(path: &Path) -> Result<(), ExplorerError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| io_error(ExplorerErrorCode::NotFound, path, &e))?;

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| io_error(ExplorerErrorCode::WriteError, path, &e))
}

/// 将 io::Error 转换为 ExplorerError，NotFound 统一映射为路径不存在
fn io_error(code: ExplorerErrorCode, path: &Path, e: &io::Error) -> ExplorerError {
    let code = if e.kind() == io::ErrorKind::NotFound {
        ExplorerErrorCode::NotFound
    } else {
        code
    };
    ExplorerError::new(code)
        .with_path(display_path(path))
        .with_message(format!("{}: {}", code.message(), e))
}

fn system_time_to_iso8601(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
