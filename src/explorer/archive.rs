// ZIP 归档生成
//
// 分两步：先遍历选择集得到归档计划（并检查大小限制），再逐个写入文件。
// 写入阶段读取失败的文件会被跳过，不影响其余条目。

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::types::{display_path, ExplorerError, ExplorerErrorCode, SkippedEntry};

/// 归档大小限制
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    /// 最大文件数
    pub max_entries: usize,
    /// 最大原始字节数
    pub max_bytes: u64,
}

/// 计划写入的单个文件
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub source: PathBuf,
    /// 归档内路径（使用 `/` 分隔）
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// 归档计划
#[derive(Debug, Default)]
pub struct ArchivePlan {
    pub files: Vec<PlannedFile>,
    pub skipped: Vec<SkippedEntry>,
    pub total_bytes: u64,
}

/// 写入完成的归档
#[derive(Debug)]
pub struct WrittenArchive {
    pub file: File,
    pub entries_added: usize,
    pub bytes_added: u64,
    pub skipped: Vec<SkippedEntry>,
}

impl ArchivePlan {
    /// 遍历选择集生成归档计划
    ///
    /// 目录递归展开，归档路径相对于被选条目的父目录；符号链接一律跳过
    pub fn build(selection: &[PathBuf], limits: ArchiveLimits) -> Result<Self, ExplorerError> {
        let mut plan = ArchivePlan::default();

        for selected in selection {
            let base = selected.parent().unwrap_or(selected.as_path());

            let metadata = match fs::symlink_metadata(selected) {
                Ok(m) => m,
                Err(e) => {
                    plan.skip(selected, e.to_string());
                    continue;
                }
            };

            if metadata.file_type().is_symlink() {
                tracing::debug!("跳过符号链接: {:?}", selected);
                continue;
            }

            if metadata.is_file() {
                plan.push(selected, base, metadata.len(), metadata.modified().ok(), limits)?;
                continue;
            }

            for entry in WalkDir::new(selected)
                .follow_links(false)
                .sort_by_file_name()
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| selected.clone());
                        plan.skip(&path, e.to_string());
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                match entry.metadata() {
                    Ok(m) => plan.push(entry.path(), base, m.len(), m.modified().ok(), limits)?,
                    Err(e) => plan.skip(entry.path(), e.to_string()),
                }
            }
        }

        Ok(plan)
    }

    fn push(
        &mut self,
        source: &Path,
        base: &Path,
        size: u64,
        modified: Option<SystemTime>,
        limits: ArchiveLimits,
    ) -> Result<(), ExplorerError> {
        let name = archive_name(source, base);

        self.total_bytes = self.total_bytes.saturating_add(size);
        if self.files.len() + 1 > limits.max_entries || self.total_bytes > limits.max_bytes {
            tracing::warn!(
                "归档超出限制: 文件数={}, 字节数={}, 限制=({}, {})",
                self.files.len() + 1,
                self.total_bytes,
                limits.max_entries,
                limits.max_bytes
            );
            return Err(ExplorerError::new(ExplorerErrorCode::ArchiveTooLarge).with_message(format!(
                "选中内容超出归档限制（最多 {} 个文件，{} 字节）",
                limits.max_entries, limits.max_bytes
            )));
        }

        self.files.push(PlannedFile {
            source: source.to_path_buf(),
            name,
            size,
            modified,
        });
        Ok(())
    }

    fn skip(&mut self, path: &Path, reason: String) {
        tracing::warn!("归档时跳过不可读条目: {:?}, 原因: {}", path, reason);
        self.skipped.push(SkippedEntry {
            path: display_path(path),
            reason,
        });
    }

    /// 按计划写入临时文件
    pub fn write(self) -> Result<WrittenArchive, ExplorerError> {
        let ArchivePlan {
            files, mut skipped, ..
        } = self;

        let file = tempfile::tempfile().map_err(archive_failed)?;
        let mut zip = ZipWriter::new(file);
        let mut names = HashSet::new();
        let mut entries_added = 0usize;
        let mut bytes_added = 0u64;

        for planned in files {
            if !names.insert(planned.name.clone()) {
                skipped.push(SkippedEntry {
                    path: display_path(&planned.source),
                    reason: format!("归档内路径重复: {}", planned.name),
                });
                continue;
            }

            // 先完整读入暂存文件，读取成功后才开始写归档条目，
            // 中途失败的文件不会在 ZIP 中留下残缺条目
            let mut spooled = match spool_source(&planned.source) {
                Ok(spooled) => spooled,
                Err(e) => {
                    tracing::warn!("读取文件失败，已跳过: {:?}, 错误: {}", planned.source, e);
                    names.remove(&planned.name);
                    skipped.push(SkippedEntry {
                        path: display_path(&planned.source),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            zip.start_file(planned.name.clone(), file_options(&planned))
                .map_err(archive_failed)?;
            let written = io::copy(&mut spooled, &mut zip).map_err(archive_failed)?;
            entries_added += 1;
            bytes_added += written;
        }

        let mut file = zip.finish().map_err(archive_failed)?;
        file.seek(SeekFrom::Start(0)).map_err(archive_failed)?;

        Ok(WrittenArchive {
            file,
            entries_added,
            bytes_added,
            skipped,
        })
    }
}

/// 将源文件复制到匿名暂存文件，并定位到开头
fn spool_source(source: &Path) -> io::Result<File> {
    // 文件可能在遍历之后被删除或变得不可读
    let mut input = File::open(source)?;
    let mut spooled = tempfile::tempfile()?;
    io::copy(&mut input, &mut spooled)?;
    spooled.seek(SeekFrom::Start(0))?;
    Ok(spooled)
}

fn archive_failed(e: impl std::fmt::Display) -> ExplorerError {
    tracing::error!("生成压缩包失败: {}", e);
    ExplorerError::new(ExplorerErrorCode::ArchiveFailed).with_message(format!("生成压缩包失败: {}", e))
}

/// 归档内路径：相对 base 的路径，统一使用 `/`
fn archive_name(source: &Path, base: &Path) -> String {
    let relative = source.strip_prefix(base).unwrap_or(source);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_options(planned: &PlannedFile) -> FileOptions {
    let mut options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(planned.size > u32::MAX as u64);

    if let Some(time) = planned.modified.and_then(zip_time) {
        options = options.last_modified_time(time);
    }
    options
}

fn zip_time(time: SystemTime) -> Option<zip::DateTime> {
    let dt: DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    const LIMITS: ArchiveLimits = ArchiveLimits {
        max_entries: 1000,
        max_bytes: 10 * 1024 * 1024,
    };

    fn read_archive(file: File) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut out = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((entry.name().to_string(), data));
        }
        out
    }

    #[test]
    fn test_archive_names_relative_to_selection_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/sub")).unwrap();
        fs::write(dir.path().join("docs/a.txt"), b"a").unwrap();
        fs::write(dir.path().join("docs/sub/b.txt"), b"bb").unwrap();
        fs::write(dir.path().join("top.txt"), b"top").unwrap();

        let selection = vec![dir.path().join("docs"), dir.path().join("top.txt")];
        let plan = ArchivePlan::build(&selection, LIMITS).unwrap();
        let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["docs/a.txt", "docs/sub/b.txt", "top.txt"]);
        assert_eq!(plan.total_bytes, 6);
    }

    #[test]
    fn test_vanished_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{i}.txt")), format!("content {i}")).unwrap();
        }

        let plan = ArchivePlan::build(&[dir.path().to_path_buf()], LIMITS).unwrap();
        assert_eq!(plan.files.len(), 10);

        // 遍历之后、写入之前文件被删除
        fs::remove_file(dir.path().join("f3.txt")).unwrap();

        let written = plan.write().unwrap();
        assert_eq!(written.entries_added, 9);
        assert_eq!(written.skipped.len(), 1);
        assert!(written.skipped[0].path.ends_with("f3.txt"));

        let entries = read_archive(written.file);
        assert_eq!(entries.len(), 9);
        assert!(entries.iter().all(|(name, _)| !name.ends_with("f3.txt")));
    }

    #[test]
    fn test_read_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.txt"), b"fine").unwrap();
        // 目录可以被打开，但读取时报错
        fs::create_dir(dir.path().join("broken.bin")).unwrap();

        let plan = ArchivePlan {
            files: vec![
                PlannedFile {
                    source: dir.path().join("ok.txt"),
                    name: "ok.txt".to_string(),
                    size: 4,
                    modified: None,
                },
                PlannedFile {
                    source: dir.path().join("broken.bin"),
                    name: "broken.bin".to_string(),
                    size: 0,
                    modified: None,
                },
            ],
            skipped: Vec::new(),
            total_bytes: 4,
        };

        let written = plan.write().unwrap();
        assert_eq!(written.entries_added, 1);
        assert_eq!(written.skipped.len(), 1);
        assert!(written.skipped[0].path.ends_with("broken.bin"));

        let entries = read_archive(written.file);
        let names: Vec<_> = entries.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["ok.txt"]);
        assert_eq!(entries[0].1, b"fine");
    }

    #[test]
    fn test_limits_enforced() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 64]).unwrap();
        fs::write(dir.path().join("b.bin"), vec![0u8; 64]).unwrap();

        let too_few_entries = ArchiveLimits {
            max_entries: 1,
            max_bytes: u64::MAX,
        };
        let err = ArchivePlan::build(&[dir.path().to_path_buf()], too_few_entries).unwrap_err();
        assert_eq!(err.code, ExplorerErrorCode::ArchiveTooLarge);

        let too_few_bytes = ArchiveLimits {
            max_entries: 100,
            max_bytes: 100,
        };
        let err = ArchivePlan::build(&[dir.path().to_path_buf()], too_few_bytes).unwrap_err();
        assert_eq!(err.code, ExplorerErrorCode::ArchiveTooLarge);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
        fs::create_dir(dir.path().join("pack")).unwrap();
        fs::write(dir.path().join("pack/ok.txt"), b"ok").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("pack/link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("pack"), dir.path().join("pack/loop")).unwrap();

        let plan = ArchivePlan::build(&[dir.path().join("pack")], LIMITS).unwrap();
        let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["pack/ok.txt"]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_duplicate_names_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::create_dir_all(dir.path().join("y")).unwrap();
        fs::write(dir.path().join("x/same.txt"), b"1").unwrap();
        fs::write(dir.path().join("y/same.txt"), b"2").unwrap();

        let selection = vec![dir.path().join("x/same.txt"), dir.path().join("y/same.txt")];
        let written = ArchivePlan::build(&selection, LIMITS).unwrap().write().unwrap();
        assert_eq!(written.entries_added, 1);
        assert_eq!(written.skipped.len(), 1);
    }
}
