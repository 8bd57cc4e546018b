// 根目录边界守卫
//
// 所有外部传入的路径都必须经过这里解析，保证结果等于根目录或位于根目录之下

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use super::types::{display_path, ExplorerError, ExplorerErrorCode};

/// 根目录边界
///
/// 构造时规范化一次，之后不可变；服务实例显式持有，不使用全局状态
#[derive(Debug, Clone)]
pub struct RootBoundary {
    /// 规范化（解析符号链接后）的根目录
    root: PathBuf,
    /// 配置中声明的根目录（仅做词法规范化）
    declared: PathBuf,
}

impl RootBoundary {
    /// 创建根目录边界，根目录必须是已存在的绝对目录
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ExplorerError> {
        let raw = root.as_ref();
        if !raw.is_absolute() {
            return Err(ExplorerError::new(ExplorerErrorCode::NotFound)
                .with_path(display_path(raw))
                .with_message("根目录必须是绝对路径"));
        }

        let root = dunce::canonicalize(raw)
            .map_err(|_| ExplorerError::new(ExplorerErrorCode::NotFound).with_path(display_path(raw)))?;

        if !root.is_dir() {
            return Err(ExplorerError::new(ExplorerErrorCode::NotADirectory).with_path(display_path(raw)));
        }

        let declared = normalize_lexically(raw).unwrap_or_else(|| root.clone());

        Ok(Self { root, declared })
    }

    /// 规范化后的根目录
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }

    /// 解析路径，末级符号链接会被跟随
    ///
    /// 用于浏览、跳转和上传目标目录。路径可以不存在，此时按最近的已存在祖先校验
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ExplorerError> {
        let lexical = self.lexical(raw)?;
        let resolved = canonicalize_existing_prefix(&lexical)
            .ok_or_else(|| out_of_bounds(raw))?;
        self.ensure_within(resolved, raw)
    }

    /// 解析条目路径，末级符号链接不跟随
    ///
    /// 用于归档与删除：选中的符号链接本身是操作对象，而不是它指向的目标
    pub fn resolve_entry(&self, raw: &str) -> Result<PathBuf, ExplorerError> {
        let lexical = self.lexical(raw)?;
        if lexical == self.root || lexical == self.declared {
            return Ok(self.root.clone());
        }

        let (parent, name) = match (lexical.parent(), lexical.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_os_string()),
            _ => return Err(out_of_bounds(raw)),
        };

        let parent = canonicalize_existing_prefix(parent).ok_or_else(|| out_of_bounds(raw))?;
        self.ensure_within(parent.join(name), raw)
    }

    /// 解析为已存在的目录
    pub fn resolve_dir(&self, raw: &str) -> Result<PathBuf, ExplorerError> {
        let path = self.resolve(raw)?;
        // 只取一次元数据，避免与并发删除产生不一致的判断
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            Ok(_) => Err(ExplorerError::new(ExplorerErrorCode::NotADirectory).with_path(raw)),
            Err(_) => Err(ExplorerError::new(ExplorerErrorCode::NotFound).with_path(raw)),
        }
    }

    /// 父目录，到达根目录后不再向上
    pub fn parent_of(&self, path: &Path) -> Option<PathBuf> {
        if self.is_root(path) {
            return None;
        }
        path.parent()
            .filter(|p| p.starts_with(&self.root))
            .map(Path::to_path_buf)
    }

    /// 校验上传文件名：只能是单个普通路径分量，按原样使用，不做裁剪
    pub fn validate_file_name<'a>(&self, name: &'a str) -> Result<&'a str, ExplorerError> {
        if name.trim().is_empty() || name == "." || name.contains('\0') || name.trim() != name {
            return Err(ExplorerError::new(ExplorerErrorCode::InvalidFileName).with_path(name));
        }
        if name == ".." || name.contains('/') || name.contains('\\') || contains_encoded_traversal(name) {
            return Err(out_of_bounds(name));
        }
        Ok(name)
    }

    /// 词法层面的解析与越界检查
    fn lexical(&self, raw: &str) -> Result<PathBuf, ExplorerError> {
        if contains_encoded_traversal(raw) {
            tracing::warn!("检测到编码后的路径穿越: {}", raw);
            return Err(out_of_bounds(raw));
        }
        if raw.contains('\0') {
            return Err(ExplorerError::new(ExplorerErrorCode::InvalidFileName).with_path(raw));
        }

        let trimmed = raw.trim();
        let candidate = if trimmed.is_empty() {
            self.root.clone()
        } else {
            let path = Path::new(trimmed);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.root.join(path)
            }
        };

        let lexical = normalize_lexically(&candidate).ok_or_else(|| out_of_bounds(raw))?;
        if !lexical.starts_with(&self.root) && !lexical.starts_with(&self.declared) {
            tracing::warn!("拒绝访问根目录之外的路径: {}", raw);
            return Err(out_of_bounds(raw));
        }
        Ok(lexical)
    }

    fn ensure_within(&self, resolved: PathBuf, raw: &str) -> Result<PathBuf, ExplorerError> {
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::warn!("路径解析后越出根目录: {} -> {:?}", raw, resolved);
            Err(out_of_bounds(raw))
        }
    }
}

fn out_of_bounds(raw: &str) -> ExplorerError {
    ExplorerError::new(ExplorerErrorCode::OutOfBounds).with_path(raw)
}

/// 检查 URL 编码形式的穿越序列
fn contains_encoded_traversal(path: &str) -> bool {
    let patterns = [
        "%2e%2e",     // URL 编码
        "%252e%252e", // 双重 URL 编码
    ];

    let lower = path.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// 词法规范化：去掉 `.`，折叠 `..`；越过文件系统根时返回 None
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    Some(out)
}

/// 规范化最长的已存在前缀，再拼回其余不存在的分量
fn canonicalize_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut rest: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = dunce::canonicalize(existing) {
            let mut out = canonical;
            for name in rest.iter().rev() {
                out.push(name);
            }
            return Some(out);
        }
        rest.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
}
