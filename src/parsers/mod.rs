//! # 结构读取模块
//!
//! 从晶体学文件加载 `Structure`。
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: cif

pub mod cif;

use crate::error::{AbirelaxError, Result};
use crate::models::Structure;
use std::path::Path;

/// 从文件路径推断格式并解析
pub fn load_structure(path: &Path) -> Result<Structure> {
    if !path.exists() {
        return Err(AbirelaxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "cif" => cif::parse_cif_file(path),
        _ => Err(AbirelaxError::ParseError {
            format: ext,
            path: path.display().to_string(),
            reason: "Unsupported structure format, expected .cif".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file() {
        let err = load_structure(Path::new("does/not/exist.cif")).unwrap_err();
        assert!(matches!(err, AbirelaxError::FileNotFound { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Si.xyz");
        fs::write(&path, "2\nSi\n").unwrap();

        let err = load_structure(&path).unwrap_err();
        assert!(matches!(err, AbirelaxError::ParseError { .. }));
    }

    #[test]
    fn test_bundled_silicon() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("files").join("Si.cif");
        let s = load_structure(&path).unwrap();

        assert_eq!(s.formula(), "Si2");
        assert_eq!(s.num_sites(), 2);
    }
}
