//! # 计算程序标识
//!
//! 解析 `label@computer` 形式的程序标识，例如 `abinit-9.2.1-ab@localhost`。
//! 省略 `@computer` 时视为本机。
//!
//! ## 依赖关系
//! - 被 `gateway/` 用于选择提交方式和可执行文件名
//! - 无外部模块依赖

use crate::error::{AbirelaxError, Result};

use std::fmt;
use std::str::FromStr;

/// 本机名称
pub const LOCALHOST: &str = "localhost";

/// 程序标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRef {
    /// 程序标签，同时作为可执行文件名
    pub label: String,

    /// 运行所在的计算机
    pub computer: String,
}

impl CodeRef {
    pub fn is_local(&self) -> bool {
        self.computer == LOCALHOST
    }
}

impl FromStr for CodeRef {
    type Err = AbirelaxError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (label, computer) = match s.split_once('@') {
            Some((label, computer)) => (label.trim(), computer.trim()),
            None => (s, LOCALHOST),
        };

        if label.is_empty() || computer.is_empty() || computer.contains('@') {
            return Err(AbirelaxError::InvalidCode(s.to_string()));
        }
        if label.chars().any(char::is_whitespace) {
            return Err(AbirelaxError::InvalidCode(s.to_string()));
        }

        Ok(CodeRef {
            label: label.to_string(),
            computer: computer.to_string(),
        })
    }
}

impl fmt::Display for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, self.computer)
    }
}
