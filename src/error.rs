//! # 统一错误处理模块
//!
//! 定义 abirelax 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 构建期校验错误：`InvalidParameter`, `InvalidResource`, `MissingField`
//!   （立即返回，不重试）
//! - 提交错误：`Submission`（外部网关的失败，原样上报）
//! - 结构读取与作业目录写入的 I/O / 解析错误
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// abirelax 统一错误类型
#[derive(Error, Debug)]
pub enum AbirelaxError {
    // ─────────────────────────────────────────────────────────────
    // 构建期校验错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Invalid resource request: {field} must be > 0 (got {value})")]
    InvalidResource { field: String, value: i64 },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid code identifier '{0}', expected 'label@computer'")]
    InvalidCode(String),

    // ─────────────────────────────────────────────────────────────
    // 提交错误
    // ─────────────────────────────────────────────────────────────
    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AbirelaxError {
    pub(crate) fn invalid_parameter(key: &str, reason: impl Into<String>) -> Self {
        AbirelaxError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, AbirelaxError>;
