//! # 命令执行模块
//!
//! 实现命令行入口的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `models/`, `gateway/`, `utils/`
//! - 子模块: relax

pub mod relax;

use crate::cli::Cli;
use crate::error::Result;

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    relax::execute(cli)
}
