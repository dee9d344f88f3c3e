//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数。只有两个外部可变输入：
//! - `--code`: 计算程序标识 (`label@computer`)
//! - `--pseudo_family` / `-P`: 赝势族名称
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 参数传递给 `commands/relax.rs`

use clap::Parser;

/// abirelax - 提交 Si 的 Abinit 结构弛豫计算
#[derive(Parser, Debug)]
#[command(name = "abirelax")]
#[command(version)]
#[command(about = "Submit an Abinit relaxation of silicon", long_about = None)]
#[command(after_help = "Example: abirelax --code abinit@localhost --pseudo_family psp8")]
pub struct Cli {
    /// Code identifier, e.g. 'abinit-9.2.1-ab@localhost'
    #[arg(long)]
    pub code: String,

    /// Pseudopotential family identified by its label
    #[arg(short = 'P', long = "pseudo_family")]
    pub pseudo_family: String,
}
