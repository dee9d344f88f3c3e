//! # abirelax - Abinit 结构弛豫提交工具
//!
//! 读取 Si 的 CIF 结构，组合弛豫参数与资源请求，生成作业描述并提交。
//!
//! ## 用法
//! ```text
//! abirelax --code abinit-9.2.1-ab@localhost --pseudo_family psp8
//! ```
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (CIF 结构读取)
//!   │     ├── models/    (结构、参数集、资源请求、作业描述)
//!   │     └── gateway/   (本机 / Slurm 提交)
//!   ├── utils/      (输出、进度、作业脚本)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod error;
mod gateway;
mod models;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
