//! # 提交网关模块
//!
//! 作业描述的唯一出口。网关接收一个完整的 `JobSpec`，阻塞到外部系统接受或拒绝为止，
//! 不重试，不跟踪计算进度，也不解释计算结果。
//!
//! ## 实现
//! - `direct`: 程序标识的计算机为 `localhost` 时，在本机后台启动
//! - `slurm`: 其他计算机，通过 `sbatch` 提交
//!
//! ## 依赖关系
//! - 被 `commands/relax.rs` 使用
//! - 使用 `models/`, `utils/slurm.rs`
//! - 子模块: render, direct, slurm

pub mod direct;
pub mod render;
pub mod slurm;

use crate::error::Result;
use crate::models::{CodeRef, JobSpec};

use std::path::{Path, PathBuf};

pub use direct::DirectGateway;
pub use slurm::SlurmGateway;

/// 提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// 外部系统分配的标识（进程号或调度器作业号）
    pub job_id: String,

    /// 作业目录
    pub job_dir: PathBuf,
}

/// 提交网关
pub trait SubmissionGateway {
    /// 网关名称，用于输出
    fn name(&self) -> &str;

    /// 提交作业；失败时返回 `Submission` 错误
    fn submit(&self, job: JobSpec) -> Result<SubmissionResult>;
}

/// 按程序标识的计算机选择网关
pub fn for_code(code: &CodeRef, jobs_root: &Path) -> Box<dyn SubmissionGateway> {
    if code.is_local() {
        Box::new(DirectGateway::new(jobs_root))
    } else {
        Box::new(SlurmGateway::new(jobs_root))
    }
}
