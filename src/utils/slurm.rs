//! # 作业脚本生成工具
//!
//! 生成 sbatch 提交脚本和本机直接运行的 shell 脚本。
//!
//! ## 依赖关系
//! - 被 `gateway/slurm.rs`, `gateway/direct.rs` 使用
//! - 使用 `models/resources.rs`

use crate::models::ResourceSpec;

use std::path::Path;

/// Slurm 作业配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmConfig {
    pub job_name: String,
    pub nodes: u32,
    pub ntasks_per_node: u32,
    pub time_limit: String,
}

impl SlurmConfig {
    /// 由资源请求生成 Slurm 配置
    pub fn from_resources(job_name: &str, resources: &ResourceSpec) -> Self {
        SlurmConfig {
            job_name: job_name.to_string(),
            nodes: resources.num_machines(),
            ntasks_per_node: resources.num_mpiprocs_per_machine(),
            time_limit: resources.wallclock_hms(),
        }
    }
}

/// 单引号包裹路径，内部的 `'` 写成 `'\''`
pub fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SlurmConfig, workdir: &Path, exec_cmd: &str) -> String {
    format!(
        r#"#!/bin/bash
#SBATCH --nodes={}
#SBATCH --ntasks-per-node={}
#SBATCH --time {}
#SBATCH -J {}
#SBATCH -o abinit.log
#SBATCH -e abinit.err

set -euo pipefail

cd {}
echo "PWD=$(pwd)"
echo "Running: {}"
{}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#,
        config.nodes,
        config.ntasks_per_node,
        config.time_limit,
        config.job_name,
        shell_quote(workdir),
        exec_cmd,
        exec_cmd,
    )
}

/// 生成本机直接运行的脚本，墙钟时间上限通过 `timeout` 实现
pub fn generate_direct_script(
    workdir: &Path,
    exec_cmd: &str,
    max_wallclock_seconds: u64,
) -> String {
    format!(
        r#"#!/bin/bash
set -euo pipefail

cd {}
echo "Running: {}"
timeout {} {}
"#,
        shell_quote(workdir),
        exec_cmd,
        max_wallclock_seconds,
        exec_cmd,
    )
}

/// 从 `sbatch` 输出中提取作业号（`Submitted batch job 12345`）
pub fn parse_sbatch_job_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Submitted batch job"))
        .map(|rest| rest.trim())
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
