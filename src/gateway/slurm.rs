//! # Slurm 网关
//!
//! 生成作业目录和 `submit.sbatch`，调用 `sbatch` 提交。`sbatch` 返回 0 即视为接受。
//!
//! ## 依赖关系
//! - 使用 `gateway/render.rs`, `utils/slurm.rs`

use super::render::{self, write_file};
use super::{SubmissionGateway, SubmissionResult};
use crate::error::{AbirelaxError, Result};
use crate::models::{CodeRef, JobSpec};
use crate::utils::slurm::{generate_sbatch_script, parse_sbatch_job_id, SlurmConfig};

use std::path::{Path, PathBuf};
use std::process::Command;

/// sbatch 脚本文件名
pub const SBATCH_SCRIPT: &str = "submit.sbatch";

pub struct SlurmGateway {
    jobs_root: PathBuf,
    /// 提交命令，默认在 PATH 中查找 `sbatch`
    sbatch: PathBuf,
}

impl SlurmGateway {
    pub fn new(jobs_root: &Path) -> Self {
        Self::with_sbatch(jobs_root, Path::new("sbatch"))
    }

    /// 指定提交命令（例如集群上的包装脚本）
    pub fn with_sbatch(jobs_root: &Path, sbatch: &Path) -> Self {
        SlurmGateway {
            jobs_root: jobs_root.to_path_buf(),
            sbatch: sbatch.to_path_buf(),
        }
    }

    /// 写入作业目录和 sbatch 脚本，返回脚本路径
    pub fn prepare(&self, job: &JobSpec) -> Result<PathBuf> {
        let code: CodeRef = job.code_identifier().parse()?;
        let job_dir = render::prepare_job_dir(&self.jobs_root, job)?;

        let config =
            SlurmConfig::from_resources(&render::job_name(&job.structure().name), job.resources());
        let exec_cmd = render::launch_command(&code, job.resources());
        let sbatch_path = job_dir.join(SBATCH_SCRIPT);
        write_file(&sbatch_path, &generate_sbatch_script(&config, &job_dir, &exec_cmd))?;

        Ok(sbatch_path)
    }
}

impl SubmissionGateway for SlurmGateway {
    fn name(&self) -> &str {
        "slurm"
    }

    fn submit(&self, job: JobSpec) -> Result<SubmissionResult> {
        let sbatch_path = self.prepare(&job)?;
        let job_dir = sbatch_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.jobs_root.clone());

        let out = Command::new(&self.sbatch)
            .arg(SBATCH_SCRIPT)
            .current_dir(&job_dir)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AbirelaxError::CommandNotFound {
                    command: self.sbatch.display().to_string(),
                },
                _ => AbirelaxError::Submission(format!("Failed to run sbatch: {}", e)),
            })?;

        if !out.status.success() {
            return Err(AbirelaxError::Submission(format!(
                "sbatch exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let job_id = parse_sbatch_job_id(&stdout).ok_or_else(|| {
            AbirelaxError::Submission(format!("Unexpected sbatch output: {}", stdout.trim()))
        })?;

        Ok(SubmissionResult { job_id, job_dir })
    }
}
