//! # 本机直接运行网关
//!
//! 生成作业目录和 `run.sh`，用 `bash` 在后台启动。进程成功启动即视为接受，
//! 不等待计算结束。
//!
//! ## 依赖关系
//! - 使用 `gateway/render.rs`, `utils/slurm.rs`

use super::render::{self, write_file};
use super::{SubmissionGateway, SubmissionResult};
use crate::error::{AbirelaxError, Result};
use crate::models::{CodeRef, JobSpec};
use crate::utils::slurm::generate_direct_script;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 启动脚本文件名
pub const RUN_SCRIPT: &str = "run.sh";

/// 后台进程的标准输出与标准错误
pub const LOG_FILE: &str = "abinit.log";

pub struct DirectGateway {
    jobs_root: PathBuf,
}

impl DirectGateway {
    pub fn new(jobs_root: &Path) -> Self {
        DirectGateway {
            jobs_root: jobs_root.to_path_buf(),
        }
    }

    /// 写入作业目录和启动脚本，返回作业目录
    pub fn prepare(&self, job: &JobSpec) -> Result<PathBuf> {
        let code: CodeRef = job.code_identifier().parse()?;
        let job_dir = render::prepare_job_dir(&self.jobs_root, job)?;

        let exec_cmd = render::launch_command(&code, job.resources());
        let script = generate_direct_script(
            &job_dir,
            &exec_cmd,
            job.resources().max_wallclock_seconds(),
        );
        write_file(&job_dir.join(RUN_SCRIPT), &script)?;

        Ok(job_dir)
    }
}

impl SubmissionGateway for DirectGateway {
    fn name(&self) -> &str {
        "direct"
    }

    fn submit(&self, job: JobSpec) -> Result<SubmissionResult> {
        let job_dir = self.prepare(&job)?;

        let log_path = job_dir.join(LOG_FILE);
        let stdout = File::create(&log_path).map_err(|e| AbirelaxError::FileWriteError {
            path: log_path.display().to_string(),
            source: e,
        })?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| AbirelaxError::Submission(e.to_string()))?;

        let child = Command::new("bash")
            .arg(RUN_SCRIPT)
            .current_dir(&job_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AbirelaxError::CommandNotFound {
                    command: "bash".to_string(),
                },
                _ => AbirelaxError::Submission(format!("Failed to start {}: {}", RUN_SCRIPT, e)),
            })?;

        Ok(SubmissionResult {
            job_id: child.id().to_string(),
            job_dir,
        })
    }
}
