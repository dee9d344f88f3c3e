//! # 计算资源请求
//!
//! 机器数、每台机器的 MPI 进程数、墙钟时间上限和是否使用 MPI。
//!
//! ## 依赖关系
//! - 被 `models/job.rs`, `gateway/` 使用
//! - 无外部模块依赖

use crate::error::{AbirelaxError, Result};

use serde::Serialize;

/// 资源请求，所有数值字段 > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceSpec {
    num_machines: u32,
    num_mpiprocs_per_machine: u32,
    max_wallclock_seconds: u64,
    with_mpi: bool,
}

impl ResourceSpec {
    /// 构建资源请求，任一数值 ≤ 0 时返回 `InvalidResource`
    pub fn build(
        num_machines: i64,
        num_procs_per_machine: i64,
        max_wallclock_seconds: i64,
        use_mpi: bool,
    ) -> Result<Self> {
        Ok(ResourceSpec {
            num_machines: positive("num_machines", num_machines)?,
            num_mpiprocs_per_machine: positive("num_mpiprocs_per_machine", num_procs_per_machine)?,
            max_wallclock_seconds: positive("max_wallclock_seconds", max_wallclock_seconds)?,
            with_mpi: use_mpi,
        })
    }

    pub fn num_machines(&self) -> u32 {
        self.num_machines
    }

    pub fn num_mpiprocs_per_machine(&self) -> u32 {
        self.num_mpiprocs_per_machine
    }

    pub fn max_wallclock_seconds(&self) -> u64 {
        self.max_wallclock_seconds
    }

    pub fn with_mpi(&self) -> bool {
        self.with_mpi
    }

    /// 总 MPI 进程数
    pub fn total_mpiprocs(&self) -> u64 {
        self.num_machines as u64 * self.num_mpiprocs_per_machine as u64
    }

    /// Slurm `--time` 格式 (HH:MM:SS)
    pub fn wallclock_hms(&self) -> String {
        let s = self.max_wallclock_seconds;
        format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
    }
}

fn positive<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T> {
    if value <= 0 {
        return Err(AbirelaxError::InvalidResource {
            field: field.to_string(),
            value,
        });
    }
    T::try_from(value).map_err(|_| AbirelaxError::InvalidResource {
        field: field.to_string(),
        value,
    })
}

/// Si 弛豫的默认资源：1 台机器、4 个 MPI 进程、10 分钟
pub fn relax_defaults() -> Result<ResourceSpec> {
    ResourceSpec::build(1, 4, 10 * 60, true)
}
