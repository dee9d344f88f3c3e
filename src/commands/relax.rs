//! # relax 命令实现
//!
//! 加载 Si 结构，组合默认的弛豫参数和资源请求，提交到对应的网关。
//!
//! ## 流程
//! 读取结构 → 构建参数集与资源请求 → 组合 `JobSpec` → 网关提交。
//! 任一构建步骤失败时不会发生外部调用。
//!
//! ## 依赖关系
//! - 使用 `cli/mod.rs` 定义的参数
//! - 使用 `parsers/`, `models/`, `gateway/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::Cli;
use crate::error::Result;
use crate::gateway::{self, SubmissionGateway, SubmissionResult};
use crate::models::{parameters, resources, CodeRef, JobSpec};
use crate::parsers;
use crate::utils::{output, progress};

use std::path::{Path, PathBuf};
use tabled::Tabled;

/// 结构文件，相对于可执行文件所在目录
const STRUCTURE_FILE: &str = "files/Si.cif";

/// 作业目录根，相对于当前工作目录
const JOBS_ROOT: &str = "jobs";

/// 作业概览行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 relax 命令
pub fn execute(args: Cli) -> Result<()> {
    output::print_header("Abinit relaxation of silicon");

    let code: CodeRef = args.code.parse()?;
    let gateway = gateway::for_code(&code, Path::new(JOBS_ROOT));
    output::print_info(&format!(
        "Using {} gateway for computer '{}'",
        gateway.name(),
        code.computer
    ));

    let result = submit_relax(
        &args.code,
        &args.pseudo_family,
        &structure_path(),
        gateway.as_ref(),
    )?;

    output::print_separator();
    output::print_success(&format!("Submitted: job {}", result.job_id));
    output::print_done(&format!("Job directory: {}", result.job_dir.display()));

    Ok(())
}

/// 构建作业描述并提交
pub fn submit_relax(
    code: &str,
    pseudo_family: &str,
    structure_file: &Path,
    gateway: &dyn SubmissionGateway,
) -> Result<SubmissionResult> {
    output::print_info(&format!("Loading structure from {}", structure_file.display()));
    let structure = parsers::load_structure(structure_file)?;

    let job = JobSpec::compose(
        code,
        pseudo_family,
        Some(structure),
        parameters::relax_defaults()?,
        resources::relax_defaults()?,
    )?;
    print_summary(&job);

    progress::with_spinner("Submitting work chain...", || gateway.submit(job))
}

fn print_summary(job: &JobSpec) {
    let s = job.structure();
    let r = job.resources();
    let rows = vec![
        SummaryRow {
            field: "Code",
            value: job.code_identifier().to_string(),
        },
        SummaryRow {
            field: "Pseudo family",
            value: job.pseudopotential_family().to_string(),
        },
        SummaryRow {
            field: "Structure",
            value: format!("{} ({} sites, {:.3} Å³)", s.formula(), s.num_sites(), s.volume()),
        },
        SummaryRow {
            field: "Parameters",
            value: job.parameters().len().to_string(),
        },
        SummaryRow {
            field: "Resources",
            value: format!(
                "{} machine(s) x {} procs, MPI {}",
                r.num_machines(),
                r.num_mpiprocs_per_machine(),
                if r.with_mpi() { "on" } else { "off" }
            ),
        },
        SummaryRow {
            field: "Wall-clock",
            value: r.wallclock_hms(),
        },
    ];

    output::print_table(&rows);
}

/// 结构文件位置：优先可执行文件旁的 `files/`，其次 crate 目录
fn structure_path() -> PathBuf {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(STRUCTURE_FILE)));

    match beside_exe {
        Some(path) if path.exists() => path,
        _ => Path::new(env!("CARGO_MANIFEST_DIR")).join(STRUCTURE_FILE),
    }
}
