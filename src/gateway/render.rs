//! # 作业目录生成
//!
//! 把 `JobSpec` 落盘为网关可以直接启动的作业目录：
//! - `job.json`: 工作流输入文档
//! - `run.abi`: Abinit 输入文件（结构 + 赝势 + 参数）
//!
//! ## 依赖关系
//! - 被 `gateway/direct.rs`, `gateway/slurm.rs` 使用
//! - 使用 `models/`, `serde_json`

use crate::error::{AbirelaxError, Result};
use crate::models::{CodeRef, JobSpec, ResourceSpec, Structure};

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Abinit 输入文件名
pub const ABINIT_INPUT: &str = "run.abi";

/// 作业描述文件名
pub const JOB_DESCRIPTOR: &str = "job.json";

/// 元素符号，按原子序数排列（从 1 开始）
const ELEMENTS: &[&str] = &[
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

fn atomic_number(symbol: &str) -> Option<usize> {
    ELEMENTS.iter().position(|&e| e == symbol).map(|i| i + 1)
}

/// 按赝势族名称推断赝势文件扩展名
pub fn pseudo_extension(family: &str) -> &'static str {
    let family = family.to_lowercase();
    if family.contains("upf") || family.contains("sssp") {
        "upf"
    } else if family.contains("psml") {
        "psml"
    } else if family.contains("jth") || family.contains("paw") || family.contains("xml") {
        "xml"
    } else {
        "psp8"
    }
}

/// 启动命令：MPI 模式下经 `mpirun` 启动
pub fn launch_command(code: &CodeRef, resources: &ResourceSpec) -> String {
    if resources.with_mpi() {
        format!("mpirun -np {} {} {}", resources.total_mpiprocs(), code.label, ABINIT_INPUT)
    } else {
        format!("{} {}", code.label, ABINIT_INPUT)
    }
}

/// 生成 Abinit 输入文件内容
pub fn render_abinit_input(job: &JobSpec) -> Result<String> {
    let structure = job.structure();
    let species = structure.species();
    let family = job.pseudopotential_family();

    let znucl = species
        .iter()
        .map(|&el| {
            atomic_number(el)
                .map(|z| z.to_string())
                .ok_or_else(|| AbirelaxError::Submission(format!("Unknown element '{}'", el)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = String::new();
    // String 的 fmt::Write 不会失败
    let _ = writeln!(out, "# {} relaxation", structure.formula());
    let _ = writeln!(out, "# code: {}, pseudopotential family: {}", job.code_identifier(), family);

    out.push_str("\n# Structure\n");
    write_structure(&mut out, structure, &species);
    let _ = writeln!(out, "znucl {}", znucl.join(" "));

    out.push_str("\n# Pseudopotentials\n");
    let ext = pseudo_extension(family);
    let _ = writeln!(out, "pp_dirpath \"$ABI_PSPDIR/{}\"", family);
    let pseudos: Vec<String> = species.iter().map(|el| format!("{}.{}", el, ext)).collect();
    let _ = writeln!(out, "pseudos \"{}\"", pseudos.join(", "));

    out.push_str("\n# Parameters\n");
    for (key, value) in job.parameters().iter() {
        let _ = writeln!(out, "{} {}", key, value);
    }

    Ok(out)
}

fn write_structure(out: &mut String, structure: &Structure, species: &[&str]) {
    out.push_str("acell 3*1.0 Angstrom\n");
    out.push_str("rprim\n");
    for row in &structure.lattice.matrix {
        let _ = writeln!(out, "  {:16.10}  {:16.10}  {:16.10}", row[0], row[1], row[2]);
    }

    let _ = writeln!(out, "ntypat {}", species.len());
    let _ = writeln!(out, "natom {}", structure.num_sites());

    let typat: Vec<String> = structure
        .sites
        .iter()
        .filter_map(|site| species.iter().position(|&el| el == site.species))
        .map(|i| (i + 1).to_string())
        .collect();
    let _ = writeln!(out, "typat {}", typat.join(" "));

    out.push_str("xred\n");
    for site in &structure.sites {
        let [x, y, z] = site.frac;
        let _ = writeln!(out, "  {:16.10}  {:16.10}  {:16.10}", x, y, z);
    }
}

/// 作业名：只保留 `[A-Za-z0-9_.-]`，其余字符替换为 `_`
pub fn job_name(structure_name: &str) -> String {
    let name: String = structure_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "job".to_string()
    } else {
        name
    }
}

/// 在 `jobs_root` 下新建本次提交独占的目录 `<name>-<n>`，返回绝对路径
fn create_unique_dir(jobs_root: &Path, name: &str) -> Result<PathBuf> {
    let write_error = |path: &Path, e: std::io::Error| AbirelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };

    fs::create_dir_all(jobs_root).map_err(|e| write_error(jobs_root, e))?;
    let root = fs::canonicalize(jobs_root).map_err(|e| write_error(jobs_root, e))?;

    let mut n = 1u32;
    loop {
        let dir = root.join(format!("{}-{}", name, n));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(write_error(&dir, e)),
        }
    }
}

/// 创建新的作业目录并写入 `job.json` 和 `run.abi`
///
/// 每次调用都得到一个新目录，已有作业的文件不会被覆盖。
pub fn prepare_job_dir(jobs_root: &Path, job: &JobSpec) -> Result<PathBuf> {
    let job_dir = create_unique_dir(jobs_root, &job_name(&job.structure().name))?;

    let descriptor = serde_json::to_string_pretty(&job.to_input_document()?)?;
    write_file(&job_dir.join(JOB_DESCRIPTOR), &descriptor)?;
    write_file(&job_dir.join(ABINIT_INPUT), &render_abinit_input(job)?)?;

    Ok(job_dir)
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| AbirelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parameters, resources, Lattice, Site};

    fn silicon_job(code: &str, family: &str, with_mpi: bool) -> JobSpec {
        let structure = Structure::new(
            "Si",
            Lattice::from_parameters(3.867, 3.867, 3.867, 60.0, 60.0, 60.0),
            vec![Site::new("Si", [0.0, 0.0, 0.0]), Site::new("Si", [0.25, 0.25, 0.25])],
        );
        JobSpec::compose(
            code,
            family,
            Some(structure),
            parameters::relax_defaults().unwrap(),
            ResourceSpec::build(1, 4, 600, with_mpi).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_pseudo_extension() {
        assert_eq!(pseudo_extension("psp8"), "psp8");
        assert_eq!(pseudo_extension("PseudoDojo/0.4/PBE/SR/standard/psp8"), "psp8");
        assert_eq!(pseudo_extension("SSSP_1.1_efficiency"), "upf");
        assert_eq!(pseudo_extension("JTH-PBE-1.1"), "xml");
        assert_eq!(pseudo_extension("nc-psml"), "psml");
    }

    #[test]
    fn test_launch_command() {
        let code: CodeRef = "abinit-9.2.1-ab@localhost".parse().unwrap();
        let mpi = resources::relax_defaults().unwrap();
        let serial = ResourceSpec::build(1, 1, 60, false).unwrap();

        assert_eq!(launch_command(&code, &mpi), "mpirun -np 4 abinit-9.2.1-ab run.abi");
        assert_eq!(launch_command(&code, &serial), "abinit-9.2.1-ab run.abi");
    }

    #[test]
    fn test_render_abinit_input() {
        let input = render_abinit_input(&silicon_job("abinit@localhost", "psp8", true)).unwrap();

        assert!(input.contains("# Si2 relaxation\n"));
        assert!(input.contains("acell 3*1.0 Angstrom\n"));
        assert!(input.contains("ntypat 1\n"));
        assert!(input.contains("natom 2\n"));
        assert!(input.contains("typat 1 1\n"));
        assert!(input.contains("znucl 14\n"));
        assert!(input.contains("pp_dirpath \"$ABI_PSPDIR/psp8\"\n"));
        assert!(input.contains("pseudos \"Si.psp8\"\n"));
        assert!(input.contains("ecut 20.0\n"));
        assert!(input.contains("ionmov 22\n"));
        assert!(input.contains("ngkpt 4 4 4\n"));
        assert!(input.contains("shiftk 0.5 0.5 0.5 \n 0.5 0.0 0.0 \n"));
    }

    #[test]
    fn test_unknown_element_is_submission_error() {
        let structure = Structure::new(
            "X",
            Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0),
            vec![Site::new("Xx", [0.0, 0.0, 0.0])],
        );
        let job = JobSpec::compose(
            "abinit",
            "psp8",
            Some(structure),
            parameters::relax_defaults().unwrap(),
            resources::relax_defaults().unwrap(),
        )
        .unwrap();

        assert!(matches!(render_abinit_input(&job), Err(AbirelaxError::Submission(_))));
    }

    #[test]
    fn test_prepare_job_dir() {
        let root = tempfile::tempdir().unwrap();
        let job = silicon_job("abinit@localhost", "psp8", true);

        let job_dir = prepare_job_dir(root.path(), &job).unwrap();
        assert_eq!(job_dir, root.path().canonicalize().unwrap().join("Si-1"));

        let raw = fs::read_to_string(job_dir.join(JOB_DESCRIPTOR)).unwrap();
        let descriptor: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(descriptor["pseudo_family"], "psp8");
        assert_eq!(descriptor["abinit"]["metadata"]["options"]["max_wallclock_seconds"], 600);

        let input = fs::read_to_string(job_dir.join(ABINIT_INPUT)).unwrap();
        assert!(input.contains("natom 2\n"));
    }

    #[test]
    fn test_prepare_job_dir_twice_keeps_first_job() {
        let root = tempfile::tempdir().unwrap();
        let first = prepare_job_dir(root.path(), &silicon_job("abinit", "psp8", true)).unwrap();
        let second = prepare_job_dir(root.path(), &silicon_job("abinit", "JTH", true)).unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("Si-2"));
        let first_input = fs::read_to_string(first.join(ABINIT_INPUT)).unwrap();
        assert!(first_input.contains("pseudos \"Si.psp8\"\n"));
        let second_input = fs::read_to_string(second.join(ABINIT_INPUT)).unwrap();
        assert!(second_input.contains("pseudos \"Si.xml\"\n"));
    }

    #[test]
    fn test_job_name_stays_inside_jobs_root() {
        assert_eq!(job_name("Si"), "Si");
        assert_eq!(job_name("Si_diamond-1.0"), "Si_diamond-1.0");
        assert_eq!(job_name("../../etc/x"), ".._.._etc_x");
        assert_eq!(job_name("a b$c\"d"), "a_b_c_d");
        assert_eq!(job_name(""), "job");

        let root = tempfile::tempdir().unwrap();
        let structure = Structure::new(
            "../escape",
            Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0),
            vec![Site::new("Si", [0.0, 0.0, 0.0])],
        );
        let job = JobSpec::compose(
            "abinit",
            "psp8",
            Some(structure),
            parameters::relax_defaults().unwrap(),
            resources::relax_defaults().unwrap(),
        )
        .unwrap();

        let job_dir = prepare_job_dir(root.path(), &job).unwrap();
        assert_eq!(job_dir.parent(), Some(root.path().canonicalize().unwrap().as_path()));
        assert!(job_dir.ends_with(".._escape-1"));
    }
}
