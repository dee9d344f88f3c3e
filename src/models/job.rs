//! # 作业描述
//!
//! 把结构、参数集、资源请求以及程序/赝势族标识组合为一个完整、不可变的作业描述，
//! 交给提交网关一次性消费。
//!
//! ## 依赖关系
//! - 使用 `models/structure.rs`, `models/parameters.rs`, `models/resources.rs`
//! - 被 `gateway/` 和 `commands/relax.rs` 使用
//! - 使用 `serde_json` 生成工作流输入文档

use crate::error::{AbirelaxError, Result};
use crate::models::{ParameterSet, ResourceSpec, Structure};

use serde_json::json;

/// 完整的作业描述，构建后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    code_identifier: String,
    pseudopotential_family: String,
    structure: Structure,
    parameters: ParameterSet,
    resources: ResourceSpec,
}

impl JobSpec {
    /// 组合作业描述
    ///
    /// `code_identifier`、`pseudo_family` 为空或 `structure` 缺失时返回 `MissingField`，
    /// 不会产生部分构建的对象。
    pub fn compose(
        code_identifier: &str,
        pseudo_family: &str,
        structure: Option<Structure>,
        parameters: ParameterSet,
        resources: ResourceSpec,
    ) -> Result<Self> {
        if code_identifier.trim().is_empty() {
            return Err(AbirelaxError::MissingField("code_identifier".to_string()));
        }
        if pseudo_family.trim().is_empty() {
            return Err(AbirelaxError::MissingField("pseudo_family".to_string()));
        }
        let structure =
            structure.ok_or_else(|| AbirelaxError::MissingField("structure".to_string()))?;

        Ok(JobSpec {
            code_identifier: code_identifier.to_string(),
            pseudopotential_family: pseudo_family.to_string(),
            structure,
            parameters,
            resources,
        })
    }

    pub fn code_identifier(&self) -> &str {
        &self.code_identifier
    }

    pub fn pseudopotential_family(&self) -> &str {
        &self.pseudopotential_family
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn resources(&self) -> &ResourceSpec {
        &self.resources
    }

    /// 生成 Abinit base work chain 的嵌套输入文档
    pub fn to_input_document(&self) -> Result<serde_json::Value> {
        let r = &self.resources;
        Ok(json!({
            "pseudo_family": self.pseudopotential_family,
            "abinit": {
                "code": self.code_identifier,
                "structure": serde_json::to_value(&self.structure)?,
                "parameters": serde_json::to_value(&self.parameters)?,
                "metadata": {
                    "options": {
                        "withmpi": r.with_mpi(),
                        "max_wallclock_seconds": r.max_wallclock_seconds(),
                        "resources": {
                            "num_machines": r.num_machines(),
                            "num_mpiprocs_per_machine": r.num_mpiprocs_per_machine(),
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lattice, ParamValue, Site};

    fn silicon() -> Structure {
        let lattice = Lattice::from_parameters(5.431, 5.431, 5.431, 90.0, 90.0, 90.0);
        Structure::new(
            "Si",
            lattice,
            vec![Site::new("Si", [0.0, 0.0, 0.0]), Site::new("Si", [0.25, 0.25, 0.25])],
        )
    }

    fn params() -> ParameterSet {
        ParameterSet::build([("ecut", ParamValue::Float(20.0)), ("nstep", ParamValue::Int(20))])
            .unwrap()
    }

    fn resources() -> ResourceSpec {
        ResourceSpec::build(1, 4, 600, true).unwrap()
    }

    #[test]
    fn test_compose_keeps_inputs() {
        let job =
            JobSpec::compose("abinit@localhost", "psp8", Some(silicon()), params(), resources())
                .unwrap();

        assert_eq!(job.code_identifier(), "abinit@localhost");
        assert_eq!(job.pseudopotential_family(), "psp8");
        assert_eq!(job.structure(), &silicon());
        assert_eq!(job.parameters(), &params());
        assert_eq!(job.resources(), &resources());
    }

    #[test]
    fn test_missing_fields() {
        let cases = [
            ("", "psp8", Some(silicon()), "code_identifier"),
            ("   ", "psp8", Some(silicon()), "code_identifier"),
            ("abinit@localhost", "", Some(silicon()), "pseudo_family"),
            ("abinit@localhost", "psp8", None, "structure"),
        ];

        for (code, family, structure, field) in cases {
            match JobSpec::compose(code, family, structure, params(), resources()) {
                Err(AbirelaxError::MissingField(f)) => assert_eq!(f, field),
                other => panic!("expected MissingField({field}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_input_document_layout() {
        let job =
            JobSpec::compose("abinit@localhost", "psp8", Some(silicon()), params(), resources())
                .unwrap();
        let doc = job.to_input_document().unwrap();

        assert_eq!(doc["pseudo_family"], "psp8");
        assert_eq!(doc["abinit"]["code"], "abinit@localhost");
        assert_eq!(doc["abinit"]["parameters"]["ecut"], 20.0);
        assert_eq!(doc["abinit"]["parameters"]["nstep"], 20);
        assert_eq!(doc["abinit"]["structure"]["sites"].as_array().unwrap().len(), 2);

        let options = &doc["abinit"]["metadata"]["options"];
        assert_eq!(options["withmpi"], true);
        assert_eq!(options["max_wallclock_seconds"], 600);
        assert_eq!(options["resources"]["num_machines"], 1);
        assert_eq!(options["resources"]["num_mpiprocs_per_machine"], 4);
    }
}
