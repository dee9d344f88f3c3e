//! # 数据模型模块
//!
//! 作业描述的各个组成部分：结构、参数集、资源请求、程序标识，以及把它们组合起来的 `JobSpec`。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `gateway/` 和 `commands/` 使用
//! - 子模块: structure, parameters, resources, code, job

pub mod code;
pub mod job;
pub mod parameters;
pub mod resources;
pub mod structure;

pub use code::CodeRef;
pub use job::JobSpec;
pub use parameters::{CodeTarget, ParamValue, ParameterSet};
pub use resources::ResourceSpec;
pub use structure::{Lattice, Site, Structure};
