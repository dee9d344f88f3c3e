//! # 计算参数集
//!
//! 不可变的 `名称 -> 数值/字符串` 映射，即 DFT 程序的控制参数。
//!
//! 只做类型层面的校验（键非空、不重复、值为有限数值或字符串），
//! 并按目标程序的已知变量列表拒绝拼写错误的键。
//! 不检查物理意义（例如 `ngkpt` 与 `nshiftk` 是否一致），这由计算程序自身负责。
//!
//! ## 依赖关系
//! - 被 `models/job.rs`, `gateway/render.rs`, `commands/relax.rs` 使用
//! - 使用 `serde`, `serde_json`

use crate::error::{AbirelaxError, Result};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// 参数值：整数、浮点数或字符串
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// 从松散类型的 JSON 值转换，只接受数值和字符串
    pub fn from_json(key: &str, value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ParamValue::Float(f))
                } else {
                    Err(AbirelaxError::invalid_parameter(
                        key,
                        format!("number {} is out of range", n),
                    ))
                }
            }
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            Value::Bool(_) => Err(AbirelaxError::invalid_parameter(
                key,
                "expected a number or string, found a boolean",
            )),
            Value::Null => Err(AbirelaxError::invalid_parameter(
                key,
                "expected a number or string, found null",
            )),
            Value::Array(_) => Err(AbirelaxError::invalid_parameter(
                key,
                "expected a number or string, found an array",
            )),
            Value::Object(_) => Err(AbirelaxError::invalid_parameter(
                key,
                "expected a number or string, found an object",
            )),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            // Debug 格式保留小数点：20.0 而不是 20
            ParamValue::Float(x) => write!(f, "{:?}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// 目标计算程序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTarget {
    Abinit,
}

/// Abinit 输入变量白名单
const ABINIT_KEYS: &[&str] = &[
    // 基组与收敛
    "ecut", "ecutsm", "ecutdg", "pawecutdg", "nstep", "toldfe", "toldff", "tolvrs", "tolwfr",
    "tolrff", "tolmxf", "diemac", "diemix", "iscf", "nline", "nnsclo",
    // k 点
    "kptopt", "ngkpt", "nshiftk", "shiftk", "kptrlatt", "istwfk", "chksymbreak",
    // 结构弛豫
    "optcell", "ionmov", "ntime", "dilatmx", "strfact", "chkprim",
    // 电子占据与自旋
    "occopt", "tsmear", "nband", "nspinor", "nsppol", "nspden", "spinat", "charge",
    // 交换关联
    "ixc",
    // 输出控制
    "prtwf", "prtden", "prteig", "prtvol",
    // 并行
    "paral_kgb", "autoparal", "npfft", "npband", "npkpt",
];

impl CodeTarget {
    /// 该程序识别的参数名
    pub fn recognized_keys(self) -> &'static [&'static str] {
        match self {
            CodeTarget::Abinit => ABINIT_KEYS,
        }
    }
}

impl fmt::Display for CodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeTarget::Abinit => write!(f, "Abinit"),
        }
    }
}

/// 计算参数集（构建后不可变，比较与顺序无关）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    entries: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    /// 从 (键, 值) 序列构建
    ///
    /// 键去除首尾空白后不能为空，也不能重复。
    pub fn build<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut map = BTreeMap::new();

        for (key, value) in entries {
            let key: String = key.into();
            let key = key.trim();
            if key.is_empty() {
                return Err(AbirelaxError::invalid_parameter(key, "empty parameter name"));
            }
            let value: ParamValue = value.into();
            if let ParamValue::Float(x) = value {
                if !x.is_finite() {
                    return Err(AbirelaxError::invalid_parameter(
                        key,
                        format!("value {} is not a finite number", x),
                    ));
                }
            }
            if map.insert(key.to_string(), value).is_some() {
                return Err(AbirelaxError::invalid_parameter(key, "duplicated parameter name"));
            }
        }

        Ok(ParameterSet { entries: map })
    }

    /// 从松散类型的 JSON 对象构建
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let entries = object
            .iter()
            .map(|(k, v)| ParamValue::from_json(k, v).map(|pv| (k.clone(), pv)))
            .collect::<Result<Vec<_>>>()?;
        Self::build(entries)
    }

    /// 构建并检查所有键都是目标程序的已知变量
    pub fn build_for<I, K, V>(target: CodeTarget, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let set = Self::build(entries)?;
        set.check_keys(target)?;
        Ok(set)
    }

    fn check_keys(&self, target: CodeTarget) -> Result<()> {
        let known = target.recognized_keys();
        match self.entries.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(AbirelaxError::invalid_parameter(
                unknown,
                format!("not a recognized {} input variable", target),
            )),
            None => Ok(()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按键名字母顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Si 结构弛豫的默认 Abinit 参数
pub fn relax_defaults() -> Result<ParameterSet> {
    ParameterSet::build_for(
        CodeTarget::Abinit,
        [
            ("optcell", ParamValue::Int(2)),  // 晶胞优化
            ("ionmov", ParamValue::Int(22)),  // 原子弛豫
            ("tolmxf", ParamValue::Float(5.0e-5)),
            ("ecutsm", ParamValue::Float(0.5)), // Ha
            ("ecut", ParamValue::Float(20.0)),  // Ha
            ("kptopt", ParamValue::Int(1)),
            ("ngkpt", ParamValue::from("4 4 4")),
            ("nshiftk", ParamValue::Int(4)),
            (
                "shiftk",
                ParamValue::from("0.5 0.5 0.5 \n 0.5 0.0 0.0 \n 0.0 0.5 0.0 \n 0.0 0.0 0.5"),
            ),
            ("nstep", ParamValue::Int(20)),
            ("toldfe", ParamValue::Float(1.0e-6)), // Ha
            ("diemac", ParamValue::Float(12.0)),
        ],
    )
}
