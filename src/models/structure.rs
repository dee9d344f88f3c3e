//! # 晶体结构数据模型
//!
//! 作业描述中的结构句柄：晶格 + 位点（元素、分数坐标）。
//! 由 `parsers/cif.rs` 创建，加载后不再修改，由 `JobSpec` 独占持有。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `models/job.rs` 使用
//! - 被 `gateway/render.rs` 用于生成 Abinit 输入
//! - 无外部模块依赖

use serde::Serialize;
use std::collections::BTreeMap;

/// 晶格，行向量表示 a, b, c（单位 Å）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度。a 沿 x 轴，b 位于 xy 平面内
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let (cos_alpha, cos_beta) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let cx = c * cos_beta;
        let cy = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let cz = (c * c - cx * cx - cy * cy).max(0.0).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [cx, cy, cz],
            ],
        }
    }

    /// 晶格矢量长度 (a, b, c)
    pub fn lengths(&self) -> [f64; 3] {
        self.matrix
            .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
    }

    /// 晶格体积 (Å³)
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        let det = a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0]);
        det.abs()
    }
}

/// 结构中的一个位点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    /// 元素符号
    pub species: String,

    /// 分数坐标 [x, y, z]
    pub frac: [f64; 3],
}

impl Site {
    pub fn new(species: impl Into<String>, frac: [f64; 3]) -> Self {
        Site {
            species: species.into(),
            frac,
        }
    }
}

/// 原子结构
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Structure {
    /// 结构名称（CIF data block 名或文件名）
    pub name: String,

    pub lattice: Lattice,

    pub sites: Vec<Site>,
}

impl Structure {
    pub fn new(name: impl Into<String>, lattice: Lattice, sites: Vec<Site>) -> Self {
        Structure {
            name: name.into(),
            lattice,
            sites,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn volume(&self) -> f64 {
        self.lattice.volume()
    }

    /// 不重复的元素列表，按首次出现顺序
    pub fn species(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for site in &self.sites {
            if !seen.contains(&site.species.as_str()) {
                seen.push(&site.species);
            }
        }
        seen
    }

    /// 化学式，元素按字母顺序，计数为 1 时省略
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.species.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, n)| if n == 1 { el.to_string() } else { format!("{}{}", el, n) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nacl() -> Structure {
        let lattice = Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0);
        Structure::new(
            "NaCl",
            lattice,
            vec![
                Site::new("Na", [0.0, 0.0, 0.0]),
                Site::new("Cl", [0.5, 0.0, 0.0]),
                Site::new("Na", [0.5, 0.5, 0.0]),
                Site::new("Cl", [0.0, 0.5, 0.0]),
            ],
        )
    }

    #[test]
    fn test_cubic_lattice_vectors() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let m = lattice.matrix;

        assert!((m[0][0] - 5.0).abs() < 1e-9);
        assert!(m[1][0].abs() < 1e-9);
        assert!((m[1][1] - 5.0).abs() < 1e-9);
        assert!((m[2][2] - 5.0).abs() < 1e-9);
        assert!((lattice.volume() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_hexagonal_lengths() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let [a, b, c] = lattice.lengths();

        assert!((a - 3.0).abs() < 1e-6);
        assert!((b - 3.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_formula_and_species() {
        let s = nacl();
        assert_eq!(s.formula(), "Cl2Na2");
        assert_eq!(s.species(), vec!["Na", "Cl"]);
        assert_eq!(s.num_sites(), 4);
    }

    #[test]
    fn test_formula_single_count() {
        let lattice = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let s = Structure::new("Fe", lattice, vec![Site::new("Fe", [0.0, 0.0, 0.0])]);
        assert_eq!(s.formula(), "Fe");
    }
}
