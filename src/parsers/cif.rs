//! # CIF 格式解析器
//!
//! 读取晶体学 CIF 文件，生成 `Structure`。
//!
//! ## 支持的内容
//! ```text
//! data_Si
//! _cell_length_a      5.431(2)
//! _cell_angle_alpha   90
//! loop_
//! _symmetry_equiv_pos_as_xyz        # 或 _space_group_symop_operation_xyz
//! 'x, y, z'
//! '-x+1/4, -y+1/4, -z+1/4'
//! loop_
//! _atom_site_label
//! _atom_site_type_symbol
//! _atom_site_fract_x
//! _atom_site_fract_y
//! _atom_site_fract_z
//! Si1 Si 0.0 0.0 0.0
//! ```
//!
//! 非对称单元通过对称操作展开为完整晶胞，周期性重复的位点会被合并。
//! 不支持部分占据。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`
//! - 使用 `regex` 处理不确定度和对称操作

use crate::error::{AbirelaxError, Result};
use crate::models::{Lattice, Site, Structure};

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 判定两个分数坐标重合的容差
const SITE_TOLERANCE: f64 = 1e-4;

/// 解析 CIF 文件
pub fn parse_cif_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| AbirelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cif_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 CIF 格式（只读取第一个 data block）
pub fn parse_cif_content(content: &str, default_name: &str) -> Result<Structure> {
    let block = CifBlock::parse(content, default_name)?;
    let name = block.name.clone().unwrap_or_else(|| default_name.to_string());
    let fail = |reason: String| AbirelaxError::ParseError {
        format: "cif".to_string(),
        path: name.clone(),
        reason,
    };
    let patterns = Patterns::new();

    // 晶格
    let mut lengths = [0.0; 3];
    let length_tags = ["_cell_length_a", "_cell_length_b", "_cell_length_c"];
    for (i, tag) in length_tags.iter().enumerate() {
        let raw = block
            .items
            .get(*tag)
            .ok_or_else(|| fail(format!("Missing {}", tag)))?;
        lengths[i] = patterns
            .number(raw)
            .ok_or_else(|| fail(format!("Invalid {}: '{}'", tag, raw)))?;
    }
    let mut angles = [90.0; 3];
    let angle_tags = ["_cell_angle_alpha", "_cell_angle_beta", "_cell_angle_gamma"];
    for (i, tag) in angle_tags.iter().enumerate() {
        if let Some(raw) = block.items.get(*tag) {
            angles[i] = patterns
                .number(raw)
                .ok_or_else(|| fail(format!("Invalid {}: '{}'", tag, raw)))?;
        }
    }
    let lattice = Lattice::from_parameters(
        lengths[0], lengths[1], lengths[2], angles[0], angles[1], angles[2],
    );

    // 非对称单元
    let sites_loop = block
        .find_loop("_atom_site_fract_x")
        .ok_or_else(|| fail("Missing _atom_site_fract_x loop".to_string()))?;
    let asym = read_sites(sites_loop, &patterns).map_err(fail)?;
    if asym.is_empty() {
        return Err(fail("No atom sites".to_string()));
    }

    // 对称操作
    let ops = match block
        .find_loop("_symmetry_equiv_pos_as_xyz")
        .map(|l| (l, "_symmetry_equiv_pos_as_xyz"))
        .or_else(|| {
            block
                .find_loop("_space_group_symop_operation_xyz")
                .map(|l| (l, "_space_group_symop_operation_xyz"))
        }) {
        Some((l, tag)) => l
            .column(tag)
            .unwrap_or_default()
            .into_iter()
            .map(|s| {
                SymOp::parse(s, &patterns)
                    .ok_or_else(|| fail(format!("Invalid symmetry operation '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?,
        None => vec![SymOp::identity()],
    };

    let sites = expand_sites(&asym, &ops);
    Ok(Structure::new(name, lattice, sites))
}

// ─────────────────────────────────────────────────────────────
// 词法与 block 结构
// ─────────────────────────────────────────────────────────────

/// `loop_` 表格
struct CifLoop {
    tags: Vec<String>,
    values: Vec<String>,
}

impl CifLoop {
    /// 指定列的所有值
    fn column(&self, tag: &str) -> Option<Vec<&str>> {
        let idx = self.tags.iter().position(|t| t == tag)?;
        Some(
            self.values
                .chunks(self.tags.len())
                .filter_map(|row| row.get(idx).map(String::as_str))
                .collect(),
        )
    }

    fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.values.chunks_exact(self.tags.len())
    }
}

struct CifBlock {
    name: Option<String>,
    items: HashMap<String, String>,
    loops: Vec<CifLoop>,
}

impl CifBlock {
    fn parse(content: &str, default_name: &str) -> Result<Self> {
        let tokens = tokenize(content);
        let mut block = CifBlock {
            name: None,
            items: HashMap::new(),
            loops: Vec::new(),
        };

        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            let lower = tok.to_lowercase();

            if lower.starts_with("data_") {
                if block.name.is_some() {
                    break;
                }
                block.name = Some(tok.get(5..).unwrap_or_default().to_string());
                i += 1;
            } else if lower == "loop_" {
                i += 1;
                let mut tags = Vec::new();
                while i < tokens.len() && tokens[i].starts_with('_') {
                    tags.push(tokens[i].to_lowercase());
                    i += 1;
                }
                let mut values = Vec::new();
                while i < tokens.len() && !is_keyword(&tokens[i]) {
                    values.push(tokens[i].clone());
                    i += 1;
                }
                if tags.is_empty() || values.len() % tags.len() != 0 {
                    return Err(AbirelaxError::ParseError {
                        format: "cif".to_string(),
                        path: default_name.to_string(),
                        reason: format!("Malformed loop_ with tags {:?}", tags),
                    });
                }
                block.loops.push(CifLoop { tags, values });
            } else if tok.starts_with('_') {
                let value = tokens.get(i + 1).filter(|v| !is_keyword(v)).ok_or_else(|| {
                    AbirelaxError::ParseError {
                        format: "cif".to_string(),
                        path: default_name.to_string(),
                        reason: format!("Missing value for {}", tok),
                    }
                })?;
                block.items.insert(lower, value.clone());
                i += 2;
            } else {
                i += 1;
            }
        }

        Ok(block)
    }

    fn find_loop(&self, tag: &str) -> Option<&CifLoop> {
        self.loops.iter().find(|l| l.tags.iter().any(|t| t == tag))
    }
}

fn is_keyword(tok: &str) -> bool {
    let lower = tok.to_lowercase();
    tok.starts_with('_') || lower == "loop_" || lower.starts_with("data_")
}

/// 切分 token：处理注释、引号和分号文本块
fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        // 分号文本块整体作为一个 token
        if let Some(rest) = line.strip_prefix(';') {
            let mut text = rest.to_string();
            for next in lines.by_ref() {
                if next.starts_with(';') {
                    break;
                }
                text.push('\n');
                text.push_str(next);
            }
            tokens.push(text.trim().to_string());
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
            } else if c == '#' {
                break;
            } else if c == '\'' || c == '"' {
                // 引号仅在后面跟空白或行尾时闭合
                let mut j = i + 1;
                while j < chars.len() {
                    let closes = chars[j] == c
                        && chars.get(j + 1).map_or(true, |n| n.is_whitespace());
                    if closes {
                        break;
                    }
                    j += 1;
                }
                tokens.push(chars[i + 1..j.min(chars.len())].iter().collect());
                i = j + 1;
            } else {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            }
        }
    }

    tokens
}

// ─────────────────────────────────────────────────────────────
// 数值与位点
// ─────────────────────────────────────────────────────────────

/// 一次解析中复用的正则
struct Patterns {
    /// 末尾的不确定度，如 `5.431(2)` 中的 `(2)`
    uncertainty: Regex,
    /// 对称操作中的一项，如 `-1/2`, `+x`, `2*y`
    symop_term: Regex,
}

impl Patterns {
    fn new() -> Self {
        // 字面量正则，编译不会失败
        Patterns {
            uncertainty: Regex::new(r"\(\d+\)$").unwrap(),
            symop_term: Regex::new(r"([+-]?)([0-9./]*)\*?([xyz]?)").unwrap(),
        }
    }

    /// 解析数值，去掉末尾的不确定度 `(n)`；`?` 和 `.` 表示未知
    fn number(&self, raw: &str) -> Option<f64> {
        let cleaned = self.uncertainty.replace(raw.trim(), "");
        if cleaned == "?" || cleaned == "." {
            return None;
        }
        cleaned.parse().ok()
    }
}

/// 从 type symbol 或 label 中取元素符号（`Si0+`, `Si1`, `SI1` -> `Si`）
fn element_symbol(raw: &str) -> Option<String> {
    let mut letters = raw.chars().take_while(|c| c.is_ascii_alphabetic()).take(2);
    let first = letters.next()?.to_ascii_uppercase();
    Some(match letters.next() {
        Some(second) => format!("{}{}", first, second.to_ascii_lowercase()),
        None => first.to_string(),
    })
}

fn read_sites(table: &CifLoop, patterns: &Patterns) -> std::result::Result<Vec<Site>, String> {
    let idx = |tag: &str| table.tags.iter().position(|t| t == tag);

    let species_col = idx("_atom_site_type_symbol")
        .or_else(|| idx("_atom_site_label"))
        .ok_or("Atom site loop has neither type symbol nor label")?;
    let coord_cols = [
        idx("_atom_site_fract_x").ok_or("Missing _atom_site_fract_x")?,
        idx("_atom_site_fract_y").ok_or("Missing _atom_site_fract_y")?,
        idx("_atom_site_fract_z").ok_or("Missing _atom_site_fract_z")?,
    ];
    let occupancy_col = idx("_atom_site_occupancy");

    let mut sites = Vec::new();
    for row in table.rows() {
        let species = element_symbol(&row[species_col])
            .ok_or_else(|| format!("Invalid species '{}'", row[species_col]))?;

        let mut frac = [0.0; 3];
        for (k, &col) in coord_cols.iter().enumerate() {
            frac[k] = patterns
                .number(&row[col])
                .ok_or_else(|| format!("Invalid coordinate '{}'", row[col]))?;
        }

        if let Some(col) = occupancy_col {
            if let Some(occ) = patterns.number(&row[col]) {
                if occ < 1.0 - SITE_TOLERANCE {
                    return Err(format!(
                        "Partial occupancy {} on {} is not supported",
                        occ, row[species_col]
                    ));
                }
            }
        }

        sites.push(Site::new(species, frac));
    }

    Ok(sites)
}

// ─────────────────────────────────────────────────────────────
// 对称操作
// ─────────────────────────────────────────────────────────────

/// 对称操作 x' = R·x + t
#[derive(Debug, Clone, PartialEq)]
struct SymOp {
    rot: [[f64; 3]; 3],
    trans: [f64; 3],
}

impl SymOp {
    fn identity() -> Self {
        SymOp {
            rot: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            trans: [0.0; 3],
        }
    }

    /// 解析形如 `-y+1/2, x, z+3/4` 的对称操作
    fn parse(expr: &str, patterns: &Patterns) -> Option<Self> {
        let parts: Vec<&str> = expr.split(',').collect();
        if parts.len() != 3 {
            return None;
        }

        let term = &patterns.symop_term;
        let mut op = SymOp {
            rot: [[0.0; 3]; 3],
            trans: [0.0; 3],
        };

        for (row, part) in parts.iter().enumerate() {
            let compact: String = part
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            if compact.is_empty() {
                return None;
            }

            let mut covered = 0;
            for caps in term.captures_iter(&compact) {
                let whole = caps.get(0)?;
                if whole.as_str().is_empty() {
                    continue;
                }
                if whole.start() != covered {
                    return None;
                }
                covered = whole.end();

                let sign = if &caps[1] == "-" { -1.0 } else { 1.0 };
                let number = &caps[2];
                match &caps[3] {
                    "" => {
                        if number.is_empty() {
                            return None;
                        }
                        op.trans[row] += sign * parse_fraction(number)?;
                    }
                    var => {
                        let coef = if number.is_empty() { 1.0 } else { parse_fraction(number)? };
                        let col = match var {
                            "x" => 0,
                            "y" => 1,
                            _ => 2,
                        };
                        op.rot[row][col] += sign * coef;
                    }
                }
            }
            if covered != compact.len() {
                return None;
            }
        }

        Some(op)
    }

    fn apply(&self, frac: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, row) in self.rot.iter().enumerate() {
            out[i] = row[0] * frac[0] + row[1] * frac[1] + row[2] * frac[2] + self.trans[i];
        }
        out
    }
}

fn parse_fraction(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / den)
        }
        None => s.parse().ok(),
    }
}

/// 把分数坐标折回 [0, 1)
fn wrap(frac: [f64; 3]) -> [f64; 3] {
    frac.map(|v| {
        let w = v - v.floor();
        if (1.0 - w).abs() < 1e-8 { 0.0 } else { w }
    })
}

fn same_site(a: &[f64; 3], b: &[f64; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| {
        let d = x - y;
        (d - d.round()).abs() < SITE_TOLERANCE
    })
}

/// 用对称操作展开非对称单元，合并重复位点
fn expand_sites(asym: &[Site], ops: &[SymOp]) -> Vec<Site> {
    let mut sites: Vec<Site> = Vec::new();

    for site in asym {
        for op in ops {
            let frac = wrap(op.apply(site.frac));
            let duplicate = sites
                .iter()
                .any(|s| s.species == site.species && same_site(&s.frac, &frac));
            if !duplicate {
                sites.push(Site::new(site.species.clone(), frac));
            }
        }
    }

    sites
}

#[cfg(test)]
mod tests {
    use super::*;

    const SI_P1: &str = r#"# generated using pymatgen
data_Si
_symmetry_space_group_name_H-M   'P 1'
_cell_length_a   3.86697465
_cell_length_b   3.86697465
_cell_length_c   3.86697465
_cell_angle_alpha   60.00000000
_cell_angle_beta   60.00000000
_cell_angle_gamma   60.00000000
_symmetry_Int_Tables_number   1
_chemical_formula_structural   Si
_cell_formula_units_Z   2
loop_
 _symmetry_equiv_pos_site_id
 _symmetry_equiv_pos_as_xyz
  1  'x, y, z'
loop_
 _atom_site_type_symbol
 _atom_site_label
 _atom_site_symmetry_multiplicity
 _atom_site_fract_x
 _atom_site_fract_y
 _atom_site_fract_z
 _atom_site_occupancy
  Si  Si0  1  0.00000000  0.00000000  0.00000000  1
  Si  Si1  1  0.25000000  0.25000000  0.25000000  1
"#;

    const SI_CONVENTIONAL: &str = r#"data_Si_diamond
_cell_length_a 5.431(2)
_cell_length_b 5.431(2)
_cell_length_c 5.431(2)
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_space_group_symop_operation_xyz
'x, y, z'
'x, y+1/2, z+1/2'
'x+1/2, y, z+1/2'
'x+1/2, y+1/2, z'
'-x+1/4, -y+1/4, -z+1/4'
'-x+1/4, -y+3/4, -z+3/4'
'-x+3/4, -y+1/4, -z+3/4'
'-x+3/4, -y+3/4, -z+1/4'
'x+1, y, z'
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Si1 0.0 0.0 0.0
"#;

    #[test]
    fn test_parse_p1_silicon() {
        let s = parse_cif_content(SI_P1, "Si").unwrap();
        assert_eq!(s.name, "Si");
        assert_eq!(s.num_sites(), 2);
        assert_eq!(s.sites[1].frac, [0.25, 0.25, 0.25]);

        // 原胞体积 = a^3 / sqrt(2)
        let expected = 3.86697465_f64.powi(3) / 2.0_f64.sqrt();
        assert!((s.volume() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_symmetry_expansion_conventional_cell() {
        let s = parse_cif_content(SI_CONVENTIONAL, "x").unwrap();
        assert_eq!(s.name, "Si_diamond");
        assert_eq!(s.num_sites(), 8);
        assert!(s.sites.iter().all(|site| site.species == "Si"));
        assert!(s.sites.iter().any(|site| same_site(&site.frac, &[0.75, 0.75, 0.25])));
        assert!((s.lattice.lengths()[0] - 5.431).abs() < 1e-9);
    }

    #[test]
    fn test_missing_cell_length() {
        let content = SI_P1.replace("_cell_length_b   3.86697465\n", "");
        match parse_cif_content(&content, "Si").unwrap_err() {
            AbirelaxError::ParseError { format, reason, .. } => {
                assert_eq!(format, "cif");
                assert!(reason.contains("_cell_length_b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_occupancy_rejected() {
        let content = SI_P1.replace("0.25000000  1\n", "0.25000000  0.5\n");
        assert!(parse_cif_content(&content, "Si").is_err());
    }

    #[test]
    fn test_number_strips_uncertainty() {
        let patterns = Patterns::new();
        assert_eq!(patterns.number("5.431(2)"), Some(5.431));
        assert_eq!(patterns.number("-0.125"), Some(-0.125));
        assert_eq!(patterns.number("?"), None);
        assert_eq!(patterns.number("."), None);
    }

    #[test]
    fn test_element_symbol() {
        assert_eq!(element_symbol("Si0+").as_deref(), Some("Si"));
        assert_eq!(element_symbol("O2").as_deref(), Some("O"));
        assert_eq!(element_symbol("fe1").as_deref(), Some("Fe"));
        assert_eq!(element_symbol("SI1").as_deref(), Some("Si"));
        assert_eq!(element_symbol("12"), None);
    }

    #[test]
    fn test_symop_parse() {
        let patterns = Patterns::new();
        let op = SymOp::parse("-y+1/2, 1/2+x, z", &patterns).unwrap();
        assert_eq!(op.rot, [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(op.trans, [0.5, 0.5, 0.0]);
        let moved = op.apply([0.1, 0.2, 0.3]);
        for (got, want) in moved.iter().zip([0.3, 0.6, 0.3]) {
            assert!((got - want).abs() < 1e-12);
        }

        assert!(SymOp::parse("x, y", &patterns).is_none());
        assert!(SymOp::parse("x, y, w", &patterns).is_none());
    }

    #[test]
    fn test_tokenize_quotes_and_comments() {
        let tokens = tokenize("_name 'P 1' # comment\n;\nmulti\nline\n;\n_x \"it's\"");
        assert_eq!(tokens, vec!["_name", "P 1", "multi\nline", "_x", "it's"]);
    }
}
