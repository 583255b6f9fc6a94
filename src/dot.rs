//! BDD to DOT (Graphviz) conversion and back.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Terminal nodes** `0` and `1` are rendered as squares at the bottom (sink rank)
//! - **Variable nodes** are named by their arena index, grouped by variable
//! - **Edges**:
//!   - Solid lines represent high (then) edges
//!   - Dashed lines represent low (else) edges
//!   - Dotted lines with hollow circles represent negated low edges
//! - **Root nodes** `r0`, `r1`, ... are rendered as rectangles at the top (source rank)
//!
//! Only the shapes of this writer are understood by [`Bdd::from_dot`]; it is
//! not a general DOT parser.
//!
//! # Examples
//!
//! ```
//! use petri_bdd::bdd::Bdd;
//!
//! let bdd = Bdd::default();
//! let f = bdd.apply_and(bdd.mk_var(1), bdd.mk_var(2));
//!
//! let dot = bdd.to_dot(&[f]).unwrap();
//! let back = bdd.from_dot(&dot, |label| label.strip_prefix('x')?.parse().ok()).unwrap();
//! assert_eq!(back, vec![f]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

use log::{debug, warn};

use crate::bdd::Bdd;
use crate::error::DotError;
use crate::reference::Ref;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for variable nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for terminal nodes (default: "square")
    pub terminal_shape: &'static str,
    /// Shape for root nodes (default: "rect")
    pub root_shape: &'static str,
    /// Style for high (then) edges (default: "solid")
    pub high_edge_style: &'static str,
    /// Style for low (else) edges (default: "dashed")
    pub low_edge_style: &'static str,
    /// Style for negated edges (default: "dotted")
    pub negated_edge_style: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "circle",
            terminal_shape: "square",
            root_shape: "rect",
            high_edge_style: "solid",
            low_edge_style: "dashed",
            negated_edge_style: "dotted",
        }
    }
}

pub(crate) fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract the quoted value of `label="..."` from a line, with the byte
/// range it occupies (quotes excluded).
fn find_label(line: &str) -> Option<(String, std::ops::Range<usize>)> {
    let start = line.find("label=\"")? + "label=\"".len();
    let mut value = String::new();
    let mut chars = line[start..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return Some((value, start..start + i)),
            _ => value.push(c),
        }
    }
    None
}

/// Rewrite every `label="..."` in `dot` through `f`; labels mapped to `None`
/// are left untouched.
pub fn relabel(dot: &str, f: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(dot.len());
    for line in dot.lines() {
        match find_label(line) {
            Some((label, range)) => match f(&label) {
                Some(new) => {
                    out.push_str(&line[..range.start]);
                    out.push_str(&escape_label(&new));
                    out.push_str(&line[range.end..]);
                }
                None => out.push_str(line),
            },
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

impl Bdd {
    /// Converts a BDD to DOT format, labelling variables as `x<index>`.
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(roots, &DotConfig::default(), &|v| format!("x{}", v))
    }

    /// Converts a BDD to DOT format with custom configuration and variable labels.
    ///
    /// Shared nodes appear once even when reachable from several roots.
    pub fn to_dot_with_config(
        &self,
        roots: &[Ref],
        config: &DotConfig,
        label: &dyn Fn(u32) -> String,
    ) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        // Terminal nodes (0 and 1)
        writeln!(dot, "{{ rank=sink")?;
        writeln!(dot, "0 [shape={}, label=\"0\"];", config.terminal_shape)?;
        writeln!(dot, "1 [shape={}, label=\"1\"];", config.terminal_shape)?;
        writeln!(dot, "}}")?;

        // Group nodes by variable so that each variable gets its own rank.
        let mut levels = BTreeMap::<u32, Vec<u32>>::new();
        for id in self.descendants(roots.iter().copied()) {
            if id == Ref::ONE.index() {
                continue;
            }
            levels.entry(self.variable(id)).or_default().push(id);
        }
        for ids in levels.values_mut() {
            ids.sort_unstable();
        }

        for (&v, ids) in levels.iter() {
            writeln!(dot, "{{ rank=same")?;
            for &id in ids.iter() {
                writeln!(dot, "{} [label=\"{}\"];", id, escape_label(&label(v)))?;
            }
            writeln!(dot, "}}")?;
        }

        for &id in levels.values().flatten() {
            let high = self.high(id);
            assert!(!high.is_negated()); // BDD canonicity: high edges are never negated
            writeln!(dot, "{} -- {} [style={}];", id, high.index(), config.high_edge_style)?;

            let low = self.low(id);
            if low == Ref::ZERO {
                writeln!(dot, "{} -- 0 [style={}];", id, config.low_edge_style)?;
            } else if low.is_negated() {
                writeln!(
                    dot,
                    "{} -- {} [style={}, dir=forward, arrowhead=odot];",
                    id,
                    low.index(),
                    config.negated_edge_style
                )?;
            } else {
                writeln!(dot, "{} -- {} [style={}];", id, low.index(), config.low_edge_style)?;
            }
        }

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape={}, label=\"{}\"];", i, config.root_shape, root)?;
        }
        writeln!(dot, "}}")?;

        for (i, &root) in roots.iter().enumerate() {
            if root == Ref::ZERO {
                writeln!(dot, "r{} -- 0;", i)?;
            } else if root.is_negated() {
                writeln!(dot, "r{} -- {} [dir=forward, arrowhead=odot];", i, root.index())?;
            } else {
                writeln!(dot, "r{} -- {};", i, root.index())?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    /// Rebuild the roots of a diagram written by [`Bdd::to_dot`] inside this manager.
    ///
    /// `resolve` maps a node label back to its variable index.
    pub fn from_dot(&self, dot: &str, resolve: impl Fn(&str) -> Option<u32>) -> Result<Vec<Ref>, DotError> {
        self.from_dot_with_config(dot, &DotConfig::default(), resolve)
    }

    pub fn from_dot_with_config(
        &self,
        dot: &str,
        config: &DotConfig,
        resolve: impl Fn(&str) -> Option<u32>,
    ) -> Result<Vec<Ref>, DotError> {
        let parsed = ParsedDot::parse(dot, config)?;
        let mut built = HashMap::new();
        let mut roots = Vec::with_capacity(parsed.roots.len());
        for (i, target) in parsed.roots.iter().enumerate() {
            let target = target.ok_or(DotError::RootCount {
                expected: parsed.roots.len(),
                found: i,
            })?;
            roots.push(parsed.build(self, target, &resolve, &mut built)?);
        }
        debug!("from_dot: rebuilt {} root(s) from {} node(s)", roots.len(), parsed.nodes.len());
        Ok(roots)
    }
}

/// Edge endpoint as written in the DOT text.
#[derive(Debug, Clone, Copy)]
enum Target {
    Zero,
    One,
    Node { id: u32, negated: bool },
}

#[derive(Debug, Default)]
struct ParsedNode {
    label: Option<String>,
    low: Option<Target>,
    high: Option<Target>,
}

#[derive(Debug, Default)]
struct ParsedDot {
    nodes: HashMap<u32, ParsedNode>,
    roots: Vec<Option<Target>>,
}

impl ParsedDot {
    fn parse(dot: &str, config: &DotConfig) -> Result<Self, DotError> {
        let mut parsed = ParsedDot::default();

        for (n, line) in dot.lines().enumerate() {
            let line = line.trim();
            let syntax = |message: &str| DotError::Syntax {
                line: n + 1,
                message: message.to_string(),
            };

            let (head, rest) = match line.split_once(' ') {
                Some(split) => split,
                None => continue, // `}`
            };
            if head == "graph" || head == "node" || head == "{" || head == "0" || head == "1" {
                continue;
            }

            if let Some(rest) = rest.strip_prefix("-- ") {
                let (target, attrs) = match rest.split_once(' ') {
                    Some((target, attrs)) => (target, attrs),
                    None => (rest.trim_end_matches(';'), ""),
                };
                let target = target.trim_end_matches(';');
                let negated = attrs.contains("arrowhead=odot");
                let target = match target {
                    "0" => Target::Zero,
                    "1" if !negated => Target::One,
                    "1" => Target::Zero,
                    id => Target::Node {
                        id: id.parse().map_err(|_| syntax("bad edge target"))?,
                        negated,
                    },
                };

                if let Some(root) = head.strip_prefix('r') {
                    let i: usize = root.parse().map_err(|_| syntax("bad root name"))?;
                    if parsed.roots.len() <= i {
                        parsed.roots.resize(i + 1, None);
                    }
                    parsed.roots[i] = Some(target);
                } else {
                    let id: u32 = head.parse().map_err(|_| syntax("bad node name"))?;
                    let style = |s: &str| attrs.contains(&format!("style={}", s));
                    let node = parsed.nodes.entry(id).or_default();
                    if style(config.high_edge_style) {
                        node.high = Some(target);
                    } else if style(config.low_edge_style) || style(config.negated_edge_style) {
                        node.low = Some(target);
                    } else {
                        return Err(syntax("unknown edge style"));
                    }
                }
            } else if rest.starts_with('[') {
                if head.starts_with('r') {
                    continue; // root declaration
                }
                let id: u32 = head.parse().map_err(|_| syntax("bad node name"))?;
                let (label, _) = find_label(rest).ok_or_else(|| syntax("node without label"))?;
                parsed.nodes.entry(id).or_default().label = Some(label);
            } else {
                return Err(syntax("unrecognized statement"));
            }
        }

        Ok(parsed)
    }

    /// Rebuilds the node behind `target`.
    ///
    /// `built` maps a DOT node id to its rebuilt diagram, or to `None` while
    /// its children are still being rebuilt.
    fn build(
        &self,
        bdd: &Bdd,
        target: Target,
        resolve: &impl Fn(&str) -> Option<u32>,
        built: &mut HashMap<u32, Option<Ref>>,
    ) -> Result<Ref, DotError> {
        let (id, negated) = match target {
            Target::Zero => return Ok(bdd.zero()),
            Target::One => return Ok(bdd.one()),
            Target::Node { id, negated } => (id, negated),
        };

        let res = match built.get(&id) {
            Some(&Some(res)) => res,
            Some(None) => return Err(DotError::Cycle(id.to_string())),
            None => {
                let dangling = || DotError::Dangling(id.to_string());
                let node = self.nodes.get(&id).ok_or_else(dangling)?;
                let label = node.label.as_deref().ok_or_else(dangling)?;
                let v = resolve(label)
                    .filter(|&v| v != 0)
                    .ok_or_else(|| DotError::UnknownLabel(label.to_string()))?;

                built.insert(id, None);
                let low = self.build(bdd, node.low.ok_or_else(dangling)?, resolve, built)?;
                let high = self.build(bdd, node.high.ok_or_else(dangling)?, resolve, built)?;
                if v >= bdd.top_variable(low) || v >= bdd.top_variable(high) {
                    return Err(DotError::Unordered(id.to_string()));
                }

                let res = bdd.mk_node(v, low, high);
                built.insert(id, Some(res));
                res
            }
        };

        Ok(if negated { -res } else { res })
    }
}

/// Best-effort rendering of a DOT file to PNG with the Graphviz `dot` executable.
///
/// Returns whether an image was produced; failures are logged, never raised.
pub fn render(dot_path: &Path, image_path: &Path) -> bool {
    let output = Command::new("dot")
        .arg("-Tpng")
        .arg(dot_path)
        .arg("-o")
        .arg(image_path)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            debug!("Rendered {} to {}", dot_path.display(), image_path.display());
            true
        }
        Ok(output) => {
            warn!(
                "Graphviz failed to render {}: {}",
                dot_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            warn!("Graphviz `dot` is not available, skipping rendering: {}", e);
            false
        }
    }
}
