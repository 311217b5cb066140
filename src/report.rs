//! Human and JSON renderings of an analysis plus its planned moves.

use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::errors::{FlattenError, Result};
use crate::model::{MoveRecord, Strategy};
use crate::pipeline::{analyze, plan_for, Analysis, PipelineOptions};

/// One finding, flattened for JSON consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Risk {
    pub kind: &'static str,
    pub path: PathBuf,
    pub detail: String,
    pub blocking: bool,
}

pub fn collect_risks(analysis: &Analysis) -> Vec<Risk> {
    let mut risks = Vec::new();
    for report in &analysis.reports {
        let root = report.candidate.root();
        for name in &report.collisions {
            risks.push(Risk {
                kind: "collision",
                path: root.join(name),
                detail: format!("'{}' already exists in '{}'", name.to_string_lossy(), root.display()),
                blocking: true,
            });
        }
        for path in &report.permission_denied {
            risks.push(Risk {
                kind: "permission",
                path: path.clone(),
                detail: "no write access".to_string(),
                blocking: true,
            });
        }
        for s in &report.symlink_risks {
            risks.push(Risk {
                kind: "symlink",
                path: s.path.clone(),
                detail: s.reason.clone(),
                blocking: false,
            });
        }
        for w in &report.path_warnings {
            risks.push(Risk {
                kind: "hardcoded_path",
                path: w.file.clone(),
                detail: format!("mentions '{}'", w.literal),
                blocking: false,
            });
        }
    }
    for nest in &analysis.symlinked_nests {
        risks.push(Risk {
            kind: "symlinked_nest",
            path: nest.clone(),
            detail: "nested directory is a symlink; not flattened".to_string(),
            blocking: false,
        });
    }
    risks
}

/// Planned moves, or none when preflight refuses the run.
fn planned_moves(analysis: &Analysis) -> Vec<MoveRecord> {
    plan_for(analysis).map(|r| r.records).unwrap_or_default()
}

pub fn render_json(analysis: &Analysis) -> serde_json::Value {
    let candidates: Vec<_> = analysis
        .candidates
        .iter()
        .zip(&analysis.reports)
        .map(|(c, r)| {
            json!({
                "root": c.root(),
                "nested": c.nested_path(),
                "entries": c.entries().iter().map(|e| e.to_string_lossy()).collect::<Vec<_>>(),
                "safe": r.safe(),
            })
        })
        .collect();
    let moves: Vec<_> = planned_moves(analysis)
        .iter()
        .map(|m| {
            json!({
                "source": m.source,
                "dest": m.dest,
                "strategy": m.strategy,
            })
        })
        .collect();
    json!({
        "root": analysis.root,
        "candidates": candidates,
        "risks": collect_risks(analysis),
        "moves": moves,
    })
}

pub fn render_text(analysis: &Analysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target: {}", analysis.root.display());
    if analysis.candidates.is_empty() {
        let _ = writeln!(out, "No nested duplicate directories found.");
    }
    for (c, r) in analysis.candidates.iter().zip(&analysis.reports) {
        let state = if r.safe() { "safe" } else { "BLOCKED" };
        let _ = writeln!(out, "\n{} [{state}]", c.nested_path().display());
        for name in c.entries() {
            let _ = writeln!(out, "  {} -> {}", c.nested_path().join(name).display(), c.root().join(name).display());
        }
    }
    let risks = collect_risks(analysis);
    if !risks.is_empty() {
        let _ = writeln!(out, "\nRisks:");
        for risk in &risks {
            let tag = if risk.blocking { "!" } else { "~" };
            let _ = writeln!(out, "  {tag} {}: {} ({})", risk.kind, risk.path.display(), risk.detail);
        }
    }
    let moves = planned_moves(analysis);
    if !moves.is_empty() {
        let _ = writeln!(out, "\nPlanned moves (in order):");
        for m in &moves {
            let how = match m.strategy {
                Strategy::Rename => "rename",
                Strategy::CopyVerifyDelete => "copy",
            };
            let _ = writeln!(out, "  {how} {} -> {}", m.source.display(), m.dest.display());
        }
    }
    if !analysis.ignored.is_empty() {
        let _ = writeln!(out, "\nIgnored: {}", analysis.ignored.len());
    }
    out
}

/// Text, or pretty-printed JSON, for an analysis already in hand.
pub fn render(analysis: &Analysis, json: bool) -> Result<String> {
    if !json {
        return Ok(render_text(analysis));
    }
    serde_json::to_string_pretty(&render_json(analysis)).map_err(|e| FlattenError::Render {
        details: e.to_string(),
    })
}

/// Analyze `path` and render the result.
pub fn report(path: &Path, json: bool, opts: &PipelineOptions) -> Result<String> {
    let analysis = analyze(path, opts)?;
    render(&analysis, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn json_has_three_sections() {
        let td = tempdir().unwrap();
        let b = td.path().join("b");
        fs::create_dir_all(b.join("b")).unwrap();
        fs::write(b.join("b/z"), b"in").unwrap();
        fs::write(b.join("z"), b"out").unwrap();

        let analysis = analyze(&b, &PipelineOptions::default()).unwrap();
        let v = render_json(&analysis);
        assert_eq!(v["candidates"].as_array().unwrap().len(), 1);
        assert_eq!(v["candidates"][0]["safe"], false);
        assert_eq!(v["risks"][0]["kind"], "collision");
        assert!(v["moves"].as_array().unwrap().is_empty());
    }

    #[test]
    fn text_lists_planned_moves() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        fs::write(a.join("a/x"), b"").unwrap();
        let text = report(&a, false, &PipelineOptions::default()).unwrap();
        assert!(text.contains("Planned moves"));
        assert!(text.contains("[safe]"));
    }

    #[test]
    fn json_rendering_is_the_pretty_document() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        fs::write(a.join("a/x"), b"").unwrap();
        let analysis = analyze(&a, &PipelineOptions::default()).unwrap();
        let text = render(&analysis, true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, render_json(&analysis));
        assert!(text.contains('\n'));
    }
}
