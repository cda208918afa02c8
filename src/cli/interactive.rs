use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};

use crate::tree::{FlatTreeNode, ResultTree, flatten_tree};
use crate::ui::UiConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    None,
    Quit,
    Indices(Vec<usize>),
}

/// What the caller should do once a tree's review ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    Stop,
}

pub(crate) fn review(tree: &ResultTree, ui: &UiConfig) -> Result<Flow> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();
    let mut expanded = HashSet::new();
    review_with(tree, ui, &mut input, &mut out, &mut expanded)
}

pub(crate) fn review_with(
    tree: &ResultTree,
    ui: &UiConfig,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    expanded: &mut HashSet<String>,
) -> Result<Flow> {
    loop {
        let rows = flatten_tree(tree, expanded);
        writeln!(
            out,
            "\n{}  ({})",
            ui.display_path(&tree.base_path),
            crate::ui::format_bytes(tree.total_bytes())
        )?;
        if rows.is_empty() {
            writeln!(out, "  （項目なし）")?;
            return Ok(Flow::Next);
        }
        crate::ui::write_tree_rows(out, &rows, ui, true);

        write!(
            out,
            "開閉する行を選択してください（例: 1,3-5 / all / none / q）[既定: q]: "
        )?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(Flow::Stop);
        }

        match parse_selection(&line, rows.len()) {
            Ok(Selection::Quit) => return Ok(Flow::Next),
            Ok(Selection::All) => *expanded = tree.expandable_paths(),
            Ok(Selection::None) => expanded.clear(),
            Ok(Selection::Indices(indices)) => toggle_expanded(expanded, &rows, &indices),
            Err(err) => writeln!(out, "エラー: {err}")?,
        }
    }
}

/// Flips the expand state of each selected row that has children.
pub(crate) fn toggle_expanded(
    expanded: &mut HashSet<String>,
    rows: &[FlatTreeNode],
    indices: &[usize],
) {
    for &idx in indices {
        let Some(row) = rows.get(idx) else {
            continue;
        };
        if !row.has_children {
            continue;
        }
        if !expanded.remove(&row.path) {
            expanded.insert(row.path.clone());
        }
    }
}

pub(crate) fn parse_selection(input: &str, max: usize) -> Result<Selection> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(Selection::Quit);
    }

    let s = s.to_ascii_lowercase();
    match s.as_str() {
        "all" | "*" | "全部" | "全て" | "すべて" | "ぜんぶ" => return Ok(Selection::All),
        "none" | "なし" | "無し" => return Ok(Selection::None),
        "q" | "quit" | "exit" | "終了" | "中止" => return Ok(Selection::Quit),
        _ => {}
    }

    if max == 0 {
        return Err(anyhow!("選択できる行がありません"));
    }

    let mut selected = vec![false; max];
    for token in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once('-') {
            let start = start
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("範囲指定の開始が不正です: {token}"))?;
            let end = end
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("範囲指定の終了が不正です: {token}"))?;
            if start == 0 || end == 0 {
                return Err(anyhow!("選択は1始まりです（0は指定できません）: {token}"));
            }
            if start > end {
                return Err(anyhow!("範囲指定が不正です（start > end）: {token}"));
            }
            if end > max {
                return Err(anyhow!("選択が範囲外です（最大 {max}）: {token}"));
            }
            for i in start..=end {
                selected[i - 1] = true;
            }
        } else {
            let idx = token
                .parse::<usize>()
                .map_err(|_| anyhow!("選択が不正です: {token}"))?;
            if idx == 0 {
                return Err(anyhow!("選択は1始まりです（0は指定できません）: {token}"));
            }
            if idx > max {
                return Err(anyhow!("選択が範囲外です（最大 {max}）: {token}"));
            }
            selected[idx - 1] = true;
        }
    }

    let indices: Vec<usize> = selected
        .into_iter()
        .enumerate()
        .filter_map(|(idx, on)| on.then_some(idx))
        .collect();

    if indices.is_empty() {
        return Err(anyhow!(
            "行が選択されていません（'all' / 'none' / 'q' を使用できます）"
        ));
    }

    Ok(Selection::Indices(indices))
}
