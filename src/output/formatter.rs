use anyhow::Result;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::scoring::pipeline::{COMPENSATION_COLUMN, RANK_COLUMN, SCORE_COLUMN};
use crate::scoring::{RankedRow, RankedTable};
use crate::table::{PopulationTable, Value, PLAYER_COLUMN};

const COLUMN_GAP: &str = "  ";
const BAR_CHAR: char = '█';

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Format a score with three decimals
pub fn format_score(score: f64) -> String {
    format!("{:.3}", score)
}

/// Format a cell for display: whole numbers without decimals, other numbers
/// with three, missing cells as "-"
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Missing => "-".to_string(),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e12 => format!("{:.0}", n),
        Value::Number(n) => format!("{:.3}", n),
        Value::Text(s) => s.clone(),
    }
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate_text(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Default display columns: Rank, Player, Score, then the KPIs unless
/// `brief` is set
pub fn display_columns(ranked: &RankedTable, brief: bool) -> Vec<String> {
    let mut columns = vec![
        RANK_COLUMN.to_string(),
        PLAYER_COLUMN.to_string(),
        SCORE_COLUMN.to_string(),
    ];
    if !brief {
        columns.extend(ranked.kpis().iter().cloned());
    }
    columns
}

fn is_numeric_column(table: &PopulationTable, index: usize) -> bool {
    table
        .rows()
        .iter()
        .all(|r| !matches!(r.get(index), Value::Text(_)))
}

/// Format the ranking as an aligned table with a header row.
///
/// Numeric columns are right-aligned. When the table is wider than the
/// terminal, the Player column is truncated first.
pub fn format_ranked_table(
    ranked: &RankedTable,
    columns: &[String],
    use_colors: bool,
) -> Result<String> {
    if ranked.is_empty() {
        return Ok("No players ranked.".to_string());
    }

    let view = ranked.table().select(columns)?;
    let mut cells: Vec<Vec<String>> = view
        .rows()
        .iter()
        .map(|r| {
            r.cells()
                .iter()
                .zip(view.columns())
                .map(|(v, column)| match (column.as_str(), v) {
                    (SCORE_COLUMN, Value::Number(n)) => format_score(*n),
                    _ => format_value(v),
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = view.columns().iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let player_idx = view.column_index(PLAYER_COLUMN);
    if let (Some(term_width), Some(player_idx)) = (get_terminal_width(), player_idx) {
        let gaps = COLUMN_GAP.len() * widths.len().saturating_sub(1);
        let total: usize = widths.iter().sum::<usize>() + gaps;
        if total > term_width {
            let others = total - widths[player_idx];
            let available = term_width.saturating_sub(others).max(12);
            if available < widths[player_idx] {
                widths[player_idx] = available;
                for row in cells.iter_mut() {
                    row[player_idx] = truncate_text(&row[player_idx], available);
                }
            }
        }
    }

    let numeric: Vec<bool> = (0..view.columns().len())
        .map(|i| is_numeric_column(&view, i))
        .collect();
    let pad = |text: &str, i: usize| {
        if numeric[i] {
            format!("{:>width$}", text, width = widths[i])
        } else {
            format!("{:<width$}", text, width = widths[i])
        }
    };

    let header = view
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let padded = pad(c, i);
            if use_colors {
                padded.bold().to_string()
            } else {
                padded
            }
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);

    let body = cells.iter().map(|row| {
        row.iter()
            .enumerate()
            .map(|(i, cell)| {
                let padded = pad(cell, i);
                if !use_colors {
                    return padded;
                }
                match view.columns()[i].as_str() {
                    RANK_COLUMN => padded.dimmed().to_string(),
                    SCORE_COLUMN => padded.bold().to_string(),
                    PLAYER_COLUMN => padded.cyan().to_string(),
                    _ => padded,
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_GAP)
    });

    Ok(std::iter::once(header)
        .chain(body)
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Format the ranking as tab-separated values for scripting
/// (header row, raw values, no colors)
pub fn format_tsv(ranked: &RankedTable, columns: &[String]) -> Result<String> {
    let view = ranked.table().select(columns)?;
    let header = view.columns().join("\t");
    let rows = view.rows().iter().map(|r| {
        r.cells()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t")
    });
    Ok(std::iter::once(header)
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Format the ranking as a JSON array of objects keyed by column
pub fn format_json(ranked: &RankedTable, columns: &[String]) -> Result<String> {
    let view = ranked.table().select(columns)?;
    let mut rows = Vec::with_capacity(view.len());
    for record in view.rows() {
        let mut object = serde_json::Map::new();
        for (column, value) in view.columns().iter().zip(record.cells()) {
            object.insert(column.clone(), serde_json::to_value(value)?);
        }
        rows.push(serde_json::Value::Object(object));
    }
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Side-by-side view of two ranked players. The larger value in each row is
/// highlighted when colors are on.
pub fn format_comparison(
    first: &RankedRow,
    second: &RankedRow,
    kpis: &[String],
    use_colors: bool,
) -> String {
    let mut lines: Vec<(String, Option<f64>, Option<f64>)> = vec![
        ("Rank".to_string(), Some(first.rank as f64), Some(second.rank as f64)),
        (SCORE_COLUMN.to_string(), Some(first.score), Some(second.score)),
        (
            COMPENSATION_COLUMN.to_string(),
            Some(first.breakdown.compensation.total()),
            Some(second.breakdown.compensation.total()),
        ),
    ];
    for kpi in kpis {
        lines.push((
            kpi.clone(),
            first.value(kpi).and_then(Value::as_f64),
            second.value(kpi).and_then(Value::as_f64),
        ));
    }

    let label_width = lines
        .iter()
        .map(|(l, _, _)| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(PLAYER_COLUMN.len());
    let first_name = first.player();
    let second_name = second.player();
    let value_width = first_name.chars().count().max(second_name.chars().count()).max(9);

    let header = format!(
        "{:<lw$}{gap}{:>vw$}{gap}{:>vw$}",
        PLAYER_COLUMN,
        first_name,
        second_name,
        lw = label_width,
        vw = value_width,
        gap = COLUMN_GAP
    );
    let header = if use_colors { header.bold().to_string() } else { header };

    let render = |v: Option<f64>, label: &str| match v {
        None => "-".to_string(),
        Some(n) if label == "Rank" => format!("{:.0}", n),
        Some(n) => format!("{:.3}", n),
    };

    let body = lines.iter().map(|(label, a, b)| {
        let left = format!("{:>vw$}", render(*a, label), vw = value_width);
        let right = format!("{:>vw$}", render(*b, label), vw = value_width);
        // Lower is better for rank; higher for everything else.
        let (left, right) = match (a, b) {
            (Some(a), Some(b)) if use_colors && a != b => {
                let first_wins = if label == "Rank" { a < b } else { a > b };
                if first_wins {
                    (left.green().to_string(), right)
                } else {
                    (left, right.green().to_string())
                }
            }
            _ => (left, right),
        };
        format!(
            "{:<lw$}{gap}{}{gap}{}",
            label,
            left,
            right,
            lw = label_width,
            gap = COLUMN_GAP
        )
    });

    std::iter::once(header)
        .chain(body)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Horizontal bar chart of the top `count` scores
pub fn format_score_chart(ranked: &RankedTable, count: usize, use_colors: bool) -> String {
    let rows: Vec<RankedRow> = ranked.rows().take(count).collect();
    if rows.is_empty() {
        return "No players ranked.".to_string();
    }

    let names: Vec<String> = rows.iter().map(|r| r.player()).collect();
    let name_width = names.iter().map(|n| n.chars().count()).max().unwrap_or(0).min(24);
    let max_score = rows
        .iter()
        .map(|r| r.score)
        .fold(f64::NEG_INFINITY, f64::max);

    // index(3) + name + score(8) + gaps
    let fixed = 3 + 1 + name_width + 8 + COLUMN_GAP.len() * 2;
    let bar_space = get_terminal_width()
        .map(|w| w.saturating_sub(fixed).clamp(10, 60))
        .unwrap_or(40);

    rows.iter()
        .zip(&names)
        .map(|(row, name)| {
            let fraction = if max_score > 0.0 {
                (row.score / max_score).max(0.0)
            } else {
                0.0
            };
            let bar: String = std::iter::repeat(BAR_CHAR)
                .take((fraction * bar_space as f64).round() as usize)
                .collect();
            let index = format!("{:>2}.", row.rank);
            let name = format!(
                "{:<width$}",
                truncate_text(name, name_width),
                width = name_width
            );
            let score = format!("{:>8}", format_score(row.score));
            if use_colors {
                format!(
                    "{} {}{}{}{}{}",
                    index.dimmed(),
                    name,
                    COLUMN_GAP,
                    bar.cyan(),
                    COLUMN_GAP,
                    score.bold()
                )
            } else {
                format!("{} {}{}{}{}{}", index, name, COLUMN_GAP, bar, COLUMN_GAP, score)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Explain one player's score: weighted contribution per KPI, then the
/// compensation factors
pub fn format_breakdown(
    row: &RankedRow,
    factor_columns: &[String; 3],
    use_colors: bool,
) -> String {
    let title = format!(
        "#{} {}  score {}",
        row.rank,
        row.player(),
        format_score(row.score)
    );
    let mut lines = vec![if use_colors {
        title.bold().to_string()
    } else {
        title
    }];

    let label_width = row
        .breakdown
        .contributions
        .iter()
        .map(|c| c.kpi.chars().count())
        .chain(factor_columns.iter().map(|c| c.chars().count()))
        .max()
        .unwrap_or(0);

    for c in &row.breakdown.contributions {
        lines.push(format!(
            "  {:<lw$}  {:>6.3} x {:>5}  = {:>7.3}",
            c.kpi,
            c.normalized,
            c.weight,
            c.weighted,
            lw = label_width
        ));
    }
    lines.push(format!(
        "  {:<lw$}  {:>25.3}",
        "Weighted sum",
        row.breakdown.weighted_sum,
        lw = label_width
    ));

    let comp = &row.breakdown.compensation;
    for (column, factor) in factor_columns.iter().zip(comp.factors()) {
        lines.push(format!("  {:<lw$}  x{}", column, factor, lw = label_width));
    }
    lines.push(format!(
        "  {:<lw$}  x{}",
        COMPENSATION_COLUMN,
        comp.total(),
        lw = label_width
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{run_pipeline, PipelineConfig, KPI_COLUMNS};

    fn ranked() -> RankedTable {
        let mut columns = vec!["Player".to_string()];
        columns.extend(KPI_COLUMNS.iter().map(|k| k.to_string()));
        columns.push("Peak_Year".to_string());
        let mut table = PopulationTable::new(columns);
        for (name, level, height, year) in [
            ("Magic Johnson", 9.0, 81.0, 1987.0),
            ("Isiah Thomas", 5.0, 73.0, 1984.0),
            ("Bob Cousy", 6.0, 73.0, 1957.0),
        ] {
            let mut cells = vec![Value::Text(name.to_string())];
            for kpi in KPI_COLUMNS {
                cells.push(Value::Number(if kpi == "Height" { height } else { level }));
            }
            cells.push(Value::Number(year));
            table.push_row(cells).unwrap();
        }
        run_pipeline(table, &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Number(3.0)), "3");
        assert_eq!(format_value(&Value::Number(0.12345)), "0.123");
        assert_eq!(format_value(&Value::Missing), "-");
        assert_eq!(format_value(&Value::Text("Bird".to_string())), "Bird");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(12.0), "12.000");
        assert_eq!(format_score(0.98765), "0.988");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Kareem Abdul-Jabbar", 10), "Kareem ...");
        assert_eq!(truncate_text("Shaq", 10), "Shaq");
    }

    #[test]
    fn test_display_columns() {
        let ranked = ranked();
        assert_eq!(display_columns(&ranked, true), vec!["Rank", "Player", "Score"]);
        assert_eq!(display_columns(&ranked, false).len(), 17);
    }

    #[test]
    fn test_format_ranked_table_plain() {
        let ranked = ranked();
        let columns = display_columns(&ranked, true);
        let output = format_ranked_table(&ranked, &columns, false).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Rank"));
        assert!(lines[1].contains("Magic Johnson"));
        assert!(lines[1].trim_start().starts_with('1'));
    }

    #[test]
    fn test_format_ranked_table_unknown_column() {
        let ranked = ranked();
        let columns = vec!["Player".to_string(), "Steals".to_string()];
        assert!(format_ranked_table(&ranked, &columns, false).is_err());
    }

    #[test]
    fn test_format_tsv() {
        let ranked = ranked();
        let columns = vec!["Rank".to_string(), "Player".to_string()];
        let output = format_tsv(&ranked, &columns).unwrap();
        assert_eq!(output.lines().next().unwrap(), "Rank\tPlayer");
        assert_eq!(output.lines().nth(1).unwrap(), "1\tMagic Johnson");
    }

    #[test]
    fn test_format_json() {
        let ranked = ranked();
        let columns = vec!["Rank".to_string(), "Player".to_string()];
        let output = format_json(&ranked, &columns).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["Player"], "Magic Johnson");
        assert_eq!(parsed[0]["Rank"], 1.0);
    }

    #[test]
    fn test_format_comparison() {
        let ranked = ranked();
        let (a, b) = ranked.compare("Isiah Thomas", "Bob Cousy").unwrap();
        let output = format_comparison(&a, &b, ranked.kpis(), false);

        assert!(output.lines().next().unwrap().contains("Isiah Thomas"));
        assert!(output.contains("Score"));
        assert!(output.contains("AllStar"));
        assert_eq!(output.lines().count(), 1 + 3 + 14);
    }

    #[test]
    fn test_format_score_chart() {
        let ranked = ranked();
        let output = format_score_chart(&ranked, 2, false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(BAR_CHAR));
        assert!(lines[0].starts_with(" 1."));
    }

    #[test]
    fn test_format_breakdown() {
        let ranked = ranked();
        let row = ranked.find("Bob Cousy").unwrap();
        let output = format_breakdown(&row, ranked.factor_columns(), false);
        assert!(output.contains("Bob Cousy"));
        assert!(output.contains("Era_Factor"));
        assert!(output.contains("x0.75"));
        assert!(output.contains("Weighted sum"));
    }
}
