//! Console rendering of scores and statistics.

use comfy_table::{Cell, Table};

use quizdeck_core::statistics::{Score, Statistics};

pub fn score_line(score: &Score) -> String {
    format!("Score: {}/{} ({}%)", score.correct, score.total, score.percentage)
}

pub fn seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

pub fn summary_table(stats: &Statistics) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Answered",
        "Correct",
        "Incorrect",
        "Skipped",
        "Accuracy",
        "Streak",
        "Best streak",
        "Avg time",
    ]);
    table.add_row(vec![
        Cell::new(stats.answered),
        Cell::new(stats.correct),
        Cell::new(stats.incorrect),
        Cell::new(stats.skipped),
        Cell::new(format!("{:.1}%", stats.accuracy * 100.0)),
        Cell::new(stats.current_streak),
        Cell::new(stats.max_streak),
        Cell::new(seconds(stats.average_time_ms)),
    ]);
    table
}

pub fn subject_table(stats: &Statistics) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Subject",
        "Answered",
        "Correct",
        "Incorrect",
        "Ungraded",
        "Accuracy",
    ]);
    for (subject, s) in &stats.by_subject {
        table.add_row(vec![
            Cell::new(subject),
            Cell::new(s.answered),
            Cell::new(s.correct),
            Cell::new(s.incorrect),
            Cell::new(s.ungraded),
            Cell::new(format!("{:.1}%", s.accuracy * 100.0)),
        ]);
    }
    table
}

pub fn print_statistics(score: &Score, stats: &Statistics) {
    println!("{}", score_line(score));
    println!("{}", summary_table(stats));
    if !stats.by_subject.is_empty() {
        println!("{}", subject_table(stats));
    }
}
