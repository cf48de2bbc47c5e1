use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_CHARS: &str = "█▓░";

/// Create a spinner that reports how many input lines a streaming stage has
/// consumed. Totals are unknown up front (the GFA is read once), so this is
/// always a spinner rather than a bar.
pub fn line_spinner(label: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold.dim} {spinner:.green} [{elapsed_precise}] {pos} lines {msg}",
        )
        .unwrap(),
    );
    pb.set_prefix(label.into());
    pb.enable_steady_tick(Duration::from_millis(75));
    pb
}

/// Create a progress bar over a known number of items (communities,
/// records, …).
pub fn item_bar(label: impl Into<String>, unit_label: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = format!(
        "{{prefix:.bold.dim}} {{spinner:.green}} [{{elapsed_precise}}] {{wide_bar:.cyan/blue}} {{pos}}/{{len}} {unit_label} {{msg}}",
    );
    pb.set_style(
        ProgressStyle::with_template(&template)
            .unwrap()
            .progress_chars(BAR_CHARS),
    );
    pb.set_prefix(label.into());
    pb.enable_steady_tick(Duration::from_millis(75));
    pb
}

/// Throttled position update: refresh the spinner every `every` lines.
/// `every == 0` disables progress reporting entirely.
pub fn tick_lines(pb: &ProgressBar, line_no: u64, every: u64) {
    if every == 0 {
        return;
    }
    if line_no % every == 0 {
        pb.set_position(line_no);
    }
}
