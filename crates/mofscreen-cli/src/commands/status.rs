use crate::error::CliError;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};
use mofscreen_core::config::Config;
use mofscreen_core::model::JobState;
use mofscreen_scheduler::SlurmScheduler;
use mofscreen_tracker::{CampaignTracker, TrackingStore};

/// `mofscreen status`: print the tracking table. With `--update`, query the
/// scheduler and reconcile before printing.
pub fn handle_status(config: &Config, update: bool) -> Result<(), CliError> {
    let mut store = TrackingStore::open(&TrackingStore::default_path(config))?;

    if update {
        let scheduler = SlurmScheduler::new();
        CampaignTracker::new(config, &scheduler).poll_once(&mut store)?;
        store.save()?;
    }

    if store.rows().is_empty() {
        println!("No tracked jobs yet.");
        return Ok(());
    }

    println!("{}", render_table(&store));
    println!("{}", render_summary(&store));
    Ok(())
}

fn render_table(store: &TrackingStore) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Unit").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Job ID").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Status").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Submitted").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Completed").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Stage").add_attribute(Attribute::Bold).fg(Color::Cyan),
        ]);

    for row in store.rows() {
        table.add_row(vec![
            Cell::new(row.unit.to_string()).fg(Color::Yellow),
            Cell::new(row.job_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-")),
            Cell::new(row.status.to_string()).fg(status_color(row.status)),
            Cell::new(format_time(&row.submitted_at)),
            Cell::new(format_time(&row.completed_at)),
            Cell::new(&row.stage),
        ]);
    }

    table.to_string()
}

fn render_summary(store: &TrackingStore) -> String {
    let mut counts = [0usize; 6];
    for unit in store.units() {
        if let Some(record) = store.active(&unit) {
            counts[status_index(record.status)] += 1;
        }
    }
    format!(
        "{} units: {} completed, {} running, {} pending, {} failed, {} partially complete",
        store.units().len(),
        counts[status_index(JobState::Completed)],
        counts[status_index(JobState::Running)],
        counts[status_index(JobState::Pending)],
        counts[status_index(JobState::Failed)],
        counts[status_index(JobState::PartiallyComplete)],
    )
}

fn status_index(status: JobState) -> usize {
    match status {
        JobState::Pending => 0,
        JobState::Running => 1,
        JobState::Completed => 2,
        JobState::Failed => 3,
        JobState::PartiallyComplete => 4,
        JobState::Cancelled => 5,
    }
}

fn status_color(status: JobState) -> Color {
    match status {
        JobState::Completed => Color::Green,
        JobState::Running => Color::Cyan,
        JobState::Pending => Color::White,
        JobState::Failed => Color::Red,
        JobState::PartiallyComplete => Color::Yellow,
        JobState::Cancelled => Color::DarkGrey,
    }
}

fn format_time(time: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
