//! Duration rendering

/// `125` -> `"2m 5s"`
pub fn format_time(seconds: u64) -> String {
    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// `125` -> `"02:05"`
pub fn format_time_display(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
