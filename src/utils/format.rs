use std::time::Duration;

/// Round a coin amount to the 8 decimal places the daemon accepts.
pub fn round_to_8(amount: f64) -> f64 {
	(amount * 1e8).round() / 1e8
}

pub fn format_coins(amount: f64) -> String {
	format!("{:.8} DASH", amount)
}

/// `H:MM:SS`, truncated to whole seconds.
pub fn format_duration(duration: Duration) -> String {
	let secs = duration.as_secs();
	format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
