use chrono::{DateTime, Duration, Local, Utc};

/// Format a remaining lifetime for display, e.g. "1h 05m" or "expired"
pub fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes();
    if remaining <= Duration::zero() {
        "expired".to_string()
    } else if minutes < 1 {
        "under a minute".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }
}

/// Format a timestamp in local time for display
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
}

/// Show only the start of a secret, e.g. "eyJh…(812 chars)"
pub fn mask_token(token: &str) -> String {
    const VISIBLE: usize = 4;
    let total = token.chars().count();
    if total <= VISIBLE * 2 {
        "*".repeat(total)
    } else {
        let head: String = token.chars().take(VISIBLE).collect();
        format!("{}…({} chars)", head, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::minutes(-3)), "expired");
        assert_eq!(format_remaining(Duration::zero()), "expired");
        assert_eq!(format_remaining(Duration::seconds(30)), "under a minute");
        assert_eq!(format_remaining(Duration::minutes(45)), "45m");
        assert_eq!(format_remaining(Duration::minutes(65)), "1h 05m");
        assert_eq!(format_remaining(Duration::minutes(120)), "2h 00m");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "*****");
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9"), "eyJh…(20 chars)");
    }
}
