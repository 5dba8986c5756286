//! Display formatting for durations.

/// Format milliseconds as "MM:SS", or "H:MM:SS" from one hour up.
///
/// Seconds round up so a countdown never shows 00:00 while time remains.
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms.div_ceil(1000);
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Format milliseconds as "HH:MM:SS.cs" (centiseconds), for stopwatch laps.
pub fn format_precise(ms: u64) -> String {
    let total_secs = ms / 1000;
    let cs = (ms % 1000) / 10;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}.{cs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(1), "00:01");
        assert_eq!(format_clock(61_000), "01:01");
        assert_eq!(format_clock(3_661_000), "1:01:01");
    }

    #[test]
    fn test_format_precise() {
        assert_eq!(format_precise(0), "00:00:00.00");
        assert_eq!(format_precise(5_678), "00:00:05.67");
        assert_eq!(format_precise(3_661_990), "01:01:01.99");
    }
}
