/// Formats seconds as `HH:MM:SS.mmm`.
pub fn time_str(sec: f64) -> String {
    ms_str((sec * 1000f64).max(0.0) as u64)
}

/// Formats milliseconds as `HH:MM:SS.mmm`; hours widen past 99.
pub fn ms_str(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let milliseconds = ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(ms_str(0), "00:00:00.000");
        assert_eq!(ms_str(3_723_004), "01:02:03.004");
        assert_eq!(ms_str(360_000_000), "100:00:00.000");
        assert_eq!(time_str(1.5), "00:00:01.500");
        assert_eq!(time_str(-2.0), "00:00:00.000");
    }
}
