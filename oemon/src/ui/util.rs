//! Small UI helpers: human-readable sizes, counts, truncation.

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K { return format!("{b:.0}B"); }
    let kb = b / K;
    if kb < K { return format!("{kb:.1}KB"); }
    let mb = kb / K;
    if mb < K { return format!("{mb:.1}MB"); }
    let gb = mb / K;
    if gb < K { return format!("{gb:.1}GB"); }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

/// Compact count: 950, 12.4k, 3.1M.
pub fn count(v: f64) -> String {
    let a = v.abs();
    if a < 1_000.0 { return format!("{v:.0}"); }
    if a < 1_000_000.0 { return format!("{:.1}k", v / 1_000.0); }
    format!("{:.1}M", v / 1_000_000.0)
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    let n = s.chars().count();
    if n <= max { return s.to_string(); }
    if max <= 3 { return "...".into(); }
    let keep = max - 3;
    let left: String = s.chars().take(keep / 2).collect();
    let right: String = s.chars().skip(n - (keep - keep / 2)).collect();
    format!("{left}...{right}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_sizes() {
        assert_eq!(human(512), "512B");
        assert_eq!(human(2048), "2.0KB");
        assert_eq!(human(5 * 1024 * 1024), "5.0MB");
    }

    #[test]
    fn counts() {
        assert_eq!(count(950.0), "950");
        assert_eq!(count(12_400.0), "12.4k");
        assert_eq!(count(3_100_000.0), "3.1M");
    }

    #[test]
    fn truncation_keeps_both_ends() {
        assert_eq!(truncate_middle("abcdefghij", 7), "ab...ij");
        assert_eq!(truncate_middle("short", 10), "short");
        assert_eq!(truncate_middle("ßßßßßßßß", 5), "ß...ß");
    }
}
