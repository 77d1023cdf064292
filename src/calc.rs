/// Parses a marks-style numeric string. Blank, non-numeric and non-finite
/// input (`"NaN"`, `"inf"`) are all treated as absent.
pub fn parse_marks(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `"<x.xx>%"` with exactly two decimals. Values exactly halfway between two
/// cents round away from zero (`12.125` gives `"12.13%"`).
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", round_half_cent(value))
}

// `{:.2}` rounds exact ties to even. A binary float sits exactly on a half
// cent only when it is an odd multiple of 1/8; every other value already
// formats to its nearest cent.
fn round_half_cent(value: f64) -> f64 {
    let eighths = value * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 != 0.0 {
        (value * 100.0).round() / 100.0
    } else {
        value
    }
}

/// Percentage of `marks` out of `total_marks`, or `""` when either side is
/// missing or unparseable, or the total is zero.
pub fn calculate_percentage(marks: &str, total_marks: &str) -> String {
    let (Some(m), Some(t)) = (parse_marks(marks), parse_marks(total_marks)) else {
        return String::new();
    };
    if t == 0.0 {
        return String::new();
    }
    format_percent(m / t * 100.0)
}

/// Pass rate for the summary block. `None` when there are no students, in
/// which case the stored result is left as it is.
pub fn pass_percentage(total_students: u32, passed: u32) -> Option<String> {
    if total_students == 0 {
        return None;
    }
    Some(format_percent(
        f64::from(passed) / f64::from(total_students) * 100.0,
    ))
}

/// Integer coercion for head counts typed into the summary form.
/// Non-numeric and negative input becomes 0; fractions truncate.
pub fn parse_count(s: &str) -> u32 {
    let t = s.trim();
    if let Ok(v) = t.parse::<u32>() {
        return v;
    }
    match parse_marks(t) {
        Some(v) if v >= 0.0 => v.trunc().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

pub fn both_present(marks: &str, total_marks: &str) -> bool {
    !marks.is_empty() && !total_marks.is_empty()
}
