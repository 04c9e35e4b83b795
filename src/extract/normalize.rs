//! Text → value rules for the noisy strings product pages carry.

use std::sync::LazyLock;

use regex::Regex;

static NOT_NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\d.]").unwrap());

/// Everything before the first `unit`, trimmed: `"1770 rpm"` → `"1770"`.
pub fn strip_unit(raw: &str, unit: &str) -> String {
    raw.split(unit).next().unwrap_or_default().trim().to_string()
}

/// Multi-line electrical rating → slash-joined values.
/// `"230V\n460V"` → `"230/460"`. Lines without a `V` are ignored, and so
/// is a bare `V` line: it never yields an empty `//` segment.
pub fn voltage(raw: &str) -> String {
    raw.lines()
        .filter(|line| line.contains('V'))
        .map(|line| line.split('V').next().unwrap_or_default().trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `"5.5 HP @ 60Hz"` → `5`. The rated-at suffix and the unit are cut
/// before the decimal is parsed and truncated.
pub fn horsepower(raw: &str) -> Option<i64> {
    let value = raw.split('@').next().unwrap_or_default();
    let value = value.split("HP").next().unwrap_or_default();
    truncate_decimal(value.trim())
}

/// `"12 pcs."` → `12`. Every char except digits and `.` is dropped first.
pub fn quantity(raw: &str) -> Option<i64> {
    let cleaned = NOT_NUMERIC_RE.replace_all(raw, "");
    truncate_decimal(&cleaned)
}

fn truncate_decimal(s: &str) -> Option<i64> {
    let n: f64 = s.parse().ok()?;
    if !n.is_finite() || n.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(n.trunc() as i64)
}
