/// Formats minor units with `decimals` places, e.g. `-1250` with 2 places
/// as `-12.50`.
#[must_use]
pub fn format_amount(minor: i64, decimals: u32) -> String {
    if decimals == 0 {
        return minor.to_string();
    }
    let scale = 10_u64.pow(decimals);
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = decimals as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_decimals() {
        assert_eq!(format_amount(500, 2), "5.00");
        assert_eq!(format_amount(-1250, 2), "-12.50");
        assert_eq!(format_amount(7, 3), "0.007");
        assert_eq!(format_amount(42, 0), "42");
    }
}
