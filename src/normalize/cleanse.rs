//! Cell-level parsing and identifier cleansing.

use chrono::NaiveDate;

/// Canonical form of an area (or tag) name.
///
/// Non-breaking and other exotic spaces become plain spaces, control and
/// zero-width characters are removed, runs of whitespace collapse to one
/// space, and the result is trimmed. Letter case is preserved.
pub fn clean_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        if is_invisible(ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

fn is_invisible(ch: char) -> bool {
    // `char::is_whitespace` covers U+00A0 and friends; these are not whitespace
    // but still show up in exported names.
    (ch.is_control() && !ch.is_whitespace())
        || matches!(ch, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{feff}' | '\u{ad}')
}

/// Parse a date cell with the source's exact format. The whole cell must match.
pub fn parse_date(s: &str, format: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), format)
        .map_err(|e| format!("invalid date '{s}' (expected format `{format}`): {e}"))
}

/// Parse a count cell. Integral floats (`"12.0"`) are accepted; anything
/// else that is not an integer is rejected.
pub fn parse_count(s: &str) -> Result<i64, String> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(v as i64),
        _ => Err(format!("invalid count '{s}'")),
    }
}

/// Parse a population cell: a non-negative count.
pub fn parse_population(s: &str) -> Result<u64, String> {
    let v = parse_count(s)?;
    u64::try_from(v).map_err(|_| format!("negative population '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nbsp_and_zero_width() {
        assert_eq!(clean_identifier("Alt\u{a0}Empordà"), "Alt Empordà");
        assert_eq!(clean_identifier("\u{feff} Barcelonès\u{200b} "), "Barcelonès");
        assert_eq!(clean_identifier("Vallès   Occidental"), "Vallès Occidental");
        assert_eq!(clean_identifier("ΘΕΣΣΑΛΟΝΙΚΗΣ"), "ΘΕΣΣΑΛΟΝΙΚΗΣ");
    }

    #[test]
    fn same_logical_area_yields_same_key() {
        assert_eq!(clean_identifier("Pla d'Urgell\u{a0}"), clean_identifier(" Pla d'Urgell"));
    }

    #[test]
    fn parses_dates_strictly() {
        let d = parse_date("05/06/2020", "%d/%m/%Y").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2020, 6, 5).unwrap());
        assert!(parse_date("2020-06-05", "%d/%m/%Y").is_err());
        assert!(parse_date("05/06/2020 trailing", "%d/%m/%Y").is_err());
        let d = parse_date("1/15/21", "%m/%d/%y").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2021, 1, 15).unwrap());
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("12"), Ok(12));
        assert_eq!(parse_count(" 12.0 "), Ok(12));
        assert_eq!(parse_count("-3"), Ok(-3));
        assert!(parse_count("12.5").is_err());
        assert!(parse_count("n/a").is_err());
        assert!(parse_population("-1").is_err());
    }
}
