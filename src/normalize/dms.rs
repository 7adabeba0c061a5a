//! Sexagesimal (degrees, minutes, seconds) coordinate parsing.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::InputError;

/// `DD°MM'SS.S"H DDD°MM'SS.S"H`, latitude first
static DMS_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    let component = r#"(\d{1,3})\s*[°º]\s*(\d{1,2})\s*['′’]\s*(\d{1,2}(?:[.,]\d+)?)\s*(?:"|''|″|”)"#;
    Regex::new(&format!(
        r"^\s*{component}\s*([NnSs])\s*[,;]?\s*{component}\s*([EeWwLlOo])\s*$"
    ))
    .expect("valid regex")
});

/// Parse a DMS pair into `(lat, lon)` decimal degrees.
///
/// Only the grammar is checked here; range validation happens when the
/// point is canonicalized.
pub fn parse_dms(text: &str) -> Result<(f64, f64), InputError> {
    let captures = DMS_PAIR.captures(text).ok_or_else(|| {
        InputError::parse(text, r#"expected DD°MM'SS.S"H DDD°MM'SS.S"H"#)
    })?;

    let lat = component(text, &captures, 1)?;
    let lon = component(text, &captures, 5)?;

    let lat = match &captures[4] {
        "S" | "s" => -lat,
        _ => lat,
    };
    // W (west) or O (oeste)
    let lon = match &captures[8] {
        "W" | "w" | "O" | "o" => -lon,
        _ => lon,
    };

    Ok((lat, lon))
}

/// Decimal degrees from the degree/minute/second groups starting at `first`.
fn component(text: &str, captures: &Captures<'_>, first: usize) -> Result<f64, InputError> {
    let number = |i: usize| -> Result<f64, InputError> {
        captures[i]
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| InputError::parse(text, format!("{:?} is not a number", &captures[i])))
    };

    let degrees = number(first)?;
    let minutes = number(first + 1)?;
    let seconds = number(first + 2)?;

    if minutes >= 60.0 {
        return Err(InputError::parse(text, format!("minutes must be below 60, got {minutes}")));
    }
    if seconds >= 60.0 {
        return Err(InputError::parse(text, format!("seconds must be below 60, got {seconds}")));
    }

    Ok(degrees + minutes / 60.0 + seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rio_centro() {
        let (lat, lon) = parse_dms(r#"22°54'31.1"S 43°10'46.5"W"#).unwrap();
        assert!((lat - (-22.9086)).abs() < 1e-4, "lat={}", lat);
        assert!((lon - (-43.1796)).abs() < 1e-4, "lon={}", lon);
    }

    #[test]
    fn test_parse_variants() {
        // Ordinal indicator, decimal comma, Portuguese hemisphere, comma separator
        let (lat, lon) = parse_dms("22º54'31,1''S, 43º10'46,5''O").unwrap();
        assert!((lat - (-22.9086)).abs() < 1e-4);
        assert!((lon - (-43.1796)).abs() < 1e-4);

        let (lat, lon) = parse_dms(r#"0°30'0"N 10°0'0"L"#).unwrap();
        assert!((lat - 0.5).abs() < 1e-12);
        assert!((lon - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "",
            "-22.9, -43.1",
            r#"22°54'31.1" 43°10'46.5"W"#,
            r#"22°54'31.1"W 43°10'46.5"S"#,
            r#"22°54'31.1"S"#,
        ] {
            assert!(
                matches!(parse_dms(text), Err(InputError::Parse { .. })),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_parse_rejects_minutes_over_60() {
        assert!(matches!(
            parse_dms(r#"22°61'31.1"S 43°10'46.5"W"#),
            Err(InputError::Parse { .. })
        ));
        assert!(matches!(
            parse_dms(r#"22°54'60"S 43°10'46.5"W"#),
            Err(InputError::Parse { .. })
        ));
    }

    #[test]
    fn test_latitude_over_90_passes_grammar() {
        let (lat, _) = parse_dms(r#"95°0'0"N 43°0'0"W"#).unwrap();
        assert_eq!(lat, 95.0);
    }
}
