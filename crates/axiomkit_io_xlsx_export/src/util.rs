//! Stateless helper utilities used by the export kernel.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::conf::{C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, EnumColumnDataType};

const N_MS_PER_DAY: f64 = 86_400_000.0;
const TUP_DECIMAL_COMMA_LANGUAGES: [&str; 22] = [
    "de", "fr", "es", "it", "pt", "ru", "nl", "pl", "tr", "sv", "da", "nb", "nn", "no", "fi",
    "cs", "sk", "hu", "ro", "id", "uk", "el",
];
const TUP_DATETIME_TEXT_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Backend-ready cell payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellOutput {
    /// Explicit cell without value.
    Blank,
    /// Text cell.
    Text(String),
    /// Numeric cell (numbers, date serials).
    Number(f64),
    /// Boolean cell.
    Boolean(bool),
}

/// Text rendering convention derived from the locale option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumTextLocale {
    /// `.` decimal separator.
    #[default]
    Invariant,
    /// `,` decimal separator.
    DecimalComma,
}

/// Resolve a locale tag (`de-DE`, `fr_FR`, `invariant`, ...) to a text convention.
pub fn derive_text_locale(locale: &str) -> EnumTextLocale {
    let c_lang = locale
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if TUP_DECIMAL_COMMA_LANGUAGES.contains(&c_lang.as_str()) {
        EnumTextLocale::DecimalComma
    } else {
        EnumTextLocale::Invariant
    }
}

/// Render any value as cell text.
pub fn derive_text_from_value(value: &EnumCellValue, locale: EnumTextLocale) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(s) => s.clone(),
        EnumCellValue::Number(n) => {
            let c_text = n.to_string();
            match locale {
                EnumTextLocale::Invariant => c_text,
                EnumTextLocale::DecimalComma => c_text.replace('.', ","),
            }
        }
        EnumCellValue::Integer(n) => n.to_string(),
        EnumCellValue::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
        EnumCellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        EnumCellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Convert one non-null value to the payload its column type implies.
///
/// Returns `Err` with a reason when the value has no representation in
/// that type; callers fall back to text.
pub fn convert_cell_value(
    value: &EnumCellValue,
    data_type: EnumColumnDataType,
    locale: EnumTextLocale,
) -> Result<EnumCellOutput, String> {
    if value.is_none() {
        return Ok(EnumCellOutput::Blank);
    }

    match data_type {
        EnumColumnDataType::Number
        | EnumColumnDataType::Currency
        | EnumColumnDataType::Percentage => match value {
            EnumCellValue::Number(n) if n.is_finite() => Ok(EnumCellOutput::Number(*n)),
            EnumCellValue::Integer(n) => Ok(EnumCellOutput::Number(*n as f64)),
            EnumCellValue::Boolean(b) => Ok(EnumCellOutput::Number(if *b { 1.0 } else { 0.0 })),
            EnumCellValue::String(s) => parse_number_text(s, locale)
                .map(EnumCellOutput::Number)
                .ok_or_else(|| format!("{s:?} is not a number")),
            _ => Err(format!("{value:?} is not a finite number")),
        },
        EnumColumnDataType::DateTime => {
            let n_serial = match value {
                EnumCellValue::DateTime(dt) => derive_excel_serial_from_datetime(dt),
                EnumCellValue::Date(d) => derive_excel_serial_from_date(d),
                EnumCellValue::Number(n) if n.is_finite() && *n >= 0.0 => Some(*n),
                EnumCellValue::Integer(n) if *n >= 0 => Some(*n as f64),
                EnumCellValue::String(s) => {
                    parse_datetime_text(s).and_then(|dt| derive_excel_serial_from_datetime(&dt))
                }
                _ => None,
            };
            n_serial
                .map(EnumCellOutput::Number)
                .ok_or_else(|| format!("{value:?} is not a date after 1899-12-30"))
        }
        EnumColumnDataType::Boolean => match value {
            EnumCellValue::Boolean(b) => Ok(EnumCellOutput::Boolean(*b)),
            EnumCellValue::Integer(n) => Ok(EnumCellOutput::Boolean(*n != 0)),
            EnumCellValue::Number(n) if n.is_finite() => Ok(EnumCellOutput::Boolean(*n != 0.0)),
            EnumCellValue::String(s) => parse_bool_text(s)
                .map(EnumCellOutput::Boolean)
                .ok_or_else(|| format!("{s:?} is not a boolean")),
            _ => Err(format!("{value:?} is not a boolean")),
        },
        EnumColumnDataType::String => Ok(EnumCellOutput::Text(derive_text_from_value(
            value, locale,
        ))),
    }
}

fn parse_number_text(s: &str, locale: EnumTextLocale) -> Option<f64> {
    let c_text = s.trim();
    let n_value = c_text.parse::<f64>().ok().or_else(|| match locale {
        EnumTextLocale::DecimalComma => c_text.replace(',', ".").parse::<f64>().ok(),
        EnumTextLocale::Invariant => None,
    })?;
    n_value.is_finite().then_some(n_value)
}

/// Parse boolean text (`true/false/1/0/yes/no`, case-insensitive).
pub fn parse_bool_text(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse date/time text: RFC 3339, ISO date-time or ISO date.
pub fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let c_text = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(c_text) {
        return Some(dt.naive_local());
    }
    for c_fmt in TUP_DATETIME_TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(c_text, c_fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(c_text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateSerials

fn derive_excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Spreadsheet date serial: whole days since 1899-12-30 plus day fraction.
///
/// `None` for instants before the epoch.
pub fn derive_excel_serial_from_datetime(dt: &NaiveDateTime) -> Option<f64> {
    let dt_epoch = derive_excel_epoch()?;
    let n_ms = dt.signed_duration_since(dt_epoch).num_milliseconds();
    if n_ms < 0 {
        return None;
    }
    Some(n_ms as f64 / N_MS_PER_DAY)
}

/// Date serial of midnight of `d`.
pub fn derive_excel_serial_from_date(d: &NaiveDate) -> Option<f64> {
    derive_excel_serial_from_datetime(&d.and_hms_opt(0, 0, 0)?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Grouping

/// Null-safe equality used by adjacency grouping (`NaN` equals `NaN`).
pub fn is_group_value_equal(a: &EnumCellValue, b: &EnumCellValue) -> bool {
    match (a, b) {
        (EnumCellValue::Number(x), EnumCellValue::Number(y)) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        _ => a == b,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').trim().to_string();
    if c_name.is_empty() {
        c_name = C_SHEET_NAME_DEFAULT.to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Name of worksheet `n_idx_sheet_1based`: the base for the first sheet,
/// `base (k)` afterwards, with the base shortened to respect the length cap.
pub fn create_sheet_identifier(base_name: &str, n_idx_sheet_1based: usize) -> String {
    if n_idx_sheet_1based <= 1 {
        return base_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    }

    let c_sheet_name_suffix = format!(" ({n_idx_sheet_1based})");
    let n_len_base_name_max =
        N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.chars().count());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{}{c_sheet_name_suffix}", c_sheet_name_base.trim_end())
}

/// Spreadsheet column letters for a 1-based index (1 → `A`, 27 → `AA`).
pub fn derive_column_letters(n_col_1based: usize) -> String {
    let mut l_letters = Vec::new();
    let mut n_dividend = n_col_1based;
    while n_dividend > 0 {
        let n_modulo = (n_dividend - 1) % 26;
        l_letters.push((b'A' + n_modulo as u8) as char);
        n_dividend = (n_dividend - n_modulo - 1) / 26;
    }
    l_letters.iter().rev().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ArtifactNaming

/// Insert `_partNN` before the extension of `file_name`.
pub fn derive_part_file_name(file_name: &str, n_part_1based: usize) -> String {
    let c_suffix = format!("_part{n_part_1based:02}");
    match file_name.rfind('.') {
        Some(n_pos) if n_pos > 0 => {
            format!("{}{c_suffix}{}", &file_name[..n_pos], &file_name[n_pos..])
        }
        _ => format!("{file_name}{c_suffix}"),
    }
}

/// Normalize a 6- or 8-digit hex color (optional `#`, ARGB for 8 digits) to `#RRGGBB`.
///
/// Blank or malformed input yields `None`.
pub fn parse_hex_color(value: &str) -> Option<String> {
    let c_hex = value.trim().trim_start_matches('#');
    if !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return None;
    }
    let c_rgb = match c_hex.len() {
        6 => c_hex,
        8 => &c_hex[2..],
        _ => return None,
    };
    Some(format!("#{}", c_rgb.to_ascii_uppercase()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_column_letters_is_bijective_base26() {
        assert_eq!(derive_column_letters(1), "A");
        assert_eq!(derive_column_letters(26), "Z");
        assert_eq!(derive_column_letters(27), "AA");
        assert_eq!(derive_column_letters(52), "AZ");
        assert_eq!(derive_column_letters(53), "BA");
        assert_eq!(derive_column_letters(702), "ZZ");
        assert_eq!(derive_column_letters(703), "AAA");
        assert_eq!(derive_column_letters(16_384), "XFD");
    }

    #[test]
    fn test_create_sheet_identifier_respects_length_cap() {
        let c_long = "A".repeat(40);
        assert_eq!(create_sheet_identifier("Sales", 1), "Sales");
        assert_eq!(create_sheet_identifier("Sales", 2), "Sales (2)");
        assert_eq!(create_sheet_identifier(&c_long, 1), "A".repeat(31));

        let c_second = create_sheet_identifier(&c_long, 2);
        assert_eq!(c_second, format!("{} (2)", "A".repeat(27)));
        assert_eq!(c_second.chars().count(), 31);

        let c_twelfth = create_sheet_identifier(&c_long, 12);
        assert_eq!(c_twelfth, format!("{} (12)", "A".repeat(26)));
        assert_eq!(c_twelfth.chars().count(), 31);
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]", "_"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("  'quoted'  ", "_"), "quoted");
        assert_eq!(sanitize_sheet_name("   ", "_"), C_SHEET_NAME_DEFAULT);
    }

    #[test]
    fn test_derive_part_file_name() {
        assert_eq!(
            derive_part_file_name("orders_20240101_20240102_101500.xlsx", 1),
            "orders_20240101_20240102_101500_part01.xlsx"
        );
        assert_eq!(derive_part_file_name("orders.xlsx", 12), "orders_part12.xlsx");
        assert_eq!(derive_part_file_name("orders", 3), "orders_part03");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("1f4e79"), Some("#1F4E79".to_string()));
        assert_eq!(parse_hex_color("#FFFFFF"), Some("#FFFFFF".to_string()));
        assert_eq!(parse_hex_color("FF1F4E79"), Some("#1F4E79".to_string()));
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("   "), None);
        assert_eq!(parse_hex_color("12345"), None);
        assert_eq!(parse_hex_color("GGGGGG"), None);
        assert_eq!(parse_hex_color("red"), None);
    }

    #[test]
    fn test_excel_serial_matches_known_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(derive_excel_serial_from_date(&d), Some(45_292.0));

        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(derive_excel_serial_from_datetime(&dt), Some(45_306.5));

        let d_before = NaiveDate::from_ymd_opt(1899, 12, 1).unwrap();
        assert_eq!(derive_excel_serial_from_date(&d_before), None);
    }

    #[test]
    fn test_convert_cell_value_by_type() {
        let locale = EnumTextLocale::Invariant;
        assert_eq!(
            convert_cell_value(&EnumCellValue::from("3.5"), EnumColumnDataType::Number, locale),
            Ok(EnumCellOutput::Number(3.5))
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Integer(7), EnumColumnDataType::Currency, locale),
            Ok(EnumCellOutput::Number(7.0))
        );
        assert_eq!(
            convert_cell_value(
                &EnumCellValue::from("2024-01-15 12:00:00"),
                EnumColumnDataType::DateTime,
                locale
            ),
            Ok(EnumCellOutput::Number(45_306.5))
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::from("No"), EnumColumnDataType::Boolean, locale),
            Ok(EnumCellOutput::Boolean(false))
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Boolean(true), EnumColumnDataType::String, locale),
            Ok(EnumCellOutput::Text("True".to_string()))
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::None, EnumColumnDataType::Number, locale),
            Ok(EnumCellOutput::Blank)
        );
        assert!(
            convert_cell_value(&EnumCellValue::from("abc"), EnumColumnDataType::Number, locale)
                .is_err()
        );
        assert!(
            convert_cell_value(
                &EnumCellValue::Number(f64::NAN),
                EnumColumnDataType::Number,
                locale
            )
            .is_err()
        );
    }

    #[test]
    fn test_locale_controls_decimal_separator() {
        assert_eq!(derive_text_locale("de-DE"), EnumTextLocale::DecimalComma);
        assert_eq!(derive_text_locale("fr_FR"), EnumTextLocale::DecimalComma);
        assert_eq!(derive_text_locale("en-US"), EnumTextLocale::Invariant);
        assert_eq!(derive_text_locale("invariant"), EnumTextLocale::Invariant);

        let value = EnumCellValue::Number(1234.5);
        assert_eq!(
            derive_text_from_value(&value, EnumTextLocale::DecimalComma),
            "1234,5"
        );
        assert_eq!(
            convert_cell_value(
                &EnumCellValue::from("2,5"),
                EnumColumnDataType::Number,
                EnumTextLocale::DecimalComma
            ),
            Ok(EnumCellOutput::Number(2.5))
        );
    }

    #[test]
    fn test_is_group_value_equal_is_null_safe() {
        assert!(is_group_value_equal(&EnumCellValue::None, &EnumCellValue::None));
        assert!(is_group_value_equal(
            &EnumCellValue::Number(f64::NAN),
            &EnumCellValue::Number(f64::NAN)
        ));
        assert!(!is_group_value_equal(
            &EnumCellValue::None,
            &EnumCellValue::from("")
        ));
        assert!(!is_group_value_equal(
            &EnumCellValue::from("a"),
            &EnumCellValue::from("A")
        ));
    }
}
