//! Artifact file naming.

use chrono::{DateTime, NaiveDate, Utc};

use crate::conf::C_XLSX_EXTENSION;

const TUP_FILE_NAME_ILLEGAL: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Composes the base file name of an export.
pub trait NamingService: Send + Sync {
    /// Build a sanitized, date-stamped file name; `Err` carries the reason.
    fn compose_name(
        &self,
        base_name: &str,
        date_data: NaiveDate,
        dt_created: DateTime<Utc>,
    ) -> Result<String, String>;
}

/// `{base}_{yyyyMMdd}_{yyyyMMdd_HHmmss}.xlsx` naming.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNamingService;

impl NamingService for FileNamingService {
    fn compose_name(
        &self,
        base_name: &str,
        date_data: NaiveDate,
        dt_created: DateTime<Utc>,
    ) -> Result<String, String> {
        let c_base_name = base_name.trim();
        if c_base_name.is_empty() {
            return Err("base name is empty.".to_string());
        }

        let c_sanitized: String = c_base_name
            .chars()
            .map(|chr| {
                if chr.is_control() || TUP_FILE_NAME_ILLEGAL.contains(&chr) {
                    '_'
                } else {
                    chr
                }
            })
            .collect();

        Ok(format!(
            "{c_sanitized}_{}_{}.{C_XLSX_EXTENSION}",
            date_data.format("%Y%m%d"),
            dt_created.format("%Y%m%d_%H%M%S")
        ))
    }
}
