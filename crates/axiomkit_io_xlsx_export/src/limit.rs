//! Per-worksheet data-row cap.

/// Counts data rows admitted to one worksheet against its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRowLimiter {
    /// Data rows one worksheet may hold.
    pub n_rows_data_max: usize,
    /// Data rows admitted so far.
    pub n_rows_data_written: usize,
}

impl SpecRowLimiter {
    pub fn new(n_rows_data_max: usize) -> Self {
        Self {
            n_rows_data_max,
            n_rows_data_written: 0,
        }
    }

    /// Reserve room for one more row; `false` once the sheet is full.
    pub fn admit(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.n_rows_data_written += 1;
        true
    }

    /// Whether the cap is reached.
    pub fn is_full(&self) -> bool {
        self.n_rows_data_written >= self.n_rows_data_max
    }
}

/// Number of worksheets (or files) needed for `n_rows_data` rows.
///
/// An empty input still occupies one worksheet.
pub fn calculate_chunk_count(n_rows_data: usize, n_rows_data_max: usize) -> usize {
    if n_rows_data == 0 || n_rows_data_max == 0 {
        return 1;
    }
    n_rows_data.div_ceil(n_rows_data_max)
}
