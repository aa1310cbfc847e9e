/// Options governing how an input file is read. All fields come from CLI
/// arguments; the defaults match reading a plain comma-separated file.
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// CSV field delimiter.
    pub delimiter: u8,

    /// Column placed first in the header when reading JSON input. Required
    /// for JSON; ignored for CSV.
    pub payload_key_column: Option<String>,

    /// Fail instead of keeping the last occurrence when a CSV header repeats
    /// a column name.
    pub fail_on_duplicate_columns: bool,

    /// Columns that must exist in the header and be non-empty in every row.
    pub mandatory_columns: Vec<String>,
}

impl Default for ReadConfig {
    fn default() -> Self {
        ReadConfig {
            delimiter: b',',
            payload_key_column: None,
            fail_on_duplicate_columns: false,
            mandatory_columns: Vec::new(),
        }
    }
}
