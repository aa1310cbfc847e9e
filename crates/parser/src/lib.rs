mod config;
mod format;

pub use self::config::ReadConfig;
pub use self::format::{read_file, Cell, ReadError, Row, RowStream, Table};
