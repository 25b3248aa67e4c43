pub mod csv_glob;
pub mod table;
pub mod traits;
