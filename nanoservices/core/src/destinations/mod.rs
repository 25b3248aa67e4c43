pub mod table;
pub mod traits;
