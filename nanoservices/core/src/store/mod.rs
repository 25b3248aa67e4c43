pub mod db;
pub mod warehouse;
