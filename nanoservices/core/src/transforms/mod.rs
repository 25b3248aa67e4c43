pub mod dates;
pub mod fact;
pub mod hashing;
pub mod traits;
