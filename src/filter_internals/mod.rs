pub mod branch_opt_util;
pub mod error;
pub mod geometry;
pub mod hashing;
pub mod params;
pub mod serialization;
