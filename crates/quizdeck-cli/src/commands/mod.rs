pub mod cache;
pub mod index;
pub mod init;
pub mod quiz;
pub mod reset;
pub mod stats;
pub mod validate;
