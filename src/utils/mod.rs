pub mod dir_utils;
pub mod file;
pub mod jwt;
