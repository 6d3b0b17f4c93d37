pub mod convert;
pub mod local_file_storage;
