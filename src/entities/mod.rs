pub mod association;
pub mod comment;
pub mod playlist;
pub mod tweet;
pub mod user;
pub mod video;
