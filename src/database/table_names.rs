pub const USER_TABLE_NAME: &str = "user";
pub const VIDEO_TABLE_NAME: &str = "video";
pub const COMMENT_TABLE_NAME: &str = "comment";
pub const TWEET_TABLE_NAME: &str = "tweet";
pub const PLAYLIST_TABLE_NAME: &str = "playlist";
pub const LIKE_TABLE_NAME: &str = "like";
pub const SUBSCRIPTION_TABLE_NAME: &str = "subscription";

pub const ALL_TABLE_NAMES: [&str; 7] = [
    USER_TABLE_NAME,
    VIDEO_TABLE_NAME,
    COMMENT_TABLE_NAME,
    TWEET_TABLE_NAME,
    PLAYLIST_TABLE_NAME,
    LIKE_TABLE_NAME,
    SUBSCRIPTION_TABLE_NAME,
];
