pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub(crate) const DEFAULT_PUBLIC_DIR: &str = "./public";

/// Payload of blocks appended through `POST /mine`.
pub(crate) const MINE_PLACEHOLDER_DATA: &str = "Empty Data";
/// Payload used by `POST /add-data` when the body carries no `data`.
pub(crate) const ADD_DATA_DEFAULT: &str = "No Data";

pub(crate) const MSG_BLOCK_MINED: &str = "Block mined!";
pub(crate) const MSG_BLOCK_WITH_DATA_MINED: &str = "Block with data mined!";
