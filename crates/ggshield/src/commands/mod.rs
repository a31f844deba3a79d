pub mod common;
pub mod path;
pub mod precommit;
pub mod prepush;
pub mod prereceive;
pub mod quota;
pub mod repo;
pub mod worker;
