pub mod errors;
pub mod fs_ops;
pub mod time;
