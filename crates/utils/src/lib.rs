pub mod assets;
pub mod build_info;
pub mod response;
pub mod stream_msg;
