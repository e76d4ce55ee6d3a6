pub mod batch;
pub mod bincodec;
