pub mod chunk_size;
pub mod crypto;
pub mod http_downloader;
pub mod path_utils;
