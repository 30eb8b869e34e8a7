pub mod auth;
pub mod endpoint;
pub mod parser;

// Re-export signing
pub use auth::{generate_aws_presigned_url, sign, Payload, SignedRequestSpec, SigningResult};

// Re-export addressing and parsing
pub use endpoint::{aws_uri_encode, encode_key, Endpoint};
pub use parser::parse_list_objects_response;
