pub mod aws_signer;

// Re-export the signing entry points
pub use aws_signer::{
    generate_aws_presigned_url, parse_authorization, sign, ParsedAuthorization, Payload,
    SignedRequestSpec, SigningResult, S3_SERVICE,
};
