pub mod batch;
pub mod rename;
pub mod template;

pub use batch::{upload_batch, BatchProgressCallback, UploadSource};
pub use rename::{compute_key, storage_key, DateFormat, HashAlgorithm, RenameOutcome, RenamePolicy};
pub use template::{build_url, resolve, resolve_all, ResolvedUrl};
