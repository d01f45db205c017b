pub mod hash;

pub use hash::{Sha256Digest, digest_bytes, digest_file};
