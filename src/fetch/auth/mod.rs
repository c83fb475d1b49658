//! Credential-injecting [`HttpClient`](crate::fetch::HttpClient) wrappers.

mod key_param;

pub use key_param::KeyParam;
