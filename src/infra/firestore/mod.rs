//! Firestore REST implementation of [`LiveStore`](crate::services::LiveStore).

mod client;

pub use client::{FirestoreClient, parse_documents_page};
