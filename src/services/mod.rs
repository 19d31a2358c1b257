//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - URL and anchor scope filtering (`scope`)
//! - Page fetching (`HttpFetcher`)
//! - Content reduction (`reducer`)
//! - Classification (`LlmClassifier` over an `OpenAiChatClient`)
//! - Site traversal (`FrontierTraversal`)

pub mod classifier;
pub mod fetcher;
pub mod llm;
pub mod reducer;
pub mod scope;
pub mod traversal;

pub use classifier::{Classifier, LlmClassifier, ProfileRequest};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use llm::{ChatModel, OpenAiChatClient};
pub use traversal::{Frontier, FrontierTraversal, VisitedSet};
