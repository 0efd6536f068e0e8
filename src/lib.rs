//! Article entity sentiment service.
//!
//! Fetches a news article, finds the people, organisations and places it
//! mentions, classifies the sentiment expressed towards each mention from its
//! surrounding sentence, and renders the text with the entities highlighted.

pub mod aggregate;
pub mod annotate;
pub mod api;
pub mod article;
pub mod config;
pub mod error;
pub mod ml;
pub mod page;
pub mod reconcile;
pub mod render;
pub mod segment;
pub mod summary;

pub use config::{AppConfig, ReconcileConfig};
pub use error::{AnalyzeError, MlError};
pub use reconcile::{Analysis, ArticleAnalysis, Reconciler};
