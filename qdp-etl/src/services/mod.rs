//! Pipeline services

pub mod duplicate_detector;
pub mod export_client;
pub mod export_files;
pub mod loader;
pub mod mapping_fetcher;
pub mod pipeline;
pub mod qualtrics_api;
pub mod transformer;

pub use duplicate_detector::{DuplicateCheck, DuplicateDetector};
pub use export_client::{ExportClient, ExportedFile, PollSettings};
pub use loader::{DataLoader, LoadOptions};
pub use mapping_fetcher::MappingFetcher;
pub use pipeline::{PipelineOptions, SurveyPipeline};
pub use qualtrics_api::QualtricsApi;
pub use transformer::Transformer;
