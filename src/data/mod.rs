//! Dataset construction and feature engineering

pub mod dataset;
pub mod features;

pub use dataset::DatasetBuilder;
pub use features::FeatureTransformer;
