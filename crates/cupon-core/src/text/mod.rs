//! Text preparation shared by both extraction pipelines.

pub mod classifier;
pub mod normalize;

pub use classifier::{TextQualityClassifier, TextStats};
pub use normalize::{collapse_whitespace, digits_only, normalize};
