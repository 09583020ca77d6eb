pub mod analysis;
pub mod error;
pub mod image_kind;
pub mod job;
pub mod layout;

pub use analysis::{AnalysisResult, TemplateMetadata, ThumbnailInfo};
pub use image_kind::{ImageExt, ImageRef};
pub use job::{AnalysisConfig, Job, JobInputs};
pub use layout::LayoutInstructions;
