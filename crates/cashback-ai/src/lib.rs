//! AI inference layer: remote vision-language model calls and the image preprocessing they need.

mod preprocess;
pub use preprocess::{DEFAULT_TARGET_SIZE, ImageError, prepare_image, scaled_dimensions};

mod vision;
pub use vision::{OpenAiVision, SamplingParams, VisionError, VisionModel, VisionRequest};
