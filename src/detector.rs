use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One labeled bounding box produced by a single model on a single image.
/// Coordinates are pixel-space corners of the decoded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub cls: String,
    pub conf: f32,
    pub xyxy: [f32; 4],
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A single loaded detection model.
pub trait Detector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Named access to the loaded model set. This is the only surface the
/// frame dispatcher sees.
pub trait DetectorProvider {
    fn contains(&self, model_name: &str) -> bool;

    fn detect(
        &mut self,
        model_name: &str,
        image: &DynamicImage,
    ) -> Result<Vec<Detection>, DetectorError>;
}
