use crate::{
    config::{ModelsConfig, Validatable},
    detector::{Detection, Detector, DetectorError, DetectorProvider},
    ort_detector::OrtDetector,
};
use image::DynamicImage;
use std::collections::HashMap;

/// The fixed set of loaded detection models, addressed by name. Built once
/// at startup; a load failure for any configured model aborts startup.
pub struct DetectorRegistry {
    detectors: HashMap<String, Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new(detectors: HashMap<String, Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn load(models: &ModelsConfig) -> Result<Self, Box<dyn std::error::Error>> {
        models.validate()?;

        ort::init().commit()?;

        let mut detectors: HashMap<String, Box<dyn Detector>> = HashMap::new();
        for entry in &models.entries {
            let detector = OrtDetector::new(
                &models.get_model_path(entry),
                &models.get_labels_path(entry),
                entry.min_probability,
            )?;
            tracing::info!(
                model = %entry.name,
                path = ?models.get_model_path(entry),
                "loaded detection model"
            );
            detectors.insert(entry.name.clone(), Box::new(detector));
        }

        Ok(Self::new(detectors))
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl DetectorProvider for DetectorRegistry {
    fn contains(&self, model_name: &str) -> bool {
        self.detectors.contains_key(model_name)
    }

    fn detect(
        &mut self,
        model_name: &str,
        image: &DynamicImage,
    ) -> Result<Vec<Detection>, DetectorError> {
        let detector = self
            .detectors
            .get_mut(model_name)
            .ok_or_else(|| DetectorError::UnknownModel(model_name.to_string()))?;
        detector.detect(image)
    }
}
