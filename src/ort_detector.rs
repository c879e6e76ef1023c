use crate::detector::{Detection, Detector, DetectorError};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.7;

fn intersection(box1: &Detection, box2: &Detection) -> f32 {
    (box1.xyxy[2].min(box2.xyxy[2]) - box1.xyxy[0].max(box2.xyxy[0]))
        * (box1.xyxy[3].min(box2.xyxy[3]) - box1.xyxy[1].max(box2.xyxy[1]))
}

fn union(box1: &Detection, box2: &Detection) -> f32 {
    ((box1.xyxy[2] - box1.xyxy[0]) * (box1.xyxy[3] - box1.xyxy[1]))
        + ((box2.xyxy[2] - box2.xyxy[0]) * (box2.xyxy[3] - box2.xyxy[1]))
        - intersection(box1, box2)
}

fn image_to_input(image: &DynamicImage) -> (Array<f32, Ix4>, u32, u32) {
    let (img_width, img_height) = image.dimensions();
    let img = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, img_height, img_width)
}

/// One YOLO model behind an ONNX Runtime session.
pub struct OrtDetector {
    session: Session,
    class_labels: Vec<String>,
    min_probability: f32,
}

impl OrtDetector {
    pub fn new(
        model_path: &Path,
        labels_path: &Path,
        min_probability: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;
        let class_labels = load_class_labels(labels_path)?;

        Ok(Self {
            session,
            class_labels,
            min_probability,
        })
    }

    fn run_inference(
        &mut self,
        input: &Array<f32, Ix4>,
    ) -> Result<ndarray::ArrayD<f32>, DetectorError> {
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| DetectorError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = self
            .session
            .run(input_tensor)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(format!("failed to extract tensor: {}", e)))?;

        let ix = shape.to_ixdyn();
        let array = ndarray::ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectorError::Inference(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }

    fn label_for(&self, class_id: usize) -> String {
        self.class_labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("unknown class {}", class_id))
    }
}

impl Detector for OrtDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let (input, img_height, img_width) = image_to_input(image);
        let outputs = self.run_inference(&input)?;

        let mut boxes = Vec::new();
        let output = outputs.slice(s![0, .., ..]);

        for anchor in output.axis_iter(Axis(1)) {
            let row: Vec<_> = anchor.iter().copied().collect();
            let Some((class_id, prob)) = row
                .iter()
                .skip(4)
                .enumerate()
                .map(|(index, value)| (index, *value))
                .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
            else {
                continue;
            };

            if prob < self.min_probability {
                continue;
            }

            let xc = row[0] / INPUT_SIZE as f32 * (img_width as f32);
            let yc = row[1] / INPUT_SIZE as f32 * (img_height as f32);
            let w = row[2] / INPUT_SIZE as f32 * (img_width as f32);
            let h = row[3] / INPUT_SIZE as f32 * (img_height as f32);

            boxes.push(Detection {
                cls: self.label_for(class_id),
                conf: prob,
                xyxy: [xc - w / 2., yc - h / 2., xc + w / 2., yc + h / 2.],
            });
        }

        boxes.sort_by(|box1, box2| box2.conf.total_cmp(&box1.conf));
        let mut result = Vec::new();

        while !boxes.is_empty() {
            let best = boxes[0].clone();
            boxes = boxes
                .iter()
                .filter(|box1| intersection(&best, box1) / union(&best, box1) < IOU_THRESHOLD)
                .cloned()
                .collect();
            result.push(best);
        }

        Ok(result)
    }
}

pub fn load_class_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }

    Ok(labels)
}
