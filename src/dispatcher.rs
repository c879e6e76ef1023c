use crate::{
    detector::{Detection, DetectorProvider},
    protocol::{DetectionReply, ErrorRecord, FrameMessage},
    routing::CameraModelTable,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use indexmap::IndexMap;

/// Camera id reported when a frame fails before its own id is known.
const UNKNOWN_CAM_ID: &str = "unknown";

/// Runs one frame through every model assigned to its camera.
///
/// Outcomes: `Ok(Some(reply))` carries the per-model detections,
/// `Ok(None)` means the frame bytes were not a decodable image and no
/// line must be emitted, `Err` is a diagnostic tagged with the frame's
/// camera id and frame number.
pub struct FrameDispatcher<P: DetectorProvider> {
    provider: P,
}

impl<P: DetectorProvider> FrameDispatcher<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn process(
        &mut self,
        table: &CameraModelTable,
        frame: FrameMessage,
    ) -> Result<Option<DetectionReply>, ErrorRecord> {
        let cam_id = match frame.cam_id {
            Some(cam_id) => cam_id,
            None => {
                return Err(ErrorRecord::for_frame(
                    "missing camId field",
                    UNKNOWN_CAM_ID,
                    frame.frame_number,
                ))
            }
        };

        let payload = match frame.frame {
            Some(payload) => payload,
            None => {
                return Err(ErrorRecord::for_frame(
                    "missing frame field",
                    &cam_id,
                    frame.frame_number,
                ))
            }
        };

        let bytes = match BASE64.decode(payload.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(ErrorRecord::for_frame(
                    format!("invalid base64 frame: {}", e),
                    &cam_id,
                    frame.frame_number,
                ))
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!(
                    cam_id = %cam_id,
                    frame_number = frame.frame_number,
                    "dropping undecodable frame: {}",
                    e
                );
                return Ok(None);
            }
        };

        let mut results: IndexMap<String, Vec<Detection>> = IndexMap::new();
        for model_name in table.get_models(&cam_id) {
            if !self.provider.contains(model_name) {
                tracing::debug!(model = %model_name, "model not loaded, skipping");
                continue;
            }

            match self.provider.detect(model_name, &image) {
                Ok(detections) => {
                    tracing::debug!(
                        cam_id = %cam_id,
                        model = %model_name,
                        "model returned {} detections",
                        detections.len()
                    );
                    // re-inserting an existing name keeps its position but
                    // takes the later detections
                    results.insert(model_name.clone(), detections);
                }
                Err(e) => {
                    return Err(ErrorRecord::for_frame(
                        e.to_string(),
                        &cam_id,
                        frame.frame_number,
                    ))
                }
            }
        }

        Ok(Some(DetectionReply {
            cam_id,
            timestamp: frame.timestamp,
            frame_number: frame.frame_number,
            results,
        }))
    }
}
