use crate::{
    detector::DetectorProvider,
    dispatcher::FrameDispatcher,
    protocol::{ErrorRecord, Inbound, Outbound},
    routing::CameraModelTable,
};
use std::io::{BufRead, Write};

/// The message loop. Reads one JSON record per input line, handles it to
/// completion, and writes at most one line back, flushed immediately.
/// Handler failures become a diagnostic line; they never stop the loop.
pub struct Worker<P: DetectorProvider> {
    dispatcher: FrameDispatcher<P>,
    table: CameraModelTable,
}

impl<P: DetectorProvider> Worker<P> {
    pub fn new(provider: P) -> Self {
        Self {
            dispatcher: FrameDispatcher::new(provider),
            table: CameraModelTable::new(),
        }
    }

    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> std::io::Result<()> {
        for line_result in input.lines() {
            let line = line_result?;
            if let Some(reply) = self.handle_line(&line) {
                writeln!(output, "{}", reply)?;
                output.flush()?;
            }
        }

        tracing::info!("input stream closed, worker stopping");
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        let serialized = match self.handle_message(line) {
            Ok(Some(outbound)) => serde_json::to_string(&outbound),
            Ok(None) => return None,
            Err(record) => serde_json::to_string(&record),
        };

        match serialized {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::error!("failed to serialize reply: {}", e);
                serde_json::to_string(&ErrorRecord::bare(e.to_string())).ok()
            }
        }
    }

    fn handle_message(&mut self, line: &str) -> Result<Option<Outbound>, ErrorRecord> {
        let inbound: Inbound =
            serde_json::from_str(line).map_err(|e| ErrorRecord::bare(e.to_string()))?;

        match inbound {
            Inbound::UpdateModel { cam_id, models } => {
                self.table.set_models(&cam_id, models.clone());
                tracing::info!(cam_id = %cam_id, ?models, "camera model assignment updated");
                Ok(Some(Outbound::UpdateModel { cam_id, models }))
            }
            Inbound::Detect(frame) => match self.dispatcher.process(&self.table, frame) {
                Ok(Some(reply)) => Ok(Some(Outbound::Detect(reply))),
                Ok(None) => Ok(None),
                Err(record) => Err(record),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Detection, DetectorError};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::io::Cursor;

    struct StaticProvider {
        known: Vec<String>,
    }

    impl DetectorProvider for StaticProvider {
        fn contains(&self, model_name: &str) -> bool {
            self.known.iter().any(|n| n == model_name)
        }

        fn detect(
            &mut self,
            model_name: &str,
            _image: &DynamicImage,
        ) -> Result<Vec<Detection>, DetectorError> {
            Ok(vec![Detection {
                cls: format!("{}-object", model_name),
                conf: 0.75,
                xyxy: [1.0, 2.0, 3.0, 4.0],
            }])
        }
    }

    fn worker_with_models(names: &[&str]) -> Worker<StaticProvider> {
        Worker::new(StaticProvider {
            known: names.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn png_base64() -> String {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(8, 8, Rgb([10, 20, 30]));
        let mut bytes: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        BASE64.encode(&bytes)
    }

    fn run_lines(worker: &mut Worker<StaticProvider>, lines: &[String]) -> Vec<String> {
        let input = Cursor::new(lines.join("\n"));
        let mut output: Vec<u8> = Vec::new();
        worker.run(input, &mut output).unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_update_model_is_acknowledged() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![r#"{"type":"update-model","camId":"cam1","models":["m1"]}"#.to_string()];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(
            replies,
            vec![r#"{"type":"update-model","camId":"cam1","models":["m1"]}"#]
        );
    }

    #[test]
    fn test_malformed_line_yields_bare_error() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec!["this is not json".to_string()];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
        assert!(value.get("error").is_some());
        assert!(value.get("camId").is_none());
        assert!(value.get("frameNumber").is_none());
    }

    #[test]
    fn test_loop_survives_bad_line_and_keeps_processing() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![
            r#"{"type":"shutdown"}"#.to_string(),
            r#"{"type":"update-model","camId":"cam1","models":["m1"]}"#.to_string(),
        ];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("error"));
        assert!(replies[1].contains("update-model"));
    }

    #[test]
    fn test_undecodable_frame_emits_nothing() {
        let mut worker = worker_with_models(&["m1"]);
        let garbage = BASE64.encode(b"not an image");
        let lines = vec![format!(
            r#"{{"type":"detect","camId":"cam1","frame":"{}"}}"#,
            garbage
        )];

        let replies = run_lines(&mut worker, &lines);

        assert!(replies.is_empty());
    }

    #[test]
    fn test_detect_for_unconfigured_camera_yields_empty_results() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![format!(
            r#"{{"type":"detect","camId":"cam9","frame":"{}"}}"#,
            png_base64()
        )];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
        assert_eq!(value["type"], "detect");
        assert_eq!(value["camId"], "cam9");
        assert_eq!(value["timestamp"], 0);
        assert_eq!(value["frameNumber"], 0);
        assert_eq!(value["results"], serde_json::json!({}));
    }

    #[test]
    fn test_update_then_detect_end_to_end() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![
            r#"{"type":"update-model","camId":"cam1","models":["m1"]}"#.to_string(),
            format!(
                r#"{{"type":"detect","camId":"cam1","frame":"{}","timestamp":5,"frameNumber":1}}"#,
                png_base64()
            ),
        ];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 2);
        let value: serde_json::Value = serde_json::from_str(&replies[1]).unwrap();
        assert_eq!(value["type"], "detect");
        assert_eq!(value["camId"], "cam1");
        assert_eq!(value["timestamp"], 5);
        assert_eq!(value["frameNumber"], 1);
        assert_eq!(value["results"]["m1"][0]["cls"], "m1-object");
        assert_eq!(value["results"]["m1"][0]["xyxy"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn test_replacement_routes_only_latest_assignment() {
        let mut worker = worker_with_models(&["m1", "m2"]);
        let lines = vec![
            r#"{"type":"update-model","camId":"cam1","models":["m1","m2"]}"#.to_string(),
            r#"{"type":"update-model","camId":"cam1","models":["m2"]}"#.to_string(),
            format!(
                r#"{{"type":"detect","camId":"cam1","frame":"{}"}}"#,
                png_base64()
            ),
        ];

        let replies = run_lines(&mut worker, &lines);

        let value: serde_json::Value = serde_json::from_str(&replies[2]).unwrap();
        let results = value["results"].as_object().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("m2"));
    }

    #[test]
    fn test_detect_without_frame_field_yields_error_with_cam_id() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![r#"{"type":"detect","camId":"cam1","frameNumber":3}"#.to_string()];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
        assert!(value.get("error").is_some());
        assert_eq!(value["camId"], "cam1");
        assert_eq!(value["frameNumber"], 3);
    }

    #[test]
    fn test_detect_without_cam_id_reports_unknown() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![r#"{"type":"detect","frame":"aGk="}"#.to_string()];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
        assert!(value.get("error").is_some());
        assert_eq!(value["camId"], "unknown");
        assert_eq!(value["frameNumber"], 0);
    }

    #[test]
    fn test_bad_base64_yields_error_with_frame_fields() {
        let mut worker = worker_with_models(&["m1"]);
        let lines = vec![
            r#"{"type":"detect","camId":"cam1","frame":"%%%","frameNumber":9}"#.to_string(),
        ];

        let replies = run_lines(&mut worker, &lines);

        assert_eq!(replies.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
        assert!(value.get("error").is_some());
        assert_eq!(value["camId"], "cam1");
        assert_eq!(value["frameNumber"], 9);
    }
}
