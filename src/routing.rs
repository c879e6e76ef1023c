use std::collections::HashMap;

/// Per-camera model assignments. Each update replaces the full list for
/// that camera; a camera that was never configured reads as empty.
#[derive(Debug, Default)]
pub struct CameraModelTable {
    assignments: HashMap<String, Vec<String>>,
}

impl CameraModelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_models(&mut self, cam_id: &str, models: Vec<String>) {
        self.assignments.insert(cam_id.to_string(), models);
    }

    pub fn get_models(&self, cam_id: &str) -> &[String] {
        self.assignments
            .get(cam_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unconfigured_camera_reads_empty() {
        let table = CameraModelTable::new();

        assert!(table.get_models("cam1").is_empty());
    }

    #[test]
    fn test_update_replaces_full_list() {
        let mut table = CameraModelTable::new();
        table.set_models("cam1", names(&["A", "B"]));
        table.set_models("cam1", names(&["C"]));

        assert_eq!(table.get_models("cam1"), names(&["C"]).as_slice());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut table = CameraModelTable::new();
        table.set_models("cam1", names(&["A", "B"]));
        table.set_models("cam1", names(&["A", "B"]));

        assert_eq!(table.get_models("cam1"), names(&["A", "B"]).as_slice());
    }

    #[test]
    fn test_cameras_are_independent() {
        let mut table = CameraModelTable::new();
        table.set_models("cam1", names(&["A"]));
        table.set_models("cam2", names(&["B"]));

        assert_eq!(table.get_models("cam1"), names(&["A"]).as_slice());
        assert_eq!(table.get_models("cam2"), names(&["B"]).as_slice());
    }
}
