use std::fs;
use std::path::{Path, PathBuf};

use ndarray::arr2;

use crate::config::SweepConfig;
use crate::converter::{convert_dir, ConvertOptions};
use crate::datastructures::{Instance, Timeout, ValueRange};

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from("data/test").join(name)
}

/// The instance stored in `data/test/airland_small.txt`.
pub fn small_instance() -> Instance {
    Instance {
        plane_count: 3,
        freeze_time: 10,
        appearance: vec![54, 120, 14],
        earliest: vec![129, 195, 89],
        target: vec![155, 258, 98],
        latest: vec![559, 744, 510],
        earliness_penalty: vec![10, 10, 30],
        lateness_penalty: vec![10, 10, 30],
        separation: arr2(&[[99999, 3, 15], [3, 99999, 15], [15, 15, 99999]]),
    }
}

/// Sweep configuration over `models` (empty model files) and one converted
/// copy of `airland_small.txt` as instance 1, with the solver replaced by
/// `data/test/fake_oplrun.sh`.
pub fn sweep_fixture(dir: &Path, models: &[&str]) -> SweepConfig {
    let models_dir = dir.join("models");
    let raw_dir = dir.join("raw_data");
    let data_dir = dir.join("data");
    fs::create_dir_all(&models_dir).unwrap();
    fs::create_dir_all(&raw_dir).unwrap();
    for model in models {
        fs::write(models_dir.join(model), "// model\n").unwrap();
    }
    fs::copy(fixture("airland_small.txt"), raw_dir.join("airland1.txt"))
        .unwrap();
    convert_dir(&raw_dir, &data_dir, &ConvertOptions::default()).unwrap();
    SweepConfig {
        solver: "sh".to_string(),
        solver_args: vec![fixture("fake_oplrun.sh").display().to_string()],
        timeout: Timeout::from_secs(30),
        models_dir,
        data_dir,
        raw_dir,
        out_dir: dir.join("results"),
        instances: ValueRange::new(1, 1),
        ..Default::default()
    }
}
