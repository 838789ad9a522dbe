use std::fs;
use std::path::{Path, PathBuf};

use airland_sweep::config::SweepConfig;
use airland_sweep::converter::{convert_dir, ConvertOptions};
use airland_sweep::datastructures::*;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from("data/test").join(name)
}

/// Lays out `models`, `raw_data` and `data` below `dir` with instance 1
/// converted from `airland_small.txt`, and points the solver at the fake
/// `oplrun`.
pub fn default_config(dir: &Path, models: &[&str]) -> SweepConfig {
    let config = SweepConfig {
        solver: "sh".to_string(),
        solver_args: vec![fixture("fake_oplrun.sh").display().to_string()],
        timeout: Timeout::from_secs(30),
        models_dir: dir.join("models"),
        raw_dir: dir.join("raw_data"),
        data_dir: dir.join("data"),
        out_dir: dir.join("results"),
        instances: ValueRange::new(1, 1),
        ..Default::default()
    };
    fs::create_dir_all(&config.models_dir).unwrap();
    fs::create_dir_all(&config.raw_dir).unwrap();
    for model in models {
        fs::write(config.models_dir.join(model), "// model\n").unwrap();
    }
    fs::copy(
        fixture("airland_small.txt"),
        config.raw_dir.join("airland1.txt"),
    )
    .unwrap();
    let report =
        convert_dir(&config.raw_dir, &config.data_dir, &ConvertOptions::default())
            .unwrap();
    assert_eq!(report.converted.len(), 1);
    config
}
