use std::path::{Path, PathBuf};

use tsforecast::{
    init_logging, load_observations_csv, log_run_finish, log_run_start, log_split_windows,
    logging_config_from_env, CsvLoadOptions, ForecastConfig, ValueBoundsTable,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let data_path = PathBuf::from(
        std::env::var("TSF_DATA_PATH")
            .unwrap_or_else(|_| "data/jena_climate_2009_2016.csv".to_string()),
    );
    let config_path = PathBuf::from(
        std::env::var("TSF_CONFIG_PATH").unwrap_or_else(|_| "config/forecast.json".to_string()),
    );
    log_run_start(&logging_cfg, &data_path, &config_path);

    let config = ForecastConfig::from_path(&config_path)?;
    let generator = config.window_generator()?;

    let (bounds, bounds_source) = match std::env::var("TSF_BOUNDS_PATH") {
        Ok(path) => (ValueBoundsTable::from_path(Path::new(&path))?, path),
        Err(_) => (ValueBoundsTable::jena_climate(), "jena_climate".to_string()),
    };

    let load_options = CsvLoadOptions {
        index_column: config.index_column.clone(),
        ..CsvLoadOptions::default()
    };
    let observations = load_observations_csv(&data_path, &load_options)?;
    let pipeline = config.builder().value_bounds(bounds).build(&observations)?;

    for (split, table) in [
        ("training", pipeline.training_set()),
        ("validation", pipeline.validation_set()),
        ("test", pipeline.test_set()),
    ] {
        let tensors = generator.generate(&table)?;
        log_split_windows(split, table.len(), &tensors);
    }

    log_run_finish(&pipeline.schema().fingerprint(), &bounds_source);
    Ok(())
}
