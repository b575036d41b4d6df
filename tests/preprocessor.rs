use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tsforecast::{
    DateRange, NormalizationMethod, Observation, PipelineError, PreprocessorBuilder,
    SplitRatios, Table, ValueBoundsTable,
};

const COLUMNS: [&str; 5] = ["A", "B", "C", "D", "E"];
const ROWS: usize = 14_400;
const TOLERANCE: f64 = 1e-5;

fn dataset_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 10, 10, 20, 0, 0).unwrap()
}

/// 14400 rows at 10-minute spacing, so 2400 of them fall on the hour.
fn synthetic_observations() -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(6789);
    (0..ROWS)
        .map(|row| {
            let ts = dataset_start() + Duration::minutes(10 * row as i64);
            let values: Vec<(&str, f64)> = COLUMNS
                .iter()
                .enumerate()
                .map(|(idx, name)| (*name, rng.gen_range(-10.0_f64..10.0) * (idx + 1) as f64))
                .collect();
            Observation::from_values(ts, values).unwrap()
        })
        .collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "actual={actual} expected={expected}"
    );
}

fn column_values(table: &Table, name: &str) -> Vec<f64> {
    table.column(name).unwrap().iter().map(|v| v.unwrap()).collect()
}

#[test]
fn snapshots_keep_hourly_rows_and_split_chronologically() {
    let observations = synthetic_observations();
    let pipeline = PreprocessorBuilder::new().build(&observations).unwrap();

    assert_eq!(pipeline.raw().len(), ROWS);
    assert_eq!(pipeline.processed().len(), 2_400);
    assert_eq!(pipeline.date_limited().len(), 2_400);
    assert_eq!(pipeline.first_date(), dataset_start());
    assert_eq!(
        pipeline.last_date(),
        Utc.with_ymd_and_hms(2011, 1, 18, 19, 0, 0).unwrap()
    );

    let training = pipeline.training_set();
    let validation = pipeline.validation_set();
    let test = pipeline.test_set();
    assert_eq!(
        (training.len(), validation.len(), test.len()),
        (1_680, 480, 240)
    );
    assert!(training.last_timestamp().unwrap() < validation.first_timestamp().unwrap());
    assert!(validation.last_timestamp().unwrap() < test.first_timestamp().unwrap());
    assert_eq!(test.last_timestamp(), pipeline.date_limited().last_timestamp());
}

#[test]
fn min_max_maps_training_prefix_onto_unit_interval() {
    let observations = synthetic_observations();
    let pipeline = PreprocessorBuilder::new()
        .normalize(NormalizationMethod::MinMax)
        .build(&observations)
        .unwrap();

    let prefix = pipeline.processed().slice(0..1_680);
    let training = pipeline.training_set();
    for name in COLUMNS {
        let raw = column_values(&prefix, name);
        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let normalized = column_values(&training, name);
        for (value, scaled) in raw.iter().zip(&normalized) {
            assert_close(*scaled, (value - min) / (max - min));
        }
        assert_close(normalized.iter().copied().fold(f64::INFINITY, f64::min), 0.0);
        assert_close(normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max), 1.0);
    }
}

#[test]
fn standardization_centres_training_prefix() {
    let observations = synthetic_observations();
    let pipeline = PreprocessorBuilder::new()
        .normalize(NormalizationMethod::Standardization)
        .build(&observations)
        .unwrap();

    let training = pipeline.training_set();
    for name in COLUMNS {
        let values = column_values(&training, name);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert_close(mean, 0.0);
        assert_close(variance.sqrt(), 1.0);
    }

    let stats = pipeline.normalization_stats().unwrap();
    assert_eq!(stats.training_rows, 1_680);
    let a = pipeline.processed().value(2_000, "A").unwrap();
    let scaled = pipeline.normalized().value(2_000, "A").unwrap();
    assert_close(stats.denormalize("A", scaled).unwrap(), a);
}

#[test]
fn renormalizing_is_idempotent_and_reversible() {
    let observations = synthetic_observations();
    let mut pipeline = PreprocessorBuilder::new().build(&observations).unwrap();
    pipeline
        .set_date_range(DateRange::new(
            Some(Utc.with_ymd_and_hms(2010, 11, 1, 0, 0, 0).unwrap()),
            None,
        ))
        .unwrap();

    for method in [
        NormalizationMethod::MinMax,
        NormalizationMethod::Standardization,
    ] {
        pipeline.set_normalization(method).unwrap();
        let normalized = pipeline.normalized().clone();
        let date_limited = pipeline.date_limited().clone();

        pipeline.set_normalization(method).unwrap();
        assert_eq!(pipeline.normalized(), &normalized, "{method:?}");
        assert_eq!(pipeline.date_limited(), &date_limited, "{method:?}");
    }

    pipeline.set_normalization(NormalizationMethod::None).unwrap();
    assert_eq!(pipeline.normalized(), pipeline.processed());
    assert!(pipeline.normalization_stats().is_none());
}

#[test]
fn date_range_is_clamped_to_dataset() {
    let observations = synthetic_observations();
    let mut pipeline = PreprocessorBuilder::new()
        .normalize(NormalizationMethod::MinMax)
        .build(&observations)
        .unwrap();

    let first = Utc.with_ymd_and_hms(2010, 11, 25, 10, 0, 0).unwrap();
    let last = Utc.with_ymd_and_hms(2010, 12, 31, 23, 0, 0).unwrap();
    pipeline
        .set_date_range(DateRange::new(Some(first), Some(last)))
        .unwrap();
    assert_eq!(pipeline.first_date(), first);
    assert_eq!(pipeline.last_date(), last);
    assert_eq!(pipeline.date_limited().first_timestamp(), Some(first));
    assert_eq!(pipeline.date_limited().last_timestamp(), Some(last));

    // changing normalization keeps the active range
    pipeline
        .set_normalization(NormalizationMethod::Standardization)
        .unwrap();
    assert_eq!(pipeline.date_limited().first_timestamp(), Some(first));

    pipeline
        .set_date_range(DateRange::new(
            Some(Utc.with_ymd_and_hms(2009, 1, 1, 0, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap()),
        ))
        .unwrap();
    assert_eq!(pipeline.first_date(), dataset_start());
    assert_eq!(
        pipeline.last_date(),
        Utc.with_ymd_and_hms(2011, 1, 18, 19, 0, 0).unwrap()
    );
    assert_eq!(pipeline.date_limited().len(), 2_400);
}

#[test]
fn half_open_range_keeps_dataset_extreme_on_open_side() {
    let observations = synthetic_observations();
    let mut pipeline = PreprocessorBuilder::new().build(&observations).unwrap();
    let dataset_last = Utc.with_ymd_and_hms(2011, 1, 18, 19, 0, 0).unwrap();

    let first = Utc.with_ymd_and_hms(2010, 11, 25, 10, 0, 0).unwrap();
    pipeline
        .set_date_range(DateRange::new(Some(first), None))
        .unwrap();
    assert_eq!(pipeline.first_date(), first);
    assert_eq!(pipeline.last_date(), dataset_last);
    assert_eq!(pipeline.date_limited().first_timestamp(), Some(first));
    assert_eq!(pipeline.date_limited().last_timestamp(), Some(dataset_last));

    let last = Utc.with_ymd_and_hms(2010, 12, 31, 23, 0, 0).unwrap();
    pipeline
        .set_date_range(DateRange::new(None, Some(last)))
        .unwrap();
    assert_eq!(pipeline.first_date(), dataset_start());
    assert_eq!(pipeline.last_date(), last);
    assert_eq!(pipeline.date_limited().first_timestamp(), Some(dataset_start()));
    assert_eq!(pipeline.date_limited().last_timestamp(), Some(last));
}

#[test]
fn range_outside_dataset_is_rejected_and_state_kept() {
    let observations = synthetic_observations();
    let mut pipeline = PreprocessorBuilder::new().build(&observations).unwrap();
    let before = pipeline.date_limited().clone();
    let expected = PipelineError::EmptySnapshot {
        stage: "date_limited",
    };

    let after_end = Utc.with_ymd_and_hms(2011, 2, 1, 0, 0, 0).unwrap();
    assert_eq!(
        pipeline
            .set_date_range(DateRange::new(Some(after_end), None))
            .unwrap_err(),
        expected
    );
    let before_start = Utc.with_ymd_and_hms(2010, 9, 1, 0, 0, 0).unwrap();
    assert_eq!(
        pipeline
            .set_date_range(DateRange::new(None, Some(before_start)))
            .unwrap_err(),
        expected
    );
    // between two hourly rows
    assert_eq!(
        pipeline
            .set_date_range(DateRange::new(
                Some(Utc.with_ymd_and_hms(2010, 12, 1, 10, 10, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2010, 12, 1, 10, 50, 0).unwrap()),
            ))
            .unwrap_err(),
        expected
    );

    assert_eq!(pipeline.first_date(), dataset_start());
    assert!(pipeline.first_date() <= pipeline.last_date());
    assert_eq!(pipeline.date_limited(), &before);

    let err = PreprocessorBuilder::new()
        .date_range(Some(after_end), None)
        .build(&observations)
        .unwrap_err();
    assert_eq!(err, expected);
}

#[test]
fn invalid_reconfiguration_leaves_pipeline_untouched() {
    let observations = synthetic_observations();
    let mut pipeline = PreprocessorBuilder::new().build(&observations).unwrap();
    let before = pipeline.date_limited().clone();

    let first = Utc.with_ymd_and_hms(2010, 12, 1, 0, 0, 0).unwrap();
    let err = pipeline
        .set_date_range(DateRange::new(Some(first), Some(first)))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRange { .. }));
    assert_eq!(pipeline.date_limited(), &before);

    assert!(!pipeline
        .set_split_ratios(SplitRatios::new(50, 50, 50))
        .unwrap());
    assert_eq!(pipeline.split_ratios(), SplitRatios::new(70, 20, 10));

    assert!(pipeline
        .set_split_ratios(SplitRatios::new(80, 10, 10))
        .unwrap());
    assert_eq!(pipeline.training_set().len(), 1_920);
}

#[test]
fn duplicates_and_outliers_are_handled_before_resampling() {
    let start = dataset_start();
    let mut observations: Vec<Observation> = (0..24)
        .map(|h| {
            Observation::from_values(
                start + Duration::hours(h),
                [("T (degC)", h as f64), ("rh (%)", 50.0)],
            )
            .unwrap()
        })
        .collect();
    observations.push(
        Observation::from_values(start, [("T (degC)", 999.0), ("rh (%)", 180.0)]).unwrap(),
    );
    observations.push(
        Observation::from_values(
            start + Duration::hours(24),
            [("T (degC)", -80.0), ("rh (%)", 140.0)],
        )
        .unwrap(),
    );

    let pipeline = PreprocessorBuilder::new()
        .value_bounds(ValueBoundsTable::jena_climate())
        .build(&observations)
        .unwrap();

    assert_eq!(pipeline.raw().len(), 25);
    assert_eq!(pipeline.raw().value(0, "T (degC)"), Some(0.0));
    assert_eq!(pipeline.processed().value(24, "T (degC)"), Some(-50.0));
    assert_eq!(pipeline.processed().value(24, "rh (%)"), Some(100.0));
}
