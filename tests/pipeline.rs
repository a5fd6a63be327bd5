use std::sync::Arc;

use approx::assert_relative_eq;
use lactation_curves::characteristics::{
    CharacteristicCache, CharacteristicEngine, CharacteristicOptions, ParameterSource,
};
use lactation_curves::config::Settings;
use lactation_curves::domain::{Characteristic, LactationRecord, ModelKind, PersistencyMethod};
use lactation_curves::fit::{FitOptions, fit, fit_many, fit_milkbot_least_squares, predict};
use lactation_curves::icar::test_interval_method;
use lactation_curves::io::{ColumnOverrides, read_test_days, write_test_interval_csv};
use lactation_curves::models;
use lactation_curves::symbolic::{ClosedFormEngine, NumericOnly};

fn wood_record() -> LactationRecord {
    let days: Vec<u32> = (0..16).map(|i| 5 + 20 * i).collect();
    let yields = days
        .iter()
        .map(|&d| models::wood(d as f64, &[30.0, 0.2, 0.003]))
        .collect();
    LactationRecord::new(days, yields).unwrap()
}

#[test]
fn fit_predict_and_characterize_wood() {
    let record = wood_record();
    let params = fit(&record, ModelKind::Wood).unwrap();
    assert_eq!(params.names(), vec!["a", "b", "c"]);
    assert_relative_eq!(params.get("b").unwrap(), 0.2, max_relative = 1e-3);

    let curve = predict(&record, ModelKind::Wood).unwrap();
    assert_eq!(curve.len(), 305);
    assert_relative_eq!(curve[99], models::wood(100.0, &params.values()), max_relative = 1e-12);

    let engine = CharacteristicEngine::default();
    let options = CharacteristicOptions::default();
    let source = ParameterSource::Supplied(&params);
    let tp = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::TimeToPeak, source, &options)
        .unwrap();
    assert!((tp - 0.2 / 0.003).abs() < 1.0);

    let peak = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::PeakYield, source, &options)
        .unwrap();
    let persistency = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::Persistency, source, &options)
        .unwrap();
    assert!(persistency < 0.0);
    assert!(persistency.abs() < peak / (305.0 - tp));

    let literature = CharacteristicOptions {
        persistency_method: PersistencyMethod::Literature,
        ..options
    };
    let wood_persistency = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::Persistency, source, &literature)
        .unwrap();
    assert!(wood_persistency > 0.0);
}

#[test]
fn symbolic_and_numeric_engines_agree() {
    let record = wood_record();
    let params = fit(&record, ModelKind::Wilmink).unwrap();
    let options = CharacteristicOptions::default();

    let symbolic = CharacteristicEngine::new(Arc::new(CharacteristicCache::default()), Arc::new(ClosedFormEngine));
    let numeric = CharacteristicEngine::new(Arc::new(CharacteristicCache::default()), Arc::new(NumericOnly));

    let source = ParameterSource::Supplied(&params);
    let a = symbolic
        .calculate_characteristic(&record, ModelKind::Wilmink, Characteristic::CumulativeMilkYield, source, &options)
        .unwrap();
    let b = numeric
        .calculate_characteristic(&record, ModelKind::Wilmink, Characteristic::CumulativeMilkYield, source, &options)
        .unwrap();
    assert_relative_eq!(a, b, max_relative = 1e-4);
}

#[test]
fn repeated_queries_reuse_the_cache() {
    let record = wood_record();
    let engine = Settings::default().engine();
    let options = CharacteristicOptions::default();
    let first = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::PeakYield, ParameterSource::Frequentist, &options)
        .unwrap();
    let derivations = engine.cache().derivations();
    let second = engine
        .calculate_characteristic(&record, ModelKind::Wood, Characteristic::PeakYield, ParameterSource::Frequentist, &options)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.cache().derivations(), derivations);
}

#[test]
fn fittable_models_fit_in_parallel() {
    let record = wood_record();
    let fittable: Vec<ModelKind> = ModelKind::ALL.into_iter().filter(|m| m.is_fittable()).collect();
    let results = fit_many(&record, &fittable, &FitOptions::default());
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].0, ModelKind::Wood);
    assert!(results[0].1.as_ref().unwrap().sse < 1e-6);
    assert!(results[1].1.is_ok());
    for fit in results.iter().filter_map(|(_, r)| r.as_ref().ok()) {
        assert!(fit.sse <= fit.initial_sse);
    }

    if let Ok(milkbot) = fit_milkbot_least_squares(&record) {
        assert_eq!(milkbot.params.names(), vec!["scale", "ramp", "offset", "decay"]);
    }
}

#[test]
fn test_interval_from_csv_to_csv() {
    let csv = "\
AnimalId,DaysInMilk,MilkingYield
cow1,10,30
cow2,50,20
cow1,40,25
cow2,150,25
cow2,250,15
cow2,320,12
";
    let table = read_test_days(csv.as_bytes(), &ColumnOverrides::default()).unwrap();
    assert_eq!(table.rows.len(), 6);

    let results = test_interval_method(&table.rows).unwrap();
    let mut out = Vec::new();
    write_test_interval_csv(&mut out, &results).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "TestId,Total305Yield\ncow1,7775.0\ncow2,6090.0\n"
    );
}
