use std::fs;

use approx::assert_relative_eq;
use vital_trends::schema::files;
use vital_trends::{
    aggregate, value_range, Dashboard, DrugFilter, GroupBy, GroupKey, LoadOptions, Series,
    ViewEvent, VitalsTable,
};

const VITALS_CSV: &str = "\
caseid,signal,norm_time,value,optype,emop
10,MAP,0.001,80,A,0
10,MAP,0.004,90,A,0
11,MAP,0.002,70,B,1
11,MAP,0.25,74,B,1
12,MAP,0.25,78,B,0
12,HR,0.25,66,B,0
";

const ANESTHETICS_CSV: &str = "\
caseid,tname,optype
10,Orchestra/RFTN20_RATE,A
11,Orchestra/PPF20_RATE,B
12,Orchestra/PPF20_RATE,B
";

fn write_fixture(dir: &std::path::Path) {
    fs::write(dir.join(files::VITALS), VITALS_CSV).unwrap();
    fs::write(dir.join(files::ANESTHETICS), ANESTHETICS_CSV).unwrap();
}

#[test]
fn csv_rows_aggregate_by_surgery_type() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let table = VitalsTable::load(&dir.path().join(files::VITALS)).unwrap();

    let series = aggregate(table.readings(), "map", GroupBy::SurgeryType);
    assert_eq!(series.len(), 2);

    let a = &series[0];
    assert_eq!(a.key, GroupKey::from("A"));
    assert_eq!(a.buckets.len(), 1);
    assert_relative_eq!(a.buckets[0].norm_time, 0.0);
    assert_relative_eq!(a.buckets[0].mean, 85.0);

    let b = &series[1];
    assert_eq!(b.key, GroupKey::from("B"));
    assert_eq!(b.buckets.len(), 2);
    assert_relative_eq!(b.buckets[0].mean, 70.0);
    assert_eq!(b.buckets[0].sd, None);
    assert_relative_eq!(b.buckets[1].norm_time, 0.25, epsilon = 1e-12);
    assert_relative_eq!(b.buckets[1].mean, 76.0);

    let matching = table.readings().iter().filter(|r| r.signal == "map").count();
    let total: usize = series.iter().map(Series::reading_count).sum();
    assert_eq!(total, matching);

    let (lo, hi) = value_range(&series).unwrap();
    assert_relative_eq!(lo, 70.0);
    assert_relative_eq!(hi, 85.0 + 50.0f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn session_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let mut dashboard = Dashboard::new(dir.path());
    let catalog = dashboard.load(&LoadOptions::default()).unwrap();
    assert_eq!(catalog.vitals(), ["map", "hr"]);
    assert_eq!(catalog.drug_options().len(), 3);

    // defaults: map by emergency status, all drugs
    let chart = dashboard.render().unwrap();
    assert_eq!(chart.visible_series, 2);

    let chart = dashboard
        .dispatch(ViewEvent::SelectGroup(GroupBy::SurgeryType))
        .unwrap();
    assert_eq!(chart.visible_series, 2);

    let chart = dashboard
        .dispatch(ViewEvent::ToggleGroup(GroupKey::from("A")))
        .unwrap();
    assert_eq!(chart.visible_series, 1);
    assert_relative_eq!(chart.y_domain.0, 85.0 - 50.0f64.sqrt(), epsilon = 1e-12);

    let chart = dashboard
        .dispatch(ViewEvent::SelectDrug(DrugFilter::parse("orchestra/ppf20_rate")))
        .unwrap();
    // propofol cases carry only surgery type B, so the toggled A line is gone
    assert_eq!(chart.visible_series, 0);

    let chart = dashboard.dispatch(ViewEvent::ShowAll).unwrap();
    assert_eq!(chart.visible_series, 1);

    let chart = dashboard
        .dispatch(ViewEvent::SelectVital("nonexistent".into()))
        .unwrap();
    assert_eq!(chart.visible_series, 0);
    assert!(!chart.as_str().contains("<path class=\"line\""));
}
