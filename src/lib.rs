pub mod aggregate;
pub mod catalog;
pub mod chart;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod scale;
pub mod schema;
pub mod view;

#[cfg(feature = "python")]
mod python;

pub use aggregate::{aggregate, value_range, Bucket, GroupBy, GroupKey, Series, BIN_WIDTH};
pub use catalog::{DrugFilter, OptionCatalog, SelectOption};
pub use chart::{render, ChartLayout, ChartSvg};
pub use dashboard::{Dashboard, Datasets};
pub use error::VitalsError;
pub use loader::{AnestheticEvent, AnestheticsTable, LoadOptions, VitalReading, VitalsTable};
pub use view::{ViewEvent, ViewState};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Vitals
    let vitals = PyModule::new(m.py(), "vitals")?;
    vitals.add("CASE_ID", schema::vitals::CASE_ID)?;
    vitals.add("SIGNAL", schema::vitals::SIGNAL)?;
    vitals.add("NORM_TIME", schema::vitals::NORM_TIME)?;
    vitals.add("VALUE", schema::vitals::VALUE)?;
    vitals.add("OPTYPE", schema::vitals::OPTYPE)?;
    vitals.add("EMOP", schema::vitals::EMOP)?;
    m.add_submodule(&vitals)?;

    // Anesthetics
    let anesthetics = PyModule::new(m.py(), "anesthetics")?;
    anesthetics.add("CASE_ID", schema::anesthetics::CASE_ID)?;
    anesthetics.add("TNAME", schema::anesthetics::TNAME)?;
    anesthetics.add("OPTYPE", schema::anesthetics::OPTYPE)?;
    m.add_submodule(&anesthetics)?;

    // Summary
    let summary = PyModule::new(m.py(), "summary")?;
    summary.add("GROUP_KEY", schema::summary::GROUP_KEY)?;
    summary.add("NORM_TIME", schema::summary::NORM_TIME)?;
    summary.add("MEAN", schema::summary::MEAN)?;
    summary.add("SD", schema::summary::SD)?;
    summary.add("COUNT", schema::summary::COUNT)?;
    m.add_submodule(&summary)?;

    // GroupBy
    let group_by = PyModule::new(m.py(), "group_by")?;
    group_by.add("OPTYPE", schema::group_by::OPTYPE)?;
    group_by.add("EMOP", schema::group_by::EMOP)?;
    m.add_submodule(&group_by)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
#[pyo3(name = "_core")]
fn vital_trends_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyVitalTrends>()?;
    m.add_function(wrap_pyfunction!(python::init_logging, m)?)?;
    m.add("BIN_WIDTH", BIN_WIDTH)?;
    add_schema_exports(m)?;
    Ok(())
}
