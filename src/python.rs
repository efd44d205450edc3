use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use tracing_subscriber::EnvFilter;

use crate::aggregate::{GroupBy, GroupKey};
use crate::catalog::{DrugFilter, SelectOption};
use crate::chart::{ChartLayout, Margin};
use crate::dashboard::Dashboard;
use crate::error::VitalsError;
use crate::loader::LoadOptions;
use crate::schema::files;
use crate::view::ViewEvent;

fn options_to_pairs(options: Vec<SelectOption>) -> Vec<(String, String)> {
    options.into_iter().map(|o| (o.value, o.label)).collect()
}

#[pyclass(name = "VitalTrends")]
pub struct PyVitalTrends {
    inner: Dashboard,
}

#[pymethods]
impl PyVitalTrends {
    /// Create a session reading CSVs relative to `base_path`.
    ///
    /// Args:
    ///     width, height: Outer SVG size in pixels (default: 1100 x 400)
    ///     margin: (top, right, bottom, left) in pixels (default: (50, 40, 50, 60))
    #[new]
    #[pyo3(signature = (base_path, width = 1100.0, height = 400.0, margin = (50.0, 40.0, 50.0, 60.0)))]
    fn new(base_path: String, width: f64, height: f64, margin: (f64, f64, f64, f64)) -> Self {
        let (top, right, bottom, left) = margin;
        let layout = ChartLayout {
            width,
            height,
            margin: Margin {
                top,
                right,
                bottom,
                left,
            },
            ..ChartLayout::default()
        };
        Self {
            inner: Dashboard::new(base_path).with_layout(layout),
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the vitals and anesthetics CSVs concurrently.
    ///
    /// Vitals require: signal, norm_time, value, optype, emop (caseid optional)
    /// Anesthetics require: tname, optype (caseid optional)
    /// Selections are reset to vital "map", group "emop", drug "All".
    #[pyo3(signature = (vitals = files::VITALS, anesthetics = files::ANESTHETICS))]
    fn load(&mut self, vitals: &str, anesthetics: &str) -> PyResult<()> {
        let options = LoadOptions {
            vitals_file: vitals.to_string(),
            anesthetics_file: anesthetics.to_string(),
        };
        self.inner.load(&options)?;
        Ok(())
    }

    // ── Options ─────────────────────────────────────────────────────────────

    /// (value, label) pairs for the vital-sign selector.
    fn vital_options(&self) -> PyResult<Vec<(String, String)>> {
        Ok(options_to_pairs(self.inner.catalog()?.vital_options()))
    }

    fn group_options(&self) -> PyResult<Vec<(String, String)>> {
        Ok(options_to_pairs(self.inner.catalog()?.group_options()))
    }

    /// (value, label) pairs for the drug selector, "All" first.
    fn drug_options(&self) -> PyResult<Vec<(String, String)>> {
        Ok(options_to_pairs(self.inner.catalog()?.drug_options()))
    }

    // ── Selection events ────────────────────────────────────────────────────

    /// Each selector returns the redrawn SVG.
    fn select_vital(&mut self, vital: &str) -> PyResult<String> {
        let chart = self
            .inner
            .dispatch(ViewEvent::SelectVital(vital.to_string()))?;
        Ok(chart.into_string())
    }

    fn select_group(&mut self, group_by: &str) -> PyResult<String> {
        let group_by: GroupBy = group_by.parse()?;
        Ok(self
            .inner
            .dispatch(ViewEvent::SelectGroup(group_by))?
            .into_string())
    }

    fn select_drug(&mut self, drug: &str) -> PyResult<String> {
        Ok(self
            .inner
            .dispatch(ViewEvent::SelectDrug(DrugFilter::parse(drug)))?
            .into_string())
    }

    /// Toggle a legend entry by its `data-key`. `None` addresses the entry
    /// marked `data-missing`.
    #[pyo3(signature = (key=None))]
    fn toggle_group(&mut self, key: Option<&str>) -> PyResult<String> {
        Ok(self
            .inner
            .dispatch(ViewEvent::ToggleGroup(GroupKey::new(key)))?
            .into_string())
    }

    fn show_all(&mut self) -> PyResult<String> {
        Ok(self.inner.dispatch(ViewEvent::ShowAll)?.into_string())
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Render the chart for the current selections.
    ///
    /// Use with `IPython.display.SVG(session.render())` in Jupyter.
    fn render(&self) -> PyResult<String> {
        Ok(self.inner.render()?.into_string())
    }

    /// One row per (group, bin): group_key, norm_time, mean, sd, count.
    fn summary_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.summary_frame()?))
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn vitals_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.datasets()?.vitals.frame().clone()))
    }

    #[getter]
    fn anesthetics_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.datasets()?.anesthetics.frame().clone()))
    }

    #[getter]
    fn dropped_rows(&self) -> PyResult<usize> {
        Ok(self.inner.datasets()?.vitals.dropped_rows())
    }

    #[getter]
    fn selection(&self) -> (String, String, String, Vec<Option<String>>) {
        let state = self.inner.state();
        (
            state.vital.clone(),
            state.group_by.column().to_string(),
            state.drug.label().to_string(),
            state
                .active_groups
                .iter()
                .map(|k| k.as_str().map(str::to_string))
                .collect(),
        )
    }
}

/// Install a `tracing` subscriber writing to stderr.
///
/// `level` takes an `EnvFilter` directive such as "info" or
/// "vital_trends=debug"; `RUST_LOG` wins when set.
#[pyfunction]
#[pyo3(signature = (level = "info"))]
pub fn init_logging(level: &str) -> PyResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| VitalsError::InvalidData(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| VitalsError::General(e.to_string()))?;
    Ok(())
}
