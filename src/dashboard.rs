use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::aggregate::{aggregate, summary_frame, Series};
use crate::catalog::{DrugFilter, OptionCatalog};
use crate::chart::{self, ChartLayout, ChartSvg};
use crate::error::VitalsError;
use crate::loader::{load_tables, AnestheticsTable, LoadOptions, VitalReading, VitalsTable};
use crate::view::{ViewEvent, ViewState};

/// Loaded datasets plus the option catalog derived from them.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub vitals: VitalsTable,
    pub anesthetics: AnestheticsTable,
    pub catalog: OptionCatalog,
}

impl Datasets {
    pub fn new(vitals: VitalsTable, anesthetics: AnestheticsTable) -> Self {
        let catalog = OptionCatalog::build(vitals.readings(), anesthetics.events());
        Self {
            vitals,
            anesthetics,
            catalog,
        }
    }

    /// Readings that pass the drug filter, in input order.
    pub fn readings_for(&self, drug: &DrugFilter) -> Vec<&VitalReading> {
        match drug {
            DrugFilter::All => self.vitals.readings().iter().collect(),
            DrugFilter::Channel(tname) => {
                if !self.vitals.has_case_ids() || !self.anesthetics.has_case_ids() {
                    warn!(
                        drug = %tname,
                        "drug filter needs a caseid column in both tables; no readings match"
                    );
                    return Vec::new();
                }
                let cases = self.anesthetics.cases_receiving(tname);
                self.vitals
                    .readings()
                    .iter()
                    .filter(|r| r.case_id.as_deref().is_some_and(|c| cases.contains(c)))
                    .collect()
            }
        }
    }

    /// Aggregate for the current selections. Recomputed from scratch on
    /// every call.
    pub fn summarize(&self, state: &ViewState) -> Vec<Series> {
        aggregate(
            self.readings_for(&state.drug),
            &state.vital,
            state.group_by,
        )
    }
}

/// Stateful chart session: load once, then feed selection events.
///
/// Every event produces a new `ViewState` and a full aggregate → render pass.
pub struct Dashboard {
    base_path: PathBuf,
    layout: ChartLayout,
    data: Option<Datasets>,
    state: ViewState,
}

impl Dashboard {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            layout: ChartLayout::default(),
            data: None,
            state: ViewState::default(),
        }
    }

    pub fn with_layout(mut self, layout: ChartLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Load both CSVs and reset selections to the defaults. On failure the
    /// previously loaded data, if any, is discarded.
    pub fn load(&mut self, options: &LoadOptions) -> Result<&OptionCatalog, VitalsError> {
        self.data = None;
        let (vitals, anesthetics) = load_tables(&self.base_path, options)?;
        let data = Datasets::new(vitals, anesthetics);
        info!(
            vitals = data.catalog.vitals().len(),
            drugs = data.catalog.drugs().len(),
            "option catalog built"
        );
        self.state = ViewState::default();
        Ok(&self.data.insert(data).catalog)
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    pub fn datasets(&self) -> Result<&Datasets, VitalsError> {
        self.data
            .as_ref()
            .ok_or_else(|| VitalsError::NotLoaded("vitals and anesthetics".into()))
    }

    pub fn catalog(&self) -> Result<&OptionCatalog, VitalsError> {
        Ok(&self.datasets()?.catalog)
    }

    /// Apply one event and redraw.
    pub fn dispatch(&mut self, event: ViewEvent) -> Result<ChartSvg, VitalsError> {
        let data = self.datasets()?;
        let next = self.state.apply(event);
        let chart = Self::draw(data, &next, &self.layout);
        self.state = next;
        Ok(chart)
    }

    /// Redraw for the current state without changing it.
    pub fn render(&self) -> Result<ChartSvg, VitalsError> {
        Ok(Self::draw(self.datasets()?, &self.state, &self.layout))
    }

    pub fn summary(&self) -> Result<Vec<Series>, VitalsError> {
        Ok(self.datasets()?.summarize(&self.state))
    }

    pub fn summary_frame(&self) -> Result<DataFrame, VitalsError> {
        summary_frame(&self.summary()?)
    }

    fn draw(data: &Datasets, state: &ViewState, layout: &ChartLayout) -> ChartSvg {
        let summary = data.summarize(state);
        chart::render(state, &summary, &data.catalog, layout)
    }
}
