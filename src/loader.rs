use std::collections::HashSet;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, warn};

use crate::aggregate::GroupKey;
use crate::error::VitalsError;
use crate::schema::{anesthetics, files, vitals};

const WHITESPACE: &str = " \t\r\n";

// ── Typed rows ──────────────────────────────────────────────────────────────

/// One recorded vital-sign sample.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalReading {
    pub case_id: Option<String>,
    /// Lower-cased vital-sign name, e.g. "map" or "hr".
    pub signal: String,
    /// Progress through surgery; 0 = start, 1 = end. Not clamped.
    pub norm_time: f64,
    pub value: f64,
    pub optype: GroupKey,
    pub emop: GroupKey,
}

/// One drug-administration record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnestheticEvent {
    pub case_id: Option<String>,
    /// Lower-cased drug channel name, e.g. "orchestra/rftn20_rate".
    pub tname: String,
    pub optype: GroupKey,
}

// ── Config ──────────────────────────────────────────────────────────────────

/// File names resolved against the dashboard's base path.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub vitals_file: String,
    pub anesthetics_file: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            vitals_file: files::VITALS.to_string(),
            anesthetics_file: files::ANESTHETICS.to_string(),
        }
    }
}

// ── Tables ──────────────────────────────────────────────────────────────────

/// Normalized vitals frame plus the typed readings extracted from it.
///
/// Rows whose signal is missing or whose `norm_time`/`value` do not parse to
/// finite numbers are dropped from both.
#[derive(Debug, Clone)]
pub struct VitalsTable {
    frame: DataFrame,
    readings: Vec<VitalReading>,
    dropped: usize,
}

impl VitalsTable {
    pub fn load(path: &Path) -> Result<Self, VitalsError> {
        let raw = read_csv_as_strings(path)?;
        let table = Self::from_frame(raw)?;
        info!(
            path = %path.display(),
            rows = table.readings.len(),
            dropped = table.dropped,
            "loaded vitals"
        );
        Ok(table)
    }

    /// Normalize an all-string frame and extract typed readings.
    pub fn from_frame(raw: DataFrame) -> Result<Self, VitalsError> {
        require_columns(&raw, &vitals::REQUIRED)?;

        let df = raw
            .lazy()
            .with_columns([
                col(vitals::SIGNAL)
                    .str()
                    .strip_chars(lit(WHITESPACE))
                    .str()
                    .to_lowercase(),
                col(vitals::NORM_TIME)
                    .str()
                    .strip_chars(lit(WHITESPACE))
                    .cast(DataType::Float64),
                col(vitals::VALUE)
                    .str()
                    .strip_chars(lit(WHITESPACE))
                    .cast(DataType::Float64),
                col(vitals::OPTYPE).str().strip_chars(lit(WHITESPACE)),
                col(vitals::EMOP).str().strip_chars(lit(WHITESPACE)),
            ])
            .collect()?;

        let signal = df.column(vitals::SIGNAL)?.str()?;
        let norm_time = df.column(vitals::NORM_TIME)?.f64()?;
        let value = df.column(vitals::VALUE)?.f64()?;
        let optype = df.column(vitals::OPTYPE)?.str()?;
        let emop = df.column(vitals::EMOP)?.str()?;
        let case_id = optional_str_column(&df, vitals::CASE_ID)?;

        let mut keep = Vec::with_capacity(df.height());
        let mut readings = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = match (signal.get(i), norm_time.get(i), value.get(i)) {
                (Some(s), Some(t), Some(v)) if !s.is_empty() && t.is_finite() && v.is_finite() => {
                    Some(VitalReading {
                        case_id: case_id.and_then(|c| trimmed(c.get(i))),
                        signal: s.to_string(),
                        norm_time: t,
                        value: v,
                        optype: GroupKey::new(optype.get(i)),
                        emop: GroupKey::new(emop.get(i)),
                    })
                }
                _ => None,
            };
            keep.push(row.is_some());
            readings.extend(row);
        }

        let dropped = df.height() - readings.len();
        if dropped > 0 {
            warn!(dropped, "dropped vitals rows with missing signal, time or value");
        }
        let frame = df.filter(&BooleanChunked::from_slice("valid".into(), &keep))?;

        Ok(Self {
            frame,
            readings,
            dropped,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn readings(&self) -> &[VitalReading] {
        &self.readings
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped
    }

    pub fn has_case_ids(&self) -> bool {
        self.frame.column(vitals::CASE_ID).is_ok()
    }
}

/// Normalized anesthetics frame plus typed administration records.
#[derive(Debug, Clone)]
pub struct AnestheticsTable {
    frame: DataFrame,
    events: Vec<AnestheticEvent>,
    dropped: usize,
}

impl AnestheticsTable {
    pub fn load(path: &Path) -> Result<Self, VitalsError> {
        let raw = read_csv_as_strings(path)?;
        let table = Self::from_frame(raw)?;
        info!(
            path = %path.display(),
            rows = table.events.len(),
            dropped = table.dropped,
            "loaded anesthetics"
        );
        Ok(table)
    }

    pub fn from_frame(raw: DataFrame) -> Result<Self, VitalsError> {
        require_columns(&raw, &anesthetics::REQUIRED)?;

        let df = raw
            .lazy()
            .with_columns([
                col(anesthetics::TNAME)
                    .str()
                    .strip_chars(lit(WHITESPACE))
                    .str()
                    .to_lowercase(),
                col(anesthetics::OPTYPE).str().strip_chars(lit(WHITESPACE)),
            ])
            .collect()?;

        let tname = df.column(anesthetics::TNAME)?.str()?;
        let optype = df.column(anesthetics::OPTYPE)?.str()?;
        let case_id = optional_str_column(&df, anesthetics::CASE_ID)?;

        let mut keep = Vec::with_capacity(df.height());
        let mut events = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = tname.get(i).filter(|t| !t.is_empty()).map(|t| AnestheticEvent {
                case_id: case_id.and_then(|c| trimmed(c.get(i))),
                tname: t.to_string(),
                optype: GroupKey::new(optype.get(i)),
            });
            keep.push(row.is_some());
            events.extend(row);
        }

        let dropped = df.height() - events.len();
        if dropped > 0 {
            warn!(dropped, "dropped anesthetics rows with missing tname");
        }
        let frame = df.filter(&BooleanChunked::from_slice("valid".into(), &keep))?;

        Ok(Self {
            frame,
            events,
            dropped,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn events(&self) -> &[AnestheticEvent] {
        &self.events
    }

    pub fn has_case_ids(&self) -> bool {
        self.frame.column(anesthetics::CASE_ID).is_ok()
    }

    /// Case ids with at least one record on the given channel.
    pub fn cases_receiving(&self, tname: &str) -> HashSet<&str> {
        self.events
            .iter()
            .filter(|e| e.tname == tname)
            .filter_map(|e| e.case_id.as_deref())
            .collect()
    }
}

/// Load both tables concurrently. Either failure fails the whole load.
pub fn load_tables(
    base_path: &Path,
    options: &LoadOptions,
) -> Result<(VitalsTable, AnestheticsTable), VitalsError> {
    let vitals_path: PathBuf = base_path.join(&options.vitals_file);
    let anesthetics_path: PathBuf = base_path.join(&options.anesthetics_file);

    let (vitals, anesthetics) = rayon::join(
        || VitalsTable::load(&vitals_path),
        || AnestheticsTable::load(&anesthetics_path),
    );
    Ok((vitals?, anesthetics?))
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, VitalsError> {
    if !path.is_file() {
        return Err(VitalsError::MissingFile(path.display().to_string()));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.iter().map(String::as_str))?;

    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), VitalsError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(VitalsError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

fn optional_str_column<'a>(
    df: &'a DataFrame,
    name: &str,
) -> Result<Option<&'a StringChunked>, VitalsError> {
    match df.column(name) {
        Ok(c) => Ok(Some(c.str()?)),
        Err(_) => Ok(None),
    }
}

fn trimmed(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    const VITALS_CSV: &str = "\
caseid,signal,norm_time,value,optype,emop
1,MAP,0.001,80,Colorectal,0
1,map,0.004,90,Colorectal,0
2,Map,0.002,70, Biliary/Pancreas ,1
2,HR,0.5,71,Biliary/Pancreas,1
3,map,oops,75,Colorectal,0
3,map,0.3,,Colorectal,0
4,,0.3,60,Stomach,0
";

    const ANESTHETICS_CSV: &str = "\
caseid,tname,optype
1,Orchestra/RFTN20_RATE,Colorectal
1,Orchestra/PPF20_VOL, Colorectal
2,orchestra/ppf20_rate,Biliary/Pancreas
,orchestra/ppf20_rate,Stomach
3,,Colorectal
";

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(files::VITALS), VITALS_CSV).unwrap();
        fs::write(dir.path().join(files::ANESTHETICS), ANESTHETICS_CSV).unwrap();
        dir
    }

    #[test]
    fn test_vitals_normalized_and_typed() {
        let dir = fixture();
        let table = VitalsTable::load(&dir.path().join(files::VITALS)).unwrap();

        assert_eq!(table.readings().len(), 4);
        assert_eq!(table.dropped_rows(), 3);
        assert_eq!(table.frame().height(), 4);
        assert!(table.has_case_ids());

        let first = &table.readings()[0];
        assert_eq!(first.signal, "map");
        assert_eq!(first.case_id.as_deref(), Some("1"));
        assert_relative_eq!(first.norm_time, 0.001);
        assert_relative_eq!(first.value, 80.0);

        let third = &table.readings()[2];
        assert_eq!(third.signal, "map");
        assert_eq!(third.optype, GroupKey::from("Biliary/Pancreas"));
        assert_eq!(third.emop, GroupKey::from("1"));
    }

    #[test]
    fn test_anesthetics_normalized() {
        let dir = fixture();
        let table = AnestheticsTable::load(&dir.path().join(files::ANESTHETICS)).unwrap();

        assert_eq!(table.events().len(), 4);
        assert_eq!(table.events()[0].tname, "orchestra/rftn20_rate");
        assert_eq!(table.events()[1].optype, GroupKey::from("Colorectal"));
        assert_eq!(table.events()[3].case_id, None);

        let cases = table.cases_receiving("orchestra/ppf20_rate");
        assert_eq!(cases, HashSet::from(["2"]));
    }

    #[test]
    fn test_load_tables_reads_both() {
        let dir = fixture();
        let (vitals, anesthetics) = load_tables(dir.path(), &LoadOptions::default()).unwrap();
        assert_eq!(vitals.readings().len(), 4);
        assert_eq!(anesthetics.events().len(), 4);
    }

    #[test]
    fn test_missing_file_fails_whole_load() {
        let dir = fixture();
        fs::remove_file(dir.path().join(files::ANESTHETICS)).unwrap();

        let err = load_tables(dir.path(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, VitalsError::MissingFile(_)));
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.csv");
        fs::write(&path, "signal,norm_time,value,optype\nmap,0.1,80,A\n").unwrap();

        let err = VitalsTable::load(&path).unwrap_err();
        assert!(matches!(err, VitalsError::MissingColumn(c) if c == vitals::EMOP));
    }

    #[test]
    fn test_case_ids_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.csv");
        fs::write(&path, " signal , norm_time,value,optype,emop\nmap,0.1,80,A,\n").unwrap();

        let table = VitalsTable::load(&path).unwrap();
        assert!(!table.has_case_ids());
        assert_eq!(table.readings()[0].case_id, None);
        assert!(table.readings()[0].emop.is_missing());
    }
}
