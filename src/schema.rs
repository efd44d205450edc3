/// Column-name constants for the vitals and anesthetics tables.
/// Single source of truth - exported to Python via PyO3.

// ── Vital-sign samples ──────────────────────────────────────────────────────
pub mod vitals {
    pub const CASE_ID: &str = "caseid";
    pub const SIGNAL: &str = "signal";
    pub const NORM_TIME: &str = "norm_time";
    pub const VALUE: &str = "value";
    pub const OPTYPE: &str = "optype";
    pub const EMOP: &str = "emop";

    pub const REQUIRED: [&str; 5] = [SIGNAL, NORM_TIME, VALUE, OPTYPE, EMOP];
}

// ── Anesthetic administration records ───────────────────────────────────────
pub mod anesthetics {
    pub const CASE_ID: &str = "caseid";
    pub const TNAME: &str = "tname";
    pub const OPTYPE: &str = "optype";

    pub const REQUIRED: [&str; 2] = [TNAME, OPTYPE];
}

// ── Aggregated summary frame ────────────────────────────────────────────────
pub mod summary {
    pub const GROUP_KEY: &str = "group_key";
    pub const NORM_TIME: &str = "norm_time";
    pub const MEAN: &str = "mean";
    pub const SD: &str = "sd";
    pub const COUNT: &str = "count";
}

// ── Grouping dimensions ─────────────────────────────────────────────────────
pub mod group_by {
    pub const OPTYPE: &str = "optype";
    pub const EMOP: &str = "emop";
}

// ── Default file names ──────────────────────────────────────────────────────
pub mod files {
    pub const VITALS: &str = "long_surgery_vitals.csv";
    pub const ANESTHETICS: &str = "anesthetic_start_times.csv";
}
