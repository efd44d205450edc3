//! Chart module: vital-sign trend lines over normalized surgery progress.
//!
//! `render` is a pure function of the view state and the aggregated series.
//! It produces a self-contained SVG document with one root `<g>` holding
//! both axes, the axis labels, one smoothed path per visible group, hover
//! markers per bucket and a legend whose entries carry `data-key` attributes
//! for the host to turn into toggle events. The missing-value group carries
//! `data-missing="true"` instead of a key.

use std::fmt::{self, Write as FmtWrite};

use tracing::debug;

use crate::aggregate::{value_range, GroupKey, Series};
use crate::catalog::OptionCatalog;
use crate::scale::{fmt_coord, format_number, format_percent, monotone_x_path, LinearScale};
use crate::view::ViewState;

/// d3's Category10 scheme.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

const X_LABEL: &str = "Progress Through Surgery";
const Y_LABEL: &str = "Average Vital Value";
const TICK_SIZE: f64 = 6.0;
const LEGEND_ROW_PX: f64 = 18.0;
const LEGEND_WIDTH_PX: f64 = 160.0;
const INACTIVE_OPACITY: f64 = 0.3;
const POINT_RADIUS: f64 = 4.0;

// ── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Pixel geometry of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    /// Outer SVG width including margins.
    pub width: f64,
    /// Outer SVG height including margins.
    pub height: f64,
    pub margin: Margin,
    /// Approximate tick count per axis
    pub x_ticks: usize,
    pub y_ticks: usize,
    pub stroke_width: f64,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: 1100.0,
            height: 400.0,
            margin: Margin {
                top: 50.0,
                right: 40.0,
                bottom: 50.0,
                left: 60.0,
            },
            x_ticks: 10,
            y_ticks: 10,
            stroke_width: 2.0,
        }
    }
}

impl ChartLayout {
    pub fn inner_width(&self) -> f64 {
        (self.width - self.margin.left - self.margin.right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }
}

// ── Output ──────────────────────────────────────────────────────────────────

/// Rendered chart plus the layout facts tests and hosts care about.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSvg {
    pub svg: String,
    pub visible_series: usize,
    pub y_domain: (f64, f64),
}

impl ChartSvg {
    pub fn as_str(&self) -> &str {
        &self.svg
    }

    pub fn into_string(self) -> String {
        self.svg
    }
}

impl fmt::Display for ChartSvg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.svg)
    }
}

/// Color of a group: its stable position in the catalog's key order for the
/// active dimension, falling back to the series' own position.
pub fn series_color(
    catalog: &OptionCatalog,
    state: &ViewState,
    series: &Series,
    fallback: usize,
) -> &'static str {
    let index = catalog
        .group_index(state.group_by, &series.key)
        .unwrap_or(fallback);
    CATEGORY10[index % CATEGORY10.len()]
}

/// Vertical domain for the visible series. Empty input falls back to
/// `[0, 1]`; a zero-height extent is widened by one unit each way.
pub fn y_domain<'a, I>(visible: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a Series>,
{
    match value_range(visible) {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => (lo - 1.0, hi + 1.0),
        Some(range) => range,
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

pub fn render(
    state: &ViewState,
    summary: &[Series],
    catalog: &OptionCatalog,
    layout: &ChartLayout,
) -> ChartSvg {
    let inner_w = layout.inner_width();
    let inner_h = layout.inner_height();

    let visible: Vec<(usize, &Series)> = summary
        .iter()
        .enumerate()
        .filter(|(_, s)| state.is_visible(&s.key))
        .collect();
    let y_dom = y_domain(visible.iter().map(|(_, s)| *s));

    let x = LinearScale::new((0.0, 1.0), (0.0, inner_w));
    let y = LinearScale::new(y_dom, (inner_h, 0.0));

    let mut svg = String::new();
    write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" font-family="sans-serif">
<g transform="translate({ml},{mt})">
"##,
        w = fmt_coord(layout.width),
        h = fmt_coord(layout.height),
        ml = fmt_coord(layout.margin.left),
        mt = fmt_coord(layout.margin.top),
    )
    .unwrap();

    write_x_axis(&mut svg, &x, inner_h, layout.x_ticks);
    write_y_axis(&mut svg, &y, layout.y_ticks);

    write!(
        svg,
        r##"<text class="axis-label" text-anchor="middle" x="{}" y="{}">{}</text>
<text class="axis-label" text-anchor="middle" transform="rotate(-90)" x="{}" y="{}">{}</text>
"##,
        fmt_coord(inner_w / 2.0),
        fmt_coord(inner_h + layout.margin.bottom - 5.0),
        X_LABEL,
        fmt_coord(-inner_h / 2.0),
        fmt_coord(-layout.margin.left + 15.0),
        Y_LABEL,
    )
    .unwrap();

    svg.push_str("<g class=\"lines\">\n");
    for (position, series) in &visible {
        let points: Vec<(f64, f64)> = series
            .buckets
            .iter()
            .map(|b| (x.apply(b.norm_time), y.apply(b.mean)))
            .collect();
        write!(
            svg,
            r##"<path class="line" {key} fill="none" stroke="{color}" stroke-width="{sw}" d="{d}"><title>{dim}: {label} ({n} readings)</title></path>
"##,
            key = key_attr(&series.key),
            color = series_color(catalog, state, series, *position),
            sw = fmt_coord(layout.stroke_width),
            d = monotone_x_path(&points),
            dim = state.group_by.label(),
            label = escape_xml(series.key.label()),
            n = series.reading_count(),
        )
        .unwrap();
    }
    svg.push_str("</g>\n");

    svg.push_str("<g class=\"points\">\n");
    for (position, series) in &visible {
        let color = series_color(catalog, state, series, *position);
        for bucket in &series.buckets {
            write!(
                svg,
                r##"<circle class="point" {key} cx="{cx}" cy="{cy}" r="{r}" fill="{color}" fill-opacity="0"><title>{label} at {t}: mean {mean:.1}, first {first}, n = {n}</title></circle>
"##,
                key = key_attr(&series.key),
                cx = fmt_coord(x.apply(bucket.norm_time)),
                cy = fmt_coord(y.apply(bucket.mean)),
                r = fmt_coord(POINT_RADIUS),
                label = escape_xml(series.key.label()),
                t = format_percent(bucket.norm_time),
                mean = bucket.mean,
                first = fmt_coord(bucket.first_value),
                n = bucket.count,
            )
            .unwrap();
        }
    }
    svg.push_str("</g>\n");

    write_legend(&mut svg, state, summary, catalog, inner_w);
    svg.push_str("</g>\n</svg>");

    debug!(
        vital = %state.vital,
        group_by = state.group_by.column(),
        series = summary.len(),
        visible = visible.len(),
        "rendered chart"
    );

    ChartSvg {
        svg,
        visible_series: visible.len(),
        y_domain: y_dom,
    }
}

fn write_x_axis(svg: &mut String, x: &LinearScale, inner_h: f64, count: usize) {
    let (r0, r1) = x.range();
    write!(
        svg,
        r##"<g class="x-axis" transform="translate(0,{})" fill="none" font-size="10" text-anchor="middle">
<path class="domain" stroke="currentColor" d="M{},{}V0H{}V{}"/>
"##,
        fmt_coord(inner_h),
        fmt_coord(r0),
        fmt_coord(TICK_SIZE),
        fmt_coord(r1),
        fmt_coord(TICK_SIZE),
    )
    .unwrap();
    for t in x.ticks(count) {
        write!(
            svg,
            r##"<g class="tick" transform="translate({},0)"><line stroke="currentColor" y2="{}"/><text fill="currentColor" y="{}" dy="0.71em">{}</text></g>
"##,
            fmt_coord(x.apply(t)),
            fmt_coord(TICK_SIZE),
            fmt_coord(TICK_SIZE + 3.0),
            format_percent(t),
        )
        .unwrap();
    }
    svg.push_str("</g>\n");
}

fn write_y_axis(svg: &mut String, y: &LinearScale, count: usize) {
    let (r0, r1) = y.range();
    write!(
        svg,
        r##"<g class="y-axis" fill="none" font-size="10" text-anchor="end">
<path class="domain" stroke="currentColor" d="M-{},{}H0V{}H-{}"/>
"##,
        fmt_coord(TICK_SIZE),
        fmt_coord(r0),
        fmt_coord(r1),
        fmt_coord(TICK_SIZE),
    )
    .unwrap();
    let step = y.tick_step(count);
    for t in y.ticks(count) {
        write!(
            svg,
            r##"<g class="tick" transform="translate(0,{})"><line stroke="currentColor" x2="-{}"/><text fill="currentColor" x="-{}" dy="0.32em">{}</text></g>
"##,
            fmt_coord(y.apply(t)),
            fmt_coord(TICK_SIZE),
            fmt_coord(TICK_SIZE + 3.0),
            format_number(t, step),
        )
        .unwrap();
    }
    svg.push_str("</g>\n");
}

fn write_legend(
    svg: &mut String,
    state: &ViewState,
    summary: &[Series],
    catalog: &OptionCatalog,
    inner_w: f64,
) {
    write!(
        svg,
        "<g class=\"legend\" transform=\"translate({},0)\" font-size=\"11\">\n",
        fmt_coord((inner_w - LEGEND_WIDTH_PX).max(0.0))
    )
    .unwrap();
    for (i, series) in summary.iter().enumerate() {
        let opacity = if state.is_visible(&series.key) {
            1.0
        } else {
            INACTIVE_OPACITY
        };
        write!(
            svg,
            r##"<g class="legend-item" {key} opacity="{op}" transform="translate(0,{dy})"><rect width="12" height="12" fill="{color}"/><text x="16" y="10" fill="currentColor">{label}</text></g>
"##,
            key = key_attr(&series.key),
            op = fmt_coord(opacity),
            dy = fmt_coord(i as f64 * LEGEND_ROW_PX),
            color = series_color(catalog, state, series, i),
            label = escape_xml(series.key.label()),
        )
        .unwrap();
    }
    svg.push_str("</g>\n");
}

/// Attribute naming a series' group, readable back with `GroupKey::new`.
fn key_attr(key: &GroupKey) -> String {
    match key.as_str() {
        Some(k) => format!("data-key=\"{}\"", escape_xml(k)),
        None => "data-missing=\"true\"".to_string(),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GroupBy, GroupKey};
    use crate::loader::VitalReading;
    use crate::view::ViewEvent;

    fn reading(optype: &str, emop: &str, t: f64, v: f64) -> VitalReading {
        VitalReading {
            case_id: None,
            signal: "map".to_string(),
            norm_time: t,
            value: v,
            optype: GroupKey::from(optype),
            emop: GroupKey::from(emop),
        }
    }

    fn readings() -> Vec<VitalReading> {
        vec![
            reading("Colorectal", "0", 0.0, 70.0),
            reading("Colorectal", "0", 0.5, 80.0),
            reading("Colorectal", "0", 1.0, 75.0),
            reading("Stomach & Duodenum", "1", 0.0, 90.0),
            reading("Stomach & Duodenum", "1", 0.5, 100.0),
        ]
    }

    fn draw(state: &ViewState) -> ChartSvg {
        let readings = readings();
        let catalog = OptionCatalog::build(&readings, &[]);
        let summary = aggregate(&readings, &state.vital, state.group_by);
        render(state, &summary, &catalog, &ChartLayout::default())
    }

    #[test]
    fn test_one_path_per_visible_group() {
        let chart = draw(&ViewState::default());
        assert_eq!(chart.visible_series, 2);
        assert_eq!(chart.as_str().matches("<path class=\"line\"").count(), 2);
        assert!(chart.as_str().starts_with("<svg"));
        assert!(chart.as_str().ends_with("</svg>"));
        assert_eq!(chart.y_domain, (70.0, 100.0));
    }

    #[test]
    fn test_axes_and_labels() {
        let chart = draw(&ViewState::default());
        let svg = chart.as_str();
        assert!(svg.contains("class=\"x-axis\" transform=\"translate(0,300)\""));
        assert!(svg.contains(">50%</text>"));
        assert!(svg.contains(">100%</text>"));
        assert!(svg.contains(">80</text>"));
        assert!(svg.contains(">Progress Through Surgery</text>"));
        assert!(svg.contains(">Average Vital Value</text>"));
    }

    #[test]
    fn test_legend_toggle_hides_other_groups() {
        let state = ViewState::default().apply(ViewEvent::ToggleGroup(GroupKey::from("1")));
        let chart = draw(&state);

        assert_eq!(chart.visible_series, 1);
        assert_eq!(chart.y_domain, (90.0, 100.0));
        assert!(chart.as_str().contains("data-key=\"1\" fill=\"none\""));
        assert!(chart.as_str().contains("data-key=\"0\" opacity=\"0.3\""));
        assert_eq!(chart.as_str().matches("class=\"legend-item\"").count(), 2);
    }

    #[test]
    fn test_empty_selection_draws_no_lines() {
        let state = ViewState::default().apply(ViewEvent::SelectVital("nonexistent".into()));
        let chart = draw(&state);

        assert_eq!(chart.visible_series, 0);
        assert_eq!(chart.y_domain, (0.0, 1.0));
        assert!(!chart.as_str().contains("<path class=\"line\""));
        assert!(chart.as_str().contains("class=\"y-axis\""));
    }

    #[test]
    fn test_colors_follow_catalog_order() {
        let state = ViewState::default()
            .apply(ViewEvent::SelectGroup(GroupBy::SurgeryType))
            .apply(ViewEvent::ToggleGroup(GroupKey::from("Stomach & Duodenum")));
        let chart = draw(&state);

        // Hiding the first group must not shift the second group's color.
        assert!(chart.as_str().contains(&format!("stroke=\"{}\"", CATEGORY10[1])));
        assert!(!chart.as_str().contains(&format!("stroke=\"{}\"", CATEGORY10[0])));
        assert!(chart.as_str().contains("Stomach &amp; Duodenum"));
    }

    /// Group keys of the legend entries as a host would read them back.
    fn legend_keys(svg: &str) -> Vec<GroupKey> {
        svg.split("<g class=\"legend-item\" ")
            .skip(1)
            .map(|entry| match entry.strip_prefix("data-key=\"") {
                Some(rest) => GroupKey::new(rest.split('"').next()),
                None => {
                    assert!(entry.starts_with("data-missing=\"true\""));
                    GroupKey::missing()
                }
            })
            .collect()
    }

    #[test]
    fn test_legend_keys_round_trip_into_toggles() {
        let readings = vec![
            reading("Colorectal", "0", 0.1, 70.0),
            reading("Colorectal", "", 0.1, 80.0),
            reading("Colorectal", "(missing)", 0.1, 90.0),
        ];
        let catalog = OptionCatalog::build(&readings, &[]);
        let draw = |state: &ViewState| {
            let summary = aggregate(&readings, &state.vital, state.group_by);
            render(state, &summary, &catalog, &ChartLayout::default())
        };

        let state = ViewState::default();
        let keys = legend_keys(draw(&state).as_str());
        assert_eq!(
            keys,
            [GroupKey::from("0"), GroupKey::missing(), GroupKey::from("(missing)")]
        );

        let state = state.apply(ViewEvent::ToggleGroup(keys[1].clone()));
        let chart = draw(&state);
        assert_eq!(chart.visible_series, 1);
        assert_eq!(chart.y_domain, (79.0, 81.0));
        assert!(chart.as_str().contains("<path class=\"line\" data-missing=\"true\""));

        let state = state
            .apply(ViewEvent::ToggleGroup(keys[1].clone()))
            .apply(ViewEvent::ToggleGroup(keys[2].clone()));
        let chart = draw(&state);
        assert_eq!(chart.visible_series, 1);
        assert_eq!(chart.y_domain, (89.0, 91.0));
    }

    #[test]
    fn test_points_show_first_value() {
        let readings = vec![
            reading("Colorectal", "0", 0.25, 70.0),
            reading("Colorectal", "0", 0.25, 74.0),
        ];
        let catalog = OptionCatalog::build(&readings, &[]);
        let state = ViewState::default();
        let summary = aggregate(&readings, &state.vital, state.group_by);
        let chart = render(&state, &summary, &catalog, &ChartLayout::default());

        assert_eq!(chart.as_str().matches("<circle class=\"point\"").count(), 1);
        assert!(chart
            .as_str()
            .contains("<title>0 at 25%: mean 72.0, first 70, n = 2</title>"));
    }

    #[test]
    fn test_flat_domain_is_widened() {
        let flat = vec![Series {
            key: GroupKey::from("0"),
            buckets: vec![crate::aggregate::Bucket {
                norm_time: 0.5,
                mean: 80.0,
                sd: None,
                count: 1,
                first_value: 80.0,
            }],
        }];
        assert_eq!(y_domain(&flat), (79.0, 81.0));
    }
}
