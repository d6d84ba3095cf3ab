use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use plotly::{
    common::{Mode, Title},
    layout::Axis,
    Configuration, Layout, Plot, Scatter,
};
use unindent::unindent;

use sched_stats_cli_types::ReportFormat;

use crate::{
    aggregation::{Collapsed, Metric},
    point::StatType,
};

const X_LABEL: &str = "Utilization cap";
const Y_LABEL: &str = "";

/// Measures every metric is plotted with, in output order.
pub const MEASURES: [StatType; 4] = [StatType::Max, StatType::Min, StatType::Avg, StatType::Var];

/// One measure of one metric, per utilization cap and scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotTable {
    pub name: String,
    pub schedulers: Vec<String>,
    /// (class, value per scheduler); `None` when the pair was not measured.
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl PlotTable {
    pub fn new(collapsed: &Collapsed, metric: Metric, measure: StatType) -> Self {
        let rows = collapsed
            .classes
            .iter()
            .map(|class| {
                let values = collapsed
                    .schedulers
                    .iter()
                    .map(|s| {
                        collapsed
                            .get(*s, class, metric)
                            .and_then(|m| m.get(measure))
                    })
                    .collect_vec();
                (class.clone(), values)
            })
            .collect_vec();

        PlotTable {
            name: format!("{metric}_{measure}"),
            schedulers: collapsed.schedulers.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    /// Comma-separated, header first; values with three decimals, missing
    /// values as empty fields.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(
            std::iter::once("class")
                .chain(self.schedulers.iter().map(String::as_str))
                .join(","),
        );
        for (class, values) in &self.rows {
            let fields = values.iter().map(|v| match v {
                Some(v) => format!("{:.3}", v),
                None => String::new(),
            });
            lines.push(std::iter::once(class.clone()).chain(fields).join(","));
        }
        let mut output = lines.join("\n");
        output.push('\n');
        output
    }
}

/// A file produced by a reporter, relative to the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub content: Vec<u8>,
}

trait Reporter {
    fn render(&self, table: &PlotTable) -> Vec<Artifact>;
}

struct GnuplotReporter {}

impl GnuplotReporter {
    fn script(table: &PlotTable) -> String {
        let chart = format!("{}.pdf", table.name);
        let data = format!("{}.csv", table.name);
        unindent(&format!(
            r##"
            #!/usr/bin/gnuplot
            reset
            set terminal pdf dashed enhanced font 'Verdana,10'
            set size ratio 0.5
            set output '{chart}'
            set datafile separator ","
            set border linewidth 4
            set style line 1 lc rgb "#ff420E" lt 1 lw 4 pt 2 ps 0.4 # --- red
            set style line 2 lc rgb "#004586" lt 3 lw 4 pt 7 ps 0.4 # --- blue
            set key left top
            set xlabel '{X_LABEL}' offset 0, 0.5
            set ylabel '{Y_LABEL}' offset 2
            set yrange [0:]
            plot '{data}' using 1:2 w lp ls 2 title columnhead, \
            '' using 1:3 w lp ls 1 title columnhead
            "##
        ))
    }
}

impl Reporter for GnuplotReporter {
    fn render(&self, table: &PlotTable) -> Vec<Artifact> {
        vec![
            Artifact {
                file_name: format!("{}.gnuplot", table.name),
                content: GnuplotReporter::script(table).into_bytes(),
            },
            Artifact {
                file_name: format!("{}.csv", table.name),
                content: table.to_csv().into_bytes(),
            },
        ]
    }
}

struct PlotlyReporter {}

impl Reporter for PlotlyReporter {
    fn render(&self, table: &PlotTable) -> Vec<Artifact> {
        let config = Configuration::default().responsive(true).fill_frame(false);
        let mut plot = Plot::new();
        plot.set_configuration(config);

        let classes = table.rows.iter().map(|(c, _)| c.clone()).collect_vec();
        for (i, scheduler) in table.schedulers.iter().enumerate() {
            let values = table.rows.iter().map(|(_, v)| v[i]).collect_vec();
            let trace = Scatter::new(classes.clone(), values)
                .mode(Mode::LinesMarkers)
                .name(scheduler);
            plot.add_trace(trace);
        }

        let layout = Layout::new()
            .title(Title::from(table.name.as_str()))
            .x_axis(Axis::new().title(Title::from(X_LABEL)))
            .y_axis(Axis::new().title(Title::from(Y_LABEL)));
        plot.set_layout(layout);

        vec![Artifact {
            file_name: format!("{}.html", table.name),
            content: plot.to_html().into_bytes(),
        }]
    }
}

struct ReporterFactory {}

impl ReporterFactory {
    fn from_format(format: ReportFormat) -> Box<dyn Reporter> {
        match format {
            ReportFormat::Gnuplot => Box::new(GnuplotReporter {}),
            ReportFormat::Html => Box::new(PlotlyReporter {}),
        }
    }
}

/// Artifacts of every metric and measure, in output order.
pub fn render_all(collapsed: &Collapsed, format: ReportFormat) -> Vec<Artifact> {
    let reporter = ReporterFactory::from_format(format);
    Metric::ALL
        .into_iter()
        .cartesian_product(MEASURES)
        .flat_map(|(metric, measure)| reporter.render(&PlotTable::new(collapsed, metric, measure)))
        .collect()
}

/// Writes the plot data of every metric and measure into `out_dir`.
pub fn report(collapsed: &Collapsed, out_dir: &Path, format: ReportFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    for artifact in render_all(collapsed, format) {
        let path = out_dir.join(&artifact.file_name);
        File::create(&path)
            .and_then(|mut f| f.write_all(&artifact.content))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    info!("wrote {} files to {}", written.len(), out_dir.display());
    Ok(written)
}
