/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::RunConfig,
    errors::error_chain,
    execution_modes::run_controller::{RunOutcome, RunReport},
};
use colored::Colorize;
use term_table::{row, row::Row, rows, table_cell::*, Table, TableStyle};

/// Table of the validated run parameters, printed before anything is created.
pub fn render_parameters(config: &RunConfig) -> String {
    let range = &config.test_range;
    let parameter = |name: &str, value: String| {
        row![
            TableCell::builder(name.bold()).build(),
            TableCell::new(value)
        ]
    };

    Table::builder()
        .rows(rows![
            parameter("Iterations", config.iterations.to_string()),
            parameter("Image", config.image.clone()),
            parameter("Tag", config.tag.clone()),
            parameter("Namespace", config.namespace.clone()),
            parameter("Primary node", config.nodes.primary.name.clone()),
            parameter("Secondary node", config.nodes.secondary.name.clone()),
            parameter("Host networking", config.host_networking.to_string()),
            parameter("Tests", format!("{} to {}", range.test_from, range.test_to)),
            parameter("Min message size", range.msg_size_min.to_string()),
            parameter("Min MSS", range.mss_size_min.to_string()),
            parameter("Results", config.results_dir.display().to_string())
        ])
        .style(TableStyle::rounded())
        .build()
        .render()
}

/// Per-iteration result files followed by the outcome of the run.
pub fn render_report(report: &RunReport) -> String {
    let mut rows: Vec<Row> = vec![row![
        TableCell::builder("Iteration".bold()).build(),
        TableCell::builder("Coordinator".bold()).build(),
        TableCell::builder("CSV".bold()).build(),
        TableCell::builder("JSON".bold()).build()
    ]];
    for result in &report.iterations {
        rows.push(row![
            TableCell::new(result.iteration),
            TableCell::new(&result.coordinator),
            TableCell::new(result.paths.csv.display()),
            TableCell::new(format!(
                "{} ({} bytes)",
                result.paths.json.display(),
                result.json_bytes
            ))
        ]);
    }

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();

    let outcome = match &report.outcome {
        RunOutcome::Completed => "Run completed".green(),
        RunOutcome::Interrupted => "Run interrupted".yellow(),
        RunOutcome::Failed(err) => format!("Run failed: {}", error_chain(err)).red(),
    };
    let cleanup = match &report.cleanup {
        Some(cleanup) if cleanup.failed > 0 => format!(
            "cleanup deleted {} object(s), {} could not be deleted",
            cleanup.deleted, cleanup.failed
        )
        .yellow(),
        Some(cleanup) => format!("cleanup deleted {} object(s)", cleanup.deleted).normal(),
        None => "cleanup failed, check the namespace for leftovers".red(),
    };

    format!("{}\n{} - {}", table.render(), outcome, cleanup)
}
