//! Run descriptions and the commands that execute them.

use anyhow::{bail, Context, Result};
use critline_core::critical::{
    criticality_conditions, get_drhovec_dt_crit, minimum_eigenvalue_psi_hessian, Termination,
    TracePoint,
};
use critline_core::isochoric::{pressure, splus};
use critline_core::{
    trace_critical_arclength_binary, ContinuationOptions, CriticalTrace, ModelSpec, ResidualModel,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// A trace request: the model and the critical point to start from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelSpec,
    #[serde(rename = "T0 / K")]
    pub t0: f64,
    #[serde(rename = "rhovec0 / mol/m^3")]
    pub rhovec0: Vec<f64>,
    #[serde(default)]
    pub options: ContinuationOptions,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid run file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(text).context("Failed to parse run JSON.")?;
        if config.rhovec0.len() != 2 {
            bail!(
                "rhovec0 must hold two concentrations, got {}.",
                config.rhovec0.len()
            );
        }
        Ok(config)
    }
}

/// Traces the critical locus described by `config`, mirroring progress into
/// a CSV file at `progress` when given.
pub fn run_trace(config: &RunConfig, progress: Option<&Path>) -> Result<CriticalTrace> {
    let model = config.model.build().context("Failed to build model.")?;
    let rhovec0 = DVector::from_column_slice(&config.rhovec0);

    let mut sink = match progress {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create progress file {}", path.display())
        })?)),
        None => None,
    };
    let trace = trace_critical_arclength_binary(
        &model,
        config.t0,
        &rhovec0,
        config.options,
        sink.as_mut().map(|w| w as &mut dyn Write),
    )
    .context("Failed to start the critical trace.")?;

    match &trace.termination {
        Termination::IntegrationError(err) => {
            warn!(error = %err, points = trace.points.len(), "trace ended on an integration error")
        }
        other => info!(points = trace.points.len(), termination = %other, "trace complete"),
    }
    Ok(trace)
}

/// Writes the trace as a JSON array, to `output` or stdout.
pub fn write_points(points: &[TracePoint], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, points).context("Failed to write trace JSON.")?;
            writer.flush().context("Failed to flush trace JSON.")?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, points).context("Failed to write trace JSON.")?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

/// Criticality diagnostics of a single state.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionsReport {
    #[serde(rename = "T / K")]
    pub temperature: f64,
    #[serde(rename = "rhovec / mol/m^3")]
    pub rhovec: Vec<f64>,
    #[serde(rename = "p / Pa")]
    pub pressure: f64,
    #[serde(rename = "s^+")]
    pub splus: f64,
    /// Second and third derivatives of Psi along v0.
    pub conditions: [f64; 2],
    pub min_eigenvalue: f64,
    #[serde(rename = "drhovec/dT", skip_serializing_if = "Option::is_none")]
    pub drhovec_dt: Option<Vec<f64>>,
}

pub fn run_conditions(config: &RunConfig) -> Result<ConditionsReport> {
    let model = config.model.build().context("Failed to build model.")?;
    if model.component_count() != config.rhovec0.len() {
        bail!(
            "Model has {} components but rhovec0 has {}.",
            model.component_count(),
            config.rhovec0.len()
        );
    }
    let t = config.t0;
    let rhovec = DVector::from_column_slice(&config.rhovec0);

    let conditions = criticality_conditions(&model, t, &rhovec)
        .context("Failed to evaluate the criticality conditions.")?;
    let min_eigenvalue = minimum_eigenvalue_psi_hessian(&model, t, &rhovec)
        .context("Failed to solve the curvature eigenproblem.")?;
    let drhovec_dt = get_drhovec_dt_crit(&model, t, &rhovec)
        .map(|slope| slope.iter().copied().collect())
        .ok();

    Ok(ConditionsReport {
        temperature: t,
        rhovec: config.rhovec0.clone(),
        pressure: pressure(&model, t, &config.rhovec0),
        splus: splus(&model, t, &config.rhovec0),
        conditions,
        min_eigenvalue,
        drhovec_dt,
    })
}
