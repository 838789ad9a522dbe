use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};

use crate::config::SweepConfig;
use crate::datastructures::*;
use crate::error::SweepError;
use crate::kpi;
use crate::patcher;
use crate::result_table::ResultTable;
use crate::solver::SolverCommand;


/// Flag that stops a sweep before its next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The shared flag, e.g. for registering a signal handler.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Model files of `dir` in sorted order, so the run sequence is
/// reproducible.
pub fn list_models(dir: &Path) -> Result<Vec<String>, SweepError> {
    Ok(fs::read_dir(dir)
        .map_err(|e| SweepError::io(dir, e))?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .sorted()
        .collect())
}

/// Everything a sweep needs, built once before the first run.
#[derive(Debug)]
pub struct SweepContext {
    config: SweepConfig,
    models: Vec<String>,
    solver: SolverCommand,
    tables: BTreeMap<Dialect, ResultTable>,
}

impl SweepContext {
    /// Lists the models and starts fresh result tables for every configured
    /// dialect.
    pub fn prepare(config: SweepConfig) -> Result<Self, SweepError> {
        let models = list_models(&config.models_dir)?;
        let mut tables = BTreeMap::new();
        for (&dialect, name) in &config.tables {
            let path = config.out_dir.join(name);
            tables.insert(dialect, ResultTable::create(&path, dialect)?);
        }
        let solver =
            SolverCommand::new(config.solver.clone(), config.timeout)
                .with_args(config.solver_args.clone());
        Ok(Self {
            config,
            models,
            solver,
            tables,
        })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn table(&self, dialect: Dialect) -> Option<&ResultTable> {
        self.tables.get(&dialect)
    }

    /// Every (model, instance, parameter) triple in run order: model, then
    /// instance, then parameter value.
    pub fn run_keys(&self) -> Vec<RunKey> {
        self.models
            .iter()
            .cartesian_product(self.config.instances.iter())
            .cartesian_product(self.config.parameter.range.iter())
            .map(|((model, instance), parameter)| {
                RunKey::new(model.clone(), instance, parameter)
            })
            .collect()
    }

    /// Runs the whole sweep. Run-level failures are recorded in the summary,
    /// persistence and launch failures abort it, and so does `cancel`.
    pub fn run(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        self.run_with(cancel, |_, _| ())
    }

    /// Like [`SweepContext::run`], calling `observe` after every finished
    /// iteration. Rows of finished iterations are on disk at that point.
    pub fn run_with<F>(
        &mut self,
        cancel: &CancellationToken,
        mut observe: F,
    ) -> Result<SweepSummary, SweepError>
    where
        F: FnMut(&RunKey, &RunOutcome),
    {
        self.solver.cancel = Some(cancel.flag());
        let keys = self.run_keys();
        let total = keys.len();
        let mut summary = SweepSummary::default();
        for (idx, key) in keys.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Cancelled after {idx} of {total} runs");
                return Err(SweepError::Cancelled);
            }
            info!("[{}/{total}] {key}", idx + 1);
            let outcome = self.run_once(&key)?;
            match &outcome {
                RunOutcome::Success { metrics } => {
                    debug!("{key}: {metrics} metrics recorded")
                }
                RunOutcome::Skipped(reason) => warn!("{key}: skipped, {reason}"),
                RunOutcome::Failed(reason) => warn!("{key}: failed, {reason}"),
            }
            observe(&key, &outcome);
            summary.runs.push((key, outcome));
        }
        Ok(summary)
    }

    /// One iteration: patch, solve, extract, append.
    pub fn run_once(&mut self, key: &RunKey) -> Result<RunOutcome, SweepError> {
        let Some(&dialect) = self.config.dialects.get(&key.model) else {
            let err = SweepError::UnknownModelDialect(key.model.clone());
            return Ok(RunOutcome::Skipped(err.to_string()));
        };
        let data = self.config.instance_file(key.instance);
        if !data.is_file() {
            return Ok(RunOutcome::Failed(format!(
                "instance file {:?} not found",
                data
            )));
        }
        let parameter = &self.config.parameter;
        match patcher::patch_parameter(
            &data,
            &parameter.name,
            key.parameter,
            parameter.patch_mode,
        ) {
            Ok(_) => (),
            Err(err @ SweepError::ParameterNotFound { .. }) => {
                return Ok(RunOutcome::Skipped(err.to_string()))
            }
            Err(err) => return Ok(RunOutcome::Failed(err.to_string())),
        }

        let model = self.config.models_dir.join(&key.model);
        let output = match self.solver.run(&model, &data) {
            Ok(output) => output,
            Err(err) if err.aborts_sweep() => return Err(err),
            Err(err) => return Ok(RunOutcome::Failed(err.to_string())),
        };
        debug!("Solver output for {key}:\n{}", output.stdout);
        if !output.stderr.trim().is_empty() {
            debug!("Solver stderr for {key}:\n{}", output.stderr);
        }

        let record = kpi::extract(&output.stdout, dialect);
        let table = self.tables.get_mut(&dialect).ok_or_else(|| {
            SweepError::persistence(
                &self.config.out_dir,
                format!("no result table for dialect {dialect}"),
            )
        })?;
        table.append(key, &record)?;
        Ok(RunOutcome::Success {
            metrics: record.len(),
        })
    }
}
