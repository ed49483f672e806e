use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};
use crate::objective::Evaluation;
use crate::space::Configuration;
use crate::types::ConfigOrigin;

use super::Smbo;

impl Smbo {
    /// Runs the optimization loop until the history holds `n_trials`
    /// evaluations, then returns the incumbent.
    ///
    /// Every iteration makes exactly one oracle call. A trial whose oracle
    /// call fails, or whose cost is not finite, is recorded as failed with
    /// cost `+inf` and the loop continues. Refit and callback failures are
    /// logged and never abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if no configuration completed
    /// its evaluations with a finite cost.
    pub fn optimize(&mut self) -> Result<Configuration> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "smbo.optimize",
            name = %self.scenario.name,
            seed = self.scenario.seed,
            n_trials = self.scenario.n_trials
        )
        .entered();

        self.start();
        while self.history.len() < self.scenario.n_trials {
            self.step();
        }
        self.finish()
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for callback in &mut self.callbacks {
            report_callback("on_start", callback.on_start(&self.scenario));
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn step(&mut self) {
        let (config, seed, origin) = self.next_configuration();
        let (cost, output) = match self.evaluate(&config, seed, origin) {
            Ok(Evaluation { cost, output }) => (cost, Some(output)),
            Err(error) => {
                trace_warn!(%config, %error, "oracle call failed");
                (f64::INFINITY, None)
            }
        };
        if output.is_some() && !cost.is_finite() {
            trace_warn!(%config, cost, "non-finite cost");
        }

        let trial = self.history.len();
        self.history.push(config, seed, cost, origin, output);
        let record = &self.history.records()[trial];
        trace_debug!(
            trial,
            config_id = record.config_id,
            cost = record.cost,
            origin = ?record.origin,
            "trial finished"
        );

        self.intensifier.observe(record, &self.history);
        for callback in &mut self.callbacks {
            report_callback("on_trial_end", callback.on_trial_end(record));
        }

        if self.history.len() % self.retrain_after == 0 {
            self.retrain();
        }
    }

    fn next_configuration(&mut self) -> (Configuration, u64, ConfigOrigin) {
        if let Some((config, seed)) = self.intensifier.next_repeat(&self.history) {
            return (config, seed, ConfigOrigin::Intensification);
        }
        let (config, origin) = match self.initial_design.pop_front() {
            Some(config) => (config, ConfigOrigin::InitialDesign),
            None => self.propose(),
        };
        let seed = self
            .intensifier
            .seed_for(&self.history, self.history.config_id(&config));
        (config, seed, origin)
    }

    fn evaluate(
        &mut self,
        config: &Configuration,
        seed: u64,
        origin: ConfigOrigin,
    ) -> Result<Evaluation> {
        if origin == ConfigOrigin::InitialDesign
            && let Some(result) = self.prefetched.remove(&config.key())
        {
            return result;
        }
        self.target.evaluate(config, seed)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn propose(&mut self) -> (Configuration, ConfigOrigin) {
        if self.random_design.check() {
            self.random_design_count += 1;
            return (self.space.sample_random(&mut self.rng), ConfigOrigin::Random);
        }
        if self.surrogate.is_fitted() {
            match self.maximize_acquisition() {
                Ok(Some(config)) => return (config, ConfigOrigin::Acquisition),
                Ok(None) => {
                    trace_debug!("every acquisition candidate was already evaluated");
                }
                Err(error) => {
                    trace_warn!(%error, "acquisition maximization failed");
                }
            }
        }
        (self.space.sample_random(&mut self.rng), ConfigOrigin::Random)
    }

    /// The highest-scoring candidate that has not been evaluated yet.
    fn maximize_acquisition(&self) -> Result<Option<Configuration>> {
        let mut acquisition = AcquisitionFunction::new(self.acquisition);
        acquisition.update(&*self.surrogate, self.intensifier.best_cost());

        let seeds: Vec<Vec<f64>> = self
            .intensifier
            .incumbents()
            .iter()
            .filter_map(|&(id, _)| self.history.configs().get(id))
            .map(|config| self.space.to_unit(config))
            .collect();
        let ranked = self
            .maximizer
            .maximize(&acquisition, self.space.len(), &seeds)?;

        for (point, _) in ranked {
            let config = self.space.from_unit(&point)?;
            if !self.history.contains(&config) {
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn retrain(&mut self) {
        match self.surrogate.train(&self.history) {
            Ok(()) => {
                trace_info!(
                    trials = self.history.len(),
                    fit_version = self.surrogate.fit_version(),
                    "surrogate retrained"
                );
            }
            Err(error) => {
                trace_warn!(%error, "surrogate refit failed, keeping the previous fit");
            }
        }
    }

    fn finish(&mut self) -> Result<Configuration> {
        let incumbent = self.intensifier.incumbent(&self.history).cloned();
        for callback in &mut self.callbacks {
            report_callback("on_end", callback.on_end(incumbent.as_ref()));
        }
        let Some(incumbent) = incumbent else {
            trace_warn!(trials = self.history.len(), "no configuration completed");
            return Err(Error::NoCompletedTrials);
        };
        trace_info!(
            cost = self.intensifier.best_cost(),
            config = %incumbent,
            "optimization finished"
        );
        Ok(incumbent)
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn report_callback(hook: &'static str, result: Result<()>) {
    if let Err(error) = result {
        trace_warn!(hook, %error, "callback failed");
    }
}
