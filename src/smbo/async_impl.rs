use std::sync::Arc;

use crate::error::{Error, Result};
use crate::space::Configuration;

use super::Smbo;

impl Smbo {
    /// Like [`optimize`](Self::optimize), but evaluates the first
    /// evaluations of the initial design concurrently before the loop.
    ///
    /// Up to `concurrency` oracle calls run at once, each wrapped in
    /// [`spawn_blocking`](tokio::task::spawn_blocking). Only design
    /// configurations the loop is guaranteed to reach are evaluated ahead,
    /// so the number of oracle calls still equals `n_trials`. The loop then
    /// consumes those results instead of calling the oracle again, and the
    /// outcome is identical to a sequential run with the same seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `concurrency` is zero,
    /// [`Error::TaskError`] if a spawned evaluation panics, and
    /// [`Error::NoCompletedTrials`] like [`optimize`](Self::optimize).
    ///
    /// # Examples
    ///
    /// ```
    /// use smbo::prelude::*;
    ///
    /// # #[cfg(feature = "async")]
    /// # async fn example() -> smbo::Result<()> {
    /// let oracle = FnOracle::new(2, (1, 2), |x: &[f64]| Field::from_row_slice(1, 2, x));
    /// let space = ConfigurationSpace::uniform(2, 0.01, 1.0)?;
    /// let mut smbo = Smbo::builder()
    ///     .scenario(Scenario::builder().n_trials(20).build())
    ///     .space(space)
    ///     .oracle(oracle)
    ///     .build()?;
    ///
    /// smbo.optimize_parallel(4).await?;
    /// assert_eq!(smbo.runhistory().len(), 20);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn optimize_parallel(&mut self, concurrency: usize) -> Result<Configuration> {
        use tokio::sync::Semaphore;
        use tokio::task::JoinSet;

        if concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }

        let batch: Vec<Configuration> = if self.history.is_empty() {
            let reachable = self
                .scenario
                .n_trials
                .div_ceil(self.intensifier.max_config_calls());
            self.initial_design.iter().take(reachable).cloned().collect()
        } else {
            Vec::new()
        };
        trace_info!(n = batch.len(), concurrency, "evaluating initial design concurrently");

        let seed = self.intensifier.seed_for(&self.history, None);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();

        for (index, config) in batch.iter().cloned().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskError(e.to_string()))?;
            let target = self.target.clone();
            join_set.spawn(async move {
                let result =
                    tokio::task::spawn_blocking(move || target.evaluate(&config, seed)).await;
                drop(permit);
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| Error::TaskError(e.to_string()))?;
            let evaluation = result.map_err(|e| Error::TaskError(e.to_string()))?;
            self.prefetched.insert(batch[index].key(), evaluation);
        }

        self.optimize()
    }
}
