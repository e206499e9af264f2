//! SOM initialization and training.
//!
//! Training is the classic online Kohonen schedule: every iteration is one
//! full pass over the training set in set order. For each vector the BMU is
//! found and every node inside the shrinking neighborhood is pulled toward
//! the vector with a Gaussian falloff. Later vectors see the prototypes the
//! earlier ones already moved, so vectors are never processed in parallel.

use crate::config::{LatticeGuard, SomConfig, CLAMPED_LATTICE_RADIUS};
use crate::data::{FeatureKeys, FeatureVector, TrainingSet};
use crate::error::{KohonenError, Result};
use crate::random::RandomStream;
use crate::som::map::check_keys;
use crate::som::{GridNode, SomGrid};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decay schedule derived from the grid size and iteration budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    /// Initial neighborhood radius, `max(width, height) / 2` in whole cells.
    pub lattice_radius: f64,
    /// `iterations / ln(lattice_radius)`.
    pub time_constant: f64,
    /// Learning rate of iteration 0.
    pub learning_rate_start: f64,
    /// Iteration budget.
    pub iterations: usize,
}

impl Schedule {
    /// Neighborhood radius at iteration `t`: `lattice_radius * exp(-t / time_constant)`.
    #[inline]
    pub fn neighborhood_radius(&self, t: usize) -> f64 {
        self.lattice_radius * (-(t as f64) / self.time_constant).exp()
    }

    /// Learning rate at iteration `t`: `learning_rate_start * exp(-t / iterations)`.
    #[inline]
    pub fn learning_rate(&self, t: usize) -> f64 {
        self.learning_rate_start * (-(t as f64) / self.iterations as f64).exp()
    }
}

/// Progress of one finished iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationProgress {
    /// Zero-based index of the iteration that just finished.
    pub iteration: usize,
    /// Iteration budget.
    pub iterations: usize,
    /// Learning rate used by this iteration.
    pub learning_rate: f64,
    /// Learning rate the next iteration will use.
    pub next_learning_rate: f64,
    /// Neighborhood radius used by this iteration.
    pub neighborhood_radius: f64,
    /// Wall time of this iteration.
    pub iteration_elapsed: Duration,
    /// Wall time since training started.
    pub total_elapsed: Duration,
}

/// Receives progress between iterations.
///
/// The grid is handed over by shared reference while no update is running,
/// so an observer may clone it as a display snapshot.
pub trait TrainingObserver {
    /// Called after every completed iteration.
    fn on_iteration(&mut self, progress: &IterationProgress, grid: &SomGrid);
}

impl<F> TrainingObserver for F
where
    F: FnMut(&IterationProgress, &SomGrid),
{
    fn on_iteration(&mut self, progress: &IterationProgress, grid: &SomGrid) {
        self(progress, grid)
    }
}

/// Observer that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TrainingObserver for NoProgress {
    fn on_iteration(&mut self, _progress: &IterationProgress, _grid: &SomGrid) {}
}

/// Observer that forwards progress over a channel.
///
/// A disconnected receiver is ignored; training carries on.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub Sender<IterationProgress>);

impl TrainingObserver for ChannelObserver {
    fn on_iteration(&mut self, progress: &IterationProgress, _grid: &SomGrid) {
        let _ = self.0.send(*progress);
    }
}

/// Cooperative cancellation flag, checked at the start of every iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`CancellationToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    /// Number of full passes over the training set.
    pub iterations_completed: usize,
    /// True if the run stopped on a cancellation request.
    pub cancelled: bool,
    /// Learning rate the next iteration would have used.
    pub final_learning_rate: f64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Builds and trains [`SomGrid`]s according to a [`SomConfig`].
#[derive(Debug, Clone)]
pub struct TrainingEngine {
    config: SomConfig,
}

impl TrainingEngine {
    /// Creates an engine; the configuration is validated first.
    pub fn new(config: SomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The engine configuration.
    pub fn config(&self) -> &SomConfig {
        &self.config
    }

    /// Decay schedule for a `width` x `height` grid, after applying the
    /// lattice guard.
    pub fn schedule(&self, width: usize, height: usize) -> Result<Schedule> {
        let mut lattice_radius = (width.max(height) / 2) as f64;

        if lattice_radius <= 1.0 {
            match self.config.lattice_guard {
                LatticeGuard::Reject => {
                    return Err(KohonenError::DegenerateLattice {
                        radius: lattice_radius,
                    });
                }
                LatticeGuard::Clamp => {
                    warn!(
                        "Lattice radius {} of {}x{} grid clamped to {}",
                        lattice_radius, width, height, CLAMPED_LATTICE_RADIUS
                    );
                    lattice_radius = CLAMPED_LATTICE_RADIUS;
                }
                LatticeGuard::Warn => {
                    warn!(
                        "Lattice radius {} of {}x{} grid gives a non-positive decay constant; \
                         the neighborhood schedule is not meaningful",
                        lattice_radius, width, height
                    );
                }
            }
        }

        Ok(Schedule {
            lattice_radius,
            time_constant: self.config.iterations as f64 / lattice_radius.ln(),
            learning_rate_start: self.config.learning_rate_start,
            iterations: self.config.iterations,
        })
    }

    /// Builds a grid from `set` using the configured seed and random stream.
    ///
    /// See [`TrainingEngine::initialize_with`].
    pub fn initialize(&self, set: Arc<TrainingSet>, keys: &[String]) -> Result<SomGrid> {
        let seed = self.config.resolve_seed();
        let mut stream = self.config.random.stream(seed);
        self.initialize_with(set, keys, seed, stream.as_mut())
    }

    /// Builds a grid whose prototypes are drawn uniformly between each
    /// feature's minimum and maximum over `set`.
    ///
    /// One value is drawn from `stream` per feature per node, nodes visited
    /// x outer, y inner, features in `keys` order. Every prototype also
    /// records each feature's maximum for display. `seed` is stored on the
    /// grid so the map can be reproduced.
    ///
    /// `keys` must name the set's features in the set's order; project the
    /// set with [`TrainingSet::select`] to train on a subset or reordering.
    pub fn initialize_with(
        &self,
        set: Arc<TrainingSet>,
        keys: &[String],
        seed: i64,
        stream: &mut dyn RandomStream,
    ) -> Result<SomGrid> {
        let (width, height) = (self.config.width, self.config.height);

        if set.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "training set is empty".to_string(),
            ));
        }
        if keys.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "no feature keys given".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(KohonenError::InvalidTrainingInput(format!(
                "grid must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        self.schedule(width, height)?;

        let feature_keys = FeatureKeys::new(keys.iter().cloned())?;
        check_keys(&feature_keys, set.keys())?;
        let bounds = set.bounds(keys);
        let max_observed: Vec<f64> = bounds.iter().map(|&(_, max)| max).collect();

        let mut nodes = Vec::with_capacity(width * height);
        for x in 0..width {
            for y in 0..height {
                let values: Vec<f64> = bounds
                    .iter()
                    .map(|&(min, max)| min + stream.next_unit() * (max - min))
                    .collect();
                let weights = FeatureVector::with_max_observed(
                    feature_keys.clone(),
                    values,
                    max_observed.clone(),
                )?;
                nodes.push(GridNode::new(x, y, weights));
            }
        }

        info!(
            "Initialized {}x{} grid ({} nodes, {} features, seed {})",
            width,
            height,
            nodes.len(),
            feature_keys.len(),
            seed
        );

        Ok(SomGrid::assemble(
            width,
            height,
            seed,
            self.config.topology,
            feature_keys,
            nodes,
            Some(set),
        ))
    }

    /// Trains `grid` on `set` without progress reporting.
    pub fn train(&self, grid: &mut SomGrid, set: &TrainingSet) -> Result<TrainingReport> {
        self.train_with(grid, set, &mut NoProgress, &CancellationToken::new())
    }

    /// Trains `grid` on `set` for the configured number of iterations.
    ///
    /// The set must carry the grid's keys in the grid's order; this is
    /// checked once before any prototype moves. `cancel` is polled at the
    /// start of each iteration and `observer` is called after each one.
    pub fn train_with(
        &self,
        grid: &mut SomGrid,
        set: &TrainingSet,
        observer: &mut dyn TrainingObserver,
        cancel: &CancellationToken,
    ) -> Result<TrainingReport> {
        if set.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "training set is empty".to_string(),
            ));
        }
        check_keys(grid.keys(), set.keys())?;

        let schedule = self.schedule(grid.width(), grid.height())?;
        let (width, height) = (grid.width(), grid.height());
        let topology = grid.topology();
        let parallel = self.config.parallel_bmu;
        let log_every = self.config.log_every;

        info!(
            "Training SOM: {} vectors, {}x{} nodes, {} features, {} iterations",
            set.len(),
            width,
            height,
            grid.depth(),
            schedule.iterations
        );

        let start = Instant::now();
        let mut learning_rate = schedule.learning_rate_start;
        let mut completed = 0;
        let mut cancelled = false;

        for iteration in 0..schedule.iterations {
            if cancel.is_cancelled() {
                cancelled = true;
                info!("Training cancelled after {} iterations", completed);
                break;
            }

            let iteration_start = Instant::now();
            let radius = schedule.neighborhood_radius(iteration);
            let diameter = radius * 2.0;
            let radius_squared = radius * radius;

            for vector in set.iter() {
                let input = vector.values();
                let bmu = if parallel {
                    grid.bmu_index_parallel(input)
                } else {
                    grid.bmu_index(input)
                };
                let (bmu_x, bmu_y) = grid.coords(bmu);

                // Bounding box of cells that can fall inside the radius.
                let start_x = (bmu_x as f64 - radius - 1.0).max(0.0) as usize;
                let start_y = (bmu_y as f64 - radius - 1.0).max(0.0) as usize;
                let end_x = (width as f64).min(start_x as f64 + diameter + 1.0) as usize;
                let end_y = (height as f64).min(start_y as f64 + diameter + 1.0) as usize;

                for x in start_x..end_x {
                    for y in start_y..end_y {
                        let distance_squared = topology.distance_squared((bmu_x, bmu_y), (x, y));
                        if distance_squared <= radius_squared {
                            let falloff = (-distance_squared / (2.0 * radius_squared)).exp();
                            let index = grid.index_of(x, y);
                            grid.nodes_mut()[index].adjust_weights_unchecked(
                                input,
                                learning_rate,
                                falloff,
                            );
                        }
                    }
                }
            }

            completed = iteration + 1;
            let applied = learning_rate;
            learning_rate = schedule.learning_rate(completed);

            let progress = IterationProgress {
                iteration,
                iterations: schedule.iterations,
                learning_rate: applied,
                next_learning_rate: learning_rate,
                neighborhood_radius: radius,
                iteration_elapsed: iteration_start.elapsed(),
                total_elapsed: start.elapsed(),
            };

            debug!(
                "Iteration {}: lr={:.6}, radius={:.3}, took {:?}",
                iteration, applied, radius, progress.iteration_elapsed
            );
            if log_every > 0 && (completed % log_every == 0 || completed == schedule.iterations) {
                info!(
                    "Iteration {}/{}: lr={:.6}, radius={:.3}",
                    completed, schedule.iterations, applied, radius
                );
            }

            observer.on_iteration(&progress, grid);
        }

        let elapsed = start.elapsed();
        info!("SOM training completed in {:?}", elapsed);

        Ok(TrainingReport {
            iterations_completed: completed,
            cancelled,
            final_learning_rate: learning_rate,
            elapsed,
        })
    }
}
