use std::collections::HashSet;

use rand::Rng;

use crate::ConfigurationError;

/// A named, weighted kind of request a virtual user may issue on a tick.
///
/// `A` is whatever the runner needs to actually perform the request, usually a
/// resolved endpoint.
#[derive(Debug, Clone)]
pub struct TaskDefinition<A> {
    pub name: String,
    pub weight: u32,
    pub tag: Option<String>,
    pub gate_probability: Option<f64>,
    pub action: A,
}

impl<A> TaskDefinition<A> {
    pub fn new(name: impl Into<String>, weight: u32, action: A) -> Self {
        Self {
            name: name.into(),
            weight,
            tag: None,
            gate_probability: None,
            action,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Only fire the action for this fraction of the ticks that select it.
    pub fn with_gate(mut self, probability: f64) -> Self {
        self.gate_probability = Some(probability);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    /// Second stage of a tick: an independent draw against the gate.
    ///
    /// Ungated tasks always pass and consume no randomness.
    pub fn passes_gate<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match self.gate_probability {
            None => true,
            Some(p) => rng.random::<f64>() < p,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.weight == 0 {
            return Err(ConfigurationError::InvalidWeight {
                task: self.name.clone(),
            });
        }

        if let Some(p) = self.gate_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigurationError::InvalidGateProbability {
                    task: self.name.clone(),
                    value: p,
                });
            }
        }

        Ok(())
    }
}

/// Result of one scheduling tick.
#[derive(Debug, Clone, Copy)]
pub enum Tick<'a, A> {
    /// The task was selected and passed its gate.
    Fire(&'a TaskDefinition<A>),
    /// The task was selected but its gate draw failed, so nothing is sent.
    Skipped(&'a TaskDefinition<A>),
}

impl<'a, A> Tick<'a, A> {
    pub fn task(&self) -> &'a TaskDefinition<A> {
        match self {
            Tick::Fire(task) | Tick::Skipped(task) => task,
        }
    }

    pub fn fired(&self) -> bool {
        matches!(self, Tick::Fire(_))
    }
}

/// A validated, immutable set of tasks with precomputed cumulative weights.
#[derive(Debug, Clone)]
pub struct TaskSet<A> {
    tasks: Vec<TaskDefinition<A>>,
    cumulative: Vec<u64>,
    total_weight: u64,
}

impl<A> TaskSet<A> {
    pub fn new(tasks: Vec<TaskDefinition<A>>) -> Result<Self, ConfigurationError> {
        if tasks.is_empty() {
            return Err(ConfigurationError::EmptyTaskSet);
        }

        let total_weight: u64 = tasks.iter().map(|t| u64::from(t.weight)).sum();
        if total_weight == 0 {
            return Err(ConfigurationError::ZeroTotalWeight);
        }

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            task.validate()?;
            if !seen.insert(task.name.as_str()) {
                return Err(ConfigurationError::DuplicateTaskName(task.name.clone()));
            }
        }

        let cumulative = tasks
            .iter()
            .scan(0u64, |acc, t| {
                *acc += u64::from(t.weight);
                Some(*acc)
            })
            .collect();

        tracing::debug!(tasks = tasks.len(), total_weight, "Task set validated");

        Ok(Self {
            tasks,
            cumulative,
            total_weight,
        })
    }

    /// Drop every task carrying one of `tags`, then validate what is left.
    pub fn excluding_tags(
        tasks: Vec<TaskDefinition<A>>,
        tags: &[String],
    ) -> Result<Self, ConfigurationError> {
        let kept = tasks
            .into_iter()
            .filter(|t| !tags.iter().any(|tag| t.has_tag(tag)))
            .collect();
        Self::new(kept)
    }

    pub fn tasks(&self) -> &[TaskDefinition<A>] {
        &self.tasks
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Weighted pick over the whole set, in registration order.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &TaskDefinition<A> {
        let draw = rng.random_range(0..self.total_weight);
        // First task whose cumulative weight exceeds the draw.
        let index = self.cumulative.partition_point(|&c| c <= draw);
        &self.tasks[index]
    }

    /// Select a task, then apply its gate with a separate draw.
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) -> Tick<'_, A> {
        let task = self.select(rng);
        if task.passes_gate(rng) {
            Tick::Fire(task)
        } else {
            Tick::Skipped(task)
        }
    }
}

/// One-shot weighted selection over an unvalidated slice.
///
/// Callers on a hot path should build a [`TaskSet`] once instead.
pub fn select_task<'a, A, R: Rng + ?Sized>(
    tasks: &'a [TaskDefinition<A>],
    rng: &mut R,
) -> Result<&'a TaskDefinition<A>, ConfigurationError> {
    if tasks.is_empty() {
        return Err(ConfigurationError::EmptyTaskSet);
    }

    let total: u64 = tasks.iter().map(|t| u64::from(t.weight)).sum();
    if total == 0 {
        return Err(ConfigurationError::ZeroTotalWeight);
    }

    let cumulative: Vec<u64> = tasks
        .iter()
        .scan(0u64, |sum, t| {
            *sum += u64::from(t.weight);
            Some(*sum)
        })
        .collect();
    let draw = rng.random_range(0..total);
    let index = cumulative.partition_point(|&c| c <= draw);
    tasks.get(index).ok_or(ConfigurationError::ZeroTotalWeight)
}
