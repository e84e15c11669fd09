//! Task capability traits.
//!
//! A task is the per-worker unit of state: each worker owns exactly one task
//! instance, constructed inside the worker's own thread from that worker's
//! entry of the construction-argument list. Tasks come in two capability
//! shapes:
//!
//! - [`MapTask`]: one result per input sample, collected in submission order.
//! - [`ReduceTask`]: folds samples into a running aggregate; the pool returns
//!   one aggregate per worker, unmerged.
//!
//! A sample has a fixed, statically declared shape (`()`, a single value, or
//! a tuple), carried by the `Sample` associated type. Plain functions adapt
//! into a map task through [`FnTask`].

use anyhow::Result;
use std::marker::PhantomData;
use std::sync::Arc;

/// Map capability: transform one sample into one result.
pub trait MapTask {
    type Sample: Send + 'static;
    type Output: Send + 'static;

    /// Processes a single sample. Ownership of the sample passes in; an error
    /// is reported for that sample's position and does not kill the worker.
    fn process(&mut self, sample: Self::Sample) -> Result<Self::Output>;
}

/// Reduce capability: fold samples into a per-worker aggregate.
pub trait ReduceTask {
    type Sample: Send + 'static;
    type Aggregate: Send + 'static;

    /// Folds one sample into the running aggregate.
    fn accumulate(&mut self, sample: Self::Sample) -> Result<()>;

    /// Consumes the task and yields its final aggregate. Called exactly once,
    /// after the worker has seen its shutdown sentinel.
    fn into_aggregate(self) -> Self::Aggregate;
}

/// Adapts a plain function into a [`MapTask`].
///
/// The function is shared by all workers; `args` are the fixed trailing
/// arguments bound at construction, one copy per worker. This is the
/// function-based entry point behind [`MapPool::map`].
///
/// [`MapPool::map`]: crate::pool::MapPool::map
pub struct FnTask<F, A, S, R> {
    func: Arc<F>,
    args: A,
    _marker: PhantomData<fn(S) -> R>,
}

impl<F, A, S, R> FnTask<F, A, S, R> {
    pub fn new(func: Arc<F>, args: A) -> Self {
        Self {
            func,
            args,
            _marker: PhantomData,
        }
    }
}

impl<F, A, S, R> MapTask for FnTask<F, A, S, R>
where
    F: Fn(S, &A) -> Result<R>,
    S: Send + 'static,
    R: Send + 'static,
{
    type Sample = S;
    type Output = R;

    fn process(&mut self, sample: S) -> Result<R> {
        (self.func)(sample, &self.args)
    }
}

/// Last path segment of a type name, without generic parameters.
/// Used as the default pool label in progress output.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    #[test]
    fn test_short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name::<Doubler>(), "Doubler");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_fn_task_binds_trailing_args() -> Result<()> {
        let mut task = FnTask::new(Arc::new(|x: i64, offset: &i64| Ok(x + offset)), 4);
        assert_eq!(task.process(1)?, 5);
        assert_eq!(task.process(2)?, 6);
        Ok(())
    }
}
