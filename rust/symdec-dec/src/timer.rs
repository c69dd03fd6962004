//! Timing decorator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use crate::error::DecisionError;
use crate::procedure::DecisionProcedure;

/// Read access to the time a [`TimerDecorator`] has accumulated. Stays
/// valid after the decorator is boxed into a chain.
#[derive(Debug, Clone, Default)]
pub struct ElapsedHandle {
    nanos: Arc<AtomicU64>,
}

impl ElapsedHandle {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed) / 1_000_000
    }

    fn add(&self, span: Duration) {
        let nanos = u64::try_from(span.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Accumulates the wall-clock time spent in every call to the wrapped
/// procedure. Arguments, answers and errors pass through untouched.
#[derive(Debug)]
pub struct TimerDecorator<D> {
    inner: D,
    elapsed: ElapsedHandle,
}

impl<D: DecisionProcedure> TimerDecorator<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            elapsed: ElapsedHandle::default(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.elapsed()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed.elapsed_millis()
    }

    pub fn handle(&self) -> ElapsedHandle {
        self.elapsed.clone()
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn timed<T>(&mut self, call: impl FnOnce(&mut D) -> T) -> T {
        let start = Instant::now();
        let result = call(&mut self.inner);
        self.elapsed.add(start.elapsed());
        result
    }
}

impl<D: DecisionProcedure> DecisionProcedure for TimerDecorator<D> {
    fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError> {
        self.timed(|d| d.push_assumption(clause))
    }

    fn clear_assumptions(&mut self) -> Result<(), DecisionError> {
        self.timed(|d| d.clear_assumptions())
    }

    fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError> {
        self.timed(|d| d.set_assumptions(clauses))
    }

    fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError> {
        let start = Instant::now();
        let result = self.inner.get_assumptions();
        self.elapsed.add(start.elapsed());
        result
    }

    fn is_sat(&mut self, predicate: &Expr) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat(predicate))
    }

    fn is_sat_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat_aliases(reference, heap_pos, object))
    }

    fn is_sat_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat_expands(reference, class_name))
    }

    fn is_sat_null(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat_null(reference))
    }

    fn is_sat_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat_initialized(class_name))
    }

    fn is_sat_not_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        self.timed(|d| d.is_sat_not_initialized(class_name))
    }

    fn close(&mut self) -> Result<(), DecisionError> {
        self.timed(|d| d.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::always_sat::AlwaysSat;
    use std::thread;

    /// Sleeps on every query, then fails on class-initialization queries.
    struct Slow {
        delay: Duration,
        inner: AlwaysSat,
    }

    impl DecisionProcedure for Slow {
        fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError> {
            self.inner.push_assumption(clause)
        }
        fn clear_assumptions(&mut self) -> Result<(), DecisionError> {
            self.inner.clear_assumptions()
        }
        fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError> {
            self.inner.set_assumptions(clauses)
        }
        fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError> {
            self.inner.get_assumptions()
        }
        fn is_sat(&mut self, _: &Expr) -> Result<bool, DecisionError> {
            thread::sleep(self.delay);
            Ok(false)
        }
        fn is_sat_aliases(
            &mut self,
            _: &ReferenceSymbolic,
            _: HeapPos,
            _: &HeapObject,
        ) -> Result<bool, DecisionError> {
            Ok(true)
        }
        fn is_sat_expands(&mut self, _: &ReferenceSymbolic, _: &str) -> Result<bool, DecisionError> {
            Ok(true)
        }
        fn is_sat_null(&mut self, _: &ReferenceSymbolic) -> Result<bool, DecisionError> {
            Ok(true)
        }
        fn is_sat_initialized(&mut self, _: &str) -> Result<bool, DecisionError> {
            thread::sleep(self.delay);
            Err(DecisionError::internal("slow failure"))
        }
        fn is_sat_not_initialized(&mut self, _: &str) -> Result<bool, DecisionError> {
            Ok(true)
        }
    }

    fn slow(ms: u64) -> TimerDecorator<Slow> {
        TimerDecorator::new(Slow {
            delay: Duration::from_millis(ms),
            inner: AlwaysSat::new(),
        })
    }

    #[test]
    fn answers_pass_through() {
        let mut timer = slow(0);
        assert!(!timer.is_sat(&Expr::Bool(true)).unwrap());
        assert!(timer.is_sat_null(&ReferenceSymbolic::root("x", "A")).unwrap());
    }

    #[test]
    fn time_accumulates_across_calls() {
        let mut timer = slow(5);
        timer.is_sat(&Expr::Bool(true)).unwrap();
        let first = timer.elapsed();
        assert!(first >= Duration::from_millis(5));
        timer.is_sat(&Expr::Bool(true)).unwrap();
        assert!(timer.elapsed() >= first + Duration::from_millis(5));
        assert!(timer.elapsed_millis() >= 10);
    }

    #[test]
    fn clock_stops_on_error() {
        let mut timer = slow(5);
        let handle = timer.handle();
        assert!(timer.is_sat_initialized("Foo").is_err());
        assert!(handle.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn handle_survives_boxing() {
        let timer = slow(2);
        let handle = timer.handle();
        let mut boxed: Box<dyn DecisionProcedure> = Box::new(timer);
        boxed.is_sat(&Expr::Bool(true)).unwrap();
        assert!(handle.elapsed() >= Duration::from_millis(2));
    }
}
