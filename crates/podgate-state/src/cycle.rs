//! Per-cycle keyed store.
//!
//! The orchestrator creates one store per placement cycle and drops it when
//! the cycle ends. Stages running on different workers share it, so
//! implementations must be internally synchronized; callers never lock.
//!
//! Values are opaque [`StateData`] trait objects. Typed access goes through
//! [`read_typed`], which downcasts and reports a wrong-shaped value as
//! [`StateError::TypeMismatch`] instead of panicking.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;

use crate::error::{StateError, StateResult};

/// A value that can live in a [`CycleStore`].
///
/// Implemented for every `Clone + Send + Sync + Debug + 'static` type.
pub trait StateData: Any + Send + Sync + Debug {
    fn clone_data(&self) -> Box<dyn StateData>;
    fn as_any(&self) -> &dyn Any;
}

impl<T> StateData for T
where
    T: Any + Clone + Send + Sync + Debug,
{
    fn clone_data(&self) -> Box<dyn StateData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Contract of the host-supplied cycle store.
///
/// Visibility across workers is only guaranteed where the orchestrator
/// sequences calls (a pre-score write happens-before every score read).
pub trait CycleStore: Send + Sync {
    /// Return a copy of the value under `key`, or [`StateError::NotFound`].
    fn read(&self, key: &str) -> StateResult<Box<dyn StateData>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: Box<dyn StateData>) -> StateResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> StateResult<()>;
}

/// Read `key` and downcast it to `T`.
pub fn read_typed<T>(store: &dyn CycleStore, key: &str) -> StateResult<T>
where
    T: StateData + Clone,
{
    let data = store.read(key)?;
    (*data)
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| StateError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
}

/// In-process [`CycleStore`] guarded by an `RwLock`.
#[derive(Debug, Default)]
pub struct CycleState {
    entries: RwLock<HashMap<String, Box<dyn StateData>>>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of every entry, for forking a cycle.
    pub fn clone_state(&self) -> StateResult<CycleState> {
        let entries = self.entries.read().map_err(|_| StateError::Poisoned)?;
        let copied = entries
            .iter()
            .map(|(k, v)| (k.clone(), (**v).clone_data()))
            .collect();
        Ok(CycleState {
            entries: RwLock::new(copied),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CycleStore for CycleState {
    fn read(&self, key: &str) -> StateResult<Box<dyn StateData>> {
        let entries = self.entries.read().map_err(|_| StateError::Poisoned)?;
        entries
            .get(key)
            .map(|v| (**v).clone_data())
            .ok_or_else(|| StateError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, value: Box<dyn StateData>) -> StateResult<()> {
        let mut entries = self.entries.write().map_err(|_| StateError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> StateResult<()> {
        let mut entries = self.entries.write().map_err(|_| StateError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}
