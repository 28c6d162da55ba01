//! Fakes shared by the stage unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use podgate_state::{
    HostCandidate, HostRegistry, LabelSelector, StateError, StateResult, WorkloadLister,
    WorkloadRef,
};

/// In-memory lister/registry that can be switched into a failing state.
#[derive(Default)]
pub struct FakeCluster {
    workloads: Mutex<Vec<WorkloadRef>>,
    hosts: Mutex<HashMap<String, HostCandidate>>,
    down: Mutex<bool>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workload(&self, namespace: &str, name: &str) {
        self.workloads
            .lock()
            .unwrap()
            .push(WorkloadRef::new(namespace, name));
    }

    pub fn add_workloads(&self, namespace: &str, count: usize) {
        for i in 0..count {
            self.add_workload(namespace, &format!("wl-{i}"));
        }
    }

    pub fn add_host(&self, host: HostCandidate) {
        self.hosts.lock().unwrap().insert(host.id.clone(), host);
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn check_up(&self) -> StateResult<()> {
        if *self.down.lock().unwrap() {
            return Err(StateError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl WorkloadLister for FakeCluster {
    fn list_workloads(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StateResult<Vec<WorkloadRef>> {
        self.check_up()?;
        Ok(self
            .workloads
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.namespace == namespace && selector.matches(&w.labels))
            .cloned()
            .collect())
    }

    fn get_workload(&self, namespace: &str, name: &str) -> StateResult<Option<WorkloadRef>> {
        self.check_up()?;
        Ok(self
            .workloads
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.namespace == namespace && w.name == name)
            .cloned())
    }
}

impl HostRegistry for FakeCluster {
    fn list_hosts(&self) -> StateResult<Vec<HostCandidate>> {
        self.check_up()?;
        Ok(self.hosts.lock().unwrap().values().cloned().collect())
    }

    fn get_host(&self, host_id: &str) -> StateResult<Option<HostCandidate>> {
        self.check_up()?;
        Ok(self.hosts.lock().unwrap().get(host_id).cloned())
    }
}
