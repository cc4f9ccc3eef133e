//! Scriptable adapter used by the propagation tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::adapter::{AdapterError, AdapterSwitches, RoamingAdapter};
use super::item::{PushItem, PushKind};
use crate::application::outcome::{OperationResult, OutcomeKind};
use crate::domain::ids::AuthorizatorId;

/// Answers from a script (then `Success`), records every call.
pub(crate) struct ScriptedAdapter {
    id: AuthorizatorId,
    pub switches: AdapterSwitches,
    script: Mutex<VecDeque<Result<OutcomeKind, AdapterError>>>,
    delays: Mutex<VecDeque<Duration>>,
    rejected_type: Option<&'static str>,
    calls: Mutex<Vec<PushItem>>,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            switches: AdapterSwitches::default(),
            script: Mutex::new(VecDeque::new()),
            delays: Mutex::new(VecDeque::new()),
            rejected_type: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, script: Vec<Result<OutcomeKind, AdapterError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        *self.delays.lock().unwrap() = delays.into();
        self
    }

    pub fn rejecting(mut self, item_type: &'static str) -> Self {
        self.rejected_type = Some(item_type);
        self
    }

    pub fn push_script(&self, answer: Result<OutcomeKind, AdapterError>) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn calls(&self) -> Vec<PushItem> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RoamingAdapter for ScriptedAdapter {
    fn id(&self) -> &AuthorizatorId {
        &self.id
    }

    fn is_admin_down(&self) -> bool {
        self.switches.is_admin_down()
    }

    fn is_out_of_service(&self) -> bool {
        self.switches.is_out_of_service()
    }

    fn accepts(&self, item: &PushItem, _kind: PushKind) -> bool {
        self.rejected_type != Some(item.item_type())
    }

    async fn propagate(&self, item: &PushItem, _kind: PushKind) -> Result<OperationResult, AdapterError> {
        self.calls.lock().unwrap().push(item.clone());
        let delay = self.delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.script.lock().unwrap().pop_front();
        let kind = answer.unwrap_or(Ok(OutcomeKind::Success))?;
        Ok(OperationResult::for_item(self.id.clone(), kind, item.clone()))
    }
}
