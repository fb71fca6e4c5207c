use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use harvest::automation::{Automation, BoxFuture, IterSequence, Records, WorkUnits};
use harvest::errors::{HarvestError, Result};
use harvest::types::WorkUnit;

/// What one `render_login_token` call does.
#[derive(Debug, Clone)]
pub enum TokenStep {
    Token(String),
    Timeout,
    Fail(String),
}

/// What extracting one scripted unit does.
#[derive(Debug, Clone)]
enum UnitStep {
    Records(usize),
    Fail(String),
}

/// An automation session that plays back a script.
///
/// - `is_login_consumed` answers from the consumption script, then `true`
///   forever, so the token-wait phase always ends.
/// - `render_login_token` plays back token steps; running out is a failure.
/// - Scripted units yield `n` records `{"unit": <id>, "seq": k}` each.
/// - With [`ScriptedAutomation::endless`], the unit sequence never ends;
///   unscripted units yield one record.
///
/// Clones share their call log, so a test can keep one clone for assertions
/// while the worker consumes another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAutomation {
    consumed: VecDeque<bool>,
    tokens: VecDeque<TokenStep>,
    units: Vec<WorkUnit>,
    steps: HashMap<String, UnitStep>,
    endless: bool,
    log: Arc<CallLog>,
}

/// Calls observed by a [`ScriptedAutomation`] and its clones.
#[derive(Debug, Default)]
pub struct CallLog {
    pub renders: AtomicUsize,
    pub consumption_checks: AtomicUsize,
    pub units_pulled: AtomicUsize,
    pub extracted: Mutex<Vec<String>>,
}

impl ScriptedAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `false` to the first `polls` consumption checks.
    pub fn consumed_after(mut self, polls: usize) -> Self {
        self.consumed = std::iter::repeat_n(false, polls).collect();
        self
    }

    /// Explicit answers for successive consumption checks.
    pub fn consumption(mut self, answers: &[bool]) -> Self {
        self.consumed = answers.iter().copied().collect();
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.tokens.push_back(TokenStep::Token(token.to_string()));
        self
    }

    pub fn token_timeout(mut self) -> Self {
        self.tokens.push_back(TokenStep::Timeout);
        self
    }

    pub fn token_failure(mut self, message: &str) -> Self {
        self.tokens.push_back(TokenStep::Fail(message.to_string()));
        self
    }

    /// Add a unit yielding `records` records.
    pub fn unit(mut self, id: &str, records: usize) -> Self {
        self.units.push(WorkUnit::new(id, format!("Unit {id}")));
        self.steps.insert(id.to_string(), UnitStep::Records(records));
        self
    }

    /// Add a unit whose extraction fails.
    pub fn failing_unit(mut self, id: &str, message: &str) -> Self {
        self.units.push(WorkUnit::new(id, format!("Unit {id}")));
        self.steps
            .insert(id.to_string(), UnitStep::Fail(message.to_string()));
        self
    }

    /// Keep producing units after the scripted ones, forever.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    pub fn log(&self) -> Arc<CallLog> {
        Arc::clone(&self.log)
    }
}

impl CallLog {
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn units_pulled(&self) -> usize {
        self.units_pulled.load(Ordering::SeqCst)
    }
}

impl ScriptedAutomation {
    fn next_token(&mut self) -> Result<String> {
        self.log.renders.fetch_add(1, Ordering::SeqCst);
        match self.tokens.pop_front() {
            Some(TokenStep::Token(token)) => Ok(token),
            Some(TokenStep::Timeout) => Err(HarvestError::Timeout(
                "login token did not render in time".to_string(),
            )),
            Some(TokenStep::Fail(message)) => Err(HarvestError::Automation(message)),
            None => Err(HarvestError::Automation(
                "script has no more login tokens".to_string(),
            )),
        }
    }

    fn units(&self) -> WorkUnits {
        let log = Arc::clone(&self.log);
        let scripted = self.units.clone().into_iter();
        let extra: Box<dyn Iterator<Item = WorkUnit> + Send> = if self.endless {
            Box::new((1..).map(|i| WorkUnit::new(format!("extra-{i}"), "")))
        } else {
            Box::new(std::iter::empty())
        };

        Box::new(IterSequence::new(scripted.chain(extra).map(move |unit| {
            log.units_pulled.fetch_add(1, Ordering::SeqCst);
            Ok(unit)
        })))
    }

    fn records(&self, unit: &WorkUnit) -> Result<Records> {
        self.log.extracted.lock().unwrap().push(unit.id.clone());

        let count = match self.steps.get(&unit.id) {
            Some(UnitStep::Records(n)) => *n,
            Some(UnitStep::Fail(message)) => {
                return Err(HarvestError::Automation(message.clone()));
            }
            None => 1,
        };

        let id = unit.id.clone();
        Ok(Box::new(IterSequence::new((0..count).map(move |seq| {
            Ok::<Value, HarvestError>(json!({ "unit": id, "seq": seq }))
        }))))
    }
}

impl Automation for ScriptedAutomation {
    fn render_login_token(&mut self) -> BoxFuture<'_, Result<String>> {
        let token = self.next_token();
        Box::pin(async move { token })
    }

    fn is_login_consumed(&mut self) -> BoxFuture<'_, Result<bool>> {
        self.log.consumption_checks.fetch_add(1, Ordering::SeqCst);
        let consumed = self.consumed.pop_front().unwrap_or(true);
        Box::pin(async move { Ok(consumed) })
    }

    fn work_units(&mut self) -> BoxFuture<'_, Result<WorkUnits>> {
        let units = self.units();
        Box::pin(async move { Ok(units) })
    }

    fn extract_records<'a>(&'a mut self, unit: &'a WorkUnit) -> BoxFuture<'a, Result<Records>> {
        let records = self.records(unit);
        Box::pin(async move { records })
    }
}
