pub mod migrations;
pub mod store;

use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::planning::plan::Plan;
use crate::planning::{Assignment, ReportInfo};

pub const PLAN_KEY: &str = "substitution_plan";
pub const REPORT_INFO_KEY: &str = "report_info";
pub const PREPARER_NAME_KEY: &str = "preparer_name";

/// Best-effort key-value persistence; backends log errors and never fail.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let raw = storage.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring unreadable saved {key}: {e}");
            None
        }
    }
}

fn save_json<T: Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => storage.set(key, &raw),
        Err(e) => warn!("failed serializing {key}: {e}"),
    }
}

pub fn load_saved_plan(storage: &dyn Storage) -> Option<Plan> {
    let assignments: Vec<Assignment> = load_json(storage, PLAN_KEY)?;
    let info: ReportInfo = load_json(storage, REPORT_INFO_KEY)?;
    Some(Plan::new(info, assignments))
}

pub fn save_plan(storage: &dyn Storage, plan: &Plan) {
    save_json(storage, PLAN_KEY, &plan.assignments);
    save_json(storage, REPORT_INFO_KEY, &plan.info);
}

pub fn clear_plan(storage: &dyn Storage) {
    storage.remove(PLAN_KEY);
    storage.remove(REPORT_INFO_KEY);
}

pub fn load_preparer_name(storage: &dyn Storage) -> String {
    storage.get(PREPARER_NAME_KEY).unwrap_or_default()
}

pub fn save_preparer_name(storage: &dyn Storage, name: &str) {
    storage.set(PREPARER_NAME_KEY, name);
}
