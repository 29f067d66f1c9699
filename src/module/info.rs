/*!
 * Module Info
 * Framework-visible state every module carries
 */

use super::condition::ModuleCondition;
use super::params::ModuleParams;
use super::types::ModuleProperties;
use crate::monitoring::LogConfig;

/// Identity, capabilities, parameters and conditions of a module
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    name: String,
    type_name: String,
    description: String,
    properties: ModuleProperties,
    params: ModuleParams,
    log_config: LogConfig,
    conditions: Vec<ModuleCondition>,
    return_value: Option<i32>,
}

impl ModuleInfo {
    /// New info; the instance name defaults to the type name
    pub fn new(type_name: &str) -> Self {
        Self {
            name: type_name.to_string(),
            type_name: type_name.to_string(),
            description: String::new(),
            properties: ModuleProperties::empty(),
            params: ModuleParams::new(),
            log_config: LogConfig::default(),
            conditions: Vec::new(),
            return_value: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ModuleProperties) -> Self {
        self.properties |= properties;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn properties(&self) -> ModuleProperties {
        self.properties
    }

    /// Add capability flags
    pub fn set_property_flags(&mut self, properties: ModuleProperties) {
        self.properties |= properties;
    }

    /// Whether all of `flags` are declared
    pub fn has_properties(&self, flags: ModuleProperties) -> bool {
        self.properties.contains(flags)
    }

    pub fn params(&self) -> &ModuleParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ModuleParams {
        &mut self.params
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    pub fn set_log_config(&mut self, log_config: LogConfig) {
        self.log_config = log_config;
    }

    pub fn conditions(&self) -> &[ModuleCondition] {
        &self.conditions
    }

    pub fn has_condition(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Attach a condition; path existence is checked by `PathGraph::add_condition`
    pub(crate) fn push_condition(&mut self, condition: ModuleCondition) {
        self.conditions.push(condition);
    }

    pub fn set_return_value(&mut self, value: i32) {
        self.return_value = Some(value);
    }

    pub fn set_return_bool(&mut self, value: bool) {
        self.return_value = Some(i32::from(value));
    }

    pub fn return_value(&self) -> Option<i32> {
        self.return_value
    }

    pub(crate) fn clear_return_value(&mut self) {
        self.return_value = None;
    }

    /// First condition matching the current return value
    ///
    /// Pure query: evaluates the value set during the last `event()`.
    pub fn eval_condition(&self) -> Option<&ModuleCondition> {
        let value = self.return_value?;
        self.conditions.iter().find(|c| c.evaluate(value))
    }
}
