/*!
 * Module Parameters
 * Named configuration values, opaque to the framework
 */

use super::types::{ModuleError, ModuleResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A single named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleParam {
    pub name: String,
    pub description: String,
    pub required: bool,
    default: Option<Value>,
    value: Option<Value>,
}

impl ModuleParam {
    /// Whether a value was set explicitly
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Explicit value, falling back to the default
    pub fn effective(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }
}

/// Ordered parameter list of a module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleParams {
    params: Vec<ModuleParam>,
}

impl ModuleParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional parameter with a default
    pub fn add<T: Serialize>(&mut self, name: &str, description: &str, default: T) -> &mut Self {
        // Plain data always serializes; a failure just leaves the default unset
        let default = serde_json::to_value(default).ok();
        self.declare(name, description, false, default)
    }

    /// Declare a parameter that must be set before initialization
    pub fn add_required(&mut self, name: &str, description: &str) -> &mut Self {
        self.declare(name, description, true, None)
    }

    fn declare(
        &mut self,
        name: &str,
        description: &str,
        required: bool,
        default: Option<Value>,
    ) -> &mut Self {
        self.params.retain(|p| p.name != name);
        self.params.push(ModuleParam {
            name: name.to_string(),
            description: description.to_string(),
            required,
            default,
            value: None,
        });
        self
    }

    /// Set a parameter value
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> ModuleResult<()> {
        let value = serde_json::to_value(value).map_err(|e| ModuleError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ModuleError::UnknownParameter(name.to_string()))?;
        param.value = Some(value);
        Ok(())
    }

    /// Typed value (explicit or default)
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> ModuleResult<T> {
        let param = self
            .params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ModuleError::UnknownParameter(name.to_string()))?;
        let value = param
            .effective()
            .cloned()
            .ok_or_else(|| ModuleError::MissingParameters(vec![name.to_string()]))?;
        serde_json::from_value(value).map_err(|e| ModuleError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name && p.is_set())
    }

    /// Names of required parameters without a value
    pub fn missing_required(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.required && !p.is_set())
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_and_explicit_values() {
        let mut params = ModuleParams::new();
        params.add("interval", "Print interval", 10u64);
        params.add_required("output", "Output file");

        assert_eq!(params.get::<u64>("interval").unwrap(), 10);
        assert_eq!(params.missing_required(), vec!["output".to_string()]);
        assert!(params.get::<String>("output").is_err());

        params.set("interval", 100u64).unwrap();
        params.set("output", "out.dat").unwrap();
        assert_eq!(params.get::<u64>("interval").unwrap(), 100);
        assert_eq!(params.get::<String>("output").unwrap(), "out.dat");
        assert!(params.missing_required().is_empty());
    }

    #[test]
    fn test_unknown_and_mistyped() {
        let mut params = ModuleParams::new();
        params.add("runs", "Run numbers", vec![1u32]);

        assert!(matches!(
            params.set("nope", 1),
            Err(ModuleError::UnknownParameter(_))
        ));
        params.set("runs", "not a list").unwrap();
        assert!(matches!(
            params.get::<Vec<u32>>("runs"),
            Err(ModuleError::InvalidParameter { .. })
        ));
    }
}
