//! Application settings attached to a service.

use std::collections::HashMap;

use serde_json::Value;

/// Free-form key/value settings, with boolean helpers.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, Value>,
}

impl Settings {
    pub fn get(&self, setting: &str) -> Option<&Value> {
        self.values.get(setting)
    }

    pub fn set(&mut self, setting: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(setting.into(), value.into());
    }

    pub fn enable(&mut self, setting: impl Into<String>) {
        self.set(setting, true);
    }

    pub fn disable(&mut self, setting: impl Into<String>) {
        self.set(setting, false);
    }

    /// Truthy check: missing, `false`, `null`, `0` and `""` are disabled.
    pub fn enabled(&self, setting: &str) -> bool {
        match self.values.get(setting) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable() {
        let mut settings = Settings::default();
        assert!(!settings.enabled("etag"));

        settings.enable("etag");
        assert!(settings.enabled("etag"));

        settings.disable("etag");
        assert!(!settings.enabled("etag"));
        assert_eq!(settings.get("etag"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_truthiness() {
        let mut settings = Settings::default();
        settings.set("title", "shop");
        settings.set("retries", 0);
        settings.set("empty", "");
        assert!(settings.enabled("title"));
        assert!(!settings.enabled("retries"));
        assert!(!settings.enabled("empty"));
    }
}
