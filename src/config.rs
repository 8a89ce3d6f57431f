use std::env;

pub const DEFAULT_READ_BUFFER: usize = 1024;
pub const DEFAULT_STACK_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub read_buffer_capacity: usize,
    pub initial_stack_capacity: usize,
    pub trace_scopes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_buffer_capacity: DEFAULT_READ_BUFFER,
            initial_stack_capacity: DEFAULT_STACK_CAPACITY,
            trace_scopes: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let size = |key: &str, fallback: usize| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(fallback)
        };
        Self {
            read_buffer_capacity: size("PRIME_RT_READ_BUFFER", defaults.read_buffer_capacity).max(2),
            initial_stack_capacity: size(
                "PRIME_RT_STACK_CAPACITY",
                defaults.initial_stack_capacity,
            ),
            trace_scopes: lookup("PRIME_DEBUG_TRACE")
                .map(|raw| matches!(raw.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.trace_scopes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(RuntimeConfig::from_lookup(lookup(&[])), RuntimeConfig::default());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("PRIME_RT_READ_BUFFER", "64"),
            ("PRIME_RT_STACK_CAPACITY", "lots"),
            ("PRIME_DEBUG_TRACE", "1"),
        ]));
        assert_eq!(config.read_buffer_capacity, 64);
        assert_eq!(config.initial_stack_capacity, DEFAULT_STACK_CAPACITY);
        assert!(config.trace_scopes);
    }

    #[test]
    fn read_buffer_has_a_floor() {
        let config = RuntimeConfig::from_lookup(lookup(&[("PRIME_RT_READ_BUFFER", "1")]));
        assert_eq!(config.read_buffer_capacity, 2);
    }
}
