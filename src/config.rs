//! Pipeline settings read from a YAML file
//!
//! The configuration is a bag of optional keys. Unknown keys are ignored so the same file can
//! also carry settings for the job scheduler.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde_yaml::Value;
use crate::errors::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    settings: Value,
}

impl Default for Config {
    fn default() -> Config {
        Config { settings: Value::Mapping(Default::default()) }
    }
}

/// Read a YAML configuration file. An empty file is an empty configuration.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::MissingFile(format!("configuration file {}", path.display()), Some(e)))?;
    let settings: Value = serde_yaml::from_reader(BufReader::new(file))?;
    Config::from_value(settings)
}

impl Config {
    pub fn from_value(settings: Value) -> Result<Config> {
        match settings {
            Value::Null => Ok(Config::default()),
            Value::Mapping(_) => Ok(Config { settings }),
            other => Err(Error::configuration(format!(
                "the configuration should be a mapping of settings, not {:?}", other))),
        }
    }

    pub fn parse(text: &str) -> Result<Config> {
        Config::from_value(serde_yaml::from_str(text)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| wrong_type(key, "a non-negative integer", v)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_bool()
                .map(Some)
                .ok_or_else(|| wrong_type(key, "true or false", v)),
        }
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> Error {
    Error::configuration(format!("setting `{}` should be {}, found {:?}", key, expected, found))
}
