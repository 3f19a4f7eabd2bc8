//! `${VAR}` and `${VAR:-default}` expansion for string settings.

use std::env::VarError;

use crate::ConfigError;

pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    // Only braced references trigger expansion; `$1` in a user agent stays.
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    match shellexpand::env(value) {
        Ok(expanded) => Ok(expanded.into_owned()),
        Err(e) => Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: match e.cause {
                VarError::NotPresent => format!("${{{}}} not set", e.var_name),
                VarError::NotUnicode(_) => format!("${{{}}} is not valid unicode", e.var_name),
            },
        }),
    }
}
