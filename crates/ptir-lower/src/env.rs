use std::env;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::backend::spec::DType;

static ENV_OPTIONS: OnceLock<LoweringOptions> = OnceLock::new();

const INDEX_DTYPE_VAR: &str = "PTIR_LOWER_INDEX_DTYPE";

/// Knobs shared by every lowering routine run against a [`GraphBuilder`](crate::ops::graph::GraphBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringOptions {
    /// Element type of the scalar offsets fed to `dynamic_update_slice`.
    pub index_dtype: DType,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            index_dtype: DType::Si32,
        }
    }
}

impl LoweringOptions {
    /// Options resolved once from the process environment.
    ///
    /// `PTIR_LOWER_INDEX_DTYPE` accepts `si32` or `si64`; anything else keeps the default.
    pub fn from_env() -> Self {
        *ENV_OPTIONS.get_or_init(|| {
            let mut options = LoweringOptions::default();
            if let Ok(value) = env::var(INDEX_DTYPE_VAR) {
                match parse_index_dtype(&value) {
                    Some(dtype) => options.index_dtype = dtype,
                    None if value.trim().is_empty() => {}
                    None => tracing::warn!(
                        var = INDEX_DTYPE_VAR,
                        value = %value,
                        "ignoring unsupported index dtype"
                    ),
                }
            }
            options
        })
    }

    pub fn with_index_dtype(mut self, dtype: DType) -> Self {
        self.index_dtype = dtype;
        self
    }
}

fn parse_index_dtype(value: &str) -> Option<DType> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "si32" | "i32" | "int32" => Some(DType::Si32),
        "si64" | "i64" | "int64" => Some(DType::Si64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_dtype_aliases() {
        assert_eq!(parse_index_dtype(" SI64 "), Some(DType::Si64));
        assert_eq!(parse_index_dtype("int32"), Some(DType::Si32));
        assert_eq!(parse_index_dtype("f32"), None);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: LoweringOptions = serde_json::from_str("{}").expect("valid options json");
        assert_eq!(options, LoweringOptions::default());

        let options: LoweringOptions =
            serde_json::from_str(r#"{"index_dtype":"Si64"}"#).expect("valid options json");
        assert_eq!(options.index_dtype, DType::Si64);
    }
}
