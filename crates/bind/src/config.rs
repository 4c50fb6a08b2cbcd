use serde::{Deserialize, Serialize};

const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_MAX_FORM_FIELDS: usize = 100;
const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Limits applied while binding.
///
/// ```
/// use micro_bind::BindConfig;
///
/// let config = BindConfig::new().max_body_size(64 * 1024).max_form_fields(10);
/// assert_eq!(config.body_limit(), 64 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    max_body_size: usize,
    max_form_fields: usize,
    max_file_size: usize,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_form_fields: DEFAULT_MAX_FORM_FIELDS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl BindConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest body, JSON or form, the binder will parse.
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Most fields and parts a form body may carry.
    #[must_use]
    pub fn max_form_fields(mut self, count: usize) -> Self {
        self.max_form_fields = count;
        self
    }

    /// Largest single upload.
    #[must_use]
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn body_limit(&self) -> usize {
        self.max_body_size
    }

    pub fn form_field_limit(&self) -> usize {
        self.max_form_fields
    }

    pub fn file_limit(&self) -> usize {
        self.max_file_size
    }
}
