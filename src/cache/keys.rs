//! Pool names used by the form engine.

use std::fmt;

/// The three namespaces that together hold a stateful form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolName {
    /// Form id → class identifier.
    FormCid,
    /// Form id → attribute hash.
    FormAttrs,
    /// Form id → widget uid → value hash.
    FormValues,
}

impl PoolName {
    pub const ALL: [PoolName; 3] = [PoolName::FormCid, PoolName::FormAttrs, PoolName::FormValues];

    pub fn as_str(self) -> &'static str {
        match self {
            PoolName::FormCid => "form.form_cid",
            PoolName::FormAttrs => "form.form_attrs",
            PoolName::FormValues => "form.form_values",
        }
    }
}

impl fmt::Display for PoolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
