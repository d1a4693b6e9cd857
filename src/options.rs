use serde::{Deserialize, Serialize};

/// Options controlling the lowering.
///
/// Missing fields take their default values when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerOptions {
    /// Drop terms that reference tables whose entries are all zero.
    pub eliminate_zeros: bool,
    /// Drop accesses to tables whose entries are all one, keeping only the loop.
    pub ignore_ones: bool,
    /// Number of digits after the decimal point of the coefficient in product signatures.
    pub signature_precision: usize,
    /// Tolerance used to compare tables. Defaults to the epsilon of the format.
    pub table_tolerance: Option<f64>,
}

impl Default for TransformerOptions {
    fn default() -> Self {
        Self {
            eliminate_zeros: true,
            ignore_ones: false,
            signature_precision: 15,
            table_tolerance: None,
        }
    }
}
