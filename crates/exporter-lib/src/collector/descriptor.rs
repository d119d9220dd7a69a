//! Metric descriptors and samples
//!
//! Collectors declare their metrics as static `(field, help)` tables. Those
//! tables are turned into [`MetricDescriptor`]s once, when the collector is
//! built, and every emitted [`MetricSample`] points back at its descriptor.

use std::sync::Arc;

/// Constant label carrying the array address on every series
pub const TARGET_LABEL: &str = "IP";

/// Help text table: `(field, description)`
pub type HelpTable = &'static [(&'static str, &'static str)];

/// Look up the help text for `field`.
///
/// Fields missing from the table get a generic description instead of an error.
pub fn help_for(table: HelpTable, field: &str) -> String {
    match table.iter().find(|(name, _)| *name == field) {
        Some((_, help)) => (*help).to_string(),
        None => format!("{} reported by the array", field),
    }
}

/// Name, help text and label layout of one metric for one array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    name: String,
    help: String,
    label_names: Vec<&'static str>,
    target_ip: String,
}

impl MetricDescriptor {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&'static str],
        target_ip: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            label_names: label_names.to_vec(),
            target_ip: target_ip.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[&'static str] {
        &self.label_names
    }

    pub fn target_ip(&self) -> &str {
        &self.target_ip
    }

    /// Build a sample; `label_values` must follow `label_names` order
    pub fn sample(self: &Arc<Self>, value: f64, label_values: Vec<String>) -> MetricSample {
        MetricSample {
            descriptor: Arc::clone(self),
            value,
            label_values,
        }
    }
}

/// One gauge value produced during a collection pass
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl MetricSample {
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn help(&self) -> &str {
        self.descriptor.help()
    }

    pub fn target_ip(&self) -> &str {
        self.descriptor.target_ip()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Value of label `name`, if the descriptor declares it
    pub fn label(&self, name: &str) -> Option<&str> {
        let index = self.descriptor.label_names().iter().position(|l| *l == name)?;
        self.label_values.get(index).map(String::as_str)
    }

    /// Labels as ordered `(name, value)` pairs
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptor
            .label_names()
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }
}

/// Descriptors for a list of fields sharing a name prefix and label layout
pub fn field_descriptors(
    prefix: &str,
    fields: &[&'static str],
    help: HelpTable,
    label_names: &[&'static str],
    target_ip: &str,
) -> Vec<(&'static str, Arc<MetricDescriptor>)> {
    fields
        .iter()
        .map(|field| {
            (
                *field,
                MetricDescriptor::new(
                    format!("{}{}", prefix, field),
                    help_for(help, field),
                    label_names,
                    target_ip,
                ),
            )
        })
        .collect()
}
