use serde::{Deserialize, Serialize};

use crate::core::antigen::{Antigen, Serum};
use crate::core::types::TableId;

/// Chart metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChartInfo {
    pub virus_type: String,
    pub lab: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assay: String,
    /// `YYYYMMDD` or `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
}

impl ChartInfo {
    /// Table id derived from metadata: `virus_type:assay:lab:date`
    #[must_use]
    pub fn derived_table_id(&self) -> TableId {
        let assay = if self.assay.is_empty() {
            "HI"
        } else {
            self.assay.as_str()
        };
        TableId(format!(
            "{}:{}:{}:{}",
            self.virus_type,
            assay,
            self.lab,
            self.date.replace('-', "")
        ))
    }
}

/// One imported chart, as produced by the import layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    pub info: ChartInfo,
    #[serde(default)]
    pub antigens: Vec<Antigen>,
    #[serde(default)]
    pub sera: Vec<Serum>,
    /// Antigens x sera, stored verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titers: Vec<Vec<String>>,
}

impl Chart {
    pub fn new(info: ChartInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table_id(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(TableId::new(table_id));
        self
    }

    #[must_use]
    pub fn with_antigens(mut self, antigens: Vec<Antigen>) -> Self {
        self.antigens = antigens;
        self
    }

    #[must_use]
    pub fn with_sera(mut self, sera: Vec<Serum>) -> Self {
        self.sera = sera;
        self
    }

    /// Explicit table id, or the one derived from the chart metadata
    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
            .clone()
            .unwrap_or_else(|| self.info.derived_table_id())
    }
}

/// Chart-local `(name, variant_id)` of an antigen or serum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant_id: String,
}

/// What the catalog remembers about each imported chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDescriptor {
    pub table_id: TableId,
    pub info: ChartInfo,
    #[serde(default)]
    pub antigens: Vec<ChartEntry>,
    #[serde(default)]
    pub sera: Vec<ChartEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titers: Vec<Vec<String>>,
}

impl ChartDescriptor {
    #[must_use]
    pub fn from_chart(chart: &Chart) -> Self {
        Self {
            table_id: chart.table_id(),
            info: chart.info.clone(),
            antigens: chart
                .antigens
                .iter()
                .map(|a| ChartEntry {
                    name: a.data.name.clone(),
                    variant_id: a.variant_id(),
                })
                .collect(),
            sera: chart
                .sera
                .iter()
                .map(|s| ChartEntry {
                    name: s.data.name.clone(),
                    variant_id: s.variant_id(),
                })
                .collect(),
            titers: chart.titers.clone(),
        }
    }
}
