use serde::{Deserialize, Serialize};

use crate::core::name;

/// Fields shared by antigens and sera
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AntigenSerum {
    /// Structured virus name, e.g. `A(H3N2)/PERTH/16/2009`
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lineage: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passage: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reassortant: String,
}

impl AntigenSerum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Location field of the name, empty when the name does not decompose
    #[must_use]
    pub fn location(&self) -> String {
        name::split(&self.name)
            .map(|parts| parts.location)
            .unwrap_or_default()
    }

    /// Year field of the name, empty when the name does not decompose
    #[must_use]
    pub fn year(&self) -> String {
        name::split(&self.name)
            .map(|parts| parts.year)
            .unwrap_or_default()
    }

    fn qualifiers<'a>(&'a self, last: &'a str) -> Vec<&'a str> {
        std::iter::once(self.reassortant.as_str())
            .chain(self.annotations.iter().map(String::as_str))
            .chain(std::iter::once(last))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Antigen as it appears in one chart
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Antigen {
    #[serde(flatten)]
    pub data: AntigenSerum,

    /// Collection date, `YYYY-MM-DD` (possibly truncated)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lab_id: Vec<String>,

    /// Too ambiguous to merge with records from other charts
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,
}

impl Antigen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: AntigenSerum::new(name),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.data.passage = passage.into();
        self
    }

    #[must_use]
    pub fn with_reassortant(mut self, reassortant: impl Into<String>) -> Self {
        self.data.reassortant = reassortant.into();
        self
    }

    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    #[must_use]
    pub fn with_lab_id(mut self, lab_id: impl Into<String>) -> Self {
        self.lab_id.push(lab_id.into());
        self
    }

    /// Reassortant, annotations and passage: distinguishes biologically
    /// different antigens sharing one name
    #[must_use]
    pub fn variant_id(&self) -> String {
        self.data.qualifiers(&self.data.passage).join(" ")
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        join_full_name(&self.data.name, &self.variant_id())
    }
}

/// Serum as it appears in one chart
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Serum {
    #[serde(flatten)]
    pub data: AntigenSerum,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serum_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serum_species: String,

    /// Index of the homologous antigen in the same chart's antigen list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homologous: Option<usize>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,
}

impl Serum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: AntigenSerum::new(name),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_serum_id(mut self, serum_id: impl Into<String>) -> Self {
        self.serum_id = serum_id.into();
        self
    }

    #[must_use]
    pub fn with_homologous(mut self, antigen_no: usize) -> Self {
        self.homologous = Some(antigen_no);
        self
    }

    /// Reassortant, annotations and serum id
    #[must_use]
    pub fn variant_id(&self) -> String {
        self.data.qualifiers(&self.serum_id).join(" ")
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        join_full_name(&self.data.name, &self.variant_id())
    }
}

pub(crate) fn join_full_name(name: &str, variant_id: &str) -> String {
    if variant_id.is_empty() {
        name.to_string()
    } else {
        format!("{name} {variant_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_antigen_variant_id_and_full_name() {
        let mut antigen = Antigen::new("A(H3N2)/PERTH/16/2009")
            .with_reassortant("NYMC-X-187")
            .with_passage("E3");
        antigen.data.annotations.push("CLONE 38".to_string());

        assert_eq!(antigen.variant_id(), "NYMC-X-187 CLONE 38 E3");
        assert_eq!(
            antigen.full_name(),
            "A(H3N2)/PERTH/16/2009 NYMC-X-187 CLONE 38 E3"
        );
    }

    #[test]
    fn test_plain_antigen_full_name_is_name() {
        let antigen = Antigen::new("B/BRISBANE/60/2008");
        assert_eq!(antigen.variant_id(), "");
        assert_eq!(antigen.full_name(), "B/BRISBANE/60/2008");
    }

    #[test]
    fn test_serum_variant_uses_serum_id() {
        let serum = Serum::new("A(H3N2)/PERTH/16/2009")
            .with_serum_id("F27/10")
            .with_homologous(0);
        assert_eq!(serum.variant_id(), "F27/10");
        assert_eq!(serum.full_name(), "A(H3N2)/PERTH/16/2009 F27/10");
    }

    #[test]
    fn test_location_and_year() {
        let record = AntigenSerum::new("A(H3N2)/PERTH/16/2009");
        assert_eq!(record.location(), "PERTH");
        assert_eq!(record.year(), "2009");

        let cdc = AntigenSerum::new("HK 1/2009");
        assert_eq!(cdc.location(), "");
    }

    #[test]
    fn test_antigen_json_is_flat() {
        let json = r#"{"name": "B/BRISBANE/60/2008", "passage": "E2", "lab_id": ["CDC#123"]}"#;
        let antigen: Antigen = serde_json::from_str(json).unwrap();
        assert_eq!(antigen.data.passage, "E2");
        assert_eq!(antigen.lab_id, vec!["CDC#123".to_string()]);
        assert!(!antigen.distinct);
    }
}
