//! IIB request and response payloads

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The two IIB operations this tool drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    AddBundles,
    RemoveOperators,
}

impl Operation {
    /// Path segment under `/api/v1/builds/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::AddBundles => "add",
            Operation::RemoveOperators => "rm",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AddBundles => write!(f, "add bundles"),
            Operation::RemoveOperators => write!(f, "remove operators"),
        }
    }
}

/// Body of `POST /api/v1/builds/{add,rm}`.
///
/// Optional extras are left out of the JSON entirely when unset; IIB treats
/// an explicit `null` differently from a missing key for some of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRequest {
    #[serde(skip)]
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_image: Option<String>,
    #[serde(rename = "add_arches", skip_serializing_if = "Vec::is_empty")]
    pub arches: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite_from_index: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite_from_index_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_related_images: Option<bool>,
}

impl BuildRequest {
    fn empty(operation: Operation, from_index: Option<String>, arches: Vec<String>) -> Self {
        Self {
            operation,
            from_index,
            binary_image: None,
            arches,
            bundles: Vec::new(),
            operators: Vec::new(),
            organization: None,
            overwrite_from_index: None,
            overwrite_from_index_token: None,
            deprecation_list: None,
            build_tags: Vec::new(),
            check_related_images: None,
        }
    }

    pub fn add_bundles(from_index: Option<String>, bundles: Vec<String>, arches: Vec<String>) -> Self {
        Self {
            bundles,
            ..Self::empty(Operation::AddBundles, from_index, arches)
        }
    }

    pub fn remove_operators(
        from_index: Option<String>,
        operators: Vec<String>,
        arches: Vec<String>,
    ) -> Self {
        Self {
            operators,
            ..Self::empty(Operation::RemoveOperators, from_index, arches)
        }
    }

    pub fn with_binary_image(mut self, binary_image: Option<String>) -> Self {
        self.binary_image = binary_image;
        self
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Only a requested overwrite is sent; `false` leaves the key out.
    pub fn with_overwrite_from_index(mut self, overwrite: bool, token: Option<String>) -> Self {
        self.overwrite_from_index = overwrite.then_some(true);
        self.overwrite_from_index_token = token;
        self
    }

    pub fn with_deprecation_list(mut self, deprecation_list: Option<Vec<String>>) -> Self {
        self.deprecation_list = deprecation_list.filter(|list| !list.is_empty());
        self
    }

    pub fn with_build_tags(mut self, build_tags: Vec<String>) -> Self {
        self.build_tags = build_tags;
        self
    }

    pub fn with_check_related_images(mut self, check: bool) -> Self {
        self.check_related_images = check.then_some(true);
        self
    }

    /// Bundles for add requests, operators for remove requests
    pub fn items(&self) -> &[String] {
        match self.operation {
            Operation::AddBundles => &self.bundles,
            Operation::RemoveOperators => &self.operators,
        }
    }
}

/// Parsed form of the `state` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildState {
    InProgress,
    Finished,
    Failed,
    /// Anything else IIB reports; not terminal
    Other(String),
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Finished | BuildState::Failed)
    }
}

impl From<&str> for BuildState {
    fn from(state: &str) -> Self {
        match state {
            "in_progress" => BuildState::InProgress,
            "finished" | "complete" => BuildState::Finished,
            "failed" => BuildState::Failed,
            other => BuildState::Other(other.to_string()),
        }
    }
}

/// Build as returned by `GET /api/v1/builds/{id}`.
///
/// Fields the tool does not interpret are kept in `extra` so the details can
/// be written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDetails {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub from_index: Option<String>,
    #[serde(default)]
    pub from_index_resolved: Option<String>,
    #[serde(default)]
    pub binary_image: Option<String>,
    #[serde(default)]
    pub binary_image_resolved: Option<String>,
    #[serde(default)]
    pub index_image: Option<String>,
    #[serde(default)]
    pub index_image_resolved: Option<String>,
    #[serde(default)]
    pub internal_index_image_copy: Option<String>,
    #[serde(default)]
    pub internal_index_image_copy_resolved: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub arches: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle_mapping: BundleMapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub removed_operators: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deprecation_list: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BuildDetails {
    pub fn build_state(&self) -> BuildState {
        BuildState::from(self.state.as_str())
    }

    pub fn is_add(&self) -> bool {
        self.request_type.as_deref() == Some("add")
    }

    pub fn is_rm(&self) -> bool {
        self.request_type.as_deref() == Some("rm")
    }

    /// Image to copy from when tagging into Quay: resolved digest if known
    pub fn source_image(&self) -> Option<&str> {
        self.index_image_resolved
            .as_deref()
            .or(self.index_image.as_deref())
    }
}

/// Operator name to bundle images, in the order IIB listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMapping(Vec<(String, Vec<String>)>);

impl BundleMapping {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter().map(|(operator, bundles)| (operator, bundles))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for BundleMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (operator, bundles) in &self.0 {
            map.serialize_entry(operator, bundles)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BundleMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = BundleMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of operator names to bundle lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((operator, bundles)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((operator, bundles));
                }
                Ok(BundleMapping(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// IIB returns integer ids; tests and older deployments use strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What went wrong with a failed build, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub reason: String,
    pub logs_url: String,
}
