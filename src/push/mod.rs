//! Push items and the collectors they are reported to
//!
//! Every bundle added to (or operator removed from) an index image becomes
//! one [`PushItem`]. Items are reported twice: PENDING once IIB accepted the
//! request, then in a terminal state.

pub mod collector;

pub use collector::{CollectorKind, DummyCollector, LocalCollector, PushCollector};

use crate::iib::BuildDetails;
use serde::{Deserialize, Serialize};

/// Origin reported when the build did not start from an existing index
pub const SCRATCH_ORIGIN: &str = "scratch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PushItemState {
    Pending,
    Pushed,
    NotPushed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushItem {
    pub state: PushItemState,
    pub origin: String,
    /// Bundle image for added operators, `None` for removals
    pub src: Option<String>,
    /// Operator (package) name
    pub filename: String,
    pub dest: String,
    pub build: Option<String>,
    pub signing_key: Option<String>,
    pub checksums: Option<serde_json::Value>,
}

impl PushItem {
    fn from_build(build: &BuildDetails, state: PushItemState, dest: &str, operator: &str, src: Option<&str>) -> Self {
        Self {
            state,
            origin: build
                .from_index
                .clone()
                .unwrap_or_else(|| SCRATCH_ORIGIN.to_string()),
            src: src.map(str::to_string),
            filename: operator.to_string(),
            dest: dest.to_string(),
            build: build.index_image.clone(),
            signing_key: None,
            checksums: None,
        }
    }
}

/// Derive push items for every (operator, bundle) pair of an add build or
/// every removed operator of an rm build. Other request types yield nothing.
pub fn push_items_from_build(build: &BuildDetails, state: PushItemState, dest: &str) -> Vec<PushItem> {
    if build.is_add() {
        build
            .bundle_mapping
            .iter()
            .flat_map(|(operator, bundles)| {
                bundles
                    .iter()
                    .map(move |bundle| PushItem::from_build(build, state, dest, operator, Some(bundle.as_str())))
            })
            .collect()
    } else if build.is_rm() {
        build
            .removed_operators
            .iter()
            .map(|operator| PushItem::from_build(build, state, dest, operator, None))
            .collect()
    } else {
        Vec::new()
    }
}
