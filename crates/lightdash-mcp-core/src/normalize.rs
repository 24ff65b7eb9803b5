//! Qualifying short field names with their explore id.
//!
//! The query engine only accepts fully-qualified field ids of the form
//! `{explore}_{field}`, while tool callers are allowed to pass the short
//! name. Normalization runs once, right before the query body is built, and
//! is idempotent.
//!
//! The "already qualified" test is a plain prefix check. A short name that
//! itself starts with `{explore}_` is left alone, which can be wrong for a
//! field literally named e.g. `orders_total` in explore `orders`. This is kept
//! deliberately; see the `prefix_check_false_positive` test.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field a filter applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterTarget {
    /// Dimension or metric id.
    #[serde(rename = "fieldId")]
    pub field_id: String,
    /// Any other target properties, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single filter rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Filter {
    /// Field the rule applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FilterTarget>,
    /// `id`, `operator`, `values`, `settings` and anything else.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// `and` / `or` lists of filters for one field kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterGroup {
    /// All of these must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<Filter>>,
    /// Any of these must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<Filter>>,
    /// Other group properties (e.g. the group `id`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query filters, split by dimensions and metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterTree {
    /// Filters on dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<FilterGroup>,
    /// Filters on metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FilterGroup>,
    /// Anything else (e.g. table calculation filters).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterTree {
    /// Parse a loosely-typed filters argument.
    ///
    /// Absent or non-object input yields the empty tree.
    pub fn from_value(value: Option<&Value>) -> Result<Self, serde_json::Error> {
        match value {
            Some(v @ Value::Object(_)) => serde_json::from_value(v.clone()),
            _ => Ok(Self::default()),
        }
    }

    /// Number of filter rules across both groups.
    pub fn rule_count(&self) -> usize {
        [&self.dimensions, &self.metrics]
            .into_iter()
            .flatten()
            .map(|g| {
                g.and.as_ref().map_or(0, Vec::len) + g.or.as_ref().map_or(0, Vec::len)
            })
            .sum()
    }
}

/// Sort order for one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Sort {
    /// Field to sort by.
    #[serde(rename = "fieldId")]
    pub field_id: String,
    /// Descending order when `true`.
    #[serde(default)]
    pub descending: bool,
    /// Other sort options (e.g. `nullsFirst`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Qualify `name` with `explore_id` unless it already is.
pub fn normalize_field_name(name: &str, explore_id: &str) -> String {
    let prefix = format!("{explore_id}_");
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

/// Qualify every name, preserving order. Absent input yields an empty list.
pub fn normalize_field_list(names: Option<&[String]>, explore_id: &str) -> Vec<String> {
    names
        .unwrap_or_default()
        .iter()
        .map(|name| normalize_field_name(name, explore_id))
        .collect()
}

fn normalize_filter(filter: &Filter, explore_id: &str) -> Filter {
    Filter {
        target: filter.target.as_ref().map(|target| FilterTarget {
            field_id: normalize_field_name(&target.field_id, explore_id),
            extra: target.extra.clone(),
        }),
        rest: filter.rest.clone(),
    }
}

fn normalize_group(group: &FilterGroup, explore_id: &str) -> FilterGroup {
    let rewrite = |filters: &Option<Vec<Filter>>| {
        filters.as_ref().map(|list| {
            list.iter()
                .map(|f| normalize_filter(f, explore_id))
                .collect()
        })
    };
    FilterGroup {
        and: rewrite(&group.and),
        or: rewrite(&group.or),
        extra: group.extra.clone(),
    }
}

/// Return a copy of `filters` with every `target.fieldId` qualified.
///
/// The input is not modified. Absent input yields the empty tree.
pub fn normalize_filters(filters: Option<&FilterTree>, explore_id: &str) -> FilterTree {
    let Some(tree) = filters else {
        return FilterTree::default();
    };
    FilterTree {
        dimensions: tree
            .dimensions
            .as_ref()
            .map(|g| normalize_group(g, explore_id)),
        metrics: tree.metrics.as_ref().map(|g| normalize_group(g, explore_id)),
        extra: tree.extra.clone(),
    }
}

/// Qualify every sort's `fieldId`, preserving order and other options.
pub fn normalize_sorts(sorts: Option<&[Sort]>, explore_id: &str) -> Vec<Sort> {
    sorts
        .unwrap_or_default()
        .iter()
        .map(|sort| Sort {
            field_id: normalize_field_name(&sort.field_id, explore_id),
            ..sort.clone()
        })
        .collect()
}
