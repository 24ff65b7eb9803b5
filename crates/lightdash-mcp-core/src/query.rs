//! Building the body of an explore query.
//!
//! [`QueryRequest`] is what a caller asks for, with short field names allowed.
//! [`QueryRequest::to_metric_query`] validates it and produces the
//! [`MetricQuery`] the API expects, with every field reference qualified.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::analysis::QueryShape;
use crate::error::{QueryError, QueryResult};
use crate::normalize::{
    FilterTree, Sort, normalize_field_list, normalize_filters, normalize_sorts,
};

/// Row limit used when the caller gives none.
pub const DEFAULT_LIMIT: u32 = 500;

/// Largest accepted row limit.
pub const MAX_LIMIT: u32 = 5000;

/// Query as requested by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryRequest {
    /// Explore (table) to query.
    pub explore_id: String,
    /// Dimensions to group by. Short names are qualified with the explore id.
    #[serde(default)]
    pub dimensions: Option<Vec<String>>,
    /// Metrics to aggregate. Short names are qualified with the explore id.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    /// Filter tree (`{dimensions: {and: [...]}, metrics: {...}}`).
    /// Anything other than an object is treated as no filters.
    #[serde(default, deserialize_with = "lenient_filters")]
    pub filters: Option<FilterTree>,
    /// Sort order.
    #[serde(default)]
    pub sorts: Option<Vec<Sort>>,
    /// Maximum rows to return (1-5000, default 500).
    #[serde(default)]
    pub limit: Option<u32>,
    /// Table calculations, passed through unchanged.
    #[serde(default)]
    pub table_calculations: Option<Vec<Value>>,
}

fn lenient_filters<'de, D>(deserializer: D) -> Result<Option<FilterTree>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => FilterTree::from_value(Some(&value))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Request body for `runQuery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    /// Explore (table) to query.
    pub explore_name: String,
    /// Qualified dimension ids.
    pub dimensions: Vec<String>,
    /// Qualified metric ids.
    pub metrics: Vec<String>,
    /// Filters with qualified targets.
    pub filters: FilterTree,
    /// Sorts with qualified field ids.
    pub sorts: Vec<Sort>,
    /// Row limit.
    pub limit: u32,
    /// Table calculations.
    pub table_calculations: Vec<Value>,
    /// Ad-hoc metrics (unused, sent empty).
    pub additional_metrics: Vec<Value>,
    /// Ad-hoc dimensions (unused, sent empty).
    pub custom_dimensions: Vec<Value>,
}

impl QueryRequest {
    /// Start a request against `explore_id`.
    pub fn new(explore_id: impl Into<String>) -> Self {
        Self {
            explore_id: explore_id.into(),
            ..Self::default()
        }
    }

    /// Check the request before any API call is made.
    pub fn validate(&self) -> QueryResult<()> {
        if self.explore_id.trim().is_empty() {
            return Err(QueryError::MissingExplore);
        }
        let has_fields = self.dimensions.as_ref().is_some_and(|d| !d.is_empty())
            || self.metrics.as_ref().is_some_and(|m| !m.is_empty());
        if !has_fields {
            return Err(QueryError::NoFields);
        }
        if let Some(limit) = self.limit
            && !(1..=MAX_LIMIT).contains(&limit)
        {
            return Err(QueryError::LimitOutOfRange {
                limit,
                max: MAX_LIMIT,
            });
        }
        Ok(())
    }

    /// Validate and build the API body with qualified field references.
    pub fn to_metric_query(&self) -> QueryResult<MetricQuery> {
        self.validate()?;
        let explore = self.explore_id.trim();
        Ok(MetricQuery {
            explore_name: explore.to_string(),
            dimensions: normalize_field_list(self.dimensions.as_deref(), explore),
            metrics: normalize_field_list(self.metrics.as_deref(), explore),
            filters: normalize_filters(self.filters.as_ref(), explore),
            sorts: normalize_sorts(self.sorts.as_deref(), explore),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            table_calculations: self.table_calculations.clone().unwrap_or_default(),
            additional_metrics: Vec::new(),
            custom_dimensions: Vec::new(),
        })
    }

    /// Counts used by the complexity heuristics.
    pub fn shape(&self) -> QueryShape {
        QueryShape {
            dimensions: self.dimensions.as_ref().map_or(0, Vec::len),
            metrics: self.metrics.as_ref().map_or(0, Vec::len),
            filters: self.filters.as_ref().map_or(0, FilterTree::rule_count),
            sorts: self.sorts.as_ref().map_or(0, Vec::len),
            table_calculations: self.table_calculations.as_ref().map_or(0, Vec::len),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> QueryRequest {
        QueryRequest {
            dimensions: Some(vec!["status".into()]),
            metrics: Some(vec!["orders_count".into()]),
            ..QueryRequest::new("orders")
        }
    }

    #[test]
    fn builds_qualified_body() {
        let mut req = orders();
        req.filters = Some(
            FilterTree::from_value(Some(&json!({
                "dimensions": {"and": [{"target": {"fieldId": "status"}, "operator": "equals", "values": ["done"]}]}
            })))
            .unwrap(),
        );
        req.sorts = Some(vec![Sort {
            field_id: "count".into(),
            descending: true,
            ..Sort::default()
        }]);

        let body = serde_json::to_value(req.to_metric_query().unwrap()).unwrap();
        assert_eq!(body["exploreName"], "orders");
        assert_eq!(body["dimensions"], json!(["orders_status"]));
        assert_eq!(body["metrics"], json!(["orders_count"]));
        assert_eq!(
            body["filters"]["dimensions"]["and"][0]["target"]["fieldId"],
            "orders_status"
        );
        assert_eq!(body["sorts"][0]["fieldId"], "orders_count");
        assert_eq!(body["limit"], DEFAULT_LIMIT);
        assert_eq!(body["tableCalculations"], json!([]));
        assert_eq!(body["additionalMetrics"], json!([]));
    }

    #[test]
    fn missing_filters_become_empty_object() {
        let body = serde_json::to_value(orders().to_metric_query().unwrap()).unwrap();
        assert_eq!(body["filters"], json!({}));
    }

    #[test]
    fn non_object_filters_deserialize_as_empty_tree() {
        for filters in [json!([]), json!("status = done"), json!(5)] {
            let req: QueryRequest = serde_json::from_value(json!({
                "explore_id": "orders",
                "metrics": ["count"],
                "filters": filters
            }))
            .unwrap();
            assert_eq!(req.filters, Some(FilterTree::default()), "filters {filters}");
        }

        let req: QueryRequest =
            serde_json::from_value(json!({"explore_id": "orders", "filters": null})).unwrap();
        assert_eq!(req.filters, None);
    }

    #[test]
    fn explore_id_is_trimmed_before_qualifying() {
        let req = QueryRequest {
            explore_id: " orders ".into(),
            ..orders()
        };
        let body = req.to_metric_query().unwrap();
        assert_eq!(body.explore_name, "orders");
        assert_eq!(body.dimensions, vec!["orders_status".to_string()]);
    }

    #[test]
    fn rejects_blank_explore() {
        let req = QueryRequest {
            explore_id: "  ".into(),
            ..orders()
        };
        assert!(matches!(req.validate(), Err(QueryError::MissingExplore)));
    }

    #[test]
    fn rejects_query_without_fields() {
        let req = QueryRequest {
            dimensions: Some(vec![]),
            metrics: None,
            ..orders()
        };
        assert!(matches!(req.validate(), Err(QueryError::NoFields)));
    }

    #[test]
    fn rejects_out_of_range_limit() {
        for limit in [0, MAX_LIMIT + 1] {
            let req = QueryRequest {
                limit: Some(limit),
                ..orders()
            };
            assert!(matches!(
                req.validate(),
                Err(QueryError::LimitOutOfRange { .. })
            ));
        }
        let ok = QueryRequest {
            limit: Some(MAX_LIMIT),
            ..orders()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn shape_counts_parts() {
        let mut req = orders();
        req.table_calculations = Some(vec![json!({"name": "pct"})]);
        let shape = req.shape();
        assert_eq!(shape.dimensions, 1);
        assert_eq!(shape.metrics, 1);
        assert_eq!(shape.filters, 0);
        assert_eq!(shape.table_calculations, 1);
        assert_eq!(shape.limit, DEFAULT_LIMIT);
    }
}
