use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::simplify::SimplifyMethod;
use crate::thinning::ThinningKind;
use crate::types::Connectivity;

/// Every tunable of the extraction pipeline, passed explicitly.
///
/// ```rust
/// use pixelgraph::{TopologyConfig, Connectivity};
///
/// let config = TopologyConfig::from_json(r#"{ "connectivity": "four", "simplify_epsilon": 1.5 }"#)?;
/// assert_eq!(config.connectivity, Connectivity::Four);
/// assert!(config.skeletonize);
/// # Ok::<(), pixelgraph::GraphError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TopologyConfig {
    /// Adjacency used to split the raster into islands
    pub connectivity: Connectivity,

    pub thinning: ThinningKind,

    /// Thin each island first; turn off for input that is already one pixel wide
    pub skeletonize: bool,

    /// Islands with fewer pixels are dropped before thinning
    pub min_island_pixels: usize,

    /// Merge nodes whose centroids are this close
    #[schemars(range(min = 0.0, max = 50.0))]
    pub node_tolerance: Option<f64>,

    #[schemars(range(min = 0.0, max = 100.0))]
    pub simplify_epsilon: Option<f64>,

    pub simplify_method: SimplifyMethod,

    /// Split four-way crossings whose sharper turn stays under this many degrees
    #[schemars(range(min = 0.0, max = 180.0))]
    pub max_crossing_turn_degrees: Option<f64>,

    /// Douglas-Peucker tolerance for placing anchors on closed loops
    #[schemars(range(min = 0.0, max = 100.0))]
    pub cycle_corner_epsilon: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            thinning: ThinningKind::ZhangSuen,
            skeletonize: true,
            min_island_pixels: 1,
            node_tolerance: None,
            simplify_epsilon: None,
            simplify_method: SimplifyMethod::DouglasPeucker,
            max_crossing_turn_degrees: None,
            cycle_corner_epsilon: 1.0,
        }
    }
}

impl TopologyConfig {
    /// Get the JSON schema for the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TopologyConfig)
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = |name: &str, value: Option<f64>| match value {
            Some(v) if !v.is_finite() || v < 0.0 => Err(GraphError::InvalidConfig(format!(
                "{name} must be a non-negative number, got {v}"
            ))),
            _ => Ok(()),
        };
        non_negative("node_tolerance", self.node_tolerance)?;
        non_negative("simplify_epsilon", self.simplify_epsilon)?;
        non_negative("cycle_corner_epsilon", Some(self.cycle_corner_epsilon))?;
        non_negative("max_crossing_turn_degrees", self.max_crossing_turn_degrees)?;
        if let Some(turn) = self.max_crossing_turn_degrees.filter(|&t| t > 180.0) {
            return Err(GraphError::InvalidConfig(format!(
                "max_crossing_turn_degrees must be at most 180, got {turn}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = TopologyConfig::from_json("{}").unwrap();
        assert_eq!(config, TopologyConfig::default());
    }

    #[test]
    fn test_enum_fields_use_snake_case() {
        let config = TopologyConfig::from_json(
            r#"{ "thinning": "hilditch", "simplify_method": "visvalingam_whyatt" }"#,
        )
        .unwrap();
        assert_eq!(config.thinning, ThinningKind::Hilditch);
        assert_eq!(config.simplify_method, SimplifyMethod::VisvalingamWhyatt);
    }

    #[test]
    fn test_json_round_trip() {
        let config = TopologyConfig {
            node_tolerance: Some(2.0),
            max_crossing_turn_degrees: Some(25.0),
            ..TopologyConfig::default()
        };
        let parsed = TopologyConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let result = TopologyConfig::from_json(r#"{ "node_tolerance": -1.0 }"#);
        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_turn_over_half_circle() {
        let result = TopologyConfig::from_json(r#"{ "max_crossing_turn_degrees": 200.0 }"#);
        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let result = TopologyConfig::from_json("{ not json");
        assert!(matches!(result, Err(GraphError::Serialization(_))));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = serde_json::to_value(TopologyConfig::schema()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("connectivity").is_some());
        assert!(properties.get("max_crossing_turn_degrees").is_some());
    }
}
