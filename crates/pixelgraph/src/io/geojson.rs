use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use serde_json::{json, Map, Number};

use crate::{error::Result, graph::PixelGraph, pipeline::ExtractedTopology};

impl ExtractedTopology {
    /// Export edges as LineStrings and nodes as Points.
    ///
    /// Unresolved crossings are added as Points with `"kind": "unresolved_crossing"`.
    /// Image size and graph count go in foreign members.
    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut features = Vec::new();
        for (index, graph) in self.graphs.iter().enumerate() {
            graph_features(graph, index, &mut features)?;
        }
        for crossing in &self.unresolved {
            let mut properties = Map::new();
            properties.insert("kind".to_string(), json!("unresolved_crossing"));
            if let serde_json::Value::Object(reason) = serde_json::to_value(crossing.reason)? {
                properties.extend(reason);
            }
            let [x, y] = crossing.location;
            push_feature(&mut features, Value::Point(vec![x, y]), properties);
        }

        // Add metadata to foreign members of the FeatureCollection
        let mut foreign_members = Map::new();
        foreign_members.insert("image_width".to_string(), json!(self.width));
        foreign_members.insert("image_height".to_string(), json!(self.height));
        foreign_members.insert("graph_count".to_string(), json!(self.graphs.len()));

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        let geojson = self.to_geojson()?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }
}

fn graph_features(graph: &PixelGraph, index: usize, features: &mut Vec<Feature>) -> Result<()> {
    for edge in graph.edges() {
        let coordinates = match &edge.polyline {
            Some(polyline) => polyline.iter().map(|&[x, y]| vec![x, y]).collect(),
            None => graph.edge_path(edge).into_iter().map(|[x, y]| vec![x, y]).collect(),
        };
        let mut properties = Map::new();
        properties.insert("kind".to_string(), json!("edge"));
        properties.insert("graph".to_string(), json!(index));
        properties.insert("id".to_string(), json!(edge.id));
        properties.insert("start".to_string(), json!(edge.start));
        properties.insert("end".to_string(), json!(edge.end));
        properties.insert("pixel_count".to_string(), json!(edge.len()));
        properties.insert("cyclic".to_string(), json!(edge.cyclic));
        push_feature(features, Value::LineString(coordinates), properties);
    }

    for node in graph.nodes() {
        let [x, y] = node.centroid;
        let mut properties = Map::new();
        properties.insert("kind".to_string(), json!("node"));
        properties.insert("graph".to_string(), json!(index));
        properties.insert("id".to_string(), json!(node.id));
        properties.insert("node_kind".to_string(), serde_json::to_value(node.kind)?);
        properties.insert("nucleus".to_string(), serde_json::to_value(node.nucleus)?);
        properties.insert("degree".to_string(), json!(node.degree()));
        properties.insert("single_cycle".to_string(), json!(graph.is_single_cycle()));
        push_feature(features, Value::Point(vec![x, y]), properties);
    }
    Ok(())
}

fn push_feature(features: &mut Vec<Feature>, value: Value, properties: Map<String, serde_json::Value>) {
    let id = Number::from(features.len());
    features.push(Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::Number(id)),
        properties: Some(properties),
        foreign_members: None,
    });
}

#[cfg(test)]
mod tests {
    use crate::pipeline::Pipeline;
    use crate::raster::BinaryRaster;

    #[test]
    fn test_line_exports_edge_and_two_nodes() {
        let raster = BinaryRaster::from_rows(&["######"]);
        let topology = Pipeline::builder()
            .skip_thinning()
            .with_simplification(1.0)
            .build()
            .process(&raster)
            .unwrap();
        let collection = topology.to_geojson().unwrap();

        assert_eq!(collection.features.len(), 3);
        let edge = &collection.features[0];
        assert_eq!(edge.property("kind").and_then(|v| v.as_str()), Some("edge"));
        match &edge.geometry.as_ref().unwrap().value {
            geojson::Value::LineString(coords) => {
                assert_eq!(coords, &vec![vec![0.0, 0.0], vec![5.0, 0.0]]);
            }
            other => panic!("expected a line string, got {other:?}"),
        }
        let node = &collection.features[1];
        assert_eq!(node.property("node_kind").and_then(|v| v.as_str()), Some("terminal"));

        let members = collection.foreign_members.unwrap();
        assert_eq!(members["image_width"], 6);
        assert_eq!(members["image_height"], 1);
        assert_eq!(members["graph_count"], 1);
    }

    #[test]
    fn test_geojson_string_parses_back() {
        let raster = BinaryRaster::from_rows(&[".#.", "###", ".#."]);
        let topology = Pipeline::builder().skip_thinning().build().process(&raster).unwrap();
        let text = topology.to_geojson_string().unwrap();
        let parsed: geojson::FeatureCollection = text.parse().unwrap();
        // four edges and five nodes
        assert_eq!(parsed.features.len(), 9);
        let cross = parsed
            .features
            .iter()
            .find(|f| f.property("nucleus").and_then(|v| v.as_str()) == Some("cross"));
        assert!(cross.is_some());
    }
}
