//! Scrapes an OSM XML document into flat node/way/relation records.
//!
//! Real-world extracts are noisy, so a single broken element never aborts the whole read. Per
//! <https://wiki.openstreetmap.org/wiki/OSM_XML#Certainties_and_Uncertainties>, we assume
//! elements come in order: nodes, ways, then relations.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use geom::{Distance, GPSBounds, LonLat};

use crate::osm::{NodeID, OsmID, RelationID, Tags, WayID};
use crate::report::{ImportError, ImportReport};

pub struct Document {
    pub gps_bounds: GPSBounds,
    pub nodes: BTreeMap<NodeID, Node>,
    pub ways: BTreeMap<WayID, Way>,
    pub relations: BTreeMap<RelationID, Relation>,
}

pub struct Node {
    pub lon_lat: LonLat,
    /// From the "ele" tag, when the input has surveyed elevation.
    pub elevation: Option<Distance>,
    pub tags: Tags,
}

pub struct Way {
    /// All references resolve against the node set; ways with any dangling reference are
    /// dropped before this point.
    pub nodes: Vec<NodeID>,
    pub tags: Tags,
}

pub struct Relation {
    pub tags: Tags,
    /// Role, member
    pub members: Vec<(String, OsmID)>,
}

pub fn read(raw_xml: &str, report: &mut ImportReport) -> Result<Document> {
    let tree = roxmltree::Document::parse(raw_xml).context("malformed OSM XML")?;

    let mut doc = Document {
        gps_bounds: GPSBounds::new(),
        nodes: BTreeMap::new(),
        ways: BTreeMap::new(),
        relations: BTreeMap::new(),
    };

    for obj in tree.descendants() {
        if !obj.is_element() {
            continue;
        }
        match obj.tag_name().name() {
            "node" => {
                let (id, node) = match scrape_node(obj) {
                    Some(pair) => pair,
                    None => {
                        report.record(ImportError::MalformedElement {
                            detail: "node missing id, lat, or lon".to_string(),
                        });
                        continue;
                    }
                };
                if doc.nodes.contains_key(&id) {
                    report.record(ImportError::MalformedElement {
                        detail: format!("duplicate {}", id),
                    });
                    continue;
                }
                doc.gps_bounds.update(node.lon_lat);
                doc.nodes.insert(id, node);
            }
            "way" => {
                let id = match parse_id(obj.attribute("id")) {
                    Some(id) => WayID(id),
                    None => {
                        report.record(ImportError::MalformedElement {
                            detail: "way missing id".to_string(),
                        });
                        continue;
                    }
                };
                if doc.ways.contains_key(&id) {
                    report.record(ImportError::MalformedElement {
                        detail: format!("duplicate {}", id),
                    });
                    continue;
                }

                let mut nodes = Vec::new();
                let mut dangling = None;
                for child in obj.children() {
                    if child.tag_name().name() != "nd" {
                        continue;
                    }
                    match parse_id(child.attribute("ref")) {
                        Some(raw) => {
                            let n = NodeID(raw);
                            if doc.nodes.contains_key(&n) {
                                nodes.push(n);
                            } else {
                                dangling = Some(n);
                                break;
                            }
                        }
                        None => {
                            report.record(ImportError::MalformedElement {
                                detail: format!("{} has an nd without a ref", id),
                            });
                        }
                    }
                }
                // One bad reference drops the whole way; a partially-resolved way would have
                // broken geometry.
                if let Some(n) = dangling {
                    report.record(ImportError::DanglingReference {
                        from: OsmID::Way(id),
                        missing: OsmID::Node(n),
                    });
                    continue;
                }
                if nodes.len() < 2 {
                    report.record(ImportError::DegenerateGeometry {
                        id: OsmID::Way(id),
                        reason: "fewer than 2 nodes".to_string(),
                    });
                    continue;
                }
                doc.ways.insert(
                    id,
                    Way {
                        nodes,
                        tags: read_tags(obj),
                    },
                );
            }
            "relation" => {
                let id = match parse_id(obj.attribute("id")) {
                    Some(id) => RelationID(id),
                    None => {
                        report.record(ImportError::MalformedElement {
                            detail: "relation missing id".to_string(),
                        });
                        continue;
                    }
                };
                if doc.relations.contains_key(&id) {
                    report.record(ImportError::MalformedElement {
                        detail: format!("duplicate {}", id),
                    });
                    continue;
                }
                let mut members = Vec::new();
                for child in obj.children() {
                    if child.tag_name().name() != "member" {
                        continue;
                    }
                    let raw_ref = match parse_id(child.attribute("ref")) {
                        Some(x) => x,
                        None => {
                            continue;
                        }
                    };
                    let member = match child.attribute("type") {
                        Some("node") => {
                            let n = NodeID(raw_ref);
                            if !doc.nodes.contains_key(&n) {
                                report.record(ImportError::DanglingReference {
                                    from: OsmID::Relation(id),
                                    missing: OsmID::Node(n),
                                });
                                continue;
                            }
                            OsmID::Node(n)
                        }
                        Some("way") => {
                            let w = WayID(raw_ref);
                            if !doc.ways.contains_key(&w) {
                                report.record(ImportError::DanglingReference {
                                    from: OsmID::Relation(id),
                                    missing: OsmID::Way(w),
                                });
                                continue;
                            }
                            OsmID::Way(w)
                        }
                        Some("relation") => {
                            let r = RelationID(raw_ref);
                            if !doc.relations.contains_key(&r) {
                                report.record(ImportError::DanglingReference {
                                    from: OsmID::Relation(id),
                                    missing: OsmID::Relation(r),
                                });
                                continue;
                            }
                            OsmID::Relation(r)
                        }
                        _ => {
                            continue;
                        }
                    };
                    let role = child.attribute("role").unwrap_or("").to_string();
                    members.push((role, member));
                }
                doc.relations.insert(
                    id,
                    Relation {
                        tags: read_tags(obj),
                        members,
                    },
                );
            }
            _ => {}
        }
    }

    info!(
        "Document has {} nodes, {} ways, {} relations",
        doc.nodes.len(),
        doc.ways.len(),
        doc.relations.len()
    );

    Ok(doc)
}

fn scrape_node(obj: roxmltree::Node) -> Option<(NodeID, Node)> {
    let id = NodeID(parse_id(obj.attribute("id"))?);
    let lon = obj.attribute("lon")?.parse::<f64>().ok()?;
    let lat = obj.attribute("lat")?.parse::<f64>().ok()?;
    if !lon.is_finite() || !lat.is_finite() {
        return None;
    }
    let tags = read_tags(obj);
    let elevation = tags
        .get("ele")
        .and_then(|raw| raw.parse::<f64>().ok())
        .map(Distance::meters);
    Some((
        id,
        Node {
            lon_lat: LonLat::new(lon, lat),
            elevation,
            tags,
        },
    ))
}

fn parse_id(raw: Option<&str>) -> Option<i64> {
    raw?.parse::<i64>().ok()
}

fn read_tags(obj: roxmltree::Node) -> Tags {
    let mut tags = Tags::empty();
    for child in obj.children() {
        if child.tag_name().name() == "tag" {
            if let (Some(key), Some(value)) = (child.attribute("k"), child.attribute("v")) {
                // Filter out really useless data
                if key.starts_with("tiger:") || key.starts_with("old_name:") {
                    continue;
                }
                tags.insert(key, value);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_broken_elements() {
        let mut report = ImportReport::new();
        let doc = read(
            r#"<osm>
                 <node id="1" lon="-122.3" lat="47.6"/>
                 <node id="2" lon="oops" lat="47.6"/>
                 <node id="3" lon="-122.301" lat="47.601"/>
                 <way id="10"><nd ref="1"/><nd ref="3"/><tag k="highway" v="residential"/></way>
                 <way id="11"><nd ref="1"/><nd ref="999"/></way>
               </osm>"#,
            &mut report,
        )
        .unwrap();

        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.ways.len(), 1);
        assert_eq!(report.malformed_elements(), 1);
        assert_eq!(report.dangling_references(), 1);
    }

    #[test]
    fn unreadable_root_fails() {
        let mut report = ImportReport::new();
        assert!(read("<osm><node id=", &mut report).is_err());
    }
}
