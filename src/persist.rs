//! Canvas persistence.
//!
//! Canvases serialize to a versioned JSON document carrying nodes (with
//! their dynamic ports and property values), connections as port-address
//! pairs, and groups. Restore is tolerant per element: a node of an
//! unregistered type, a port with an undecodable value type, or a
//! connection that no longer validates is logged and skipped, and the rest
//! of the document loads. Whole-document failures (unparseable JSON,
//! unsupported version, I/O) are errors.

use std::path::Path;
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::canvas::{Canvas, NodeGroup};
use crate::node::{port_from_spec, PortSpec, Property, PropertySpec};
use crate::ports::ElementOrigin;
use crate::registry::NodeRegistry;
use crate::types::{ConnectionId, NodeId, PortDirection, PortKind, PortRef};
use crate::value::{Value, ValueType};

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("canvas document is not valid JSON")]
    #[diagnostic(code(flowcanvas::persist::parse))]
    Parse(#[from] serde_json::Error),

    #[error("unsupported canvas document version {found} (supported: {DOCUMENT_VERSION})")]
    #[diagnostic(
        code(flowcanvas::persist::version),
        help("This build reads version 1 documents only.")
    )]
    UnsupportedVersion { found: u32 },

    #[error("canvas file I/O failed")]
    #[diagnostic(code(flowcanvas::persist::io))]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasDoc {
    version: u32,
    nodes: Vec<NodeDoc>,
    connections: Vec<ConnectionDoc>,
    #[serde(default)]
    groups: Vec<NodeGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeDoc {
    id: NodeId,
    type_name: String,
    name: String,
    #[serde(default)]
    description: String,
    x: f64,
    y: f64,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    properties: Vec<PropertyDoc>,
    #[serde(default)]
    dynamic_input_ports: Vec<PortDoc>,
    #[serde(default)]
    dynamic_output_ports: Vec<PortDoc>,
    #[serde(default)]
    dynamic_flow_in_ports: Vec<PortDoc>,
    #[serde(default)]
    dynamic_flow_out_ports: Vec<PortDoc>,
    #[serde(default)]
    hidden_ports: Vec<PortStateDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyDoc {
    name: String,
    value_type: String,
    value: Value,
    #[serde(default)]
    connectable: bool,
    #[serde(default)]
    dynamic: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortDoc {
    name: String,
    value_type: String,
    #[serde(default = "default_true")]
    visible: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortStateDoc {
    direction: PortDirection,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionDoc {
    id: ConnectionId,
    source: PortRef,
    target: PortRef,
}

fn default_true() -> bool {
    true
}

/// Serialize a canvas to its JSON document form.
pub fn to_json(canvas: &Canvas) -> Result<String, PersistError> {
    let doc = build_document(canvas);
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Restore a canvas from a JSON document, resolving node types against
/// `registry`.
pub fn from_json(json: &str, registry: Arc<NodeRegistry>) -> Result<Canvas, PersistError> {
    let doc: CanvasDoc = serde_json::from_str(json)?;
    if doc.version != DOCUMENT_VERSION {
        return Err(PersistError::UnsupportedVersion { found: doc.version });
    }
    Ok(restore(doc, registry))
}

/// Write a canvas document to disk.
#[instrument(skip(canvas))]
pub async fn save_to_file(canvas: &Canvas, path: &Path) -> Result<(), PersistError> {
    let json = to_json(canvas)?;
    tokio::fs::write(path, json).await?;
    debug!(?path, "canvas saved");
    Ok(())
}

/// Load a canvas document from disk.
#[instrument(skip(registry))]
pub async fn load_from_file(
    path: &Path,
    registry: Arc<NodeRegistry>,
) -> Result<Canvas, PersistError> {
    let json = tokio::fs::read_to_string(path).await?;
    from_json(&json, registry)
}

fn build_document(canvas: &Canvas) -> CanvasDoc {
    let nodes = canvas
        .nodes()
        .iter()
        .map(|node| {
            let port_docs = |ports: &[crate::ports::Port]| -> Vec<PortDoc> {
                ports
                    .iter()
                    .filter(|p| p.origin.is_dynamic())
                    .map(|p| PortDoc {
                        name: p.name.clone(),
                        value_type: p.value_type.encode(),
                        visible: p.visible,
                    })
                    .collect()
            };
            let hidden_ports = node
                .ports()
                .filter(|p| !p.visible && !p.origin.is_dynamic())
                .map(|p| PortStateDoc {
                    direction: p.kind.direction(),
                    name: p.name.clone(),
                })
                .collect();
            NodeDoc {
                id: node.id(),
                type_name: node.type_name().to_string(),
                name: node.name.clone(),
                description: node.description.clone(),
                x: node.x,
                y: node.y,
                visible: node.visible,
                properties: node
                    .properties()
                    .iter()
                    .map(|p| PropertyDoc {
                        name: p.name.clone(),
                        value_type: p.value_type.encode(),
                        value: p.value.clone(),
                        connectable: p.connectable,
                        dynamic: p.origin.is_dynamic(),
                    })
                    .collect(),
                dynamic_input_ports: port_docs(node.inputs()),
                dynamic_output_ports: port_docs(node.outputs()),
                dynamic_flow_in_ports: port_docs(node.flow_ins()),
                dynamic_flow_out_ports: port_docs(node.flow_outs()),
                hidden_ports,
            }
        })
        .collect();
    let connections = canvas
        .connections()
        .iter()
        .map(|c| ConnectionDoc {
            id: c.id,
            source: c.source.clone(),
            target: c.target.clone(),
        })
        .collect();
    CanvasDoc {
        version: DOCUMENT_VERSION,
        nodes,
        connections,
        groups: canvas.groups().to_vec(),
    }
}

fn restore(doc: CanvasDoc, registry: Arc<NodeRegistry>) -> Canvas {
    let mut canvas = Canvas::new(registry);

    for node_doc in doc.nodes {
        if let Err(e) = restore_node(&mut canvas, &node_doc) {
            warn!(node = %node_doc.id, type_name = %node_doc.type_name, error = %e, "skipping node");
        }
    }
    for conn_doc in doc.connections {
        if let Err(e) = canvas.connect_with_id(conn_doc.id, conn_doc.source, conn_doc.target) {
            warn!(connection = %conn_doc.id, error = %e, "skipping connection");
        }
    }
    for group in doc.groups {
        canvas.add_group(group);
    }
    canvas
}

fn restore_node(canvas: &mut Canvas, doc: &NodeDoc) -> Result<(), crate::canvas::CanvasError> {
    canvas.create_node_with_id(doc.id, &doc.type_name, doc.x, doc.y)?;
    let convert = canvas.conversion().clone();

    if let Some(node) = canvas.node_mut(doc.id) {
        node.name = doc.name.clone();
        node.description = doc.description.clone();
        node.visible = doc.visible;

        // Property values land directly: one reconfigure pass afterwards
        // reconciles dynamic shape, instead of one per edit. Dynamic
        // properties the default layout did not produce are added from the
        // document so their values survive.
        for prop_doc in &doc.properties {
            let Some(declared) = ValueType::decode(&prop_doc.value_type) else {
                warn!(node = %doc.id, property = %prop_doc.name, value_type = %prop_doc.value_type,
                      "skipping property with unknown value type");
                continue;
            };
            if node.property(&prop_doc.name).is_none() {
                if !prop_doc.dynamic {
                    warn!(node = %doc.id, property = %prop_doc.name,
                          "skipping value for property the schema no longer declares");
                    continue;
                }
                let mut spec =
                    PropertySpec::new(prop_doc.name.clone(), declared.clone(), Value::Null);
                if prop_doc.connectable {
                    spec = spec.connectable();
                }
                node.add_property(Property::from_spec(
                    &spec,
                    ElementOrigin::Dynamic {
                        key: prop_doc.name.clone(),
                    },
                ));
            }
            if let Some(property) = node.property_mut(&prop_doc.name) {
                let value = prop_doc.value.clone();
                if value.is_null()
                    || matches!(property.value_type, ValueType::Any)
                    || crate::convert::matches_exactly(&value, &property.value_type)
                {
                    property.value = value;
                } else if let Some(coerced) = convert.convert(&value, &property.value_type) {
                    property.value = coerced;
                } else {
                    warn!(node = %doc.id, property = %prop_doc.name,
                          "skipping property value that does not convert to the declared type");
                }
            }
        }
    }

    canvas.reconfigure_node(doc.id)?;

    if let Some(node) = canvas.node_mut(doc.id) {
        let dynamic_port_docs = [
            (PortKind::Input, &doc.dynamic_input_ports),
            (PortKind::Output, &doc.dynamic_output_ports),
            (PortKind::FlowIn, &doc.dynamic_flow_in_ports),
            (PortKind::FlowOut, &doc.dynamic_flow_out_ports),
        ];
        for (kind, docs) in dynamic_port_docs {
            for port_doc in docs.iter() {
                let Some(value_type) = ValueType::decode(&port_doc.value_type) else {
                    warn!(node = %doc.id, port = %port_doc.name, value_type = %port_doc.value_type,
                          "skipping dynamic port with unknown value type");
                    continue;
                };
                if node.port(kind.direction(), &port_doc.name).is_none() {
                    let mut spec = PortSpec::new(port_doc.name.clone(), value_type);
                    if !port_doc.visible {
                        spec = spec.hidden();
                    }
                    node.add_port(port_from_spec(
                        &spec,
                        kind,
                        ElementOrigin::Dynamic {
                            key: port_doc.name.clone(),
                        },
                    ));
                } else if let Some(port) = node.port_mut(kind.direction(), &port_doc.name) {
                    port.visible = port_doc.visible;
                }
            }
        }
        for hidden in &doc.hidden_ports {
            match node.port_mut(hidden.direction, &hidden.name) {
                Some(port) => port.visible = false,
                None => warn!(node = %doc.id, port = %hidden.name, "skipping unknown hidden port"),
            }
        }
    }
    Ok(())
}
