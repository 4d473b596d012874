//! Metadata reader.
//!
//! Fetches and parses a service's `$metadata` EDMX document into
//! [`EntitySetDescriptor`]s. Parsing is namespace-agnostic: SAP gateways mix
//! EDM schema versions and prefixes, so elements are matched by local name.
//!
//! Invariants:
//! - Every returned entity set has at least one key field. When the metadata
//!   declares no `<Key>`, the first declared property is used and
//!   `inferred_key` is set; the inference is logged at warn level.
//! - Entity types with zero properties are skipped, never returned.
//! - Any failure surfaces as `MetadataParse` naming the service; callers
//!   decide whether to isolate or propagate it.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use tracing::warn;

use crate::error::{ClientError, Result};
use crate::models::{EntitySetDescriptor, FieldDescriptor, FieldKind, ServiceDescriptor};
use crate::transport::Transport;

/// Fetch and parse the `$metadata` document of a service.
pub async fn fetch_entity_sets(
    transport: &Transport,
    service: &ServiceDescriptor,
) -> Result<Vec<EntitySetDescriptor>> {
    let url = format!("{}/$metadata", service.url.trim_end_matches('/'));
    let response = transport.get(&url, &[]).await?;
    let body = response.text().await.map_err(|e| ClientError::Network {
        url,
        message: format!("failed to read metadata body: {e}"),
    })?;

    parse_metadata(&service.name, &body)
}

/// Parse an EDMX metadata document into entity set descriptors.
pub fn parse_metadata(service_name: &str, body: &str) -> Result<Vec<EntitySetDescriptor>> {
    let doc = Document::parse(body).map_err(|e| ClientError::MetadataParse {
        service: service_name.to_string(),
        message: format!("invalid XML: {e}"),
    })?;

    // Pass 1: entity types, keyed by unqualified name.
    let mut entity_types: HashMap<String, EntityType> = HashMap::new();
    for node in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "EntityType")
    {
        let Some(name) = node.attribute("Name") else {
            continue;
        };
        if let Some(entity_type) = parse_entity_type(service_name, name, node) {
            entity_types.insert(name.to_string(), entity_type);
        }
    }

    // Pass 2: entity sets from the container, bound by unqualified type name.
    let mut entity_sets = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "EntitySet")
    {
        let (Some(set_name), Some(type_ref)) =
            (node.attribute("Name"), node.attribute("EntityType"))
        else {
            continue;
        };
        // The binding is namespace-qualified, e.g. `API_SALES.SalesOrderType`.
        let type_name = type_ref.rsplit('.').next().unwrap_or(type_ref);
        let Some(entity_type) = entity_types.get(type_name) else {
            warn!(
                service = service_name,
                entity_set = set_name,
                entity_type = type_ref,
                "entity set references an undeclared entity type, skipping"
            );
            continue;
        };

        entity_sets.push(EntitySetDescriptor {
            service_name: service_name.to_string(),
            name: set_name.to_string(),
            fields: entity_type.fields.clone(),
            key_fields: entity_type.key_fields.clone(),
            inferred_key: entity_type.inferred_key,
        });
    }

    if entity_sets.is_empty() {
        return Err(ClientError::MetadataParse {
            service: service_name.to_string(),
            message: "metadata declares no usable entity sets".to_string(),
        });
    }
    Ok(entity_sets)
}

struct EntityType {
    fields: Vec<FieldDescriptor>,
    key_fields: Vec<String>,
    inferred_key: bool,
}

fn parse_entity_type(service_name: &str, type_name: &str, node: Node) -> Option<EntityType> {
    let declared_keys: Vec<String> = node
        .children()
        .find(|c| c.tag_name().name() == "Key")
        .map(|key| {
            key.children()
                .filter(|c| c.tag_name().name() == "PropertyRef")
                .filter_map(|p| p.attribute("Name"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut fields: Vec<FieldDescriptor> = node
        .children()
        .filter(|c| c.tag_name().name() == "Property")
        .filter_map(|p| {
            let name = p.attribute("Name")?;
            let kind = p
                .attribute("Type")
                .map(FieldKind::from_edm)
                .unwrap_or(FieldKind::String);
            Some(FieldDescriptor {
                name: name.to_string(),
                kind,
                is_key: declared_keys.iter().any(|k| k == name),
            })
        })
        .collect();

    if fields.is_empty() {
        warn!(
            service = service_name,
            entity_type = type_name,
            "entity type declares no properties, skipping"
        );
        return None;
    }

    let (key_fields, inferred_key) = if declared_keys.is_empty() {
        let first = fields[0].name.clone();
        warn!(
            service = service_name,
            entity_type = type_name,
            key = %first,
            "metadata declares no key, inferring first property"
        );
        fields[0].is_key = true;
        (vec![first], true)
    } else {
        (declared_keys, false)
    };

    Some(EntityType {
        fields,
        key_fields,
        inferred_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema Namespace="API_SALES" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="SalesOrderType">
        <Key><PropertyRef Name="SalesOrder"/></Key>
        <Property Name="SalesOrder" Type="Edm.String" Nullable="false"/>
        <Property Name="NetAmount" Type="Edm.Decimal"/>
        <Property Name="CreationDate" Type="Edm.DateTime"/>
        <Property Name="IsReleased" Type="Edm.Boolean"/>
      </EntityType>
      <EntityType Name="ItemType">
        <Property Name="ItemNumber" Type="Edm.Int32"/>
        <Property Name="Material" Type="Edm.String"/>
      </EntityType>
      <EntityContainer Name="API_SALES_Entities">
        <EntitySet Name="SalesOrders" EntityType="API_SALES.SalesOrderType"/>
        <EntitySet Name="Items" EntityType="API_SALES.ItemType"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn parses_entity_sets_with_declared_keys() {
        let sets = parse_metadata("API_SALES_SRV", METADATA).unwrap();
        assert_eq!(sets.len(), 2);

        let orders = sets.iter().find(|s| s.name == "SalesOrders").unwrap();
        assert_eq!(orders.service_name, "API_SALES_SRV");
        assert_eq!(orders.key_fields, vec!["SalesOrder"]);
        assert!(!orders.inferred_key);
        assert_eq!(orders.fields.len(), 4);
        assert!(orders.field("SalesOrder").unwrap().is_key);
        assert_eq!(orders.field("NetAmount").unwrap().kind, FieldKind::Number);
        assert_eq!(orders.field("CreationDate").unwrap().kind, FieldKind::Date);
        assert_eq!(orders.field("IsReleased").unwrap().kind, FieldKind::Boolean);
    }

    #[test]
    fn missing_key_is_inferred_from_first_property() {
        let sets = parse_metadata("API_SALES_SRV", METADATA).unwrap();
        let items = sets.iter().find(|s| s.name == "Items").unwrap();
        assert_eq!(items.key_fields, vec!["ItemNumber"]);
        assert!(items.inferred_key);
        assert!(items.field("ItemNumber").unwrap().is_key);
    }

    #[test]
    fn empty_entity_types_are_skipped() {
        let body = r#"<Edmx><DataServices><Schema>
            <EntityType Name="Empty"/>
            <EntityType Name="Real">
              <Key><PropertyRef Name="Id"/></Key>
              <Property Name="Id" Type="Edm.String"/>
            </EntityType>
            <EntityContainer>
              <EntitySet Name="Empties" EntityType="NS.Empty"/>
              <EntitySet Name="Reals" EntityType="NS.Real"/>
            </EntityContainer>
        </Schema></DataServices></Edmx>"#;

        let sets = parse_metadata("Z_SRV", body).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "Reals");
    }

    #[test]
    fn malformed_xml_names_the_service() {
        let err = parse_metadata("Z_BROKEN_SRV", "<not-closed").unwrap_err();
        match err {
            ClientError::MetadataParse { service, .. } => assert_eq!(service, "Z_BROKEN_SRV"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn no_entity_sets_is_an_error() {
        let body = r#"<Edmx><DataServices><Schema/></DataServices></Edmx>"#;
        let err = parse_metadata("Z_EMPTY_SRV", body).unwrap_err();
        assert!(matches!(err, ClientError::MetadataParse { .. }));
    }
}
