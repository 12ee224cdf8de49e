use std::collections::HashSet;

use crate::schema::{EntitySchema, FieldType, SchemaField};

/// Collects the names of fields whose values come from an enumerated domain.
///
/// Strings carrying `one_of`/`enum` are exempt, as are arrays and sets whose elements carry
/// it. Records, and arrays of records, are walked depth-first. Names are snake_cased.
pub(crate) fn enumerated_fields(schema: &EntitySchema) -> HashSet<String> {
    let mut exempt = HashSet::new();
    collect(&schema.fields, &mut exempt);
    exempt
}

fn collect(fields: &[SchemaField], exempt: &mut HashSet<String>) {
    for field in fields {
        let node = &field.node;
        match node.kind {
            FieldType::String if node.enumerated => {
                exempt.insert(normalize(&field.name));
            }
            FieldType::Array | FieldType::Set
                if node.elements.as_ref().is_some_and(|it| it.enumerated) =>
            {
                exempt.insert(normalize(&field.name));
            }
            _ => {
                collect(&node.fields, exempt);
                if let Some(elements) = &node.elements {
                    collect(&elements.fields, exempt);
                }
            }
        }
    }
}

/// Schemas name fields in snake_case; configuration keys may not.
pub(crate) fn normalize(name: &str) -> String {
    use cruet::*;
    let normalized = name.to_snake_case();

    // cruet drops names it cannot case, keep them as-is
    if normalized.is_empty() && !name.is_empty() {
        name.to_string()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;

    #[test]
    fn should_exempt_enumerated_strings() {
        let schema = EntitySchema::new(vec![
            SchemaField::new("policy", SchemaNode::string(true)),
            SchemaField::new("host", SchemaNode::string(false)),
        ]);

        let exempt = enumerated_fields(&schema);

        assert_eq!(exempt, HashSet::from(["policy".to_string()]));
    }

    #[test]
    fn should_exempt_arrays_of_enumerated_elements() {
        let schema = EntitySchema::new(vec![
            SchemaField::new("methods", SchemaNode::array(SchemaNode::string(true))),
            SchemaField::new("origins", SchemaNode::array(SchemaNode::string(false))),
        ]);

        let exempt = enumerated_fields(&schema);

        assert_eq!(exempt, HashSet::from(["methods".to_string()]));
    }

    #[test]
    fn should_walk_nested_records_and_record_elements() {
        let schema = EntitySchema::new(vec![SchemaField::new(
            "config",
            SchemaNode::record(vec![
                SchemaField::new(
                    "redis",
                    SchemaNode::record(vec![
                        SchemaField::new("ssl_verify_mode", SchemaNode::string(true)),
                        SchemaField::new("host", SchemaNode::string(false)),
                    ]),
                ),
                SchemaField::new(
                    "rules",
                    SchemaNode::array(SchemaNode::record(vec![SchemaField::new(
                        "action",
                        SchemaNode::string(true),
                    )])),
                ),
            ]),
        )]);

        let exempt = enumerated_fields(&schema);

        assert_eq!(
            exempt,
            HashSet::from(["ssl_verify_mode".to_string(), "action".to_string()])
        );
    }

    #[test]
    fn should_normalize_names_to_snake_case() {
        assert_eq!(normalize("limitBy"), "limit_by");
        assert_eq!(normalize("LimitBy"), "limit_by");
        assert_eq!(normalize("limit_by"), "limit_by");
        assert_eq!(normalize("id"), "id");
    }
}
