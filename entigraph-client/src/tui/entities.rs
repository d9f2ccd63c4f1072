use entigraph_shared::record::{DefinitionRecord, EntityRecord};

use crate::util::format::{bold, cyan, dim, pad_cell, truncate_str};

fn row(cells: &[(String, usize)], tail: &str) -> String {
    let mut out = String::new();
    for (cell, width) in cells {
        out.push_str(&pad_cell(cell, *width));
        out.push(' ');
    }
    out.push_str(tail);
    out
}

fn labels_cell(record: &EntityRecord) -> String {
    if record.metadata.labels.is_empty() {
        return dim("-");
    }
    record
        .metadata
        .labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn print_entities_table(entities: &[EntityRecord]) {
    if entities.is_empty() {
        println!("{}", dim("No entities found"));
        return;
    }

    const W_NAMESPACE: usize = 16;
    const W_NAME: usize = 28;
    const W_KIND: usize = 18;
    const W_API: usize = 24;

    println!("{}", bold("Entities"));
    println!(
        "  {}",
        row(
            &[
                (dim("NAMESPACE"), W_NAMESPACE),
                (dim("NAME"), W_NAME),
                (dim("KIND"), W_KIND),
                (dim("API VERSION"), W_API),
            ],
            &dim("LABELS"),
        )
    );

    for e in entities {
        let namespace = truncate_str(&e.metadata.namespace, W_NAMESPACE - 1);
        let name = truncate_str(&e.metadata.name, W_NAME - 1);
        let kind = truncate_str(&e.kind, W_KIND - 1);
        let api = truncate_str(&e.api_version, W_API - 1);
        println!(
            "  {}",
            row(
                &[
                    (namespace, W_NAMESPACE),
                    (name, W_NAME),
                    (cyan(&kind), W_KIND),
                    (api, W_API),
                ],
                &labels_cell(e),
            )
        );
    }
}

pub fn print_definitions_table(definitions: &[DefinitionRecord]) {
    if definitions.is_empty() {
        println!("{}", dim("No definitions found"));
        return;
    }

    const W_GROUP: usize = 24;
    const W_KIND: usize = 20;
    const W_PLURAL: usize = 20;

    println!("{}", bold("Definitions"));
    println!(
        "  {}",
        row(
            &[
                (dim("GROUP"), W_GROUP),
                (dim("KIND"), W_KIND),
                (dim("PLURAL"), W_PLURAL),
            ],
            &dim("DESCRIPTION"),
        )
    );

    for d in definitions {
        let group = truncate_str(&d.group, W_GROUP - 1);
        let kind = truncate_str(&d.kind, W_KIND - 1);
        let plural = truncate_str(&d.resolved_plural(), W_PLURAL - 1);
        let description = d.description.as_deref().unwrap_or("-");
        println!(
            "  {}",
            row(
                &[(group, W_GROUP), (cyan(&kind), W_KIND), (plural, W_PLURAL)],
                &truncate_str(description, 60),
            )
        );
    }
}

pub fn print_entity_detail(entity: &EntityRecord) {
    println!(
        "{} {}",
        cyan(&entity.kind),
        bold(&format!("{}/{}", entity.metadata.namespace, entity.metadata.name))
    );
    println!("  {} {}", pad_cell(&dim("API VERSION"), 13), entity.api_version);

    for (title, map) in [
        ("LABELS", &entity.metadata.labels),
        ("ANNOTATIONS", &entity.metadata.annotations),
    ] {
        if map.is_empty() {
            continue;
        }
        println!("  {}", dim(title));
        for (k, v) in map {
            println!("    {k}={v}");
        }
    }

    for (title, value) in [("SPEC", &entity.spec), ("STATUS", &entity.status)] {
        let Some(value) = value else { continue };
        println!("  {}", dim(title));
        // entity bodies are already plain maps at this point
        match serde_yaml::to_string(value) {
            Ok(yaml) => {
                for line in yaml.lines() {
                    println!("    {line}");
                }
            }
            Err(_) => println!("    {value}"),
        }
    }
}
