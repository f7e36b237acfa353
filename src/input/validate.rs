//! Checking attribute names against the attribute schema.
use crate::component::ComponentType;
use crate::schema::AttributeSchema;
use anyhow::{Result, bail};

/// Attributes which case files may name differently for particular component types
const RENAMES: [(ComponentType, &str, &str); 6] = [
    (ComponentType::Link, "bus", "bus0"),
    (ComponentType::StorageUnit, "efficiency", "efficiency_store"),
    (ComponentType::Store, "p_min_pu", "e_min_pu"),
    (ComponentType::Store, "p_max_pu", "e_max_pu"),
    (ComponentType::Store, "p_nom", "e_nom"),
    (ComponentType::Store, "cyclic_state_of_charge", "e_cyclic"),
];

/// The schema name of a case file column for the given component type
pub fn rename_attribute(kind: ComponentType, attribute: &str) -> &str {
    RENAMES
        .iter()
        .find(|(k, from, _)| *k == kind && *from == attribute)
        .map_or(attribute, |&(_, _, to)| to)
}

/// Find the first attribute name which is not an input attribute of the component type
pub fn find_invalid_attribute<'a, I>(
    names: I,
    kind: ComponentType,
    schema: &AttributeSchema,
) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .find(|name| !schema.is_input(kind, name))
}

/// Check that every attribute column is valid for at least one component type
pub fn validate_header(header: &[String], schema: &AttributeSchema) -> Result<()> {
    for name in header.iter().skip(2).filter(|name| !name.is_empty()) {
        if !ComponentType::ALL
            .into_iter()
            .any(|kind| schema.is_input(kind, rename_attribute(kind, name)))
        {
            bail!("Attribute '{name}' is not valid for any component type");
        }
    }

    Ok(())
}
