//! Resolving the cells of a component row into attribute values.
use super::cell::CellValue;
use super::validate::{find_invalid_attribute, rename_attribute};
use crate::component::{AttributeValue, ComponentRecord, ComponentType};
use crate::costs::CostTable;
use crate::schema::{AttributeKind, AttributeSchema};
use crate::sheet::{Cell, Row, cell_at};
use anyhow::{Context, Result, bail, ensure};
use log::{debug, info, warn};

/// Marks a component row as a comment
const COMMENT_MARKER: char = '#';

/// Resolve a single cell and add the result to the record.
///
/// Attributes which the schema gives as text (names of buses and carriers, control strategies and
/// so on) take the cell's text, without any surrounding quotes. Other attributes accept numbers,
/// booleans, quoted text, time series files and references to the cost database, which are
/// looked up using the record's technology.
///
/// An empty cell falls back to the cost database: if the technology has a value for the
/// attribute it is used, otherwise the attribute takes its default value.
///
/// # Arguments
///
/// * `record` - The record to update
/// * `attribute` - Attribute name from the column header (after renaming). May be empty.
/// * `raw` - The cell
/// * `schema` - Attribute schema
/// * `costs` - The technology cost database
pub fn resolve_attribute(
    record: &mut ComponentRecord,
    attribute: &str,
    raw: &Cell,
    schema: &AttributeSchema,
    costs: &CostTable,
) -> Result<()> {
    if attribute.is_empty() {
        if !raw.is_empty() {
            warn!(
                "Ignoring value '{raw}' for {} {}: column has no attribute name",
                record.kind, record.name
            );
        }
        return Ok(());
    }

    let is_text = schema
        .get(record.kind, attribute)
        .is_some_and(|meta| meta.kind == AttributeKind::String);
    let cell = if is_text {
        CellValue::parse_text(raw)
    } else {
        CellValue::parse(raw)?
    };
    let value = match cell {
        CellValue::Empty => {
            if is_text || !schema.is_input(record.kind, attribute) {
                return Ok(());
            }
            match costs.get(&record.technology, attribute) {
                Ok(value) => {
                    debug!(
                        "{} {}: {attribute} = {value} from the cost database",
                        record.kind, record.name
                    );
                    AttributeValue::Number(value)
                }
                Err(_) => return Ok(()),
            }
        }
        CellValue::Literal(value) => AttributeValue::Text(value),
        CellValue::Number(value) => AttributeValue::Number(value),
        CellValue::Bool(value) => AttributeValue::Bool(value),
        CellValue::FileRef(path) => AttributeValue::File(path),
        CellValue::DbRef {
            factor,
            attribute: db_attribute,
        } => {
            let db_attribute = db_attribute.as_deref().unwrap_or(attribute);
            let value = costs.get(&record.technology, db_attribute).with_context(|| {
                format!(
                    "Could not resolve attribute {attribute} of {} {}",
                    record.kind, record.name
                )
            })?;
            debug!(
                "{} {}: {attribute} = {factor} * {db_attribute} of {} = {}",
                record.kind,
                record.name,
                record.technology,
                factor * value
            );
            AttributeValue::Number(factor * value)
        }
        CellValue::Text(text) => bail!(
            "Cannot interpret value '{text}' for attribute {attribute} of {} {}",
            record.kind,
            record.name
        ),
    };
    record.attributes.insert(attribute.to_string(), value);

    Ok(())
}

/// Resolve one row of the component section.
///
/// Returns `None` for comment rows. The resolved attributes are checked against the schema for
/// the row's component type.
///
/// # Arguments
///
/// * `row` - The row
/// * `header` - The component header row (`component`, `name`, then attribute names)
/// * `schema` - Attribute schema
/// * `costs` - The technology cost database
pub fn resolve_component_row(
    row: &Row,
    header: &[String],
    schema: &AttributeSchema,
    costs: &CostTable,
) -> Result<Option<ComponentRecord>> {
    let kind = match cell_at(row, 0) {
        Cell::Text(text) if text.starts_with(COMMENT_MARKER) => {
            info!("Skipping commented-out row: {text}");
            return Ok(None);
        }
        Cell::Empty => bail!("Component row has no component type"),
        cell => cell.to_string().parse::<ComponentType>()?,
    };
    let name = cell_at(row, 1).to_string();
    ensure!(!name.is_empty(), "{kind} has no name");

    let mut record = ComponentRecord::new(kind, &name);
    for col in 2..row.len().max(header.len()) {
        let attribute = header
            .get(col)
            .map_or("", |attribute| rename_attribute(kind, attribute));
        resolve_attribute(&mut record, attribute, cell_at(row, col), schema, costs)?;
    }

    if let Some(invalid) = find_invalid_attribute(
        record.attributes.keys().map(String::as_str),
        kind,
        schema,
    ) {
        bail!("Attribute '{invalid}' is not valid for {kind} {name}");
    }

    Ok(Some(record))
}
