//! Sorter resolution: requested or default order-by key to a concrete ordering target.

use crate::config::{SorterDefinition, SorterSet};
use crate::error::{AppError, ConfigError};
use crate::query::{ColumnRef, Query, SortDirection};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortTarget {
    Property(String),
    /// Column of a storage table joined on `entity_id`.
    Joined { table: String, column: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSort {
    pub name: String,
    pub target: SortTarget,
    pub direction: SortDirection,
}

/// Picks the sorter named by `requested` when the set declares it, else the route
/// default. A default missing from the set, or an unknown request with no default to
/// fall back on, is a configuration error. `direction` overrides the declared one.
pub fn resolve_sorter(
    sorters: &SorterSet,
    requested: Option<&str>,
    default: Option<&str>,
    direction: Option<&str>,
) -> Result<Option<ResolvedSort>, AppError> {
    let chosen = match requested.and_then(|name| sorters.get_key_value(name)) {
        Some(found) => Some(found),
        None => match default.or(requested) {
            Some(name) => Some(sorters.get_key_value(name).ok_or_else(|| ConfigError::MissingReference {
                kind: "sorter",
                id: name.to_string(),
            })?),
            None => None,
        },
    };
    let Some((name, def)) = chosen else {
        return Ok(None);
    };
    let direction = match direction {
        Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
        None => def.sort,
    };
    Ok(Some(ResolvedSort {
        name: name.clone(),
        target: target(name, def)?,
        direction,
    }))
}

fn target(name: &str, def: &SorterDefinition) -> Result<SortTarget, ConfigError> {
    match (&def.property, &def.table, &def.column) {
        (Some(property), None, None) => Ok(SortTarget::Property(property.clone())),
        (None, Some(table), Some(column)) => Ok(SortTarget::Joined {
            table: table.clone(),
            column: column.clone(),
        }),
        _ => Err(ConfigError::InvalidDefinition {
            kind: "sorter",
            id: name.to_string(),
            reason: "set either property or table and column".into(),
        }),
    }
}

pub fn apply_sort(query: Query, sort: &ResolvedSort) -> Query {
    match &sort.target {
        SortTarget::Property(property) => {
            let column = query.base_column(property);
            query.order_by(column, sort.direction)
        }
        SortTarget::Joined { table, column } => query
            .join_entity_table(table, table)
            .order_by(ColumnRef::new(table.clone(), column.clone()), sort.direction),
    }
}
