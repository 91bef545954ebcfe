//! Splicing a species filter into a selection expression.

use crate::species::{Role, SpeciesKey};

/// Leaf holding a particle's species id.
pub const SPECIES_ID_LEAF: &str = "speciesId";
/// Leaf holding a particle's parent id (0 for primaries).
pub const PARENT_ID_LEAF: &str = "parentId";

const BOOLEAN_OPERATORS: [&str; 8] = ["&&", "||", "==", "!=", "<=", ">=", "<", ">"];

/// Filter expression selecting `key` in `branch`, e.g.
/// `S1.speciesId==11&&S1.parentId==0`.
pub fn species_filter(key: &SpeciesKey, branch: &str) -> String {
    let mut filter = format!("{branch}.{SPECIES_ID_LEAF}=={}", key.id);
    match key.role {
        Role::Any => {}
        Role::Primary => filter.push_str(&format!("&&{branch}.{PARENT_ID_LEAF}==0")),
        Role::Secondary => filter.push_str(&format!("&&{branch}.{PARENT_ID_LEAF}>0")),
    }
    filter
}

/// Restrict `selection` to the species `key` of `branch`.
///
/// Id 0 means no filter. An empty or `"1"` selection is replaced by the
/// filter. A selection containing a boolean operator followed by a `)` gets
/// `&&filter` inserted before that `)`; any other selection is multiplied by
/// `(filter)`.
pub fn add_species_filter(key: &SpeciesKey, selection: &str, branch: &str) -> String {
    if key.id == 0 {
        return selection.to_string();
    }
    let filter = species_filter(key, branch);
    let selection = selection.trim();
    if selection.is_empty() || selection == "1" {
        return filter;
    }

    let first_operator = BOOLEAN_OPERATORS.iter().filter_map(|op| selection.find(op)).min();
    if let Some(op_pos) = first_operator
        && let Some(close) = selection[op_pos..].find(')')
    {
        let at = op_pos + close;
        return format!("{}&&{}{}", &selection[..at], filter, &selection[at..]);
    }
    format!("{selection}*({filter})")
}
