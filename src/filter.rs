use crate::domain::{KbDocument, MetadataField, MetadataFilter};

/// Drops built-in fields, then applies the caller's filter. Order is preserved.
pub fn filter_metadata(fields: &[MetadataField], filter: &MetadataFilter) -> Vec<MetadataField> {
    fields
        .iter()
        .filter(|field| !field.is_built_in())
        .filter(|field| keep_field(field, filter))
        .cloned()
        .collect()
}

/// Filtered metadata for a document, or `None` when a name/value filter
/// matched none of its fields.
pub fn select_document(document: &KbDocument, filter: &MetadataFilter) -> Option<Vec<MetadataField>> {
    let filtered = filter_metadata(&document.metadata, filter);
    if matches!(filter, MetadataFilter::Values(_)) && filtered.is_empty() {
        return None;
    }
    Some(filtered)
}

fn keep_field(field: &MetadataField, filter: &MetadataFilter) -> bool {
    let name = field.name.trim();
    match filter {
        MetadataFilter::All => true,
        MetadataFilter::Names(names) => !name.is_empty() && names.contains(name),
        MetadataFilter::Values(pairs) => pairs
            .get(name)
            .map(|expected| !name.is_empty() && field.value_text() == *expected)
            .unwrap_or(false),
    }
}
