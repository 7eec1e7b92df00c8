use std::collections::BTreeMap;

/// One entry of a selection tree: a plain include flag, or a relation with
/// its own sub-selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Select {
    Field(bool),
    Relation(SelectTree),
}

/// Which fields and relations to load for an entity.
///
/// `filter` only matters on relation nodes: it restricts the related rows to
/// those whose fields equal the given values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectTree {
    pub fields: BTreeMap<String, Select>,
    pub filter: BTreeMap<String, String>,
}

impl SelectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), Select::Field(true));
        self
    }

    pub fn fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self.fields.insert((*name).to_string(), Select::Field(true));
        }
        self
    }

    pub fn relation(mut self, name: &str, sub: SelectTree) -> Self {
        self.fields.insert(name.to_string(), Select::Relation(sub));
        self
    }

    pub fn filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filter.insert(field.to_string(), value.into());
        self
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Select> {
        self.fields.get(name)
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// `self` merged with `other`, `other` winning on conflicts.
    pub fn merged(&self, other: &SelectTree) -> SelectTree {
        merge([self, other])
    }
}

/// Deep-merges selection trees left to right into a fresh tree.
///
/// Two relation nodes under the same key merge recursively; any other
/// collision keeps the rightmost value. Inputs are never modified.
pub fn merge<'a, I>(trees: I) -> SelectTree
where
    I: IntoIterator<Item = &'a SelectTree>,
{
    let mut out = SelectTree::default();
    for tree in trees {
        merge_into(&mut out, tree);
    }
    out
}

fn merge_into(dst: &mut SelectTree, src: &SelectTree) {
    for (key, value) in &src.fields {
        if let (Some(Select::Relation(existing)), Select::Relation(incoming)) =
            (dst.fields.get_mut(key), value)
        {
            merge_into(existing, incoming);
            continue;
        }
        dst.fields.insert(key.clone(), value.clone());
    }
    for (key, value) in &src.filter {
        dst.filter.insert(key.clone(), value.clone());
    }
}
