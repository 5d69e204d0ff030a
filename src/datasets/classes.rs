use std::collections::HashMap;

/// Dense class indices `[0, len)` keyed by class name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassIndex {
    classes: Vec<String>,
    class_to_idx: HashMap<String, usize>,
}

impl ClassIndex {
    /// Distinct names in sorted order.
    pub fn sorted<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = names.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self::from_ordered(classes)
    }

    /// Distinct names in the order they are first seen.
    pub fn first_seen<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for name in names {
            index.insert(name.into());
        }
        index
    }

    fn from_ordered(classes: Vec<String>) -> Self {
        let class_to_idx = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            classes,
            class_to_idx,
        }
    }

    /// Index of `name`, assigning the next free one on first sight.
    pub fn insert(&mut self, name: String) -> usize {
        if let Some(&idx) = self.class_to_idx.get(&name) {
            return idx;
        }
        let idx = self.classes.len();
        self.class_to_idx.insert(name.clone(), idx);
        self.classes.push(name);
        idx
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.class_to_idx.get(name).copied()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_dedups_and_orders() {
        let index = ClassIndex::sorted(["pear", "apple", "pear", "fig"]);
        assert_eq!(index.classes(), ["apple", "fig", "pear"]);
        assert_eq!(index.get("pear"), Some(2));
        assert_eq!(index.get("kiwi"), None);
    }

    #[test]
    fn first_seen_keeps_encounter_order() {
        let index = ClassIndex::first_seen(["Plantae", "Aves", "Plantae", "Fungi"]);
        assert_eq!(index.classes(), ["Plantae", "Aves", "Fungi"]);
        assert_eq!(index.get("Aves"), Some(1));
        assert_eq!(index.len(), 3);
    }
}
