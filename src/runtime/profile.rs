use std::fmt::Write;

/// A named node of counters, nested the way the query's instances are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    name: String,
    counters: Vec<(String, i64)>,
    children: Vec<RuntimeProfile>,
}

impl RuntimeProfile {
    pub fn new(name: impl Into<String>) -> Self {
        RuntimeProfile {
            name: name.into(),
            counters: vec![],
            children: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets `name` to `value`, keeping the position of an existing counter.
    pub fn set_counter(&mut self, name: &str, value: i64) {
        match self.counters.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.counters.push((name.to_string(), value)),
        }
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn counters(&self) -> &[(String, i64)] {
        &self.counters
    }

    pub fn add_child(&mut self, child: RuntimeProfile) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[RuntimeProfile] {
        &self.children
    }

    /// Sum of `name` over this node and all of its descendants.
    pub fn total(&self, name: &str) -> i64 {
        self.counter(name).unwrap_or_default()
            + self.children.iter().map(|c| c.total(name)).sum::<i64>()
    }

    fn pretty_internal(&self, level: usize, output: &mut String) {
        let indent = " ".repeat(level * 2);
        let _ = writeln!(output, "{}{}", indent, self.name);
        for (name, value) in &self.counters {
            let _ = writeln!(output, "{}   - {}: {}", indent, name, value);
        }
        for child in &self.children {
            child.pretty_internal(level + 1, output);
        }
    }

    pub fn pretty_string(&self) -> String {
        let mut output = String::new();
        self.pretty_internal(0, &mut output);
        output.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn render_nested_profile() {
        let mut instance = RuntimeProfile::new("Instance F01#0");
        instance.set_counter("RowsRead", 3);
        instance.set_counter("RowErrors", 1);
        instance.set_counter("RowsRead", 4);
        let mut query = RuntimeProfile::new("Query (id=1)");
        query.add_child(instance.clone());
        query.add_child(instance);

        assert_eq!(query.total("RowsRead"), 8);
        assert_eq!(
            query.pretty_string(),
            "\
Query (id=1)
  Instance F01#0
     - RowsRead: 4
     - RowErrors: 1
  Instance F01#0
     - RowsRead: 4
     - RowErrors: 1"
        );
    }
}
