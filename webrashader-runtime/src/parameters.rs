use crate::error::ResolveError;
use webrashader_common::map::{FastHashMap, ShortString};
use webrashader_preprocess::ShaderParameter;
use webrashader_presets::ParameterConfig;

/// A parameter and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    /// The first declaration of the parameter.
    pub meta: ShaderParameter,
    /// The pass that declared the parameter first.
    pub pass: usize,
    /// The current value.
    pub value: f32,
}

/// The shader parameters of a loaded preset.
///
/// The set of names is fixed once the table is resolved, only values change.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    entries: Vec<ParameterEntry>,
    index: FastHashMap<ShortString, usize>,
}

impl ParameterTable {
    /// Merge the parameters declared by each pass, in pass order, then apply
    /// the overrides of the preset and of the caller.
    ///
    /// The first declaration of a name wins. A later declaration with
    /// different bounds is a [`ResolveError::ParameterConflict`], a different
    /// label or initial value is not. Overrides for names no pass declares
    /// are ignored.
    pub fn resolve<'a>(
        passes: impl IntoIterator<Item = &'a [ShaderParameter]>,
        preset: &[ParameterConfig],
        overrides: &[(&str, f32)],
    ) -> Result<ParameterTable, ResolveError> {
        let mut table = ParameterTable::default();
        for (pass, parameters) in passes.into_iter().enumerate() {
            for parameter in parameters {
                if let Some(&idx) = table.index.get(parameter.id.as_str()) {
                    let first = &table.entries[idx];
                    if !first.meta.same_bounds(parameter) {
                        return Err(ResolveError::ParameterConflict {
                            name: parameter.id.to_string(),
                            first_pass: first.pass,
                            pass,
                        });
                    }
                    continue;
                }
                table.index.insert(parameter.id.clone(), table.entries.len());
                table.entries.push(ParameterEntry {
                    meta: parameter.clone(),
                    pass,
                    value: parameter.initial,
                });
            }
        }

        let preset = preset.iter().map(|p| (p.name.as_str(), p.value));
        for (name, value) in preset.chain(overrides.iter().copied()) {
            if table.set(name, value).is_none() {
                tracing::debug!(name, "ignored override of undeclared parameter");
            }
        }
        Ok(table)
    }

    /// The current value of `name`.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.entry(name).map(|entry| entry.value)
    }

    /// Set the value of `name`, returning the previous value, or `None` if no
    /// pass declares it.
    pub fn set(&mut self, name: &str, value: f32) -> Option<f32> {
        let idx = *self.index.get(name)?;
        let entry = &mut self.entries[idx];
        Some(std::mem::replace(&mut entry.value, value))
    }

    /// The entry of `name`.
    pub fn entry(&self, name: &str) -> Option<&ParameterEntry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Whether a pass declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterEntry> {
        self.entries.iter()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parameter(id: &str, initial: f32, maximum: f32) -> ShaderParameter {
        ShaderParameter {
            id: id.into(),
            description: format!("{id} label"),
            initial,
            minimum: 0.0,
            maximum,
            step: 0.05,
            active: true,
        }
    }

    #[test]
    fn first_declaration_wins() {
        let first = [parameter("BOOST", 1.0, 4.0), parameter("GAMMA", 2.2, 3.0)];
        let second = [parameter("BOOST", 3.0, 4.0)];
        let table = ParameterTable::resolve([&first[..], &second[..]], &[], &[]).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("BOOST"), Some(1.0));
        assert_eq!(table.entry("BOOST").map(|e| e.pass), Some(0));
        let names: Vec<&str> = table.iter().map(|e| e.meta.id.as_str()).collect();
        assert_eq!(names, vec!["BOOST", "GAMMA"]);
    }

    #[test]
    fn rejects_conflicting_bounds() {
        let first = [parameter("BOOST", 1.0, 4.0)];
        let second = [parameter("GAMMA", 2.2, 3.0), parameter("BOOST", 1.0, 8.0)];
        let err = ParameterTable::resolve([&first[..], &second[..]], &[], &[]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::ParameterConflict {
                name: "BOOST".to_string(),
                first_pass: 0,
                pass: 1,
            }
        );
    }

    #[test]
    fn applies_overrides_in_order() {
        let declared = [parameter("BOOST", 1.0, 4.0), parameter("GAMMA", 2.2, 3.0)];
        let preset = [
            ParameterConfig {
                name: "BOOST".to_string(),
                value: 2.0,
            },
            ParameterConfig {
                name: "UNKNOWN".to_string(),
                value: 9.0,
            },
        ];
        let mut table =
            ParameterTable::resolve([&declared[..]], &preset, &[("GAMMA", 2.4)]).unwrap();
        assert_eq!(table.get("BOOST"), Some(2.0));
        assert_eq!(table.get("GAMMA"), Some(2.4));
        assert!(!table.contains("UNKNOWN"));

        assert_eq!(table.set("BOOST", 3.0), Some(2.0));
        assert_eq!(table.set("UNKNOWN", 1.0), None);
        assert_eq!(table.get("BOOST"), Some(3.0));
        assert_eq!(table.len(), 2);
    }
}
