//! Build matrix: named, orthogonal axes of build variants.
//!
//! Each column (e.g. `Platform`, `Linkage`) offers a list of options, and each
//! option may carry a [`ConfigPatch`] with the configuration fields it sets.
//! Choosing one option per column resolves to a [`Configuration`].
//!
//! The output kind belongs to the project, so options never set it.
//!
//! Columns must touch disjoint fields. Overlap is detected when the matrix is
//! built or loaded and reported by [`BuildMatrix::resolve`] as
//! [`MatrixError::ConflictingColumn`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::core::configuration::{Architecture, Configuration};
use crate::core::errors::MatrixError;
use crate::document::{Object, Value};

/// Column name -> chosen option value.
pub type Selection = BTreeMap<String, String>;

/// Configuration field a matrix option can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigField {
    Architecture,
    Defines,
    IncludeDirs,
    LibraryDirs,
    Libraries,
}

impl ConfigField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::Architecture => "Architecture",
            ConfigField::Defines => "Defines",
            ConfigField::IncludeDirs => "IncludeDirs",
            ConfigField::LibraryDirs => "LibraryDirs",
            ConfigField::Libraries => "Libraries",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configuration fields one matrix option sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub architecture: Option<Architecture>,
    pub defines: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<PathBuf>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.libraries.push(library.into());
        self
    }

    /// Fields this patch sets.
    pub fn fields(&self) -> Vec<ConfigField> {
        let mut fields = Vec::new();
        if self.architecture.is_some() {
            fields.push(ConfigField::Architecture);
        }
        if !self.defines.is_empty() {
            fields.push(ConfigField::Defines);
        }
        if !self.include_dirs.is_empty() {
            fields.push(ConfigField::IncludeDirs);
        }
        if !self.library_dirs.is_empty() {
            fields.push(ConfigField::LibraryDirs);
        }
        if !self.libraries.is_empty() {
            fields.push(ConfigField::Libraries);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn apply(&self, configuration: &mut Configuration) {
        if let Some(architecture) = self.architecture {
            configuration.architecture = Some(architecture);
        }
        configuration.defines.extend(self.defines.iter().cloned());
        configuration
            .include_dirs
            .extend(self.include_dirs.iter().cloned());
        configuration
            .library_dirs
            .extend(self.library_dirs.iter().cloned());
        configuration.libraries.extend(self.libraries.iter().cloned());
    }
}

/// One selectable value of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixOption {
    pub value: String,
    pub settings: ConfigPatch,
}

/// A named axis of build variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub options: Vec<MatrixOption>,
}

impl Column {
    pub fn option(&self, value: &str) -> Option<&MatrixOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Union of fields set by any option, in first-seen order.
    fn fields(&self) -> Vec<ConfigField> {
        let mut fields = Vec::new();
        for option in &self.options {
            for field in option.settings.fields() {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields
    }
}

/// Ordered set of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMatrix {
    columns: Vec<Column>,
    conflict: Option<MatrixError>,
}

impl BuildMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Overlap detected by the last validation, if any.
    pub fn conflict(&self) -> Option<&MatrixError> {
        self.conflict.as_ref()
    }

    /// Append an empty column.
    pub fn add_column(&mut self, name: impl Into<String>) -> Result<(), MatrixError> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(MatrixError::DuplicateColumn { column: name });
        }
        self.columns.push(Column {
            name,
            options: Vec::new(),
        });
        Ok(())
    }

    /// Append an option to an existing column.
    ///
    /// Re-validates the matrix; an overlap is recorded, not returned.
    pub fn add_option(
        &mut self,
        column: &str,
        value: impl Into<String>,
        settings: ConfigPatch,
    ) -> Result<(), MatrixError> {
        let value = value.into();
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == column)
            .ok_or_else(|| MatrixError::UnknownColumn {
                column: column.to_string(),
            })?;

        if col.option(&value).is_some() {
            return Err(MatrixError::DuplicateOption {
                column: column.to_string(),
                option: value,
            });
        }
        col.options.push(MatrixOption { value, settings });

        self.conflict = self.validate().err();
        Ok(())
    }

    /// Check that no two columns set the same configuration field.
    pub fn validate(&self) -> Result<(), MatrixError> {
        let fields: Vec<Vec<ConfigField>> = self.columns.iter().map(Column::fields).collect();

        for (i, first) in self.columns.iter().enumerate() {
            for (j, second) in self.columns.iter().enumerate().skip(i + 1) {
                if let Some(field) = fields[i].iter().find(|f| fields[j].contains(f)) {
                    return Err(MatrixError::ConflictingColumn {
                        first: first.name.clone(),
                        second: second.name.clone(),
                        field: *field,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve one option per column into a configuration.
    pub fn resolve(&self, selection: &Selection) -> Result<Configuration, MatrixError> {
        if let Some(conflict) = &self.conflict {
            return Err(conflict.clone());
        }

        if let Some(unknown) = selection.keys().find(|k| self.column(k).is_none()) {
            return Err(MatrixError::UnknownColumn {
                column: unknown.clone(),
            });
        }

        let mut configuration = Configuration::new();
        for column in &self.columns {
            let value = selection
                .get(&column.name)
                .ok_or_else(|| MatrixError::MissingSelection {
                    column: column.name.clone(),
                })?;
            let option = column
                .option(value)
                .ok_or_else(|| MatrixError::UnknownOption {
                    column: column.name.clone(),
                    option: value.clone(),
                })?;
            option.settings.apply(&mut configuration);
        }
        Ok(configuration)
    }

    /// Every full selection, first column varying slowest.
    pub fn combinations(&self) -> Vec<Selection> {
        let mut result = vec![Selection::new()];
        for column in &self.columns {
            let mut next = Vec::with_capacity(result.len() * column.options.len());
            for partial in &result {
                for option in &column.options {
                    let mut selection = partial.clone();
                    selection.insert(column.name.clone(), option.value.clone());
                    next.push(selection);
                }
            }
            result = next;
        }
        result
    }

    /// The first option of every column.
    pub fn default_selection(&self) -> Selection {
        self.columns
            .iter()
            .filter_map(|c| c.options.first().map(|o| (c.name.clone(), o.value.clone())))
            .collect()
    }

    /// Serialize as a `Matrix` table.
    pub fn to_object(&self) -> Object {
        let mut matrix = Object::table("Matrix");
        for column in &self.columns {
            let mut col = Object::table(&column.name);
            for option in &column.options {
                col.add_child(option_to_object(option));
            }
            matrix.add_child(col);
        }
        matrix
    }

    /// Deserialize from a `Matrix` table.
    ///
    /// Structural problems (duplicates, bad values) fail; column overlap is
    /// recorded and surfaces on [`BuildMatrix::resolve`].
    pub fn from_object(object: &Object) -> Result<Self, MatrixError> {
        let mut matrix = BuildMatrix::new();

        for col in object.children() {
            if let Value::String(s) = col.value() {
                return Err(MatrixError::InvalidSetting {
                    column: col.name().to_string(),
                    option: String::new(),
                    message: format!("expected a table of options, found `{}`", s),
                });
            }
            matrix.add_column(col.name())?;

            for opt in col.children() {
                let settings = patch_from_object(col.name(), opt)?;
                matrix.add_option(col.name(), opt.name(), settings)?;
            }
        }

        matrix.conflict = matrix.validate().err();
        if let Some(conflict) = &matrix.conflict {
            tracing::warn!("build matrix: {}", conflict);
        }
        Ok(matrix)
    }
}

fn option_to_object(option: &MatrixOption) -> Object {
    let settings = &option.settings;
    if settings.is_empty() {
        return Object::new(&option.value);
    }

    let mut obj = Object::table(&option.value);
    if let Some(architecture) = settings.architecture {
        obj.add_child(Object::string("Architecture", architecture.as_str()));
    }
    let lists: [(&str, Vec<String>); 4] = [
        ("Defines", settings.defines.clone()),
        ("IncludeDirs", display_all(&settings.include_dirs)),
        ("LibraryDirs", display_all(&settings.library_dirs)),
        ("Libraries", display_all(&settings.libraries)),
    ];
    for (name, items) in lists {
        if !items.is_empty() {
            let mut list = Object::table(name);
            for item in items {
                list.add_child(Object::new(item));
            }
            obj.add_child(list);
        }
    }
    obj
}

fn display_all(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

fn patch_from_object(column: &str, option: &Object) -> Result<ConfigPatch, MatrixError> {
    let invalid = |message: String| MatrixError::InvalidSetting {
        column: column.to_string(),
        option: option.name().to_string(),
        message,
    };

    let mut patch = ConfigPatch::new();
    for setting in option.children() {
        let names = || setting.children().iter().map(|c| c.name().to_string());
        match setting.name() {
            "Architecture" => {
                let text = setting
                    .as_str()
                    .ok_or_else(|| invalid("Architecture needs a value".to_string()))?;
                patch.architecture = Some(text.parse().map_err(|e| invalid(format!("{}", e)))?);
            }
            "Defines" => patch.defines.extend(names()),
            "IncludeDirs" => patch.include_dirs.extend(names().map(PathBuf::from)),
            "LibraryDirs" => patch.library_dirs.extend(names().map(PathBuf::from)),
            "Libraries" => patch.libraries.extend(names().map(PathBuf::from)),
            other => tracing::debug!(
                "ignoring setting `{}` of option `{}` in column `{}`",
                other,
                option.name(),
                column
            ),
        }
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse, render};

    fn sample() -> BuildMatrix {
        let mut matrix = BuildMatrix::new();
        matrix.add_column("Platform").unwrap();
        matrix
            .add_option(
                "Platform",
                "x64",
                ConfigPatch::new().with_architecture(Architecture::X86_64),
            )
            .unwrap();
        matrix
            .add_option(
                "Platform",
                "x86",
                ConfigPatch::new().with_architecture(Architecture::X86),
            )
            .unwrap();
        matrix.add_column("Config").unwrap();
        matrix
            .add_option("Config", "Debug", ConfigPatch::new().with_define("DEBUG"))
            .unwrap();
        matrix
            .add_option("Config", "Release", ConfigPatch::new().with_define("NDEBUG"))
            .unwrap();
        matrix
    }

    fn select(pairs: &[(&str, &str)]) -> Selection {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve() {
        let matrix = sample();
        let config = matrix
            .resolve(&select(&[("Platform", "x86"), ("Config", "Release")]))
            .unwrap();
        assert_eq!(config.architecture, Some(Architecture::X86));
        assert_eq!(config.defines, vec!["NDEBUG"]);
    }

    #[test]
    fn test_missing_and_unknown_selection() {
        let matrix = sample();
        assert_eq!(
            matrix.resolve(&select(&[("Platform", "x64")])),
            Err(MatrixError::MissingSelection {
                column: "Config".to_string()
            })
        );
        assert_eq!(
            matrix.resolve(&select(&[("Platform", "arm64"), ("Config", "Debug")])),
            Err(MatrixError::UnknownOption {
                column: "Platform".to_string(),
                option: "arm64".to_string()
            })
        );
        assert!(matches!(
            matrix.resolve(&select(&[
                ("Platform", "x64"),
                ("Config", "Debug"),
                ("Flavor", "Demo")
            ])),
            Err(MatrixError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_conflicting_columns() {
        let mut matrix = sample();
        matrix.add_column("Target").unwrap();
        matrix
            .add_option(
                "Target",
                "Legacy",
                ConfigPatch::new().with_architecture(Architecture::X86),
            )
            .unwrap();

        let err = matrix
            .resolve(&select(&[
                ("Platform", "x64"),
                ("Config", "Debug"),
                ("Target", "Legacy"),
            ]))
            .unwrap_err();
        assert_eq!(
            err,
            MatrixError::ConflictingColumn {
                first: "Platform".to_string(),
                second: "Target".to_string(),
                field: ConfigField::Architecture,
            }
        );
        assert!(matrix.conflict().is_some());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut matrix = sample();
        assert!(matches!(
            matrix.add_column("Platform"),
            Err(MatrixError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            matrix.add_option("Config", "Debug", ConfigPatch::new()),
            Err(MatrixError::DuplicateOption { .. })
        ));
        assert!(matches!(
            matrix.add_option("Nope", "x", ConfigPatch::new()),
            Err(MatrixError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_combinations() {
        let combos = sample().combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0], select(&[("Platform", "x64"), ("Config", "Debug")]));
        assert_eq!(combos[1], select(&[("Platform", "x64"), ("Config", "Release")]));
        assert_eq!(combos[3], select(&[("Platform", "x86"), ("Config", "Release")]));

        assert_eq!(BuildMatrix::new().combinations(), vec![Selection::new()]);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut matrix = sample();
        matrix.add_column("Linkage").unwrap();
        matrix
            .add_option(
                "Linkage",
                "Static",
                ConfigPatch::new()
                    .with_library_dir("deps/lib")
                    .with_library("zlib"),
            )
            .unwrap();
        matrix.add_option("Linkage", "Plain", ConfigPatch::new()).unwrap();
        matrix.add_column("Empty").unwrap();

        let text = render(&[matrix.to_object()]);
        let objects = parse(&text).unwrap();
        let loaded = BuildMatrix::from_object(&objects[0]).unwrap();

        assert_eq!(loaded, matrix);
        let names: Vec<_> = loaded.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Platform", "Config", "Linkage", "Empty"]);
        let options: Vec<_> = loaded.columns()[0]
            .options
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(options, ["x64", "x86"]);
    }

    #[test]
    fn test_invalid_setting() {
        let objects = parse("Matrix:\n\tPlatform:\n\t\tx64:\n\t\t\tArchitecture: sparc\n").unwrap();
        assert!(matches!(
            BuildMatrix::from_object(&objects[0]),
            Err(MatrixError::InvalidSetting { .. })
        ));

    }

    #[test]
    fn test_unknown_settings_ignored() {
        let text = "Matrix:\n\
                    \tConfig:\n\
                    \t\tDebug:\n\
                    \t\t\tOptimize: O0\n\
                    \t\t\tDefines:\n\
                    \t\t\t\tDEBUG\n\
                    \tLinkage:\n\
                    \t\tStatic:\n\
                    \t\t\tKind: StaticLibrary\n";
        let objects = parse(text).unwrap();
        let matrix = BuildMatrix::from_object(&objects[0]).unwrap();

        let debug = matrix.column("Config").unwrap().option("Debug").unwrap();
        assert_eq!(debug.settings, ConfigPatch::new().with_define("DEBUG"));
        let fixed = matrix.column("Linkage").unwrap().option("Static").unwrap();
        assert!(fixed.settings.is_empty());

        let selection = select(&[("Config", "Debug"), ("Linkage", "Static")]);
        let config = matrix.resolve(&selection).unwrap();
        assert_eq!(config.defines, vec!["DEBUG"]);
        assert_eq!(config.kind, Configuration::new().kind);
    }

    #[test]
    fn test_default_selection() {
        let selection = sample().default_selection();
        assert_eq!(selection, select(&[("Platform", "x64"), ("Config", "Debug")]));
    }
}
