//! Specification loader

use crate::config::RunnerConfig;
use crate::error::{PackspecError, Result};
use crate::feature::{Feature, FeatureParser};
use crate::scope::{ExtensionRegistry, PackageRegistry, Scope};
use crate::types::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory searched when no path is given and no `package.*` file exists
pub const DEFAULT_DIRECTORY: &str = "packspec";

/// Feature counts, computed once at load time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub features: usize,
    pub comments: usize,
    pub skipped: usize,
    pub tests: usize,
}

impl Stats {
    fn count(features: &[Feature]) -> Self {
        let mut stats = Stats::default();
        for feature in features {
            stats.features += 1;
            match feature {
                Feature::Comment(_) => stats.comments += 1,
                Feature::Test(test) => {
                    stats.tests += 1;
                    if test.skip {
                        stats.skipped += 1;
                    }
                }
            }
        }
        stats
    }
}

/// A loaded specification, ready to run
#[derive(Debug)]
pub struct Specification {
    /// Text of the leading comment
    pub package: String,
    pub features: Vec<Feature>,
    pub scope: Scope,
    pub stats: Stats,
}

/// Loads specification files
pub struct SpecLoader {
    parser: FeatureParser,
    packages: PackageRegistry,
    extensions: ExtensionRegistry,
}

impl SpecLoader {
    /// Create a loader with no packages or extensions registered
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        Ok(Self {
            parser: FeatureParser::new(config.runtime_tag.clone())?,
            packages: PackageRegistry::new(),
            extensions: ExtensionRegistry::new(),
        })
    }

    /// Packages `$import` can reach
    pub fn with_packages(mut self, packages: PackageRegistry) -> Self {
        self.packages = packages;
        self
    }

    /// Extension sets specifications may ask for
    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    /// Load every specification under `path`
    ///
    /// A file loads itself, a directory loads its YAML files in name order.
    /// Without a path the `package.*` files of the working directory are
    /// used, falling back to the `packspec` directory.
    pub fn load_path(&self, path: Option<&Path>) -> Result<Vec<Specification>> {
        let mut specs = Vec::new();
        for path in candidate_paths(Path::new("."), path)? {
            if let Some(spec) = self.load_file(&path)? {
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    /// Load a specification file; files that are not YAML are ignored
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Option<Specification>> {
        let path = path.as_ref();
        if !is_yaml(path) {
            tracing::debug!("Ignoring {}", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let spec = self.load_string(&content)?;
        if let Some(spec) = &spec {
            tracing::info!(
                "Loaded {} ({} features) from {}",
                spec.package,
                spec.stats.features,
                path.display()
            );
        }
        Ok(spec)
    }

    /// Load a specification from a YAML stream
    ///
    /// Returns `None` when the package comment is tagged for other runtimes.
    pub fn load_string(&self, content: &str) -> Result<Option<Specification>> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            documents.push(serde_yaml::Value::deserialize(document)?);
        }
        let Some(first) = documents.first() else {
            tracing::warn!("Specification contains no documents");
            return Ok(None);
        };
        let serde_yaml::Value::Sequence(entries) = first else {
            return Err(PackspecError::Parse(
                "specification must be a sequence of features".to_string(),
            ));
        };

        let mut features = Vec::with_capacity(entries.len());
        let mut ambient_skip = false;
        for entry in entries {
            let mut feature = self.parser.parse(&Value::from(entry))?;
            match &mut feature {
                Feature::Comment(comment) => ambient_skip = comment.skip,
                Feature::Test(test) => {
                    if test.tags.is_none() {
                        test.skip = ambient_skip;
                    }
                }
            }
            features.push(feature);
        }

        let package = match features.first() {
            Some(Feature::Comment(comment)) if comment.skip => {
                tracing::warn!(
                    "Skipping {}: not tagged for {}",
                    comment.text,
                    self.parser.runtime_tag()
                );
                return Ok(None);
            }
            Some(Feature::Comment(comment)) => comment.text.clone(),
            _ => {
                return Err(PackspecError::Parse(
                    "specification must start with a package comment".to_string(),
                ))
            }
        };

        let mut scope = Scope::new(&self.packages);
        if let Some(hooks) = documents.get(1) {
            for name in self.extension_names(hooks)? {
                let extension = self.extensions.get(&name)?;
                scope.register_extension(&*extension);
            }
        }

        let stats = Stats::count(&features);
        Ok(Some(Specification {
            package,
            features,
            scope,
            stats,
        }))
    }

    /// Extension sets the hook document names for this runtime
    fn extension_names(&self, hooks: &serde_yaml::Value) -> Result<Vec<String>> {
        let entry = match hooks {
            serde_yaml::Value::Mapping(mapping) => mapping.get(self.parser.runtime_tag()),
            serde_yaml::Value::Null => None,
            _ => {
                return Err(PackspecError::Parse(
                    "hook document must be a mapping".to_string(),
                ))
            }
        };
        match entry {
            None => Ok(Vec::new()),
            Some(serde_yaml::Value::String(name)) => Ok(vec![name.clone()]),
            Some(serde_yaml::Value::Sequence(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().map(String::from).ok_or_else(|| {
                        PackspecError::Parse("extension names must be strings".to_string())
                    })
                })
                .collect(),
            Some(_) => Err(PackspecError::Parse(
                "extension names must be strings".to_string(),
            )),
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Files to load for `path`, resolved against `root` when no path is given
fn candidate_paths(root: &Path, path: Option<&Path>) -> Result<Vec<PathBuf>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let packages = sorted_files(root, |file| {
                file.file_stem().and_then(|stem| stem.to_str()) == Some("package")
            })?;
            if !packages.is_empty() {
                return Ok(packages);
            }
            root.join(DEFAULT_DIRECTORY)
        }
    };
    if path.is_file() {
        Ok(vec![path])
    } else if path.is_dir() {
        sorted_files(&path, |_| true)
    } else {
        tracing::warn!("No specifications found at {}", path.display());
        Ok(Vec::new())
    }
}

fn sorted_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
