//! The type dictionary: which object classes exist and which properties they
//! own.
//!
//! The compiler only ever talks to the [`TypeDictionary`] trait. [`Dictionary`]
//! is the in-memory implementation, loaded from JSON.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::sanitize::sanitize_property;

/// Lookups the compiler needs from a dictionary of building object classes.
pub trait TypeDictionary {
    /// Whether `name` is an object class.
    fn contains_object(&self, name: &str) -> bool;

    /// The object classes (lower-cased) that own a property named `property`.
    fn objects_with_property(&self, property: &str) -> BTreeSet<String>;

    /// The descriptor of `property` on `object`, if the object owns it.
    fn property(&self, object: &str, property: &str) -> Option<&PropertyDescriptor>;
}

/// The kind of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// A decimal number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Anything else.
    String,
}

impl DataType {
    /// Guesses the data type of a literal value.
    ///
    /// ```
    /// use rase::domain::dictionary::DataType;
    ///
    /// assert_eq!(DataType::infer("800"), DataType::Number);
    /// assert_eq!(DataType::infer("True"), DataType::Boolean);
    /// assert_eq!(DataType::infer("timber"), DataType::String);
    /// ```
    #[must_use]
    pub fn infer(value: &str) -> Self {
        let value = value.trim();
        if value.parse::<f64>().is_ok_and(f64::is_finite) {
            Self::Number
        } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            Self::Boolean
        } else {
            Self::String
        }
    }
}

/// What the dictionary knows about one property of an object class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// The property name as curated.
    pub name: String,

    /// The type of value the property holds, if curated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    /// Units the property may be expressed in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<String>,

    /// Citations where the property was seen.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Example or enumerated values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl PropertyDescriptor {
    /// A descriptor with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            units: Vec::new(),
            references: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Sets the data type.
    #[must_use]
    pub const fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Adds an accepted unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.units.push(unit.into());
        self
    }
}

/// The key a property is stored under: sanitised then lower-cased.
fn property_key(property: &str) -> String {
    sanitize_property(property).to_lowercase()
}

fn object_key(object: &str) -> String {
    object.trim().to_lowercase()
}

/// An in-memory dictionary of object classes and their properties.
///
/// Object names are case-insensitive. Property names are compared after
/// property sanitising and lower-casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    objects: BTreeMap<String, BTreeMap<String, PropertyDescriptor>>,
}

impl Dictionary {
    /// Adds an object class, or returns it unchanged if already present.
    pub fn add_object(&mut self, object: &str) {
        self.objects.entry(object_key(object)).or_default();
    }

    /// Adds a property to an object class, creating the class if needed.
    ///
    /// A property with the same key replaces the previous descriptor.
    pub fn add_property(&mut self, object: &str, descriptor: PropertyDescriptor) {
        self.objects
            .entry(object_key(object))
            .or_default()
            .insert(property_key(&descriptor.name), descriptor);
    }

    /// Builder form of [`Self::add_property`] for a bare property name.
    #[must_use]
    pub fn with_property(mut self, object: &str, property: &str) -> Self {
        self.add_property(object, PropertyDescriptor::named(property));
        self
    }

    /// The object classes, lower-cased and sorted.
    pub fn objects(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Every `(object, descriptor)` pair in the dictionary.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.objects.iter().flat_map(|(object, properties)| {
            properties
                .values()
                .map(move |descriptor| (object.as_str(), descriptor))
        })
    }

    /// Parses a dictionary from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: DictionaryFile = serde_json::from_str(json)?;
        Ok(file.into())
    }

    /// Loads a dictionary from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialises the dictionary to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&DictionaryFile::from(self))
    }
}

impl TypeDictionary for Dictionary {
    fn contains_object(&self, name: &str) -> bool {
        self.objects.contains_key(&object_key(name))
    }

    fn objects_with_property(&self, property: &str) -> BTreeSet<String> {
        let key = property_key(property);
        self.objects
            .iter()
            .filter(|(_, properties)| properties.contains_key(&key))
            .map(|(object, _)| object.clone())
            .collect()
    }

    fn property(&self, object: &str, property: &str) -> Option<&PropertyDescriptor> {
        self.objects
            .get(&object_key(object))?
            .get(&property_key(property))
    }
}

/// Errors that can occur when loading a dictionary.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read dictionary '{path}'")]
    Io {
        /// The dictionary path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not a valid dictionary.
    #[error("failed to parse dictionary '{path}'")]
    Json {
        /// The dictionary path.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    objects: BTreeMap<String, ObjectEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectEntry {
    #[serde(default)]
    properties: Vec<PropertyDescriptor>,
}

impl From<DictionaryFile> for Dictionary {
    fn from(file: DictionaryFile) -> Self {
        let mut dictionary = Self::default();
        for (object, entry) in file.objects {
            dictionary.add_object(&object);
            for descriptor in entry.properties {
                dictionary.add_property(&object, descriptor);
            }
        }
        dictionary
    }
}

impl From<&Dictionary> for DictionaryFile {
    fn from(dictionary: &Dictionary) -> Self {
        let objects = dictionary
            .objects
            .iter()
            .map(|(object, properties)| {
                let entry = ObjectEntry {
                    properties: properties.values().cloned().collect(),
                };
                (object.clone(), entry)
            })
            .collect();
        Self { objects }
    }
}
