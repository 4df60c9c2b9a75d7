//! The document file format.
//!
//! A document file holds the metadata identifying the document, its extracted
//! RASE structure and its tables, in YAML or JSON:
//!
//! ```yaml
//! metadata:
//!   jurisdiction: GB
//!   type: Regulation
//!   title: Approved Document B
//!   version: "2019"
//!   start_section: 1
//! items:
//!   - container:
//!       id: s1
//!       kind: requirement
//!       reference: /b/1
//!       children:
//!         - tag: { id: t1, kind: application, property: Door, value: true }
//! tables:
//!   - rows:
//!       - cells:
//!           - title: []
//!           - data: []
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{optional_scalar, scalar};
use crate::domain::{
    document::Document,
    node::{Container, EmptyIdError, InvalidKindError, Kind, Node, NodeId, Tag},
};

/// The syntax of a document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// JSON (`.json`).
    Json,
}

impl Format {
    /// The format implied by a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Errors that can occur when loading a document file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read document '{path}'")]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file extension is not a known document format.
    #[error("unsupported document format '{0}': expected .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),
    /// The file content is not a valid document.
    #[error("failed to parse document '{path}'")]
    Parse {
        /// The document path.
        path: PathBuf,
        /// The underlying error.
        source: ParseError,
    },
}

/// Errors that can occur when parsing document text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The YAML is malformed.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    /// The JSON is malformed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A node id is empty.
    #[error(transparent)]
    EmptyId(#[from] EmptyIdError),
    /// A kind is not a RASE role.
    #[error(transparent)]
    Kind(#[from] InvalidKindError),
    /// A node entry is neither (or both) a tag and a container.
    #[error("node entry must hold exactly one of 'tag' or 'container'")]
    NodeShape,
    /// A table cell is neither (or both) a title and a data cell.
    #[error("table cell must hold exactly one of 'title' or 'data'")]
    CellShape,
}

/// Loads a document file, choosing the syntax from the extension.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed.
#[instrument]
pub fn load(path: &Path) -> Result<Document, LoadError> {
    let format =
        Format::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, format).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses document text.
///
/// # Errors
///
/// Returns [`ParseError`] if the text is not a valid document.
pub fn parse(content: &str, format: Format) -> Result<Document, ParseError> {
    let file: DocumentFile = match format {
        Format::Yaml => serde_yaml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    file.try_into()
}

#[derive(Debug, Deserialize)]
struct DocumentFile {
    metadata: Metadata,
    #[serde(default)]
    items: Vec<NodeEntry>,
    #[serde(default)]
    tables: Vec<TableEntry>,
}

/// The identity of a document.
#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(deserialize_with = "scalar")]
    jurisdiction: String,
    #[serde(rename = "type", deserialize_with = "scalar")]
    document_type: String,
    #[serde(deserialize_with = "scalar")]
    title: String,
    #[serde(deserialize_with = "scalar")]
    version: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    start_section: Option<String>,
}

impl Metadata {
    fn base(&self) -> String {
        let mut parts = vec![
            self.jurisdiction.as_str(),
            self.document_type.as_str(),
            self.title.as_str(),
            self.version.as_str(),
        ];
        parts.extend(self.start_section.as_deref());
        parts.join("/")
    }
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    #[serde(default)]
    tag: Option<TagEntry>,
    #[serde(default)]
    container: Option<ContainerEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    id: String,
    kind: String,
    property: String,
    #[serde(default)]
    comparator: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    value: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    unit: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerEntry {
    id: String,
    kind: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    children: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    #[serde(default)]
    rows: Vec<RowEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    #[serde(default)]
    cells: Vec<CellEntry>,
}

#[derive(Debug, Deserialize)]
struct CellEntry {
    #[serde(default)]
    title: Option<Vec<NodeEntry>>,
    #[serde(default)]
    data: Option<Vec<NodeEntry>>,
}

/// A table cell with its RASE structure.
#[derive(Debug)]
enum Cell {
    Title(Vec<NodeEntry>),
    Data(Vec<NodeEntry>),
}

impl TryFrom<CellEntry> for Cell {
    type Error = ParseError;

    fn try_from(entry: CellEntry) -> Result<Self, Self::Error> {
        match (entry.title, entry.data) {
            (Some(nodes), None) => Ok(Self::Title(nodes)),
            (None, Some(nodes)) => Ok(Self::Data(nodes)),
            _ => Err(ParseError::CellShape),
        }
    }
}

impl Cell {
    const fn is_title(&self) -> bool {
        matches!(self, Self::Title(_))
    }

    fn nodes(&self) -> &[NodeEntry] {
        match self {
            Self::Title(nodes) | Self::Data(nodes) => nodes,
        }
    }
}

impl TryFrom<DocumentFile> for Document {
    type Error = ParseError;

    fn try_from(file: DocumentFile) -> Result<Self, Self::Error> {
        let base = file.metadata.base();
        let items = file
            .items
            .iter()
            .map(|entry| entry.to_node(""))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = Vec::new();
        for (index, table) in file.tables.into_iter().enumerate() {
            let rows = table
                .rows
                .into_iter()
                .map(|row| row.cells.into_iter().map(Cell::try_from).collect())
                .collect::<Result<Vec<Vec<Cell>>, _>>()?;
            tables.extend(expand_table(&base, index + 1, &rows)?);
        }

        debug!(base = %base, items = items.len(), tables = tables.len(), "parsed document");
        Ok(Self::new(base, items, tables))
    }
}

/// Builds one requirement section per data cell.
///
/// The section `Table<n>_R<row>_C_<column>` holds the structure of every title
/// cell in its row, then every title cell in its column, then its own. Rows and
/// columns count from zero. Sections without any structure are skipped.
fn expand_table(
    base: &str,
    number: usize,
    rows: &[Vec<Cell>],
) -> Result<Vec<Container>, ParseError> {
    let reference = format!("{base}/Table/{number}");
    let mut sections = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            if cell.is_title() {
                continue;
            }
            let row_titles = row.iter().filter(|cell| cell.is_title());
            let column_titles = rows
                .iter()
                .filter_map(|row| row.get(j))
                .filter(|cell| cell.is_title());

            let children = row_titles
                .chain(column_titles)
                .chain(std::iter::once(cell))
                .flat_map(Cell::nodes)
                .map(|entry| entry.to_node(&reference))
                .collect::<Result<Vec<_>, _>>()?;
            if children.is_empty() {
                continue;
            }

            let id = NodeId::new(format!("Table{number}_R{i}_C_{j}"))?;
            sections.push(
                Container::new(id, Kind::Requirement)
                    .with_reference(reference.as_str())
                    .with_children(children),
            );
        }
    }
    Ok(sections)
}

impl NodeEntry {
    /// Converts the entry; `reference` is inherited when the entry has none.
    fn to_node(&self, reference: &str) -> Result<Node, ParseError> {
        match (&self.tag, &self.container) {
            (Some(tag), None) => tag.to_tag(reference).map(Node::from),
            (None, Some(container)) => container.to_container(reference).map(Node::from),
            _ => Err(ParseError::NodeShape),
        }
    }
}

impl TagEntry {
    fn to_tag(&self, reference: &str) -> Result<Tag, ParseError> {
        let mut tag = Tag::new(
            NodeId::from_str(&self.id)?,
            Kind::from_str(&self.kind)?,
            self.property.as_str(),
        )
        .with_value(self.value.as_deref().unwrap_or_default())
        .with_reference(self.reference.as_deref().unwrap_or(reference));
        if let Some(comparator) = &self.comparator {
            tag = tag.with_comparator(comparator.as_str());
        }
        if let Some(unit) = &self.unit {
            tag = tag.with_unit(unit.as_str());
        }
        Ok(tag)
    }
}

impl ContainerEntry {
    fn to_container(&self, reference: &str) -> Result<Container, ParseError> {
        let reference = self.reference.as_deref().unwrap_or(reference);
        let children = self
            .children
            .iter()
            .map(|child| child.to_node(reference))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(
            Container::new(NodeId::from_str(&self.id)?, Kind::from_str(&self.kind)?)
                .with_reference(reference)
                .with_children(children),
        )
    }
}
