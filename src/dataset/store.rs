use bincode::Options;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

use crate::core::node::Node;
use crate::core::profile::{Component, Profile};
use crate::core::signature::Signature;
use crate::core::types::ProfileId;
use crate::dataset::builder::{DataSetBuilder, DataSetSource};

#[derive(Error, Debug)]
pub enum DataSetError {
    #[error("Failed to read data set: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse data set source: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to decode compiled data set: {0}")]
    Binary(#[from] bincode::Error),

    #[error("Invalid data set: {0}")]
    Invalid(String),

    #[error("{kind} {index} not found in data set")]
    EntityNotFound { kind: &'static str, index: i64 },
}

/// Data set format version for compatibility checking
pub const DATASET_VERSION: &str = "1.0.0";

/// Prefix identifying a compiled data set file
pub const BINARY_MAGIC: &[u8; 8] = b"UASIG\x00\x01\x00";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on the decoded size of a compiled data set
const MAX_BINARY_SIZE: u64 = 1 << 30;

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_BINARY_SIZE)
}

/// The compiled, read-only tables the matching engine runs against.
///
/// All tables are immutable after construction, so a `DataSet` can be shared
/// between threads and matched against concurrently. Derived lookups are
/// computed on first use and cached.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataSet {
    pub version: String,
    pub name: String,
    pub published: DateTime<Utc>,

    /// Targets shorter than this are not evaluated
    pub min_user_agent_length: usize,

    /// Maximum number of candidate signatures scored per match
    pub max_signatures: usize,

    pub components: Vec<Component>,

    /// All profiles, sorted by id
    pub profiles: Vec<Profile>,

    /// All nodes, ordered by position
    pub nodes: Vec<Node>,

    /// Index: character position -> offset of the root node for that position
    pub root_nodes: Vec<i32>,

    /// All signatures, ordered by node offsets
    pub signatures: Vec<Signature>,

    /// Index: rank -> signature index
    pub ranked_signature_indexes: Vec<i32>,

    #[serde(skip)]
    disposed: AtomicBool,

    /// Index: component -> position of its default profile in `profiles`
    #[serde(skip)]
    default_profiles: OnceLock<Result<Vec<usize>, ProfileId>>,

    /// Every header any component is matched from, in first-seen order
    #[serde(skip)]
    http_headers: OnceLock<Vec<String>>,
}

impl DataSet {
    /// Assemble a data set from compiled tables
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_tables(
        version: String,
        name: String,
        published: DateTime<Utc>,
        min_user_agent_length: usize,
        max_signatures: usize,
        components: Vec<Component>,
        profiles: Vec<Profile>,
        nodes: Vec<Node>,
        root_nodes: Vec<i32>,
        signatures: Vec<Signature>,
        ranked_signature_indexes: Vec<i32>,
    ) -> Self {
        Self {
            version,
            name,
            published,
            min_user_agent_length,
            max_signatures,
            components,
            profiles,
            nodes,
            root_nodes,
            signatures,
            ranked_signature_indexes,
            disposed: AtomicBool::new(false),
            default_profiles: OnceLock::new(),
            http_headers: OnceLock::new(),
        }
    }

    /// Load the embedded demonstration data set
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded source fails to compile.
    pub fn load_embedded() -> Result<Self, DataSetError> {
        // Validated at compile time via build.rs
        const EMBEDDED_DATASET: &str = include_str!("../../data/signatures.json");
        Self::from_json(EMBEDDED_DATASET)
    }

    /// Load a data set from a file.
    ///
    /// The format is detected from the content: compiled data sets start with
    /// [`BINARY_MAGIC`], gzip-compressed and plain files are read as JSON source.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Io` if the file cannot be read, or a parse, decode or
    /// validation error for malformed content.
    pub fn load_from_file(path: &Path) -> Result<Self, DataSetError> {
        let content = std::fs::read(path)?;

        if content.starts_with(BINARY_MAGIC) {
            return Self::read_binary(content.as_slice());
        }

        let json = if content.starts_with(&GZIP_MAGIC) {
            let mut decoded = String::new();
            GzDecoder::new(content.as_slice()).read_to_string(&mut decoded)?;
            decoded
        } else {
            String::from_utf8(content)
                .map_err(|e| DataSetError::Invalid(format!("source is not UTF-8: {e}")))?
        };

        Self::from_json(&json)
    }

    /// Parse and compile a data set from its JSON source
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Parse` for malformed JSON or `DataSetError::Invalid`
    /// if the source violates data set invariants.
    pub fn from_json(json: &str) -> Result<Self, DataSetError> {
        let source: DataSetSource = serde_json::from_str(json)?;
        Self::build(source)
    }

    /// Compile a data set from an already parsed source
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Invalid` if the source violates data set invariants.
    pub fn build(source: DataSetSource) -> Result<Self, DataSetError> {
        // Version check (warn but don't fail)
        if source.version != DATASET_VERSION {
            warn!(
                expected = DATASET_VERSION,
                found = %source.version,
                "Data set version mismatch"
            );
        }
        DataSetBuilder::new(source).build()
    }

    /// Write the compiled tables in the binary format
    ///
    /// # Errors
    ///
    /// Returns an error if writing or encoding fails.
    pub fn write_binary<W: Write>(&self, mut writer: W) -> Result<(), DataSetError> {
        writer.write_all(BINARY_MAGIC)?;
        binary_options().serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read compiled tables written by [`DataSet::write_binary`]
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Invalid` if the magic prefix is missing or the tables
    /// are inconsistent, or `DataSetError::Binary` if decoding fails.
    pub fn read_binary<R: Read>(mut reader: R) -> Result<Self, DataSetError> {
        let mut magic = [0u8; BINARY_MAGIC.len()];
        reader.read_exact(&mut magic)?;
        if &magic != BINARY_MAGIC {
            return Err(DataSetError::Invalid(
                "missing compiled data set header".to_string(),
            ));
        }
        let dataset: Self = binary_options().deserialize_from(reader)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Check the referential integrity of the compiled tables.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Invalid` describing the first violation found.
    pub fn validate(&self) -> Result<(), DataSetError> {
        let invalid = |msg: String| Err(DataSetError::Invalid(msg));

        for (i, node) in self.nodes.iter().enumerate() {
            if usize::try_from(node.index).ok() != Some(i) {
                return invalid(format!("node {i} carries index {}", node.index));
            }
            for offset in node
                .children
                .iter()
                .map(|c| c.node_offset)
                .chain(node.numeric_children.iter().map(|c| c.node_offset))
            {
                if self.node(offset).is_err() {
                    return invalid(format!("node {i} links to missing node {offset}"));
                }
            }
        }

        for (position, &offset) in self.root_nodes.iter().enumerate() {
            if self.node(offset).is_err() {
                return invalid(format!("root node for position {position} is missing"));
            }
        }

        for (i, pair) in self.signatures.windows(2).enumerate() {
            if pair[0].node_offsets >= pair[1].node_offsets {
                return invalid(format!("signatures {i} and {} are out of order", i + 1));
            }
        }

        let mut seen = vec![false; self.signatures.len()];
        for (rank, &index) in self.ranked_signature_indexes.iter().enumerate() {
            match usize::try_from(index).ok().and_then(|i| seen.get_mut(i)) {
                Some(slot) if !*slot => *slot = true,
                _ => return invalid(format!("rank {rank} maps to invalid signature {index}")),
            }
        }
        if seen.iter().any(|s| !s) {
            return invalid("ranked signature table is not a permutation".to_string());
        }

        if self.profiles.windows(2).any(|p| p[0].id >= p[1].id) {
            return invalid("profiles are not sorted by id".to_string());
        }

        self.default_profile_indexes()?;
        Ok(())
    }

    /// Get a node by offset
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if the offset is out of range.
    pub fn node(&self, offset: i32) -> Result<&Node, DataSetError> {
        usize::try_from(offset)
            .ok()
            .and_then(|i| self.nodes.get(i))
            .ok_or(DataSetError::EntityNotFound {
                kind: "node",
                index: i64::from(offset),
            })
    }

    /// Get the root node for a character position
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if there is no root for the position
    /// or it references a missing node.
    pub fn root_node(&self, position: i32) -> Result<&Node, DataSetError> {
        let offset = usize::try_from(position)
            .ok()
            .and_then(|i| self.root_nodes.get(i))
            .ok_or(DataSetError::EntityNotFound {
                kind: "root node",
                index: i64::from(position),
            })?;
        self.node(*offset)
    }

    /// Number of character positions with a root node
    #[must_use]
    pub fn root_node_count(&self) -> usize {
        self.root_nodes.len()
    }

    /// Get a signature by index
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if the index is out of range.
    pub fn signature(&self, index: i32) -> Result<&Signature, DataSetError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.signatures.get(i))
            .ok_or(DataSetError::EntityNotFound {
                kind: "signature",
                index: i64::from(index),
            })
    }

    /// Get the signature with the given popularity rank
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if the rank or the signature it maps
    /// to does not exist.
    pub fn ranked_signature(&self, rank: i32) -> Result<&Signature, DataSetError> {
        let index = usize::try_from(rank)
            .ok()
            .and_then(|i| self.ranked_signature_indexes.get(i))
            .ok_or(DataSetError::EntityNotFound {
                kind: "ranked signature",
                index: i64::from(rank),
            })?;
        self.signature(*index)
    }

    /// Binary search for the signature whose node offsets equal the node list.
    ///
    /// Every signature inspected is counted in `signatures_read`.
    pub fn find_signature_index(
        &self,
        nodes: &[&Node],
        signatures_read: &mut u32,
    ) -> Option<usize> {
        self.signatures
            .binary_search_by(|signature| {
                *signatures_read += 1;
                signature.compare_to_nodes(nodes)
            })
            .ok()
    }

    /// Get a profile by id
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if no profile has the id.
    pub fn profile(&self, id: ProfileId) -> Result<&Profile, DataSetError> {
        self.profiles
            .binary_search_by_key(&id, |p| p.id)
            .map(|i| &self.profiles[i])
            .map_err(|_| DataSetError::EntityNotFound {
                kind: "profile",
                index: i64::from(id.0),
            })
    }

    fn default_profile_indexes(&self) -> Result<&[usize], DataSetError> {
        let cached = self.default_profiles.get_or_init(|| {
            self.components
                .iter()
                .map(|component| {
                    self.profiles
                        .binary_search_by_key(&component.default_profile, |p| p.id)
                        .map_err(|_| component.default_profile)
                })
                .collect()
        });
        cached
            .as_deref()
            .map_err(|id| DataSetError::EntityNotFound {
                kind: "default profile",
                index: i64::from(id.0),
            })
    }

    /// The default profile of every component, in component order
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a component's default profile is
    /// missing.
    pub fn default_profiles(&self) -> Result<Vec<&Profile>, DataSetError> {
        Ok(self
            .default_profile_indexes()?
            .iter()
            .map(|&i| &self.profiles[i])
            .collect())
    }

    /// Resolve the profile a signature provides for every component, falling back
    /// to the component default when the signature has none.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a referenced profile is missing.
    pub fn signature_profiles(&self, signature: &Signature) -> Result<Vec<&Profile>, DataSetError> {
        let mut profiles = self.default_profiles()?;
        for &id in &signature.profile_ids {
            let profile = self.profile(id)?;
            if let Some(slot) = profiles.get_mut(profile.component) {
                *slot = profile;
            }
        }
        Ok(profiles)
    }

    /// Every HTTP header the data set can match, in first-seen order
    pub fn http_headers(&self) -> &[String] {
        self.http_headers.get_or_init(|| {
            let mut headers: Vec<String> = Vec::new();
            for header in self.components.iter().flat_map(|c| &c.http_headers) {
                if !headers.iter().any(|h| h.eq_ignore_ascii_case(header)) {
                    headers.push(header.clone());
                }
            }
            headers
        })
    }

    /// Index of a component by name, ignoring case
    #[must_use]
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Mark the data set as closed; every later match fails fast.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Export the source-level view of the data set to JSON
    ///
    /// # Errors
    ///
    /// Returns an error if a node offset does not resolve or serialization fails.
    pub fn to_json(&self) -> Result<String, DataSetError> {
        let source = DataSetSource::from_dataset(self)?;
        Ok(serde_json::to_string_pretty(&source)?)
    }

    /// Number of signatures in the data set
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Check if the data set has no signatures
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
