//! Compiles a human-editable data set source into the matching tables.
//!
//! The source lists every signature as a set of `[position, characters]` nodes,
//! where `position` is the index of the node's first character. The builder
//! validates the source, builds one right-to-left character trie per position,
//! links digit runs as numeric children, and assigns node offsets in position
//! order so that signature node lists are ascending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::node::{is_numeric, parse_number, Node, NodeChild, NumericChild};
use crate::core::profile::{Component, Profile, USER_AGENT_HEADER};
use crate::core::signature::Signature;
use crate::core::types::{to_position, ProfileId};
use crate::dataset::store::{DataSet, DataSetError};

fn default_min_user_agent_length() -> usize {
    1
}

fn default_max_signatures() -> usize {
    100
}

fn default_http_headers() -> Vec<String> {
    vec![USER_AGENT_HEADER.to_string()]
}

/// JSON source of a data set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetSource {
    pub version: String,
    pub name: String,
    pub published: DateTime<Utc>,

    #[serde(default = "default_min_user_agent_length")]
    pub min_user_agent_length: usize,

    #[serde(default = "default_max_signatures")]
    pub max_signatures: usize,

    pub components: Vec<ComponentSource>,
    pub profiles: Vec<ProfileSource>,

    /// Signatures, most popular first
    pub signatures: Vec<SignatureSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSource {
    pub name: String,
    pub default_profile: u32,

    #[serde(default = "default_http_headers")]
    pub http_headers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSource {
    pub id: u32,

    /// Name of the owning component
    pub component: String,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSource {
    pub profiles: Vec<u32>,

    /// `(first character index, characters)` pairs in position order
    pub nodes: Vec<(usize, String)>,
}

impl DataSetSource {
    /// Rebuild the source view of a compiled data set, signatures in rank order.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if an offset does not resolve.
    pub fn from_dataset(dataset: &DataSet) -> Result<Self, DataSetError> {
        let components = dataset
            .components
            .iter()
            .map(|c| ComponentSource {
                name: c.name.clone(),
                default_profile: c.default_profile.0,
                http_headers: c.http_headers.clone(),
            })
            .collect();

        let profiles = dataset
            .profiles
            .iter()
            .map(|p| ProfileSource {
                id: p.id.0,
                component: dataset
                    .components
                    .get(p.component)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                properties: p.properties.clone(),
            })
            .collect();

        let mut signatures = Vec::with_capacity(dataset.len());
        for rank in 0..dataset.ranked_signature_indexes.len() {
            let signature = dataset.ranked_signature(to_position(rank))?;
            let mut nodes = Vec::with_capacity(signature.node_offsets.len());
            for &offset in &signature.node_offsets {
                let node = dataset.node(offset)?;
                let first = usize::try_from(node.first_character_position()).map_err(|_| {
                    DataSetError::Invalid(format!("node {offset} starts before the string"))
                })?;
                nodes.push((first, String::from_utf8_lossy(&node.characters).into_owned()));
            }
            signatures.push(SignatureSource {
                profiles: signature.profile_ids.iter().map(|id| id.0).collect(),
                nodes,
            });
        }

        Ok(Self {
            version: dataset.version.clone(),
            name: dataset.name.clone(),
            published: dataset.published,
            min_user_agent_length: dataset.min_user_agent_length,
            max_signatures: dataset.max_signatures,
            components,
            profiles,
            signatures,
        })
    }
}

/// Trie node under construction, before offsets are assigned
#[derive(Debug)]
struct PendingNode {
    position: i32,
    root_position: i32,
    characters: Vec<u8>,
    children: BTreeMap<u8, usize>,
    numeric_children: BTreeMap<u32, usize>,
    ranks: BTreeSet<i32>,
}

/// Builder for compiling a [`DataSetSource`] into a [`DataSet`]
#[derive(Debug)]
pub struct DataSetBuilder {
    source: DataSetSource,
    arena: Vec<PendingNode>,
    lookup: HashMap<(i32, Vec<u8>), usize>,
}

impl DataSetBuilder {
    #[must_use]
    pub fn new(source: DataSetSource) -> Self {
        Self {
            source,
            arena: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Validate the source and compile it.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::Invalid` if components, profiles or signatures are
    /// inconsistent, nodes overlap, or two signatures share the same node set.
    pub fn build(mut self) -> Result<DataSet, DataSetError> {
        if self.source.max_signatures == 0 {
            return invalid("max_signatures must be at least 1");
        }
        if self.source.signatures.is_empty() {
            return invalid("data set has no signatures");
        }

        let components = self.components()?;
        let profiles = self.profiles(&components)?;
        self.check_defaults(&components, &profiles)?;

        let max_end = self.check_signatures(&profiles)?;
        for position in 0..=max_end {
            self.intern(position, &[]);
        }

        let signature_nodes = self.insert_signatures();
        let (nodes, remap) = self.finish_nodes();
        let root_nodes = (0..=max_end)
            .map(|position| self.lookup[&(position, Vec::new())])
            .map(|pending| to_position(remap[pending]))
            .collect();

        let mut ranked: Vec<(usize, Signature)> = Vec::with_capacity(signature_nodes.len());
        let sources = signature_nodes.iter().zip(&self.source.signatures);
        for (rank, (pending, source)) in sources.enumerate() {
            let node_offsets: Vec<i32> = pending.iter().map(|&p| to_position(remap[p])).collect();
            let length = pending
                .last()
                .map_or(0, |&last| nodes[remap[last]].root_position + 1);
            ranked.push((
                rank,
                Signature {
                    index: 0,
                    rank: to_position(rank),
                    node_offsets,
                    profile_ids: source.profiles.iter().copied().map(ProfileId).collect(),
                    length,
                },
            ));
        }

        ranked.sort_by(|(_, a), (_, b)| a.node_offsets.cmp(&b.node_offsets));
        if let Some(pair) = ranked
            .windows(2)
            .find(|pair| pair[0].1.node_offsets == pair[1].1.node_offsets)
        {
            return invalid(&format!(
                "signatures {} and {} have the same nodes",
                pair[0].0, pair[1].0
            ));
        }

        let mut ranked_signature_indexes = vec![0; ranked.len()];
        let mut signatures = Vec::with_capacity(ranked.len());
        for (index, (rank, mut signature)) in ranked.into_iter().enumerate() {
            signature.index = to_position(index);
            ranked_signature_indexes[rank] = signature.index;
            signatures.push(signature);
        }

        let dataset = DataSet::from_tables(
            self.source.version,
            self.source.name,
            self.source.published,
            self.source.min_user_agent_length,
            self.source.max_signatures,
            components,
            profiles,
            nodes,
            root_nodes,
            signatures,
            ranked_signature_indexes,
        );
        dataset.validate()?;
        Ok(dataset)
    }

    fn components(&self) -> Result<Vec<Component>, DataSetError> {
        if self.source.components.is_empty() {
            return invalid("data set has no components");
        }
        let mut names = HashSet::new();
        let mut components = Vec::with_capacity(self.source.components.len());
        for source in &self.source.components {
            if !names.insert(source.name.to_ascii_lowercase()) {
                return invalid(&format!("duplicate component '{}'", source.name));
            }
            if source.http_headers.is_empty() {
                return invalid(&format!("component '{}' has no HTTP headers", source.name));
            }
            components.push(Component {
                name: source.name.clone(),
                default_profile: ProfileId(source.default_profile),
                http_headers: source.http_headers.clone(),
            });
        }
        Ok(components)
    }

    fn profiles(&self, components: &[Component]) -> Result<Vec<Profile>, DataSetError> {
        let mut profiles = Vec::with_capacity(self.source.profiles.len());
        for source in &self.source.profiles {
            let Some(component) = components
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(&source.component))
            else {
                return invalid(&format!(
                    "profile {} references unknown component '{}'",
                    source.id, source.component
                ));
            };
            profiles.push(Profile {
                id: ProfileId(source.id),
                component,
                properties: source.properties.clone(),
            });
        }
        profiles.sort_by_key(|p| p.id);
        if let Some(pair) = profiles.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return invalid(&format!("duplicate profile {}", pair[0].id));
        }
        Ok(profiles)
    }

    fn check_defaults(
        &self,
        components: &[Component],
        profiles: &[Profile],
    ) -> Result<(), DataSetError> {
        for (index, component) in components.iter().enumerate() {
            match find_profile(profiles, component.default_profile) {
                Some(profile) if profile.component == index => {}
                Some(_) => {
                    return invalid(&format!(
                        "default profile {} of '{}' belongs to another component",
                        component.default_profile, component.name
                    ))
                }
                None => {
                    return invalid(&format!(
                        "default profile {} of '{}' does not exist",
                        component.default_profile, component.name
                    ))
                }
            }
        }
        Ok(())
    }

    /// Check every signature and return the largest last-character index.
    fn check_signatures(&self, profiles: &[Profile]) -> Result<i32, DataSetError> {
        let mut max_end = 0;
        for (rank, signature) in self.source.signatures.iter().enumerate() {
            if signature.nodes.is_empty() {
                return invalid(&format!("signature {rank} has no nodes"));
            }

            let mut next_free = 0;
            for (first, characters) in &signature.nodes {
                if characters.is_empty() {
                    return invalid(&format!("signature {rank} has an empty node"));
                }
                if *first < next_free {
                    return invalid(&format!(
                        "signature {rank}: node '{characters}' at {first} overlaps or is out of order"
                    ));
                }
                next_free = first + characters.len();
                let end = i32::try_from(next_free - 1).map_err(|_| {
                    DataSetError::Invalid(format!("signature {rank} is too long"))
                })?;
                max_end = max_end.max(end);
            }

            let mut seen = HashSet::new();
            for &id in &signature.profiles {
                let Some(profile) = find_profile(profiles, ProfileId(id)) else {
                    return invalid(&format!("signature {rank} references unknown profile {id}"));
                };
                if !seen.insert(profile.component) {
                    return invalid(&format!(
                        "signature {rank} has more than one profile for a component"
                    ));
                }
            }
        }
        Ok(max_end)
    }

    /// Find or create the trie node for a suffix ending at `root_position`.
    fn intern(&mut self, root_position: i32, characters: &[u8]) -> usize {
        let key = (root_position, characters.to_vec());
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.arena.len();
        self.arena.push(PendingNode {
            position: root_position - to_position(characters.len()),
            root_position,
            characters: characters.to_vec(),
            children: BTreeMap::new(),
            numeric_children: BTreeMap::new(),
            ranks: BTreeSet::new(),
        });
        self.lookup.insert(key, index);
        index
    }

    /// Thread every signature node through the trie of its last character.
    ///
    /// Returns the pending node index of each signature node, per rank.
    fn insert_signatures(&mut self) -> Vec<Vec<usize>> {
        let sources = std::mem::take(&mut self.source.signatures);
        let mut result = Vec::with_capacity(sources.len());

        for (rank, signature) in sources.iter().enumerate() {
            let mut pending = Vec::with_capacity(signature.nodes.len());
            for (first, characters) in &signature.nodes {
                let bytes = characters.as_bytes();
                let root_position = to_position(first + bytes.len() - 1);
                let mut current = self.intern(root_position, &[]);

                for k in (0..bytes.len()).rev() {
                    // A digit run starts here when reading right to left
                    if is_numeric(bytes[k]) && (k + 1 == bytes.len() || !is_numeric(bytes[k + 1])) {
                        let start = bytes[..k]
                            .iter()
                            .rposition(|&b| !is_numeric(b))
                            .map_or(0, |i| i + 1);
                        let target = self.intern(root_position, &bytes[start..]);
                        self.arena[current]
                            .numeric_children
                            .entry(parse_number(&bytes[start..=k]))
                            .or_insert(target);
                    }
                    let child = self.intern(root_position, &bytes[k..]);
                    self.arena[current].children.insert(bytes[k], child);
                    current = child;
                }

                self.arena[current].ranks.insert(to_position(rank));
                pending.push(current);
            }
            result.push(pending);
        }

        self.source.signatures = sources;
        result
    }

    /// Assign offsets in position order and materialise the node table.
    ///
    /// Returns the nodes and the pending index -> offset map.
    fn finish_nodes(&self) -> (Vec<Node>, Vec<usize>) {
        let mut order: Vec<usize> = (0..self.arena.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.arena[a], &self.arena[b]);
            (a.position, a.root_position, &a.characters).cmp(&(
                b.position,
                b.root_position,
                &b.characters,
            ))
        });

        let mut remap = vec![0; self.arena.len()];
        for (offset, &pending) in order.iter().enumerate() {
            remap[pending] = offset;
        }

        let nodes = order
            .iter()
            .enumerate()
            .map(|(offset, &pending)| {
                let source = &self.arena[pending];
                let complete = !source.ranks.is_empty();
                Node {
                    index: to_position(offset),
                    position: source.position,
                    root_position: source.root_position,
                    characters: source.characters.clone(),
                    children: source
                        .children
                        .iter()
                        .map(|(&character, &child)| NodeChild {
                            character,
                            node_offset: to_position(remap[child]),
                        })
                        .collect(),
                    numeric_children: source
                        .numeric_children
                        .iter()
                        .map(|(&value, &child)| NumericChild {
                            value,
                            node_offset: to_position(remap[child]),
                        })
                        .collect(),
                    ranked_signature_indexes: source.ranks.iter().copied().collect(),
                    next_character_position: if complete { source.position } else { -1 },
                }
            })
            .collect();

        (nodes, remap)
    }
}

fn find_profile(profiles: &[Profile], id: ProfileId) -> Option<&Profile> {
    profiles
        .binary_search_by_key(&id, |p| p.id)
        .ok()
        .map(|i| &profiles[i])
}

fn invalid<T>(message: &str) -> Result<T, DataSetError> {
    Err(DataSetError::Invalid(message.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two-signature data set used across the crate's unit tests
    pub(crate) fn toy_source() -> DataSetSource {
        serde_json::from_str(
            r#"{
                "version": "1.0.0",
                "name": "toy",
                "published": "2026-01-15T00:00:00Z",
                "min_user_agent_length": 3,
                "max_signatures": 100,
                "components": [
                    {"name": "Hardware", "default_profile": 1},
                    {"name": "Software", "default_profile": 2}
                ],
                "profiles": [
                    {"id": 1, "component": "Hardware", "properties": {"DeviceType": "Unknown"}},
                    {"id": 2, "component": "Software", "properties": {"PlatformName": "Unknown"}},
                    {"id": 11, "component": "Hardware", "properties": {"DeviceType": "Desktop"}},
                    {"id": 12, "component": "Hardware", "properties": {"DeviceType": "Mobile"}},
                    {"id": 21, "component": "Software", "properties": {"PlatformName": "Foo"}},
                    {"id": 22, "component": "Software", "properties": {"PlatformName": "Bar"}}
                ],
                "signatures": [
                    {"profiles": [11, 21], "nodes": [[0, "Foo/"], [4, "12"], [6, ".3"]]},
                    {"profiles": [12, 22], "nodes": [[0, "Bar/"], [4, "7"]]}
                ]
            }"#,
        )
        .unwrap()
    }

    pub(crate) fn toy_dataset() -> DataSet {
        DataSet::build(toy_source()).unwrap()
    }

    #[test]
    fn test_build_toy_tables() {
        let dataset = toy_dataset();
        assert_eq!(dataset.root_node_count(), 8);
        assert_eq!(dataset.len(), 2);

        for (i, node) in dataset.nodes.iter().enumerate() {
            assert_eq!(node.index as usize, i);
            assert_eq!(
                node.root_position - node.position,
                i32::try_from(node.len()).unwrap()
            );
        }
        assert!(dataset
            .nodes
            .windows(2)
            .all(|pair| pair[0].position <= pair[1].position));
    }

    #[test]
    fn test_signatures_sorted_and_ranked() {
        let dataset = toy_dataset();
        let s0 = dataset.ranked_signature(0).unwrap();
        assert_eq!(s0.length, 8);
        assert_eq!(s0.node_offsets.len(), 3);
        assert!(s0.node_offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(s0.render(&dataset).unwrap(), "Foo/12.3");

        let s1 = dataset.ranked_signature(1).unwrap();
        assert_eq!(s1.render(&dataset).unwrap(), "Bar/7");
        assert!(dataset.signatures[0].node_offsets < dataset.signatures[1].node_offsets);
    }

    #[test]
    fn test_complete_nodes_carry_ranks() {
        let dataset = toy_dataset();
        let complete: Vec<(&[u8], &[i32])> = dataset
            .nodes
            .iter()
            .filter(|n| n.is_complete())
            .map(|n| (n.characters.as_slice(), n.ranked_signature_indexes.as_slice()))
            .collect();
        assert_eq!(complete.len(), 5);
        assert!(complete.contains(&(&b"Foo/"[..], &[0][..])));
        assert!(complete.contains(&(&b"7"[..], &[1][..])));
        for node in dataset.nodes.iter().filter(|n| !n.is_complete()) {
            assert!(node.next_character_position < 0);
        }
    }

    #[test]
    fn test_numeric_children_linked() {
        let dataset = toy_dataset();
        let root = dataset.root_node(5).unwrap();
        assert_eq!(root.numeric_children.len(), 1);
        assert_eq!(root.numeric_children[0].value, 12);
        let twelve = dataset.node(root.numeric_children[0].node_offset).unwrap();
        assert_eq!(twelve.characters, b"12");

        let root = dataset.root_node(7).unwrap();
        assert_eq!(root.numeric_children[0].value, 3);
    }

    #[test]
    fn test_shared_nodes_are_merged() {
        let mut source = toy_source();
        source.signatures.push(SignatureSource {
            profiles: vec![12],
            nodes: vec![(0, "Foo/".to_string()), (4, "7".to_string())],
        });
        let dataset = DataSet::build(source).unwrap();
        let foo: Vec<&Node> = dataset
            .nodes
            .iter()
            .filter(|n| n.characters == b"Foo/")
            .collect();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].ranked_signature_indexes, vec![0, 2]);
    }

    #[test]
    fn test_rejects_duplicate_signature() {
        let mut source = toy_source();
        let copy = source.signatures[0].clone();
        source.signatures.push(copy);
        assert!(matches!(
            DataSet::build(source),
            Err(DataSetError::Invalid(msg)) if msg.contains("same nodes")
        ));
    }

    #[test]
    fn test_rejects_overlapping_nodes() {
        let mut source = toy_source();
        source.signatures[1].nodes = vec![(0, "Bar/".to_string()), (3, "/7".to_string())];
        assert!(matches!(DataSet::build(source), Err(DataSetError::Invalid(_))));
    }

    #[test]
    fn test_rejects_unknown_profile_and_component() {
        let mut source = toy_source();
        source.signatures[0].profiles.push(99);
        assert!(DataSet::build(source).is_err());

        let mut source = toy_source();
        source.profiles[0].component = "Nope".to_string();
        assert!(DataSet::build(source).is_err());

        let mut source = toy_source();
        source.signatures[0].profiles = vec![11, 12];
        assert!(DataSet::build(source).is_err());
    }

    #[test]
    fn test_rejects_bad_default_profile() {
        let mut source = toy_source();
        source.components[0].default_profile = 2;
        assert!(matches!(
            DataSet::build(source),
            Err(DataSetError::Invalid(msg)) if msg.contains("another component")
        ));
    }

    #[test]
    fn test_default_headers() {
        let dataset = toy_dataset();
        assert_eq!(dataset.components[0].http_headers, vec![USER_AGENT_HEADER]);
    }

    #[test]
    fn test_source_round_trip() {
        let dataset = toy_dataset();
        let source = DataSetSource::from_dataset(&dataset).unwrap();
        assert_eq!(source.signatures[0].nodes[1], (4, "12".to_string()));
        assert_eq!(source.signatures[1].profiles, vec![12, 22]);
        let rebuilt = DataSet::build(source).unwrap();
        assert_eq!(rebuilt.nodes, dataset.nodes);
    }
}
