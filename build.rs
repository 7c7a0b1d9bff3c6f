use std::collections::HashSet;
use std::path::Path;

fn main() {
    let dataset_path = Path::new("data/signatures.json");
    validate_dataset_file(dataset_path);
    set_build_dependencies();
}

fn validate_dataset_file(dataset_path: &Path) {
    // Ensure data set exists at build time
    assert!(
        dataset_path.exists(),
        "\n\nDATASET BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the data set file before building.\n",
        dataset_path.display()
    );

    let contents = std::fs::read_to_string(dataset_path).unwrap_or_else(|e| {
        panic!(
            "\n\nDATASET BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            dataset_path.display()
        );
    });

    let dataset: serde_json::Value = serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nDATASET BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            dataset_path.display()
        );
    });

    validate_dataset_structure(&dataset);
}

fn validate_dataset_structure(dataset: &serde_json::Value) {
    assert!(
        dataset.is_object(),
        "\n\nDATASET BUILD ERROR: Root must be a JSON object\n"
    );

    for field in ["version", "name", "published"] {
        assert!(
            dataset.get(field).and_then(serde_json::Value::as_str).is_some(),
            "\n\nDATASET BUILD ERROR: Missing string field '{field}'\n"
        );
    }

    let components = array_field(dataset, "components");
    assert!(
        !components.is_empty(),
        "\n\nDATASET BUILD ERROR: At least one component is required\n"
    );
    let component_names: HashSet<&str> = components
        .iter()
        .enumerate()
        .map(|(i, component)| {
            assert!(
                component.get("default_profile").and_then(serde_json::Value::as_u64).is_some(),
                "\n\nDATASET BUILD ERROR: Component {i} missing 'default_profile'\n"
            );
            component
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_else(|| panic!("\n\nDATASET BUILD ERROR: Component {i} missing 'name'\n"))
        })
        .collect();

    let profiles = array_field(dataset, "profiles");
    let mut profile_ids = HashSet::new();
    for (i, profile) in profiles.iter().enumerate() {
        let id = profile
            .get("id")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_else(|| panic!("\n\nDATASET BUILD ERROR: Profile {i} missing 'id'\n"));
        assert!(
            profile_ids.insert(id),
            "\n\nDATASET BUILD ERROR: Duplicate profile id {id}\n"
        );
        let component = profile
            .get("component")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        assert!(
            component_names.contains(component),
            "\n\nDATASET BUILD ERROR: Profile {id} references unknown component '{component}'\n"
        );
    }

    let signatures = array_field(dataset, "signatures");
    let total_nodes = validate_signatures(signatures, &profile_ids);

    println!(
        "cargo:warning=Validated data set: {} signatures, {total_nodes} nodes, {} profiles",
        signatures.len(),
        profiles.len()
    );
}

fn array_field<'a>(dataset: &'a serde_json::Value, field: &str) -> &'a [serde_json::Value] {
    dataset
        .get(field)
        .and_then(serde_json::Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_else(|| {
            panic!("\n\nDATASET BUILD ERROR: '{field}' must be a top-level array\n");
        })
}

fn validate_signatures(signatures: &[serde_json::Value], profile_ids: &HashSet<u64>) -> usize {
    let mut total_nodes = 0;

    for (rank, signature) in signatures.iter().enumerate() {
        let profiles = signature
            .get("profiles")
            .and_then(serde_json::Value::as_array)
            .unwrap_or_else(|| {
                panic!("\n\nDATASET BUILD ERROR: Signature {rank} missing 'profiles' array\n")
            });
        for id in profiles.iter().filter_map(serde_json::Value::as_u64) {
            assert!(
                profile_ids.contains(&id),
                "\n\nDATASET BUILD ERROR: Signature {rank} references unknown profile {id}\n"
            );
        }

        let nodes = signature
            .get("nodes")
            .and_then(serde_json::Value::as_array)
            .unwrap_or_else(|| {
                panic!("\n\nDATASET BUILD ERROR: Signature {rank} missing 'nodes' array\n")
            });
        assert!(
            !nodes.is_empty(),
            "\n\nDATASET BUILD ERROR: Signature {rank} has no nodes\n"
        );

        let mut next_free = 0;
        for node in nodes {
            let (position, characters) = node
                .as_array()
                .and_then(|pair| Some((pair.first()?.as_u64()?, pair.get(1)?.as_str()?)))
                .unwrap_or_else(|| {
                    panic!(
                        "\n\nDATASET BUILD ERROR: Signature {rank} node {node} must be [position, characters]\n"
                    )
                });
            assert!(
                !characters.is_empty(),
                "\n\nDATASET BUILD ERROR: Signature {rank} has an empty node\n"
            );
            assert!(
                position >= next_free,
                "\n\nDATASET BUILD ERROR: Signature {rank} node '{characters}' at {position} overlaps the previous node\n"
            );
            next_free = position + characters.len() as u64;
        }
        total_nodes += nodes.len();
    }

    total_nodes
}

fn set_build_dependencies() {
    // Tell cargo to rerun if the data set changes
    println!("cargo:rerun-if-changed=data/signatures.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
