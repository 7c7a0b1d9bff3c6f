//! End-to-end matching tests
//!
//! Exercises the public matching API against the embedded demonstration data
//! set and a small hand-built data set whose scores are known in advance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ua_solver::{
    DataSet, DataSetError, MatchError, MatchMethod, MatchState, MatchingConfig, MatchingEngine,
    ProfileId,
};

const FIREFOX_LINUX: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const PIXEL_CHROME: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36";

fn small_dataset() -> DataSet {
    DataSet::from_json(
        r#"{
            "version": "1.0.0",
            "name": "small",
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
    .expect("small data set should build")
}

fn profile_ids(profiles: &[&ua_solver::Profile]) -> Vec<u32> {
    profiles.iter().map(|p| p.id.0).collect()
}

/// Method, score and signature index: everything a caller acts on
fn outcome(state: &MatchState<'_>) -> (MatchMethod, u32, Option<i32>) {
    (
        state.method(),
        state.lowest_score(),
        state.signature().map(|s| s.index),
    )
}

#[test]
fn test_every_signature_matches_itself_exactly() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);

    for signature in &dataset.signatures {
        let user_agent = signature.render(&dataset).unwrap();
        let state = engine.match_user_agent(&user_agent).unwrap();

        assert_eq!(state.method(), MatchMethod::Exact, "{user_agent}");
        assert_eq!(state.lowest_score(), 0);
        assert_eq!(state.signature().map(|s| s.index), Some(signature.index));
        assert_eq!(state.matched_characters(), user_agent);
        assert_eq!(
            profile_ids(state.profiles()),
            profile_ids(&dataset.signature_profiles(signature).unwrap())
        );
    }
}

#[test]
fn test_embedded_profiles_resolve_per_component() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let state = engine.match_user_agent(PIXEL_CHROME).unwrap();

    assert_eq!(state.method(), MatchMethod::Exact);
    let hardware = state.profile_for("Hardware").unwrap();
    assert_eq!(hardware.property("HardwareModel"), Some("Pixel 8"));
    let browser = state.profile_for("browser").unwrap();
    assert_eq!(browser.property("BrowserName"), Some("Chrome"));
    let crawler = state.profile_for("Crawler").unwrap();
    assert_eq!(crawler.property("IsCrawler"), Some("False"));
}

#[test]
fn test_newer_version_matches_numerically() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);

    let state = engine
        .match_user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/127.0")
        .unwrap();
    assert_eq!(state.method(), MatchMethod::Numeric);
    assert_eq!(state.lowest_score(), 1);
    assert_eq!(state.signature().map(|s| s.rank), Some(10));
    assert_eq!(state.matched_characters(), FIREFOX_LINUX);

    // Both version numbers drift by one
    let state = engine
        .match_user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0")
        .unwrap();
    assert_eq!(state.method(), MatchMethod::Numeric);
    assert_eq!(state.lowest_score(), 2);
    assert_eq!(state.signature().map(|s| s.rank), Some(10));

    let state = engine.match_user_agent("curl/8.4.0").unwrap();
    assert_eq!(state.method(), MatchMethod::Numeric);
    assert_eq!(state.lowest_score(), 1);
    assert_eq!(
        state.profile_for("Crawler").and_then(|p| p.property("CrawlerName")),
        Some("curl")
    );
}

#[test]
fn test_fallback_order() {
    let dataset = small_dataset();
    let engine = MatchingEngine::new(&dataset);

    let cases = [
        ("Foo/12.3", MatchMethod::Exact, 0),
        ("Foo/12.9", MatchMethod::Numeric, 6),
        ("Foo/12 .3", MatchMethod::Nearest, 1),
        ("Foo/12.x", MatchMethod::Closest, 692),
    ];
    for (user_agent, method, score) in cases {
        let state = engine.match_user_agent(user_agent).unwrap();
        assert_eq!(state.method(), method, "{user_agent}");
        assert_eq!(state.lowest_score(), score, "{user_agent}");
        assert_eq!(state.signature().map(|s| s.rank), Some(0), "{user_agent}");
        assert_eq!(profile_ids(state.profiles()), vec![11, 21]);
    }
}

#[test]
fn test_unidentifiable_targets_use_defaults() {
    let dataset = small_dataset();
    let engine = MatchingEngine::new(&dataset);

    for user_agent in ["", "ab", "zzzzzzzz"] {
        let state = engine.match_user_agent(user_agent).unwrap();
        assert_eq!(state.method(), MatchMethod::None, "{user_agent:?}");
        assert_eq!(state.lowest_score(), 0);
        assert!(state.signature().is_none());
        assert_eq!(profile_ids(state.profiles()), vec![1, 2]);
    }

    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let state = engine.match_user_agent("ab").unwrap();
    assert_eq!(state.method(), MatchMethod::None);
    assert_eq!(profile_ids(state.profiles()), vec![1, 2, 3, 4]);
}

#[test]
fn test_unknown_token_falls_back_to_scoring() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let state = engine
        .match_user_agent(
            "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        )
        .unwrap();

    assert!(state.method() >= MatchMethod::Nearest);
    assert!(state.closest_signatures() > 0);
    assert_eq!(state.profiles().len(), dataset.components.len());
}

#[test]
fn test_matching_is_deterministic() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let targets = [
        PIXEL_CHROME,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/121.0.0.0",
        "Mozilla/5.0 (compatible; Googlebot/2.1)",
        "not a browser at all",
    ];

    for target in targets {
        let first = engine.match_user_agent(target).unwrap();
        let second = engine.match_user_agent(target).unwrap();
        assert_eq!(outcome(&first), outcome(&second), "{target}");
        assert_eq!(first.matched_characters(), second.matched_characters());
        assert_eq!(
            profile_ids(first.profiles()),
            profile_ids(second.profiles())
        );
    }
}

#[test]
fn test_reused_state_matches_fresh_state() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let mut state = MatchState::new(&dataset);

    for target in [FIREFOX_LINUX, "curl/8.4.0", "ab", PIXEL_CHROME] {
        engine.match_into(target.as_bytes(), &mut state).unwrap();
        let fresh = engine.match_user_agent(target).unwrap();
        assert_eq!(outcome(&state), outcome(&fresh), "{target}");
        assert_eq!(state.user_agent(), target);
    }
}

/// Characters drawn from the small data set so random targets hit its nodes
const ALPHABET: &[u8] = b"FoBar/1237.x ";

fn random_target(rng: &mut StdRng, max_len: usize) -> Vec<u8> {
    let length = rng.gen_range(0..=max_len);
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

fn mutate(rng: &mut StdRng, user_agent: &str) -> Vec<u8> {
    let mut bytes = user_agent.as_bytes().to_vec();
    for _ in 0..rng.gen_range(1..4) {
        let index = rng.gen_range(0..bytes.len());
        bytes[index] = rng.gen_range(b' '..=b'~');
    }
    bytes
}

#[test]
fn test_branch_and_bound_does_not_change_results() {
    let exhaustive = MatchingConfig {
        max_signatures: None,
        branch_and_bound: false,
    };
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let dataset = small_dataset();
    let pruned = MatchingEngine::new(&dataset);
    let full = MatchingEngine::with_config(&dataset, exhaustive.clone());
    for _ in 0..2000 {
        let target = random_target(&mut rng, 12);
        let a = pruned.match_bytes(&target).unwrap();
        let b = full.match_bytes(&target).unwrap();
        assert_eq!(outcome(&a), outcome(&b), "{:?}", String::from_utf8_lossy(&target));
    }

    let dataset = DataSet::load_embedded().unwrap();
    let pruned = MatchingEngine::new(&dataset);
    let full = MatchingEngine::with_config(&dataset, exhaustive);
    for _ in 0..300 {
        let rank = rng.gen_range(0..dataset.len());
        let signature = dataset.ranked_signature(i32::try_from(rank).unwrap()).unwrap();
        let target = mutate(&mut rng, &signature.render(&dataset).unwrap());
        let a = pruned.match_bytes(&target).unwrap();
        let b = full.match_bytes(&target).unwrap();
        assert_eq!(outcome(&a), outcome(&b), "{:?}", String::from_utf8_lossy(&target));
        assert!(a.signatures_compared() <= b.signatures_compared());
    }
}

#[test]
fn test_max_signatures_limits_candidates() {
    let dataset = small_dataset();
    let config = MatchingConfig {
        max_signatures: Some(0),
        ..MatchingConfig::default()
    };
    let engine = MatchingEngine::with_config(&dataset, config);

    let state = engine.match_user_agent("Foo/12.x").unwrap();
    assert_eq!(state.method(), MatchMethod::None);
    assert_eq!(state.signatures_compared(), 0);

    // Exact lookups never consult the cap
    let state = engine.match_user_agent("Foo/12.3").unwrap();
    assert_eq!(state.method(), MatchMethod::Exact);
}

#[test]
fn test_disposed_data_set_is_rejected() {
    let dataset = small_dataset();
    let engine = MatchingEngine::new(&dataset);
    assert!(engine.match_user_agent("Foo/12.3").is_ok());

    dataset.dispose();
    assert!(matches!(
        engine.match_user_agent("Foo/12.3"),
        Err(MatchError::Disposed)
    ));
    assert!(matches!(
        engine.match_headers(&[("User-Agent", "Foo/12.3")]),
        Err(MatchError::Disposed)
    ));
}

#[test]
fn test_data_error_propagates_and_clears_state() {
    let mut dataset = small_dataset();
    let missing = i32::try_from(dataset.nodes.len()).unwrap();
    for offset in &mut dataset.root_nodes {
        *offset = missing;
    }

    let engine = MatchingEngine::new(&dataset);
    let mut state = MatchState::new(&dataset);
    let result = engine.match_into(b"Foo/12.3", &mut state);

    assert!(matches!(
        result,
        Err(MatchError::DataSet(DataSetError::EntityNotFound { kind: "node", .. }))
    ));
    assert!(state.nodes().is_empty());
    assert!(state.signature().is_none());
    assert_eq!(state.method(), MatchMethod::None);
}

#[test]
fn test_headers_combine_components() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let headers = [
        ("user-agent", FIREFOX_LINUX),
        ("Device-Stock-UA", PIXEL_CHROME),
        ("Accept", "text/html"),
    ];
    let result = engine.match_headers(&headers).unwrap();

    assert_eq!(result.method, MatchMethod::Exact);
    assert_eq!(result.matches.len(), 2);
    assert_eq!(profile_ids(&result.profiles), vec![103, 203, 302, 4]);
    assert!(result.header("User-Agent").is_some());
    assert!(result.header("Accept").is_none());
}

#[test]
fn test_headers_report_worst_method() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let result = engine
        .match_headers(&[("User-Agent", PIXEL_CHROME), ("Device-Stock-UA", "curl/8.4.0")])
        .unwrap();

    // Hardware and software come from the stock UA, which has neither
    assert_eq!(result.method, MatchMethod::Numeric);
    assert_eq!(profile_ids(&result.profiles), vec![1, 2, 301, 4]);
}

#[test]
fn test_headers_without_user_agent_use_defaults() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let result = engine.match_headers(&[("Accept", "text/html")]).unwrap();

    assert_eq!(result.method, MatchMethod::None);
    assert!(result.matches.is_empty());
    assert_eq!(profile_ids(&result.profiles), vec![1, 2, 3, 4]);
    assert_eq!(result.profiles[0].id, ProfileId(1));
}
