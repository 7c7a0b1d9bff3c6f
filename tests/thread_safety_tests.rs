// Thread-safety tests for DataSet and MatchingEngine
use std::sync::Arc;
use std::thread;

use ua_solver::{DataSet, MatchError, MatchMethod, MatchState, MatchingEngine};

#[test]
fn test_types_are_send_sync() {
    // Compile-time assertion that shared types are Send + Sync
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    assert_send::<DataSet>();
    assert_sync::<DataSet>();
    assert_send::<MatchingEngine<'static>>();
    assert_sync::<MatchingEngine<'static>>();
    assert_send::<MatchState<'static>>();
}

#[test]
fn test_concurrent_matches() {
    let dataset = Arc::new(DataSet::load_embedded().expect("Failed to load data set"));
    let user_agents: Arc<Vec<String>> = Arc::new(
        dataset
            .signatures
            .iter()
            .map(|s| s.render(&dataset).unwrap())
            .collect(),
    );

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let dataset = Arc::clone(&dataset);
            let user_agents = Arc::clone(&user_agents);
            thread::spawn(move || {
                let engine = MatchingEngine::new(&dataset);
                let mut state = MatchState::new(&dataset);
                // Each thread walks the list from a different offset
                for i in 0..100 {
                    let index = (thread_id + i) % user_agents.len();
                    engine
                        .match_into(user_agents[index].as_bytes(), &mut state)
                        .unwrap();
                    assert_eq!(state.method(), MatchMethod::Exact);
                    assert_eq!(
                        state.signature().map(|s| s.index),
                        Some(i32::try_from(index).unwrap())
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_scoped_threads_share_engine() {
    let dataset = DataSet::load_embedded().unwrap();
    let engine = MatchingEngine::new(&dataset);
    let targets = [
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/127.0",
        "curl/8.4.0",
        "ab",
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
    ];
    let expected: Vec<_> = targets
        .iter()
        .map(|t| {
            let state = engine.match_user_agent(t).unwrap();
            (state.method(), state.lowest_score(), state.signature().map(|s| s.index))
        })
        .collect();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    for (target, expected) in targets.iter().zip(&expected) {
                        let state = engine.match_user_agent(target).unwrap();
                        let actual = (
                            state.method(),
                            state.lowest_score(),
                            state.signature().map(|s| s.index),
                        );
                        assert_eq!(&actual, expected, "{target}");
                    }
                }
            });
        }
    });
}

#[test]
fn test_dispose_while_matching() {
    let dataset = Arc::new(DataSet::load_embedded().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dataset = Arc::clone(&dataset);
            thread::spawn(move || {
                let engine = MatchingEngine::new(&dataset);
                let mut disposed = 0;
                for _ in 0..200 {
                    match engine.match_user_agent("curl/8.5.0") {
                        Ok(state) => assert_eq!(state.method(), MatchMethod::Exact),
                        Err(MatchError::Disposed) => disposed += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                disposed
            })
        })
        .collect();

    dataset.dispose();
    for handle in handles {
        handle.join().unwrap();
    }

    // Everything after disposal fails fast
    let engine = MatchingEngine::new(&dataset);
    assert!(matches!(
        engine.match_user_agent("curl/8.5.0"),
        Err(MatchError::Disposed)
    ));
}
