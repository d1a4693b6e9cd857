use formc::error::LoweringError;
use formc::expr::{ExpressionArena, Restriction};
use formc::transformer::{CacheKey, Fragment, MemoizationCache, TerminalKind};

fn key(arena: &mut ExpressionArena, component: Vec<usize>) -> CacheKey {
    CacheKey {
        node: arena.scalar(1.0),
        component,
        derivatives: Vec::new(),
        restriction: None,
    }
}

#[test]
fn cached_fragments_are_not_recomputed() {
    let mut arena = ExpressionArena::new();
    let key = key(&mut arena, vec![0]);
    let mut cache = MemoizationCache::new();

    let first = cache
        .get_or_compute(TerminalKind::BasisFunction, key.clone(), |_| {
            Ok::<_, LoweringError>(Fragment::literal(2.0))
        })
        .unwrap();
    let second = cache
        .get_or_compute(TerminalKind::BasisFunction, key.clone(), |_| -> Result<Fragment, LoweringError> {
            panic!("cached fragment must not be recomputed")
        })
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.get(TerminalKind::BasisFunction, &key), Some(&first));
}

#[test]
fn keys_differ_by_context() {
    let mut arena = ExpressionArena::new();
    let base = key(&mut arena, vec![0]);
    let variants = [
        CacheKey {
            component: vec![1],
            ..base.clone()
        },
        CacheKey {
            derivatives: vec![0],
            ..base.clone()
        },
        CacheKey {
            restriction: Some(Restriction::Negative),
            ..base.clone()
        },
        CacheKey {
            node: arena.scalar(1.0),
            ..base.clone()
        },
    ];

    let mut cache = MemoizationCache::new();
    cache
        .get_or_compute(TerminalKind::Function, base, |_| Ok::<_, LoweringError>(Fragment::literal(1.0)))
        .unwrap();
    for (i, variant) in variants.into_iter().enumerate() {
        let value = (i + 2) as f64;
        let fragment = cache
            .get_or_compute(TerminalKind::Function, variant, |_| {
                Ok::<_, LoweringError>(Fragment::literal(value))
            })
            .unwrap();
        assert_eq!(fragment.literal_value(), Some(value));
    }
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.len(TerminalKind::Function), 5);
    assert_eq!(cache.len(TerminalKind::BasisFunction), 0);
}

#[test]
fn basis_functions_and_functions_are_cached_separately() {
    let mut arena = ExpressionArena::new();
    let key = key(&mut arena, Vec::new());
    let mut cache = MemoizationCache::new();
    cache
        .get_or_compute(TerminalKind::BasisFunction, key.clone(), |_| {
            Ok::<_, LoweringError>(Fragment::literal(1.0))
        })
        .unwrap();
    assert!(cache.get(TerminalKind::Function, &key).is_none());
}

#[test]
fn errors_are_not_cached() {
    let mut arena = ExpressionArena::new();
    let key = key(&mut arena, Vec::new());
    let mut cache = MemoizationCache::new();

    let result = cache.get_or_compute(TerminalKind::BasisFunction, key.clone(), |_| {
        Err(LoweringError::structural("v_0", "failure"))
    });
    assert!(result.is_err());
    assert!(cache.is_empty());

    let fragment = cache
        .get_or_compute(TerminalKind::BasisFunction, key, |_| Ok::<_, LoweringError>(Fragment::literal(3.0)))
        .unwrap();
    assert_eq!(fragment.literal_value(), Some(3.0));
}

#[test]
fn clearing_keeps_statistics() {
    let mut arena = ExpressionArena::new();
    let key = key(&mut arena, Vec::new());
    let mut cache = MemoizationCache::new();
    for _ in 0..3 {
        cache
            .get_or_compute(TerminalKind::Function, key.clone(), |_| {
                Ok::<_, LoweringError>(Fragment::literal(1.0))
            })
            .unwrap();
    }
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.hits(), 2);
    assert_eq!(cache.misses(), 1);
}
