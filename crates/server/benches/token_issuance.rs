use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use oidc_idp::directory::Principal;
use oidc_idp::keys::KeyManager;
use oidc_idp::oidc::discovery::jwks;
use oidc_idp::oidc::exchange::ExchangeStore;
use oidc_idp::oidc::tokens::TokenIssuer;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

// CI-friendly benchmark configuration
fn is_ci_mode() -> bool {
    std::env::var("CI").is_ok() || std::env::var("QUICK_BENCH").is_ok()
}

fn principal() -> Principal {
    Principal {
        subject: "alice".into(),
        full_name: "Alice Liddell".into(),
        given_name: "Alice".into(),
        family_name: "Liddell".into(),
        email: "alice@example.com".into(),
        groups: vec!["staff".into(), "admins".into()],
    }
}

fn scopes(s: &str) -> BTreeSet<String> {
    s.split_whitespace().map(String::from).collect()
}

fn benchmark_token_issuance(c: &mut Criterion) {
    let keys = Arc::new(KeyManager::new(2).unwrap());
    let issuer = TokenIssuer::new(
        "https://idp.example",
        keys.clone(),
        Duration::from_secs(86_400),
    );
    let principal = principal();

    c.bench_function("issue_access_token_only", |b| {
        let scopes = scopes("email profile");
        b.iter(|| {
            let bundle = issuer
                .issue(black_box(&principal), "c1", &scopes, None)
                .unwrap();
            black_box(bundle);
        });
    });

    c.bench_function("issue_access_and_id_token", |b| {
        let scopes = scopes("openid email profile");
        b.iter(|| {
            let bundle = issuer
                .issue(black_box(&principal), "c1", &scopes, Some("nonce"))
                .unwrap();
            black_box(bundle);
        });
    });

    c.bench_function("jwks_formatting", |b| {
        b.iter(|| black_box(jwks(keys.as_ref())));
    });
}

fn benchmark_exchange_store(c: &mut Criterion) {
    let keys = Arc::new(KeyManager::new(1).unwrap());
    let issuer = TokenIssuer::new("https://idp.example", keys, Duration::from_secs(86_400));
    let bundle = issuer
        .issue(&principal(), "c1", &scopes("openid"), None)
        .unwrap();
    let store = ExchangeStore::new(Duration::from_secs(600));

    c.bench_function("exchange_put_get", |b| {
        b.iter(|| {
            let code = store.put("c1", bundle.clone());
            black_box(store.get("c1", black_box(&code)).unwrap());
        });
    });
}

fn criterion_config() -> Criterion {
    if is_ci_mode() {
        Criterion::default()
            .sample_size(10)
            .measurement_time(Duration::from_secs(2))
    } else {
        Criterion::default()
    }
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = benchmark_token_issuance, benchmark_exchange_store
}
criterion_main!(benches);
